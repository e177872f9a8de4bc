//! Checkout and order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::{Cart, CartLine, CheckoutCoordinator};
use chrono::{DateTime, Utc};
use common::BookId;
use projections::OrderHistoryProjector;
use serde::{Deserialize, Serialize};
use store::OrderStore;
use uuid::Uuid;

use crate::auth::{self, IdentityVerifier};
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub coordinator: CheckoutCoordinator<S>,
    pub projector: OrderHistoryProjector<S>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub lines: Vec<CheckoutLineRequest>,
}

#[derive(Deserialize)]
pub struct CheckoutLineRequest {
    pub book_id: Uuid,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub total_amount_cents: i64,
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub order_id: String,
    pub order_date: DateTime<Utc>,
    pub total_amount_cents: i64,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub book_id: String,
    pub title: String,
    pub isbn: String,
    pub quantity: u32,
    pub price_at_order_time_cents: i64,
}

// -- Handlers --

/// POST /orders — place an order for the whole cart atomically.
///
/// The total is computed server-side from locked catalog prices; any
/// client-supplied total or price in the body is ignored.
#[tracing::instrument(skip(state, headers, req))]
pub async fn checkout<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<(axum::http::StatusCode, Json<CheckoutResponse>), ApiError> {
    let token = auth::bearer_token(&headers)?;
    let customer_id = state.verifier.verify(token).await?;

    let cart = Cart::new(
        req.lines
            .iter()
            .map(|line| CartLine {
                book_id: BookId::from_uuid(line.book_id),
                quantity: line.quantity,
            })
            .collect(),
    )?;

    let placed = state
        .coordinator
        .place_order(customer_id, &req.shipping_address, &cart)
        .await?;

    let response = CheckoutResponse {
        order_id: placed.order_id.to_string(),
        total_amount_cents: placed.total_amount.cents(),
    };

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders/history — the caller's past orders, most recent first.
#[tracing::instrument(skip(state, headers))]
pub async fn history<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let token = auth::bearer_token(&headers)?;
    let customer_id = state.verifier.verify(token).await?;

    let summaries = state.projector.order_history(customer_id).await?;

    let response = summaries
        .into_iter()
        .map(|summary| OrderSummaryResponse {
            order_id: summary.order_id.to_string(),
            order_date: summary.order_date,
            total_amount_cents: summary.total_amount.cents(),
            status: summary.status.to_string(),
            items: summary
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    book_id: item.book_id.to_string(),
                    title: item.title,
                    isbn: item.isbn,
                    quantity: item.quantity,
                    price_at_order_time_cents: item.price_at_order_time.cents(),
                })
                .collect(),
        })
        .collect();

    Ok(Json(response))
}

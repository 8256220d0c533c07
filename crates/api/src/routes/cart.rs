//! Buyer cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BuyerId, ItemId, VendorId};
use serde::{Deserialize, Serialize};
use store::{CartKey, CartLine, MarketStore};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Deserialize)]
pub struct CartLineRequest {
    pub vendor_id: String,
    pub item_id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

fn buyer_from_path(caller: Caller, raw: &str) -> Result<BuyerId, ApiError> {
    let buyer_id: BuyerId = parse_id("buyer_id", raw)?;
    caller.require_buyer(buyer_id)?;
    Ok(buyer_id)
}

fn key_from_body(buyer_id: BuyerId, req: &CartLineRequest) -> Result<CartKey, ApiError> {
    let vendor_id: VendorId = parse_id("vendor_id", &req.vendor_id)?;
    let item_id: ItemId = parse_id("item_id", &req.item_id)?;
    Ok(CartKey::new(buyer_id, vendor_id, item_id))
}

// -- Handlers --

/// GET /buyers/{buyer_id}/cart: list the buyer's cart lines.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(buyer_id): Path<String>,
) -> Result<Json<Vec<CartLine>>, ApiError> {
    let buyer_id = buyer_from_path(caller, &buyer_id)?;
    let lines = state.carts.list_lines(buyer_id).await?;
    Ok(Json(lines))
}

/// POST /buyers/{buyer_id}/cart: add a new line.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(buyer_id): Path<String>,
    Json(req): Json<CartLineRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let buyer_id = buyer_from_path(caller, &buyer_id)?;
    let key = key_from_body(buyer_id, &req)?;

    state.carts.add_line(key, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(CartLine::new(key, req.quantity))))
}

/// PUT /buyers/{buyer_id}/cart: overwrite the quantity of an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(buyer_id): Path<String>,
    Json(req): Json<CartLineRequest>,
) -> Result<Json<CartLine>, ApiError> {
    let buyer_id = buyer_from_path(caller, &buyer_id)?;
    let key = key_from_body(buyer_id, &req)?;

    state.carts.update_quantity(key, req.quantity).await?;
    Ok(Json(CartLine::new(key, req.quantity)))
}

/// DELETE /buyers/{buyer_id}/cart/{vendor_id}/{item_id}: remove one line.
#[tracing::instrument(skip(state))]
pub async fn remove<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path((buyer_id, vendor_id, item_id)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let buyer_id = buyer_from_path(caller, &buyer_id)?;
    let key = CartKey::new(
        buyer_id,
        parse_id("vendor_id", &vendor_id)?,
        parse_id("item_id", &item_id)?,
    );

    state.carts.remove_line(key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /buyers/{buyer_id}/cart: empty the cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(buyer_id): Path<String>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let buyer_id = buyer_from_path(caller, &buyer_id)?;
    let removed = state.carts.clear_lines(buyer_id).await?;
    Ok(Json(ClearCartResponse { removed }))
}

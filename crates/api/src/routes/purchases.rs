//! Purchase endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{BuyerId, ItemId, VendorId};
use domain::{ErrorKind, PurchaseRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{CartKey, MarketStore};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePurchaseRequest {
    pub vendor_id: String,
    pub item_id: String,
    /// Unit price as a decimal string, e.g. `"10.00"`.
    pub amount: String,
    pub quantity: u32,
    pub idempotency_key: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PurchaseCreatedResponse {
    pub sale_id: String,
}

// -- Handlers --

/// POST /buyers/{buyer_id}/purchases: buy one line and record the sale.
///
/// On success the matching cart line, if any, is removed. A failure to remove
/// it is logged and does not affect the response.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(buyer_id): Path<String>,
    Json(req): Json<CreatePurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseCreatedResponse>), ApiError> {
    let buyer_id: BuyerId = parse_id("buyer_id", &buyer_id)?;
    caller.require_buyer(buyer_id)?;

    let vendor_id: VendorId = parse_id("vendor_id", &req.vendor_id)?;
    let item_id: ItemId = parse_id("item_id", &req.item_id)?;
    let amount: Decimal = req
        .amount
        .trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid amount: {e}")))?;

    let mut purchase = PurchaseRequest::new(buyer_id, vendor_id, item_id, amount, req.quantity);
    if let Some(key) = req.idempotency_key.filter(|k| !k.is_empty()) {
        purchase = purchase.with_idempotency_key(key);
    }

    let sale_id = state.purchases.create_purchase(purchase).await?;

    let key = CartKey::new(buyer_id, vendor_id, item_id);
    if let Err(err) = state.carts.remove_line(key).await {
        match err.kind() {
            ErrorKind::NotFound => tracing::debug!(%sale_id, "no cart line to remove"),
            _ => tracing::warn!(%sale_id, error = %err, "failed to remove purchased cart line"),
        }
    }

    let response = PurchaseCreatedResponse {
        sale_id: sale_id.to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

//! Vendor sales reporting endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ItemId, SaleId, VendorId};
use domain::{MarketError, NotFound};
use store::{MarketStore, SaleRecord, SalesSummary};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

fn vendor_from_path(caller: Caller, raw: &str) -> Result<VendorId, ApiError> {
    let vendor_id: VendorId = parse_id("vendor_id", raw)?;
    caller.require_vendor(vendor_id)?;
    Ok(vendor_id)
}

/// GET /vendors/{vendor_id}/sales: list the vendor's sales, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(vendor_id): Path<String>,
) -> Result<Json<Vec<SaleRecord>>, ApiError> {
    let vendor_id = vendor_from_path(caller, &vendor_id)?;
    let sales = state.sales.sales_for_vendor(vendor_id).await?;
    Ok(Json(sales))
}

/// GET /vendors/{vendor_id}/sales/{sale_id}: load one of the vendor's sales.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path((vendor_id, sale_id)): Path<(String, String)>,
) -> Result<Json<SaleRecord>, ApiError> {
    let vendor_id = vendor_from_path(caller, &vendor_id)?;
    let sale_id: SaleId = parse_id("sale_id", &sale_id)?;

    let sale = state.sales.sale(sale_id).await?;
    // Another vendor's sale is reported as missing.
    if sale.vendor_id != vendor_id {
        return Err(MarketError::from(NotFound::Sale(sale_id)).into());
    }
    Ok(Json(sale))
}

/// GET /vendors/{vendor_id}/sales/summary: totals across all items.
#[tracing::instrument(skip(state))]
pub async fn summary<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(vendor_id): Path<String>,
) -> Result<Json<SalesSummary>, ApiError> {
    let vendor_id = vendor_from_path(caller, &vendor_id)?;
    let summary = state.sales.summary_for_vendor(vendor_id).await?;
    Ok(Json(summary))
}

/// GET /vendors/{vendor_id}/items/{item_id}/sales/summary: totals for one item.
#[tracing::instrument(skip(state))]
pub async fn item_summary<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path((vendor_id, item_id)): Path<(String, String)>,
) -> Result<Json<SalesSummary>, ApiError> {
    let vendor_id = vendor_from_path(caller, &vendor_id)?;
    let item_id: ItemId = parse_id("item_id", &item_id)?;
    let summary = state.sales.summary_for_item(vendor_id, item_id).await?;
    Ok(Json(summary))
}

//! Vendor-facing sales reporting.

use common::{ItemId, SaleId, VendorId};
use store::{MarketStore, SaleRecord, SalesSummary};

use crate::config::{ServiceConfig, bounded};
use crate::error::{MarketError, NotFound};

/// Read-only queries over recorded sales.
pub struct SalesService<S: MarketStore> {
    store: S,
    config: ServiceConfig,
}

impl<S: MarketStore> SalesService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Loads a single sale.
    #[tracing::instrument(skip(self))]
    pub async fn sale(&self, sale_id: SaleId) -> Result<SaleRecord, MarketError> {
        bounded(
            self.config.store_timeout,
            "get_sale",
            self.store.get_sale(sale_id),
        )
        .await?
        .ok_or_else(|| NotFound::Sale(sale_id).into())
    }

    /// Lists a vendor's sales, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn sales_for_vendor(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<SaleRecord>, MarketError> {
        bounded(
            self.config.store_timeout,
            "sales_for_vendor",
            self.store.sales_for_vendor(vendor_id),
        )
        .await
    }

    /// Totals across all of a vendor's sales.
    #[tracing::instrument(skip(self))]
    pub async fn summary_for_vendor(
        &self,
        vendor_id: VendorId,
    ) -> Result<SalesSummary, MarketError> {
        bounded(
            self.config.store_timeout,
            "sales_summary",
            self.store.sales_summary(vendor_id, None),
        )
        .await
    }

    /// Totals across a vendor's sales of one item.
    #[tracing::instrument(skip(self))]
    pub async fn summary_for_item(
        &self,
        vendor_id: VendorId,
        item_id: ItemId,
    ) -> Result<SalesSummary, MarketError> {
        bounded(
            self.config.store_timeout,
            "sales_summary",
            self.store.sales_summary(vendor_id, Some(item_id)),
        )
        .await
    }
}

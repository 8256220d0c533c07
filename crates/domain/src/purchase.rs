//! Purchase transaction engine.

use std::time::Instant;

use chrono::Utc;
use common::{BuyerId, ItemId, SaleId, VendorId};
use rust_decimal::Decimal;
use store::{Item, MarketStore, SaleRecord, StoreError, StoreTransaction};

use crate::config::{ServiceConfig, bounded};
use crate::decimal::amounts_equal;
use crate::error::{ConflictReason, MarketError, NotFound};

/// A buyer's request to purchase one quantity of one vendor's item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub buyer_id: BuyerId,
    pub vendor_id: VendorId,
    pub item_id: ItemId,

    /// Unit price the buyer was shown. Must equal the catalog price exactly.
    pub amount: Decimal,
    pub quantity: u32,

    /// Optional key that collapses repeated submissions into one sale.
    pub idempotency_key: Option<String>,
}

impl PurchaseRequest {
    pub fn new(
        buyer_id: BuyerId,
        vendor_id: VendorId,
        item_id: ItemId,
        amount: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            buyer_id,
            vendor_id,
            item_id,
            amount,
            quantity,
            idempotency_key: None,
        }
    }

    /// Attaches an idempotency key to the request.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

enum Fulfilled {
    Recorded,
    Replayed(SaleId),
}

/// Service that turns validated purchase requests into sale records.
///
/// The stock decrement and the sale insert run in one storage transaction,
/// and the decrement is conditional on sufficient stock, so concurrent
/// purchases can never overdraw an item.
pub struct PurchaseService<S: MarketStore> {
    store: S,
    config: ServiceConfig,
}

impl<S: MarketStore> PurchaseService<S> {
    /// Creates a new purchase service with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: S, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates a purchase and records it.
    ///
    /// Returns the id of the new sale, or of the earlier sale recorded under
    /// the same idempotency key. Business rejections have no side effects.
    /// Nothing is retried here.
    #[tracing::instrument(
        skip(self, request),
        fields(
            buyer_id = %request.buyer_id,
            vendor_id = %request.vendor_id,
            item_id = %request.item_id,
            quantity = request.quantity,
        )
    )]
    pub async fn create_purchase(&self, request: PurchaseRequest) -> Result<SaleId, MarketError> {
        metrics::counter!("purchases_total").increment(1);
        let started = Instant::now();

        let result = self.execute(request).await;

        metrics::histogram!("purchase_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(sale_id) => {
                metrics::counter!("purchases_completed").increment(1);
                tracing::info!(%sale_id, "purchase recorded");
            }
            Err(MarketError::Conflict(reason)) => {
                metrics::counter!("purchases_rejected", "reason" => reason.as_str()).increment(1);
                tracing::warn!(reason = reason.as_str(), "purchase rejected");
            }
            Err(MarketError::NotFound(_)) | Err(MarketError::Invalid(_)) => {
                metrics::counter!("purchases_rejected", "reason" => "invalid").increment(1);
            }
            Err(err) => {
                metrics::counter!("purchases_failed").increment(1);
                tracing::error!(error = %err, "purchase failed");
            }
        }

        result
    }

    async fn execute(&self, request: PurchaseRequest) -> Result<SaleId, MarketError> {
        if request.quantity == 0 {
            return Err(MarketError::Invalid(
                "quantity must be greater than 0".to_string(),
            ));
        }

        // A resubmission resolves to the sale it already produced, even if
        // stock or price have moved since.
        if let Some(key) = request.idempotency_key.as_deref()
            && let Some(existing) = bounded(
                self.config.store_timeout,
                "find_sale_by_idempotency_key",
                self.store
                    .find_sale_by_idempotency_key(request.buyer_id, key),
            )
            .await?
        {
            tracing::info!(%existing, "idempotency key already used, returning earlier sale");
            return Ok(existing);
        }

        // 1. Load the item
        let item = bounded(
            self.config.store_timeout,
            "get_item",
            self.store.get_item(request.item_id),
        )
        .await?
        .ok_or(NotFound::Item(request.item_id))?;

        // 2-4. Validate against the catalog
        validate(&item, &request)?;

        let sale = SaleRecord {
            id: SaleId::new(),
            buyer_id: request.buyer_id,
            vendor_id: item.vendor_id,
            item_id: item.id,
            price_paid: item.price,
            quantity_bought: request.quantity,
            created_at: Utc::now(),
            idempotency_key: request.idempotency_key,
        };

        // 5-8. Decrement and record atomically
        bounded(
            self.config.store_timeout,
            "purchase transaction",
            self.fulfill(sale),
        )
        .await
    }

    async fn fulfill(&self, sale: SaleRecord) -> Result<SaleId, MarketError> {
        let mut tx = self.store.begin().await?;

        match Self::apply(&mut tx, &sale).await {
            Ok(Fulfilled::Recorded) => {
                tx.commit().await?;
                Ok(sale.id)
            }
            Ok(Fulfilled::Replayed(existing)) => {
                tx.rollback().await?;
                tracing::info!(%existing, "idempotency key already used, returning earlier sale");
                Ok(existing)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                match err {
                    MarketError::Store(StoreError::DuplicateIdempotencyKey(key)) => {
                        self.replay(sale.buyer_id, &key).await
                    }
                    err => Err(err),
                }
            }
        }
    }

    async fn apply(tx: &mut S::Transaction, sale: &SaleRecord) -> Result<Fulfilled, MarketError> {
        if let Some(key) = sale.idempotency_key.as_deref()
            && let Some(existing) = tx.find_sale_by_idempotency_key(sale.buyer_id, key).await?
        {
            return Ok(Fulfilled::Replayed(existing));
        }

        // The earlier stock read was advisory; this is the authoritative check.
        let decremented = tx
            .decrement_stock_if_available(sale.item_id, sale.vendor_id, sale.quantity_bought)
            .await?;
        if !decremented {
            return Err(ConflictReason::InsufficientStock.into());
        }

        tx.insert_sale(sale).await?;
        Ok(Fulfilled::Recorded)
    }

    /// Resolves a lost idempotency-key race to the sale that won it.
    async fn replay(&self, buyer_id: BuyerId, key: &str) -> Result<SaleId, MarketError> {
        self.store
            .find_sale_by_idempotency_key(buyer_id, key)
            .await?
            .ok_or_else(|| StoreError::DuplicateIdempotencyKey(key.to_string()).into())
    }
}

fn validate(item: &Item, request: &PurchaseRequest) -> Result<(), MarketError> {
    if item.vendor_id != request.vendor_id {
        tracing::debug!(owner = %item.vendor_id, "vendor does not own item");
        return Err(ConflictReason::VendorMismatch.into());
    }

    if !amounts_equal(request.amount, item.price) {
        tracing::debug!(asserted = %request.amount, price = %item.price, "amount differs from price");
        return Err(ConflictReason::AmountMismatch.into());
    }

    if item.quantity < request.quantity {
        tracing::debug!(available = item.quantity, "not enough stock");
        return Err(ConflictReason::InsufficientStock.into());
    }

    Ok(())
}

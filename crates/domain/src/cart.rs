//! Cart consistency guard.

use common::BuyerId;
use store::{CartKey, CartLine, MarketStore};

use crate::config::{ServiceConfig, bounded};
use crate::error::{ConflictReason, MarketError, NotFound};

/// Service managing buyers' cart lines.
///
/// Keeps at most one line per (buyer, vendor, item). Stock is not checked
/// here; it is only authoritative at purchase time.
pub struct CartService<S: MarketStore> {
    store: S,
    config: ServiceConfig,
}

impl<S: MarketStore> CartService<S> {
    /// Creates a new cart service with the default configuration.
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

    /// Adds a new line to a buyer's cart.
    ///
    /// Fails with a duplicate-cart-line conflict if the buyer already has a
    /// line for this vendor's item.
    #[tracing::instrument(skip(self), fields(buyer_id = %key.buyer_id, item_id = %key.item_id))]
    pub async fn add_line(&self, key: CartKey, quantity: u32) -> Result<(), MarketError> {
        ensure_positive(quantity)?;
        let timeout = self.config.store_timeout;

        if bounded(timeout, "get_cart_line", self.store.get_cart_line(key))
            .await?
            .is_some()
        {
            tracing::debug!("cart line already present");
            return Err(ConflictReason::DuplicateCartLine.into());
        }

        // A concurrent add can land between the lookup and here; the insert
        // is conditional so the loser still sees a conflict.
        let inserted = bounded(
            timeout,
            "insert_cart_line",
            self.store.insert_cart_line(CartLine::new(key, quantity)),
        )
        .await?;
        if !inserted {
            tracing::debug!("cart line inserted concurrently");
            return Err(ConflictReason::DuplicateCartLine.into());
        }

        metrics::counter!("cart_lines_added").increment(1);
        Ok(())
    }

    /// Removes a line from a buyer's cart.
    #[tracing::instrument(skip(self), fields(buyer_id = %key.buyer_id, item_id = %key.item_id))]
    pub async fn remove_line(&self, key: CartKey) -> Result<(), MarketError> {
        let timeout = self.config.store_timeout;

        if bounded(timeout, "get_cart_line", self.store.get_cart_line(key))
            .await?
            .is_none()
        {
            return Err(NotFound::CartLine(key).into());
        }

        if !bounded(timeout, "delete_cart_line", self.store.delete_cart_line(key)).await? {
            return Err(NotFound::CartLine(key).into());
        }
        Ok(())
    }

    /// Overwrites the quantity of an existing line.
    #[tracing::instrument(skip(self), fields(buyer_id = %key.buyer_id, item_id = %key.item_id))]
    pub async fn update_quantity(&self, key: CartKey, quantity: u32) -> Result<(), MarketError> {
        ensure_positive(quantity)?;
        let timeout = self.config.store_timeout;

        if bounded(timeout, "get_cart_line", self.store.get_cart_line(key))
            .await?
            .is_none()
        {
            return Err(NotFound::CartLine(key).into());
        }

        let updated = bounded(
            timeout,
            "update_cart_line_quantity",
            self.store.update_cart_line_quantity(key, quantity),
        )
        .await?;
        if !updated {
            return Err(NotFound::CartLine(key).into());
        }
        Ok(())
    }

    /// Lists every line in a buyer's cart. Order is not significant.
    #[tracing::instrument(skip(self))]
    pub async fn list_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>, MarketError> {
        bounded(
            self.config.store_timeout,
            "list_cart_lines",
            self.store.list_cart_lines(buyer_id),
        )
        .await
    }

    /// Empties a buyer's cart. Succeeds even if it was already empty.
    ///
    /// Returns the number of lines removed.
    #[tracing::instrument(skip(self))]
    pub async fn clear_lines(&self, buyer_id: BuyerId) -> Result<u64, MarketError> {
        let removed = bounded(
            self.config.store_timeout,
            "clear_cart_lines",
            self.store.clear_cart_lines(buyer_id),
        )
        .await?;
        tracing::debug!(removed, "cart cleared");
        Ok(removed)
    }
}

fn ensure_positive(quantity: u32) -> Result<(), MarketError> {
    if quantity == 0 {
        return Err(MarketError::Invalid(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ItemId, VendorId};
    use store::InMemoryMarketStore;

    fn key_for(buyer_id: BuyerId) -> CartKey {
        CartKey::new(buyer_id, VendorId::new(), ItemId::new())
    }

    #[tokio::test]
    async fn test_add_line() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        service.add_line(key, 2).await.unwrap();

        let lines = service.list_lines(key.buyer_id).await.unwrap();
        assert_eq!(lines, vec![CartLine::new(key, 2)]);
    }

    #[tokio::test]
    async fn test_add_duplicate_line_conflicts() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        service.add_line(key, 1).await.unwrap();
        let err = service.add_line(key, 3).await.unwrap_err();

        assert_eq!(err.conflict_reason(), Some(ConflictReason::DuplicateCartLine));
        let line = service.store().get_cart_line(key).await.unwrap().unwrap();
        assert_eq!(line.quantity, 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_invalid() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        assert!(matches!(
            service.add_line(key, 0).await,
            Err(MarketError::Invalid(_))
        ));
        service.add_line(key, 1).await.unwrap();
        assert!(matches!(
            service.update_quantity(key, 0).await,
            Err(MarketError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_line() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        let err = service.remove_line(key).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(NotFound::CartLine(k)) if k == key));
    }

    #[tokio::test]
    async fn test_remove_then_add_again() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        service.add_line(key, 1).await.unwrap();
        service.remove_line(key).await.unwrap();
        service.add_line(key, 4).await.unwrap();

        let line = service.store().get_cart_line(key).await.unwrap().unwrap();
        assert_eq!(line.quantity, 4);
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let service = CartService::new(InMemoryMarketStore::new());
        let key = key_for(BuyerId::new());

        let err = service.update_quantity(key, 5).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));

        service.add_line(key, 1).await.unwrap();
        service.update_quantity(key, 5).await.unwrap();

        let line = service.store().get_cart_line(key).await.unwrap().unwrap();
        assert_eq!(line.quantity, 5);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let service = CartService::new(InMemoryMarketStore::new());
        let buyer_id = BuyerId::new();

        service.add_line(key_for(buyer_id), 1).await.unwrap();
        service.add_line(key_for(buyer_id), 2).await.unwrap();

        assert_eq!(service.clear_lines(buyer_id).await.unwrap(), 2);
        assert_eq!(service.clear_lines(buyer_id).await.unwrap(), 0);
        assert!(service.list_lines(buyer_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_item_for_different_buyers() {
        let service = CartService::new(InMemoryMarketStore::new());
        let vendor_id = VendorId::new();
        let item_id = ItemId::new();

        service
            .add_line(CartKey::new(BuyerId::new(), vendor_id, item_id), 1)
            .await
            .unwrap();
        service
            .add_line(CartKey::new(BuyerId::new(), vendor_id, item_id), 1)
            .await
            .unwrap();

        assert_eq!(service.store().cart_line_count().await, 2);
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    BuyerId, CartKey, CartLine, Item, ItemId, Result, SaleId, SaleRecord, SalesSummary,
    StoreError, VendorId,
    store::{MarketStore, StoreTransaction},
};

#[derive(Debug, Default)]
struct MarketState {
    items: HashMap<ItemId, Item>,
    cart: HashMap<CartKey, CartLine>,
    sales: Vec<SaleRecord>,
}

/// In-memory market store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation. Transactions
/// hold the write lock for their whole lifetime and stage their writes until
/// commit, so they are fully serialized.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    state: Arc<RwLock<MarketState>>,
    fail_on_sale_insert: Arc<AtomicBool>,
}

impl InMemoryMarketStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every sale insert.
    ///
    /// The failure happens after the stock decrement has been staged, which
    /// makes it useful for checking rollback behaviour.
    pub fn set_fail_on_sale_insert(&self, fail: bool) {
        self.fail_on_sale_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of committed sales.
    pub async fn sale_count(&self) -> usize {
        self.state.read().await.sales.len()
    }

    /// Returns the total number of cart lines across all buyers.
    pub async fn cart_line_count(&self) -> usize {
        self.state.read().await.cart.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    type Transaction = InMemoryTransaction;

    async fn insert_item(&self, item: Item) -> Result<()> {
        self.state.write().await.items.insert(item.id, item);
        Ok(())
    }

    async fn get_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        Ok(self.state.read().await.items.get(&item_id).cloned())
    }

    async fn get_cart_line(&self, key: CartKey) -> Result<Option<CartLine>> {
        Ok(self.state.read().await.cart.get(&key).cloned())
    }

    async fn insert_cart_line(&self, line: CartLine) -> Result<bool> {
        let mut state = self.state.write().await;
        let key = line.key();
        if state.cart.contains_key(&key) {
            return Ok(false);
        }
        state.cart.insert(key, line);
        Ok(true)
    }

    async fn update_cart_line_quantity(&self, key: CartKey, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.cart.get_mut(&key) {
            Some(line) => {
                line.quantity = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_cart_line(&self, key: CartKey) -> Result<bool> {
        Ok(self.state.write().await.cart.remove(&key).is_some())
    }

    async fn list_cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        Ok(state
            .cart
            .values()
            .filter(|line| line.buyer_id == buyer_id)
            .cloned()
            .collect())
    }

    async fn clear_cart_lines(&self, buyer_id: BuyerId) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.cart.len();
        state.cart.retain(|key, _| key.buyer_id != buyer_id);
        Ok((before - state.cart.len()) as u64)
    }

    async fn get_sale(&self, sale_id: SaleId) -> Result<Option<SaleRecord>> {
        let state = self.state.read().await;
        Ok(state.sales.iter().find(|s| s.id == sale_id).cloned())
    }

    async fn find_sale_by_idempotency_key(
        &self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>> {
        let state = self.state.read().await;
        Ok(state
            .sales
            .iter()
            .find(|s| s.buyer_id == buyer_id && s.idempotency_key.as_deref() == Some(key))
            .map(|s| s.id))
    }

    async fn sales_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<SaleRecord>> {
        let state = self.state.read().await;
        let mut sales: Vec<_> = state
            .sales
            .iter()
            .filter(|s| s.vendor_id == vendor_id)
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn sales_summary(
        &self,
        vendor_id: VendorId,
        item_id: Option<ItemId>,
    ) -> Result<SalesSummary> {
        let state = self.state.read().await;
        Ok(SalesSummary::from_sales(state.sales.iter().filter(|s| {
            s.vendor_id == vendor_id && item_id.is_none_or(|id| s.item_id == id)
        })))
    }

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.state.clone().write_owned().await;
        Ok(InMemoryTransaction {
            guard,
            fail_on_sale_insert: self.fail_on_sale_insert.load(Ordering::SeqCst),
            decrements: HashMap::new(),
            sales: Vec::new(),
        })
    }
}

/// Transaction over an [`InMemoryMarketStore`].
///
/// Writes are staged and only applied to the shared state on commit.
pub struct InMemoryTransaction {
    guard: OwnedRwLockWriteGuard<MarketState>,
    fail_on_sale_insert: bool,
    decrements: HashMap<ItemId, u32>,
    sales: Vec<SaleRecord>,
}

impl InMemoryTransaction {
    fn key_taken(&self, buyer_id: BuyerId, key: &str) -> Option<SaleId> {
        self.guard
            .sales
            .iter()
            .chain(self.sales.iter())
            .find(|s| s.buyer_id == buyer_id && s.idempotency_key.as_deref() == Some(key))
            .map(|s| s.id)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_sale_by_idempotency_key(
        &mut self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>> {
        Ok(self.key_taken(buyer_id, key))
    }

    async fn decrement_stock_if_available(
        &mut self,
        item_id: ItemId,
        vendor_id: VendorId,
        quantity: u32,
    ) -> Result<bool> {
        let Some(item) = self.guard.items.get(&item_id) else {
            return Ok(false);
        };
        if item.vendor_id != vendor_id {
            return Ok(false);
        }

        let staged = self.decrements.get(&item_id).copied().unwrap_or(0);
        let remaining = item.quantity - staged;
        if remaining < quantity {
            return Ok(false);
        }

        self.decrements.insert(item_id, staged + quantity);
        Ok(true)
    }

    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<()> {
        if self.fail_on_sale_insert {
            return Err(StoreError::Unavailable(
                "sale insert rejected".to_string(),
            ));
        }
        if let Some(key) = sale.idempotency_key.as_deref()
            && self.key_taken(sale.buyer_id, key).is_some()
        {
            return Err(StoreError::DuplicateIdempotencyKey(key.to_string()));
        }

        self.sales.push(sale.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        let decrements = std::mem::take(&mut self.decrements);
        let sales = std::mem::take(&mut self.sales);

        for (item_id, quantity) in decrements {
            if let Some(item) = self.guard.items.get_mut(&item_id) {
                item.quantity -= quantity;
            }
        }
        self.guard.sales.extend(sales);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

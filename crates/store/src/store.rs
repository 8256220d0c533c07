use async_trait::async_trait;

use crate::{BuyerId, CartKey, CartLine, Item, ItemId, Result, SaleId, SaleRecord, SalesSummary, VendorId};

/// Core trait for market store implementations.
///
/// Implementations must be thread-safe and cheap to clone into every service
/// that needs them. Operations outside [`StoreTransaction`] are individually
/// atomic but never joined with one another.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// The transaction type returned by [`MarketStore::begin`].
    type Transaction: StoreTransaction;

    /// Inserts a catalog item. Used by the catalog collaborator and tests.
    async fn insert_item(&self, item: Item) -> Result<()>;

    /// Point lookup of a catalog item.
    async fn get_item(&self, item_id: ItemId) -> Result<Option<Item>>;

    /// Point lookup of a cart line.
    async fn get_cart_line(&self, key: CartKey) -> Result<Option<CartLine>>;

    /// Inserts a cart line unless one already exists for the same key.
    ///
    /// Returns `false` if nothing was inserted. The existence check and the
    /// insert happen as one storage operation.
    async fn insert_cart_line(&self, line: CartLine) -> Result<bool>;

    /// Overwrites the quantity of an existing cart line.
    ///
    /// Returns `false` if no line exists for the key.
    async fn update_cart_line_quantity(&self, key: CartKey, quantity: u32) -> Result<bool>;

    /// Deletes a cart line. Returns `false` if no line existed.
    async fn delete_cart_line(&self, key: CartKey) -> Result<bool>;

    /// Lists every cart line belonging to a buyer, in no particular order.
    async fn list_cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>>;

    /// Deletes every cart line belonging to a buyer and returns how many were removed.
    async fn clear_cart_lines(&self, buyer_id: BuyerId) -> Result<u64>;

    /// Point lookup of a sale record.
    async fn get_sale(&self, sale_id: SaleId) -> Result<Option<SaleRecord>>;

    /// Looks up a committed sale recorded by a buyer under an idempotency key.
    ///
    /// Keys are scoped to the buyer; two buyers may use the same key.
    async fn find_sale_by_idempotency_key(
        &self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>>;

    /// Lists a vendor's sales, newest first.
    async fn sales_for_vendor(&self, vendor_id: VendorId) -> Result<Vec<SaleRecord>>;

    /// Summarizes a vendor's sales, optionally restricted to one item.
    async fn sales_summary(
        &self,
        vendor_id: VendorId,
        item_id: Option<ItemId>,
    ) -> Result<SalesSummary>;

    /// Opens a transaction with at least read-committed isolation.
    ///
    /// Dropping the transaction without calling [`StoreTransaction::commit`]
    /// rolls it back.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// A unit of work spanning the conditional decrement and the sale insert.
///
/// Nothing written through a transaction is visible to other readers until
/// [`commit`](StoreTransaction::commit) returns successfully.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Looks up a sale a buyer previously recorded under an idempotency key.
    async fn find_sale_by_idempotency_key(
        &mut self,
        buyer_id: BuyerId,
        key: &str,
    ) -> Result<Option<SaleId>>;

    /// Decrements an item's quantity only if it is owned by `vendor_id` and
    /// at least `quantity` units remain.
    ///
    /// Returns `false` if no row matched, in which case nothing changed.
    async fn decrement_stock_if_available(
        &mut self,
        item_id: ItemId,
        vendor_id: VendorId,
        quantity: u32,
    ) -> Result<bool>;

    /// Inserts a sale record.
    ///
    /// Fails with `DuplicateIdempotencyKey` if the record carries a key the
    /// same buyer has already used.
    async fn insert_sale(&mut self, sale: &SaleRecord) -> Result<()>;

    /// Makes every write of this transaction durable and visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}

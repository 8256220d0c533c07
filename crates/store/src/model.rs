use chrono::{DateTime, Utc};
use common::{BuyerId, ItemId, SaleId, VendorId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry with a price and a remaining sellable quantity.
///
/// Items are owned by the vendor-management side of the marketplace. The
/// fulfillment core only ever changes `quantity`, and only through a
/// conditional decrement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub vendor_id: VendorId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl Item {
    /// Creates a new item with a fresh identifier.
    pub fn new(vendor_id: VendorId, name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            id: ItemId::new(),
            vendor_id,
            name: name.into(),
            price,
            quantity,
        }
    }
}

/// Natural key of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub buyer_id: BuyerId,
    pub vendor_id: VendorId,
    pub item_id: ItemId,
}

impl CartKey {
    pub fn new(buyer_id: BuyerId, vendor_id: VendorId, item_id: ItemId) -> Self {
        Self {
            buyer_id,
            vendor_id,
            item_id,
        }
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "buyer {} / vendor {} / item {}",
            self.buyer_id, self.vendor_id, self.item_id
        )
    }
}

/// A buyer's pending intent to purchase some quantity of one vendor's item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub buyer_id: BuyerId,
    pub vendor_id: VendorId,
    pub item_id: ItemId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(key: CartKey, quantity: u32) -> Self {
        Self {
            buyer_id: key.buyer_id,
            vendor_id: key.vendor_id,
            item_id: key.item_id,
            quantity,
        }
    }

    /// Returns the (buyer, vendor, item) key of this line.
    pub fn key(&self) -> CartKey {
        CartKey::new(self.buyer_id, self.vendor_id, self.item_id)
    }
}

/// Immutable record of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: SaleId,
    pub buyer_id: BuyerId,
    pub vendor_id: VendorId,
    pub item_id: ItemId,
    pub price_paid: Decimal,
    pub quantity_bought: u32,
    pub created_at: DateTime<Utc>,

    /// Caller-supplied key used to collapse repeated submissions.
    pub idempotency_key: Option<String>,
}

impl SaleRecord {
    /// Returns `price_paid * quantity_bought`.
    pub fn total(&self) -> Decimal {
        self.price_paid * Decimal::from(self.quantity_bought)
    }
}

/// Aggregated view over a set of sale records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub sale_count: u64,
    pub units_sold: u64,
    pub revenue: Decimal,
}

impl SalesSummary {
    /// Folds a set of sale records into a summary.
    pub fn from_sales<'a>(sales: impl IntoIterator<Item = &'a SaleRecord>) -> Self {
        sales
            .into_iter()
            .fold(SalesSummary::default(), |mut summary, sale| {
                summary.sale_count += 1;
                summary.units_sold += u64::from(sale.quantity_bought);
                summary.revenue += sale.total();
                summary
            })
    }
}

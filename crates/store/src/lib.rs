//! Storage facade for the marketplace fulfillment core.
//!
//! The [`MarketStore`] trait covers point lookups, the cart table and sale
//! reporting; [`StoreTransaction`] covers the atomic purchase unit
//! (conditional stock decrement plus sale insert).

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BuyerId, ItemId, SaleId, VendorId};
pub use error::{Result, StoreError};
pub use memory::InMemoryMarketStore;
pub use model::{CartKey, CartLine, Item, SaleRecord, SalesSummary};
pub use postgres::PostgresMarketStore;
pub use store::{MarketStore, StoreTransaction};

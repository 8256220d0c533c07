//! Domain layer for the marketplace fulfillment core.
//!
//! This crate provides:
//! - [`CartService`], which keeps at most one cart line per (buyer, vendor, item)
//! - [`PurchaseService`], which validates a purchase and atomically decrements
//!   stock while recording the sale
//! - [`SalesService`], read-only vendor reporting over recorded sales

pub mod cart;
pub mod config;
pub mod decimal;
pub mod error;
pub mod purchase;
pub mod sales;

pub use cart::CartService;
pub use config::ServiceConfig;
pub use decimal::amounts_equal;
pub use error::{ConflictReason, ErrorKind, MarketError, NotFound};
pub use purchase::{PurchaseRequest, PurchaseService};
pub use sales::SalesService;

//! Domain error types.

use common::{ItemId, SaleId};
use store::{CartKey, StoreError};
use thiserror::Error;

/// Errors that can occur during marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The referenced item, cart line or sale does not exist.
    #[error("Not found: {0}")]
    NotFound(NotFound),

    /// A business rule rejected the request.
    #[error("Conflict: {0}")]
    Conflict(ConflictReason),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A storage call did not finish within the configured timeout.
    #[error("Timed out during {operation}")]
    Timeout { operation: &'static str },
}

/// The entity a [`MarketError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    Item(ItemId),
    CartLine(CartKey),
    Sale(SaleId),
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotFound::Item(id) => write!(f, "item {id}"),
            NotFound::CartLine(key) => write!(f, "cart line ({key})"),
            NotFound::Sale(id) => write!(f, "sale {id}"),
        }
    }
}

/// Business rule behind a [`MarketError::Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ConflictReason {
    #[error("duplicate cart line")]
    DuplicateCartLine,

    #[error("vendor mismatch")]
    VendorMismatch,

    #[error("amount mismatch")]
    AmountMismatch,

    #[error("insufficient stock")]
    InsufficientStock,
}

impl ConflictReason {
    /// Short label used for logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::DuplicateCartLine => "duplicate_cart_line",
            ConflictReason::VendorMismatch => "vendor_mismatch",
            ConflictReason::AmountMismatch => "amount_mismatch",
            ConflictReason::InsufficientStock => "insufficient_stock",
        }
    }
}

/// Coarse classification that transports map onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Internal,
}

impl MarketError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::NotFound(_) => ErrorKind::NotFound,
            MarketError::Conflict(_) => ErrorKind::Conflict,
            MarketError::Invalid(_) => ErrorKind::Invalid,
            MarketError::Store(_) | MarketError::Timeout { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the conflict reason, if this is a conflict.
    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            MarketError::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }

    /// True when resubmitting the same request may succeed and is known to
    /// have had no side effect.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Conflict(ConflictReason::InsufficientStock))
    }
}

impl From<ConflictReason> for MarketError {
    fn from(reason: ConflictReason) -> Self {
        MarketError::Conflict(reason)
    }
}

impl From<NotFound> for MarketError {
    fn from(entity: NotFound) -> Self {
        MarketError::NotFound(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_messages_name_the_rule() {
        let err = MarketError::from(ConflictReason::InsufficientStock);
        assert_eq!(err.to_string(), "Conflict: insufficient stock");
        assert_eq!(
            MarketError::from(ConflictReason::VendorMismatch).to_string(),
            "Conflict: vendor mismatch"
        );
    }

    #[test]
    fn kinds_group_store_failures_as_internal() {
        let store_err = MarketError::from(StoreError::Unavailable("down".to_string()));
        assert_eq!(store_err.kind(), ErrorKind::Internal);
        assert_eq!(
            MarketError::Timeout { operation: "get_item" }.kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            MarketError::from(NotFound::Item(ItemId::new())).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn only_stock_exhaustion_is_retryable() {
        assert!(MarketError::from(ConflictReason::InsufficientStock).is_retryable());
        assert!(!MarketError::from(ConflictReason::AmountMismatch).is_retryable());
        assert!(!MarketError::Invalid("zero quantity".to_string()).is_retryable());
    }
}

//! Caller identity supplied by the upstream authenticating gateway.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{BuyerId, VendorId};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the verified id of the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Tokens are verified upstream; this only reads
/// the id the gateway forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

impl Caller {
    /// Fails unless the caller is the given buyer.
    pub fn require_buyer(&self, buyer_id: BuyerId) -> Result<(), ApiError> {
        self.require(buyer_id.as_uuid(), "buyer")
    }

    /// Fails unless the caller is the given vendor.
    pub fn require_vendor(&self, vendor_id: VendorId) -> Result<(), ApiError> {
        self.require(vendor_id.as_uuid(), "vendor")
    }

    fn require(&self, owner: Uuid, role: &str) -> Result<(), ApiError> {
        if self.0 != owner {
            tracing::warn!(caller = %self.0, %owner, role, "caller does not own resource");
            return Err(ApiError::Forbidden(format!("caller is not this {role}")));
        }
        Ok(())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_ID_HEADER} header")))?;

        let value = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_ID_HEADER} header")))?;

        Uuid::parse_str(value.trim())
            .map(Caller)
            .map_err(|e| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER} header: {e}")))
    }
}

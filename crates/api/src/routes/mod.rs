//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod purchases;
pub mod sales;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses an id from a path segment or body field.
fn parse_id<T>(field: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}

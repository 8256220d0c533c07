//! Exact comparison of monetary amounts.

use rust_decimal::Decimal;

/// Compares two amounts for exact numeric equality, independent of scale.
///
/// `1.50` stored as mantissa 150 at scale 2 equals `1.5` stored as mantissa
/// 15 at scale 1. Both sides are normalized (trailing zeros stripped, negative
/// zero folded into zero) before mantissa and scale are compared.
pub fn amounts_equal(a: Decimal, b: Decimal) -> bool {
    let a = a.normalize();
    let b = b.normalize();
    a.mantissa() == b.mantissa() && a.scale() == b.scale()
}

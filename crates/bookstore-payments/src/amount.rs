//! Price Conversion
//!
//! Catalog prices are decimal NEAR. The gateway settles in yoctoNEAR
//! (10^24 per NEAR). Conversion happens in two stages: the price is rounded
//! to micro-NEAR (10^6) first, then the integer is scaled by 10^18. Rounding
//! therefore always happens at six decimal places, never on the 24-digit
//! value.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{PaymentError, Result};

/// Micro-units per reference unit
pub const MICRO_SCALE: u32 = 1_000_000;

/// Base units per micro-unit
pub const BASE_PER_MICRO: u128 = 1_000_000_000_000_000_000;

/// Convert a reference-unit price into integer settlement units
pub fn to_settlement_units(price: Decimal) -> Result<u128> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(PaymentError::Amount(format!("negative price {price}")));
    }

    let micro = price
        .checked_mul(Decimal::from(MICRO_SCALE))
        .ok_or_else(|| PaymentError::Amount(format!("price {price} overflows")))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u128()
        .ok_or_else(|| PaymentError::Amount(format!("price {price} is not representable")))?;

    micro
        .checked_mul(BASE_PER_MICRO)
        .ok_or_else(|| PaymentError::Amount(format!("price {price} overflows")))
}

//! Monetary amounts and the arithmetic the ledger relies on.
//!
//! Amounts are `i64` in minor currency units (hundredths): a unit cost of
//! 50.00 is stored as `5000`. Multiplication widens to `i128` and reports
//! overflow as a domain error instead of wrapping.

use crate::error::{DomainError, DomainResult};

/// Minor units per currency unit.
pub const MINOR_UNITS: i64 = 100;

/// Settlement rounding tolerance: half a currency unit. An invoice whose
/// open balance is at or below this counts as fully paid.
pub const PAID_TOLERANCE: i64 = MINOR_UNITS / 2;

/// `qty * unit_amount` as a line total.
pub fn line_total(qty: i64, unit_amount: i64) -> DomainResult<i64> {
    let wide = i128::from(qty) * i128::from(unit_amount);
    i64::try_from(wide).map_err(|_| DomainError::integrity("line total overflows amount range"))
}

/// Checked addition for running totals.
pub fn add_amounts(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::integrity("amount overflows representable range"))
}

/// Checked subtraction for running totals.
pub fn sub_amounts(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_sub(b)
        .ok_or_else(|| DomainError::integrity("amount overflows representable range"))
}

/// VAT-exclusive part of a VAT-inclusive total.
///
/// `vat_rate_bp` is the rate in basis points (1825 = 18.25%). Rounds to the
/// nearest minor unit, half away from zero.
pub fn excl_vat(total_incl: i64, vat_rate_bp: u32) -> i64 {
    if vat_rate_bp == 0 {
        return total_incl;
    }
    let denom = 10_000_i128 + i128::from(vat_rate_bp);
    let num = i128::from(total_incl) * 10_000;
    let rounded = if num >= 0 {
        (num + denom / 2) / denom
    } else {
        (num - denom / 2) / denom
    };
    // magnitude never exceeds the input for a non-negative rate
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_qty_by_unit_amount() {
        assert_eq!(line_total(10, 5000), Ok(50_000));
        assert_eq!(line_total(3, 0), Ok(0));
    }

    #[test]
    fn line_total_reports_overflow() {
        let err = line_total(i64::MAX, 2).unwrap_err();
        assert!(matches!(err, DomainError::Integrity(_)));
    }

    #[test]
    fn running_total_helpers_are_checked() {
        assert_eq!(add_amounts(40, 2), Ok(42));
        assert_eq!(sub_amounts(40, 2), Ok(38));
        assert!(matches!(
            add_amounts(i64::MAX, 1),
            Err(DomainError::Integrity(_))
        ));
        assert!(matches!(
            sub_amounts(i64::MIN, 1),
            Err(DomainError::Integrity(_))
        ));
    }

    #[test]
    fn excl_vat_splits_an_inclusive_total() {
        // 1180.00 at 18% -> 1000.00 excl
        assert_eq!(excl_vat(118_000, 1800), 100_000);
        // zero rate passes through
        assert_eq!(excl_vat(5000, 0), 5000);
        // rounds to the nearest minor unit: 100.00 at 18% -> 84.75
        assert_eq!(excl_vat(10_000, 1800), 8475);
    }

    #[test]
    fn paid_tolerance_is_half_a_unit() {
        assert_eq!(PAID_TOLERANCE, 50);
    }
}

//! Money rules shared by components, builds and receipts.
//!
//! Unit prices are stored as `NUMERIC(12, 2)`: at most two decimal places and
//! ten integer digits. Subtotals and totals use checked arithmetic so an
//! out-of-range product surfaces as [`PriceOverflow`] instead of a panic.

use rust_decimal::Decimal;
use thiserror::Error;

pub const PRICE_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("price arithmetic exceeds the supported range")]
pub struct PriceOverflow;

/// Largest storable unit price, 9999999999.99.
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, PRICE_SCALE)
}

/// Every rule a unit price breaks; empty when the price is storable.
pub fn price_problems(price: Decimal) -> Vec<String> {
    let mut problems = Vec::new();
    if price <= Decimal::ZERO {
        problems.push(format!("price must be greater than zero, got {price}"));
    }
    if price > max_price() {
        problems.push(format!("price must not exceed {}, got {price}", max_price()));
    }
    if price.normalize().scale() > PRICE_SCALE {
        problems.push(format!(
            "price must have at most {PRICE_SCALE} decimal places, got {price}"
        ));
    }
    problems
}

pub fn line_subtotal(unit_price: Decimal, quantity: i32) -> Result<Decimal, PriceOverflow> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or(PriceOverflow)
}

/// Derived build price; never stored.
pub fn total_price<I>(lines: I) -> Result<Decimal, PriceOverflow>
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (price, quantity)| {
            total
                .checked_add(line_subtotal(price, quantity)?)
                .ok_or(PriceOverflow)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_price_sums_subtotals() {
        let total = total_price([
            (Decimal::new(19_999, 2), 2),
            (Decimal::new(5_050, 2), 1),
        ]);

        assert_eq!(total, Ok(Decimal::new(45_048, 2)));
    }

    #[test]
    fn overflowing_products_are_reported() {
        assert_eq!(line_subtotal(Decimal::MAX, 2), Err(PriceOverflow));
        assert_eq!(
            total_price([(Decimal::MAX, 1), (Decimal::MAX, 1)]),
            Err(PriceOverflow)
        );
    }

    #[test]
    fn largest_price_times_largest_quantity_fits() {
        let subtotal = line_subtotal(max_price(), i32::MAX).expect("in range");
        assert!(subtotal > max_price());
    }

    #[test]
    fn price_bounds_and_scale_are_checked() {
        assert!(price_problems(Decimal::new(38_000, 2)).is_empty());
        assert!(price_problems(max_price()).is_empty());
        assert!(price_problems(Decimal::new(1_000, 3)).is_empty());

        assert_eq!(price_problems(Decimal::ZERO).len(), 1);
        assert_eq!(price_problems(Decimal::MAX).len(), 1);
        assert_eq!(price_problems(Decimal::new(1_999, 3)).len(), 1);
        assert_eq!(price_problems(Decimal::new(-1_999, 3)).len(), 2);
    }
}

//! Order sizing shared by every concrete agent variant (spec.md §4.7
//! "Order sizing across all variants").

use market_core::Side;

/// `clamp(capital_fraction * cash / price, 1, max_order_size)`, then reduced
/// (buy) or capped (sell) against available capital / short limit. Returns
/// `None` when no order can be placed at all (insufficient cash, or already
/// at the short cap).
#[allow(clippy::too_many_arguments)]
pub fn size_order(
    side: Side,
    cash: f64,
    position: f64,
    price: f64,
    capital_fraction: f64,
    max_order_size: f64,
    cash_reserve: f64,
    max_short: f64,
) -> Option<f64> {
    if price <= 0.0 || cash <= 0.0 || max_order_size <= 0.0 {
        return None;
    }

    let mut qty = (capital_fraction * cash / price).clamp(1.0, max_order_size);

    match side {
        Side::Buy => {
            let available = cash * (1.0 - cash_reserve).max(0.0);
            let required = qty * price;
            if required > available {
                qty = (available / price).max(0.0);
            }
            if qty < 1.0 || qty * price > cash {
                return None;
            }
        }
        Side::Sell => {
            let max_sellable = position + max_short;
            if max_sellable <= 0.0 {
                return None;
            }
            qty = qty.min(max_sellable);
            if qty < 1.0 {
                return None;
            }
        }
    }

    Some(qty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_is_reduced_to_available_capital() {
        let qty = size_order(Side::Buy, 100.0, 0.0, 50.0, 0.9, 1000.0, 0.5, 0.0).unwrap();
        assert!(qty * 50.0 <= 100.0 * 0.5 + 1e-9);
    }

    #[test]
    fn buy_refused_when_cash_exhausted() {
        assert!(size_order(Side::Buy, 0.0, 0.0, 50.0, 0.9, 1000.0, 0.1, 0.0).is_none());
    }

    #[test]
    fn sell_capped_by_short_limit() {
        let qty = size_order(Side::Sell, 1000.0, 0.0, 10.0, 0.9, 1000.0, 0.1, 5.0).unwrap();
        assert!(qty <= 5.0 + 1e-9);
    }

    #[test]
    fn sell_refused_at_short_cap() {
        assert!(size_order(Side::Sell, 1000.0, -5.0, 10.0, 0.9, 1000.0, 0.1, 5.0).is_none());
    }

    #[test]
    fn qty_never_exceeds_max_order_size() {
        let qty = size_order(Side::Buy, 1_000_000.0, 0.0, 1.0, 1.0, 100.0, 0.0, 0.0).unwrap();
        assert!(qty <= 100.0);
    }
}

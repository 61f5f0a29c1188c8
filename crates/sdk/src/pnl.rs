use crate::{
    constants::TOTAL_WEIGHT,
    types::{Portfolio, PriceSnapshot},
};

/// Check that the weights of `portfolio` sum to exactly 100.
pub fn validate_allocations(portfolio: &Portfolio) -> crate::Result<()> {
    let total = portfolio.total_weight();
    let overweight = portfolio
        .allocations
        .iter()
        .any(|a| u32::from(a.weight) > TOTAL_WEIGHT);
    if total != TOTAL_WEIGHT || overweight {
        return Err(crate::Error::InvalidAllocation {
            owner: portfolio.owner.clone(),
            total,
        });
    }
    Ok(())
}

/// Compute the weighted fractional return of `portfolio` between two snapshots.
///
/// Each allocation contributes `(end / start - 1) * weight / 100`. Allocations
/// without a price in both snapshots are skipped and contribute nothing.
///
/// # Errors
/// Returns [`Error::InvalidPriceData`](crate::Error::InvalidPriceData) if a
/// start price is not positive or if any intermediate value is not finite.
pub fn compute_pnl(
    portfolio: &Portfolio,
    start: &PriceSnapshot,
    end: &PriceSnapshot,
) -> crate::Result<f64> {
    let mut total = 0.0;
    for allocation in &portfolio.allocations {
        let asset = &allocation.asset;
        let (Some(start_price), Some(end_price)) = (start.get(asset), end.get(asset)) else {
            tracing::warn!(
                owner = %portfolio.owner,
                %asset,
                "missing start or end price, allocation is skipped"
            );
            continue;
        };

        let start_value = start_price.value();
        let end_value = end_price.value();
        if !start_value.is_finite() || !end_value.is_finite() {
            return Err(crate::Error::invalid_price(asset, "price is not finite"));
        }
        if start_value <= 0.0 {
            return Err(crate::Error::invalid_price(
                asset,
                format!("start price must be positive, got {start_value}"),
            ));
        }

        let weight = f64::from(allocation.weight) / f64::from(TOTAL_WEIGHT);
        let contribution = (end_value / start_value - 1.0) * weight;
        if !contribution.is_finite() {
            return Err(crate::Error::invalid_price(asset, "return is not finite"));
        }
        total += contribution;
        if !total.is_finite() {
            return Err(crate::Error::invalid_price(
                asset,
                format!("pnl of `{}` overflows", portfolio.owner),
            ));
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        types::{Price, TokenAllocation},
        ErrorKind,
    };

    const EPSILON: f64 = 1e-12;

    fn portfolio(allocations: &[(&str, u8)]) -> Portfolio {
        Portfolio {
            owner: "owner".to_string(),
            tournament: "tournament".to_string(),
            allocations: allocations
                .iter()
                .map(|(asset, weight)| TokenAllocation::new(*asset, *weight))
                .collect(),
        }
    }

    fn snapshot(timestamp: i64, prices: &[(&str, i64)]) -> PriceSnapshot {
        prices
            .iter()
            .fold(PriceSnapshot::new(timestamp), |snapshot, (asset, price)| {
                snapshot.with_price(*asset, Price::new(*price, 0))
            })
    }

    #[test]
    fn weighted_return() {
        let portfolio = portfolio(&[("SOL", 50), ("ETH", 50)]);
        let start = snapshot(0, &[("SOL", 100), ("ETH", 2000)]);
        let end = snapshot(1, &[("SOL", 110), ("ETH", 1900)]);
        let pnl = compute_pnl(&portfolio, &start, &end).unwrap();
        assert!((pnl - 0.025).abs() < EPSILON);
        // Deterministic.
        assert_eq!(pnl, compute_pnl(&portfolio, &start, &end).unwrap());
    }

    #[test]
    fn unchanged_prices_give_zero() {
        let portfolio = portfolio(&[("SOL", 30), ("ETH", 70)]);
        let prices = snapshot(0, &[("SOL", 100), ("ETH", 2000)]);
        assert_eq!(compute_pnl(&portfolio, &prices, &prices).unwrap(), 0.0);
    }

    #[test]
    fn doubling_gives_one() {
        let portfolio = portfolio(&[("SOL", 100)]);
        let start = snapshot(0, &[("SOL", 100)]);
        let end = snapshot(1, &[("SOL", 200)]);
        assert!((compute_pnl(&portfolio, &start, &end).unwrap() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn missing_price_is_skipped() {
        let portfolio = portfolio(&[("SOL", 50), ("BONK", 50)]);
        let start = snapshot(0, &[("SOL", 100)]);
        let end = snapshot(1, &[("SOL", 120), ("BONK", 5)]);
        let pnl = compute_pnl(&portfolio, &start, &end).unwrap();
        assert!(!pnl.is_nan());
        assert!((pnl - 0.1).abs() < EPSILON);
    }

    #[test]
    fn non_positive_start_price_is_rejected() {
        let portfolio = portfolio(&[("SOL", 100)]);
        let end = snapshot(1, &[("SOL", 120)]);
        for price in [0, -5] {
            let start = snapshot(0, &[("SOL", price)]);
            let err = compute_pnl(&portfolio, &start, &end).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPriceData);
        }
    }

    #[test]
    fn overflowing_total_is_invalid_price_data() {
        let portfolio = portfolio(&[("A", 100), ("B", 100)]);
        let start = PriceSnapshot::new(0)
            .with_price("A", Price::new(1, -10))
            .with_price("B", Price::new(1, -10));
        let end = PriceSnapshot::new(1)
            .with_price("A", Price::new(17, 297))
            .with_price("B", Price::new(17, 297));
        let err = compute_pnl(&portfolio, &start, &end).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPriceData);
        assert!(err.to_string().contains("`B`"));
    }

    #[test]
    fn exponent_is_applied() {
        let portfolio = portfolio(&[("SOL", 100)]);
        let start = PriceSnapshot::new(0).with_price("SOL", Price::new(15_000_000_000, -8));
        let end = PriceSnapshot::new(1).with_price("SOL", Price::new(165_000_000, -6));
        let pnl = compute_pnl(&portfolio, &start, &end).unwrap();
        assert!((pnl - 0.1).abs() < 1e-9);
    }

    #[test]
    fn allocations_must_sum_to_100() {
        assert!(validate_allocations(&portfolio(&[("SOL", 60), ("ETH", 40)])).is_ok());
        let err = validate_allocations(&portfolio(&[("SOL", 60), ("ETH", 30)])).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::InvalidAllocation { total: 90, .. }
        ));
        assert!(validate_allocations(&portfolio(&[])).is_err());
        assert!(validate_allocations(&portfolio(&[("SOL", 200), ("ETH", 0)])).is_err());
    }
}

use serde::Serialize;

use crate::error::AppError;

/// Kilometers billed at the first tier; everything beyond costs more.
pub const TIER_LIMIT_KM: f64 = 200.0;
const TIER_ONE_RATE_CENTS: f64 = 65.0;
const TIER_TWO_RATE_CENTS: f64 = 85.0;

/// Rounded costs below this are waived entirely.
const FREE_THRESHOLD_CENTS: i64 = 2_500;
const ROUNDING_STEP_CENTS: i64 = 500;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TravelQuote {
    pub distance_km: f64,
    pub duration_min: f64,
    pub price_eur: u32,
    pub free: bool,
}

/// One-way travel fee in whole euros. Tiered per-km cost, rounded up to the
/// next multiple of 5 €, then waived if the rounded amount is under the
/// free-travel threshold.
pub fn price(distance_km: f64) -> Result<u32, AppError> {
    if !distance_km.is_finite() || distance_km < 0.0 {
        return Err(AppError::InvalidDistance(distance_km));
    }

    let near_km = distance_km.min(TIER_LIMIT_KM);
    let far_km = (distance_km - TIER_LIMIT_KM).max(0.0);

    let raw_cents = (near_km * TIER_ONE_RATE_CENTS + far_km * TIER_TWO_RATE_CENTS).round() as i64;
    let rounded_cents =
        (raw_cents as u64).div_ceil(ROUNDING_STEP_CENTS as u64) as i64 * ROUNDING_STEP_CENTS;

    if rounded_cents < FREE_THRESHOLD_CENTS {
        return Ok(0);
    }

    Ok((rounded_cents / 100) as u32)
}

pub fn is_free(distance_km: f64) -> Result<bool, AppError> {
    Ok(price(distance_km)? == 0)
}

/// Breakeven distance under the first tier. Display only; the charge always
/// runs through the tiered formula and threshold check.
pub fn free_distance_limit_km() -> f64 {
    FREE_THRESHOLD_CENTS as f64 / TIER_ONE_RATE_CENTS
}

#[cfg(test)]
mod tests {
    use super::{free_distance_limit_km, is_free, price};
    use crate::error::AppError;

    #[test]
    fn tier_table_matches_contract() {
        let table = [
            (10.0, 0),
            (50.0, 35),
            (100.0, 65),
            (150.0, 100),
            (200.0, 130),
            (250.0, 175),
            (300.0, 215),
            (500.0, 385),
            (1000.0, 810),
        ];

        for (distance_km, expected_eur) in table {
            assert_eq!(
                price(distance_km).unwrap(),
                expected_eur,
                "price({distance_km})"
            );
        }
    }

    #[test]
    fn price_is_zero_or_a_positive_multiple_of_five() {
        for step in 0..400 {
            let distance_km = step as f64 * 2.7;
            let eur = price(distance_km).unwrap();
            assert!(eur == 0 || eur % 5 == 0, "price({distance_km}) = {eur}");
        }
    }

    #[test]
    fn price_is_monotone_in_distance() {
        let mut previous = 0;
        for step in 0..500 {
            let eur = price(step as f64 * 2.3).unwrap();
            assert!(eur >= previous);
            previous = eur;
        }
    }

    #[test]
    fn negative_distance_is_rejected() {
        assert!(matches!(price(-1.0), Err(AppError::InvalidDistance(_))));
        assert!(matches!(price(-0.001), Err(AppError::InvalidDistance(_))));
    }

    #[test]
    fn non_finite_distance_is_rejected() {
        assert!(matches!(
            price(f64::NAN),
            Err(AppError::InvalidDistance(_))
        ));
        assert!(matches!(
            price(f64::INFINITY),
            Err(AppError::InvalidDistance(_))
        ));
    }

    #[test]
    fn short_trips_are_free() {
        assert!(is_free(0.0).unwrap());
        assert!(is_free(10.0).unwrap());
        assert!(!is_free(50.0).unwrap());
    }

    #[test]
    fn free_distance_limit_is_threshold_over_tier_one_rate() {
        assert!((free_distance_limit_km() - 2_500.0 / 65.0).abs() < 1e-9);
    }
}

//! Amortization and rounding helpers shared by eligibility and refinance.

/// Longest term accepted anywhere in the engine (50 years).
pub const MAX_TERM_MONTHS: u32 = 600;

/// Level monthly payment for a fully amortizing loan.
///
/// `term_months` must be positive; a zero rate degrades to straight-line
/// repayment.
pub fn amortized_payment(principal: f64, annual_rate_percent: f64, term_months: u32) -> f64 {
    debug_assert!(term_months > 0, "term must be positive");
    let periods = f64::from(term_months.max(1));
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;

    if monthly_rate <= 0.0 {
        return principal / periods;
    }

    let growth = (1.0 + monthly_rate).powf(periods);
    principal * monthly_rate * growth / (growth - 1.0)
}

/// [`amortized_payment`] that refuses to hand back `inf` or `NaN`.
pub fn checked_payment(principal: f64, annual_rate_percent: f64, term_months: u32) -> Option<f64> {
    let payment = amortized_payment(principal, annual_rate_percent, term_months);
    payment.is_finite().then_some(payment)
}

/// Whole currency units, halves rounded up.
pub fn round_currency(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Two decimal places, halves rounded up.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_textbook_mortgage_payment() {
        // 200k at 6% over 30 years.
        let payment = amortized_payment(200_000.0, 6.0, 360);
        assert!((payment - 1_199.10).abs() < 0.01, "payment was {payment}");
    }

    #[test]
    fn zero_rate_is_straight_line() {
        assert_eq!(amortized_payment(12_000.0, 0.0, 12), 1_000.0);
    }

    #[test]
    fn overflowing_terms_yield_no_payment() {
        assert!(amortized_payment(700_000.0, 5.0, 1_000_000).is_nan());
        assert_eq!(checked_payment(700_000.0, 5.0, 1_000_000), None);
        assert!(checked_payment(700_000.0, 5.0, MAX_TERM_MONTHS).is_some());
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_currency(1_234.5), 1_235.0);
        assert_eq!(round_currency(1_234.49), 1_234.0);
        assert_eq!(round_currency(-10.5), -10.0);
        assert_eq!(round_percent(33.336), 33.34);
        assert_eq!(round_percent(33.334), 33.33);
        assert_eq!(round_percent(42.0), 42.0);
    }
}

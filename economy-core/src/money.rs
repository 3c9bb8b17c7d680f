//! Fixed-precision money arithmetic
//!
//! Every amount in the system passes through [`MoneyContext::clamp`] before it
//! is stored, compared, or displayed, so two nodes computing the same mutation
//! always agree on the resulting digits.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::CurrencyConfig;

/// Rounding policy applied when an amount is clamped to the configured scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingPolicy {
    /// Truncate toward zero
    Down,
    /// Round away from zero
    Up,
    /// Round half away from zero
    HalfUp,
}

impl RoundingPolicy {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingPolicy::Down => RoundingStrategy::ToZero,
            RoundingPolicy::Up => RoundingStrategy::AwayFromZero,
            RoundingPolicy::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

/// Shared money rules: scale, rounding policy, balance ceiling
#[derive(Debug, Clone)]
pub struct MoneyContext {
    places: u32,
    rounding: RoundingPolicy,
    max_balance: Decimal,
}

impl MoneyContext {
    /// Build a context from the currency configuration
    pub fn new(cfg: &CurrencyConfig) -> Self {
        let places = if cfg.integer_balance { 0 } else { cfg.decimal_places };
        Self {
            places,
            rounding: cfg.rounding,
            max_balance: cfg.max_balance.round_dp_with_strategy(places, cfg.rounding.strategy()),
        }
    }

    /// Configured fractional digits
    pub fn places(&self) -> u32 {
        self.places
    }

    /// Balance ceiling
    pub fn max_balance(&self) -> Decimal {
        self.max_balance
    }

    /// Round an amount to the configured scale under the configured policy
    pub fn clamp(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.places, self.rounding.strategy())
    }

    /// Round half-up at the configured scale regardless of policy
    ///
    /// Used for derived charges such as tax, which the original system always
    /// rounded half-up.
    pub fn clamp_half_up(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.places, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Force a balance into `[0, max_balance]` after clamping
    pub fn bound(&self, amount: Decimal) -> Decimal {
        let clamped = self.clamp(amount);
        if clamped < Decimal::ZERO {
            Decimal::ZERO
        } else if clamped > self.max_balance {
            self.max_balance
        } else {
            clamped
        }
    }

    /// Would this balance sit at or above the ceiling?
    pub fn at_ceiling(&self, balance: Decimal) -> bool {
        balance >= self.max_balance
    }

    /// Would adding `amount` to `balance` exceed the ceiling?
    pub fn exceeds_ceiling(&self, balance: Decimal, amount: Decimal) -> bool {
        balance + amount > self.max_balance
    }

    /// Sum with re-clamping
    pub fn add(&self, a: Decimal, b: Decimal) -> Decimal {
        self.clamp(a + b)
    }

    /// Difference with re-clamping
    pub fn sub(&self, a: Decimal, b: Decimal) -> Decimal {
        self.clamp(a - b)
    }

    /// Product with re-clamping
    pub fn mul(&self, a: Decimal, b: Decimal) -> Decimal {
        self.clamp(a * b)
    }

    /// Quotient with re-clamping; division by zero yields zero
    pub fn div(&self, a: Decimal, b: Decimal) -> Decimal {
        if b.is_zero() {
            Decimal::ZERO
        } else {
            self.clamp(a / b)
        }
    }

    /// Render a clamped amount with thousands grouping
    pub fn format(&self, amount: Decimal) -> String {
        let clamped = self.clamp(amount);
        let text = format!("{:.*}", self.places as usize, clamped);

        let (sign, rest) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text.as_str()),
        };
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (rest, None),
        };

        let mut grouped = String::with_capacity(text.len() + int_part.len() / 3);
        let digits: Vec<char> = int_part.chars().collect();
        for (i, ch) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(*ch);
        }

        match frac_part {
            Some(f) => format!("{}{}.{}", sign, grouped, f),
            None => format!("{}{}", sign, grouped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CurrencyConfig;
    use std::str::FromStr;

    fn ctx(rounding: RoundingPolicy) -> MoneyContext {
        MoneyContext::new(&CurrencyConfig {
            rounding,
            ..CurrencyConfig::default()
        })
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_clamp_down() {
        let m = ctx(RoundingPolicy::Down);
        assert_eq!(m.clamp(dec("1.999")), dec("1.99"));
        assert_eq!(m.clamp(dec("-1.999")), dec("-1.99"));
    }

    #[test]
    fn test_clamp_up() {
        let m = ctx(RoundingPolicy::Up);
        assert_eq!(m.clamp(dec("1.001")), dec("1.01"));
    }

    #[test]
    fn test_clamp_half_up() {
        let m = ctx(RoundingPolicy::HalfUp);
        assert_eq!(m.clamp(dec("1.005")), dec("1.01"));
        assert_eq!(m.clamp(dec("1.004")), dec("1.00"));
    }

    #[test]
    fn test_integer_balance_forces_zero_places() {
        let m = MoneyContext::new(&CurrencyConfig {
            integer_balance: true,
            rounding: RoundingPolicy::Down,
            ..CurrencyConfig::default()
        });
        assert_eq!(m.places(), 0);
        assert_eq!(m.clamp(dec("12.99")), dec("12"));
    }

    #[test]
    fn test_ceiling_predicates() {
        let m = MoneyContext::new(&CurrencyConfig {
            max_balance: dec("100"),
            ..CurrencyConfig::default()
        });
        assert!(m.at_ceiling(dec("100")));
        assert!(!m.at_ceiling(dec("99.99")));
        assert!(m.exceeds_ceiling(dec("99"), dec("1.01")));
        assert!(!m.exceeds_ceiling(dec("99"), dec("1")));
    }

    #[test]
    fn test_bound() {
        let m = MoneyContext::new(&CurrencyConfig {
            max_balance: dec("100"),
            ..CurrencyConfig::default()
        });
        assert_eq!(m.bound(dec("-5")), Decimal::ZERO);
        assert_eq!(m.bound(dec("500")), dec("100"));
        assert_eq!(m.bound(dec("42.5")), dec("42.5"));
    }

    #[test]
    fn test_div_by_zero_is_zero() {
        let m = ctx(RoundingPolicy::Down);
        assert_eq!(m.div(dec("10"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_format_grouping() {
        let m = ctx(RoundingPolicy::Down);
        assert_eq!(m.format(dec("1234567.5")), "1,234,567.50");
        assert_eq!(m.format(dec("-1234.5")), "-1,234.50");
        assert_eq!(m.format(dec("999")), "999.00");
    }
}

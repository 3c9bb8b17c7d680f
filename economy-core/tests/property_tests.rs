//! Property-based tests for money arithmetic

use economy_core::config::CurrencyConfig;
use economy_core::money::{MoneyContext, RoundingPolicy};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn any_amount() -> impl Strategy<Value = Decimal> {
    // Mantissa within i64 and a scale up to 10 fractional digits
    (any::<i64>(), 0u32..=10).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn context(rounding: RoundingPolicy) -> MoneyContext {
    MoneyContext::new(&CurrencyConfig {
        rounding,
        ..CurrencyConfig::default()
    })
}

proptest! {
    #[test]
    fn clamp_is_idempotent(amount in any_amount()) {
        for rounding in [RoundingPolicy::Down, RoundingPolicy::Up, RoundingPolicy::HalfUp] {
            let money = context(rounding);
            let once = money.clamp(amount);
            prop_assert_eq!(money.clamp(once), once);
        }
    }

    #[test]
    fn clamp_never_adds_precision(amount in any_amount()) {
        let money = context(RoundingPolicy::HalfUp);
        prop_assert!(money.clamp(amount).scale() <= money.places());
    }

    #[test]
    fn bound_stays_in_range(amount in any_amount()) {
        let money = context(RoundingPolicy::Down);
        let bounded = money.bound(amount);
        prop_assert!(bounded >= Decimal::ZERO);
        prop_assert!(bounded <= money.max_balance());
        // Bounding is idempotent too
        prop_assert_eq!(money.bound(bounded), bounded);
    }

    #[test]
    fn add_then_sub_roundtrips_clamped_values(a in any_amount(), b in any_amount()) {
        let money = context(RoundingPolicy::HalfUp);
        let a = money.clamp(a);
        let b = money.clamp(b);
        prop_assert_eq!(money.sub(money.add(a, b), b), a);
    }
}

//! Transfer tax assessment

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use economy_core::MoneyContext;

use crate::config::TaxConfig;

/// Tax policy: rate, exemptions, optional collection account
pub struct TaxPolicy {
    enabled: bool,
    rate: Decimal,
    receiver: Option<Uuid>,
    exempt: RwLock<HashSet<Uuid>>,
}

impl TaxPolicy {
    /// Build from configuration
    pub fn new(cfg: &TaxConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            rate: cfg.rate,
            receiver: cfg.receiver,
            exempt: RwLock::new(cfg.exempt.iter().copied().collect()),
        }
    }

    /// Identity credited with collected tax, when configured
    pub fn receiver(&self) -> Option<Uuid> {
        self.receiver
    }

    /// Is this sender exempt?
    pub fn is_exempt(&self, sender: Uuid) -> bool {
        self.exempt.read().contains(&sender)
    }

    /// Add a sender to the exemption set
    pub fn add_exempt(&self, sender: Uuid) {
        self.exempt.write().insert(sender);
    }

    /// Remove a sender from the exemption set
    pub fn remove_exempt(&self, sender: Uuid) {
        self.exempt.write().remove(&sender);
    }

    /// Tax owed by `sender` on `amount`
    ///
    /// `amount * rate / 100`, rounded half-up at the money precision. Exempt
    /// senders and a disabled policy owe zero.
    pub fn tax_for(&self, sender: Uuid, amount: Decimal, money: &MoneyContext) -> Decimal {
        if !self.enabled || self.rate <= Decimal::ZERO || self.is_exempt(sender) {
            return Decimal::ZERO;
        }
        money.clamp_half_up(amount * self.rate / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use economy_core::config::CurrencyConfig;
    use std::str::FromStr;

    fn money() -> MoneyContext {
        MoneyContext::new(&CurrencyConfig::default())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_five_percent() {
        let policy = TaxPolicy::new(&TaxConfig::default());
        let tax = policy.tax_for(Uuid::new_v4(), dec("100"), &money());
        assert_eq!(tax, dec("5.00"));
    }

    #[test]
    fn test_rounds_half_up_at_money_precision() {
        let policy = TaxPolicy::new(&TaxConfig {
            rate: dec("2.5"),
            ..TaxConfig::default()
        });
        // 12.30 * 2.5% = 0.3075 -> 0.31
        assert_eq!(policy.tax_for(Uuid::new_v4(), dec("12.30"), &money()), dec("0.31"));
    }

    #[test]
    fn test_exemption_forces_zero() {
        let sender = Uuid::new_v4();
        let policy = TaxPolicy::new(&TaxConfig {
            exempt: vec![sender],
            ..TaxConfig::default()
        });
        assert_eq!(policy.tax_for(sender, dec("100"), &money()), Decimal::ZERO);
        assert_eq!(policy.tax_for(Uuid::new_v4(), dec("100"), &money()), dec("5.00"));

        policy.remove_exempt(sender);
        assert_eq!(policy.tax_for(sender, dec("100"), &money()), dec("5.00"));
    }

    #[test]
    fn test_disabled_policy_charges_nothing() {
        let policy = TaxPolicy::new(&TaxConfig {
            enabled: false,
            ..TaxConfig::default()
        });
        assert_eq!(policy.tax_for(Uuid::new_v4(), dec("100"), &money()), Decimal::ZERO);
    }
}

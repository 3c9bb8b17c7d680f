//! Pre-commit balance interceptors
//!
//! Every balance mutation passes through the registered interceptors after
//! validation and before commit. Interceptors run synchronously in
//! registration order; the first cancel wins, and each adjustment is visible
//! to the interceptors after it.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::ChangeReason;

/// What an interceptor sees for a proposed mutation
#[derive(Debug, Clone)]
pub struct MutationContext {
    /// Affected identity
    pub identity: Uuid,
    /// Display name
    pub name: String,
    /// Balance before the mutation
    pub old_balance: Decimal,
    /// Proposed balance after the mutation
    pub new_balance: Decimal,
    /// Requested amount (negative for withdrawals)
    pub amount: Decimal,
    /// Why the balance is changing
    pub reason: ChangeReason,
}

/// Interceptor verdict on a proposed mutation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HookOutcome {
    /// Accept the mutation as proposed
    Proceed,
    /// Accept, but commit this balance instead
    Adjust(Decimal),
    /// Reject the mutation
    Cancel,
}

/// A pre-commit balance interceptor
pub trait BalanceInterceptor: Send + Sync {
    /// Inspect a proposed mutation before it commits
    fn before_change(&self, ctx: &MutationContext) -> HookOutcome;
}

/// Ordered interceptor registry
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: RwLock<Vec<Arc<dyn BalanceInterceptor>>>,
}

impl InterceptorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; evaluation follows registration order
    pub fn register(&self, interceptor: Arc<dyn BalanceInterceptor>) {
        self.interceptors.write().push(interceptor);
    }

    /// Run the chain; `None` means some interceptor cancelled
    pub fn evaluate(&self, mut ctx: MutationContext) -> Option<Decimal> {
        for interceptor in self.interceptors.read().iter() {
            match interceptor.before_change(&ctx) {
                HookOutcome::Proceed => {}
                HookOutcome::Adjust(balance) => ctx.new_balance = balance,
                HookOutcome::Cancel => return None,
            }
        }
        Some(ctx.new_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(HookOutcome);

    impl BalanceInterceptor for Fixed {
        fn before_change(&self, _ctx: &MutationContext) -> HookOutcome {
            self.0
        }
    }

    struct Doubler;

    impl BalanceInterceptor for Doubler {
        fn before_change(&self, ctx: &MutationContext) -> HookOutcome {
            HookOutcome::Adjust(ctx.new_balance * Decimal::from(2))
        }
    }

    fn ctx(new_balance: i64) -> MutationContext {
        MutationContext {
            identity: Uuid::new_v4(),
            name: "Steve".to_string(),
            old_balance: Decimal::ZERO,
            new_balance: Decimal::from(new_balance),
            amount: Decimal::from(new_balance),
            reason: ChangeReason::Admin,
        }
    }

    #[test]
    fn test_empty_registry_proceeds() {
        let registry = InterceptorRegistry::new();
        assert_eq!(registry.evaluate(ctx(10)), Some(Decimal::from(10)));
    }

    #[test]
    fn test_adjustments_stack_in_order() {
        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(Doubler));
        registry.register(Arc::new(Doubler));
        assert_eq!(registry.evaluate(ctx(10)), Some(Decimal::from(40)));
    }

    #[test]
    fn test_first_cancel_wins() {
        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(Fixed(HookOutcome::Cancel)));
        registry.register(Arc::new(Doubler));
        assert_eq!(registry.evaluate(ctx(10)), None);
    }

    #[test]
    fn test_later_interceptor_sees_earlier_adjustment() {
        struct AssertSees(Decimal);
        impl BalanceInterceptor for AssertSees {
            fn before_change(&self, ctx: &MutationContext) -> HookOutcome {
                assert_eq!(ctx.new_balance, self.0);
                HookOutcome::Proceed
            }
        }

        let registry = InterceptorRegistry::new();
        registry.register(Arc::new(Doubler));
        registry.register(Arc::new(AssertSees(Decimal::from(20))));
        assert_eq!(registry.evaluate(ctx(10)), Some(Decimal::from(20)));
    }
}

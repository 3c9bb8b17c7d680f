//! Two-leg transfer protocol
//!
//! A transfer is a withdraw on the sender followed by a deposit on the
//! receiver. The pair is not atomic across accounts: if the deposit leg
//! fails, a compensating admin-reason deposit returns the withdrawn amount
//! (tax included) to the sender as a new mutation, never an undo.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use economy_core::engine::OpError;
use economy_core::types::{now_millis, ChangeReason, TransactionRecord};
use economy_core::EconomyEngine;

use crate::config::TransferConfig;
use crate::tax::TaxPolicy;

/// What a transfer hook sees before the legs run
#[derive(Debug, Clone)]
pub struct TransferContext {
    /// Sending identity
    pub sender: Uuid,
    /// Sender display name
    pub sender_name: String,
    /// Receiving identity
    pub receiver: Uuid,
    /// Receiver display name
    pub receiver_name: String,
    /// Amount the receiver would be credited
    pub amount: Decimal,
    /// Tax the sender would pay on top
    pub tax: Decimal,
}

/// Hook verdict on a proposed transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferDecision {
    /// Run the transfer as proposed
    Proceed,
    /// Run it with these figures instead
    Adjust {
        /// Replacement amount
        amount: Decimal,
        /// Replacement tax
        tax: Decimal,
    },
    /// Reject the transfer
    Cancel,
}

/// A pre-flight transfer hook
pub trait TransferHook: Send + Sync {
    /// Inspect a proposed transfer before any leg runs
    fn before_transfer(&self, ctx: &TransferContext) -> TransferDecision;
}

/// A completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    /// Amount credited to the receiver
    pub amount: Decimal,
    /// Tax paid by the sender
    pub tax: Decimal,
    /// Sender balance after both legs
    pub sender_balance: Decimal,
    /// Receiver balance after both legs
    pub receiver_balance: Decimal,
}

/// The transfer protocol
pub struct TransferProtocol {
    engine: Arc<EconomyEngine>,
    tax: TaxPolicy,
    cfg: TransferConfig,
    hooks: RwLock<Vec<Arc<dyn TransferHook>>>,
}

impl TransferProtocol {
    /// Build over the engine
    pub fn new(engine: Arc<EconomyEngine>, cfg: TransferConfig) -> Self {
        let tax = TaxPolicy::new(&cfg.tax);
        Self {
            engine,
            tax,
            cfg,
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Tax policy in force
    pub fn tax_policy(&self) -> &TaxPolicy {
        &self.tax
    }

    /// Register a transfer hook; evaluation follows registration order
    pub fn register_hook(&self, hook: Arc<dyn TransferHook>) {
        self.hooks.write().push(hook);
    }

    /// Move `amount` from `sender` to `receiver`
    pub async fn transfer(
        &self,
        sender: Uuid,
        receiver: Uuid,
        amount: Decimal,
    ) -> std::result::Result<TransferOutcome, OpError> {
        if sender == receiver {
            return Err(OpError::SelfTransferNotAllowed);
        }

        let money = self.engine.money().clone();
        let amount = money.clamp(amount);
        if amount <= Decimal::ZERO {
            return Err(OpError::InvalidAmount);
        }
        if amount < self.cfg.min_amount || amount > self.cfg.max_amount {
            return Err(OpError::AmountOutOfBounds {
                min: self.cfg.min_amount,
                max: self.cfg.max_amount,
            });
        }

        let mut tax = self.tax.tax_for(sender, amount, &money);
        let mut amount = amount;

        let sender_account = self.engine.cache().get(sender).await.map_err(unavailable)?;
        let receiver_account = self.engine.cache().get(receiver).await.map_err(unavailable)?;
        let sender_name = sender_account.name();
        let receiver_name = receiver_account.name();

        // Funds check against the pre-hook figures
        if sender_account.balance() < amount + tax {
            return Err(OpError::InsufficientFunds);
        }

        let mut ctx = TransferContext {
            sender,
            sender_name: sender_name.clone(),
            receiver,
            receiver_name: receiver_name.clone(),
            amount,
            tax,
        };
        for hook in self.hooks.read().iter() {
            match hook.before_transfer(&ctx) {
                TransferDecision::Proceed => {}
                TransferDecision::Adjust {
                    amount: adjusted_amount,
                    tax: adjusted_tax,
                } => {
                    ctx.amount = money.clamp(adjusted_amount);
                    ctx.tax = money.clamp(adjusted_tax);
                }
                TransferDecision::Cancel => return Err(OpError::Cancelled),
            }
        }
        amount = ctx.amount;
        tax = ctx.tax;
        if amount <= Decimal::ZERO || tax < Decimal::ZERO {
            return Err(OpError::InvalidAmount);
        }

        let total = money.add(amount, tax);
        let withdrawn = self
            .engine
            .withdraw(sender, total, ChangeReason::Payment, None)
            .await?;

        let deposited = match self
            .engine
            .deposit(receiver, amount, ChangeReason::PaymentReceived, None)
            .await
        {
            Ok(committed) => committed,
            Err(e) => {
                warn!(
                    %sender, %receiver, %amount,
                    "deposit leg failed ({}), compensating sender", e
                );
                if let Err(comp) = self
                    .engine
                    .deposit(sender, total, ChangeReason::Admin, None)
                    .await
                {
                    // The journal still holds the withdraw leg for manual repair
                    error!(%sender, %total, "compensation failed: {}", comp);
                }
                return Err(e);
            }
        };

        self.settle_tax(sender, tax).await;

        let now = now_millis();
        if self.cfg.record_transactions {
            self.engine.cache().writer().append_transaction(TransactionRecord {
                sender,
                sender_name: sender_name.clone(),
                receiver,
                receiver_name: receiver_name.clone(),
                amount,
                tax,
                timestamp: now,
            });
        }

        if self.cfg.offline_tips && !self.engine.cache().is_active(receiver) {
            self.engine
                .cache()
                .writer()
                .save_tip(receiver, sender_name.clone(), amount, now);
        }

        info!(
            %sender, %receiver, %amount, %tax,
            "transfer completed"
        );
        Ok(TransferOutcome {
            amount,
            tax,
            sender_balance: withdrawn.new_balance,
            receiver_balance: deposited.new_balance,
        })
    }

    /// Credit collected tax to the configured account, or destroy it
    async fn settle_tax(&self, sender: Uuid, tax: Decimal) {
        if tax <= Decimal::ZERO {
            return;
        }
        match self.tax.receiver() {
            Some(collector) => {
                if let Err(e) = self
                    .engine
                    .deposit(collector, tax, ChangeReason::Tax, None)
                    .await
                {
                    warn!(%collector, %tax, "tax deposit failed, tax destroyed: {}", e);
                }
            }
            None => {
                // No collection account: the tax leaves the economy
                info!(%sender, %tax, "tax destroyed");
            }
        }
    }
}

fn unavailable(e: economy_core::Error) -> OpError {
    match e {
        economy_core::Error::StoreUnavailable(_) => OpError::StoreUnavailable,
        _ => OpError::AccountNotFound,
    }
}

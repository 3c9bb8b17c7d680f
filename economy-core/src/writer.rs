//! Asynchronous write-back actor
//!
//! Mutations commit in memory; this actor makes them durable. Persistence
//! requests arrive on an unbounded mailbox so a committing caller never
//! blocks. Failed writes join a retry queue drained on a timer tick, and a
//! `Flush` request drains everything before replying.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::store::AccountStore;
use crate::types::{Account, EconomyLog, TransactionRecord};

/// One persistence request
#[derive(Debug)]
pub enum WriteOp {
    /// Persist the current state of a cached account
    SaveAccount(Arc<Account>),

    /// Append an audit journal entry
    AppendLog(EconomyLog),

    /// Append a transfer record
    AppendTransaction(TransactionRecord),

    /// Record an offline tip
    SaveTip {
        /// Receiving identity
        receiver: uuid::Uuid,
        /// Sender display name
        sender_name: String,
        /// Amount received
        amount: rust_decimal::Decimal,
        /// Epoch millis the transfer completed
        timestamp: i64,
    },
}

/// Messages understood by the writer actor
#[derive(Debug)]
enum WriterMessage {
    /// Queue a persistence request
    Op(WriteOp),

    /// Drain the mailbox and retry queue, then reply
    Flush { respond_to: oneshot::Sender<Result<()>> },

    /// Flush and stop
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// The write-back actor
struct WriterActor {
    store: Arc<AccountStore>,
    mailbox: mpsc::UnboundedReceiver<WriterMessage>,
    retry: VecDeque<WriteOp>,
    retry_interval: Duration,
    metrics: Arc<Metrics>,
}

impl WriterActor {
    async fn run(mut self) {
        info!("write-back actor started");
        let mut tick = tokio::time::interval(self.retry_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.mailbox.recv() => {
                    match msg {
                        Some(WriterMessage::Op(op)) => self.apply(op).await,
                        Some(WriterMessage::Flush { respond_to }) => {
                            let result = self.drain().await;
                            let _ = respond_to.send(result);
                        }
                        Some(WriterMessage::Shutdown { respond_to }) => {
                            if let Err(e) = self.drain().await {
                                error!("final drain failed: {}", e);
                            }
                            let _ = respond_to.send(());
                            break;
                        }
                        None => {
                            if let Err(e) = self.drain().await {
                                error!("final drain failed: {}", e);
                            }
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    self.retry_pending().await;
                }
            }
        }
        info!("write-back actor stopped");
    }

    async fn apply(&mut self, op: WriteOp) {
        if let Err(e) = self.try_apply(&op).await {
            warn!("store write failed, queued for retry: {}", e);
            self.metrics.record_write_failure();
            self.retry.push_back(op);
        }
    }

    async fn try_apply(&self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::SaveAccount(account) => {
                let snap = account.snapshot();
                self.store.save_account(&snap).await?;
                account.mark_saved(snap.updated_at);
            }
            WriteOp::AppendLog(log) => self.store.append_log(log).await?,
            WriteOp::AppendTransaction(txn) => self.store.append_transaction(txn).await?,
            WriteOp::SaveTip {
                receiver,
                sender_name,
                amount,
                timestamp,
            } => {
                self.store
                    .insert_tip(*receiver, sender_name, *amount, *timestamp)
                    .await?
            }
        }
        Ok(())
    }

    async fn retry_pending(&mut self) {
        let pending = self.retry.len();
        if pending == 0 {
            return;
        }
        debug!(pending, "retrying queued writes");
        for _ in 0..pending {
            if let Some(op) = self.retry.pop_front() {
                self.apply(op).await;
            }
        }
    }

    /// Process queued mailbox ops, then retry until the queue empties or stops
    /// shrinking.
    async fn drain(&mut self) -> Result<()> {
        while let Ok(msg) = self.mailbox.try_recv() {
            match msg {
                WriterMessage::Op(op) => self.apply(op).await,
                WriterMessage::Flush { respond_to } => {
                    let _ = respond_to.send(Ok(()));
                }
                WriterMessage::Shutdown { respond_to } => {
                    let _ = respond_to.send(());
                }
            }
        }

        loop {
            let before = self.retry.len();
            if before == 0 {
                return Ok(());
            }
            self.retry_pending().await;
            if self.retry.len() >= before {
                return Err(Error::Store(format!(
                    "{} writes still failing after flush",
                    self.retry.len()
                )));
            }
        }
    }
}

/// Handle for talking to the writer actor
#[derive(Clone)]
pub struct WriterHandle {
    sender: mpsc::UnboundedSender<WriterMessage>,
}

impl WriterHandle {
    /// Queue an account save
    pub fn save_account(&self, account: Arc<Account>) {
        self.send(WriteOp::SaveAccount(account));
    }

    /// Queue a journal append
    pub fn append_log(&self, log: EconomyLog) {
        self.send(WriteOp::AppendLog(log));
    }

    /// Queue a transfer record append
    pub fn append_transaction(&self, txn: TransactionRecord) {
        self.send(WriteOp::AppendTransaction(txn));
    }

    /// Queue an offline tip
    pub fn save_tip(
        &self,
        receiver: uuid::Uuid,
        sender_name: String,
        amount: rust_decimal::Decimal,
        timestamp: i64,
    ) {
        self.send(WriteOp::SaveTip {
            receiver,
            sender_name,
            amount,
            timestamp,
        });
    }

    fn send(&self, op: WriteOp) {
        if self.sender.send(WriterMessage::Op(op)).is_err() {
            error!("writer mailbox closed, dropping persistence request");
        }
    }

    /// Drain every queued write, waiting for the result
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Flush { respond_to: tx })
            .map_err(|_| Error::Concurrency("writer mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("writer actor dropped flush reply".to_string()))?
    }

    /// Flush and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Shutdown { respond_to: tx })
            .map_err(|_| Error::Concurrency("writer mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("writer actor dropped shutdown reply".to_string()))
    }
}

/// Spawn the write-back actor, returning its handle
pub fn spawn_writer(
    store: Arc<AccountStore>,
    retry_interval: Duration,
    metrics: Arc<Metrics>,
) -> WriterHandle {
    let (sender, mailbox) = mpsc::unbounded_channel();
    let actor = WriterActor {
        store,
        mailbox,
        retry: VecDeque::new(),
        retry_interval,
        metrics,
    };
    tokio::spawn(actor.run());
    WriterHandle { sender }
}

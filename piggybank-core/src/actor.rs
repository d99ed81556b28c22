//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns the [`Ledger`], so every operation is applied in a total order
//! - Each message is one transaction; it either commits fully or not at all
//! - Async message passing with backpressure
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   Ledger::deposit / withdraw / queries               │
//! │                       │                               │
//! │                       ▼                               │
//! │        broadcast::Sender<Notification>                │
//! │          (Deposited / Withdrawn observers)            │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::snapshot::LedgerSnapshot;
use crate::types::{AccountId, Amount, Notification};
use crate::{Error, Ledger, Metrics, Result};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Deposit into the pool
    Deposit {
        caller: AccountId,
        amount: Amount,
        response: oneshot::Sender<Result<Notification>>,
    },

    /// Withdraw from the pool
    Withdraw {
        caller: AccountId,
        amount: Amount,
        response: oneshot::Sender<Result<Notification>>,
    },

    /// Get pooled balance
    GetBalance {
        response: oneshot::Sender<Amount>,
    },

    /// Get owner credit
    GetOwnerBalance {
        response: oneshot::Sender<Amount>,
    },

    /// Get owner identity
    GetOwner {
        response: oneshot::Sender<AccountId>,
    },

    /// Get notifications after a sequence number
    GetNotifications {
        since: u64,
        response: oneshot::Sender<Vec<Notification>>,
    },

    /// Capture ledger state
    Snapshot {
        response: oneshot::Sender<LedgerSnapshot>,
    },

    /// Stop the actor and hand back its final state
    Shutdown {
        response: oneshot::Sender<LedgerSnapshot>,
    },
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// The ledger this task has exclusive access to
    ledger: Ledger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Notification fan-out
    notifications: broadcast::Sender<Notification>,

    /// Metrics
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        ledger: Ledger,
        mailbox: mpsc::Receiver<LedgerMessage>,
        notifications: broadcast::Sender<Notification>,
        metrics: Metrics,
    ) -> Self {
        metrics.update_balances(
            ledger.balance().base_units(),
            ledger.owner_balance().base_units(),
        );

        Self {
            ledger,
            mailbox,
            notifications,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        tracing::info!("Ledger actor started for owner {}", self.ledger.owner());

        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown { response } = msg {
                self.stop(response).await;
                break;
            }
            self.handle_message(msg);
        }

        tracing::info!(
            "Ledger actor stopped with balance {} after {} notifications",
            self.ledger.balance(),
            self.ledger.notifications().len()
        );
    }

    /// Refuse new messages, answer those already queued, then reply with the final state
    async fn stop(&mut self, response: oneshot::Sender<LedgerSnapshot>) {
        self.mailbox.close();

        let mut waiting = vec![response];
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown { response } => waiting.push(response),
                msg => self.handle_message(msg),
            }
        }

        let state = self.ledger.snapshot();
        for response in waiting {
            let _ = response.send(state.clone());
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Deposit {
                caller,
                amount,
                response,
            } => {
                let result = self.ledger.deposit(&caller, amount);
                self.after_transition(&result);
                let _ = response.send(result);
            }

            LedgerMessage::Withdraw {
                caller,
                amount,
                response,
            } => {
                let result = self.ledger.withdraw(&caller, amount);
                self.after_transition(&result);
                let _ = response.send(result);
            }

            LedgerMessage::GetBalance { response } => {
                let _ = response.send(self.ledger.balance());
            }

            LedgerMessage::GetOwnerBalance { response } => {
                let _ = response.send(self.ledger.owner_balance());
            }

            LedgerMessage::GetOwner { response } => {
                let _ = response.send(self.ledger.owner().clone());
            }

            LedgerMessage::GetNotifications { since, response } => {
                let _ = response.send(self.ledger.notifications_since(since).to_vec());
            }

            LedgerMessage::Snapshot { response } => {
                let _ = response.send(self.ledger.snapshot());
            }

            LedgerMessage::Shutdown { response } => {
                // Normally intercepted by the main loop
                let _ = response.send(self.ledger.snapshot());
            }
        }
    }

    /// Publish and record the outcome of a deposit or withdrawal
    fn after_transition(&self, result: &Result<Notification>) {
        match result {
            Ok(notification) => {
                if notification.is_deposit() {
                    self.metrics.record_deposit();
                } else {
                    self.metrics.record_withdrawal();
                }
                self.metrics.update_balances(
                    self.ledger.balance().base_units(),
                    self.ledger.owner_balance().base_units(),
                );

                // No subscribers is not an error; the journal keeps the record
                if self.notifications.send(notification.clone()).is_err() {
                    tracing::debug!("No subscribers for notification {}", notification);
                }

                if let Err(e) = self.ledger.check_conservation() {
                    tracing::error!("Conservation check failed after {}: {}", notification, e);
                }
            }
            Err(e) => {
                if e.is_rejection() {
                    tracing::debug!("Operation rejected: {}", e);
                } else {
                    tracing::error!("Operation failed: {}", e);
                }
                self.metrics.record_rejection(e.code());
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    notifications: broadcast::Sender<Notification>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(
        sender: mpsc::Sender<LedgerMessage>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            sender,
            notifications,
        }
    }

    /// Deposit `amount` as `caller`
    pub async fn deposit(&self, caller: AccountId, amount: Amount) -> Result<Notification> {
        self.request(|response| LedgerMessage::Deposit {
            caller,
            amount,
            response,
        })
        .await?
    }

    /// Withdraw `amount` as `caller`
    pub async fn withdraw(&self, caller: AccountId, amount: Amount) -> Result<Notification> {
        self.request(|response| LedgerMessage::Withdraw {
            caller,
            amount,
            response,
        })
        .await?
    }

    /// Get pooled balance
    pub async fn balance(&self) -> Result<Amount> {
        self.request(|response| LedgerMessage::GetBalance { response })
            .await
    }

    /// Get owner credit
    pub async fn owner_balance(&self) -> Result<Amount> {
        self.request(|response| LedgerMessage::GetOwnerBalance { response })
            .await
    }

    /// Get owner identity
    pub async fn owner(&self) -> Result<AccountId> {
        self.request(|response| LedgerMessage::GetOwner { response })
            .await
    }

    /// Get notifications with sequence greater than `since`
    pub async fn notifications(&self, since: u64) -> Result<Vec<Notification>> {
        self.request(|response| LedgerMessage::GetNotifications { since, response })
            .await
    }

    /// Capture ledger state
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Receive every notification emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Stop the actor, returning the state after the last accepted operation
    ///
    /// Operations queued ahead of the shutdown are applied first; anything sent
    /// afterwards fails with [`Error::Concurrency`].
    pub async fn shutdown(&self) -> Result<LedgerSnapshot> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    ledger: Ledger,
    mailbox_capacity: usize,
    notification_capacity: usize,
    metrics: Metrics,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let (notifications, _) = broadcast::channel(notification_capacity);
    let actor = LedgerActor::new(ledger, rx, notifications.clone(), metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, notifications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationKind;

    fn owner() -> AccountId {
        AccountId::new("0xowner")
    }

    fn spawn() -> (LedgerHandle, Metrics) {
        let metrics = Metrics::new().unwrap();
        let handle = spawn_ledger_actor(Ledger::new(owner()), 16, 16, metrics.clone());
        (handle, metrics)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _) = spawn();
        assert_eq!(handle.owner().await.unwrap(), owner());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_deposit_and_withdraw() {
        let (handle, metrics) = spawn();
        let friend = AccountId::new("0xfriend");

        handle
            .deposit(friend.clone(), Amount::from_base_units(300))
            .await
            .unwrap();
        handle
            .deposit(owner(), Amount::from_base_units(200))
            .await
            .unwrap();
        let withdrawn = handle
            .withdraw(owner(), Amount::from_base_units(400))
            .await
            .unwrap();
        assert_eq!(withdrawn.kind, NotificationKind::Withdrawn);
        assert_eq!(withdrawn.sequence, 3);

        assert_eq!(handle.balance().await.unwrap(), Amount::from_base_units(100));
        assert_eq!(
            handle.owner_balance().await.unwrap(),
            Amount::from_base_units(200)
        );

        assert_eq!(metrics.deposits_total.get(), 2);
        assert_eq!(metrics.withdrawals_total.get(), 1);
        assert_eq!(metrics.pooled_balance.get(), 100.0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_rejections_are_counted() {
        let (handle, metrics) = spawn();

        let result = handle
            .withdraw(AccountId::new("0xthief"), Amount::from_base_units(1))
            .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        let result = handle.deposit(owner(), Amount::ZERO).await;
        assert!(matches!(result, Err(Error::InvalidAmount(_))));

        assert_eq!(
            metrics
                .rejections_total
                .with_label_values(&["unauthorized"])
                .get(),
            1
        );
        assert!(handle.notifications(0).await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribers_see_notifications_in_order() {
        let (handle, _) = spawn();
        let mut rx = handle.subscribe();

        handle
            .deposit(owner(), Amount::from_base_units(5))
            .await
            .unwrap();
        let _ = handle
            .withdraw(owner(), Amount::from_base_units(50))
            .await;
        handle
            .withdraw(owner(), Amount::from_base_units(5))
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert!(first.is_deposit());
        assert_eq!(second.sequence, 2);
        assert!(second.is_withdrawal());
        assert!(rx.try_recv().is_err());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_deposits_are_serialized() {
        let (handle, _) = spawn();

        let mut tasks = Vec::new();
        for i in 0..20u128 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .deposit(AccountId::new(format!("0x{:02}", i)), Amount::from_base_units(i + 1))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(handle.balance().await.unwrap(), Amount::from_base_units(210));

        let sequences: Vec<u64> = handle
            .notifications(0)
            .await
            .unwrap()
            .iter()
            .map(|n| n.sequence)
            .collect();
        assert_eq!(sequences, (1..=20).collect::<Vec<u64>>());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (handle, _) = spawn();
        handle.shutdown().await.unwrap();

        let result = handle.balance().await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
        let result = handle.deposit(owner(), Amount::from_base_units(1)).await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_shutdown_applies_queued_operations() {
        let (handle, _) = spawn();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.deposit(owner(), Amount::from_base_units(1)).await
            }));
        }
        let state = handle.shutdown().await.unwrap();

        let mut accepted = 0u128;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(state.pooled_balance, Amount::from_base_units(accepted));
        assert_eq!(state.journal.len() as u128, accepted);
        assert!(state.verify().is_ok());
    }
}

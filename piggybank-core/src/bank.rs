//! Service facade over the ledger actor
//!
//! This module ties together config, metrics, snapshot persistence and the
//! actor into the API a hosting process uses.
//!
//! # Example
//!
//! ```no_run
//! use piggybank_core::{AccountId, Amount, Config, PiggyBank};
//!
//! #[tokio::main]
//! async fn main() -> piggybank_core::Result<()> {
//!     let owner = AccountId::new("0xowner");
//!     let bank = PiggyBank::open(owner.clone(), Config::default()).await?;
//!
//!     bank.deposit(AccountId::new("0xfriend"), Amount::from_base_units(10)).await?;
//!     bank.withdraw(owner, Amount::from_base_units(4)).await?;
//!     assert_eq!(bank.balance().await?, Amount::from_base_units(6));
//!
//!     bank.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    snapshot::{self, LedgerSnapshot},
    types::{AccountId, Amount, Notification},
    Config, Error, Ledger, Metrics, Result,
};
use tokio::sync::broadcast;

/// Main piggy bank interface
#[derive(Debug)]
pub struct PiggyBank {
    /// Actor handle
    handle: LedgerHandle,

    /// Metrics shared with the actor
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl PiggyBank {
    /// Open a piggy bank constructed by `owner`
    ///
    /// When snapshot restore is configured and a snapshot exists, the ledger
    /// is restored from it instead; its owner must then be `owner`.
    pub async fn open(owner: AccountId, config: Config) -> Result<Self> {
        config.validate()?;

        if let Some(ref configured) = config.owner {
            if *configured != owner {
                return Err(Error::Config(format!(
                    "configured owner {} does not match constructing identity {}",
                    configured, owner
                )));
            }
        }

        let ledger = match Self::restore(&config)? {
            Some(ledger) => {
                if *ledger.owner() != owner {
                    return Err(Error::Snapshot(format!(
                        "snapshot belongs to owner {}, not {}",
                        ledger.owner(),
                        owner
                    )));
                }
                ledger
            }
            None => Ledger::new(owner),
        };

        let metrics = Metrics::new().map_err(|e| Error::Other(e.to_string()))?;
        let handle = spawn_ledger_actor(
            ledger,
            config.actor.mailbox_capacity,
            config.actor.notification_capacity,
            metrics.clone(),
        );

        tracing::info!("{} {} opened", config.service_name, config.service_version);

        Ok(Self {
            handle,
            metrics,
            config,
        })
    }

    fn restore(config: &Config) -> Result<Option<Ledger>> {
        if !config.snapshot.restore_on_open {
            return Ok(None);
        }

        match config.snapshot.path {
            Some(ref path) => snapshot::load(path)?
                .map(Ledger::from_snapshot)
                .transpose(),
            None => Ok(None),
        }
    }

    /// Deposit `amount` as `caller`
    pub async fn deposit(&self, caller: AccountId, amount: Amount) -> Result<Notification> {
        self.handle.deposit(caller, amount).await
    }

    /// Withdraw `amount` as `caller`; only the owner may withdraw
    pub async fn withdraw(&self, caller: AccountId, amount: Amount) -> Result<Notification> {
        self.handle.withdraw(caller, amount).await
    }

    /// Pooled balance
    pub async fn balance(&self) -> Result<Amount> {
        self.handle.balance().await
    }

    /// Cumulative owner deposits
    pub async fn owner_balance(&self) -> Result<Amount> {
        self.handle.owner_balance().await
    }

    /// Owner identity
    pub async fn owner(&self) -> Result<AccountId> {
        self.handle.owner().await
    }

    /// Notifications with sequence greater than `since`
    pub async fn notifications(&self, since: u64) -> Result<Vec<Notification>> {
        self.handle.notifications(since).await
    }

    /// Receive notifications as they are emitted
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.handle.subscribe()
    }

    /// Capture ledger state
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.handle.snapshot().await
    }

    /// Cloneable handle for concurrent callers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the actor, then save its final state if configured
    ///
    /// Clones of [`PiggyBank::handle`] are refused once shutdown begins, so
    /// every operation they saw succeed is in the saved snapshot.
    pub async fn shutdown(self) -> Result<()> {
        let state = self.handle.shutdown().await?;

        if self.config.snapshot.save_on_shutdown {
            if let Some(ref path) = self.config.snapshot.path {
                snapshot::save(path, &state)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> AccountId {
        AccountId::new("0xowner")
    }

    fn persistent_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.snapshot.path = Some(dir.join("ledger.snap"));
        config.snapshot.restore_on_open = true;
        config.snapshot.save_on_shutdown = true;
        config
    }

    #[tokio::test]
    async fn test_open_fresh() {
        let bank = PiggyBank::open(owner(), Config::default()).await.unwrap();
        assert_eq!(bank.owner().await.unwrap(), owner());
        assert_eq!(bank.balance().await.unwrap(), Amount::ZERO);
        bank.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_rejects_owner_mismatch() {
        let mut config = Config::default();
        config.owner = Some(AccountId::new("0xsomeone-else"));

        let result = PiggyBank::open(owner(), config).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let temp_dir = tempfile::tempdir().unwrap();

        let bank = PiggyBank::open(owner(), persistent_config(temp_dir.path()))
            .await
            .unwrap();
        bank.deposit(AccountId::new("0xfriend"), Amount::from_base_units(70))
            .await
            .unwrap();
        bank.deposit(owner(), Amount::from_base_units(30))
            .await
            .unwrap();
        bank.withdraw(owner(), Amount::from_base_units(40))
            .await
            .unwrap();
        bank.shutdown().await.unwrap();

        let bank = PiggyBank::open(owner(), persistent_config(temp_dir.path()))
            .await
            .unwrap();
        assert_eq!(bank.balance().await.unwrap(), Amount::from_base_units(60));
        assert_eq!(bank.owner_balance().await.unwrap(), Amount::from_base_units(30));

        let next = bank
            .deposit(owner(), Amount::from_base_units(1))
            .await
            .unwrap();
        assert_eq!(next.sequence, 4);
        bank.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_rejects_foreign_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();

        let bank = PiggyBank::open(owner(), persistent_config(temp_dir.path()))
            .await
            .unwrap();
        bank.deposit(owner(), Amount::from_base_units(1)).await.unwrap();
        bank.shutdown().await.unwrap();

        let result =
            PiggyBank::open(AccountId::new("0xintruder"), persistent_config(temp_dir.path())).await;
        assert!(matches!(result, Err(Error::Snapshot(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_keeps_deposits_from_handle_clones() {
        let temp_dir = tempfile::tempdir().unwrap();

        let bank = PiggyBank::open(owner(), persistent_config(temp_dir.path()))
            .await
            .unwrap();
        assert_eq!(bank.config().snapshot.path, Some(temp_dir.path().join("ledger.snap")));

        let handle = bank.handle();
        let depositor = tokio::spawn(async move {
            let mut acknowledged = 0u128;
            while handle
                .deposit(AccountId::new("0xfriend"), Amount::from_base_units(1))
                .await
                .is_ok()
            {
                acknowledged += 1;
            }
            acknowledged
        });

        while bank.balance().await.unwrap() == Amount::ZERO {
            tokio::task::yield_now().await;
        }
        bank.shutdown().await.unwrap();
        let acknowledged = depositor.await.unwrap();
        assert!(acknowledged > 0);

        let bank = PiggyBank::open(owner(), persistent_config(temp_dir.path()))
            .await
            .unwrap();
        assert_eq!(
            bank.balance().await.unwrap(),
            Amount::from_base_units(acknowledged)
        );
        assert_eq!(
            bank.notifications(0).await.unwrap().len() as u128,
            acknowledged
        );
        bank.shutdown().await.unwrap();
    }
}

//! Configuration for the piggy bank host

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Identity the host constructs the ledger as
    pub owner: Option<AccountId>,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Snapshot configuration
    pub snapshot: SnapshotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "piggybank".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            owner: None,
            actor: ActorConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure on callers)
    pub mailbox_capacity: usize,

    /// Notifications buffered per subscriber before it starts lagging
    pub notification_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            notification_capacity: 1024,
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot file; persistence is off when unset
    pub path: Option<PathBuf>,

    /// Restore from `path` when opening
    pub restore_on_open: bool,

    /// Write to `path` on shutdown
    pub save_on_shutdown: bool,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(owner) = std::env::var("PIGGY_OWNER") {
            config.owner = Some(AccountId::new(owner));
        }

        if let Ok(path) = std::env::var("PIGGY_SNAPSHOT_PATH") {
            config.snapshot.path = Some(PathBuf::from(path));
            config.snapshot.restore_on_open = true;
            config.snapshot.save_on_shutdown = true;
        }

        if let Ok(capacity) = std::env::var("PIGGY_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid PIGGY_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the actor cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }

        if self.actor.notification_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.notification_capacity must be positive".to_string(),
            ));
        }

        if (self.snapshot.restore_on_open || self.snapshot.save_on_shutdown)
            && self.snapshot.path.is_none()
        {
            return Err(crate::Error::Config(
                "snapshot.path is required when snapshots are enabled".to_string(),
            ));
        }

        Ok(())
    }
}

//! Snapshot persistence for the ledger
//!
//! # Format
//!
//! ```text
//! [0..32)   SHA-256 digest of the payload
//! [32..)    bincode-encoded LedgerSnapshot
//! ```
//!
//! Files are written to a temporary sibling, flushed to disk with `sync_all`
//! and only then renamed into place, so a crash mid-write leaves either the
//! previous snapshot or the new one.

use crate::{
    types::{AccountId, Amount, Notification, NotificationKind},
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

const DIGEST_LEN: usize = 32;

/// Full ledger state at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Owner identity
    pub owner: AccountId,
    /// Pooled balance
    pub pooled_balance: Amount,
    /// Cumulative owner deposits
    pub owner_credit: Amount,
    /// Σ accepted deposits
    pub total_deposited: Amount,
    /// Σ successful withdrawals
    pub total_withdrawn: Amount,
    /// Notification journal
    pub journal: Vec<Notification>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    /// Check the journal is contiguous and agrees with the recorded totals
    pub fn verify(&self) -> Result<()> {
        let mut deposited = Amount::ZERO;
        let mut withdrawn = Amount::ZERO;
        let mut owner_deposited = Amount::ZERO;

        for (index, notification) in self.journal.iter().enumerate() {
            if notification.sequence != index as u64 + 1 {
                return Err(Error::Snapshot(format!(
                    "journal gap: expected sequence {}, found {}",
                    index + 1,
                    notification.sequence
                )));
            }

            let overflow = || Error::Snapshot("journal totals overflow".to_string());
            match notification.kind {
                NotificationKind::Deposited => {
                    deposited = deposited.checked_add(notification.amount).ok_or_else(overflow)?;
                    if notification.account == self.owner {
                        owner_deposited = owner_deposited
                            .checked_add(notification.amount)
                            .ok_or_else(overflow)?;
                    }
                }
                NotificationKind::Withdrawn => {
                    if notification.account != self.owner {
                        return Err(Error::Snapshot(format!(
                            "withdrawal #{} by non-owner {}",
                            notification.sequence, notification.account
                        )));
                    }
                    withdrawn = withdrawn.checked_add(notification.amount).ok_or_else(overflow)?;
                }
            }
        }

        if deposited != self.total_deposited || withdrawn != self.total_withdrawn {
            return Err(Error::Snapshot(format!(
                "journal totals (deposited {}, withdrawn {}) disagree with recorded totals (deposited {}, withdrawn {})",
                deposited, withdrawn, self.total_deposited, self.total_withdrawn
            )));
        }

        if owner_deposited != self.owner_credit {
            return Err(Error::Snapshot(format!(
                "owner credit {} disagrees with journal {}",
                self.owner_credit, owner_deposited
            )));
        }

        Ok(())
    }

    /// Encode as digest || payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let digest: [u8; DIGEST_LEN] = Sha256::digest(&payload).into();

        let mut bytes = Vec::with_capacity(DIGEST_LEN + payload.len());
        bytes.extend_from_slice(&digest);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode and check the digest
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DIGEST_LEN {
            return Err(Error::Snapshot(format!(
                "snapshot too short: {} bytes",
                bytes.len()
            )));
        }

        let (digest, payload) = bytes.split_at(DIGEST_LEN);
        let actual: [u8; DIGEST_LEN] = Sha256::digest(payload).into();
        if digest != actual.as_slice() {
            return Err(Error::Snapshot("digest mismatch".to_string()));
        }

        Ok(bincode::deserialize(payload)?)
    }
}

/// Write a snapshot to `path`
pub fn save(path: impl AsRef<Path>, snapshot: &LedgerSnapshot) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let bytes = snapshot.to_bytes()?;
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(&tmp, path)?;

    tracing::info!(
        "Saved snapshot of {} notifications ({} bytes) to {:?}",
        snapshot.journal.len(),
        bytes.len(),
        path
    );
    Ok(())
}

/// Read a snapshot from `path`, `None` if the file does not exist
pub fn load(path: impl AsRef<Path>) -> Result<Option<LedgerSnapshot>> {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No snapshot at {:?}", path);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot = LedgerSnapshot::from_bytes(&bytes)?;
    tracing::info!("Loaded snapshot taken at {} from {:?}", snapshot.taken_at, path);
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ledger;

    fn sample() -> LedgerSnapshot {
        let owner = AccountId::new("0xowner");
        let mut ledger = Ledger::new(owner.clone());
        ledger
            .deposit(&AccountId::new("0xfriend"), Amount::from_base_units(500))
            .unwrap();
        ledger.deposit(&owner, Amount::from_base_units(200)).unwrap();
        ledger.withdraw(&owner, Amount::from_base_units(300)).unwrap();
        ledger.snapshot()
    }

    #[test]
    fn test_verify_accepts_consistent_snapshot() {
        sample().verify().unwrap();
    }

    #[test]
    fn test_verify_rejects_journal_gap() {
        let mut snapshot = sample();
        snapshot.journal.remove(1);
        assert!(matches!(snapshot.verify(), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_verify_rejects_owner_credit_mismatch() {
        let mut snapshot = sample();
        snapshot.owner_credit = Amount::from_base_units(700);
        assert!(matches!(snapshot.verify(), Err(Error::Snapshot(_))));
    }

    #[test]
    fn test_digest_detects_corruption() {
        let mut bytes = sample().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let result = LedgerSnapshot::from_bytes(&bytes);
        assert!(result.unwrap_err().to_string().contains("digest mismatch"));

        assert!(LedgerSnapshot::from_bytes(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("state").join("piggybank.snap");

        assert!(load(&path).unwrap().is_none());

        let snapshot = sample();
        save(&path, &snapshot).unwrap();

        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(std::fs::read(&path).unwrap(), snapshot.to_bytes().unwrap());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("piggybank.snap");

        let mut ledger = crate::Ledger::new(AccountId::new("0xowner"));
        save(&path, &ledger.snapshot()).unwrap();

        ledger
            .deposit(&AccountId::new("0xfriend"), Amount::from_base_units(9))
            .unwrap();
        let latest = ledger.snapshot();
        save(&path, &latest).unwrap();

        assert_eq!(load(&path).unwrap().unwrap(), latest);
        assert!(!path.with_extension("tmp").exists());
    }
}

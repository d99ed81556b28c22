//! The piggy bank ledger
//!
//! A single owner controls withdrawals from a pool that anyone can deposit
//! into. Every operation takes the acting identity explicitly and is applied
//! all-or-nothing: new values are computed with checked arithmetic first and
//! committed only after every precondition passes.
//!
//! # Example
//!
//! ```
//! use piggybank_core::{AccountId, Amount, Ledger};
//!
//! let owner = AccountId::new("0xowner");
//! let mut ledger = Ledger::new(owner.clone());
//!
//! ledger.deposit(&owner, Amount::from_base_units(2)).unwrap();
//! ledger.withdraw(&owner, Amount::from_base_units(1)).unwrap();
//!
//! assert_eq!(ledger.balance(), Amount::from_base_units(1));
//! assert_eq!(ledger.owner_balance(), Amount::from_base_units(2));
//! ```

use crate::{
    snapshot::LedgerSnapshot,
    types::{AccountId, Amount, Notification, NotificationKind},
    Error, Result,
};
use chrono::Utc;
use uuid::Uuid;

/// Pooled balance with owner-only withdrawals
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Fixed at construction
    owner: AccountId,

    /// Currency currently held
    pooled_balance: Amount,

    /// Cumulative deposits made by the owner; never decremented
    owner_credit: Amount,

    /// Σ accepted deposits
    total_deposited: Amount,

    /// Σ successful withdrawals
    total_withdrawn: Amount,

    /// Append-only notification journal
    journal: Vec<Notification>,
}

impl Ledger {
    /// Construct a ledger owned by `owner`, with zero balances
    pub fn new(owner: AccountId) -> Self {
        tracing::info!("Ledger constructed with owner {}", owner);

        Self {
            owner,
            pooled_balance: Amount::ZERO,
            owner_credit: Amount::ZERO,
            total_deposited: Amount::ZERO,
            total_withdrawn: Amount::ZERO,
            journal: Vec::new(),
        }
    }

    /// Owner identity
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Current pooled balance
    pub fn balance(&self) -> Amount {
        self.pooled_balance
    }

    /// Cumulative amount the owner has deposited
    ///
    /// Withdrawals do not reduce this, so it can exceed [`Ledger::balance`].
    pub fn owner_balance(&self) -> Amount {
        self.owner_credit
    }

    /// Σ accepted deposits
    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    /// Σ successful withdrawals
    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    /// All notifications, oldest first
    pub fn notifications(&self) -> &[Notification] {
        &self.journal
    }

    /// Notifications with a sequence number greater than `since`
    pub fn notifications_since(&self, since: u64) -> &[Notification] {
        // sequence == index + 1
        let start = usize::try_from(since)
            .unwrap_or(usize::MAX)
            .min(self.journal.len());
        &self.journal[start..]
    }

    /// Add `amount` to the pool on behalf of `caller`
    pub fn deposit(&mut self, caller: &AccountId, amount: Amount) -> Result<Notification> {
        if amount.is_zero() {
            tracing::warn!("Rejected zero deposit from {}", caller);
            return Err(Error::InvalidAmount(
                "You must deposit some ETH".to_string(),
            ));
        }

        let pooled_balance = self
            .pooled_balance
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("pooled balance".to_string()))?;
        let total_deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("total deposited".to_string()))?;
        let owner_credit = if *caller == self.owner {
            self.owner_credit
                .checked_add(amount)
                .ok_or_else(|| Error::Overflow("owner credit".to_string()))?
        } else {
            self.owner_credit
        };

        // Commit
        self.pooled_balance = pooled_balance;
        self.total_deposited = total_deposited;
        self.owner_credit = owner_credit;

        let notification = self.record(NotificationKind::Deposited, caller, amount);
        tracing::info!(
            "Deposit of {} from {} accepted, pooled balance now {}",
            amount,
            caller,
            self.pooled_balance
        );

        Ok(notification)
    }

    /// Pay `amount` out of the pool to `caller`, who must be the owner
    ///
    /// Authorization is checked before balance sufficiency.
    pub fn withdraw(&mut self, caller: &AccountId, amount: Amount) -> Result<Notification> {
        if *caller != self.owner {
            tracing::warn!("Rejected withdrawal of {} by non-owner {}", amount, caller);
            return Err(Error::Unauthorized {
                caller: caller.clone(),
            });
        }

        let pooled_balance = match self.pooled_balance.checked_sub(amount) {
            Some(remaining) => remaining,
            None => {
                tracing::warn!(
                    "Rejected withdrawal of {}: pooled balance is {}",
                    amount,
                    self.pooled_balance
                );
                return Err(Error::InsufficientBalance {
                    requested: amount,
                    available: self.pooled_balance,
                });
            }
        };
        let total_withdrawn = self
            .total_withdrawn
            .checked_add(amount)
            .ok_or_else(|| Error::Overflow("total withdrawn".to_string()))?;

        // Commit
        self.pooled_balance = pooled_balance;
        self.total_withdrawn = total_withdrawn;

        let notification = self.record(NotificationKind::Withdrawn, caller, amount);
        tracing::info!(
            "Withdrawal of {} to {} accepted, pooled balance now {}",
            amount,
            caller,
            self.pooled_balance
        );

        Ok(notification)
    }

    /// Check money conservation invariant
    ///
    /// pooled balance == Σ deposits − Σ withdrawals, and the owner's credit
    /// never exceeds Σ deposits.
    pub fn check_conservation(&self) -> Result<()> {
        let expected = self
            .total_deposited
            .checked_sub(self.total_withdrawn)
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "withdrawn {} exceeds deposited {}",
                    self.total_withdrawn, self.total_deposited
                ))
            })?;

        if expected != self.pooled_balance {
            return Err(Error::InvariantViolation(format!(
                "pooled balance {} != deposited {} - withdrawn {}",
                self.pooled_balance, self.total_deposited, self.total_withdrawn
            )));
        }

        if self.owner_credit > self.total_deposited {
            return Err(Error::InvariantViolation(format!(
                "owner credit {} exceeds deposited {}",
                self.owner_credit, self.total_deposited
            )));
        }

        Ok(())
    }

    /// Capture the full state for persistence
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            owner: self.owner.clone(),
            pooled_balance: self.pooled_balance,
            owner_credit: self.owner_credit,
            total_deposited: self.total_deposited,
            total_withdrawn: self.total_withdrawn,
            journal: self.journal.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Rebuild a ledger from a snapshot, verifying it first
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.verify()?;

        let ledger = Self {
            owner: snapshot.owner,
            pooled_balance: snapshot.pooled_balance,
            owner_credit: snapshot.owner_credit,
            total_deposited: snapshot.total_deposited,
            total_withdrawn: snapshot.total_withdrawn,
            journal: snapshot.journal,
        };
        ledger.check_conservation()?;

        tracing::info!(
            "Ledger restored for owner {} with balance {} and {} notifications",
            ledger.owner,
            ledger.pooled_balance,
            ledger.journal.len()
        );

        Ok(ledger)
    }

    fn record(&mut self, kind: NotificationKind, account: &AccountId, amount: Amount) -> Notification {
        let notification = Notification {
            sequence: self.journal.len() as u64 + 1,
            event_id: Uuid::now_v7(),
            kind,
            account: account.clone(),
            amount,
            timestamp: Utc::now(),
        };
        self.journal.push(notification.clone());
        notification
    }
}

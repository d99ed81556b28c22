//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer base units, Decimal only at the edges)

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Base units per whole currency unit (wei per ether)
pub const BASE_UNITS_PER_WHOLE: u128 = 1_000_000_000_000_000_000;

/// Number of decimal places carried by one base unit
pub const BASE_UNIT_SCALE: u32 = 18;

/// Account identifier (address of a depositor or the owner)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currency amount in base units
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u128);

impl Amount {
    /// Zero
    pub const ZERO: Amount = Amount(0);

    /// Create from raw base units
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Raw base units
    pub const fn base_units(&self) -> u128 {
        self.0
    }

    /// Convert a decimal count of whole units (e.g. `1.5` ether) into base units
    pub fn from_ether(value: Decimal) -> crate::Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(crate::Error::InvalidAmount(format!(
                "{} is negative",
                value
            )));
        }

        let scaled = value
            .checked_mul(Decimal::from(BASE_UNITS_PER_WHOLE as u64))
            .ok_or_else(|| crate::Error::Overflow(format!("{} does not fit in base units", value)))?;

        if !scaled.fract().is_zero() {
            return Err(crate::Error::InvalidAmount(format!(
                "{} has more than {} decimal places",
                value, BASE_UNIT_SCALE
            )));
        }

        scaled
            .trunc()
            .to_u128()
            .map(Self)
            .ok_or_else(|| crate::Error::Overflow(format!("{} does not fit in base units", value)))
    }

    /// Whole units as a Decimal, `None` if the amount exceeds Decimal's range
    pub fn to_ether(&self) -> Option<Decimal> {
        let units = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(units, BASE_UNIT_SCALE)
            .ok()
            .map(|d| d.normalize())
    }

    /// Is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction, `None` if the result would be negative
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

impl From<u128> for Amount {
    fn from(units: u128) -> Self {
        Self(units)
    }
}

/// Kind of state transition a notification records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NotificationKind {
    /// Funds added to the pool
    Deposited = 1,
    /// Funds paid out to the owner
    Withdrawn = 2,
}

impl NotificationKind {
    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            NotificationKind::Deposited => "Deposited",
            NotificationKind::Withdrawn => "Withdrawn",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Record of a successful deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Position in the ledger's journal, starting at 1
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Deposited or Withdrawn
    pub kind: NotificationKind,

    /// Acting identity
    pub account: AccountId,

    /// Amount moved
    pub amount: Amount,

    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Deposited(account, amount)
    pub fn is_deposit(&self) -> bool {
        self.kind == NotificationKind::Deposited
    }

    /// Withdrawn(account, amount)
    pub fn is_withdrawal(&self) -> bool {
        self.kind == NotificationKind::Withdrawn
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}({}, {})",
            self.sequence, self.kind, self.account, self.amount
        )
    }
}

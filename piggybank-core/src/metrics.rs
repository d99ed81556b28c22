//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `piggybank_deposits_total` - Accepted deposits
//! - `piggybank_withdrawals_total` - Successful withdrawals
//! - `piggybank_rejections_total{reason}` - Rejected operations by error code
//! - `piggybank_pooled_balance_wei` - Current pooled balance
//! - `piggybank_owner_credit_wei` - Cumulative owner deposits

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
///
/// Collectors live on a private registry so several ledgers can run in one
/// process.
#[derive(Clone)]
pub struct Metrics {
    /// Accepted deposits
    pub deposits_total: IntCounter,

    /// Successful withdrawals
    pub withdrawals_total: IntCounter,

    /// Rejected operations, labelled by reason
    pub rejections_total: IntCounterVec,

    /// Pooled balance in base units
    pub pooled_balance: Gauge,

    /// Owner credit in base units
    pub owner_credit: Gauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_total =
            IntCounter::new("piggybank_deposits_total", "Total number of accepted deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total = IntCounter::new(
            "piggybank_withdrawals_total",
            "Total number of successful withdrawals",
        )?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new(
                "piggybank_rejections_total",
                "Total number of rejected operations",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        // Gauges are f64; u128 balances lose precision above 2^53 wei
        let pooled_balance = Gauge::new(
            "piggybank_pooled_balance_wei",
            "Current pooled balance in wei",
        )?;
        registry.register(Box::new(pooled_balance.clone()))?;

        let owner_credit = Gauge::new(
            "piggybank_owner_credit_wei",
            "Cumulative owner deposits in wei",
        )?;
        registry.register(Box::new(owner_credit.clone()))?;

        Ok(Self {
            deposits_total,
            withdrawals_total,
            rejections_total,
            pooled_balance,
            owner_credit,
            registry,
        })
    }

    /// Record accepted deposit
    pub fn record_deposit(&self) {
        self.deposits_total.inc();
    }

    /// Record successful withdrawal
    pub fn record_withdrawal(&self) {
        self.withdrawals_total.inc();
    }

    /// Record rejected operation
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Update balance gauges
    pub fn update_balances(&self, pooled_balance: u128, owner_credit: u128) {
        self.pooled_balance.set(pooled_balance as f64);
        self.owner_credit.set(owner_credit as f64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("deposits_total", &self.deposits_total.get())
            .field("withdrawals_total", &self.withdrawals_total.get())
            .field("pooled_balance", &self.pooled_balance.get())
            .field("owner_credit", &self.owner_credit.get())
            .finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

//! Ledger persistence: the [`LedgerStore`] trait, an in-memory store, and
//! DuckDB behind the `duckdb` feature.
//!
//! Two write strategies live side by side. Categories, members, interests and
//! payers are upserted by key. Payments have no identity of their own and are
//! deleted and reinserted wholesale on every run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paytrail_core::{Category, InterestRow, Member, NewPayer, NewPayment, Payer, PayerType, SyncRun};
use rust_decimal::Decimal;
use serde::Serialize;

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

/// Payments aggregated per member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTotal {
    pub member_id: u32,
    pub total_amount: Decimal,
    pub payment_count: usize,
}

/// Payments aggregated per resolved payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayerTotal {
    pub payer_id: i64,
    pub name: String,
    pub payer_type: PayerType,
    pub total_amount: Decimal,
    pub payment_count: usize,
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub categories: usize,
    pub members: usize,
    pub interests: usize,
    pub payers: usize,
    pub payments: usize,
}

/// A manual classification for one payer. Manual payers are never
/// reclassified automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualClassification {
    pub payer_type: PayerType,
    pub subtype: Option<String>,
    pub reason: Option<String>,
}

/// The relational store a sync run writes to.
///
/// Write methods take one batch and either apply all of it or none of it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Take the run lock. Returns `false` when another run holds it.
    async fn acquire_run_lock(&self) -> Result<bool, StoreError>;
    async fn release_run_lock(&self) -> Result<(), StoreError>;

    /// Open a run-log row and return its id.
    async fn start_run(&self, started_at: DateTime<Utc>) -> Result<i64, StoreError>;
    /// Overwrite the run-log row with the run's current state.
    async fn record_run(&self, run: &SyncRun) -> Result<(), StoreError>;
    /// The most recently started run, as last recorded.
    async fn latest_run(&self) -> Result<Option<SyncRun>, StoreError>;

    async fn upsert_categories(&self, categories: &[Category]) -> Result<usize, StoreError>;
    async fn upsert_members(&self, members: &[Member]) -> Result<usize, StoreError>;
    async fn upsert_interests(&self, interests: &[InterestRow]) -> Result<usize, StoreError>;

    async fn list_payers(&self) -> Result<Vec<Payer>, StoreError>;
    /// Insert payers whose normalised name is not yet present. Returns the
    /// number actually inserted.
    async fn insert_payers(&self, payers: &[NewPayer]) -> Result<usize, StoreError>;
    /// Automated reclassification. Leaves manual payers alone and returns
    /// whether a row changed.
    async fn update_payer_classification(
        &self,
        id: i64,
        payer_type: PayerType,
        subtype: Option<&str>,
    ) -> Result<bool, StoreError>;
    /// Pin a payer's classification by normalised name. Returns whether the
    /// payer exists.
    async fn set_manual_classification(
        &self,
        normalized_name: &str,
        manual: &ManualClassification,
    ) -> Result<bool, StoreError>;

    async fn delete_payments(&self) -> Result<usize, StoreError>;
    async fn insert_payments(&self, payments: &[NewPayment]) -> Result<usize, StoreError>;

    /// Rebuild the per-member and per-payer aggregates from the payments table.
    async fn refresh_views(&self) -> Result<(), StoreError>;
    async fn member_totals(&self) -> Result<Vec<MemberTotal>, StoreError>;
    async fn payer_totals(&self) -> Result<Vec<PayerTotal>, StoreError>;

    async fn counts(&self) -> Result<TableCounts, StoreError>;
}

//! In-memory ledger store.
//!
//! Mirrors the DuckDB store's semantics closely enough to run the whole sync
//! pipeline in tests: keyed upserts, unique normalised payer names, wholesale
//! payment replacement, and the run lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paytrail_core::{Category, InterestRow, Member, NewPayer, NewPayment, Payer, PayerType, SyncRun};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{LedgerStore, ManualClassification, MemberTotal, PayerTotal, StoreError, TableCounts};

#[derive(Default)]
struct Tables {
    categories: BTreeMap<u32, Category>,
    members: BTreeMap<u32, Member>,
    interests: BTreeMap<u64, InterestRow>,
    payers: Vec<Payer>,
    payments: Vec<NewPayment>,
    member_totals: Vec<MemberTotal>,
    payer_totals: Vec<PayerTotal>,
    runs: Vec<SyncRun>,
    next_run_id: i64,
}

/// Injected write failures.
#[derive(Default)]
struct Faults {
    disabled: HashSet<String>,
    failing_batches: HashSet<(String, usize)>,
    batch_calls: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    locked: AtomicBool,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `table` fail until re-enabled. `"views"` covers
    /// [`LedgerStore::refresh_views`].
    pub fn disable_writes(&self, table: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.disabled.insert(table.to_string());
        }
    }

    pub fn enable_writes(&self, table: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.disabled.remove(table);
        }
    }

    /// Fail the `nth` (zero-based) batch upsert or insert into `table`.
    /// Deletes and other writes are not counted.
    pub fn fail_batch(&self, table: &str, nth: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_batches.insert((table.to_string(), nth));
        }
    }

    pub fn payments(&self) -> Vec<NewPayment> {
        self.tables().map(|t| t.payments.clone()).unwrap_or_default()
    }

    pub fn interests(&self) -> Vec<InterestRow> {
        self.tables()
            .map(|t| t.interests.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn members(&self) -> Vec<Member> {
        self.tables()
            .map(|t| t.members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn runs(&self) -> Vec<SyncRun> {
        self.tables().map(|t| t.runs.clone()).unwrap_or_default()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    fn faults(&self) -> Result<MutexGuard<'_, Faults>, StoreError> {
        self.faults
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    fn check_writable(&self, table: &str) -> Result<(), StoreError> {
        if self.faults()?.disabled.contains(table) {
            return Err(StoreError::WritesDisabled(table.to_string()));
        }
        Ok(())
    }

    fn check_batch(&self, table: &str) -> Result<(), StoreError> {
        self.check_writable(table)?;
        let mut faults = self.faults()?;
        let calls = faults.batch_calls.entry(table.to_string()).or_default();
        let nth = *calls;
        *calls += 1;
        if faults.failing_batches.contains(&(table.to_string(), nth)) {
            return Err(StoreError::WritesDisabled(format!("{table} batch {nth}")));
        }
        Ok(())
    }
}

fn add_total(total: Decimal, amount: Decimal) -> Result<Decimal, StoreError> {
    total
        .checked_add(amount)
        .ok_or_else(|| StoreError::Other(format!("payment total overflows at {total} + {amount}")))
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn acquire_run_lock(&self) -> Result<bool, StoreError> {
        Ok(self
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok())
    }

    async fn release_run_lock(&self) -> Result<(), StoreError> {
        self.locked.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn start_run(&self, started_at: DateTime<Utc>) -> Result<i64, StoreError> {
        self.check_writable("sync_runs")?;
        let mut t = self.tables()?;
        t.next_run_id += 1;
        let id = t.next_run_id;
        t.runs.push(SyncRun::new(id, started_at));
        Ok(id)
    }

    async fn record_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        self.check_writable("sync_runs")?;
        let mut t = self.tables()?;
        match t.runs.iter_mut().find(|r| r.id == run.id) {
            Some(row) => *row = run.clone(),
            None => t.runs.push(run.clone()),
        }
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<SyncRun>, StoreError> {
        Ok(self.tables()?.runs.iter().max_by_key(|r| r.id).cloned())
    }

    async fn upsert_categories(&self, categories: &[Category]) -> Result<usize, StoreError> {
        self.check_batch("categories")?;
        let mut t = self.tables()?;
        for c in categories {
            t.categories.insert(c.id, c.clone());
        }
        Ok(categories.len())
    }

    async fn upsert_members(&self, members: &[Member]) -> Result<usize, StoreError> {
        self.check_batch("members")?;
        let mut t = self.tables()?;
        for m in members {
            t.members.insert(m.id, m.clone());
        }
        Ok(members.len())
    }

    async fn upsert_interests(&self, interests: &[InterestRow]) -> Result<usize, StoreError> {
        self.check_batch("interests")?;
        let mut t = self.tables()?;
        for i in interests {
            t.interests.insert(i.id, i.clone());
        }
        Ok(interests.len())
    }

    async fn list_payers(&self) -> Result<Vec<Payer>, StoreError> {
        Ok(self.tables()?.payers.clone())
    }

    async fn insert_payers(&self, payers: &[NewPayer]) -> Result<usize, StoreError> {
        self.check_batch("payers")?;
        let mut t = self.tables()?;
        let mut inserted = 0;
        for p in payers {
            if t.payers.iter().any(|e| e.normalized_name == p.normalized_name) {
                continue;
            }
            let id = t.payers.len() as i64 + 1;
            t.payers.push(Payer {
                id,
                name: p.name.clone(),
                normalized_name: p.normalized_name.clone(),
                payer_type: p.payer_type,
                subtype: p.subtype.clone(),
                address: p.address.clone(),
                nature_of_business: p.nature_of_business.clone(),
                manual_override: false,
                override_reason: None,
            });
            inserted += 1;
        }
        debug!(inserted, "inserted payers");
        Ok(inserted)
    }

    async fn update_payer_classification(
        &self,
        id: i64,
        payer_type: PayerType,
        subtype: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.check_writable("payers")?;
        let mut t = self.tables()?;
        let Some(payer) = t.payers.iter_mut().find(|p| p.id == id && !p.manual_override) else {
            return Ok(false);
        };
        payer.payer_type = payer_type;
        payer.subtype = subtype.map(str::to_string);
        Ok(true)
    }

    async fn set_manual_classification(
        &self,
        normalized_name: &str,
        manual: &ManualClassification,
    ) -> Result<bool, StoreError> {
        self.check_writable("payers")?;
        let mut t = self.tables()?;
        let Some(payer) = t
            .payers
            .iter_mut()
            .find(|p| p.normalized_name == normalized_name)
        else {
            return Ok(false);
        };
        payer.payer_type = manual.payer_type;
        payer.subtype = manual.subtype.clone();
        payer.manual_override = true;
        payer.override_reason = manual.reason.clone();
        Ok(true)
    }

    async fn delete_payments(&self) -> Result<usize, StoreError> {
        self.check_writable("payments")?;
        let mut t = self.tables()?;
        let deleted = t.payments.len();
        t.payments.clear();
        Ok(deleted)
    }

    async fn insert_payments(&self, payments: &[NewPayment]) -> Result<usize, StoreError> {
        self.check_batch("payments")?;
        let mut t = self.tables()?;
        t.payments.extend_from_slice(payments);
        Ok(payments.len())
    }

    async fn refresh_views(&self) -> Result<(), StoreError> {
        self.check_writable("views")?;
        let mut t = self.tables()?;

        let mut by_member: BTreeMap<u32, (Decimal, usize)> = BTreeMap::new();
        let mut by_payer: BTreeMap<i64, (Decimal, usize)> = BTreeMap::new();
        for p in &t.payments {
            let amount = p.amount.unwrap_or_default();
            let entry = by_member.entry(p.member_id).or_default();
            entry.0 = add_total(entry.0, amount)?;
            entry.1 += 1;
            if let Some(payer_id) = p.payer_id {
                let entry = by_payer.entry(payer_id).or_default();
                entry.0 = add_total(entry.0, amount)?;
                entry.1 += 1;
            }
        }

        let member_totals = by_member
            .into_iter()
            .map(|(member_id, (total_amount, payment_count))| MemberTotal {
                member_id,
                total_amount,
                payment_count,
            })
            .collect();

        let mut payer_totals: Vec<PayerTotal> = by_payer
            .into_iter()
            .filter_map(|(payer_id, (total_amount, payment_count))| {
                let payer = t.payers.iter().find(|p| p.id == payer_id)?;
                Some(PayerTotal {
                    payer_id,
                    name: payer.name.clone(),
                    payer_type: payer.payer_type,
                    total_amount,
                    payment_count,
                })
            })
            .collect();
        payer_totals.sort_by(|a, b| {
            b.total_amount
                .cmp(&a.total_amount)
                .then(a.payer_id.cmp(&b.payer_id))
        });

        t.member_totals = member_totals;
        t.payer_totals = payer_totals;
        Ok(())
    }

    async fn member_totals(&self) -> Result<Vec<MemberTotal>, StoreError> {
        Ok(self.tables()?.member_totals.clone())
    }

    async fn payer_totals(&self) -> Result<Vec<PayerTotal>, StoreError> {
        Ok(self.tables()?.payer_totals.clone())
    }

    async fn counts(&self) -> Result<TableCounts, StoreError> {
        let t = self.tables()?;
        Ok(TableCounts {
            categories: t.categories.len(),
            members: t.members.len(),
            interests: t.interests.len(),
            payers: t.payers.len(),
            payments: t.payments.len(),
        })
    }
}

//! The sync orchestrator.
//!
//! One run walks `started → categories-synced → members-synced →
//! interests-synced → payments-processed → views-refreshed → completed`.
//! Fetch errors abort the run and mark it failed. Store errors on individual
//! batches are collected on the run and the run carries on.
//!
//! Categories, members, interests and payers are upserted. Payments are
//! deleted and rebuilt from scratch, so re-running against unchanged source
//! data reproduces the same payment table.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use paytrail_classify::PayerClassifier;
use paytrail_core::{
    Category, ExtractedPayment, InterestRecord, InterestRow, Member, NewPayer, NewPayment,
    RunStage, SyncOptions, SyncRun, extract_payment, normalize_name, normalize_party,
};
use paytrail_store::{LedgerStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::{InterestQuery, RegisterSource, SyncError};

/// Drives one sync run from a [`RegisterSource`] into a [`LedgerStore`].
///
/// The classifier is passed in, already loaded with whatever overrides the
/// caller wants applied to this run.
pub struct Synchronizer<'a> {
    source: &'a dyn RegisterSource,
    store: &'a dyn LedgerStore,
    classifier: &'a PayerClassifier,
    options: SyncOptions,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        source: &'a dyn RegisterSource,
        store: &'a dyn LedgerStore,
        classifier: &'a PayerClassifier,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            classifier,
            options,
        }
    }

    /// Run one sync under the store's run lock.
    ///
    /// Returns the finished run record. A fetch failure or an expired deadline
    /// is returned as an error after the run has been recorded as failed.
    pub async fn run(&self) -> Result<SyncRun, SyncError> {
        if !self.store.acquire_run_lock().await? {
            warn!("sync already running, refusing to start");
            return Err(SyncError::AlreadyRunning);
        }

        let result = self.run_locked().await;

        if let Err(e) = self.store.release_run_lock().await {
            warn!(error = %e, "failed to release run lock");
        }
        result
    }

    async fn run_locked(&self) -> Result<SyncRun, SyncError> {
        let started_at = Utc::now();
        let id = self.store.start_run(started_at).await?;
        let mut run = SyncRun::new(id, started_at);
        info!(run_id = id, "sync run started");

        let outcome = match self.options.deadline_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), self.execute(&mut run)).await {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::TimedOut(secs)),
                }
            }
            None => self.execute(&mut run).await,
        };

        match outcome {
            Ok(()) => {
                info!(
                    run_id = id,
                    payments = run.stats.payments_inserted,
                    payers_created = run.stats.payers_created,
                    errors = run.errors.len(),
                    "sync run completed"
                );
                Ok(run)
            }
            Err(e) => {
                error!(run_id = id, stage = %run.stage, error = %e, "sync run failed");
                run.fail(e.to_string());
                self.checkpoint(&run).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, run: &mut SyncRun) -> Result<(), SyncError> {
        let (categories, members) =
            tokio::try_join!(self.source.fetch_categories(), self.source.fetch_members())?;

        self.sync_categories(run, &categories).await?;
        self.sync_members(run, members).await?;
        let interests = self.sync_interests(run, &categories).await?;
        self.process_payments(run, &interests).await?;
        self.refresh_views(run).await?;
        self.advance(run, RunStage::Completed).await
    }

    // ── Stages ──

    async fn sync_categories(&self, run: &mut SyncRun, categories: &[Category]) -> Result<(), SyncError> {
        let store = self.store;
        run.stats.categories = self
            .write_batches(run, "categories", categories, move |chunk| async move {
                store.upsert_categories(&chunk).await
            })
            .await;
        self.advance(run, RunStage::CategoriesSynced).await
    }

    async fn sync_members(&self, run: &mut SyncRun, mut members: Vec<Member>) -> Result<(), SyncError> {
        for member in &mut members {
            member.party = member.party.as_deref().map(normalize_party);
        }
        let store = self.store;
        run.stats.members = self
            .write_batches(run, "members", &members, move |chunk| async move {
                store.upsert_members(&chunk).await
            })
            .await;
        self.advance(run, RunStage::MembersSynced).await
    }

    /// Fetch every interest, swap in the richer child-expanded records for
    /// the multi-payer category, and persist them all.
    ///
    /// Returns the records to extract from: one per disclosure, sorted by id.
    async fn sync_interests(
        &self,
        run: &mut SyncRun,
        categories: &[Category],
    ) -> Result<Vec<InterestRecord>, SyncError> {
        let bulk = self.source.fetch_interests(&InterestQuery::default()).await?;
        run.stats.interests_fetched = bulk.len();
        info!(count = bulk.len(), "fetched interests");

        let detailed = match self.earnings_category(categories) {
            Some(category_id) => {
                let query = InterestQuery {
                    category_id: Some(category_id),
                    expand_child_interests: true,
                    ..Default::default()
                };
                let detailed = self.source.fetch_interests(&query).await?;
                info!(category_id, count = detailed.len(), "fetched expanded earnings interests");
                detailed
            }
            None => {
                warn!(
                    hint = %self.options.earnings_category_hint,
                    "no earnings category resolved, skipping expanded fetch"
                );
                Vec::new()
            }
        };

        let (merged, replaced) = merge_interests(bulk, detailed);
        run.stats.interests_replaced = replaced;

        let rows = interest_rows(&merged);
        let store = self.store;
        run.stats.interests_upserted = self
            .write_batches(run, "interests", &rows, move |chunk| async move {
                store.upsert_interests(&chunk).await
            })
            .await;

        let (records, nested) = drop_nested(merged);
        run.stats.interests_nested = nested;
        debug!(records = records.len(), nested, "deduplicated interests");

        self.advance(run, RunStage::InterestsSynced).await?;
        Ok(records)
    }

    async fn process_payments(&self, run: &mut SyncRun, records: &[InterestRecord]) -> Result<(), SyncError> {
        let extracted: Vec<ExtractedPayment> = records.iter().filter_map(extract_payment).collect();
        run.stats.payments_extracted = extracted.len();
        info!(count = extracted.len(), "extracted payments");

        self.reclassify_payers(run).await;
        let payer_ids = self.resolve_payers(run, &extracted).await;

        let payments: Vec<NewPayment> = extracted
            .iter()
            .map(|e| {
                let payer_id = e
                    .payer_name
                    .as_deref()
                    .and_then(|name| payer_ids.get(&normalize_name(name)))
                    .copied();
                NewPayment::from_extracted(e, payer_id, &self.options.currency)
            })
            .collect();

        match self.store.delete_payments().await {
            Ok(deleted) => {
                debug!(deleted, "cleared payments");
                let store = self.store;
                run.stats.payments_inserted = self
                    .write_batches(run, "payments", &payments, move |chunk| async move {
                        store.insert_payments(&chunk).await
                    })
                    .await;
            }
            Err(e) => {
                // Inserting on top of stale rows would duplicate them.
                warn!(error = %e, "failed to clear payments, keeping previous table");
                run.record_error("payments", None, format!("delete failed: {e}"));
            }
        }

        self.advance(run, RunStage::PaymentsProcessed).await
    }

    async fn refresh_views(&self, run: &mut SyncRun) -> Result<(), SyncError> {
        if let Err(e) = self.store.refresh_views().await {
            warn!(error = %e, "summary view refresh failed");
            run.record_error("views", None, e.to_string());
        }
        self.advance(run, RunStage::ViewsRefreshed).await
    }

    // ── Payers ──

    /// Bring existing automated payers in line with the current rules and
    /// overrides. Manual payers are skipped.
    async fn reclassify_payers(&self, run: &mut SyncRun) {
        let payers = match self.store.list_payers().await {
            Ok(payers) => payers,
            Err(e) => {
                warn!(error = %e, "could not list payers for reclassification");
                run.record_error("payers", None, e.to_string());
                return;
            }
        };

        for payer in payers.iter().filter(|p| !p.manual_override) {
            let c = self.classifier.classify(&payer.name);
            if c.payer_type == payer.payer_type && c.subtype == payer.subtype {
                continue;
            }
            match self
                .store
                .update_payer_classification(payer.id, c.payer_type, c.subtype.as_deref())
                .await
            {
                Ok(true) => {
                    debug!(payer = %payer.name, from = %payer.payer_type, to = %c.payer_type, "reclassified payer");
                    run.stats.payers_reclassified += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(payer = %payer.name, error = %e, "payer reclassification failed");
                    run.record_error("payers", None, e.to_string());
                }
            }
        }
    }

    /// Create payers for names not seen before and return the id of every
    /// known payer by normalised name.
    async fn resolve_payers(&self, run: &mut SyncRun, extracted: &[ExtractedPayment]) -> HashMap<String, i64> {
        let existing: HashSet<String> = match self.store.list_payers().await {
            Ok(payers) => payers.into_iter().map(|p| p.normalized_name).collect(),
            Err(e) => {
                warn!(error = %e, "could not list payers");
                run.record_error("payers", None, e.to_string());
                return HashMap::new();
            }
        };

        // First spelling seen for a key names the payer.
        let mut fresh: BTreeMap<String, NewPayer> = BTreeMap::new();
        for e in extracted {
            let Some(name) = e.payer_name.as_deref().map(str::trim) else {
                continue;
            };
            let key = normalize_name(name);
            if key.is_empty() || existing.contains(&key) || fresh.contains_key(&key) {
                continue;
            }
            let c = self.classifier.classify(name);
            fresh.insert(
                key.clone(),
                NewPayer {
                    name: name.to_string(),
                    normalized_name: key,
                    payer_type: c.payer_type,
                    subtype: c.subtype,
                    address: e.payer_address.clone(),
                    nature_of_business: e.payer_nature_of_business.clone(),
                },
            );
        }

        let fresh: Vec<NewPayer> = fresh.into_values().collect();
        let store = self.store;
        run.stats.payers_created = self
            .write_batches(run, "payers", &fresh, move |chunk| async move {
                store.insert_payers(&chunk).await
            })
            .await;

        match self.store.list_payers().await {
            Ok(payers) => payers
                .into_iter()
                .map(|p| (p.normalized_name, p.id))
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list payers after insert");
                run.record_error("payers", None, e.to_string());
                HashMap::new()
            }
        }
    }

    // ── Helpers ──

    fn earnings_category(&self, categories: &[Category]) -> Option<u32> {
        if let Some(id) = self.options.earnings_category_id {
            return Some(id);
        }
        let hint = self.options.earnings_category_hint.to_lowercase();
        if hint.is_empty() {
            return None;
        }
        categories
            .iter()
            .find(|c| c.name.to_lowercase().contains(&hint))
            .map(|c| c.id)
    }

    /// Write `rows` in batches. A failed batch is recorded on the run and
    /// skipped. Returns the number of rows written.
    async fn write_batches<T, F, Fut>(&self, run: &mut SyncRun, scope: &str, rows: &[T], write: F) -> usize
    where
        T: Clone,
        F: Fn(Vec<T>) -> Fut,
        Fut: Future<Output = Result<usize, StoreError>>,
    {
        let mut written = 0;
        for (chunk, batch) in rows.chunks(self.options.batch()).enumerate() {
            match write(batch.to_vec()).await {
                Ok(n) => {
                    debug!(scope, chunk, rows = n, "wrote batch");
                    written += n;
                }
                Err(e) => {
                    warn!(scope, chunk, error = %e, "batch write failed");
                    run.record_error(scope, Some(chunk), e.to_string());
                }
            }
        }
        info!(scope, written, "persisted");
        written
    }

    async fn advance(&self, run: &mut SyncRun, stage: RunStage) -> Result<(), SyncError> {
        run.advance(stage)?;
        info!(run_id = run.id, stage = %stage, "run stage");
        self.checkpoint(run).await;
        Ok(())
    }

    /// Persist the run record. Failures only cost the log row.
    async fn checkpoint(&self, run: &SyncRun) {
        if let Err(e) = self.store.record_run(run).await {
            warn!(run_id = run.id, error = %e, "failed to record run");
        }
    }
}

/// Overlay `detailed` on `bulk` by id. Returns the merged records in id order
/// and how many bulk records were replaced.
fn merge_interests(bulk: Vec<InterestRecord>, detailed: Vec<InterestRecord>) -> (Vec<InterestRecord>, usize) {
    let mut by_id: BTreeMap<u64, InterestRecord> = bulk.into_iter().map(|r| (r.id, r)).collect();
    let mut replaced = 0;
    for record in detailed {
        if by_id.insert(record.id, record).is_some() {
            replaced += 1;
        }
    }
    (by_id.into_values().collect(), replaced)
}

/// Drop top-level records that also appear nested under another record, so
/// a disclosure is only extracted as part of its parent.
fn drop_nested(records: Vec<InterestRecord>) -> (Vec<InterestRecord>, usize) {
    let nested: HashSet<u64> = records.iter().flat_map(|r| r.descendant_ids()).collect();
    let before = records.len();
    let kept: Vec<InterestRecord> = records.into_iter().filter(|r| !nested.contains(&r.id)).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Every interest, nested or not, as a storable row keyed by id.
fn interest_rows(records: &[InterestRecord]) -> Vec<InterestRow> {
    fn walk(record: &InterestRecord, parent: Option<u64>, rows: &mut BTreeMap<u64, InterestRow>) {
        let mut row = InterestRow::from_record(record);
        if row.parent_interest_id.is_none() {
            row.parent_interest_id = parent;
        }
        rows.entry(record.id).or_insert(row);
        for child in &record.child_interests {
            walk(child, Some(record.id), rows);
        }
    }

    let mut rows = BTreeMap::new();
    for record in records {
        walk(record, None, &mut rows);
    }
    rows.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticSource;
    use paytrail_classify::Override;
    use paytrail_core::{Field, MemberRef, PayerType, ScalarValue};
    use paytrail_store::{ManualClassification, MemoryStore};
    use rust_decimal::Decimal;

    const EARNINGS: u32 = 12;
    const GIFTS: u32 = 3;

    fn category(id: u32) -> Category {
        let name = if id == EARNINGS {
            "Employment and earnings"
        } else {
            "Gifts, benefits and hospitality from UK sources"
        };
        Category {
            id,
            number: None,
            name: name.into(),
            parent_category_ids: vec![],
        }
    }

    fn interest(id: u64, category_id: u32, fields: Vec<Field>, children: Vec<InterestRecord>) -> InterestRecord {
        InterestRecord {
            id,
            summary: Some(format!("Interest {id}")),
            parent_interest_id: None,
            registration_date: Some("2024-05-01".into()),
            published_date: None,
            category: category(category_id),
            member: MemberRef {
                id: 4000,
                name_display_as: Some("Jane Example".into()),
                party: None,
                member_from: None,
            },
            fields,
            child_interests: children,
        }
    }

    fn fixture() -> StaticSource {
        StaticSource {
            categories: vec![category(EARNINGS), category(GIFTS)],
            members: vec![Member {
                id: 4000,
                name: "Jane Example".into(),
                party: Some("Labour (Co-op)".into()),
                constituency: Some("Example North".into()),
            }],
            interests: vec![
                interest(
                    101,
                    EARNINGS,
                    vec![Field::text("PayerName", "Acme Ltd")],
                    vec![
                        interest(102, EARNINGS, vec![Field::text("Value", "£1,000"), Field::text("HoursWorked", "4")], vec![]),
                        interest(103, EARNINGS, vec![Field::text("Value", "£500")], vec![]),
                    ],
                ),
                interest(
                    201,
                    GIFTS,
                    vec![Field::groups(
                        "Donors",
                        vec![
                            vec![
                                Field::scalar("Value", ScalarValue::Number(1000.0)),
                                Field::text("Name", "Friends of Example Ltd"),
                            ],
                            vec![Field::scalar("Value", ScalarValue::Number(2000.0))],
                        ],
                    )],
                    vec![],
                ),
                interest(
                    301,
                    EARNINGS,
                    vec![Field::text("Payer", "ACME LTD."), Field::text("Payment", "£250")],
                    vec![],
                ),
                interest(401, EARNINGS, vec![Field::text("Value", "£99")], vec![]),
            ],
            ..Default::default()
        }
    }

    async fn sync(source: &StaticSource, store: &MemoryStore, classifier: &PayerClassifier) -> Result<SyncRun, SyncError> {
        Synchronizer::new(source, store, classifier, SyncOptions::default())
            .run()
            .await
    }

    #[tokio::test]
    async fn full_run_extracts_and_links_payers() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();

        let run = sync(&source, &store, &classifier).await.unwrap();
        assert_eq!(run.stage, RunStage::Completed);
        assert!(run.errors.is_empty(), "{:?}", run.errors);
        assert_eq!(run.stats.interests_replaced, 3);
        assert_eq!(run.stats.interests_nested, 2);
        assert_eq!(run.stats.interests_upserted, 6);

        let payments = store.payments();
        let ids: Vec<u64> = payments.iter().map(|p| p.interest_id).collect();
        assert_eq!(ids, vec![101, 201, 301, 401]);

        let donors = &payments[1];
        assert_eq!(donors.amount, Some(Decimal::from(3000)));
        assert!(donors.is_donation);

        let payers = store.list_payers().await.unwrap();
        let keys: Vec<&str> = payers.iter().map(|p| p.normalized_name.as_str()).collect();
        assert_eq!(keys, vec!["acme ltd", "friends of example ltd"]);
        assert_eq!(payers[1].subtype.as_deref(), Some("Advocacy Group"));

        // Both spellings of Acme resolve to one payer.
        assert_eq!(payments[0].payer_id, payments[2].payer_id);
        assert!(payments[3].payer_id.is_none());

        assert_eq!(store.members()[0].party.as_deref(), Some("Labour"));
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();

        sync(&source, &store, &classifier).await.unwrap();
        let first_payments = store.payments();
        let first_payers = store.list_payers().await.unwrap();

        let second = sync(&source, &store, &classifier).await.unwrap();
        assert_eq!(store.payments(), first_payments);
        assert_eq!(store.list_payers().await.unwrap(), first_payers);
        assert_eq!(second.stats.payers_created, 0);
        assert_eq!(store.runs().len(), 2);
    }

    #[tokio::test]
    async fn payer_links_match_payment_names() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();
        sync(&source, &store, &classifier).await.unwrap();

        let payers = store.list_payers().await.unwrap();
        for payment in store.payments() {
            if let Some(payer_id) = payment.payer_id {
                let payer = payers.iter().find(|p| p.id == payer_id).unwrap();
                let name = payment.payer_name.as_deref().unwrap();
                assert_eq!(payer.normalized_name, normalize_name(name));
            }
        }
    }

    #[tokio::test]
    async fn second_run_is_refused_while_locked() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();

        assert!(store.acquire_run_lock().await.unwrap());
        let result = sync(&source, &store, &classifier).await;
        assert!(matches!(result, Err(SyncError::AlreadyRunning)));
        assert!(store.is_locked());
        assert!(store.runs().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_run() {
        let source = StaticSource {
            unavailable: true,
            ..fixture()
        };
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();

        let result = sync(&source, &store, &classifier).await;
        assert!(matches!(result, Err(SyncError::Unavailable(_))));

        let runs = store.runs();
        assert_eq!(runs[0].stage, RunStage::Failed);
        assert!(runs[0].failure.as_deref().unwrap().contains("unavailable"));
        assert!(store.payments().is_empty());
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn store_errors_do_not_abort_the_run() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();
        store.disable_writes("views");
        store.disable_writes("members");

        let run = sync(&source, &store, &classifier).await.unwrap();
        assert_eq!(run.stage, RunStage::Completed);
        let scopes: Vec<&str> = run.errors.iter().map(|e| e.scope.as_str()).collect();
        assert_eq!(scopes, vec!["members", "views"]);
        assert_eq!(store.payments().len(), 4);
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_later_batches() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();
        store.fail_batch("payments", 2);
        let options = SyncOptions {
            batch_size: 1,
            ..Default::default()
        };

        let run = Synchronizer::new(&source, &store, &classifier, options)
            .run()
            .await
            .unwrap();
        assert_eq!(run.stage, RunStage::Completed);
        assert_eq!(run.errors.len(), 1, "{:?}", run.errors);
        assert_eq!(run.errors[0].scope, "payments");
        assert_eq!(run.errors[0].chunk, Some(2));
        assert_eq!(run.stats.payments_inserted, 3);

        let ids: Vec<u64> = store.payments().iter().map(|p| p.interest_id).collect();
        assert_eq!(ids, vec![101, 201, 401]);
    }

    #[tokio::test]
    async fn failed_payment_clear_keeps_previous_table() {
        let source = fixture();
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();
        sync(&source, &store, &classifier).await.unwrap();

        store.disable_writes("payments");
        let run = sync(&source, &store, &classifier).await.unwrap();
        assert_eq!(run.stats.payments_inserted, 0);
        assert_eq!(run.errors[0].scope, "payments");
        assert_eq!(store.payments().len(), 4);
    }

    #[tokio::test]
    async fn overrides_reclassify_automated_payers_only() {
        let source = fixture();
        let store = MemoryStore::new();
        let mut classifier = PayerClassifier::new().unwrap();
        sync(&source, &store, &classifier).await.unwrap();

        let manual = ManualClassification {
            payer_type: PayerType::Government,
            subtype: Some("Checked by hand".into()),
            reason: None,
        };
        store
            .set_manual_classification("friends of example ltd", &manual)
            .await
            .unwrap();

        classifier.load_overrides(vec![
            Override::new("acme", PayerType::Individual, None),
            Override::new("friends of example", PayerType::Individual, None),
        ]);
        let run = sync(&source, &store, &classifier).await.unwrap();
        assert_eq!(run.stats.payers_reclassified, 1);

        let payers = store.list_payers().await.unwrap();
        assert_eq!(payers[0].payer_type, PayerType::Individual);
        assert_eq!(payers[1].payer_type, PayerType::Government);
    }

    #[tokio::test]
    async fn deadline_marks_run_failed() {
        let source = StaticSource {
            latency: Some(Duration::from_millis(1500)),
            ..fixture()
        };
        let store = MemoryStore::new();
        let classifier = PayerClassifier::new().unwrap();
        let options = SyncOptions {
            deadline_secs: Some(1),
            ..Default::default()
        };

        let result = Synchronizer::new(&source, &store, &classifier, options).run().await;
        assert!(matches!(result, Err(SyncError::TimedOut(1))));
        assert_eq!(store.runs()[0].stage, RunStage::Failed);
        assert!(!store.is_locked());
    }

    #[test]
    fn merge_replaces_by_id() {
        let bulk = vec![
            interest(2, GIFTS, vec![], vec![]),
            interest(1, EARNINGS, vec![], vec![]),
        ];
        let detailed = vec![interest(1, EARNINGS, vec![Field::text("Value", "1")], vec![])];
        let (merged, replaced) = merge_interests(bulk, detailed);
        assert_eq!(replaced, 1);
        assert_eq!(merged[0].id, 1);
        assert_eq!(merged[0].fields.len(), 1);
        assert_eq!(merged[1].id, 2);
    }

    #[test]
    fn nested_children_are_dropped_from_top_level() {
        let records = vec![
            interest(1, EARNINGS, vec![], vec![interest(2, EARNINGS, vec![], vec![])]),
            interest(2, EARNINGS, vec![], vec![]),
            interest(3, EARNINGS, vec![], vec![]),
        ];
        let (kept, dropped) = drop_nested(records);
        assert_eq!(dropped, 1);
        let ids: Vec<u64> = kept.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn interest_rows_include_nested_children() {
        let records = vec![interest(1, EARNINGS, vec![], vec![interest(2, EARNINGS, vec![], vec![])])];
        let rows = interest_rows(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].parent_interest_id, Some(1));
    }
}

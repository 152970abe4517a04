//! DuckDB ledger store.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use duckdb::{Connection, params};
use paytrail_core::{Category, InterestRow, Member, NewPayer, NewPayment, Payer, PayerType, SyncRun};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{LedgerStore, ManualClassification, MemberTotal, PayerTotal, StoreError, TableCounts};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    number VARCHAR,
    name VARCHAR NOT NULL,
    parent_id INTEGER
);
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL,
    party VARCHAR,
    constituency VARCHAR
);
CREATE TABLE IF NOT EXISTS interests (
    id BIGINT PRIMARY KEY,
    member_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    parent_interest_id BIGINT,
    summary VARCHAR,
    registration_date VARCHAR,
    published_date VARCHAR,
    fields_json VARCHAR
);
CREATE SEQUENCE IF NOT EXISTS payer_id_seq START 1;
CREATE TABLE IF NOT EXISTS payers (
    id BIGINT PRIMARY KEY DEFAULT nextval('payer_id_seq'),
    name VARCHAR NOT NULL,
    normalized_name VARCHAR NOT NULL UNIQUE,
    payer_type VARCHAR NOT NULL,
    subtype VARCHAR,
    address VARCHAR,
    nature_of_business VARCHAR,
    manual_override BOOLEAN NOT NULL DEFAULT false,
    override_reason VARCHAR
);
CREATE TABLE IF NOT EXISTS payments (
    interest_id BIGINT NOT NULL,
    member_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    amount DECIMAL(18, 2),
    currency VARCHAR NOT NULL,
    payer_id BIGINT,
    payer_name VARCHAR,
    payer_address VARCHAR,
    payer_nature_of_business VARCHAR,
    role_description VARCHAR,
    hours_worked DOUBLE,
    hourly_rate DECIMAL(18, 2),
    payment_type VARCHAR,
    regularity VARCHAR,
    start_date DATE,
    end_date DATE,
    received_date DATE,
    is_donation BOOLEAN NOT NULL
);
CREATE SEQUENCE IF NOT EXISTS sync_run_id_seq START 1;
CREATE TABLE IF NOT EXISTS sync_runs (
    id BIGINT PRIMARY KEY,
    started_at TIMESTAMP NOT NULL,
    completed_at TIMESTAMP,
    status VARCHAR NOT NULL,
    stats_json VARCHAR,
    errors_json VARCHAR,
    failure VARCHAR
);
CREATE TABLE IF NOT EXISTS sync_lock (
    id INTEGER PRIMARY KEY,
    acquired_at TIMESTAMP NOT NULL
);
CREATE TABLE IF NOT EXISTS member_payment_totals (
    member_id INTEGER,
    total_amount DECIMAL(18, 2),
    payment_count BIGINT
);
CREATE TABLE IF NOT EXISTS payer_payment_totals (
    payer_id BIGINT,
    name VARCHAR,
    payer_type VARCHAR,
    total_amount DECIMAL(18, 2),
    payment_count BIGINT
);
";

const REFRESH_VIEWS: &str = "
CREATE OR REPLACE TABLE member_payment_totals AS
SELECT member_id,
       CAST(COALESCE(SUM(amount), 0) AS DECIMAL(18, 2)) AS total_amount,
       COUNT(*) AS payment_count
FROM payments
GROUP BY member_id;
CREATE OR REPLACE TABLE payer_payment_totals AS
SELECT p.payer_id,
       py.name,
       py.payer_type,
       CAST(COALESCE(SUM(p.amount), 0) AS DECIMAL(18, 2)) AS total_amount,
       COUNT(*) AS payment_count
FROM payments p
JOIN payers py ON py.id = p.payer_id
GROUP BY p.payer_id, py.name, py.payer_type;
";

/// DuckDB-backed ledger.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// The schema is created on open, so a fresh file is usable immediately.
///
/// The run lock is a row in `sync_lock`. A row older than the lock TTL is
/// treated as left behind by a crashed run and is taken over.
pub struct DuckStore {
    conn: Mutex<Connection>,
    lock_ttl: TimeDelta,
}

/// Default age after which a run lock is considered stale.
const DEFAULT_LOCK_TTL: TimeDelta = TimeDelta::hours(6);

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open(path)?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            lock_ttl: DEFAULT_LOCK_TTL,
        })
    }

    /// Replace the stale-lock age.
    pub fn with_lock_ttl(mut self, ttl: TimeDelta) -> Self {
        self.lock_ttl = ttl;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    // ── Counts ──

    fn count_table(conn: &Connection, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let mut stmt = conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Lookups ──

    /// Fetch a payer row as Arrow, for display.
    pub fn payer_batch(&self, normalized_name: &str) -> Result<RecordBatch, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT py.*,
                    t.total_amount,
                    t.payment_count
             FROM payers py
             LEFT JOIN payer_payment_totals t ON t.payer_id = py.id
             WHERE py.normalized_name = ?",
        )?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([normalized_name])?.collect();
        let batch = batches.into_iter().next().ok_or(StoreError::NoResults)?;
        if batch.num_rows() == 0 {
            return Err(StoreError::NoResults);
        }
        Ok(batch)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref()
}

fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn date_text(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

fn timestamp_text(value: DateTime<Utc>) -> String {
    value.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_timestamp(column: &'static str, value: String) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|_| StoreError::BadValue {
            table: "sync_runs",
            column,
            value,
        })
}

fn parse_payer_type(value: String) -> Result<PayerType, StoreError> {
    PayerType::from_str(&value).map_err(|_| StoreError::BadValue {
        table: "payers",
        column: "payer_type",
        value,
    })
}

fn parse_total(table: &'static str, value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str(&value).map_err(|_| StoreError::BadValue {
        table,
        column: "total_amount",
        value,
    })
}

#[async_trait]
impl LedgerStore for DuckStore {
    async fn acquire_run_lock(&self) -> Result<bool, StoreError> {
        let now = Utc::now();
        let cutoff = now - self.lock_ttl;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let expired = tx.execute(
            "DELETE FROM sync_lock WHERE acquired_at < CAST(? AS TIMESTAMP)",
            params![timestamp_text(cutoff)],
        )?;
        if expired > 0 {
            warn!(ttl_secs = self.lock_ttl.num_seconds(), "taking over stale run lock");
        }
        let inserted = tx.execute(
            "INSERT INTO sync_lock VALUES (1, CAST(? AS TIMESTAMP)) ON CONFLICT DO NOTHING",
            params![timestamp_text(now)],
        )?;
        tx.commit()?;
        Ok(inserted == 1)
    }

    async fn release_run_lock(&self) -> Result<(), StoreError> {
        self.conn()?.execute("DELETE FROM sync_lock", [])?;
        Ok(())
    }

    async fn start_run(&self, started_at: DateTime<Utc>) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let id: i64 = conn.query_row("SELECT nextval('sync_run_id_seq')", [], |row| row.get(0))?;
        conn.execute(
            "INSERT INTO sync_runs (id, started_at, status) VALUES (?, CAST(? AS TIMESTAMP), 'started')",
            params![id, timestamp_text(started_at)],
        )?;
        Ok(id)
    }

    async fn record_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        let stats = serde_json::to_string(&run.stats)?;
        let errors = serde_json::to_string(&run.errors)?;
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sync_runs
             SET completed_at = CAST(? AS TIMESTAMP), status = ?, stats_json = ?,
                 errors_json = ?, failure = ?
             WHERE id = ?",
            params![
                run.completed_at.map(timestamp_text),
                run.stage.as_str(),
                stats,
                errors,
                text(&run.failure),
                run.id
            ],
        )?;
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<SyncRun>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, CAST(started_at AS VARCHAR), CAST(completed_at AS VARCHAR),
                    status, stats_json, errors_json, failure
             FROM sync_runs ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;
        let Some(row) = rows.next() else {
            return Ok(None);
        };
        let (id, started_at, completed_at, status, stats, errors, failure) = row?;

        let stage = serde_json::from_value(serde_json::Value::String(status.clone())).map_err(|_| {
            StoreError::BadValue {
                table: "sync_runs",
                column: "status",
                value: status,
            }
        })?;
        Ok(Some(SyncRun {
            id,
            started_at: parse_timestamp("started_at", started_at)?,
            completed_at: completed_at
                .map(|t| parse_timestamp("completed_at", t))
                .transpose()?,
            stage,
            stats: stats.map(|s| serde_json::from_str(&s)).transpose()?.unwrap_or_default(),
            errors: errors.map(|e| serde_json::from_str(&e)).transpose()?.unwrap_or_default(),
            failure,
        }))
    }

    async fn upsert_categories(&self, categories: &[Category]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO categories VALUES (?, ?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET
                    number = excluded.number,
                    name = excluded.name,
                    parent_id = excluded.parent_id",
            )?;
            for c in categories {
                stmt.execute(params![c.id, text(&c.number), c.name, c.parent_id()])?;
            }
        }
        tx.commit()?;
        debug!(count = categories.len(), "upserted categories");
        Ok(categories.len())
    }

    async fn upsert_members(&self, members: &[Member]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO members VALUES (?, ?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    party = excluded.party,
                    constituency = excluded.constituency",
            )?;
            for m in members {
                stmt.execute(params![m.id, m.name, text(&m.party), text(&m.constituency)])?;
            }
        }
        tx.commit()?;
        debug!(count = members.len(), "upserted members");
        Ok(members.len())
    }

    async fn upsert_interests(&self, interests: &[InterestRow]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO interests VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (id) DO UPDATE SET
                    member_id = excluded.member_id,
                    category_id = excluded.category_id,
                    parent_interest_id = excluded.parent_interest_id,
                    summary = excluded.summary,
                    registration_date = excluded.registration_date,
                    published_date = excluded.published_date,
                    fields_json = excluded.fields_json",
            )?;
            for i in interests {
                stmt.execute(params![
                    i.id as i64,
                    i.member_id,
                    i.category_id,
                    i.parent_interest_id.map(|p| p as i64),
                    text(&i.summary),
                    text(&i.registration_date),
                    text(&i.published_date),
                    i.fields_json
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = interests.len(), "upserted interests");
        Ok(interests.len())
    }

    async fn list_payers(&self) -> Result<Vec<Payer>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, normalized_name, payer_type, subtype, address,
                    nature_of_business, manual_override, override_reason
             FROM payers ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, Option<String>>(8)?,
            ))
        })?;

        let mut payers = Vec::new();
        for row in rows {
            let (id, name, normalized_name, payer_type, subtype, address, nature, manual, reason) = row?;
            payers.push(Payer {
                id,
                name,
                normalized_name,
                payer_type: parse_payer_type(payer_type)?,
                subtype,
                address,
                nature_of_business: nature,
                manual_override: manual,
                override_reason: reason,
            });
        }
        Ok(payers)
    }

    async fn insert_payers(&self, payers: &[NewPayer]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO payers (name, normalized_name, payer_type, subtype, address, nature_of_business)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (normalized_name) DO NOTHING",
            )?;
            for p in payers {
                inserted += stmt.execute(params![
                    p.name,
                    p.normalized_name,
                    p.payer_type.as_str(),
                    text(&p.subtype),
                    text(&p.address),
                    text(&p.nature_of_business)
                ])?;
            }
        }
        tx.commit()?;
        debug!(inserted, "inserted payers");
        Ok(inserted)
    }

    async fn update_payer_classification(
        &self,
        id: i64,
        payer_type: PayerType,
        subtype: Option<&str>,
    ) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE payers SET payer_type = ?, subtype = ?
             WHERE id = ? AND NOT manual_override",
            params![payer_type.as_str(), subtype, id],
        )?;
        Ok(changed > 0)
    }

    async fn set_manual_classification(
        &self,
        normalized_name: &str,
        manual: &ManualClassification,
    ) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE payers
             SET payer_type = ?, subtype = ?, manual_override = true, override_reason = ?
             WHERE normalized_name = ?",
            params![
                manual.payer_type.as_str(),
                text(&manual.subtype),
                text(&manual.reason),
                normalized_name
            ],
        )?;
        Ok(changed > 0)
    }

    async fn delete_payments(&self) -> Result<usize, StoreError> {
        let deleted = self.conn()?.execute("DELETE FROM payments", [])?;
        info!(deleted, "cleared payments");
        Ok(deleted)
    }

    async fn insert_payments(&self, payments: &[NewPayment]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO payments VALUES (
                    ?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, ?, ?, ?,
                    CAST(? AS DOUBLE), CAST(? AS DECIMAL(18, 2)), ?, ?,
                    CAST(? AS DATE), CAST(? AS DATE), CAST(? AS DATE), ?
                 )",
            )?;
            for p in payments {
                stmt.execute(params![
                    p.interest_id as i64,
                    p.member_id,
                    p.category_id,
                    decimal_text(p.amount),
                    p.currency,
                    p.payer_id,
                    text(&p.payer_name),
                    text(&p.payer_address),
                    text(&p.payer_nature_of_business),
                    text(&p.role_description),
                    decimal_text(p.hours_worked),
                    decimal_text(p.hourly_rate),
                    text(&p.payment_type),
                    text(&p.regularity),
                    date_text(p.start_date),
                    date_text(p.end_date),
                    date_text(p.received_date),
                    p.is_donation
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = payments.len(), "inserted payments");
        Ok(payments.len())
    }

    async fn refresh_views(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(REFRESH_VIEWS)?;
        info!("refreshed summary views");
        Ok(())
    }

    async fn member_totals(&self) -> Result<Vec<MemberTotal>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT member_id, CAST(total_amount AS VARCHAR), payment_count
             FROM member_payment_totals ORDER BY member_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut totals = Vec::new();
        for row in rows {
            let (member_id, total, count) = row?;
            totals.push(MemberTotal {
                member_id: member_id as u32,
                total_amount: parse_total("member_payment_totals", total)?,
                payment_count: count as usize,
            });
        }
        Ok(totals)
    }

    async fn payer_totals(&self) -> Result<Vec<PayerTotal>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT payer_id, name, payer_type, CAST(total_amount AS VARCHAR), payment_count
             FROM payer_payment_totals ORDER BY total_amount DESC, payer_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        let mut totals = Vec::new();
        for row in rows {
            let (payer_id, name, payer_type, total, count) = row?;
            totals.push(PayerTotal {
                payer_id,
                name,
                payer_type: parse_payer_type(payer_type)?,
                total_amount: parse_total("payer_payment_totals", total)?,
                payment_count: count as usize,
            });
        }
        Ok(totals)
    }

    async fn counts(&self) -> Result<TableCounts, StoreError> {
        let conn = self.conn()?;
        Ok(TableCounts {
            categories: Self::count_table(&conn, "categories")?,
            members: Self::count_table(&conn, "members")?,
            interests: Self::count_table(&conn, "interests")?,
            payers: Self::count_table(&conn, "payers")?,
            payments: Self::count_table(&conn, "payments")?,
        })
    }
}

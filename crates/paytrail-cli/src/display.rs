//! Vertical card display for payers and sync runs.
//!
//! Payer cards render a single-row RecordBatch grouped into sections, with
//! type-aware formatting for strings, integers, booleans and decimals.

use arrow::array::{Array, BooleanArray, Int32Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use arrow::util::display::ArrayFormatter;
use paytrail_core::{ExtractedPayment, SyncRun};
use paytrail_store::TableCounts;

const MAX_ERRORS: usize = 10;

// ── Payer sections ──

const IDENTITY: &[&str] = &["id", "name", "normalized_name"];

const CLASSIFICATION: &[&str] = &["payer_type", "subtype", "manual_override", "override_reason"];

const DETAILS: &[&str] = &["address", "nature_of_business"];

const TOTALS: &[&str] = &["total_amount", "payment_count"];

// ── Public API ──

/// Print a single payer row as a vertical card grouped by section.
pub fn print_payer_card(batch: &RecordBatch) {
    let name = get_utf8(batch, "name").unwrap_or_default();
    let payer_type = get_utf8(batch, "payer_type").unwrap_or_default();

    println!("=== {name} ===");
    if !payer_type.is_empty() {
        println!("{payer_type}");
    }
    println!();

    print_section(batch, "Identity", IDENTITY);
    print_section(batch, "Classification", CLASSIFICATION);
    print_section(batch, "Details", DETAILS);
    print_section(batch, "Payment Totals", TOTALS);
}

/// Print the outcome of a sync run.
pub fn print_run_report(run: &SyncRun, counts: Option<&TableCounts>) {
    println!("=== Sync run {} ===", run.id);
    println!("{}", run.stage);
    println!();

    println!("Timing");
    row("started_at", run.started_at.to_rfc3339());
    if let Some(completed) = run.completed_at {
        row("completed_at", completed.to_rfc3339());
        row("elapsed_secs", (completed - run.started_at).num_milliseconds() as f64 / 1000.0);
    }
    println!();

    let s = &run.stats;
    println!("Fetched");
    row("categories", s.categories);
    row("members", s.members);
    row("interests_fetched", s.interests_fetched);
    row("interests_replaced", s.interests_replaced);
    row("interests_nested", s.interests_nested);
    row("interests_upserted", s.interests_upserted);
    println!();

    println!("Payments");
    row("payments_extracted", s.payments_extracted);
    row("payments_inserted", s.payments_inserted);
    row("payers_created", s.payers_created);
    row("payers_reclassified", s.payers_reclassified);
    println!();

    if let Some(c) = counts {
        println!("Ledger");
        row("categories", c.categories);
        row("members", c.members);
        row("interests", c.interests);
        row("payers", c.payers);
        row("payments", c.payments);
        println!();
    }

    if !run.errors.is_empty() {
        println!("Errors ({})", run.errors.len());
        for e in run.errors.iter().take(MAX_ERRORS) {
            println!("  {e}");
        }
        if run.errors.len() > MAX_ERRORS {
            println!("  ... and {} more", run.errors.len() - MAX_ERRORS);
        }
        println!();
    }
    if let Some(failure) = &run.failure {
        println!("Failure");
        println!("  {failure}");
    }
}

/// Print one extracted payment as a compact block.
pub fn print_payment(p: &ExtractedPayment) {
    println!("interest {} (member {}, category {})", p.interest_id, p.member_id, p.category_id);
    opt_row("amount", p.amount.map(|a| a.to_string()));
    opt_row("amount_raw", p.amount_raw.clone());
    opt_row("payer_name", p.payer_name.clone());
    opt_row("payer_address", p.payer_address.clone());
    opt_row("nature_of_business", p.payer_nature_of_business.clone());
    opt_row("payer_status", p.payer_status.clone());
    opt_row("role_description", p.role_description.clone());
    opt_row("hours_worked", p.hours_worked.map(|h| h.to_string()));
    opt_row("hours_period", p.hours_period.clone());
    opt_row("hourly_rate", p.hourly_rate.map(|r| r.to_string()));
    opt_row("payment_type", p.payment_type.clone());
    opt_row("regularity", p.regularity.clone());
    opt_row("start_date", p.start_date.map(|d| d.to_string()));
    opt_row("end_date", p.end_date.map(|d| d.to_string()));
    opt_row("received_date", p.received_date.map(|d| d.to_string()));
    if p.is_donation {
        row("is_donation", "yes");
    }
    println!();
}

// ── Section rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) {
    let has_data = cols.iter().any(|&col| {
        batch
            .schema()
            .index_of(col)
            .ok()
            .is_some_and(|i| !batch.column(i).is_null(0))
    });
    if !has_data {
        return;
    }

    println!("{header}");
    for &col_name in cols {
        let Ok(idx) = batch.schema().index_of(col_name) else {
            continue;
        };
        let col = batch.column(idx);
        if col.is_null(0) {
            continue;
        }

        match col.data_type() {
            DataType::Utf8 => {
                if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
                    row(col_name, arr.value(0));
                }
            }
            DataType::Int32 => {
                if let Some(arr) = col.as_any().downcast_ref::<Int32Array>() {
                    row(col_name, arr.value(0));
                }
            }
            DataType::Int64 => {
                if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
                    row(col_name, arr.value(0));
                }
            }
            DataType::Boolean => {
                if let Some(arr) = col.as_any().downcast_ref::<BooleanArray>() {
                    row(col_name, if arr.value(0) { "yes" } else { "no" });
                }
            }
            // Decimals, dates and anything else go through Arrow's formatter.
            _ => match ArrayFormatter::try_new(col.as_ref(), &Default::default()) {
                Ok(fmt) => row(col_name, fmt.value(0)),
                Err(_) => row(col_name, format!("({})", col.data_type())),
            },
        }
    }
    println!();
}

// ── Helpers ──

fn row(label: &str, value: impl std::fmt::Display) {
    println!("  {:<26} {}", label, value);
}

fn opt_row(label: &str, value: Option<String>) {
    if let Some(v) = value {
        row(label, v);
    }
}

fn get_utf8(batch: &RecordBatch, col_name: &str) -> Option<String> {
    let idx = batch.schema().index_of(col_name).ok()?;
    let col = batch.column(idx);
    if col.is_null(0) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(0).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::datatypes::{Field, Schema};

    fn payer_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("payer_type", DataType::Utf8, false),
            Field::new("subtype", DataType::Utf8, true),
            Field::new("manual_override", DataType::Boolean, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1])),
                Arc::new(StringArray::from(vec!["Acme Ltd"])),
                Arc::new(StringArray::from(vec!["Company"])),
                Arc::new(StringArray::from(vec![None::<&str>])),
                Arc::new(BooleanArray::from(vec![false])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn get_utf8_reads_first_row() {
        let batch = payer_batch();
        assert_eq!(get_utf8(&batch, "name").as_deref(), Some("Acme Ltd"));
        assert_eq!(get_utf8(&batch, "subtype"), None);
        assert_eq!(get_utf8(&batch, "missing"), None);
    }

    #[test]
    fn card_renders_without_optional_columns() {
        // Sections whose columns are absent are skipped rather than failing.
        print_payer_card(&payer_batch());
    }
}

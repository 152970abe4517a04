//! Field extraction: recover one canonical payment from an interest's
//! arbitrarily named, arbitrarily nested field list.
//!
//! # Algorithm
//!
//! 1. Build a field pool from the interest's own fields, every child
//!    interest's fields, and the inner fields of any flat nested `values`.
//! 2. Donor-array pass: a `Donors`/`Payers`/`Sources`/`Funders` field holding
//!    one field list per payer is summarised. Numeric values are summed across
//!    every donor; name, address and payment type take the first non-empty
//!    occurrence.
//! 3. Direct-field pass: each attribute is looked up through its synonym
//!    list, exact names first and then loose containment (see [`find`]).
//! 4. Fallback merge: amount, payer name, address and payment type fall back
//!    to the donor-array summary; role falls back to the interest summary.
//! 5. Derived fields: hours, hourly rate, dates and the donation flag.
//!
//! Nothing here fails. Unresolvable attributes are `None`, and an interest
//! with no usable field at all yields no payment.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::trace;

use crate::currency::parse_amount;
use crate::dates::parse_date_value;
use crate::interest::{Field, FieldValues, InterestRecord, ScalarValue};
use crate::ledger::ExtractedPayment;

// ── Synonym tables, in priority order ──

const AMOUNT: &[&str] = &[
    "value",
    "amount",
    "payment",
    "paymentamount",
    "paymentvalue",
    "totalvalue",
    "donationvalue",
    "estimatedvalue",
];

const PAYER: &[&str] = &[
    "payername",
    "payer",
    "employername",
    "employer",
    "clientname",
    "client",
    "organisationname",
    "companyname",
    "providername",
];

const DONOR_NAME: &[&str] = &["donorname", "donor", "sourcename"];

const ROLE: &[&str] = &[
    "jobtitle",
    "role",
    "roledescription",
    "position",
    "workdescription",
    "paymentdescription",
    "description",
    "services",
];

const HOURS: &[&str] = &["hoursworked", "hours", "numberofhours", "timespent"];

const HOURS_PERIOD: &[&str] = &["hoursperiod", "period", "timeperiod"];

const ADDRESS: &[&str] = &[
    "payerpublicaddress",
    "payeraddress",
    "publicaddress",
    "address",
    "donorpublicaddress",
    "donoraddress",
];

const NATURE_OF_BUSINESS: &[&str] = &[
    "payernatureofbusiness",
    "natureofbusiness",
    "business",
    "businessnature",
];

const START_DATE: &[&str] = &["startdate", "datestarted", "datefrom", "from"];

const END_DATE: &[&str] = &["enddate", "dateended", "dateto", "until"];

const RECEIVED_DATE: &[&str] = &[
    "receiveddate",
    "datereceived",
    "dateofreceipt",
    "accepteddate",
    "dateaccepted",
    "paymentdate",
    "date",
];

const REGULARITY: &[&str] = &[
    "regularityofpayment",
    "regularity",
    "frequency",
    "paymentfrequency",
];

const PAYMENT_TYPE: &[&str] = &["paymenttype", "typeofpayment", "donationtype", "type"];

const DONOR_STATUS: &[&str] = &["donorstatus", "payerstatus", "status"];

/// Field names that carry one nested field list per payer.
const DONOR_ARRAYS: &[&str] = &["donors", "payers", "sources", "funders"];

const DONOR_VALUE: &[&str] = &["value", "amount", "donationvalue"];
const DONOR_NAME_KEYS: &[&str] = &["name", "donorname", "payername"];
const DONOR_ADDRESS: &[&str] = &["publicaddress", "address", "donorpublicaddress"];
const DONOR_PAYMENT_TYPE: &[&str] = &["paymenttype", "donationtype", "type"];

/// Qualifier words. A field whose name carries one only satisfies a synonym
/// that carries the same word, so `PaymentType` never answers for `payment`
/// and `HoursPeriod` never answers for `hours`.
const QUALIFIERS: &[&str] = &[
    "type",
    "description",
    "address",
    "business",
    "status",
    "date",
    "period",
    "regularity",
    "frequency",
];

/// Loose matching ignores names shorter than this (`from`, `role`, `date`...).
const MIN_LOOSE_LEN: usize = 5;

/// Summary of a multi-payer donor array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonorSummary {
    pub amount: Decimal,
    pub name: Option<String>,
    pub address: Option<String>,
    pub payment_type: Option<String>,
}

/// Extract the canonical payment for one interest.
pub fn extract_payment(record: &InterestRecord) -> Option<ExtractedPayment> {
    let mut pool = Vec::new();
    collect_pool(&record.fields, &mut pool);
    collect_children(&record.child_interests, &mut pool);

    if !pool.iter().any(|f| f.has_payload()) {
        trace!(interest_id = record.id, "no usable fields");
        return None;
    }

    let donors = summarise_donors(&pool);

    let amount_field = find(&pool, AMOUNT, |f| f.value.as_ref().filter(|v| v.as_text().is_some()));
    let amount_raw = amount_field.and_then(ScalarValue::as_text);
    let amount = amount_field
        .and_then(parse_amount)
        .or_else(|| donors.as_ref().map(|d| d.amount));

    let payer_name = find_text(&pool, PAYER)
        .or_else(|| find_text(&pool, DONOR_NAME))
        .or_else(|| donors.as_ref().and_then(|d| d.name.clone()));
    let payer_address =
        find_text(&pool, ADDRESS).or_else(|| donors.as_ref().and_then(|d| d.address.clone()));
    let payment_type = find_text(&pool, PAYMENT_TYPE)
        .or_else(|| donors.as_ref().and_then(|d| d.payment_type.clone()));

    let role_description = find_text(&pool, ROLE).or_else(|| {
        record
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });

    let hours_worked = find(&pool, HOURS, |f| f.text_value().and_then(|t| parse_hours(&t)));
    let hourly_rate = match (amount, hours_worked) {
        (Some(amount), Some(hours)) if hours > Decimal::ZERO => amount.checked_div(hours),
        _ => None,
    };

    Some(ExtractedPayment {
        interest_id: record.id,
        member_id: record.member.id,
        category_id: record.category.id,
        amount,
        amount_raw,
        payer_name,
        payer_address,
        payer_nature_of_business: find_text(&pool, NATURE_OF_BUSINESS),
        payer_status: find_text(&pool, DONOR_STATUS),
        role_description,
        hours_worked,
        hours_period: find_text(&pool, HOURS_PERIOD),
        hourly_rate,
        payment_type,
        regularity: find_text(&pool, REGULARITY),
        start_date: find(&pool, START_DATE, date_of),
        end_date: find(&pool, END_DATE, date_of),
        received_date: find(&pool, RECEIVED_DATE, date_of),
        is_donation: record.category.is_donation(),
    })
}

/// Summarise every donor array in the pool.
///
/// Returns `None` when no donor carries a numeric value.
pub fn summarise_donors(pool: &[&Field]) -> Option<DonorSummary> {
    let mut summary = DonorSummary::default();
    let mut found_value = false;

    for field in pool {
        if !DONOR_ARRAYS.contains(&normalize_key(&field.name).as_str()) {
            continue;
        }
        let Some(FieldValues::Groups(groups)) = field.nested() else {
            continue;
        };
        for group in groups {
            let group: Vec<&Field> = group.iter().collect();
            if let Some(value) = find_exact(&group, DONOR_VALUE, |f| f.value.as_ref().and_then(parse_amount)) {
                if let Some(total) = summary.amount.checked_add(value) {
                    summary.amount = total;
                    found_value = true;
                } else {
                    trace!(%value, "donor value overflows total, skipped");
                }
            }
            if summary.name.is_none() {
                summary.name = find_exact(&group, DONOR_NAME_KEYS, Field::text_value);
            }
            if summary.address.is_none() {
                summary.address = find_exact(&group, DONOR_ADDRESS, Field::text_value);
            }
            if summary.payment_type.is_none() {
                summary.payment_type = find_exact(&group, DONOR_PAYMENT_TYPE, Field::text_value);
            }
        }
    }

    found_value.then_some(summary)
}

/// Parse an hours value by dropping everything but digits and the decimal point.
pub fn parse_hours(raw: &str) -> Option<Decimal> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    Decimal::from_str(&digits).ok()
}

// ── Lookup ──

/// Look an attribute up through its synonym list.
///
/// Every synonym is tried as an exact (case- and punctuation-insensitive)
/// name first. Only then are names matched loosely: either name containing
/// the other, subject to the qualifier guard and the minimum loose length.
/// A match whose value `read` rejects counts as absent and the search goes on.
fn find<'a, T>(
    pool: &[&'a Field],
    synonyms: &[&str],
    read: impl Fn(&'a Field) -> Option<T>,
) -> Option<T> {
    let keys: Vec<String> = pool.iter().map(|f| normalize_key(&f.name)).collect();

    for synonym in synonyms {
        for (field, key) in pool.iter().zip(&keys) {
            if key == synonym
                && let Some(value) = read(*field)
            {
                return Some(value);
            }
        }
    }

    for synonym in synonyms.iter().filter(|s| s.len() >= MIN_LOOSE_LEN) {
        for (field, key) in pool.iter().zip(&keys) {
            if loosely_matches(key, synonym)
                && let Some(value) = read(*field)
            {
                return Some(value);
            }
        }
    }

    None
}

fn find_exact<'a, T>(
    pool: &[&'a Field],
    synonyms: &[&str],
    read: impl Fn(&'a Field) -> Option<T>,
) -> Option<T> {
    synonyms.iter().find_map(|synonym| {
        pool.iter()
            .filter(|f| normalize_key(&f.name) == *synonym)
            .find_map(|f| read(*f))
    })
}

fn find_text(pool: &[&Field], synonyms: &[&str]) -> Option<String> {
    find(pool, synonyms, Field::text_value)
}

fn date_of(field: &Field) -> Option<chrono::NaiveDate> {
    field.value.as_ref().and_then(parse_date_value)
}

fn loosely_matches(key: &str, synonym: &str) -> bool {
    if key.len() < MIN_LOOSE_LEN {
        return false;
    }
    let guarded = QUALIFIERS
        .iter()
        .any(|q| key.contains(q) && !synonym.contains(q));
    if guarded {
        return false;
    }
    key.contains(synonym) || synonym.contains(key)
}

/// Lower-case alphanumerics only: `"Payer Name"`, `"payer_name"` and
/// `"PayerName"` compare equal.
fn normalize_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn collect_pool<'a>(fields: &'a [Field], pool: &mut Vec<&'a Field>) {
    for field in fields {
        pool.push(field);
        if let Some(FieldValues::Flat(inner)) = field.nested() {
            collect_pool(inner, pool);
        }
    }
}

fn collect_children<'a>(children: &'a [InterestRecord], pool: &mut Vec<&'a Field>) {
    for child in children {
        collect_pool(&child.fields, pool);
        collect_children(&child.child_interests, pool);
    }
}

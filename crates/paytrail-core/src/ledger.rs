//! Normalised ledger rows: extracted drafts, payers, and payments.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::interest::InterestRecord;

/// Closed set of payer types. Anything not identified as Government or
/// Individual is a Company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayerType {
    Government,
    Company,
    Individual,
}

impl PayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Government => "Government",
            Self::Company => "Company",
            Self::Individual => "Individual",
        }
    }
}

impl fmt::Display for PayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "government" => Ok(Self::Government),
            "company" => Ok(Self::Company),
            "individual" => Ok(Self::Individual),
            other => Err(format!("unknown payer type: {other}")),
        }
    }
}

/// Best-effort canonical payment recovered from one interest.
///
/// Transient: built once per interest during a sync run and turned into a
/// [`NewPayment`] once the payer name has been resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPayment {
    pub interest_id: u64,
    pub member_id: u32,
    pub category_id: u32,
    pub amount: Option<Decimal>,
    pub amount_raw: Option<String>,
    pub payer_name: Option<String>,
    pub payer_address: Option<String>,
    pub payer_nature_of_business: Option<String>,
    /// Payer status as reported by the source (not yet classified).
    pub payer_status: Option<String>,
    pub role_description: Option<String>,
    pub hours_worked: Option<Decimal>,
    pub hours_period: Option<String>,
    pub hourly_rate: Option<Decimal>,
    pub payment_type: Option<String>,
    pub regularity: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub is_donation: bool,
}

/// A persisted payer. Identity is the normalised name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payer {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub payer_type: PayerType,
    pub subtype: Option<String>,
    pub address: Option<String>,
    pub nature_of_business: Option<String>,
    /// Manually curated rows are never reclassified automatically.
    pub manual_override: bool,
    pub override_reason: Option<String>,
}

/// A payer about to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayer {
    pub name: String,
    pub normalized_name: String,
    pub payer_type: PayerType,
    pub subtype: Option<String>,
    pub address: Option<String>,
    pub nature_of_business: Option<String>,
}

/// A payment row. The payments table is rebuilt wholesale on every run, so
/// rows carry no identity of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub interest_id: u64,
    pub member_id: u32,
    pub category_id: u32,
    pub amount: Option<Decimal>,
    pub currency: String,
    /// Set only when the payer name resolved to a payer row.
    pub payer_id: Option<i64>,
    pub payer_name: Option<String>,
    pub payer_address: Option<String>,
    pub payer_nature_of_business: Option<String>,
    pub role_description: Option<String>,
    pub hours_worked: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    pub payment_type: Option<String>,
    pub regularity: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub is_donation: bool,
}

impl NewPayment {
    /// Build a payment row from an extraction, denormalising the payer
    /// details so the row survives later payer-table changes.
    pub fn from_extracted(extracted: &ExtractedPayment, payer_id: Option<i64>, currency: &str) -> Self {
        Self {
            interest_id: extracted.interest_id,
            member_id: extracted.member_id,
            category_id: extracted.category_id,
            amount: extracted.amount,
            currency: currency.to_string(),
            payer_id,
            payer_name: extracted.payer_name.clone(),
            payer_address: extracted.payer_address.clone(),
            payer_nature_of_business: extracted.payer_nature_of_business.clone(),
            role_description: extracted.role_description.clone(),
            hours_worked: extracted.hours_worked,
            hourly_rate: extracted.hourly_rate,
            payment_type: extracted.payment_type.clone(),
            regularity: extracted.regularity.clone(),
            start_date: extracted.start_date,
            end_date: extracted.end_date,
            received_date: extracted.received_date,
            is_donation: extracted.is_donation,
        }
    }
}

/// The persisted projection of an interest, upserted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRow {
    pub id: u64,
    pub member_id: u32,
    pub category_id: u32,
    pub parent_interest_id: Option<u64>,
    pub summary: Option<String>,
    pub registration_date: Option<String>,
    pub published_date: Option<String>,
    /// Raw field list as JSON, kept for downstream consumers.
    pub fields_json: String,
}

impl InterestRow {
    pub fn from_record(record: &InterestRecord) -> Self {
        Self {
            id: record.id,
            member_id: record.member.id,
            category_id: record.category.id,
            parent_interest_id: record.parent_interest_id,
            summary: record.summary.clone(),
            registration_date: record.registration_date.clone(),
            published_date: record.published_date.clone(),
            fields_json: serde_json::to_string(&record.fields).unwrap_or_else(|_| "[]".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payer_type_parses_case_insensitively() {
        assert_eq!("government".parse::<PayerType>(), Ok(PayerType::Government));
        assert_eq!(" Individual ".parse::<PayerType>(), Ok(PayerType::Individual));
        assert!("charity".parse::<PayerType>().is_err());
    }

    #[test]
    fn payment_copies_payer_details() {
        let extracted = ExtractedPayment {
            interest_id: 7,
            member_id: 1,
            category_id: 12,
            amount: Some(Decimal::from(500)),
            payer_name: Some("Acme Ltd".into()),
            payer_address: Some("1 High St".into()),
            is_donation: true,
            ..Default::default()
        };
        let payment = NewPayment::from_extracted(&extracted, Some(3), "GBP");
        assert_eq!(payment.payer_id, Some(3));
        assert_eq!(payment.payer_name.as_deref(), Some("Acme Ltd"));
        assert_eq!(payment.payer_address.as_deref(), Some("1 High St"));
        assert_eq!(payment.currency, "GBP");
        assert!(payment.is_donation);
    }
}

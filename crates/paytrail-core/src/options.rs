//! Sync run configuration.

use serde::Deserialize;

/// Knobs for one sync run.
///
/// Every field has a default, so a partial JSON/TOML document or an empty
/// `{}` deserializes to a working configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Rows per store write.
    pub batch_size: usize,
    /// Records per fetch page. The register API caps pages at 20.
    pub page_size: usize,
    /// Pause between consecutive page requests, in milliseconds.
    pub page_delay_ms: u64,
    /// Multi-payer category re-fetched with child interests expanded.
    pub earnings_category_id: Option<u32>,
    /// Fallback lookup for the multi-payer category when no id is configured.
    pub earnings_category_hint: String,
    /// ISO currency code stamped on every payment row.
    pub currency: String,
    /// Upper bound on a whole run, in seconds.
    pub deadline_secs: Option<u64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            page_size: 20,
            page_delay_ms: 250,
            earnings_category_id: None,
            earnings_category_hint: "Employment and earnings".to_string(),
            currency: "GBP".to_string(),
            deadline_secs: None,
        }
    }
}

impl SyncOptions {
    /// Batch size, never zero.
    pub fn batch(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let options: SyncOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, SyncOptions::default());
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.page_size, 20);
        assert_eq!(options.currency, "GBP");
    }

    #[test]
    fn partial_document_overrides_fields() {
        let options: SyncOptions =
            serde_json::from_str(r#"{"batch_size": 50, "earnings_category_id": 12}"#).unwrap();
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.earnings_category_id, Some(12));
        assert_eq!(options.page_delay_ms, 250);
    }

    #[test]
    fn zero_batch_is_clamped() {
        let options = SyncOptions {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(options.batch(), 1);
    }
}

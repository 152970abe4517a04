//! Manual overrides: the escape hatch for systematic misclassification.

use std::collections::HashMap;
use std::path::Path;

use paytrail_core::{PayerType, normalize_name};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ClassifyError;

/// One override as written in an override file:
///
/// ```json
/// [{"pattern": "acme corp", "type": "Individual", "reason": "trading name"}]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub pattern: String,
    #[serde(rename = "type")]
    pub payer_type: PayerType,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Override {
    pub fn new(pattern: &str, payer_type: PayerType, subtype: Option<&str>) -> Self {
        Self {
            pattern: pattern.to_string(),
            payer_type,
            subtype: subtype.map(str::to_string),
            reason: None,
        }
    }

    /// Read a JSON array of overrides.
    pub fn load_file(path: &Path) -> Result<Vec<Override>, ClassifyError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Overrides keyed by normalised pattern, kept in load order.
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    entries: Vec<(String, Override)>,
    exact: HashMap<String, usize>,
}

impl OverrideSet {
    /// Replace every override with `overrides`. Nothing from a previous load
    /// survives.
    pub fn replace(&mut self, overrides: Vec<Override>) {
        self.entries.clear();
        self.exact.clear();
        for o in overrides {
            let key = normalize_name(&o.pattern);
            if key.is_empty() {
                warn!(pattern = %o.pattern, "skipping override with empty pattern");
                continue;
            }
            self.exact.entry(key.clone()).or_insert(self.entries.len());
            self.entries.push((key, o));
        }
    }

    /// Exact match on the normalised key, else the first override (in load
    /// order) whose key is a substring of it.
    pub fn lookup(&self, key: &str) -> Option<&Override> {
        if let Some(&i) = self.exact.get(key) {
            return Some(&self.entries[i].1);
        }
        self.entries
            .iter()
            .find(|(pattern, _)| key.contains(pattern.as_str()))
            .map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(overrides: Vec<Override>) -> OverrideSet {
        let mut s = OverrideSet::default();
        s.replace(overrides);
        s
    }

    #[test]
    fn exact_beats_earlier_substring() {
        let s = set(vec![
            Override::new("acme", PayerType::Government, None),
            Override::new("Acme Corp", PayerType::Individual, None),
        ]);
        assert_eq!(s.lookup("acme corp").unwrap().payer_type, PayerType::Individual);
    }

    #[test]
    fn substring_takes_first_in_load_order() {
        let s = set(vec![
            Override::new("acme", PayerType::Government, None),
            Override::new("acme corp", PayerType::Individual, None),
        ]);
        assert_eq!(
            s.lookup("acme corp ltd").unwrap().payer_type,
            PayerType::Government
        );
    }

    #[test]
    fn replace_drops_previous_entries() {
        let mut s = set(vec![Override::new("old name", PayerType::Individual, None)]);
        s.replace(vec![Override::new("new name", PayerType::Company, None)]);
        assert!(s.lookup("old name").is_none());
        assert!(s.lookup("new name").is_some());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn empty_patterns_are_skipped() {
        let s = set(vec![Override::new(" ... ", PayerType::Individual, None)]);
        assert!(s.is_empty());
        assert!(s.lookup("anything").is_none());
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(
            &path,
            r#"[
                {"pattern": "Acme Corp", "type": "Individual", "reason": "sole trader"},
                {"pattern": "Example Embassy Services", "type": "Company", "subtype": "Private Company"}
            ]"#,
        )
        .unwrap();
        let loaded = Override::load_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].reason.as_deref(), Some("sole trader"));
        assert_eq!(loaded[1].subtype.as_deref(), Some("Private Company"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.json");
        std::fs::write(&path, r#"[{"pattern": "x", "type": "Charity"}]"#).unwrap();
        assert!(matches!(
            Override::load_file(&path),
            Err(ClassifyError::Json(_))
        ));
    }
}

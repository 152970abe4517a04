//! Register record types as published by the interests register.
//!
//! Interests carry an open-ended list of named [`Field`]s rather than a fixed
//! shape. Field names drift by category and over time, so nothing here maps a
//! field name to a struct member; attribute lookup happens in
//! [`crate::extract`] via synonym tables.

use serde::{Deserialize, Serialize};

/// A scalar field value. The register leaks booleans and numbers into slots
/// that are nominally strings, so every shape is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Objects, arrays, anything else. Always treated as absent.
    Other(serde_json::Value),
}

impl ScalarValue {
    /// Text form of a usable value.
    ///
    /// Booleans, boolean-like strings (`"true"`/`"false"`), blank strings and
    /// opaque JSON all resolve to `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Bool(_) | Self::Other(_) => None,
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => {
                let s = s.trim();
                if s.is_empty() || is_boolean_literal(s) {
                    None
                } else {
                    Some(s.to_string())
                }
            }
        }
    }
}

/// True for `"true"` / `"false"` in any case.
pub fn is_boolean_literal(s: &str) -> bool {
    s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
}

/// Nested field values: either a flat list of fields or one list of fields per
/// group (multiple donors funding one visit, for example).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValues {
    Groups(Vec<Vec<Field>>),
    Flat(Vec<Field>),
}

impl FieldValues {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Groups(groups) => groups.iter().all(|g| g.is_empty()),
            Self::Flat(fields) => fields.is_empty(),
        }
    }
}

/// One named entry in an interest's field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub value: Option<ScalarValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<FieldValues>,
}

impl Field {
    /// A field with a scalar text value.
    pub fn text(name: &str, value: &str) -> Self {
        Self::scalar(name, ScalarValue::Text(value.to_string()))
    }

    pub fn scalar(name: &str, value: ScalarValue) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            field_type: None,
            value: Some(value),
            values: None,
        }
    }

    /// A field carrying one nested field list per group.
    pub fn groups(name: &str, groups: Vec<Vec<Field>>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            field_type: None,
            value: None,
            values: Some(FieldValues::Groups(groups)),
        }
    }

    /// Usable text of the scalar value, if any.
    pub fn text_value(&self) -> Option<String> {
        self.value.as_ref().and_then(ScalarValue::as_text)
    }

    /// Non-empty nested values. An empty `values` list counts as absent.
    pub fn nested(&self) -> Option<&FieldValues> {
        self.values.as_ref().filter(|v| !v.is_empty())
    }

    /// Whether the field carries anything an extractor could read.
    pub fn has_payload(&self) -> bool {
        self.text_value().is_some() || self.nested().is_some()
    }
}

/// A register category (e.g. "Employment and earnings", "Gifts and benefits").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u32,
    #[serde(default)]
    pub number: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parent_category_ids: Vec<u32>,
}

impl Category {
    /// Immediate parent, when the category sits under another.
    pub fn parent_id(&self) -> Option<u32> {
        self.parent_category_ids.first().copied()
    }

    /// Gift and donation categories flag every payment as a donation.
    pub fn is_donation(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("donation") || name.contains("gift")
    }
}

/// The member reference embedded in each interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub id: u32,
    #[serde(default)]
    pub name_display_as: Option<String>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub member_from: Option<String>,
}

/// A member of the legislature as returned by the members listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u32,
    pub name: String,
    pub party: Option<String>,
    pub constituency: Option<String>,
}

/// One disclosure in the register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRecord {
    pub id: u64,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub parent_interest_id: Option<u64>,
    #[serde(default)]
    pub registration_date: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    pub category: Category,
    pub member: MemberRef,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub child_interests: Vec<InterestRecord>,
}

impl InterestRecord {
    /// Ids of every nested child interest, at any depth.
    pub fn descendant_ids(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        for child in &self.child_interests {
            ids.push(child.id);
            ids.extend(child.descendant_ids());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_register_interest() {
        let json = r#"{
            "id": 101,
            "summary": "Speaking engagement",
            "parentInterestId": null,
            "registrationDate": "2024-07-10",
            "publishedDate": "2024-07-15",
            "category": {"id": 12, "number": "1", "name": "Employment and earnings", "parentCategoryIds": []},
            "member": {"id": 4000, "nameDisplayAs": "Jane Example", "party": "Labour"},
            "fields": [
                {"name": "PayerName", "type": "String", "value": "Example Ltd"},
                {"name": "Value", "type": "Decimal", "value": 1500.0},
                {"name": "IsSoleBeneficiary", "type": "Boolean", "value": true},
                {"name": "Donors", "values": [[{"name": "Name", "value": "A"}], [{"name": "Name", "value": "B"}]]}
            ],
            "childInterests": [
                {
                    "id": 102,
                    "category": {"id": 12, "name": "Employment and earnings"},
                    "member": {"id": 4000},
                    "fields": [{"name": "Value", "value": "£200"}]
                }
            ]
        }"#;
        let interest: InterestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(interest.id, 101);
        assert_eq!(interest.category.name, "Employment and earnings");
        assert_eq!(interest.fields.len(), 4);
        assert_eq!(interest.fields[1].value, Some(ScalarValue::Number(1500.0)));
        assert_eq!(interest.fields[2].value, Some(ScalarValue::Bool(true)));
        assert!(matches!(
            interest.fields[3].values,
            Some(FieldValues::Groups(ref g)) if g.len() == 2
        ));
        assert_eq!(interest.descendant_ids(), vec![102]);
    }

    #[test]
    fn flat_values_deserialize_as_flat() {
        let json = r#"{"name": "Visit", "values": [{"name": "Destination", "value": "Paris"}]}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert!(matches!(field.values, Some(FieldValues::Flat(ref f)) if f.len() == 1));
    }

    #[test]
    fn empty_values_are_absent() {
        let json = r#"{"name": "Donors", "values": []}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert!(field.nested().is_none());
        assert!(!field.has_payload());
    }

    #[test]
    fn boolean_values_have_no_text() {
        assert_eq!(ScalarValue::Bool(true).as_text(), None);
        assert_eq!(ScalarValue::Text("FALSE".into()).as_text(), None);
        assert_eq!(ScalarValue::Text("   ".into()).as_text(), None);
        assert_eq!(
            ScalarValue::Text(" Acme ".into()).as_text().as_deref(),
            Some("Acme")
        );
    }

    #[test]
    fn object_values_are_opaque() {
        let json = r#"{"name": "Odd", "value": {"nested": 1}}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert!(matches!(field.value, Some(ScalarValue::Other(_))));
        assert!(field.text_value().is_none());
    }

    #[test]
    fn donation_categories() {
        let gifts = Category {
            id: 3,
            number: None,
            name: "Gifts, benefits and hospitality from UK sources".into(),
            parent_category_ids: vec![],
        };
        let earnings = Category {
            id: 12,
            number: None,
            name: "Employment and earnings".into(),
            parent_category_ids: vec![],
        };
        assert!(gifts.is_donation());
        assert!(!earnings.is_donation());
    }
}

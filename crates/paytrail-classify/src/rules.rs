//! The payer rule table.
//!
//! Rules are plain data so the table can be tested on its own. Order matters:
//! among matching rules the highest priority wins, and equal priorities go to
//! the rule defined first.
//!
//! Priority bands:
//!
//! | Priority | Marker |
//! |---|---|
//! | 15 | Diplomatic and foreign-government markers |
//! | 14 | Parliament |
//! | 13 | "Friends of" advocacy groups |
//! | 12 | Legal-entity suffixes (Ltd, PLC, LLP) |
//! | 11 | International organisations |
//! | 10 | Central government and the NHS |
//! | 9 | Generic "government", unions, parties |
//! | 8 | Charities and trusts |
//! | 7 | Universities, think tanks, media |
//! | 6 | Councils and boroughs |
//! | 5 | Public authorities |

use paytrail_core::PayerType;

/// How a rule recognises a name. Both forms match case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Plain substring.
    Literal(&'static str),
    /// Regular expression, searched anywhere in the name.
    Regex(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSpec {
    pub pattern: Pattern,
    pub payer_type: PayerType,
    pub subtype: Option<&'static str>,
    pub priority: u8,
}

const fn rule(
    pattern: Pattern,
    payer_type: PayerType,
    subtype: Option<&'static str>,
    priority: u8,
) -> RuleSpec {
    RuleSpec {
        pattern,
        payer_type,
        subtype,
        priority,
    }
}

use Pattern::{Literal, Regex};
use PayerType::{Company, Government};

const RULES: &[RuleSpec] = &[
    rule(Regex(r"\bembassy\b"), Government, Some("Foreign Government"), 15),
    rule(Regex(r"\bhigh commission\b"), Government, Some("Foreign Government"), 15),
    rule(Regex(r"\bconsulate\b"), Government, Some("Foreign Government"), 15),
    rule(Regex(r"\bgovernment of\b"), Government, Some("Foreign Government"), 15),
    rule(Regex(r"\bministry of foreign affairs\b"), Government, Some("Foreign Government"), 15),
    rule(Literal("house of commons"), Government, Some("Parliament"), 14),
    rule(Literal("house of lords"), Government, Some("Parliament"), 14),
    rule(Regex(r"\bfriends of\b"), Company, Some("Advocacy Group"), 13),
    rule(Regex(r"\b(ltd|limited)\b"), Company, Some("Private Company"), 12),
    rule(Regex(r"\bplc\b"), Company, Some("Public Company"), 12),
    rule(Regex(r"\bllp\b"), Company, Some("Partnership"), 12),
    rule(Regex(r"\b(inc|llc|gmbh|corp|corporation)\b"), Company, Some("Corporation"), 12),
    rule(Regex(r"\b(european union|united nations|nato)\b"), Government, Some("International Organisation"), 11),
    rule(Regex(r"\bdepartment (for|of)\b"), Government, Some("Central Government"), 10),
    rule(Regex(r"\bministry\b"), Government, Some("Central Government"), 10),
    rule(Regex(r"\b(cabinet office|hm treasury|home office|foreign office)\b"), Government, Some("Central Government"), 10),
    rule(Regex(r"\bnhs\b"), Government, Some("NHS"), 10),
    rule(Regex(r"\bgovernment\b"), Government, None, 9),
    rule(Regex(r"\b(trade union|union|unison|unite|gmb|usdaw)\b"), Company, Some("Trade Union"), 9),
    rule(Regex(r"\b(party|conservative association|labour group)\b"), Company, Some("Political Party"), 9),
    rule(Regex(r"\b(charity|charitable|foundation)\b"), Company, Some("Charity"), 8),
    rule(Regex(r"\btrust\b"), Company, Some("Trust"), 8),
    rule(Regex(r"\b(university|college)\b"), Company, Some("Education"), 7),
    rule(Regex(r"\b(think tank|institute|policy exchange)\b"), Company, Some("Think Tank"), 7),
    rule(Regex(r"\b(bbc|news|media|broadcasting|television|radio|newspapers?)\b"), Company, Some("Media"), 7),
    rule(Regex(r"\b(council|borough)\b"), Government, Some("Local Government"), 6),
    rule(Regex(r"\bauthority\b"), Government, Some("Public Authority"), 5),
];

/// The built-in rule table, in definition order.
pub fn default_rules() -> &'static [RuleSpec] {
    RULES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_stay_in_bands() {
        for spec in default_rules() {
            assert!((5..=15).contains(&spec.priority), "{spec:?}");
        }
    }

    #[test]
    fn legal_suffix_outranks_council() {
        let priority = |needle: &str| {
            default_rules()
                .iter()
                .find(|r| matches!(r.pattern, Regex(p) | Literal(p) if p.contains(needle)))
                .map(|r| r.priority)
                .unwrap()
        };
        assert!(priority("ltd") > priority("council"));
        assert!(priority("friends of") > priority("ltd"));
        assert!(priority("embassy") > priority("ltd"));
    }
}

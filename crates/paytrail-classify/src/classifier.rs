//! Rule-based payer classification.
//!
//! Resolution order for a name:
//!
//! 1. Override, exact match on the normalised name.
//! 2. Override, first loaded pattern contained in the normalised name.
//! 3. Highest-priority matching rule (ties go to the earlier rule).
//! 4. Individual-name heuristic.
//! 5. Company.

use std::path::Path;
use std::sync::LazyLock;

use paytrail_core::{PayerType, normalize_name};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

use crate::ClassifyError;
use crate::overrides::{Override, OverrideSet};
use crate::rules::{Pattern, RuleSpec, default_rules};

/// Words that mark a name as an organisation, never a person.
const ORGANISATION_WORDS: &[&str] = &[
    "ltd", "limited", "plc", "llp", "inc", "llc", "corp", "company", "co", "group", "holdings",
    "partners", "partnership", "university", "college", "school", "council", "union", "trust",
    "foundation", "association", "society", "institute", "club", "committee", "fund", "party",
    "bank", "media", "news", "services", "consulting", "consultancy", "agency", "centre",
    "center", "network", "international", "uk", "embassy", "government", "department",
    "ministry", "authority", "church", "charity",
];

const TITLES: &[&str] = &[
    "sir", "lord", "lady", "dame", "baron", "baroness", "dr", "prof", "professor", "mr", "mrs",
    "ms", "miss", "rev", "hon",
];

const FIRST_NAMES: &[&str] = &[
    "adam", "alan", "alastair", "alex", "alexander", "alice", "alison", "amanda", "andrew",
    "angela", "ann", "anna", "anne", "anthony", "barbara", "ben", "benjamin", "bill", "bob",
    "brian", "carol", "caroline", "catherine", "charles", "charlotte", "chris", "christine",
    "christopher", "claire", "colin", "daniel", "david", "deborah", "derek", "diana", "edward",
    "elizabeth", "emily", "emma", "fiona", "frank", "gareth", "gary", "george", "gillian",
    "graham", "hannah", "harry", "helen", "henry", "ian", "jack", "james", "jane", "janet",
    "jennifer", "jessica", "jim", "joan", "john", "jonathan", "joseph", "julia", "julie",
    "karen", "kate", "katherine", "keith", "kevin", "laura", "linda", "lisa", "louise", "lucy",
    "margaret", "mark", "martin", "mary", "matthew", "michael", "michelle", "nicholas", "nick",
    "nicola", "nigel", "oliver", "patricia", "paul", "peter", "philip", "rachel", "richard",
    "robert", "sally", "sam", "samuel", "sarah", "simon", "sophie", "stephen", "steve",
    "steven", "stuart", "susan", "thomas", "tim", "timothy", "tom", "tony", "victoria",
    "william",
];

static INITIAL_SURNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]\.\s*)+[A-Za-z][A-Za-z'\-]+$").expect("initial-surname pattern")
});

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Override,
    /// Index into the rule table.
    Rule(usize),
    Heuristic,
    Default,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Rule(_) => "rule",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub payer_type: PayerType,
    pub subtype: Option<String>,
    pub source: ClassificationSource,
}

struct CompiledRule {
    matcher: Matcher,
    payer_type: PayerType,
    subtype: Option<&'static str>,
    priority: u8,
}

enum Matcher {
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, name: &str, lower: &str) -> bool {
        match self {
            Self::Literal(needle) => lower.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(name),
        }
    }
}

/// Payer classifier.
///
/// Built once per run and passed explicitly to whatever needs it. The rule
/// table is fixed at construction; the override set is replaced wholesale by
/// [`PayerClassifier::load_overrides`].
pub struct PayerClassifier {
    rules: Vec<CompiledRule>,
    overrides: OverrideSet,
}

impl PayerClassifier {
    /// A classifier over the built-in rule table.
    pub fn new() -> Result<Self, ClassifyError> {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(specs: &[RuleSpec]) -> Result<Self, ClassifyError> {
        let rules = specs
            .iter()
            .map(|spec| {
                let matcher = match spec.pattern {
                    Pattern::Literal(s) => Matcher::Literal(s.to_lowercase()),
                    Pattern::Regex(p) => Matcher::Regex(
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| ClassifyError::Pattern {
                                pattern: p.to_string(),
                                source,
                            })?,
                    ),
                };
                Ok::<_, ClassifyError>(CompiledRule {
                    matcher,
                    payer_type: spec.payer_type,
                    subtype: spec.subtype,
                    priority: spec.priority,
                })
            })
            .collect::<Result<Vec<_>, ClassifyError>>()?;

        debug!(rules = rules.len(), "compiled payer rules");
        Ok(Self {
            rules,
            overrides: OverrideSet::default(),
        })
    }

    /// Replace all overrides.
    pub fn load_overrides(&mut self, overrides: Vec<Override>) {
        self.overrides.replace(overrides);
        info!(overrides = self.overrides.len(), "loaded payer overrides");
    }

    /// Replace all overrides with the contents of a JSON override file.
    pub fn load_override_file(&mut self, path: &Path) -> Result<usize, ClassifyError> {
        let overrides = Override::load_file(path)?;
        self.load_overrides(overrides);
        Ok(self.overrides.len())
    }

    pub fn classify(&self, name: &str) -> Classification {
        let key = normalize_name(name);

        if !key.is_empty()
            && let Some(o) = self.overrides.lookup(&key)
        {
            return Classification {
                payer_type: o.payer_type,
                subtype: o.subtype.clone(),
                source: ClassificationSource::Override,
            };
        }

        if let Some((index, rule)) = self.best_rule(name) {
            return Classification {
                payer_type: rule.payer_type,
                subtype: rule.subtype.map(str::to_string),
                source: ClassificationSource::Rule(index),
            };
        }

        if looks_like_individual(name) {
            return Classification {
                payer_type: PayerType::Individual,
                subtype: None,
                source: ClassificationSource::Heuristic,
            };
        }

        Classification {
            payer_type: PayerType::Company,
            subtype: None,
            source: ClassificationSource::Default,
        }
    }

    pub fn classify_batch<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(&'a str, Classification)> {
        names.into_iter().map(|n| (n, self.classify(n))).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    fn best_rule(&self, name: &str) -> Option<(usize, &CompiledRule)> {
        let lower = name.to_lowercase();
        let mut best: Option<(usize, &CompiledRule)> = None;
        for (i, rule) in self.rules.iter().enumerate() {
            if !rule.matcher.is_match(name, &lower) {
                continue;
            }
            // Strictly greater: the first rule at a given priority keeps it.
            if best.is_none_or(|(_, b)| rule.priority > b.priority) {
                best = Some((i, rule));
            }
        }
        best
    }
}

/// 2 to 4 words, no organisation keyword, and either a known first name or
/// title up front or an `Initial. Surname` shape.
fn looks_like_individual(name: &str) -> bool {
    let trimmed = name.trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if !(2..=4).contains(&words.len()) {
        return false;
    }

    let key = normalize_name(trimmed);
    if key.split(' ').any(|w| ORGANISATION_WORDS.contains(&w)) {
        return false;
    }

    let first = words[0].trim_end_matches('.').to_lowercase();
    FIRST_NAMES.contains(&first.as_str())
        || TITLES.contains(&first.as_str())
        || INITIAL_SURNAME.is_match(trimmed)
}

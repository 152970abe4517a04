//! Name normalisation for payer identity and party consistency.
//!
//! [`normalize_name`] is the single identity key for payers: classifier
//! override lookups and payer-table deduplication both go through it, so two
//! spellings that normalise alike always resolve to the same payer row.

use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern"));

static LABOUR_CO_OP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^labour\b.*\bco-?op(erative)?\b").expect("labour co-op pattern")
});

/// Canonical lookup key for a payer name.
///
/// Lower-cases, strips every character that is neither a word character nor
/// whitespace, and collapses whitespace runs to a single space.
///
/// `"Acme Corp."`, `"ACME CORP"` and `" acme  corp "` all become `"acme corp"`.
pub fn normalize_name(name: &str) -> String {
    let lower = name.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse party-name variants to one canonical party.
///
/// Joint Labour and Co-operative candidates are reported under several
/// spellings (`"Labour (Co-op)"`, `"Labour/Co-operative"`); they are all
/// stored as `"Labour"`. Other names are trimmed and otherwise kept.
pub fn normalize_party(party: &str) -> String {
    let trimmed = party.trim();
    if LABOUR_CO_OP.is_match(trimmed) {
        return "Labour".to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn spellings_normalise_alike() {
        let key = normalize_name("Acme Corp.");
        assert_eq!(key, "acme corp");
        assert_eq!(normalize_name("ACME CORP"), key);
        assert_eq!(normalize_name(" acme  corp "), key);
    }

    #[test]
    fn punctuation_inside_words_is_dropped() {
        assert_eq!(normalize_name("O'Brien & Sons, Ltd."), "obrien sons ltd");
    }

    #[test]
    fn underscores_and_digits_are_word_characters() {
        assert_eq!(normalize_name("Room_101 Ltd"), "room_101 ltd");
    }

    #[test]
    fn empty_and_punctuation_only_names() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name(" -- . "), "");
    }

    #[test]
    fn unicode_letters_survive() {
        assert_eq!(normalize_name("Société Générale"), "société générale");
    }

    #[rstest]
    #[case("Labour (Co-op)", "Labour")]
    #[case("Labour/Co-operative", "Labour")]
    #[case("labour and co-operative", "Labour")]
    #[case("Labour Coop", "Labour")]
    #[case(" Labour ", "Labour")]
    #[case("Conservative", "Conservative")]
    #[case("Scottish National Party", "Scottish National Party")]
    fn party_variants(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_party(input), expected);
    }
}

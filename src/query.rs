use std::sync::LazyLock;

use regex::Regex;

/// Words ignored when turning a chat message into search keywords.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "in", "it", "of", "for", "on", "with", "what",
    "when", "where", "how", "who", "about", "news", "tell", "me", "some",
];

/// Field searched when no `@field:` directive is given.
pub const ALL_FIELDS: &str = "all";

/// Directive restricting a search to article sources.
pub const SOURCE_FIELD: &str = "source";

/// Keywords must be longer than this many characters.
const MIN_KEYWORD_LEN: usize = 2;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@([A-Za-z0-9_]+):\s*(.*)").expect("directive regex is valid")
});

/// A chat message normalized for searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// The field named by an `@field:` prefix, or [`ALL_FIELDS`].
    pub search_field: String,
    /// Lowercased text after the directive, trimmed.
    pub query: String,
    /// Keywords of `query`. Only filled for [`ALL_FIELDS`] searches.
    pub keywords: Vec<String>,
}

impl ParsedQuery {
    pub fn is_source_search(&self) -> bool {
        self.search_field == SOURCE_FIELD
    }
}

/// Parse a raw chat message. Never fails; an empty keyword list is a valid
/// outcome the caller has to handle.
pub fn parse(raw: &str) -> ParsedQuery {
    let message = normalize(raw);

    let (search_field, query) = match DIRECTIVE.captures(&message) {
        Some(caps) => (caps[1].to_string(), caps[2].trim().to_string()),
        None => (ALL_FIELDS.to_string(), message),
    };

    let keywords = if search_field == ALL_FIELDS {
        keywords(&query)
    } else {
        Vec::new()
    };

    ParsedQuery {
        search_field,
        query,
        keywords,
    }
}

/// Trim and lowercase a message.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Split text on whitespace, dropping short tokens and stop-words.
///
/// Duplicates are kept and order is preserved.
pub fn keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.chars().count() > MIN_KEYWORD_LEN)
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_message_searches_all_fields() {
        let parsed = parse("  Election Results in ASIA ");

        assert_eq!(parsed.search_field, ALL_FIELDS);
        assert_eq!(parsed.query, "election results in asia");
        assert_eq!(parsed.keywords, vec!["election", "results", "asia"]);
    }

    #[test]
    fn source_directive_is_extracted() {
        let parsed = parse("@Source:   BBC News ");

        assert_eq!(parsed.search_field, "source");
        assert_eq!(parsed.query, "bbc news");
        assert!(parsed.is_source_search());
        assert!(parsed.keywords.is_empty());
    }

    #[test]
    fn directive_without_space_after_colon() {
        let parsed = parse("@heading:floods");

        assert_eq!(parsed.search_field, "heading");
        assert_eq!(parsed.query, "floods");
    }

    #[test]
    fn directive_with_empty_rest() {
        let parsed = parse("@source:");

        assert!(parsed.is_source_search());
        assert_eq!(parsed.query, "");
    }

    #[test]
    fn at_sign_without_colon_is_plain_text() {
        let parsed = parse("@reuters today");

        assert_eq!(parsed.search_field, ALL_FIELDS);
        assert_eq!(parsed.keywords, vec!["@reuters", "today"]);
    }

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        assert!(keywords("the of it").is_empty());
        assert!(keywords("tell me some news about it").is_empty());
        assert_eq!(keywords("what is new in tech"), vec!["new", "tech"]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        assert_eq!(
            keywords("storm warning storm"),
            vec!["storm", "warning", "storm"]
        );
    }

    #[test]
    fn empty_and_whitespace_messages() {
        for raw in ["", "   ", "\n\t"] {
            let parsed = parse(raw);
            assert_eq!(parsed.search_field, ALL_FIELDS);
            assert_eq!(parsed.query, "");
            assert!(parsed.keywords.is_empty());
        }
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Two characters, four bytes.
        assert!(keywords("éé").is_empty());
        assert_eq!(keywords("ééé"), vec!["ééé"]);
    }

    proptest! {
        #[test]
        fn keywords_are_lowercase_long_and_not_stop_words(raw in ".{0,64}") {
            let parsed = parse(&raw);
            for word in &parsed.keywords {
                prop_assert!(word.chars().count() > MIN_KEYWORD_LEN);
                prop_assert!(!STOP_WORDS.contains(&word.as_str()));
                prop_assert_eq!(word, &word.to_lowercase());
            }
        }

        #[test]
        fn parsing_is_deterministic(raw in ".{0,64}") {
            prop_assert_eq!(parse(&raw), parse(&raw));
        }
    }
}

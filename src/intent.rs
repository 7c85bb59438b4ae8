//! Keyword intent classification and item-name extraction.
//!
//! Each intent is selected by the presence of one of its keywords anywhere in
//! the lower-cased message. The order in which intents are tried lives in the
//! router's dispatch table; [`Intent::GeneralQuery`] is the fallthrough, so
//! every message gets exactly one intent.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Words after which the item name is expected, tried in this order.
pub const TRIGGER_WORDS: [&str; 4] = ["is", "have", "request", "stock"];

pub const DIETARY_KEYWORDS: [&str; 3] = ["vegan", "vegetarian", "gluten free"];
pub const STOCK_KEYWORDS: [&str; 1] = ["in stock"];
pub const REQUEST_KEYWORDS: [&str; 1] = ["request"];

static DIETARY_WORDS: OnceLock<Regex> = OnceLock::new();
static STOCK_WORDS: OnceLock<Regex> = OnceLock::new();
static REQUEST_WORDS: OnceLock<Regex> = OnceLock::new();

// Matches any of `keywords` as whole words, ignoring case.
fn whole_words(keywords: &[&str]) -> Regex {
    let alternation = keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub enum Intent {
    DietaryInfo,
    StockCheck,
    ItemRequest,
    GeneralQuery,
}

impl Intent {
    /// Classifies an already lower-cased message by the first matching row
    /// of the router's dispatch table.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        crate::router::select_rule(message).intent
    }

    /// True when `message` contains one of this intent's keywords.
    /// [`Intent::GeneralQuery`] has none and never matches.
    #[must_use]
    pub fn matches(
        self,
        message: &str,
    ) -> bool {
        self.keywords().iter().any(|k| message.contains(k))
    }

    /// Keywords that select this intent. They are noise inside an item name.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Intent::DietaryInfo => &DIETARY_KEYWORDS,
            Intent::StockCheck => &STOCK_KEYWORDS,
            Intent::ItemRequest => &REQUEST_KEYWORDS,
            Intent::GeneralQuery => &[],
        }
    }

    fn keyword_pattern(self) -> Option<&'static Regex> {
        match self {
            Intent::DietaryInfo => Some(DIETARY_WORDS.get_or_init(|| whole_words(&DIETARY_KEYWORDS))),
            Intent::StockCheck => Some(STOCK_WORDS.get_or_init(|| whole_words(&STOCK_KEYWORDS))),
            Intent::ItemRequest => Some(REQUEST_WORDS.get_or_init(|| whole_words(&REQUEST_KEYWORDS))),
            Intent::GeneralQuery => None,
        }
    }

    /// The reply shown when this intent's handler fails.
    #[must_use]
    pub const fn apology(self) -> &'static str {
        match self {
            Intent::DietaryInfo => "Sorry, I couldn't retrieve dietary information. Please try again.",
            Intent::StockCheck => "Sorry, I couldn't retrieve stock information. Please try again.",
            Intent::ItemRequest => "Sorry, I couldn't process your request. Please try again.",
            Intent::GeneralQuery => "Sorry, I couldn't process your query. Please try again.",
        }
    }

    /// Narrows an extracted entity to a catalog lookup key by dropping this
    /// intent's own keywords and trailing punctuation.
    ///
    /// Keywords are removed only as whole words, so "veganaise" survives a
    /// dietary lookup. Falls back to the trimmed entity if nothing would be left.
    #[must_use]
    pub fn lookup_key(
        self,
        entity: &str,
    ) -> String {
        let key = match self.keyword_pattern() {
            Some(pattern) => pattern.replace_all(entity, " ").into_owned(),
            None => entity.to_string(),
        };

        let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
        let key = key.trim_end_matches(['?', '.', '!']).trim_end();

        if key.is_empty() {
            entity.trim().to_string()
        } else {
            key.to_string()
        }
    }
}

/// Returns the trimmed text after the first trigger word found, or the whole
/// message when none occurs.
///
/// Triggers are matched as substrings in [`TRIGGER_WORDS`] order, not by
/// position, so "this" matches "is". That imprecision is kept on purpose.
#[must_use]
pub fn extract_entity(message: &str) -> String {
    TRIGGER_WORDS
        .iter()
        .find_map(|word| message.split_once(word).map(|(_, rest)| rest.trim().to_string()))
        .unwrap_or_else(|| message.to_string())
}

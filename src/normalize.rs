//! Arabic text normalization and query matching

use serde::{Deserialize, Serialize};

/// Normalize Arabic text for matching: removes diacritics and tatweel,
/// normalizes alif/hamza variants, folds case for non-Arabic scripts
pub fn normalize_arabic(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            match c {
                // Skip harakat and dagger alif
                '\u{064B}'..='\u{065F}' | '\u{0670}' => None,
                // Skip tatweel
                '\u{0640}' => None,
                // Normalize alif variants (including alif wasla)
                'أ' | 'إ' | 'آ' | 'ٱ' => Some('ا'),
                // Normalize other variants
                'ؤ' => Some('و'),
                'ئ' | 'ى' => Some('ي'),
                'ک' | 'گ' | 'ڭ' => Some('ك'),
                'ی' | 'ے' => Some('ي'),
                'ۀ' | 'ە' => Some('ه'),
                'ۃ' => Some('ة'),
                'ٹ' => Some('ت'),
                'پ' => Some('ب'),
                'چ' => Some('ج'),
                'ژ' => Some('ز'),
                'ڤ' => Some('ف'),
                'ڨ' => Some('ق'),
                _ => Some(c),
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Query matching mode.
///
/// Both modes decide matches by substring containment over normalized text;
/// the mode is carried through to result rendering (how snippets are labeled
/// and highlighted), not to the boolean decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Phrase,
    Contains,
}

/// Stateless match predicate over pre-normalized row text.
///
/// The query is normalized once at construction; rows are normalized by the
/// caller before being tested. Pure string containment, no tokenization.
#[derive(Debug, Clone)]
pub struct MatchPredicate {
    normalized_query: String,
    mode: MatchMode,
}

impl MatchPredicate {
    pub fn new(query: &str, mode: MatchMode) -> Self {
        Self {
            normalized_query: normalize_arabic(query.trim()),
            mode,
        }
    }

    /// Test a normalized content row against the query
    pub fn matches(&self, normalized_row: &str) -> bool {
        if self.normalized_query.is_empty() {
            return false;
        }
        normalized_row.contains(&self.normalized_query)
    }

    pub fn normalized_query(&self) -> &str {
        &self.normalized_query
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}

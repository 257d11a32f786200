//! Match-span rendering over raw (vocalized) text
//!
//! Matching happens on normalized text, but results are displayed with the
//! original diacritics intact. This module maps normalized match positions
//! back onto raw byte offsets so consumers can highlight without re-running
//! the normalizer themselves.

use crate::normalize::normalize_arabic;
use serde::{Deserialize, Serialize};

/// Byte range into [`HighlightedText::text`] covering one query occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

/// Raw row text plus the spans where the query matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedText {
    pub text: String,
    pub spans: Vec<MatchSpan>,
}

/// Render raw row text with match spans for a normalized query.
///
/// Spans are byte offsets into the raw text. A span covers the raw characters
/// whose normalized forms produced the match; trailing diacritics after the
/// last matched letter are not included.
pub fn render(raw_text: &str, normalized_query: &str) -> HighlightedText {
    if normalized_query.is_empty() {
        return HighlightedText {
            text: raw_text.to_string(),
            spans: Vec::new(),
        };
    }

    // Build the normalized projection while recording, per normalized byte,
    // the raw byte range of the character it came from.
    let mut normalized = String::with_capacity(raw_text.len());
    let mut raw_ranges: Vec<(usize, usize)> = Vec::with_capacity(raw_text.len());

    for (raw_offset, raw_char) in raw_text.char_indices() {
        let raw_end = raw_offset + raw_char.len_utf8();
        let before = normalized.len();
        let mut buf = [0u8; 4];
        normalized.push_str(&normalize_arabic(raw_char.encode_utf8(&mut buf)));
        for _ in before..normalized.len() {
            raw_ranges.push((raw_offset, raw_end));
        }
    }

    let spans = normalized
        .match_indices(normalized_query)
        .map(|(start, matched)| {
            let end = start + matched.len();
            MatchSpan {
                start: raw_ranges[start].0,
                end: raw_ranges[end - 1].1,
            }
        })
        .collect();

    HighlightedText {
        text: raw_text.to_string(),
        spans,
    }
}

/// Window the text around the first match span, eliding distant context.
/// `context` is the number of characters kept on each side of the span.
pub fn snippet(highlighted: &HighlightedText, context: usize) -> String {
    let text = &highlighted.text;
    let Some(span) = highlighted.spans.first() else {
        return text.clone();
    };

    let start = if context == 0 {
        span.start
    } else {
        text[..span.start]
            .char_indices()
            .rev()
            .nth(context - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let end = text[span.end..]
        .char_indices()
        .nth(context)
        .map(|(i, _)| span.end + i)
        .unwrap_or(text.len());

    let mut out = String::new();
    if start > 0 {
        out.push('…');
    }
    out.push_str(&text[start..end]);
    if end < text.len() {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_arabic;

    #[test]
    fn span_covers_vocalized_word() {
        let rendered = render("كِتَابٌ", &normalize_arabic("كتاب"));
        assert_eq!(rendered.spans.len(), 1);
        let span = rendered.spans[0];
        assert_eq!(&rendered.text[span.start..span.end], "كِتَاب");
    }

    #[test]
    fn finds_every_occurrence() {
        let rendered = render("نور على نور", &normalize_arabic("نور"));
        assert_eq!(rendered.spans.len(), 2);
        for span in &rendered.spans {
            assert_eq!(&rendered.text[span.start..span.end], "نور");
        }
    }

    #[test]
    fn no_match_yields_no_spans() {
        let rendered = render("العلم نور", &normalize_arabic("كتاب"));
        assert!(rendered.spans.is_empty());
        assert_eq!(rendered.text, "العلم نور");
    }

    #[test]
    fn latin_case_folding_maps_back() {
        let rendered = render("The Kitab", &normalize_arabic("kitab"));
        assert_eq!(rendered.spans.len(), 1);
        let span = rendered.spans[0];
        assert_eq!(&rendered.text[span.start..span.end], "Kitab");
    }

    #[test]
    fn snippet_windows_around_first_span() {
        let raw = "a b c d e f كتاب g h i j k l";
        let rendered = render(raw, &normalize_arabic("كتاب"));
        let clipped = snippet(&rendered, 4);
        assert!(clipped.contains("كتاب"));
        assert!(clipped.starts_with('…'));
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn snippet_keeps_short_text_whole() {
        let rendered = render("كتاب الله", &normalize_arabic("كتاب"));
        assert_eq!(snippet(&rendered, 40), "كتاب الله");
    }
}

//! Deterministic content repair for FIX remedies.
//!
//! Redaction spans are expressed in character offsets per string leaf.
//! Spans are merged left to right before replacement: overlapping or
//! adjacent spans coalesce and the leftmost span's token wins. Truncation
//! runs after redaction.
//!
//! One plan is a single pass. Redacting a match can give a neighbouring run a
//! word boundary, and truncating can cut a longer run down to a match, so the
//! resolver rescans the result and applies further plans until nothing
//! matches.

use std::collections::BTreeMap;

use crate::content::Content;

/// One region to replace with a redaction token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionSpan {
    /// Dotted leaf path; `None` for text content
    pub path: Option<String>,
    pub start: usize,
    pub end: usize,
    pub token: String,
}

/// Everything a FIX pass will do to one content value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub redactions: Vec<RedactionSpan>,

    /// Truncate text content to this many characters
    pub truncate_to: Option<usize>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.redactions.is_empty() && self.truncate_to.is_none()
    }

    /// Apply the plan to a copy of `content`.
    pub fn apply(&self, content: &Content) -> Content {
        let mut repaired = content.clone();

        let mut by_leaf: BTreeMap<Option<String>, Vec<&RedactionSpan>> = BTreeMap::new();
        for span in &self.redactions {
            by_leaf.entry(span.path.clone()).or_default().push(span);
        }

        if !by_leaf.is_empty() {
            repaired.rewrite_strings(|path, text| {
                if let Some(spans) = by_leaf.get(&path.map(str::to_string)) {
                    *text = redact(text, &merge(spans));
                }
            });
        }

        if let (Some(max), Content::Text(text)) = (self.truncate_to, &mut repaired) {
            truncate_chars(text, max);
        }

        repaired
    }
}

/// Sort spans by start and coalesce overlapping or touching ones.
fn merge<'a>(spans: &[&'a RedactionSpan]) -> Vec<(usize, usize, &'a str)> {
    let mut sorted: Vec<&RedactionSpan> = spans.to_vec();
    // Stable: equal starts keep their original (rule) order.
    sorted.sort_by_key(|s| s.start);

    let mut merged: Vec<(usize, usize, &str)> = Vec::with_capacity(sorted.len());
    for span in sorted {
        match merged.last_mut() {
            Some((_, end, _)) if span.start <= *end => *end = (*end).max(span.end),
            _ => merged.push((span.start, span.end, span.token.as_str())),
        }
    }
    merged
}

/// Replace character ranges with tokens. Ranges must be sorted and disjoint.
fn redact(text: &str, spans: &[(usize, usize, &str)]) -> String {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let byte_at = |chars: usize| boundaries.get(chars).copied().unwrap_or(text.len());

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end, token) in spans {
        let (start, end) = (byte_at(start), byte_at(end));
        if start < cursor {
            continue;
        }
        out.push_str(&text[cursor..start]);
        out.push_str(token);
        cursor = end;
    }
    out.push_str(&text[cursor.min(text.len())..]);
    out
}

fn truncate_chars(text: &mut String, max: usize) {
    if let Some((byte, _)) = text.char_indices().nth(max) {
        text.truncate(byte);
    }
}

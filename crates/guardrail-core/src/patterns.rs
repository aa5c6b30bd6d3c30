//! Sensitive-data pattern catalog.
//!
//! A `PatternCatalog` maps pattern names to compiled matchers and their
//! canonical redaction tokens. The builtin set covers common PII and
//! credentials; callers register additional patterns at startup.
//!
//! Digit-grouped patterns are anchored with word boundaries so they never
//! match inside a longer digit run, and no redaction token matches any
//! builtin pattern, which keeps redaction a fixed point.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::Evidence;

lazy_static! {
    // =========================================================================
    // PII DETECTION PATTERNS
    // =========================================================================

    /// Email address pattern (RFC 5322 simplified)
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    /// US phone number (optional +1, 3-3-4 grouping)
    static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+1[-.\s]?)?(?:\(\d{3}\)\s?|\b\d{3}[-.\s]?)\d{3}[-.\s]?\d{4}\b"
    ).unwrap();

    /// Social Security Number (XXX-XX-XXXX or XXX XX XXXX)
    static ref SSN_PATTERN: Regex = Regex::new(
        r"\b\d{3}-\d{2}-\d{4}\b|\b\d{3} \d{2} \d{4}\b"
    ).unwrap();

    /// Credit card number (16 digits, optional separators)
    static ref CREDIT_CARD_PATTERN: Regex = Regex::new(
        r"\b(?:\d{4}[\s-]?){3}\d{4}\b"
    ).unwrap();

    // =========================================================================
    // CREDENTIAL DETECTION PATTERNS
    // =========================================================================

    /// API key / secret / token assignment
    static ref API_KEY_PATTERN: Regex = Regex::new(
        r#"(?i)\b(api[_-]?key|secret[_-]?key|access[_-]?token|auth[_-]?token|bearer|password|secret|token)[\s:=]+['"]?[a-zA-Z0-9_-]{16,}['"]?"#
    ).unwrap();

    /// AWS access key (all documented key prefixes)
    static ref AWS_KEY_PATTERN: Regex = Regex::new(
        r"\b(?:AKIA|ABIA|ACCA|AGPA|AIDA|AIPA|ANPA|ANVA|AROA|ASCA|ASIA)[A-Z0-9]{16}\b"
    ).unwrap();
}

/// Errors from pattern registration and lookup.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("unknown pattern '{0}'")]
    Unknown(String),

    #[error("pattern '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid regex for pattern '{name}': {source}")]
    InvalidRegex {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("redaction token '{replacement}' is itself matched by pattern '{name}'")]
    TokenMatchesPattern { name: String, replacement: String },
}

/// A named matcher with its canonical redaction token.
#[derive(Debug, Clone)]
pub struct SensitivePattern {
    name: String,
    regex: Regex,
    replacement: String,
}

impl SensitivePattern {
    /// Compile a new pattern. The replacement must not match the pattern.
    pub fn new(
        name: impl Into<String>,
        source: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, PatternError> {
        let name = name.into();
        let regex = Regex::new(source).map_err(|source| PatternError::InvalidRegex {
            name: name.clone(),
            source,
        })?;
        Self::from_regex(name, regex, replacement)
    }

    fn from_regex(
        name: String,
        regex: Regex,
        replacement: impl Into<String>,
    ) -> Result<Self, PatternError> {
        let replacement = replacement.into();
        if regex.is_match(&replacement) {
            return Err(PatternError::TokenMatchesPattern { name, replacement });
        }
        Ok(Self {
            name,
            regex,
            replacement,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// All non-overlapping matches, with character offsets.
    pub fn find_all(&self, text: &str) -> Vec<Evidence> {
        let mut evidence = Vec::new();
        let mut byte_cursor = 0;
        let mut char_cursor = 0;

        for m in self.regex.find_iter(text) {
            char_cursor += text[byte_cursor..m.start()].chars().count();
            let start = char_cursor;
            char_cursor += m.as_str().chars().count();
            byte_cursor = m.end();

            evidence.push(Evidence {
                pattern: self.name.clone(),
                matched: m.as_str().to_string(),
                start,
                end: char_cursor,
                path: None,
            });
        }

        evidence
    }
}

/// Registry of sensitive-data patterns by name.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    patterns: BTreeMap<String, SensitivePattern>,
}

impl PatternCatalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The builtin PII and credential patterns.
    pub fn builtin() -> Self {
        let builtins: [(&str, &Regex, &str); 6] = [
            ("ssn", &*SSN_PATTERN, "[REDACTED-SSN]"),
            ("credit_card", &*CREDIT_CARD_PATTERN, "[REDACTED-CREDIT-CARD]"),
            ("email", &*EMAIL_PATTERN, "[REDACTED-EMAIL]"),
            ("phone", &*PHONE_PATTERN, "[REDACTED-PHONE]"),
            ("api_key", &*API_KEY_PATTERN, "[REDACTED-API-KEY]"),
            ("aws_key", &*AWS_KEY_PATTERN, "[REDACTED-AWS-KEY]"),
        ];

        let patterns = builtins
            .into_iter()
            .map(|(name, regex, replacement)| {
                let pattern = SensitivePattern {
                    name: name.to_string(),
                    regex: regex.clone(),
                    replacement: replacement.to_string(),
                };
                (name.to_string(), pattern)
            })
            .collect();

        Self { patterns }
    }

    /// Compile and register a new pattern. Existing names are never replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: &str,
        replacement: impl Into<String>,
    ) -> Result<(), PatternError> {
        let pattern = SensitivePattern::new(name, source, replacement)?;
        self.insert(pattern)
    }

    /// Register an already compiled pattern.
    pub fn insert(&mut self, pattern: SensitivePattern) -> Result<(), PatternError> {
        if self.patterns.contains_key(pattern.name()) {
            return Err(PatternError::Duplicate(pattern.name().to_string()));
        }
        tracing::debug!(pattern = pattern.name(), "Registered sensitive pattern");
        self.patterns.insert(pattern.name().to_string(), pattern);
        Ok(())
    }

    /// Look up a pattern. Unknown names are an error, never a silent no-op.
    pub fn get(&self, name: &str) -> Result<&SensitivePattern, PatternError> {
        self.patterns
            .get(name)
            .ok_or_else(|| PatternError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensitivePattern> {
        self.patterns.values()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

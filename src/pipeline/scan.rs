//! Placeholder discovery.
//!
//! All five surface syntaxes are matched by a single alternation so a scan is
//! one left-to-right pass with non-overlapping results. Alternatives that can
//! start at the same offset are ordered longest delimiter first, which makes
//! `{{key}}` win over `{key}` and turns `{{{key}}}` into a `{{key}}` match at
//! offset 1.

use crate::config::DEFAULT_NAMESPACE;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

/// Surface form of a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Syntax {
    /// `dyno.key`
    Namespaced,
    /// `{{key}}`
    DoubleBrace,
    /// `{key}`
    SingleBrace,
    /// `${key}`
    DollarBrace,
    /// `%key%`
    Percent,
    /// `key` as a whole word in text content. Never reported by the scanner.
    BareWord,
    /// Text run of `<text id="key">`. Never reported by the scanner.
    ElementText,
}

impl Syntax {
    /// Delimited forms, in resolution order.
    pub const BRACED: [Syntax; 4] = [
        Syntax::DoubleBrace,
        Syntax::SingleBrace,
        Syntax::DollarBrace,
        Syntax::Percent,
    ];

    /// Canonical spelling of `key` in this syntax.
    pub fn spell(self, namespace: &str, key: &str) -> String {
        match self {
            Syntax::Namespaced => format!("{namespace}.{key}"),
            Syntax::DoubleBrace => format!("{{{{{key}}}}}"),
            Syntax::SingleBrace => format!("{{{key}}}"),
            Syntax::DollarBrace => format!("${{{key}}}"),
            Syntax::Percent => format!("%{key}%"),
            Syntax::BareWord | Syntax::ElementText => key.to_string(),
        }
    }
}

/// One located placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub syntax: Syntax,
    /// Identifier inside the delimiters, original case.
    pub key: String,
    /// Byte range of the whole token in the scanned document.
    pub span: Range<usize>,
}

impl Placeholder {
    /// The token text as it appears in `document`.
    pub fn text<'a>(&self, document: &'a str) -> &'a str {
        &document[self.span.clone()]
    }
}

/// Finds placeholders of every supported syntax.
#[derive(Debug, Clone)]
pub struct Scanner {
    pattern: Regex,
}

// Capture group index → syntax. Group 0 is the whole match.
const GROUPS: [(usize, Syntax); 5] = [
    (1, Syntax::DollarBrace),
    (2, Syntax::DoubleBrace),
    (3, Syntax::SingleBrace),
    (4, Syntax::Percent),
    (5, Syntax::Namespaced),
];

static DEFAULT_SCANNER: Lazy<Scanner> = Lazy::new(|| Scanner::new(DEFAULT_NAMESPACE));

impl Scanner {
    /// Build a scanner for the given dotted-syntax namespace.
    pub fn new(namespace: &str) -> Self {
        let pattern = format!(
            r"\$\{{(\w+)\}}|\{{\{{(\w+)\}}\}}|\{{(\w+)\}}|%(\w+)%|\b(?i:{ns})\.(\w+)",
            ns = regex::escape(namespace)
        );
        // Every interpolated piece is escaped, so the pattern always compiles.
        let pattern = Regex::new(&pattern).unwrap_or_else(|e| unreachable!("scanner regex: {e}"));
        Self { pattern }
    }

    /// Every placeholder occurrence, in document order.
    pub fn scan(&self, document: &str) -> Vec<Placeholder> {
        self.pattern
            .captures_iter(document)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                GROUPS.iter().find_map(|&(idx, syntax)| {
                    caps.get(idx).map(|key| Placeholder {
                        syntax,
                        key: key.as_str().to_string(),
                        span: whole.range(),
                    })
                })
            })
            .collect()
    }

    /// Distinct placeholder tokens as written (`{{price}}`, `dyno.Address`, …).
    pub fn distinct_tokens(&self, document: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(document)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// Scan with the default `dyno` namespace.
pub fn scan(document: &str) -> Vec<Placeholder> {
    DEFAULT_SCANNER.scan(document)
}

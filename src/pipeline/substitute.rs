//! Placeholder resolution and substitution.
//!
//! ## Rule table
//!
//! Every way a data value can land in the document is one row of [`RULES`]:
//! a surface [`Syntax`], the [`Source`] of the key (the data dictionary itself
//! or the field mapping) and a priority. Each data / mapping entry compiles
//! one case-insensitive matcher per applicable row.
//!
//! ## Atomic application
//!
//! Matchers run against the *original* document and produce candidate spans.
//! Overlaps are resolved leftmost first, then longest, then by priority, then
//! by dictionary order; the surviving spans are spliced in a single pass.
//! A substituted value is therefore never scanned again, so a value that
//! happens to contain `{other}` cannot trigger a second substitution, and the
//! result does not depend on the order entries are visited in.

use crate::config::RenderConfig;
use crate::data::{DataDictionary, FieldMapping};
use crate::error::RenderWarning;
use crate::output::{SubstitutionResult, SubstitutionStats};
use crate::pipeline::scan::{Scanner, Syntax};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use tracing::{debug, warn};

/// Where the placeholder key of a rule comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The key is a data dictionary key.
    Direct,
    /// The key is a field-mapping placeholder key pointing at a data key.
    Mapped,
}

/// One row of the resolution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub syntax: Syntax,
    pub source: Source,
    /// Lower wins when two candidates cover the same span.
    pub priority: u8,
}

const fn rule(syntax: Syntax, source: Source, priority: u8) -> Rule {
    Rule {
        syntax,
        source,
        priority,
    }
}

/// Resolution order. Bare-word rows only run when the fallback is enabled.
pub const RULES: &[Rule] = &[
    rule(Syntax::Namespaced, Source::Direct, 1),
    rule(Syntax::Namespaced, Source::Mapped, 2),
    rule(Syntax::DoubleBrace, Source::Direct, 3),
    rule(Syntax::SingleBrace, Source::Direct, 3),
    rule(Syntax::DollarBrace, Source::Direct, 3),
    rule(Syntax::Percent, Source::Direct, 3),
    rule(Syntax::DoubleBrace, Source::Mapped, 4),
    rule(Syntax::SingleBrace, Source::Mapped, 4),
    rule(Syntax::DollarBrace, Source::Mapped, 4),
    rule(Syntax::Percent, Source::Mapped, 4),
    rule(Syntax::ElementText, Source::Mapped, 5),
    rule(Syntax::BareWord, Source::Direct, 6),
    rule(Syntax::BareWord, Source::Mapped, 7),
];

/// Compile the matcher for `key` in `syntax`.
///
/// Returns `None` when the syntax cannot express the key: bare words need an
/// identifier key and the namespaced form a non-empty one. For [`Syntax::ElementText`] the replaceable span
/// is capture group 1; for every other syntax it is the whole match.
pub fn compile_matcher(syntax: Syntax, namespace: &str, key: &str) -> Option<Regex> {
    let k = regex::escape(key);
    let pattern = match syntax {
        Syntax::Namespaced if !key.is_empty() => {
            // `dyno.price` must not match inside `dyno.price_per_sqft`; a key
            // ending in punctuation has no word edge to anchor on.
            let tail = if key.ends_with(|c: char| c.is_alphanumeric() || c == '_') {
                r"\b"
            } else {
                ""
            };
            format!(r"(?i)\b{}\.{k}{tail}", regex::escape(namespace))
        }
        Syntax::DoubleBrace => format!(r"(?i)\{{\{{{k}\}}\}}"),
        Syntax::SingleBrace => format!(r"(?i)\{{{k}\}}"),
        Syntax::DollarBrace => format!(r"(?i)\$\{{{k}\}}"),
        Syntax::Percent => format!(r"(?i)%{k}%"),
        Syntax::BareWord if is_identifier(key) => format!(r"(?i)\b{k}\b"),
        Syntax::ElementText => format!(
            r#"(?i)<text\b[^>]*?\sid\s*=\s*["']{k}["'][^>]*>\s*(?:<tspan\b[^>]*>)?([^<]*)<"#
        ),
        Syntax::Namespaced | Syntax::BareWord => return None,
    };
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping key '{}' for {:?}: {}", key, syntax, e);
            None
        }
    }
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Escape a value for insertion into markup, text or attribute context.
pub fn escape_markup(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// A candidate replacement found in the original document.
#[derive(Debug, Clone)]
struct Candidate {
    span: Range<usize>,
    priority: u8,
    /// Position of the entry in dictionary / mapping order.
    order: usize,
    value: usize,
}

/// Applies a data dictionary and field mapping to documents.
#[derive(Debug, Clone)]
pub struct Substitutor {
    namespace: String,
    bare_word_fallback: bool,
    bare_word_min_len: usize,
    max_document_bytes: usize,
    scanner: Scanner,
}

impl Substitutor {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            bare_word_fallback: config.bare_word_fallback,
            bare_word_min_len: config.bare_word_min_len,
            max_document_bytes: config.max_document_bytes,
            scanner: Scanner::new(&config.namespace),
        }
    }

    /// Override the bare-word fallback for this substitutor.
    pub fn with_bare_word_fallback(mut self, enabled: bool) -> Self {
        self.bare_word_fallback = enabled;
        self
    }

    /// Replace every resolvable placeholder in `document`.
    ///
    /// Never fails: unknown keys and empty values are silently skipped;
    /// suspicious output is reported through `warnings`.
    pub fn apply(
        &self,
        document: &str,
        data: &DataDictionary,
        mapping: &FieldMapping,
    ) -> SubstitutionResult {
        let placeholders_found = self.scanner.distinct_tokens(document).len();

        // Direct entries first, then mapped; `value_of[i]` indexes `values`.
        let mut entries: Vec<(&str, Source)> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        let mut value_of: Vec<usize> = Vec::new();

        for (key, scalar) in data.iter() {
            if let Some(text) = scalar.substitution_text() {
                debug!("Direct field: {} = {:?}", key, text);
                entries.push((key, Source::Direct));
                values.push(escape_markup(&text));
                value_of.push(values.len() - 1);
            }
        }
        for (placeholder_key, data_key) in mapping.iter() {
            if let Some(text) = data.text(data_key) {
                debug!("Mapped field: {} → {} = {:?}", placeholder_key, data_key, text);
                entries.push((placeholder_key, Source::Mapped));
                values.push(escape_markup(&text));
                value_of.push(values.len() - 1);
            }
        }

        let protected = if self.bare_word_fallback {
            protected_ranges(document)
        } else {
            Vec::new()
        };

        let mut candidates = Vec::new();
        for rule in RULES {
            if rule.syntax == Syntax::BareWord && !self.bare_word_fallback {
                continue;
            }
            for (order, &(key, source)) in entries.iter().enumerate() {
                if source != rule.source {
                    continue;
                }
                if rule.syntax == Syntax::BareWord && key.chars().count() < self.bare_word_min_len {
                    continue;
                }
                let Some(re) = compile_matcher(rule.syntax, &self.namespace, key) else {
                    continue;
                };
                let value = value_of[order];
                if rule.syntax == Syntax::ElementText {
                    for caps in re.captures_iter(document) {
                        if let Some(run) = caps.get(1) {
                            candidates.push(Candidate {
                                span: run.range(),
                                priority: rule.priority,
                                order,
                                value,
                            });
                        }
                    }
                    continue;
                }
                for m in re.find_iter(document) {
                    if rule.syntax == Syntax::BareWord && overlaps_any(&m.range(), &protected) {
                        continue;
                    }
                    candidates.push(Candidate {
                        span: m.range(),
                        priority: rule.priority,
                        order,
                        value,
                    });
                }
            }
        }

        let accepted = resolve_overlaps(candidates);
        let replacement_count = accepted.len();

        let mut out = String::with_capacity(document.len());
        let mut cursor = 0;
        for c in &accepted {
            out.push_str(&document[cursor..c.span.start]);
            out.push_str(&values[c.value]);
            cursor = c.span.end;
        }
        out.push_str(&document[cursor..]);

        let mut warnings = Vec::new();
        if !out.contains("<svg") {
            warn!("Substituted document has no <svg> tag");
            warnings.push(RenderWarning::MissingRoot);
        }
        let size = out.len();
        if size > self.max_document_bytes {
            warn!(
                "Substituted document is {} bytes (limit {})",
                size, self.max_document_bytes
            );
            warnings.push(RenderWarning::SizeLimitExceeded {
                size,
                limit: self.max_document_bytes,
            });
        }

        debug!(
            "Substitution complete: {} placeholders found, {} replaced",
            placeholders_found, replacement_count
        );

        SubstitutionResult {
            document: out,
            replacement_count,
            warnings,
            stats: SubstitutionStats {
                placeholders_found,
                placeholders_replaced: replacement_count,
                estimated_size: size,
            },
        }
    }
}

/// Keep non-overlapping candidates: leftmost, then longest, then lowest
/// priority, then earliest entry. Result is sorted by position.
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then_with(|| b.span.len().cmp(&a.span.len()))
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| a.order.cmp(&b.order))
    });

    let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut last_end = 0;
    for c in candidates {
        let starts_clear = accepted.is_empty() || c.span.start >= last_end;
        // An empty span at the end of an accepted one would insert twice.
        let duplicate_insert = c.span.is_empty()
            && accepted
                .last()
                .is_some_and(|prev| prev.span.end == c.span.start);
        if starts_clear && !duplicate_insert {
            last_end = c.span.end;
            accepted.push(c);
        }
    }
    accepted
}

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_STYLE_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());

/// Byte ranges where bare words must never be replaced: tags and style sheets.
fn protected_ranges(document: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = RE_TAG
        .find_iter(document)
        .chain(RE_STYLE_BODY.find_iter(document))
        .map(|m| m.range())
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
}

fn overlaps_any(span: &Range<usize>, ranges: &[Range<usize>]) -> bool {
    ranges
        .iter()
        .any(|r| span.start < r.end && r.start < span.end)
}

/// Substitute with a one-off [`Substitutor`] built from `config`.
pub fn substitute(
    document: &str,
    data: &DataDictionary,
    mapping: &FieldMapping,
    config: &RenderConfig,
) -> SubstitutionResult {
    Substitutor::new(config).apply(document, data, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> DataDictionary {
        pairs.iter().copied().collect()
    }

    fn run(doc: &str, d: &DataDictionary) -> SubstitutionResult {
        substitute(doc, d, &FieldMapping::new(), &RenderConfig::default())
    }

    #[test]
    fn namespaced_example() {
        let r = run(
            "<svg><text>dyno.address</text></svg>",
            &data(&[("address", "123 Main St")]),
        );
        assert_eq!(r.document, "<svg><text>123 Main St</text></svg>");
        assert_eq!(r.replacement_count, 1);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn double_and_single_brace_both_replaced() {
        let r = run(
            "<svg><text>{{price}}</text><text>{price}</text></svg>",
            &data(&[("price", "$500,000")]),
        );
        assert_eq!(
            r.document,
            "<svg><text>$500,000</text><text>$500,000</text></svg>"
        );
        assert_eq!(r.replacement_count, 2);
    }

    #[test]
    fn empty_value_leaves_placeholder() {
        let r = run("<svg><text>{{title}}</text></svg>", &data(&[("title", "")]));
        assert_eq!(r.document, "<svg><text>{{title}}</text></svg>");
        assert_eq!(r.replacement_count, 0);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn dollar_brace_not_split_by_single_brace_rule() {
        let r = run("<svg>${price}</svg>", &data(&[("price", "9")]));
        assert_eq!(r.document, "<svg>9</svg>");
        assert_eq!(r.replacement_count, 1);
    }

    #[test]
    fn triple_brace_keeps_outer_brace_pair() {
        let r = run("<svg>{{{price}}}</svg>", &data(&[("price", "9")]));
        assert_eq!(r.document, "<svg>{9}</svg>");
    }

    #[test]
    fn case_variants_of_namespace_and_key() {
        let r = run(
            "<svg>dyno.City DYNO.CITY dyno.city</svg>",
            &data(&[("city", "Austin")]),
        );
        assert_eq!(r.document, "<svg>Austin Austin Austin</svg>");
        assert_eq!(r.replacement_count, 3);
    }

    #[test]
    fn namespaced_key_does_not_match_longer_key() {
        let r = run(
            "<svg>dyno.price dyno.price_per_sqft</svg>",
            &data(&[("price", "1")]),
        );
        assert_eq!(r.document, "<svg>1 dyno.price_per_sqft</svg>");
    }

    #[test]
    fn namespaced_key_with_punctuation_is_replaced() {
        let r = run(
            "<svg><text>dyno.list-price</text><text>DYNO.List-Price</text></svg>",
            &data(&[("list-price", "$9")]),
        );
        assert_eq!(r.document, "<svg><text>$9</text><text>$9</text></svg>");
        assert_eq!(r.replacement_count, 2);
    }

    #[test]
    fn hyphenated_key_beats_its_prefix_key() {
        let r = run(
            "<svg>dyno.list-price dyno.list</svg>",
            &data(&[("list", "L"), ("list-price", "P")]),
        );
        assert_eq!(r.document, "<svg>P L</svg>");
    }

    #[test]
    fn values_are_never_rescanned() {
        let r = run(
            "<svg>{a} {b}</svg>",
            &data(&[("a", "{b}"), ("b", "B")]),
        );
        assert_eq!(r.document, "<svg>{b} B</svg>");
        assert_eq!(r.replacement_count, 2);
    }

    #[test]
    fn values_are_markup_escaped() {
        let r = run(
            r#"<svg><text>{{agent}}</text></svg>"#,
            &data(&[("agent", "Smith & <Sons>")]),
        );
        assert_eq!(r.document, "<svg><text>Smith &amp; &lt;Sons&gt;</text></svg>");
    }

    #[test]
    fn mapped_field_resolves_through_data_key() {
        let mapping: FieldMapping = [("headline", "title")].into_iter().collect();
        let r = substitute(
            "<svg>dyno.headline {{headline}}</svg>",
            &data(&[("title", "Open House")]),
            &mapping,
            &RenderConfig::default(),
        );
        assert_eq!(r.document, "<svg>Open House Open House</svg>");
        assert_eq!(r.replacement_count, 2);
    }

    #[test]
    fn direct_match_beats_mapping_on_same_span() {
        let mapping: FieldMapping = [("title", "subtitle")].into_iter().collect();
        let r = substitute(
            "<svg>dyno.title</svg>",
            &data(&[("title", "Direct"), ("subtitle", "Mapped")]),
            &mapping,
            &RenderConfig::default(),
        );
        assert_eq!(r.document, "<svg>Direct</svg>");
        assert_eq!(r.replacement_count, 1);
    }

    #[test]
    fn mapping_to_missing_data_key_is_silent() {
        let mapping: FieldMapping = [("headline", "nope")].into_iter().collect();
        let r = substitute(
            "<svg>dyno.headline</svg>",
            &DataDictionary::new(),
            &mapping,
            &RenderConfig::default(),
        );
        assert_eq!(r.document, "<svg>dyno.headline</svg>");
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn element_text_mapping_replaces_first_run() {
        let mapping: FieldMapping = [("price_label", "price")].into_iter().collect();
        let doc = r#"<svg><text id="price_label" x="4"><tspan x="4">$0</tspan></text></svg>"#;
        let r = substitute(doc, &data(&[("price", "$450,000")]), &mapping, &RenderConfig::default());
        assert_eq!(
            r.document,
            r#"<svg><text id="price_label" x="4"><tspan x="4">$450,000</tspan></text></svg>"#
        );
        assert_eq!(r.replacement_count, 1);
    }

    #[test]
    fn bare_word_off_by_default() {
        let r = run("<svg><text>Price here</text></svg>", &data(&[("price", "1")]));
        assert_eq!(r.document, "<svg><text>Price here</text></svg>");
    }

    #[test]
    fn bare_word_only_touches_text_content() {
        let config = RenderConfig::builder().bare_word_fallback(true).build().unwrap();
        let doc = r#"<svg><style>.price{fill:red}</style><text class="price">price</text></svg>"#;
        let r = substitute(doc, &data(&[("price", "$9")]), &FieldMapping::new(), &config);
        assert_eq!(
            r.document,
            r#"<svg><style>.price{fill:red}</style><text class="price">$9</text></svg>"#
        );
        assert_eq!(r.replacement_count, 1);
    }

    #[test]
    fn bare_word_skips_short_keys() {
        let config = RenderConfig::builder().bare_word_fallback(true).build().unwrap();
        let r = substitute(
            "<svg><text>bed</text></svg>",
            &data(&[("bed", "3")]),
            &FieldMapping::new(),
            &config,
        );
        assert_eq!(r.replacement_count, 0);
    }

    #[test]
    fn bare_word_loses_to_placeholder_at_same_position() {
        let config = RenderConfig::builder().bare_word_fallback(true).build().unwrap();
        let r = substitute(
            "<svg><text>dyno.title</text></svg>",
            &data(&[("dyno", "X"), ("title", "T")]),
            &FieldMapping::new(),
            &config,
        );
        assert_eq!(r.document, "<svg><text>T</text></svg>");
    }

    #[test]
    fn idempotent_on_own_output() {
        let d = data(&[("address", "123 Main St"), ("price", "$1")]);
        let doc = "<svg><text>dyno.address</text><text>{{price}} %price%</text></svg>";
        let first = run(doc, &d);
        let second = run(&first.document, &d);
        assert_eq!(first.document, second.document);
        assert_eq!(second.replacement_count, 0);
    }

    #[test]
    fn missing_root_warning() {
        let r = run("<g>{{a}}</g>", &data(&[("a", "1")]));
        assert_eq!(r.warnings, vec![RenderWarning::MissingRoot]);
    }

    #[test]
    fn size_limit_warning_uses_configured_ceiling() {
        let config = RenderConfig::builder().max_document_bytes(16).build().unwrap();
        let r = substitute(
            "<svg>{{a}}</svg>",
            &data(&[("a", "a long value that overflows")]),
            &FieldMapping::new(),
            &config,
        );
        assert!(matches!(
            r.warnings.as_slice(),
            [RenderWarning::SizeLimitExceeded { limit: 16, .. }]
        ));
    }

    #[test]
    fn stats_report_found_and_replaced() {
        let r = run("<svg>{{a}} {{b}} {{a}}</svg>", &data(&[("a", "1")]));
        assert_eq!(r.stats.placeholders_found, 2);
        assert_eq!(r.stats.placeholders_replaced, 2);
        assert_eq!(r.stats.estimated_size, r.document.len());
    }

    #[test]
    fn rule_table_orders_direct_before_mapped() {
        let direct = RULES.iter().find(|r| r.syntax == Syntax::Namespaced && r.source == Source::Direct);
        let mapped = RULES.iter().find(|r| r.syntax == Syntax::Namespaced && r.source == Source::Mapped);
        assert!(direct.unwrap().priority < mapped.unwrap().priority);
    }

    #[test]
    fn compile_matcher_rejects_non_identifier_for_bare_words() {
        assert!(compile_matcher(Syntax::Namespaced, "dyno", "").is_none());
        assert!(compile_matcher(Syntax::Namespaced, "dyno", "first name").is_some());
        assert!(compile_matcher(Syntax::BareWord, "dyno", "a.b").is_none());
        assert!(compile_matcher(Syntax::DoubleBrace, "dyno", "first name").is_some());
    }
}

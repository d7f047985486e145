//! Page-count normalization.
//!
//! Reference records describe their extent with free-text page strings in a
//! dozen notations ("14-16", "21.1-21.24", "IS 39-42", "I-VIII, 12-15", ...).
//! [`PageCountNormalizer`] turns such a string into the number of pages it
//! spans so that two records can be compared on length.
//!
//! The notations overlap, so the rules are tried in a fixed order and the
//! first rule whose pattern occurs in the input decides. If that occurrence
//! does not cover the whole input the string is unparseable. The order of
//! [`PageCountNormalizer::standard_rules`] is part of the contract.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

/// Why a page string produced no count.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageCountError {
    #[error("no page-count rule matches")]
    NoRuleMatched,

    #[error("rule '{rule}' matches only part of the input")]
    PartialMatch { rule: &'static str },

    #[error("rule '{rule}' captured a number that does not fit")]
    InvalidNumber { rule: &'static str },

    #[error("rule '{rule}' computed a non-positive count {value}")]
    NonPositive { rule: &'static str, value: i64 },
}

/// Computes a page count from the groups captured by a rule's pattern.
pub type CountFormula = fn(&Captures<'_>) -> Option<i64>;

/// One pattern -> formula rule of the cascade.
#[derive(Debug, Clone)]
pub struct PageRule {
    name: &'static str,
    pattern: Regex,
    formula: CountFormula,
}

impl PageRule {
    pub fn new(
        name: &'static str,
        pattern: &str,
        formula: CountFormula,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            formula,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the rule. `None` means the pattern does not occur in `text`.
    fn apply(&self, text: &str) -> Option<Result<u32, PageCountError>> {
        let caps = self.pattern.captures(text)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return Some(Err(PageCountError::PartialMatch { rule: self.name }));
        }

        let Some(value) = (self.formula)(&caps) else {
            return Some(Err(PageCountError::InvalidNumber { rule: self.name }));
        };

        Some(match u32::try_from(value) {
            Ok(count) if count > 0 => Ok(count),
            _ => Err(PageCountError::NonPositive {
                rule: self.name,
                value,
            }),
        })
    }
}

/// Numeric capture group `i`, if present and in range.
fn num(caps: &Captures<'_>, i: usize) -> Option<i64> {
    caps.get(i)?.as_str().parse::<u32>().ok().map(i64::from)
}

/// Span of the inclusive range between groups `lo` and `hi`.
fn span(caps: &Captures<'_>, lo: usize, hi: usize) -> Option<i64> {
    Some(num(caps, hi)? - num(caps, lo)? + 1)
}

/// Ordered rule cascade turning page text into a page count.
#[derive(Debug, Clone)]
pub struct PageCountNormalizer {
    rules: Vec<PageRule>,
}

static STANDARD: LazyLock<PageCountNormalizer> = LazyLock::new(PageCountNormalizer::default);

impl Default for PageCountNormalizer {
    fn default() -> Self {
        Self {
            rules: Self::standard_rules(),
        }
    }
}

impl PageCountNormalizer {
    /// The built-in cascade, highest priority first.
    pub fn standard_rules() -> Vec<PageRule> {
        let table: [(&'static str, &str, CountFormula); 13] = [
            // 12
            ("single", r"^[0-9]+$", |_| Some(1)),
            // 436765:1-436765:21
            (
                "colon-qualified",
                r"([0-9]+[0-9A-Za-z_]*):([0-9]+)-([0-9]+[0-9A-Za-z_]*):([0-9]+)",
                |c| span(c, 2, 4),
            ),
            // 5: 1-29
            ("numbered", r"([0-9]+):\s([0-9]+)-([0-9]+)", |c| span(c, 2, 3)),
            // IS 39-42
            ("lettered", r"[A-Z]+\s([0-9]+)-([0-9]+)", |c| span(c, 1, 2)),
            // 21.1-21.24
            ("dotted", r"([0-9]+)\.([0-9]+)-([0-9]+)\.([0-9]+)", |c| {
                span(c, 2, 4)
            }),
            // 14-15, 20-22
            ("two-ranges", r"([0-9]+)-([0-9]+),\s([0-9]+)-([0-9]+)", |c| {
                Some(span(c, 1, 2)? + span(c, 3, 4)?)
            }),
            // 2, 4, 6-7, 64
            (
                "mixed-list",
                r"([0-9]+),\s([0-9]+),\s([0-9]+)-([0-9]+),\s([0-9]+)",
                |c| Some(num(c, 4)? - num(c, 3)? + 4),
            ),
            // 14-15, 20
            ("range-and-page", r"([0-9]+)-([0-9]+),\s[0-9]+[a-zA-Z]*", |c| {
                Some(num(c, 2)? - num(c, 1)? + 2)
            }),
            // 31-33, B1-B22
            (
                "range-and-lettered-range",
                r"([0-9]+)-([0-9]+),\s[a-zA-Z]([0-9]+)-[a-zA-Z]([0-9]+)",
                |c| Some(span(c, 1, 2)? + span(c, 3, 4)?),
            ),
            // 2-3&4
            ("ampersand", r"([0-9]+)-([0-9]+)&([0-9]+)", |c| {
                Some(num(c, 2)? - num(c, 1)? + 2)
            }),
            // I-VIII, 12-15
            ("prefixed-range", r"(.*?),\s([0-9]+)-([0-9]+)(.*)", |c| {
                span(c, 2, 3)
            }),
            // I-VIII, 12
            ("prefixed-page", r"(.*?),\s([0-9]+)(.*)", |_| Some(1)),
            // 14-16
            ("range", r"([0-9]+)-([0-9]+)[a-zA-Z]*", |c| span(c, 1, 2)),
        ];

        table
            .into_iter()
            .map(|(name, pattern, formula)| {
                PageRule::new(name, pattern, formula).expect("built-in page-count pattern")
            })
            .collect()
    }

    /// Append a rule. It is tried after every existing rule.
    pub fn push_rule(&mut self, rule: PageRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[PageRule] {
        &self.rules
    }

    /// Page count of `text`, or why there is none.
    pub fn count(&self, text: &str) -> Result<u32, PageCountError> {
        let text = text.trim();
        self.rules
            .iter()
            .find_map(|rule| rule.apply(text))
            .unwrap_or(Err(PageCountError::NoRuleMatched))
    }

    /// Page count of `text`; 0 when absent, empty or unparseable.
    pub fn normalize(&self, text: Option<&str>) -> u32 {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return 0;
        };
        match self.count(text) {
            Ok(count) => count,
            Err(err) => {
                debug!(pages = text, %err, "page count unknown");
                0
            }
        }
    }
}

/// Normalize with the standard cascade.
pub fn normalize_pages(text: &str) -> u32 {
    STANDARD.normalize(Some(text))
}

//! Candidate queries against the reference index.
//!
//! Queries are exact-phrase field clauses joined by boolean keywords:
//!
//! ```text
//! nsw_title:"graph theory algorithms" OR nsw_title:"theory algorithms survey"
//! ```
//!
//! [`CandidateQueryBuilder`] produces them from a source title. The string
//! form is tantivy query-parser syntax over the two title fields of
//! [`crate::index::InMemoryIndex`].

use std::fmt;

use crate::config::{FeatureConfig, QueryOperator};
use crate::text::{strip_punctuation, TitleNormalizer};

/// The two indexed title fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitleField {
    /// Title as published.
    Title,
    /// Title with stop words and punctuation removed.
    NswTitle,
}

impl TitleField {
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::NswTitle => "nsw_title",
        }
    }

    /// Field matching the stop-word setting.
    pub fn for_stop_words(remove_stop_words: bool) -> Self {
        if remove_stop_words {
            Self::NswTitle
        } else {
            Self::Title
        }
    }
}

/// Phrase clauses over one field, any of which may match.
///
/// An empty query means "no candidates" and is never sent to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    field: TitleField,
    phrases: Vec<String>,
}

impl CandidateQuery {
    pub fn empty(field: TitleField) -> Self {
        Self {
            field,
            phrases: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn field(&self) -> TitleField {
        self.field
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, phrase) in self.phrases.iter().enumerate() {
            if i > 0 {
                f.write_str(" OR ")?;
            }
            write!(f, "{}:\"{}\"", self.field.name(), phrase)?;
        }
        Ok(())
    }
}

/// Turns a noisy title into a [`CandidateQuery`].
#[derive(Debug, Clone, Copy)]
pub struct CandidateQueryBuilder<'a> {
    normalizer: &'a TitleNormalizer,
}

impl<'a> CandidateQueryBuilder<'a> {
    pub fn new(normalizer: &'a TitleNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn build(&self, title: &str, config: &FeatureConfig) -> CandidateQuery {
        let field = TitleField::for_stop_words(config.remove_stop_words);
        let phrases = match config.operator {
            QueryOperator::And => self.whole_title_phrase(title, config.remove_stop_words),
            QueryOperator::Or => self.ngram_phrases(title, config),
        };
        CandidateQuery { field, phrases }
    }

    /// One phrase over the whole title.
    fn whole_title_phrase(&self, title: &str, remove_stop_words: bool) -> Vec<String> {
        let phrase = if remove_stop_words {
            self.normalizer.strip_to_plain_string(title)
        } else {
            strip_punctuation(title)
        };
        if phrase.is_empty() {
            Vec::new()
        } else {
            vec![phrase]
        }
    }

    /// Sliding windows of `ngram_width` tokens, stride 1; short titles give
    /// one phrase over all tokens.
    fn ngram_phrases(&self, title: &str, config: &FeatureConfig) -> Vec<String> {
        let tokens = self.normalizer.tokenize(title, config.remove_stop_words);
        let width = config.ngram_width.max(1);
        if tokens.is_empty() {
            return Vec::new();
        }
        if tokens.len() <= width {
            return vec![tokens.join(" ")];
        }
        tokens.windows(width).map(|w| w.join(" ")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::StopWords;

    fn config(operator: QueryOperator, remove_stop_words: bool, ngram_width: usize) -> FeatureConfig {
        FeatureConfig {
            operator,
            remove_stop_words,
            ngram_width,
            ..FeatureConfig::default()
        }
    }

    fn normalizer() -> TitleNormalizer {
        TitleNormalizer::new(StopWords::new(["a", "of", "the", "for", "on"]))
    }

    fn build(title: &str, config: &FeatureConfig) -> String {
        let normalizer = normalizer();
        CandidateQueryBuilder::new(&normalizer)
            .build(title, config)
            .to_string()
    }

    #[test]
    fn test_empty_title_gives_empty_query() {
        for operator in [QueryOperator::And, QueryOperator::Or] {
            for remove in [true, false] {
                assert_eq!(build("", &config(operator, remove, 3)), "");
            }
        }
    }

    #[test]
    fn test_and_without_stop_words_keeps_case() {
        let q = build("Graph Theory!!", &config(QueryOperator::And, false, 3));
        assert_eq!(q, r#"title:"Graph Theory""#);
    }

    #[test]
    fn test_and_with_stop_words_uses_stripped_field() {
        let q = build("The Theory of Graphs", &config(QueryOperator::And, true, 3));
        assert_eq!(q, r#"nsw_title:"theory graphs""#);
    }

    #[test]
    fn test_and_all_stop_words_gives_empty_query() {
        let normalizer = normalizer();
        let query = CandidateQueryBuilder::new(&normalizer)
            .build("On the", &config(QueryOperator::And, true, 3));
        assert!(query.is_empty());
    }

    #[test]
    fn test_or_short_title_single_clause() {
        let q = build("Graph Theory", &config(QueryOperator::Or, true, 3));
        assert_eq!(q, r#"nsw_title:"graph theory""#);

        let q = build("graph theory", &config(QueryOperator::Or, true, 2));
        assert_eq!(q, r#"nsw_title:"graph theory""#);
    }

    #[test]
    fn test_or_sliding_bigrams() {
        let q = build("Graph Theory Algorithms", &config(QueryOperator::Or, true, 2));
        assert_eq!(
            q,
            r#"nsw_title:"graph theory" OR nsw_title:"theory algorithms""#
        );
    }

    #[test]
    fn test_or_trigrams_skip_stop_words() {
        let q = build(
            "Algorithms for the Theory of Sparse Graphs",
            &config(QueryOperator::Or, true, 3),
        );
        assert_eq!(
            q,
            concat!(
                r#"nsw_title:"algorithms theory sparse" OR "#,
                r#"nsw_title:"theory sparse graphs""#
            )
        );
    }

    #[test]
    fn test_or_without_stop_words_uses_raw_field() {
        let q = build("The Graph", &config(QueryOperator::Or, false, 1));
        assert_eq!(q, r#"title:"the" OR title:"graph""#);
    }
}

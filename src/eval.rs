//! Evaluation against known correct matches.
//!
//! Counts are accumulated in an explicit [`EvaluationTally`] owned by the
//! caller, so separate runs never share state.

use std::fmt;

use ahash::AHashMap;

use crate::record::{MatchResult, SourceRecord};

/// Ground truth: source identifier to the correct reference identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownMatches {
    matches: AHashMap<String, String>,
}

impl KnownMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, reference_id: impl Into<String>) {
        self.matches.insert(source_id.into(), reference_id.into());
    }

    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.matches.get(source_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl<S: Into<String>, R: Into<String>> FromIterator<(S, R)> for KnownMatches {
    fn from_iter<T: IntoIterator<Item = (S, R)>>(iter: T) -> Self {
        Self {
            matches: iter
                .into_iter()
                .map(|(s, r)| (s.into(), r.into()))
                .collect(),
        }
    }
}

/// How one linkage outcome was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    TruePositive,
    FalsePositive,
    /// Nothing was returned; missed known matches are counted at the end.
    NoMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationTally {
    true_positives: usize,
    false_positives: usize,
}

impl EvaluationTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `result` for `source`. A returned match is a true positive
    /// only when it is the known one; any other returned match, including one
    /// for a source without a known match, is a false positive.
    pub fn record(
        &mut self,
        result: &MatchResult,
        source: &SourceRecord,
        known: &KnownMatches,
    ) -> Outcome {
        let Some(matched) = result.matched_id() else {
            return Outcome::NoMatch;
        };
        if known.get(&source.id) == Some(matched) {
            self.true_positives += 1;
            Outcome::TruePositive
        } else {
            self.false_positives += 1;
            Outcome::FalsePositive
        }
    }

    pub fn true_positives(&self) -> usize {
        self.true_positives
    }

    pub fn false_positives(&self) -> usize {
        self.false_positives
    }

    /// Final figures; every known match not found counts as a false negative.
    pub fn finish(&self, known: &KnownMatches) -> Evaluation {
        let tp = self.true_positives;
        let fp = self.false_positives;
        let fn_ = known.len().saturating_sub(tp);

        let precision = fraction(tp, tp + fp);
        let recall = fraction(tp, tp + fn_);
        let f_measure = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Evaluation {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            precision,
            recall,
            f_measure,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision, recall and F-measure of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TP = {}", self.true_positives)?;
        writeln!(f, "FP = {}", self.false_positives)?;
        writeln!(f, "FN = {}", self.false_negatives)?;
        writeln!(f, "Prec = {}", self.precision)?;
        writeln!(f, "Recall = {}", self.recall)?;
        write!(f, "F-Measure = {}", self.f_measure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReferenceRecord;

    const EPS: f64 = 1e-9;

    fn matched(id: &str) -> MatchResult {
        MatchResult {
            best: Some(ReferenceRecord::new(id, "t")),
            score: 1.0,
            candidates: 1,
        }
    }

    #[test]
    fn test_record_classifies_outcomes() {
        let known: KnownMatches = [("s1", "r1"), ("s2", "r2")].into_iter().collect();
        let mut tally = EvaluationTally::new();

        let s1 = SourceRecord::new("s1", "t");
        let s2 = SourceRecord::new("s2", "t");
        let s3 = SourceRecord::new("s3", "t");

        assert_eq!(tally.record(&matched("r1"), &s1, &known), Outcome::TruePositive);
        assert_eq!(tally.record(&matched("rX"), &s2, &known), Outcome::FalsePositive);
        assert_eq!(tally.record(&matched("r3"), &s3, &known), Outcome::FalsePositive);
        assert_eq!(
            tally.record(&MatchResult::no_match(4), &s3, &known),
            Outcome::NoMatch
        );

        assert_eq!(tally.true_positives(), 1);
        assert_eq!(tally.false_positives(), 2);
    }

    #[test]
    fn test_finish_derives_rates() {
        let known: KnownMatches = [("s1", "r1"), ("s2", "r2"), ("s3", "r3"), ("s4", "r4")]
            .into_iter()
            .collect();
        let mut tally = EvaluationTally::new();
        tally.record(&matched("r1"), &SourceRecord::new("s1", "t"), &known);
        tally.record(&matched("r2"), &SourceRecord::new("s2", "t"), &known);
        tally.record(&matched("r9"), &SourceRecord::new("s3", "t"), &known);

        let evaluation = tally.finish(&known);
        assert_eq!(evaluation.true_positives, 2);
        assert_eq!(evaluation.false_positives, 1);
        assert_eq!(evaluation.false_negatives, 2);
        assert!((evaluation.precision - 2.0 / 3.0).abs() < EPS);
        assert!((evaluation.recall - 0.5).abs() < EPS);
        assert!((evaluation.f_measure - 4.0 / 7.0).abs() < EPS);
    }

    #[test]
    fn test_finish_empty_run_is_all_zero() {
        let evaluation = EvaluationTally::new().finish(&KnownMatches::new());
        assert_eq!(evaluation.false_negatives, 0);
        assert_eq!(evaluation.precision, 0.0);
        assert_eq!(evaluation.recall, 0.0);
        assert_eq!(evaluation.f_measure, 0.0);
    }

    #[test]
    fn test_display_lists_figures() {
        let evaluation = EvaluationTally::new().finish(&KnownMatches::new());
        let text = evaluation.to_string();
        assert!(text.starts_with("TP = 0\nFP = 0\nFN = 0\n"));
        assert!(text.ends_with("F-Measure = 0"));
    }
}

//! Per-candidate feature gates.
//!
//! Every enabled gate is a hard filter; a candidate that passes all of them
//! is admissible. The title gate also yields the score used to rank
//! admissible candidates (1.0 for everyone when it is disabled).

use std::fmt;

use ahash::AHashSet;

use crate::config::FeatureConfig;
use crate::error::CandidateError;
use crate::record::{ReferenceRecord, SourceRecord};
use crate::similarity;
use crate::text::{last_name, last_names};

/// Identifies a gate in verdicts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Title,
    Authors,
    PageCount,
    Venue,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Authors => "authors",
            Self::PageCount => "page count",
            Self::Venue => "venue",
        })
    }
}

/// Result of evaluating one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Title similarity, or 1.0 when the title gate is off.
    pub score: f64,
    /// First enabled gate the candidate failed.
    pub failed: Option<Gate>,
}

impl Verdict {
    pub fn is_admissible(&self) -> bool {
        self.failed.is_none()
    }
}

/// Precomputed data for a source record to avoid recomputation per candidate
#[derive(Debug)]
pub struct PreparedSource<'a> {
    pub record: &'a SourceRecord,
    last_names: AHashSet<&'a str>,
}

impl<'a> PreparedSource<'a> {
    pub fn new(record: &'a SourceRecord) -> Self {
        Self {
            record,
            last_names: last_names(&record.authors).into_iter().collect(),
        }
    }
}

/// Gate evaluation under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct FeatureGates<'a> {
    config: &'a FeatureConfig,
}

impl<'a> FeatureGates<'a> {
    pub fn new(config: &'a FeatureConfig) -> Self {
        Self { config }
    }

    /// Evaluate every enabled gate for `candidate`.
    ///
    /// A candidate without a title cannot be evaluated.
    pub fn evaluate(
        &self,
        source: &PreparedSource<'_>,
        candidate: &ReferenceRecord,
    ) -> Result<Verdict, CandidateError> {
        let features = self.config.features;
        let candidate_title = candidate
            .title
            .as_deref()
            .ok_or_else(|| CandidateError::MissingTitle(candidate.id.clone()))?;

        let score = if features.title {
            similarity::score(&source.record.title, candidate_title, self.config.similarity)
        } else {
            1.0
        };

        let failed = if features.title && score < self.config.threshold {
            Some(Gate::Title)
        } else if features.authors && !authors_match(&source.last_names, candidate) {
            Some(Gate::Authors)
        } else if features.page_count
            && !page_count_matches(
                source.record.page_count,
                candidate.page_count,
                self.config.page_tolerance,
            )
        {
            Some(Gate::PageCount)
        } else if features.venue && !venue_matches(&source.record.venue, candidate.venue.as_deref())
        {
            Some(Gate::Venue)
        } else {
            None
        };

        Ok(Verdict { score, failed })
    }
}

/// Every source last name must appear among the candidate's last names.
/// Fails when the candidate has no author data.
pub fn authors_match(source_last_names: &AHashSet<&str>, candidate: &ReferenceRecord) -> bool {
    if candidate.authors.is_empty() {
        return false;
    }
    let candidate_last_names: AHashSet<&str> =
        candidate.authors.iter().map(|a| last_name(a)).collect();
    source_last_names.is_subset(&candidate_last_names)
}

/// Both counts known and at most `tolerance` apart.
pub fn page_count_matches(source: u32, candidate: u32, tolerance: u32) -> bool {
    if source == 0 || candidate == 0 {
        return false;
    }
    source.abs_diff(candidate) <= tolerance
}

/// Exact, case-sensitive equality; an absent candidate venue counts as empty.
pub fn venue_matches(source: &str, candidate: Option<&str>) -> bool {
    candidate.unwrap_or("") == source
}

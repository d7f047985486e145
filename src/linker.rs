//! Record linkage: query, fetch, gate, select.
//!
//! [`RecordLinker::link`] handles one source record. [`LinkRun`] drives it
//! over a whole source stream.

use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info, trace, warn};

use crate::config::FeatureConfig;
use crate::error::{IndexResult, LinkError, LinkResult, RecordError};
use crate::eval::{Evaluation, EvaluationTally, KnownMatches};
use crate::gates::{FeatureGates, PreparedSource};
use crate::query::CandidateQueryBuilder;
use crate::record::{MatchResult, ReferenceRecord, SourceRecord};
use crate::text::TitleNormalizer;

/// Search backend holding the reference collection.
pub trait CandidateIndex {
    /// Candidates for a query in the index's boolean phrase grammar.
    /// Never called with an empty query.
    fn query(&self, query: &str) -> IndexResult<Vec<ReferenceRecord>>;
}

impl<T: CandidateIndex + ?Sized> CandidateIndex for &T {
    fn query(&self, query: &str) -> IndexResult<Vec<ReferenceRecord>> {
        (**self).query(query)
    }
}

/// Links source records against a [`CandidateIndex`].
#[derive(Debug)]
pub struct RecordLinker<'a, I: ?Sized> {
    config: &'a FeatureConfig,
    normalizer: &'a TitleNormalizer,
    index: &'a I,
}

impl<'a, I: CandidateIndex + ?Sized> RecordLinker<'a, I> {
    pub fn new(config: &'a FeatureConfig, normalizer: &'a TitleNormalizer, index: &'a I) -> Self {
        Self {
            config,
            normalizer,
            index,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        self.config
    }

    /// Best admissible candidate for `source`, if any.
    ///
    /// Only an index failure is an error; bad candidates are skipped.
    pub fn link(&self, source: &SourceRecord) -> LinkResult<MatchResult> {
        let query = CandidateQueryBuilder::new(self.normalizer).build(&source.title, self.config);
        if query.is_empty() {
            debug!(record = %source.id, "empty query, no candidates");
            return Ok(MatchResult::no_match(0));
        }

        let query = query.to_string();
        let candidates = self
            .index
            .query(&query)
            .map_err(|source_err| LinkError::Index {
                record_id: source.id.clone(),
                query: query.clone(),
                source: source_err,
            })?;
        trace!(record = %source.id, %query, hits = candidates.len(), "candidates fetched");

        Ok(self.select(source, candidates))
    }

    /// Keep the admissible candidate with the strictly highest score, first
    /// seen winning ties.
    fn select(&self, source: &SourceRecord, candidates: Vec<ReferenceRecord>) -> MatchResult {
        let gates = FeatureGates::new(self.config);
        let prepared = PreparedSource::new(source);
        let total = candidates.len();

        let mut best: Option<ReferenceRecord> = None;
        let mut best_score = 0.0;

        for candidate in candidates {
            match gates.evaluate(&prepared, &candidate) {
                Ok(verdict) if verdict.is_admissible() => {
                    debug!(
                        record = %source.id,
                        candidate = %candidate.id,
                        score = verdict.score,
                        "admissible"
                    );
                    if verdict.score > best_score {
                        best_score = verdict.score;
                        best = Some(candidate);
                    }
                }
                Ok(verdict) => {
                    if let Some(gate) = verdict.failed {
                        debug!(
                            record = %source.id,
                            candidate = %candidate.id,
                            score = verdict.score,
                            %gate,
                            "rejected"
                        );
                    }
                }
                Err(err) => {
                    debug!(record = %source.id, %err, "candidate skipped");
                }
            }
        }

        match best {
            Some(reference) => MatchResult {
                best: Some(reference),
                score: best_score,
                candidates: total,
            },
            None => MatchResult::no_match(total),
        }
    }
}

/// What a [`LinkRun`] hands to its observer for each linked record.
#[derive(Debug)]
pub struct Linked<'r> {
    pub source: &'r SourceRecord,
    pub result: &'r MatchResult,
    /// Time spent querying and selecting.
    pub elapsed: Duration,
}

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Records that were linked, matched or not.
    pub linked: usize,
    pub matched: usize,
    /// Records rejected before linkage.
    pub skipped: usize,
    /// Present when known matches were supplied.
    pub evaluation: Option<Evaluation>,
}

/// Drives a [`RecordLinker`] over a stream of source records.
pub struct LinkRun<'a, I: ?Sized> {
    linker: RecordLinker<'a, I>,
    page_counts: Option<&'a AHashMap<String, u32>>,
    known: Option<&'a KnownMatches>,
}

impl<'a, I: CandidateIndex + ?Sized> LinkRun<'a, I> {
    pub fn new(linker: RecordLinker<'a, I>) -> Self {
        Self {
            linker,
            page_counts: None,
            known: None,
        }
    }

    /// Source-side page counts, keyed by record identifier.
    pub fn with_page_counts(mut self, page_counts: &'a AHashMap<String, u32>) -> Self {
        self.page_counts = Some(page_counts);
        self
    }

    /// Classify every result against `known`.
    pub fn with_known_matches(mut self, known: &'a KnownMatches) -> Self {
        self.known = Some(known);
        self
    }

    /// Link every record of `sources`.
    ///
    /// Unreadable, malformed and duplicate records are skipped with a warning.
    /// An index failure or an observer error stops the run.
    pub fn run<S, F, E>(&self, sources: S, mut observer: F) -> Result<RunSummary, E>
    where
        S: IntoIterator<Item = Result<SourceRecord, RecordError>>,
        F: FnMut(Linked<'_>) -> Result<(), E>,
        E: From<LinkError>,
    {
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut tally = EvaluationTally::new();
        let mut linked = 0;
        let mut matched = 0;
        let mut skipped = 0;

        for item in sources {
            let mut source = match item {
                Ok(source) => source,
                Err(err) => {
                    warn!(%err, "skipping source record");
                    skipped += 1;
                    continue;
                }
            };
            if !seen.insert(source.id.clone()) {
                warn!(err = %RecordError::DuplicateIdentifier(source.id), "skipping source record");
                skipped += 1;
                continue;
            }
            if let Some(counts) = self.page_counts {
                source.page_count = counts.get(&source.id).copied().unwrap_or(0);
            }

            let start = Instant::now();
            let result = self.linker.link(&source)?;
            let elapsed = start.elapsed();

            linked += 1;
            if result.is_match() {
                matched += 1;
            }
            if let Some(known) = self.known {
                let outcome = tally.record(&result, &source, known);
                trace!(record = %source.id, ?outcome, "classified");
            }

            observer(Linked {
                source: &source,
                result: &result,
                elapsed,
            })?;
        }

        info!(linked, matched, skipped, "run finished");
        Ok(RunSummary {
            linked,
            matched,
            skipped,
            evaluation: self.known.map(|known| tally.finish(known)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::Features;
    use crate::error::IndexError;
    use crate::text::StopWords;

    /// Returns a fixed candidate list for any query.
    struct FixedIndex {
        candidates: Vec<ReferenceRecord>,
        calls: Cell<usize>,
    }

    impl FixedIndex {
        fn new(candidates: Vec<ReferenceRecord>) -> Self {
            Self {
                candidates,
                calls: Cell::new(0),
            }
        }
    }

    impl CandidateIndex for FixedIndex {
        fn query(&self, _query: &str) -> IndexResult<Vec<ReferenceRecord>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.candidates.clone())
        }
    }

    struct FailingIndex;

    impl CandidateIndex for FailingIndex {
        fn query(&self, _query: &str) -> IndexResult<Vec<ReferenceRecord>> {
            Err(IndexError::Backend("connection refused".into()))
        }
    }

    fn normalizer() -> TitleNormalizer {
        TitleNormalizer::new(StopWords::new(["a", "of", "the", "for"]))
    }

    fn config(features: &str) -> FeatureConfig {
        FeatureConfig {
            features: features.parse().unwrap(),
            threshold: 0.5,
            ..FeatureConfig::default()
        }
    }

    #[test]
    fn test_link_picks_only_fully_admissible_candidate() {
        let config = config("ta");
        let normalizer = normalizer();
        // A: good title, wrong authors. B: passes everything. C: poor title.
        let index = FixedIndex::new(vec![
            ReferenceRecord::new("A", "Graph Theory Algorithms").with_authors(["X. Other"]),
            ReferenceRecord::new("B", "Graph Theory Algorithms").with_authors(["A. Smith"]),
            ReferenceRecord::new("C", "Graph Coloring").with_authors(["A. Smith"]),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let source =
            SourceRecord::new("s", "Graph Theory Algorithms").with_authors(["Alice Smith"]);
        let result = linker.link(&source).unwrap();

        assert_eq!(result.matched_id(), Some("B"));
        assert!((result.score - 1.0).abs() < 1e-9);
        assert_eq!(result.candidates, 3);
    }

    #[test]
    fn test_link_no_admissible_candidate() {
        let config = config("t");
        let normalizer = normalizer();
        let index = FixedIndex::new(vec![
            ReferenceRecord::new("A", "Protein Folding"),
            ReferenceRecord::new("B", "Cell Biology"),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let result = linker.link(&SourceRecord::new("s", "Graph Theory")).unwrap();
        assert_eq!(result, MatchResult::no_match(2));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_link_first_seen_wins_ties() {
        let config = config("t");
        let normalizer = normalizer();
        let index = FixedIndex::new(vec![
            ReferenceRecord::new("first", "Graph Theory"),
            ReferenceRecord::new("second", "graph theory"),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let result = linker.link(&SourceRecord::new("s", "Graph Theory")).unwrap();
        assert_eq!(result.matched_id(), Some("first"));
    }

    #[test]
    fn test_link_higher_score_replaces_earlier() {
        let config = config("t");
        let normalizer = normalizer();
        let index = FixedIndex::new(vec![
            ReferenceRecord::new("partial", "Graph Theory Survey"),
            ReferenceRecord::new("exact", "Graph Theory"),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let result = linker.link(&SourceRecord::new("s", "Graph Theory")).unwrap();
        assert_eq!(result.matched_id(), Some("exact"));
    }

    #[test]
    fn test_link_skips_candidate_without_title() {
        let config = config("v");
        let normalizer = normalizer();
        let untitled = ReferenceRecord {
            id: "untitled".into(),
            venue: Some("ICDE".into()),
            ..ReferenceRecord::default()
        };
        let index = FixedIndex::new(vec![
            untitled,
            ReferenceRecord::new("titled", "x").with_venue("ICDE"),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let source = SourceRecord::new("s", "Graph Theory").with_venue("ICDE");
        let result = linker.link(&source).unwrap();
        assert_eq!(result.matched_id(), Some("titled"));
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_link_empty_query_never_reaches_index() {
        let config = FeatureConfig {
            features: Features::default(),
            ..FeatureConfig::default()
        };
        let normalizer = normalizer();
        let index = FixedIndex::new(vec![ReferenceRecord::new("A", "the")]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let result = linker.link(&SourceRecord::new("s", "The!")).unwrap();
        assert_eq!(result, MatchResult::no_match(0));
        assert_eq!(index.calls.get(), 0);
    }

    #[test]
    fn test_link_index_error_carries_context() {
        let config = config("t");
        let normalizer = normalizer();
        let linker = RecordLinker::new(&config, &normalizer, &FailingIndex);

        let err = linker
            .link(&SourceRecord::new("10.1.1.1", "Graph Theory"))
            .unwrap_err();
        let LinkError::Index {
            record_id, query, ..
        } = err;
        assert_eq!(record_id, "10.1.1.1");
        assert_eq!(query, r#"nsw_title:"graph theory""#);
    }

    #[test]
    fn test_run_skips_bad_and_duplicate_records() {
        let config = config("tp");
        let normalizer = normalizer();
        let index = FixedIndex::new(vec![
            ReferenceRecord::new("r1", "Graph Theory").with_page_count(10),
        ]);
        let linker = RecordLinker::new(&config, &normalizer, &index);

        let page_counts: AHashMap<String, u32> = [("s1".to_owned(), 11)].into_iter().collect();
        let known: KnownMatches = [("s1", "r1"), ("s3", "r3")].into_iter().collect();

        let sources = vec![
            Ok(SourceRecord::new("s1", "Graph Theory")),
            Err(RecordError::EmptyIdentifier),
            Ok(SourceRecord::new("s1", "Graph Theory")),
            Ok(SourceRecord::new("s2", "Graph Theory")),
        ];

        let mut seen = Vec::new();
        let summary = LinkRun::new(linker)
            .with_page_counts(&page_counts)
            .with_known_matches(&known)
            .run(sources, |linked| {
                seen.push((linked.source.id.clone(), linked.result.matched_id().map(str::to_owned)));
                Ok::<(), LinkError>(())
            })
            .unwrap();

        // s2 has no page count, so the page gate fails closed
        assert_eq!(
            seen,
            vec![("s1".to_owned(), Some("r1".to_owned())), ("s2".to_owned(), None)]
        );
        assert_eq!(summary.linked, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.skipped, 2);

        let evaluation = summary.evaluation.unwrap();
        assert_eq!(evaluation.true_positives, 1);
        assert_eq!(evaluation.false_positives, 0);
        assert_eq!(evaluation.false_negatives, 1);
    }

    #[test]
    fn test_run_stops_on_index_error() {
        let config = config("t");
        let normalizer = normalizer();
        let linker = RecordLinker::new(&config, &normalizer, &FailingIndex);

        let mut calls = 0;
        let result = LinkRun::new(linker).run(
            vec![
                Ok(SourceRecord::new("s1", "Graph Theory")),
                Ok(SourceRecord::new("s2", "Graph Theory")),
            ],
            |_| {
                calls += 1;
                Ok::<(), LinkError>(())
            },
        );
        assert!(matches!(result, Err(LinkError::Index { record_id, .. }) if record_id == "s1"));
        assert_eq!(calls, 0);
    }
}

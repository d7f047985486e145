//! Bibliographic record linkage.
//!
//! Each source record (a noisy citation harvested from crawled documents) is
//! matched against a curated reference collection: an n-gram phrase query
//! fetches candidates, per-feature gates filter them and title similarity
//! picks the winner.
//!
//! ```no_run
//! use bib_linker::{
//!     build_index, FeatureConfig, PageCountNormalizer, RecordLinker, SourceRecord,
//!     StopWords, TitleNormalizer,
//! };
//!
//! let normalizer = TitleNormalizer::new(StopWords::new(["of", "the"]));
//! let index = build_index(Vec::new(), &normalizer, &PageCountNormalizer::default())?;
//! let config = FeatureConfig::default();
//! let linker = RecordLinker::new(&config, &normalizer, &index);
//! let result = linker.link(&SourceRecord::new("10.1.1.1", "The Theory of Graphs"))?;
//! assert!(!result.is_match());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod gates;
pub mod index;
pub mod linker;
pub mod pages;
pub mod query;
pub mod record;
pub mod resources;
pub mod similarity;
pub mod text;

#[cfg(feature = "python")]
mod python;

pub use config::{FeatureConfig, Features, QueryOperator, RunConfig, RunSettings, SimilarityKind};
pub use error::{CandidateError, ConfigError, IndexError, LinkError, RecordError};
pub use eval::{Evaluation, EvaluationTally, KnownMatches};
pub use gates::FeatureGates;
pub use index::{build_index, InMemoryIndex, IndexWriter};
pub use linker::{CandidateIndex, LinkRun, RecordLinker, RunSummary};
pub use pages::{normalize_pages, PageCountNormalizer};
pub use query::{CandidateQuery, CandidateQueryBuilder};
pub use record::{MatchResult, MergedRecord, Publication, ReferenceRecord, SourceRecord};
pub use text::{StopWords, TitleNormalizer};

//! Error taxonomy for the linkage engine.
//!
//! Configuration errors are fatal and reported once. Record and candidate
//! errors are recovered where they occur. Index errors are surfaced to the
//! caller together with the query and the record being linked.

use std::path::PathBuf;

use tantivy::query::QueryParserError;
use tantivy::TantivyError;
use thiserror::Error;

/// Invalid or unreadable run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'JACCARD'/'COSINE' expected for similarity, got '{0}'")]
    InvalidSimilarity(String),

    #[error("'AND'/'OR' expected for operator, got '{0}'")]
    InvalidOperator(String),

    #[error("number in [0, 1] expected for threshold, got '{0}'")]
    InvalidThreshold(String),

    #[error("positive integer expected for n-gram width, got {0}")]
    InvalidNGramWidth(usize),

    #[error("'1'/'2'/'3' expected for verbosity, got {0}")]
    InvalidVerbosity(u8),

    #[error("unknown matching feature '{0}' (expected letters from 't', 'a', 'p', 'v')")]
    InvalidFeature(char),

    #[error("required path '{0}' is not configured")]
    MissingPath(&'static str),

    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A source record that cannot be linked and is skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record has an empty identifier")]
    EmptyIdentifier,

    #[error("record '{0}' has no title")]
    MissingTitle(String),

    #[error("record '{0}' was already processed in this run")]
    DuplicateIdentifier(String),

    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A candidate that cannot be evaluated and is therefore not admissible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("candidate '{0}' has no title")]
    MissingTitle(String),
}

/// Failure of the reference index while answering a query.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed query: {0}")]
    Syntax(String),

    #[error("unknown query field '{0}'")]
    UnknownField(String),

    #[error("index backend failure: {0}")]
    Backend(String),
}

impl From<QueryParserError> for IndexError {
    fn from(err: QueryParserError) -> Self {
        match err {
            QueryParserError::FieldDoesNotExist(field) => Self::UnknownField(field),
            other => Self::Syntax(other.to_string()),
        }
    }
}

impl From<TantivyError> for IndexError {
    fn from(err: TantivyError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Failure to link one source record.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("index query failed for record '{record_id}' (query: {query}): {source}")]
    Index {
        record_id: String,
        query: String,
        #[source]
        source: IndexError,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type LinkResult<T> = Result<T, LinkError>;

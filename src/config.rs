//! Linkage configuration.
//!
//! [`FeatureConfig`] is what the engine reads: which gates are active and how
//! titles are compared and queried. It is built once and shared by reference.
//! [`RunSettings`] is the layered file/command-line form used by the binary;
//! [`RunSettings::resolve`] validates it into a [`RunConfig`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// How two titles are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityKind {
    #[default]
    Jaccard,
    Cosine,
}

impl FromStr for SimilarityKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "JACCARD" => Ok(Self::Jaccard),
            "COSINE" => Ok(Self::Cosine),
            _ => Err(ConfigError::InvalidSimilarity(s.to_owned())),
        }
    }
}

impl fmt::Display for SimilarityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jaccard => "JACCARD",
            Self::Cosine => "COSINE",
        })
    }
}

/// How candidate-query clauses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOperator {
    /// One exact phrase over the whole normalized title.
    And,
    /// Sliding-window n-gram phrases, any of which may match.
    #[default]
    Or,
}

impl FromStr for QueryOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(ConfigError::InvalidOperator(s.to_owned())),
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// Gates that a candidate must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub title: bool,
    pub authors: bool,
    pub page_count: bool,
    pub venue: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            title: true,
            authors: false,
            page_count: false,
            venue: false,
        }
    }
}

impl Features {
    pub const NONE: Self = Self {
        title: false,
        authors: false,
        page_count: false,
        venue: false,
    };
}

/// Parses letter sets such as `"ta"` (title + authors) or `"tapv"`.
impl FromStr for Features {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut features = Self::NONE;
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            match c.to_ascii_lowercase() {
                't' => features.title = true,
                'a' => features.authors = true,
                'p' => features.page_count = true,
                'v' => features.venue = true,
                other => return Err(ConfigError::InvalidFeature(other)),
            }
        }
        Ok(features)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.title, "TITLE"),
            (self.authors, "AUTHORS"),
            (self.page_count, "PAGE_COUNT"),
            (self.venue, "VENUE"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        f.write_str(&names.join(", "))
    }
}

/// Engine configuration, read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub features: Features,
    pub similarity: SimilarityKind,
    /// Minimum title similarity when the title gate is on.
    pub threshold: f64,
    /// Largest accepted page-count difference.
    pub page_tolerance: u32,
    /// Clause width for [`QueryOperator::Or`] queries.
    pub ngram_width: usize,
    pub operator: QueryOperator,
    /// Query the stop-word-stripped title field instead of the raw one.
    pub remove_stop_words: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            features: Features::default(),
            similarity: SimilarityKind::Jaccard,
            threshold: 0.7,
            page_tolerance: 1,
            ngram_width: 3,
            operator: QueryOperator::Or,
            remove_stop_words: true,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold.to_string()));
        }
        if self.ngram_width == 0 {
            return Err(ConfigError::InvalidNGramWidth(self.ngram_width));
        }
        Ok(())
    }
}

impl fmt::Display for FeatureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<25} {}", "THRESHOLD:", self.threshold)?;
        writeln!(f, "{:<25} {}", "SIMILARITY:", self.similarity)?;
        writeln!(f, "{:<25} {}", "REMOVE_STOPWORDS:", self.remove_stop_words)?;
        match self.operator {
            QueryOperator::Or => writeln!(
                f,
                "{:<25} OR, using {}-grams",
                "OPERATOR:", self.ngram_width
            )?,
            QueryOperator::And => writeln!(f, "{:<25} AND", "OPERATOR:")?,
        }
        write!(f, "{:<25} {}", "MATCHING FEATURES:", self.features)?;
        if self.features.page_count {
            write!(f, " (with page limit {})", self.page_tolerance)?;
        }
        Ok(())
    }
}

/// Settings as read from a config file or the command line; every field is
/// optional so that layers can be overlaid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub threshold: Option<f64>,
    pub similarity: Option<String>,
    pub operator: Option<String>,
    pub n_grams: Option<usize>,
    pub page_limit: Option<u32>,
    pub remove_stopwords: Option<bool>,
    pub features: Option<String>,
    pub write_merged_files: Option<bool>,
    pub output_stats: Option<bool>,
    pub verbosity: Option<u8>,
    pub references_path: Option<PathBuf>,
    pub sources_path: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub merged_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    pub hits_path: Option<PathBuf>,
    pub stop_words_path: Option<PathBuf>,
    pub matches_path: Option<PathBuf>,
    pub page_count_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl RunSettings {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Values set in `overrides` replace the ones in `self`.
    pub fn overlay(self, overrides: Self) -> Self {
        Self {
            threshold: overrides.threshold.or(self.threshold),
            similarity: overrides.similarity.or(self.similarity),
            operator: overrides.operator.or(self.operator),
            n_grams: overrides.n_grams.or(self.n_grams),
            page_limit: overrides.page_limit.or(self.page_limit),
            remove_stopwords: overrides.remove_stopwords.or(self.remove_stopwords),
            features: overrides.features.or(self.features),
            write_merged_files: overrides.write_merged_files.or(self.write_merged_files),
            output_stats: overrides.output_stats.or(self.output_stats),
            verbosity: overrides.verbosity.or(self.verbosity),
            references_path: overrides.references_path.or(self.references_path),
            sources_path: overrides.sources_path.or(self.sources_path),
            output_folder: overrides.output_folder.or(self.output_folder),
            merged_path: overrides.merged_path.or(self.merged_path),
            stats_path: overrides.stats_path.or(self.stats_path),
            hits_path: overrides.hits_path.or(self.hits_path),
            stop_words_path: overrides.stop_words_path.or(self.stop_words_path),
            matches_path: overrides.matches_path.or(self.matches_path),
            page_count_path: overrides.page_count_path.or(self.page_count_path),
            log_path: overrides.log_path.or(self.log_path),
        }
    }

    /// Engine configuration from these settings, defaults filled in.
    pub fn feature_config(&self) -> ConfigResult<FeatureConfig> {
        let defaults = FeatureConfig::default();
        let config = FeatureConfig {
            features: match &self.features {
                Some(letters) => letters.parse()?,
                None => defaults.features,
            },
            similarity: match &self.similarity {
                Some(kind) => kind.parse()?,
                None => defaults.similarity,
            },
            threshold: self.threshold.unwrap_or(defaults.threshold),
            page_tolerance: self.page_limit.unwrap_or(defaults.page_tolerance),
            ngram_width: self.n_grams.unwrap_or(defaults.ngram_width),
            operator: match &self.operator {
                Some(op) => op.parse()?,
                None => defaults.operator,
            },
            remove_stop_words: self.remove_stopwords.unwrap_or(defaults.remove_stop_words),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate everything and fill in defaults.
    pub fn resolve(self) -> ConfigResult<RunConfig> {
        let features = self.feature_config()?;

        let verbosity = self.verbosity.unwrap_or(1);
        if !(1..=3).contains(&verbosity) {
            return Err(ConfigError::InvalidVerbosity(verbosity));
        }

        let references = self
            .references_path
            .ok_or(ConfigError::MissingPath("references_path"))?;
        let sources = self
            .sources_path
            .ok_or(ConfigError::MissingPath("sources_path"))?;

        let write_merged = self.write_merged_files.unwrap_or(true);
        let output_stats = self.output_stats.unwrap_or(true);
        if output_stats && self.matches_path.is_none() {
            return Err(ConfigError::MissingPath("matches_path"));
        }
        if features.features.page_count && self.page_count_path.is_none() {
            return Err(ConfigError::MissingPath("page_count_path"));
        }

        let folder = self.output_folder;
        let under_folder = |path: PathBuf| match &folder {
            Some(folder) if path.is_relative() => folder.join(path),
            _ => path,
        };

        Ok(RunConfig {
            features,
            verbosity,
            references,
            sources,
            merged: write_merged.then(|| {
                under_folder(
                    self.merged_path
                        .unwrap_or_else(|| PathBuf::from("merged.jsonl")),
                )
            }),
            stats: output_stats.then(|| {
                under_folder(self.stats_path.unwrap_or_else(|| PathBuf::from("stats.txt")))
            }),
            hits: self.hits_path.map(&under_folder),
            log: self.log_path.map(&under_folder),
            stop_words: self.stop_words_path,
            matches: self.matches_path,
            page_counts: self.page_count_path,
        })
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub features: FeatureConfig,
    pub verbosity: u8,
    pub references: PathBuf,
    pub sources: PathBuf,
    /// Merged-record output, when merged files are written.
    pub merged: Option<PathBuf>,
    /// Evaluation report, when statistics are produced.
    pub stats: Option<PathBuf>,
    pub hits: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub stop_words: Option<PathBuf>,
    pub matches: Option<PathBuf>,
    pub page_counts: Option<PathBuf>,
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration")?;
        writeln!(f, "{}", self.features)?;
        writeln!(f, "{:<25} '{}'", "REFERENCES_PATH:", self.references.display())?;
        writeln!(f, "{:<25} '{}'", "SOURCES_PATH:", self.sources.display())?;
        if let Some(merged) = &self.merged {
            writeln!(f, "{:<25} '{}'", "MERGED_PATH:", merged.display())?;
        }
        if let Some(stats) = &self.stats {
            writeln!(f, "{:<25} '{}'", "STATS_PATH:", stats.display())?;
        }
        write!(f, "{:<25} {}", "VERBOSITY_LEVEL:", self.verbosity)
    }
}

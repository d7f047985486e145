use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::config::{FeatureConfig, QueryOperator, SimilarityKind};
use crate::index::build_index;
use crate::linker::RecordLinker;
use crate::pages::{normalize_pages, PageCountNormalizer};
use crate::query::CandidateQueryBuilder;
use crate::record::{Publication, PublicationKind, SourceRecord};
use crate::similarity;
use crate::text::{StopWords, TitleNormalizer};

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Input data for a single source record
#[derive(Clone, Debug, FromPyObject)]
#[pyo3(from_item_all)]
struct SourceItem {
    id: String,
    title: String,
    authors: Vec<String>,
    venue: Option<String>,
    page_count: Option<u32>,
}

impl From<SourceItem> for SourceRecord {
    fn from(item: SourceItem) -> Self {
        SourceRecord::new(item.id, item.title)
            .with_authors(item.authors)
            .with_venue(item.venue.unwrap_or_default())
            .with_page_count(item.page_count.unwrap_or(0))
    }
}

/// Input data for a single reference publication
#[derive(Clone, Debug, FromPyObject)]
#[pyo3(from_item_all)]
struct ReferenceItem {
    key: String,
    kind: String,
    title: Option<String>,
    year: Option<i32>,
    booktitle: Option<String>,
    journal: Option<String>,
    pages: Option<String>,
    authors: Vec<String>,
}

impl TryFrom<ReferenceItem> for Publication {
    type Error = PyErr;

    fn try_from(item: ReferenceItem) -> PyResult<Self> {
        let kind = PublicationKind::from_name(&item.kind)
            .ok_or_else(|| value_error(format!("unknown publication kind '{}'", item.kind)))?;
        Ok(Publication {
            key: item.key,
            kind,
            title: item.title,
            year: item.year,
            booktitle: item.booktitle,
            journal: item.journal,
            pages: item.pages,
            authors: item.authors,
        })
    }
}

/// Linkage outcome for one source record
#[derive(Clone, Debug, IntoPyObject)]
struct LinkedItem {
    source_index: usize,
    reference_key: Option<String>,
    score: f64,
    candidates: usize,
}

/// Page count of a free-text page range; 0 when unknown.
#[pyfunction]
fn normalize_page_count(pages: &str) -> u32 {
    normalize_pages(pages)
}

#[pyfunction]
#[pyo3(signature = (title_a, title_b, kind = "JACCARD"))]
fn title_similarity(title_a: &str, title_b: &str, kind: &str) -> PyResult<f64> {
    let kind: SimilarityKind = kind.parse().map_err(value_error)?;
    Ok(similarity::score(title_a, title_b, kind))
}

#[pyfunction]
#[pyo3(signature = (title, operator = "OR", n_grams = 3, remove_stop_words = true, stop_words = Vec::new()))]
fn build_title_query(
    title: &str,
    operator: &str,
    n_grams: usize,
    remove_stop_words: bool,
    stop_words: Vec<String>,
) -> PyResult<String> {
    let operator: QueryOperator = operator.parse().map_err(value_error)?;
    let config = FeatureConfig {
        operator,
        ngram_width: n_grams,
        remove_stop_words,
        ..FeatureConfig::default()
    };
    config.validate().map_err(value_error)?;
    let normalizer = TitleNormalizer::new(StopWords::new(stop_words));
    Ok(CandidateQueryBuilder::new(&normalizer)
        .build(title, &config)
        .to_string())
}

/// Index `references` and link every source against them in parallel.
#[pyfunction]
#[pyo3(signature = (
    sources,
    references,
    features = "t",
    similarity = "JACCARD",
    threshold = 0.7,
    page_limit = 1,
    n_grams = 3,
    operator = "OR",
    remove_stop_words = true,
    stop_words = Vec::new(),
))]
#[allow(clippy::too_many_arguments)]
fn link_batch(
    sources: Vec<SourceItem>,
    references: Vec<ReferenceItem>,
    features: &str,
    similarity: &str,
    threshold: f64,
    page_limit: u32,
    n_grams: usize,
    operator: &str,
    remove_stop_words: bool,
    stop_words: Vec<String>,
) -> PyResult<Vec<LinkedItem>> {
    let config = FeatureConfig {
        features: features.parse().map_err(value_error)?,
        similarity: similarity.parse().map_err(value_error)?,
        threshold,
        page_tolerance: page_limit,
        ngram_width: n_grams,
        operator: operator.parse().map_err(value_error)?,
        remove_stop_words,
    };
    config.validate().map_err(value_error)?;

    let publications = references
        .into_iter()
        .map(Publication::try_from)
        .collect::<PyResult<Vec<_>>>()?;
    let normalizer = TitleNormalizer::new(StopWords::new(stop_words));
    let index = build_index(publications, &normalizer, &PageCountNormalizer::default())
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
    let linker = RecordLinker::new(&config, &normalizer, &index);

    let sources: Vec<SourceRecord> = sources.into_iter().map(SourceRecord::from).collect();
    sources
        .par_iter()
        .enumerate()
        .map(|(idx, source)| {
            let result = linker.link(source)?;
            Ok(LinkedItem {
                source_index: idx,
                reference_key: result.matched_id().map(str::to_owned),
                score: result.score,
                candidates: result.candidates,
            })
        })
        .collect::<Result<Vec<_>, crate::error::LinkError>>()
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))
}

/// Importable as `bib_linker`, matching the library name.
#[pymodule]
fn bib_linker(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalize_page_count, m)?)?;
    m.add_function(wrap_pyfunction!(title_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(build_title_query, m)?)?;
    m.add_function(wrap_pyfunction!(link_batch, m)?)?;
    Ok(())
}

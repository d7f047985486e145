//! Source, reference and result records.
//!
//! Loosely shaped input (JSON lines) is checked once when it is turned into
//! these types; the gates never re-test field shapes.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::text::split_authors;

/// An incoming record to be linked.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceRecord {
    /// Opaque identifier, unique within a run (e.g. a DOI).
    pub id: String,
    pub title: String,
    /// Author names in source order.
    pub authors: Vec<String>,
    /// May be empty.
    pub venue: String,
    /// May be empty.
    pub year: String,
    /// Page count from the side table; 0 when unknown.
    pub page_count: u32,
    pub abstract_text: String,
    pub citations: Vec<String>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = venue.into();
        self
    }

    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }
}

/// Authors as they appear in input files: one comma-separated string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAuthors {
    Joined(String),
    Listed(Vec<String>),
}

/// Years arrive as text or as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawYear {
    Text(String),
    Number(i64),
}

/// One line of a source-record stream.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSourceRecord {
    #[serde(alias = "doi")]
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Option<RawAuthors>,
    pub venue: Option<String>,
    pub year: Option<RawYear>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
}

impl TryFrom<RawSourceRecord> for SourceRecord {
    type Error = RecordError;

    fn try_from(raw: RawSourceRecord) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::EmptyIdentifier)?;
        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RecordError::MissingTitle(id.clone()))?;

        let authors = match raw.authors {
            Some(RawAuthors::Joined(joined)) => split_authors(&joined),
            Some(RawAuthors::Listed(list)) => list
                .into_iter()
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect(),
            None => Vec::new(),
        };

        let year = match raw.year {
            Some(RawYear::Text(text)) => text.trim().to_owned(),
            Some(RawYear::Number(n)) => n.to_string(),
            None => String::new(),
        };

        Ok(Self {
            id,
            title,
            authors,
            venue: raw.venue.unwrap_or_default(),
            year,
            page_count: 0,
            abstract_text: raw.abstract_text.unwrap_or_default(),
            citations: raw.citations,
        })
    }
}

/// Author data of a reference record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthorField {
    #[default]
    Empty,
    Single(String),
    List(Vec<String>),
}

impl AuthorField {
    pub fn from_vec(mut authors: Vec<String>) -> Self {
        authors.retain(|a| !a.trim().is_empty());
        match authors.len() {
            0 => Self::Empty,
            1 => Self::Single(authors.remove(0)),
            _ => Self::List(authors),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        match self {
            Self::Empty => Default::default(),
            Self::Single(author) => std::slice::from_ref(author).iter(),
            Self::List(authors) => authors.iter(),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().cloned().collect()
    }
}

/// A candidate from the reference collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceRecord {
    /// Key of the record in the reference collection.
    pub id: String,
    pub title: Option<String>,
    /// Stop-word and punctuation stripped title, computed at index time.
    pub normalized_title: String,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub authors: AuthorField,
    /// Computed at index time; 0 when unknown.
    pub page_count: u32,
}

impl ReferenceRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = AuthorField::from_vec(authors.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }
}

/// Kinds of publication in the reference collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationKind {
    Article,
    Book,
    Incollection,
    Inproceedings,
    Phdthesis,
    Proceedings,
    Mastersthesis,
    Www,
}

impl PublicationKind {
    /// Kind from its lowercase element name, e.g. `"inproceedings"`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "article" => Self::Article,
            "book" => Self::Book,
            "incollection" => Self::Incollection,
            "inproceedings" => Self::Inproceedings,
            "phdthesis" => Self::Phdthesis,
            "proceedings" => Self::Proceedings,
            "mastersthesis" => Self::Mastersthesis,
            "www" => Self::Www,
            _ => return None,
        })
    }
}

/// A raw reference-collection entry, before indexing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Publication {
    pub key: String,
    pub kind: PublicationKind,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub booktitle: Option<String>,
    pub journal: Option<String>,
    pub pages: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Publication {
    /// Venue by kind: book title for proceedings-like entries, journal for
    /// articles, nothing otherwise.
    pub fn venue(&self) -> Option<&str> {
        match self.kind {
            PublicationKind::Inproceedings
            | PublicationKind::Proceedings
            | PublicationKind::Incollection => self.booktitle.as_deref(),
            PublicationKind::Article => self.journal.as_deref(),
            _ => None,
        }
    }
}

/// Outcome of linking one source record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub best: Option<ReferenceRecord>,
    /// Score that won selection; 0 without a match.
    pub score: f64,
    /// Number of candidates the query returned.
    pub candidates: usize,
}

impl MatchResult {
    pub fn no_match(candidates: usize) -> Self {
        Self {
            best: None,
            score: 0.0,
            candidates,
        }
    }

    pub fn is_match(&self) -> bool {
        self.best.is_some()
    }

    pub fn matched_id(&self) -> Option<&str> {
        self.best.as_ref().map(|r| r.id.as_str())
    }
}

/// A source record enriched with its linked reference record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub key: String,
    pub doi: String,
    pub title: Option<String>,
    pub venue: String,
    pub year: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub citations: Vec<String>,
}

impl MergedRecord {
    /// Bibliographic fields from the reference, content from the source.
    pub fn merge(source: &SourceRecord, reference: &ReferenceRecord) -> Self {
        Self {
            key: reference.id.clone(),
            doi: source.id.clone(),
            title: reference.title.clone(),
            venue: reference
                .venue
                .clone()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| source.venue.clone()),
            year: reference
                .year
                .map_or_else(|| source.year.clone(), |y| y.to_string()),
            authors: reference.authors.to_vec(),
            abstract_text: source.abstract_text.clone(),
            citations: source.citations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawSourceRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_source_from_joined_authors() {
        let record = SourceRecord::try_from(raw(
            r#"{"doi": "10.1.1.1", "title": "Graph Theory", "authors": "A. Smith, B. Jones", "year": 1999}"#,
        ))
        .unwrap();
        assert_eq!(record.id, "10.1.1.1");
        assert_eq!(record.authors, vec!["A. Smith", "B. Jones"]);
        assert_eq!(record.year, "1999");
        assert_eq!(record.venue, "");
    }

    #[test]
    fn test_source_from_listed_authors() {
        let record = SourceRecord::try_from(raw(
            r#"{"id": "x", "title": "T", "authors": ["A. Smith", " "], "abstract": "abs"}"#,
        ))
        .unwrap();
        assert_eq!(record.authors, vec!["A. Smith"]);
        assert_eq!(record.abstract_text, "abs");
    }

    #[test]
    fn test_source_rejects_malformed() {
        assert!(matches!(
            SourceRecord::try_from(raw(r#"{"title": "T"}"#)),
            Err(RecordError::EmptyIdentifier)
        ));
        assert!(matches!(
            SourceRecord::try_from(raw(r#"{"id": "x", "title": "  "}"#)),
            Err(RecordError::MissingTitle(id)) if id == "x"
        ));
    }

    #[test]
    fn test_author_field_shapes() {
        assert_eq!(AuthorField::from_vec(vec![]), AuthorField::Empty);
        assert_eq!(
            AuthorField::from_vec(vec!["A".into()]),
            AuthorField::Single("A".into())
        );
        let list = AuthorField::from_vec(vec!["A".into(), "B".into()]);
        assert_eq!(list.iter().count(), 2);
        assert!(AuthorField::Empty.iter().next().is_none());
    }

    #[test]
    fn test_publication_venue_by_kind() {
        let mut publication = Publication {
            key: "conf/x/1".into(),
            kind: PublicationKind::Inproceedings,
            title: Some("T".into()),
            year: None,
            booktitle: Some("ICDE".into()),
            journal: Some("TKDE".into()),
            pages: None,
            authors: vec![],
        };
        assert_eq!(publication.venue(), Some("ICDE"));
        publication.kind = PublicationKind::Article;
        assert_eq!(publication.venue(), Some("TKDE"));
        publication.kind = PublicationKind::Phdthesis;
        assert_eq!(publication.venue(), None);
    }

    #[test]
    fn test_publication_kind_from_name() {
        assert_eq!(
            PublicationKind::from_name("InProceedings"),
            Some(PublicationKind::Inproceedings)
        );
        assert_eq!(PublicationKind::from_name("www"), Some(PublicationKind::Www));
        assert_eq!(PublicationKind::from_name("pamphlet"), None);
    }

    #[test]
    fn test_merge_prefers_reference_fields() {
        let source = SourceRecord {
            venue: "Proc. ICDE".into(),
            year: "2001".into(),
            abstract_text: "abstract".into(),
            ..SourceRecord::new("10.1.1.1", "graph theory")
        };
        let reference = ReferenceRecord::new("conf/icde/1", "Graph Theory")
            .with_authors(["A. Smith"])
            .with_venue("ICDE");

        let merged = MergedRecord::merge(&source, &reference);
        assert_eq!(merged.key, "conf/icde/1");
        assert_eq!(merged.doi, "10.1.1.1");
        assert_eq!(merged.venue, "ICDE");
        // reference has no year, the source fills in
        assert_eq!(merged.year, "2001");
        assert_eq!(merged.authors, vec!["A. Smith"]);
        assert_eq!(merged.abstract_text, "abstract");
    }
}

//! Line-oriented input files.
//!
//! - stop words: one word per line
//! - known matches: `<source id> <reference id>` per line
//! - page counts: `<dir>/<source id>.pdf <count>` per line
//! - source records and publications: JSON Lines

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::Path;

use ahash::{AHashMap, AHashSet};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::eval::KnownMatches;
use crate::record::{Publication, RawSourceRecord, SourceRecord};
use crate::text::StopWords;

fn open(path: &Path) -> io::Result<BufReader<File>> {
    File::open(path).map(BufReader::new)
}

pub fn load_stop_words(path: &Path) -> io::Result<StopWords> {
    let mut words = Vec::new();
    for line in open(path)?.lines() {
        let line = line?;
        let word = line.trim();
        if !word.is_empty() {
            words.push(word.to_owned());
        }
    }
    debug!(count = words.len(), path = %path.display(), "stop words loaded");
    Ok(StopWords::new(words))
}

/// Lines with fewer than two fields are ignored.
pub fn load_known_matches(path: &Path) -> io::Result<KnownMatches> {
    let mut known = KnownMatches::new();
    for line in open(path)?.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        if let (Some(source), Some(reference)) = (fields.next(), fields.next()) {
            known.insert(source, reference);
        }
    }
    debug!(count = known.len(), path = %path.display(), "known matches loaded");
    Ok(known)
}

/// Source page counts for the identifiers in `ids`.
pub fn load_page_counts(path: &Path, ids: &AHashSet<String>) -> io::Result<AHashMap<String, u32>> {
    let mut counts = AHashMap::new();
    for (number, line) in open(path)?.lines().enumerate() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let (Some(file), Some(count)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some(id) = pdf_stem(file) else {
            warn!(line = number + 1, file, "page count entry does not name a pdf");
            continue;
        };
        let Ok(count) = count.parse::<u32>() else {
            warn!(line = number + 1, count, "page count is not a number");
            continue;
        };
        if ids.contains(id) {
            counts.insert(id.to_owned(), count);
        }
    }
    debug!(count = counts.len(), path = %path.display(), "page counts loaded");
    Ok(counts)
}

/// `"a/b/10.1.1.1.pdf"` -> `"10.1.1.1"`; either path separator is accepted.
fn pdf_stem(file: &str) -> Option<&str> {
    let name = file.rsplit(['/', '\\']).next().unwrap_or(file);
    name.find(".pdf").map(|end| &name[..end])
}

/// Decodes one JSON value per non-blank line.
pub struct JsonLines<R, T> {
    lines: Lines<R>,
    line: usize,
    _item: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DeserializeOwned> JsonLines<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            _item: PhantomData,
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonLines<R, T> {
    type Item = Result<T, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let line = self.line;
            return Some(
                serde_json::from_str(&text).map_err(|source| RecordError::Decode { line, source }),
            );
        }
    }
}

/// Source records from a JSON Lines reader, validated one by one.
pub fn source_records<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<SourceRecord, RecordError>> {
    JsonLines::<R, RawSourceRecord>::new(reader).map(|raw| raw.and_then(SourceRecord::try_from))
}

pub fn read_source_records(
    path: &Path,
) -> io::Result<impl Iterator<Item = Result<SourceRecord, RecordError>>> {
    Ok(source_records(open(path)?))
}

pub fn read_publications(
    path: &Path,
) -> io::Result<impl Iterator<Item = Result<Publication, RecordError>>> {
    Ok(JsonLines::new(open(path)?))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use tempfile::NamedTempFile;

    use super::*;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_stop_words() {
        let file = file_with("a\nthe\n\n  of \n");
        let stop_words = load_stop_words(file.path()).unwrap();
        assert_eq!(stop_words.len(), 3);
        assert!(stop_words.contains("of"));
        assert!(!stop_words.contains(""));
    }

    #[test]
    fn test_load_known_matches_skips_short_lines() {
        let file = file_with("10.1.1.1 conf/icde/Smith01\nlonely\n10.1.1.2\tjournals/tkde/Jones02\n");
        let known = load_known_matches(file.path()).unwrap();
        assert_eq!(known.len(), 2);
        assert_eq!(known.get("10.1.1.1"), Some("conf/icde/Smith01"));
        assert_eq!(known.get("10.1.1.2"), Some("journals/tkde/Jones02"));
    }

    #[test]
    fn test_load_page_counts_filters_ids() {
        let file = file_with(concat!(
            "/data/pdf/10.1.1.1.pdf 12\n",
            "C:\\data\\10.1.1.2.pdf 7\n",
            "/data/pdf/10.1.1.3.pdf 4\n",
            "/data/pdf/10.1.1.4.pdf many\n",
            "/data/pdf/10.1.1.5.txt 3\n",
            "short\n",
        ));
        let ids: AHashSet<String> = ["10.1.1.1", "10.1.1.2", "10.1.1.4", "10.1.1.5"]
            .into_iter()
            .map(str::to_owned)
            .collect();

        let counts = load_page_counts(file.path(), &ids).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get("10.1.1.1"), Some(&12));
        assert_eq!(counts.get("10.1.1.2"), Some(&7));
    }

    #[test]
    fn test_source_records_report_bad_lines() {
        let input = concat!(
            r#"{"doi": "10.1.1.1", "title": "Graph Theory", "authors": "A. Smith, B. Jones"}"#,
            "\n\n",
            "not json\n",
            r#"{"doi": "10.1.1.2"}"#,
            "\n",
        );
        let records: Vec<_> = source_records(Cursor::new(input)).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_ref().unwrap().authors.len(), 2);
        assert!(matches!(records[1], Err(RecordError::Decode { line: 3, .. })));
        assert!(matches!(&records[2], Err(RecordError::MissingTitle(id)) if id == "10.1.1.2"));
    }

    #[test]
    fn test_read_publications_from_file() {
        let file = file_with(concat!(
            r#"{"key": "conf/icde/1", "kind": "inproceedings", "title": "Graph Theory", "year": 2001, "booktitle": "ICDE", "journal": null, "pages": "1-10", "authors": ["A. Smith"]}"#,
            "\n",
            r#"{"key": "x", "kind": "pamphlet"}"#,
            "\n",
        ));
        let publications: Vec<_> = read_publications(file.path()).unwrap().collect();
        let first = publications[0].as_ref().unwrap();
        assert_eq!(first.venue(), Some("ICDE"));
        assert!(matches!(publications[1], Err(RecordError::Decode { line: 2, .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(load_stop_words(Path::new("/nonexistent/stop-words.txt")).is_err());
    }
}

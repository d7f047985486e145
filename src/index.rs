//! Reference index backed by an in-RAM tantivy index.
//!
//! [`IndexWriter`] loads publications in batches and precomputes what the
//! gates need (normalized title, venue, page count). [`InMemoryIndex`]
//! answers phrase queries over the raw and stop-word-stripped title fields.

use std::fmt;

use rayon::prelude::*;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
};
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter as TantivyWriter, ReloadPolicy, Searcher,
    TantivyDocument, Term,
};
use tracing::{debug, info, warn};

use crate::error::IndexResult;
use crate::linker::CandidateIndex;
use crate::pages::PageCountNormalizer;
use crate::query::TitleField;
use crate::record::{AuthorField, Publication, ReferenceRecord};
use crate::text::TitleNormalizer;

/// Buffered documents are committed after this many additions.
pub const COMMIT_INTERVAL: usize = 10_000;

/// Index-wide document limit.
pub const DOCUMENT_CAP: usize = 10_000_000;

/// Placeholder entries for personal pages carry this title.
const HOME_PAGE_TITLE: &str = "Home Page";

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

#[derive(Debug, Clone, Copy)]
struct Fields {
    key: Field,
    title: Field,
    nsw_title: Field,
    venue: Field,
    year: Field,
    page_count: Field,
    authors: Field,
    /// Insertion order; hits are returned sorted on it.
    position: Field,
}

impl Fields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();

        // Phrase queries need positions.
        let phrase_indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let phrase_opts = TextOptions::default()
            .set_indexing_options(phrase_indexing)
            .set_stored();

        let fields = Self {
            key: builder.add_text_field("key", STRING | STORED),
            title: builder.add_text_field(TitleField::Title.name(), phrase_opts.clone()),
            nsw_title: builder.add_text_field(TitleField::NswTitle.name(), phrase_opts),
            venue: builder.add_text_field("venue", STORED),
            year: builder.add_i64_field("year", STORED),
            page_count: builder.add_u64_field("page_count", STORED),
            authors: builder.add_text_field("authors", STORED),
            position: builder.add_u64_field("position", STORED),
        };
        (builder.build(), fields)
    }
}

/// Searchable reference collection.
pub struct InMemoryIndex {
    reader: IndexReader,
    parser: QueryParser,
    fields: Fields,
}

impl InMemoryIndex {
    fn open(index: &Index, fields: Fields) -> IndexResult<Self> {
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let parser = QueryParser::for_index(index, vec![fields.title, fields.nsw_title]);
        Ok(Self {
            reader,
            parser,
            fields,
        })
    }

    pub fn len(&self) -> usize {
        usize::try_from(self.reader.searcher().num_docs()).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record stored under `id`, if any.
    pub fn get(&self, id: &str) -> IndexResult<Option<ReferenceRecord>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.fields.key, id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        top.into_iter()
            .next()
            .map(|(_, address)| self.load(&searcher, address).map(|(_, record)| record))
            .transpose()
    }

    fn load(
        &self,
        searcher: &Searcher,
        address: DocAddress,
    ) -> IndexResult<(u64, ReferenceRecord)> {
        let doc: TantivyDocument = searcher.doc(address)?;
        let f = &self.fields;
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        };
        let number = |field: Field| doc.get_first(field).and_then(|v| v.as_u64());

        let record = ReferenceRecord {
            id: text(f.key).unwrap_or_default(),
            title: text(f.title),
            normalized_title: text(f.nsw_title).unwrap_or_default(),
            year: doc
                .get_first(f.year)
                .and_then(|v| v.as_i64())
                .and_then(|year| i32::try_from(year).ok()),
            venue: text(f.venue),
            authors: AuthorField::from_vec(
                doc.get_all(f.authors)
                    .filter_map(|v| v.as_str())
                    .map(str::to_owned)
                    .collect(),
            ),
            page_count: number(f.page_count)
                .and_then(|count| u32::try_from(count).ok())
                .unwrap_or(0),
        };
        Ok((number(f.position).unwrap_or(u64::MAX), record))
    }
}

impl fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("documents", &self.len())
            .finish()
    }
}

impl CandidateIndex for InMemoryIndex {
    fn query(&self, query: &str) -> IndexResult<Vec<ReferenceRecord>> {
        let parsed = self.parser.parse_query(query)?;
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&parsed, &DocSetCollector)?;

        let mut hits = addresses
            .into_iter()
            .map(|address| self.load(&searcher, address))
            .collect::<IndexResult<Vec<_>>>()?;
        hits.sort_unstable_by_key(|(position, _)| *position);

        debug!(query, hits = hits.len(), "query evaluated");
        Ok(hits.into_iter().map(|(_, record)| record).collect())
    }
}

/// Turns a publication into an index document.
#[derive(Clone, Copy)]
struct DocumentBuilder<'a> {
    fields: Fields,
    normalizer: &'a TitleNormalizer,
    pages: &'a PageCountNormalizer,
}

impl DocumentBuilder<'_> {
    fn build(&self, position: usize, publication: &Publication) -> TantivyDocument {
        let f = &self.fields;
        let title = publication.title.as_deref().unwrap_or_default();
        let page_count = self.pages.normalize(publication.pages.as_deref());

        let mut doc = TantivyDocument::new();
        doc.add_text(f.key, &publication.key);
        doc.add_text(f.title, title);
        doc.add_text(f.nsw_title, self.normalizer.strip_to_plain_string(title));
        if let Some(venue) = publication.venue() {
            doc.add_text(f.venue, venue);
        }
        if let Some(year) = publication.year {
            doc.add_i64(f.year, i64::from(year));
        }
        doc.add_u64(f.page_count, u64::from(page_count));
        for author in &publication.authors {
            doc.add_text(f.authors, author);
        }
        doc.add_u64(f.position, u64::try_from(position).unwrap_or(u64::MAX));
        doc
    }
}

/// Bulk loader for an [`InMemoryIndex`].
///
/// Publications are buffered and become searchable on commit, which happens
/// every `commit_interval` additions and on [`IndexWriter::finish`].
pub struct IndexWriter<'a> {
    index: Index,
    writer: TantivyWriter,
    documents: DocumentBuilder<'a>,
    pending: Vec<Publication>,
    accepted: usize,
    committed: usize,
    skipped: usize,
    commit_interval: usize,
    cap: usize,
    cap_reached: bool,
}

impl<'a> IndexWriter<'a> {
    pub fn new(
        normalizer: &'a TitleNormalizer,
        pages: &'a PageCountNormalizer,
    ) -> IndexResult<Self> {
        Self::with_limits(normalizer, pages, COMMIT_INTERVAL, DOCUMENT_CAP)
    }

    pub fn with_limits(
        normalizer: &'a TitleNormalizer,
        pages: &'a PageCountNormalizer,
        commit_interval: usize,
        cap: usize,
    ) -> IndexResult<Self> {
        let (schema, fields) = Fields::schema();
        let index = Index::create_in_ram(schema);
        let writer: TantivyWriter = index.writer(WRITER_MEMORY_BUDGET)?;
        Ok(Self {
            index,
            writer,
            documents: DocumentBuilder {
                fields,
                normalizer,
                pages,
            },
            pending: Vec::new(),
            accepted: 0,
            committed: 0,
            skipped: 0,
            commit_interval: commit_interval.max(1),
            cap,
            cap_reached: false,
        })
    }

    /// Buffer `publication`. Returns whether it was accepted; untitled
    /// entries, home pages and anything past the document cap are dropped.
    pub fn add(&mut self, publication: Publication) -> IndexResult<bool> {
        if self.accepted >= self.cap {
            if !self.cap_reached {
                warn!(cap = self.cap, "document cap reached, ignoring further publications");
                self.cap_reached = true;
            }
            self.skipped += 1;
            return Ok(false);
        }
        match publication.title.as_deref() {
            None | Some(HOME_PAGE_TITLE) => {
                self.skipped += 1;
                return Ok(false);
            }
            Some(_) => {}
        }

        self.pending.push(publication);
        self.accepted += 1;
        if self.pending.len() >= self.commit_interval {
            self.commit()?;
        }
        Ok(true)
    }

    /// Make buffered publications searchable.
    pub fn commit(&mut self) -> IndexResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let first = self.committed;
        let builder = self.documents;
        let documents: Vec<TantivyDocument> = batch
            .par_iter()
            .enumerate()
            .map(|(offset, publication)| builder.build(first + offset, publication))
            .collect();

        for document in documents {
            self.writer.add_document(document)?;
        }
        self.writer.commit()?;
        self.committed += batch.len();
        info!(committed = batch.len(), total = self.committed, "index commit");
        Ok(())
    }

    /// Number of publications dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(mut self) -> IndexResult<InMemoryIndex> {
        self.commit()?;
        let Self {
            index,
            writer,
            documents,
            skipped,
            committed,
            ..
        } = self;
        writer.wait_merging_threads()?;
        info!(documents = committed, skipped, "index build finished");
        InMemoryIndex::open(&index, documents.fields)
    }
}

/// Build an index from `publications` in one go.
pub fn build_index<I>(
    publications: I,
    normalizer: &TitleNormalizer,
    pages: &PageCountNormalizer,
) -> IndexResult<InMemoryIndex>
where
    I: IntoIterator<Item = Publication>,
{
    let mut writer = IndexWriter::new(normalizer, pages)?;
    for publication in publications {
        writer.add(publication)?;
    }
    writer.finish()
}

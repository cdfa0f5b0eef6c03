//! Tantivy-backed fuzzy matching over entry titles, tags and bodies.
//!
//! Each query token must match at least one field. Within a field a token
//! matches any indexed term that starts within `threshold * token_len` edits
//! of it (capped at two), so the match position inside the field does not
//! matter. Per field, an exact hit and a fuzzy hit each add the field's
//! weight; a token therefore scores at most 2 and the final score is divided
//! by `2 * tokens` to land in `[0, 1]`.

use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{
    BooleanQuery, BoostQuery, ConstScoreQuery, FuzzyTermQuery, Occur, Query, TermQuery,
};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder, TEXT, Value,
};
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument as Document, Term};

use super::entry::IndexEntry;
use super::index::{IndexError, IndexResult};

/// Raw field weights before normalization.
const TITLE_WEIGHT: f32 = 0.4;
const TAGS_WEIGHT: f32 = 0.2;
const BODY_WEIGHT: f32 = 0.1;

/// Largest edit distance tantivy builds automata for.
const MAX_DISTANCE: u8 = 2;

/// Writer heap for the single indexing thread.
const WRITER_HEAP_BYTES: usize = 20_000_000;

/// Schema fields for the text index.
#[derive(Debug, Clone, Copy)]
pub struct TextSchema {
    pub item_id: Field,
    pub title: Field,
    pub tags: Field,
    pub body: Field,
}

impl TextSchema {
    pub fn build() -> (Schema, TextSchema) {
        let mut builder = SchemaBuilder::default();

        // Exact key for upserts and deletes
        let item_id = builder.add_text_field("item_id", STRING | STORED);

        let title = builder.add_text_field("title", TEXT);
        let tags = builder.add_text_field("tags", TEXT);
        let body = builder.add_text_field("body", TEXT);

        (
            builder.build(),
            TextSchema {
                item_id,
                title,
                tags,
                body,
            },
        )
    }

    /// Searchable fields with weights normalized to sum to 1.
    pub fn weighted(&self) -> [(Field, f32); 3] {
        let total = TITLE_WEIGHT + TAGS_WEIGHT + BODY_WEIGHT;
        [
            (self.title, TITLE_WEIGHT / total),
            (self.tags, TAGS_WEIGHT / total),
            (self.body, BODY_WEIGHT / total),
        ]
    }
}

/// One item matched by a text query.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub item_id: String,
    /// Relevance in `[0, 1]`, higher is better.
    pub score: f64,
}

/// In-memory tantivy index holding one document per entry.
///
/// Changes are staged with [`stage`](Self::stage) and
/// [`stage_delete`](Self::stage_delete) and become visible to queries after
/// [`commit`](Self::commit).
pub struct TextIndex {
    reader: IndexReader,
    writer: Mutex<IndexWriter<Document>>,
    schema: TextSchema,
    analyzer: TextAnalyzer,
    threshold: f64,
}

impl std::fmt::Debug for TextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextIndex")
            .field("schema", &self.schema)
            .field("threshold", &self.threshold)
            .field("num_docs", &self.reader.searcher().num_docs())
            .finish()
    }
}

impl TextIndex {
    /// Empty index; `threshold` is the tolerated edit fraction per token.
    pub fn new(threshold: f64) -> IndexResult<Self> {
        let (schema, text_schema) = TextSchema::build();
        let index = Index::create_in_ram(schema);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let analyzer = index.tokenizer_for_field(text_schema.body)?;

        Ok(Self {
            reader,
            writer: Mutex::new(writer),
            schema: text_schema,
            analyzer,
            threshold: threshold.clamp(0.0, 1.0),
        })
    }

    /// Replace the document for `entry.item_id`.
    pub fn stage(&self, entry: &IndexEntry) -> IndexResult<()> {
        let writer = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
        writer.delete_term(Term::from_field_text(self.schema.item_id, &entry.item_id));

        let mut doc = Document::new();
        doc.add_text(self.schema.item_id, &entry.item_id);
        doc.add_text(self.schema.title, &entry.title);
        for tag in &entry.tags {
            doc.add_text(self.schema.tags, tag);
        }
        doc.add_text(self.schema.body, &entry.body);
        writer.add_document(doc)?;
        Ok(())
    }

    /// Drop the document for `item_id`.
    pub fn stage_delete(&self, item_id: &str) -> IndexResult<()> {
        let writer = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
        writer.delete_term(Term::from_field_text(self.schema.item_id, item_id));
        Ok(())
    }

    /// Drop every document.
    pub fn stage_clear(&self) -> IndexResult<()> {
        let writer = self.writer.lock().map_err(|_| IndexError::LockPoisoned)?;
        writer.delete_all_documents()?;
        Ok(())
    }

    /// Commit staged changes and reload the reader.
    pub fn commit(&mut self) -> IndexResult<()> {
        let writer = self.writer.get_mut().map_err(|_| IndexError::LockPoisoned)?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Number of committed documents.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Every document matching `q`, best first.
    ///
    /// Ties keep tantivy's order; callers sort them further as needed.
    pub fn search(&self, q: &str) -> IndexResult<Vec<TextMatch>> {
        let tokens = self.tokenize(q);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| (Occur::Must, self.token_query(token)))
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let limit = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX).max(1);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let best = 2.0 * tokens.len() as f64;
        let mut matches = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: Document = searcher.doc(doc_address)?;
            let Some(item_id) = doc.get_first(self.schema.item_id).and_then(|v| v.as_str()) else {
                continue;
            };
            matches.push(TextMatch {
                item_id: item_id.to_string(),
                score: (f64::from(score) / best).clamp(0.0, 1.0),
            });
        }
        Ok(matches)
    }

    /// Query terms, produced by the same analyzer the fields are indexed with.
    fn tokenize(&self, q: &str) -> Vec<String> {
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(q);
        let mut tokens: Vec<String> = Vec::new();
        while stream.advance() {
            let text = &stream.token().text;
            if !tokens.contains(text) {
                tokens.push(text.clone());
            }
        }
        tokens
    }

    /// Matches `token` in any field, exact hits scoring above fuzzy ones.
    fn token_query(&self, token: &str) -> Box<dyn Query> {
        let distance = self.distance_for(token);
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(6);

        for (field, weight) in self.schema.weighted() {
            let term = Term::from_field_text(field, token);
            let exact = TermQuery::new(term.clone(), IndexRecordOption::Basic);
            clauses.push((
                Occur::Should,
                Box::new(ConstScoreQuery::new(Box::new(exact), weight)),
            ));
            let fuzzy = FuzzyTermQuery::new_prefix(term, distance, true);
            clauses.push((Occur::Should, Box::new(BoostQuery::new(Box::new(fuzzy), weight))));
        }
        Box::new(BooleanQuery::new(clauses))
    }

    /// Tolerated edits for a token of this length.
    fn distance_for(&self, token: &str) -> u8 {
        let allowed = (self.threshold * token.chars().count() as f64).floor();
        if allowed >= f64::from(MAX_DISTANCE) {
            MAX_DISTANCE
        } else {
            allowed as u8
        }
    }
}

use std::{cmp::Ordering, collections::BTreeMap, path::Path};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    aggregation::{
        AggregationCollector,
        agg_req::Aggregations,
        agg_result::AggregationResults,
    },
    collector::{Count, TopDocs},
    query::{
        AllQuery,
        BooleanQuery,
        BoostQuery,
        EmptyQuery,
        FuzzyTermQuery,
        Occur as TantivyOccur,
        Query,
        TermQuery,
    },
    schema::*,
    tokenizer::{
        LowerCaser,
        RawTokenizer,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
    },
};

use crate::{
    document_index::{
        Batch,
        BatchOp,
        Clause,
        DocumentIndex,
        FacetField,
        IndexField,
        Occur,
        RawHit,
        SearchHits,
        SearchRequest,
        SortSpec,
        TermValue,
    },
    error::{Error, Result},
    snippet::Snippet,
};

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const REMOTE_ID: &str = "remoteId";
    pub const IDX: &str = "idx";
    pub const OWNER: &str = "owner";
    pub const DESCRIPTION: &str = "description";
    pub const PUBLIC: &str = "public";
    pub const STARRED: &str = "starred";
    pub const FILES: &str = "files";
    pub const CONTENT: &str = "content";
    pub const FILE_COUNT: &str = "fileCount";
    pub const LANGUAGES: &str = "languages";
    pub const LANGUAGE_SET: &str = "languageSet";
    pub const FILENAMES: &str = "filenames";
    pub const TAGS: &str = "tags";
    pub const COMMENT_COUNT: &str = "commentCount";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const URL: &str = "url";
}

const EN_STEM: &str = "en_stem";
const KEYWORD: &str = "keyword";

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Free-text words shorter than this are not fuzzy-matched.
const MIN_FUZZY_WORD_LEN: usize = 3;

const DESCRIPTION_BOOST: f32 = 2.0;

/// Tantivy-backed snippet index.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub id: Field,
    pub remote_id: Field,
    pub idx: Field,
    pub owner: Field,
    pub description: Field,
    pub public: Field,
    pub starred: Field,
    pub files: Field,
    pub content: Field,
    pub file_count: Field,
    pub languages: Field,
    pub language_set: Field,
    pub filenames: Field,
    pub tags: Field,
    pub comment_count: Field,
    pub created_at: Field,
    pub updated_at: Field,
    pub url: Field,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    let analyzed = |stored: bool| {
        let opts = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(EN_STEM)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        if stored { opts.set_stored() } else { opts }
    };
    // Lowercased for equality filters; the fast column keeps the raw value
    // for facet display.
    let keyword = |stored: bool| {
        let opts = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(KEYWORD)
                    .set_index_option(IndexRecordOption::WithFreqs),
            )
            .set_fast(None);
        if stored { opts.set_stored() } else { opts }
    };

    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_text_field(fields::REMOTE_ID, STRING | STORED);
    builder.add_u64_field(fields::IDX, INDEXED | STORED | FAST);
    builder.add_text_field(fields::OWNER, keyword(true));
    builder.add_text_field(fields::DESCRIPTION, analyzed(true));
    builder.add_bool_field(fields::PUBLIC, INDEXED | STORED);
    builder.add_bool_field(fields::STARRED, INDEXED | STORED);
    builder.add_text_field(fields::FILES, STORED);
    builder.add_text_field(fields::CONTENT, analyzed(false));
    builder.add_u64_field(fields::FILE_COUNT, STORED);
    builder.add_text_field(fields::LANGUAGES, STORED);
    builder.add_text_field(fields::LANGUAGE_SET, keyword(false));
    builder.add_text_field(fields::FILENAMES, analyzed(true));
    builder.add_text_field(fields::TAGS, keyword(true));
    builder.add_u64_field(fields::COMMENT_COUNT, STORED);
    builder.add_text_field(fields::CREATED_AT, STRING | STORED);
    builder.add_text_field(fields::UPDATED_AT, STRING | STORED);
    builder.add_text_field(fields::URL, STORED);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> tantivy::Result<SchemaFields> {
    let f = |name: &str| schema.get_field(name);
    Ok(SchemaFields {
        id: f(fields::ID)?,
        remote_id: f(fields::REMOTE_ID)?,
        idx: f(fields::IDX)?,
        owner: f(fields::OWNER)?,
        description: f(fields::DESCRIPTION)?,
        public: f(fields::PUBLIC)?,
        starred: f(fields::STARRED)?,
        files: f(fields::FILES)?,
        content: f(fields::CONTENT)?,
        file_count: f(fields::FILE_COUNT)?,
        languages: f(fields::LANGUAGES)?,
        language_set: f(fields::LANGUAGE_SET)?,
        filenames: f(fields::FILENAMES)?,
        tags: f(fields::TAGS)?,
        comment_count: f(fields::COMMENT_COUNT)?,
        created_at: f(fields::CREATED_AT)?,
        updated_at: f(fields::UPDATED_AT)?,
        url: f(fields::URL)?,
    })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register(EN_STEM, en_stem);

    let keyword = TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(KEYWORD, keyword);
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let open_err = |reason: String| Error::IndexOpen {
            path: dir.to_path_buf(),
            reason,
        };

        std::fs::create_dir_all(dir).map_err(|e| open_err(e.to_string()))?;
        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| open_err(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| open_err(e.to_string()))?
        {
            Index::open(mmap_dir).map_err(|e| open_err(e.to_string()))?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )
            .map_err(|e| open_err(e.to_string()))?
        };

        Self::from_index(index).map_err(|e| open_err(e.to_string()))
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Ok(Self::from_index(Index::create_in_ram(build_schema()))?)
    }

    fn from_index(index: Index) -> tantivy::Result<Self> {
        let fields = resolve_fields(&index.schema())?;
        register_tokenizers(&index);
        let reader = index.reader()?;
        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    fn to_document(&self, snippet: &Snippet) -> Result<TantivyDocument> {
        let f = self.fields;
        let mut doc = TantivyDocument::default();

        doc.add_text(f.id, &snippet.id);
        doc.add_text(f.remote_id, &snippet.remote_id);
        doc.add_u64(f.idx, snippet.idx);
        doc.add_text(f.owner, &snippet.owner);
        doc.add_text(f.description, &snippet.description);
        doc.add_bool(f.public, snippet.public);
        doc.add_bool(f.starred, snippet.starred);
        doc.add_text(f.files, serde_json::to_string(&snippet.files)?);
        for file in snippet.files.values() {
            doc.add_text(f.content, &file.content);
        }
        doc.add_u64(f.file_count, snippet.file_count);
        for language in &snippet.languages {
            doc.add_text(f.languages, language);
        }
        let mut language_set: Vec<&String> = snippet.languages.iter().collect();
        language_set.sort();
        language_set.dedup();
        for language in language_set {
            doc.add_text(f.language_set, language);
        }
        for filename in &snippet.filenames {
            doc.add_text(f.filenames, filename);
        }
        for tag in &snippet.tags {
            doc.add_text(f.tags, tag);
        }
        doc.add_u64(f.comment_count, snippet.comment_count);
        doc.add_text(f.created_at, rfc3339(&snippet.created_at));
        doc.add_text(f.updated_at, rfc3339(&snippet.updated_at));
        doc.add_text(f.url, &snippet.url);

        Ok(doc)
    }

    /// Flatten a stored document into path-keyed values.
    fn flatten(&self, doc: &TantivyDocument, score: f32) -> Result<RawHit> {
        let f = self.fields;
        let mut out = BTreeMap::new();

        let text_fields = [
            (f.id, fields::ID),
            (f.remote_id, fields::REMOTE_ID),
            (f.owner, fields::OWNER),
            (f.description, fields::DESCRIPTION),
            (f.created_at, fields::CREATED_AT),
            (f.updated_at, fields::UPDATED_AT),
            (f.url, fields::URL),
        ];
        for (field, key) in text_fields {
            if let Some(value) = doc.get_first(field).and_then(|v| v.as_str()) {
                out.insert(key.to_string(), json!(value));
            }
        }

        let number_fields = [
            (f.idx, fields::IDX),
            (f.file_count, fields::FILE_COUNT),
            (f.comment_count, fields::COMMENT_COUNT),
        ];
        for (field, key) in number_fields {
            if let Some(value) = doc.get_first(field).and_then(|v| v.as_u64()) {
                out.insert(key.to_string(), json!(value));
            }
        }

        for (field, key) in [(f.public, fields::PUBLIC), (f.starred, fields::STARRED)] {
            if let Some(value) = doc.get_first(field).and_then(|v| v.as_bool()) {
                out.insert(key.to_string(), json!(value));
            }
        }

        let list_fields = [
            (f.languages, fields::LANGUAGES),
            (f.filenames, fields::FILENAMES),
            (f.tags, fields::TAGS),
        ];
        for (field, key) in list_fields {
            let values: Vec<&str> =
                doc.get_all(field).filter_map(|v| v.as_str()).collect();
            out.insert(key.to_string(), json!(values));
        }

        if let Some(files) = doc.get_first(f.files).and_then(|v| v.as_str()) {
            let malformed = || Error::MalformedRecord {
                id: doc
                    .get_first(f.id)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                field: fields::FILES.to_string(),
            };
            let files: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(files).map_err(|_| malformed())?;
            for (filename, attrs) in files {
                let attrs = attrs.as_object().ok_or_else(malformed)?;
                for (attr, value) in attrs {
                    out.insert(format!("files.{filename}.{attr}"), value.clone());
                }
            }
        }

        Ok(RawHit { score, fields: out })
    }

    fn field(&self, field: IndexField) -> Field {
        let f = self.fields;
        match field {
            IndexField::Id => f.id,
            IndexField::RemoteId => f.remote_id,
            IndexField::Idx => f.idx,
            IndexField::Owner => f.owner,
            IndexField::Description => f.description,
            IndexField::Public => f.public,
            IndexField::Starred => f.starred,
            IndexField::FileCount => f.file_count,
            IndexField::Languages => f.language_set,
            IndexField::Filenames => f.filenames,
            IndexField::Tags => f.tags,
            IndexField::CommentCount => f.comment_count,
            IndexField::CreatedAt => f.created_at,
            IndexField::UpdatedAt => f.updated_at,
        }
    }

    fn term(&self, field: IndexField, value: &TermValue) -> Term {
        let handle = self.field(field);
        match value {
            TermValue::Text(text) => match field {
                IndexField::Owner | IndexField::Languages | IndexField::Tags => {
                    Term::from_field_text(handle, &text.to_lowercase())
                }
                _ => Term::from_field_text(handle, text),
            },
            TermValue::Bool(flag) => Term::from_field_bool(handle, *flag),
            TermValue::U64(n) => Term::from_field_u64(handle, *n),
        }
    }

    fn build_query(&self, clause: &Clause) -> Result<Box<dyn Query>> {
        match clause {
            Clause::All => Ok(Box::new(AllQuery)),
            Clause::Text(text) => self.text_query(text),
            Clause::Fuzzy { text, distance } => Ok(self.fuzzy_query(text, *distance)),
            Clause::Term { field, value } => Ok(Box::new(TermQuery::new(
                self.term(*field, value),
                IndexRecordOption::Basic,
            ))),
            Clause::Bool(clauses) => {
                let subqueries = clauses
                    .iter()
                    .map(|(occur, clause)| {
                        let occur = match occur {
                            Occur::Must => TantivyOccur::Must,
                            Occur::Should => TantivyOccur::Should,
                            Occur::MustNot => TantivyOccur::MustNot,
                        };
                        Ok((occur, self.build_query(clause)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Box::new(BooleanQuery::new(subqueries)))
            }
        }
    }

    /// Any analyzed token in any text field, description boosted.
    fn text_query(&self, text: &str) -> Result<Box<dyn Query>> {
        let f = self.fields;
        let mut should: Vec<(TantivyOccur, Box<dyn Query>)> = Vec::new();

        for field in [f.description, f.filenames, f.content] {
            let mut analyzer = self.index.tokenizer_for_field(field)?;
            let mut stream = analyzer.token_stream(text);
            while stream.advance() {
                let term = Term::from_field_text(field, &stream.token().text);
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    term,
                    IndexRecordOption::WithFreqs,
                ));
                let query: Box<dyn Query> = if field == f.description {
                    Box::new(BoostQuery::new(query, DESCRIPTION_BOOST))
                } else {
                    query
                };
                should.push((TantivyOccur::Should, query));
            }
        }

        for field in [f.owner, f.language_set, f.tags] {
            for word in text.split_whitespace() {
                let term = Term::from_field_text(field, &word.to_lowercase());
                should.push((
                    TantivyOccur::Should,
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
                ));
            }
        }

        if should.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }
        Ok(Box::new(BooleanQuery::new(should)))
    }

    /// Levenshtein match of each word against the text and tag fields.
    fn fuzzy_query(&self, text: &str, distance: u8) -> Box<dyn Query> {
        let f = self.fields;
        let mut should: Vec<(TantivyOccur, Box<dyn Query>)> = Vec::new();

        for word in text.split_whitespace() {
            if word.chars().count() < MIN_FUZZY_WORD_LEN {
                continue;
            }
            let word = word.to_lowercase();
            for field in [f.description, f.filenames, f.content, f.tags] {
                let term = Term::from_field_text(field, &word);
                should.push((
                    TantivyOccur::Should,
                    Box::new(FuzzyTermQuery::new(term, distance, true)),
                ));
            }
        }

        if should.is_empty() {
            return Box::new(EmptyQuery);
        }
        Box::new(BooleanQuery::new(should))
    }
}

impl DocumentIndex for SearchIndex {
    fn apply(&mut self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let f = self.fields;
        let mut writer: IndexWriter = self.index.writer(WRITER_MEMORY_BUDGET)?;
        // Nothing is visible until commit; an early return drops the writer
        // and discards every pending op.
        for op in batch.ops() {
            match op {
                BatchOp::DeleteAll => {
                    writer.delete_query(Box::new(AllQuery))?;
                }
                BatchOp::Index(snippet) => {
                    writer.delete_term(Term::from_field_text(f.id, &snippet.id));
                    writer.add_document(self.to_document(snippet)?)?;
                }
                BatchOp::Delete(id) => {
                    writer.delete_term(Term::from_field_text(f.id, id));
                }
            }
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::debug!(ops = batch.len(), "committed batch");
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchHits> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let query = self.build_query(&request.clause)?;

        let total = searcher.search(&*query, &Count)?;
        if total == 0 || request.limit == 0 {
            return Ok(SearchHits {
                hits: Vec::new(),
                total: total as u64,
            });
        }

        // Ordering and tie-breaks use stored values, so every match is
        // collected before truncating.
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(total))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            hits.push(self.flatten(&doc, score)?);
        }

        hits.sort_by(|a, b| compare_hits(a, b, request.sort));
        hits.truncate(request.limit);

        Ok(SearchHits {
            hits,
            total: total as u64,
        })
    }

    fn facet(&self, field: FacetField, limit: usize) -> Result<Vec<(String, u64)>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();
        let name = match field {
            FacetField::Tags => fields::TAGS,
            FacetField::Languages => fields::LANGUAGE_SET,
            FacetField::Owner => fields::OWNER,
        };

        let request: Aggregations = serde_json::from_value(json!({
            "facet": { "terms": { "field": name, "size": limit } }
        }))?;
        let collector = AggregationCollector::from_aggs(request, Default::default());
        let results: AggregationResults = searcher.search(&AllQuery, &collector)?;
        let results = serde_json::to_value(&results)?;

        let buckets = results["facet"]["buckets"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut counts: Vec<(String, u64)> = buckets
            .iter()
            .filter_map(|bucket| {
                let key = match &bucket["key"] {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key, bucket["doc_count"].as_u64()?))
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts)
    }

    fn doc_count(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn rfc3339(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Missing,
    Flag(bool),
    Number(u64),
    Time(DateTime<Utc>),
    Text(String),
}

fn sort_key(hit: &RawHit, field: IndexField) -> SortKey {
    let Some(value) = hit.fields.get(field.key()) else {
        return SortKey::Missing;
    };
    match field {
        IndexField::CreatedAt | IndexField::UpdatedAt => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| SortKey::Time(t.with_timezone(&Utc)))
            .unwrap_or(SortKey::Missing),
        _ => match value {
            serde_json::Value::Bool(b) => SortKey::Flag(*b),
            serde_json::Value::Number(n) => {
                n.as_u64().map(SortKey::Number).unwrap_or(SortKey::Missing)
            }
            serde_json::Value::String(s) => SortKey::Text(s.to_lowercase()),
            serde_json::Value::Array(items) => SortKey::Text(
                items
                    .first()
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_lowercase(),
            ),
            _ => SortKey::Missing,
        },
    }
}

/// Order by the sort field if any, then by descending score, then newest
/// first.
fn compare_hits(a: &RawHit, b: &RawHit, sort: Option<SortSpec>) -> Ordering {
    let by_field = match sort {
        Some(sort) => {
            let ord = sort_key(a, sort.field).cmp(&sort_key(b, sort.field));
            if sort.descending { ord.reverse() } else { ord }
        }
        None => Ordering::Equal,
    };
    by_field
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| {
            sort_key(b, IndexField::UpdatedAt).cmp(&sort_key(a, IndexField::UpdatedAt))
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::snippet::tests::sample;

    fn request(clause: Clause, limit: usize) -> SearchRequest {
        SearchRequest {
            clause,
            sort: None,
            limit,
        }
    }

    fn ids(hits: &SearchHits) -> Vec<String> {
        hits.hits
            .iter()
            .map(|h| h.fields["remoteId"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn index_and_search_text() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "quicksort implementation")).unwrap();
        idx.index(sample("b", 1, "binary search tree")).unwrap();

        let hits = idx
            .search(&request(Clause::Text("quicksort".into()), 10))
            .unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
        assert_eq!(hits.total, 1);
        assert!(hits.hits[0].score > 0.0);
    }

    #[test]
    fn file_content_is_searchable() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "no words of interest")).unwrap();

        let hits = idx.search(&request(Clause::Text("notes".into()), 10)).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn flattened_files_keep_dotted_names() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "x")).unwrap();

        let hits = idx.search(&request(Clause::All, 10)).unwrap();
        let fields = &hits.hits[0].fields;
        assert_eq!(fields["files.notes.v1.txt.content"], json!("plain notes\n"));
        assert_eq!(fields["files.main.rs.language"], json!("Rust"));
        assert!(!fields.contains_key("files.notes.v1.txt.language"));
        assert_eq!(fields["filenames"], json!(["main.rs", "notes.v1.txt"]));
        assert_eq!(fields["idx"], json!(0));
        assert_eq!(fields["public"], json!(true));
    }

    #[test]
    fn keyword_terms_ignore_case() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "#Todo later")).unwrap();
        idx.index(sample("b", 1, "#done")).unwrap();

        let clause = Clause::Term {
            field: IndexField::Tags,
            value: TermValue::Text("TODO".into()),
        };
        let hits = idx.search(&request(clause, 10)).unwrap();
        assert_eq!(ids(&hits), vec!["a"]);
    }

    #[test]
    fn flag_and_number_terms() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        let mut starred = sample("a", 7, "x");
        starred.starred = true;
        idx.index(starred).unwrap();
        idx.index(sample("b", 8, "y")).unwrap();

        let by_flag = Clause::Term {
            field: IndexField::Starred,
            value: TermValue::Bool(true),
        };
        assert_eq!(ids(&idx.search(&request(by_flag, 10)).unwrap()), vec!["a"]);

        let by_idx = Clause::Term {
            field: IndexField::Idx,
            value: TermValue::U64(8),
        };
        assert_eq!(ids(&idx.search(&request(by_idx, 10)).unwrap()), vec!["b"]);
    }

    #[test]
    fn batch_applies_inserts_and_deletes_together() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        let a = sample("a", 0, "x");
        let a_id = a.id.clone();
        idx.index(a).unwrap();

        let mut batch = Batch::new();
        batch.delete(a_id);
        batch.index(sample("b", 1, "y"));
        batch.index(sample("c", 2, "z"));
        idx.apply(batch).unwrap();

        assert_eq!(idx.doc_count().unwrap(), 2);
        let hits = idx.search(&request(Clause::All, 10)).unwrap();
        let mut got = ids(&hits);
        got.sort();
        assert_eq!(got, vec!["b", "c"]);
    }

    #[test]
    fn delete_all_then_reindex() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "x")).unwrap();
        idx.index(sample("b", 1, "y")).unwrap();

        let mut batch = Batch::new();
        batch.index(sample("c", 0, "z"));
        batch.delete_all();
        idx.apply(batch).unwrap();

        let hits = idx.search(&request(Clause::All, 10)).unwrap();
        assert_eq!(ids(&hits), vec!["c"]);
    }

    #[test]
    fn sort_by_field_then_score() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        for (id, n) in [("a", 2), ("b", 0), ("c", 1)] {
            idx.index(sample(id, n, "x")).unwrap();
        }

        let mut req = request(Clause::All, 2);
        req.sort = Some(SortSpec {
            field: IndexField::Idx,
            descending: true,
        });
        let hits = idx.search(&req).unwrap();
        assert_eq!(ids(&hits), vec!["a", "c"]);
        assert_eq!(hits.total, 3);
    }

    #[test]
    fn equal_scores_list_newest_first() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        for (id, day) in [("old", 1), ("new", 9), ("mid", 5)] {
            let mut snippet = sample(id, 0, "#todo");
            snippet.updated_at = chrono::Utc
                .with_ymd_and_hms(2024, 4, day, 0, 0, 0)
                .unwrap();
            idx.index(snippet).unwrap();
        }

        let clause = Clause::Term {
            field: IndexField::Tags,
            value: TermValue::Text("todo".into()),
        };
        let hits = idx.search(&request(clause, 2)).unwrap();
        assert_eq!(ids(&hits), vec!["new", "mid"]);
        assert_eq!(hits.total, 3);
    }

    #[test]
    fn fuzzy_tolerates_typos() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "quicksort implementation")).unwrap();

        let exact = idx.search(&request(Clause::Text("quiksort".into()), 10)).unwrap();
        assert!(exact.hits.is_empty());

        let fuzzy = Clause::Fuzzy {
            text: "quiksort".into(),
            distance: 2,
        };
        assert_eq!(ids(&idx.search(&request(fuzzy, 10)).unwrap()), vec!["a"]);
    }

    #[test]
    fn facet_counts_documents() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        idx.index(sample("a", 0, "#todo #rust")).unwrap();
        idx.index(sample("b", 1, "#todo")).unwrap();
        idx.index(sample("c", 2, "none")).unwrap();

        let tags = idx.facet(FacetField::Tags, 100).unwrap();
        assert_eq!(tags, vec![("todo".to_string(), 2), ("rust".to_string(), 1)]);

        let languages = idx.facet(FacetField::Languages, 100).unwrap();
        assert_eq!(languages, vec![("Rust".to_string(), 3)]);
    }

    #[test]
    fn disk_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");

        {
            let mut idx = SearchIndex::open(&dir).unwrap();
            idx.index(sample("a", 0, "persistent data")).unwrap();
        }

        {
            let idx = SearchIndex::open(&dir).unwrap();
            let hits = idx.search(&request(Clause::Text("persistent".into()), 10)).unwrap();
            assert_eq!(ids(&hits), vec!["a"]);
        }
    }
}

use std::collections::BTreeMap;

use crate::{
    artifacts,
    data_dir::DataDir,
    document_index::{Clause, DocumentIndex, FacetField, IndexField, SearchRequest, SortSpec},
    error::{Error, Result},
    facet,
    projector::project,
    query::{self, SearchOutcome, SearchQuery},
    remote::{NewGist, RemoteSource},
    snippet::{LibrarySummary, Snippet, SnippetFile, Tag},
    sync::{CancelToken, SyncEngine, SyncOptions, SyncReport},
    tantivy_index::SearchIndex,
};

/// The local mirror: an index plus the artifacts kept next to it.
#[derive(Debug)]
pub struct Library {
    data_dir: DataDir,
    index: SearchIndex,
}

impl Library {
    pub fn open(data_dir: DataDir) -> Result<Self> {
        let index = SearchIndex::open(&data_dir.tantivy_dir()?)?;
        Ok(Self { data_dir, index })
    }

    pub fn data_dir(&self) -> &DataDir {
        &self.data_dir
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Bring the index up to date with the remote and refresh the
    /// artifacts.
    pub fn sync<S: RemoteSource + ?Sized>(
        &mut self,
        source: &S,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        if options.rebuild {
            artifacts::clear(&self.data_dir)?;
        }
        let report = SyncEngine::run(&mut self.index, source, options, cancel)?;
        artifacts::write(&self.data_dir, &report.snippets)?;
        tracing::info!(
            gists = report.summary.gists,
            files = report.summary.files,
            starred = report.summary.starred,
            "library synced"
        );
        Ok(report)
    }

    pub fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        query::search(&self.index, query)
    }

    pub fn summarize(&self, field: FacetField) -> Result<Vec<(String, u64)>> {
        facet::summarize(&self.index, field)
    }

    pub fn lookup(&self, idx: u64) -> Result<Snippet> {
        query::find_by_idx(&self.index, idx)?.ok_or_else(|| Error::NotFound {
            kind: "gist",
            name: idx.to_string(),
        })
    }

    /// The idx the next new snippet will receive.
    pub fn next_idx(&self) -> Result<u64> {
        let request = SearchRequest {
            clause: Clause::All,
            sort: Some(SortSpec {
                field: IndexField::Idx,
                descending: true,
            }),
            limit: 1,
        };
        let highest = self.index.search(&request)?.hits.first().map(project).transpose()?;
        Ok(highest.map_or(0, |s| s.idx + 1))
    }

    pub fn summary(&self) -> Result<LibrarySummary> {
        Ok(LibrarySummary::from_snippets(&query::all_snippets(&self.index)?))
    }

    /// Every file of the snippet concatenated, in file order.
    pub fn content(&self, idx: u64) -> Result<String> {
        Ok(self.lookup(idx)?.content())
    }

    /// Tag counts from the last sync.
    pub fn cached_tags(&self) -> Result<Vec<Tag>> {
        artifacts::read_tags(&self.data_dir)
    }

    /// Create a gist remotely and index it without a full sync.
    pub fn create<S: RemoteSource + ?Sized>(
        &mut self,
        source: &S,
        files: BTreeMap<String, String>,
        description: &str,
        public: bool,
    ) -> Result<Snippet> {
        if files.is_empty() {
            return Err(Error::InvalidFilter("a gist needs at least one file".into()));
        }
        let gist = source.create(&NewGist {
            description: description.to_string(),
            public,
            files,
        })?;

        let mut files = BTreeMap::new();
        for (name, file) in &gist.files {
            let content = match &file.content {
                Some(content) => content.clone(),
                None => source.fetch_file_content(file)?,
            };
            files.insert(
                name.clone(),
                SnippetFile {
                    content,
                    language: file.language.clone(),
                },
            );
        }

        let snippet = Snippet::assemble(gist.parts(), self.next_idx()?, false, files);
        self.index.index(snippet.clone())?;
        self.refresh_artifacts()?;
        tracing::info!(idx = snippet.idx, remote_id = %snippet.remote_id, "created gist");
        Ok(snippet)
    }

    /// Delete a gist remotely, then drop it from the index.
    pub fn remove<S: RemoteSource + ?Sized>(&mut self, source: &S, idx: u64) -> Result<Snippet> {
        let snippet = self.lookup(idx)?;
        source.delete(&snippet.remote_id)?;
        self.index.delete(&snippet.id)?;
        self.refresh_artifacts()?;
        tracing::info!(idx, remote_id = %snippet.remote_id, "removed gist");
        Ok(snippet)
    }

    fn refresh_artifacts(&self) -> Result<()> {
        artifacts::write(&self.data_dir, &query::all_snippets(&self.index)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::remote::MemorySource;

    fn open(tmp: &tempfile::TempDir) -> Library {
        Library::open(DataDir::resolve(Some(tmp.path())).unwrap()).unwrap()
    }

    fn source() -> MemorySource {
        let source = MemorySource::new("me", 10);
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        source.put_owned(MemorySource::gist(
            "g1",
            "me",
            "hello #demo",
            at,
            &[("a.sh", "echo hi\n"), ("b.md", "# notes\n")],
        ));
        source
    }

    #[test]
    fn sync_writes_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut library = open(&tmp);
        assert!(matches!(library.cached_tags(), Err(Error::NotFound { .. })));

        library
            .sync(&source(), &SyncOptions::default(), &CancelToken::new())
            .unwrap();

        assert_eq!(
            library.cached_tags().unwrap(),
            vec![Tag { name: "demo".into(), count: 1 }]
        );
        assert_eq!(artifacts::read_library(library.data_dir()).unwrap().len(), 1);
    }

    #[test]
    fn lookup_and_content() {
        let tmp = tempfile::tempdir().unwrap();
        let mut library = open(&tmp);
        library
            .sync(&source(), &SyncOptions::default(), &CancelToken::new())
            .unwrap();

        assert_eq!(library.lookup(0).unwrap().remote_id, "g1");
        assert_eq!(library.content(0).unwrap(), "echo hi\n# notes\n");
        assert!(matches!(
            library.lookup(42),
            Err(Error::NotFound { kind: "gist", .. })
        ));
        assert_eq!(library.next_idx().unwrap(), 1);
        assert_eq!(library.summary().unwrap().files, 2);
    }

    #[test]
    fn create_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let mut library = open(&tmp);
        let source = source();
        library
            .sync(&source, &SyncOptions::default(), &CancelToken::new())
            .unwrap();

        let files = BTreeMap::from([("query.sql".to_string(), "select 1;".to_string())]);
        let created = library.create(&source, files, "ad hoc #sql", false).unwrap();
        assert_eq!(created.idx, 1);
        assert_eq!(created.languages, vec!["SQL"]);
        assert!(!created.public);
        assert_eq!(library.lookup(1).unwrap(), created);

        // A later sync sees the same version and leaves it alone.
        let report = library
            .sync(&source, &SyncOptions::default(), &CancelToken::new())
            .unwrap();
        assert_eq!(report.inserted, 0);

        library.remove(&source, 1).unwrap();
        assert!(matches!(library.lookup(1), Err(Error::NotFound { .. })));
        assert_eq!(library.summary().unwrap().gists, 1);
    }

    #[test]
    fn empty_library_starts_at_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let library = open(&tmp);
        assert_eq!(library.next_idx().unwrap(), 0);
        assert_eq!(library.summary().unwrap(), LibrarySummary::default());
    }
}

//! Reconcile the remote collection with the local index.
//!
//! Every run lists the whole remote collection but fetches file content only
//! for versions the index has not seen. Changes are applied as a single
//! batch, so a failed or cancelled run leaves the index as it was.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use rayon::prelude::*;

use crate::{
    document_index::{Batch, DocumentIndex},
    error::{Error, Result},
    query::all_snippets,
    remote::{FIRST_PAGE, Page, RemoteGist, RemoteSource},
    snippet::{LibrarySummary, Snippet, SnippetFile},
};

/// Default number of concurrent content fetches.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop the existing index and re-number everything.
    pub rebuild: bool,
    /// Upper bound on concurrent content fetches.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Cooperative cancellation flag shared between a sync and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub summary: LibrarySummary,
    pub inserted: usize,
    pub deleted: usize,
    /// Unchanged versions re-indexed because their star status flipped.
    pub restarred: usize,
    /// The library after the sync, in idx order.
    pub snippets: Vec<Snippet>,
}

/// A remote version the index has not seen, with its assigned idx.
struct Pending<'a> {
    gist: &'a RemoteGist,
    idx: u64,
    starred: bool,
}

pub struct SyncEngine;

impl SyncEngine {
    pub fn run<I, S>(
        index: &mut I,
        source: &S,
        options: &SyncOptions,
        cancel: &CancelToken,
    ) -> Result<SyncReport>
    where
        I: DocumentIndex + ?Sized,
        S: RemoteSource + ?Sized,
    {
        let mut working: BTreeMap<String, RemoteGist> = BTreeMap::new();
        for gist in collect_pages(cancel, |page| source.list_owned(page))? {
            working.insert(gist.id.clone(), gist);
        }
        let owned = working.len();

        let mut starred: HashSet<String> = HashSet::new();
        for gist in collect_pages(cancel, |page| source.list_starred(page))? {
            starred.insert(gist.id.clone());
            working.entry(gist.id.clone()).or_insert(gist);
        }
        tracing::info!(
            owned,
            starred = starred.len(),
            total = working.len(),
            "listed remote gists"
        );

        let mut gists: Vec<RemoteGist> = working.into_values().collect();
        gists.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        // A rebuild starts from an empty library; the old documents are
        // dropped by the same batch that indexes the new ones.
        let existing: HashMap<String, Snippet> = if options.rebuild {
            HashMap::new()
        } else {
            all_snippets(&*index)?
                .into_iter()
                .map(|s| (s.id.clone(), s))
                .collect()
        };
        let live_idx: HashMap<&str, u64> = existing
            .values()
            .map(|s| (s.remote_id.as_str(), s.idx))
            .collect();
        let mut next_idx = existing
            .values()
            .map(|s| s.idx)
            .max()
            .map_or(0, |max| max + 1);

        let mut current: HashSet<String> = HashSet::with_capacity(gists.len());
        let mut pending = Vec::new();
        let mut restar = Vec::new();
        for gist in &gists {
            let id = gist.version_id();
            let is_starred = starred.contains(&gist.id);
            match existing.get(&id) {
                Some(stored) if stored.starred != is_starred => {
                    let mut snippet = stored.clone();
                    snippet.starred = is_starred;
                    restar.push(snippet);
                }
                Some(_) => {}
                None => {
                    let idx = match live_idx.get(gist.id.as_str()) {
                        Some(&idx) => idx,
                        None => {
                            next_idx += 1;
                            next_idx - 1
                        }
                    };
                    pending.push(Pending {
                        gist,
                        idx,
                        starred: is_starred,
                    });
                }
            }
            current.insert(id);
        }

        let fetched = fetch_all(source, &pending, options.concurrency, cancel)?;
        cancel.check()?;

        let mut batch = Batch::new();
        let mut deleted = 0;
        if options.rebuild {
            deleted = usize::try_from(index.doc_count()?).unwrap_or(usize::MAX);
            batch.delete_all();
        }
        for id in existing.keys().filter(|id| !current.contains(*id)) {
            batch.delete(id.clone());
            deleted += 1;
        }
        let inserted = fetched.len();
        for snippet in fetched {
            batch.index(snippet);
        }
        let restarred = restar.len();
        for snippet in restar {
            batch.index(snippet);
        }

        tracing::info!(inserted, deleted, restarred, "applying changes");
        index.apply(batch)?;

        let snippets = all_snippets(&*index)?;
        Ok(SyncReport {
            summary: LibrarySummary::from_snippets(&snippets),
            inserted,
            deleted,
            restarred,
            snippets,
        })
    }
}

fn collect_pages(
    cancel: &CancelToken,
    mut list: impl FnMut(u32) -> Result<Page>,
) -> Result<Vec<RemoteGist>> {
    let mut gists = Vec::new();
    let mut page = Some(FIRST_PAGE);
    while let Some(n) = page {
        cancel.check()?;
        let Page { items, next } = list(n)?;
        tracing::debug!(page = n, count = items.len(), "fetched listing page");
        gists.extend(items);
        page = next;
    }
    Ok(gists)
}

/// Fetch file content for every pending version on a bounded pool.
///
/// The first failure aborts the whole set.
fn fetch_all<S: RemoteSource + ?Sized>(
    source: &S,
    pending: &[Pending<'_>],
    concurrency: usize,
    cancel: &CancelToken,
) -> Result<Vec<Snippet>> {
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let workers = concurrency.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Config(format!("cannot start {workers} fetch workers: {e}")))?;

    tracing::info!(count = pending.len(), workers, "fetching new versions");
    pool.install(|| {
        pending
            .par_iter()
            .map(|p| fetch_one(source, p, cancel))
            .collect()
    })
}

fn fetch_one<S: RemoteSource + ?Sized>(
    source: &S,
    pending: &Pending<'_>,
    cancel: &CancelToken,
) -> Result<Snippet> {
    let mut files = BTreeMap::new();
    for (name, file) in &pending.gist.files {
        cancel.check()?;
        let content = source.fetch_file_content(file)?;
        files.insert(
            name.clone(),
            SnippetFile {
                content,
                language: file.language.clone(),
            },
        );
    }
    Ok(Snippet::assemble(
        pending.gist.parts(),
        pending.idx,
        pending.starred,
        files,
    ))
}

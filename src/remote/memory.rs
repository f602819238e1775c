use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        Mutex,
        MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use chrono::{DateTime, Utc};

use super::{NewGist, Page, RemoteFile, RemoteGist, RemoteOwner, RemoteSource};
use crate::{
    error::{Error, Result},
    sync::CancelToken,
};

/// In-process remote source.
///
/// Gists are listed in insertion order, `page_size` per page. File content
/// is held separately and served through `raw_url`, the way the real API
/// omits content from listings.
#[derive(Debug)]
pub struct MemorySource {
    login: String,
    page_size: usize,
    inner: Mutex<MemoryState>,
    fetches: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemoryState {
    owned: Vec<RemoteGist>,
    foreign: Vec<RemoteGist>,
    starred: BTreeSet<String>,
    contents: HashMap<String, String>,
    failing_files: BTreeSet<String>,
    cancel_after: Option<(usize, CancelToken)>,
    created: u64,
}

impl MemorySource {
    pub fn new(login: &str, page_size: usize) -> Self {
        Self {
            login: login.to_string(),
            page_size: page_size.max(1),
            inner: Mutex::new(MemoryState::default()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Build a gist owned by `owner` with the given `(filename, content)`
    /// files. Languages are guessed from the file extension.
    pub fn gist(
        id: &str,
        owner: &str,
        description: &str,
        updated_at: DateTime<Utc>,
        files: &[(&str, &str)],
    ) -> RemoteGist {
        let files = files
            .iter()
            .map(|(name, content)| {
                (
                    name.to_string(),
                    RemoteFile {
                        filename: name.to_string(),
                        language: guess_language(name).map(str::to_string),
                        raw_url: None,
                        content: Some(content.to_string()),
                    },
                )
            })
            .collect();

        RemoteGist {
            id: id.to_string(),
            description: Some(description.to_string()),
            public: true,
            owner: Some(RemoteOwner {
                login: owner.to_string(),
            }),
            files,
            comments: 0,
            created_at: updated_at,
            updated_at,
            html_url: format!("https://gist.example/{id}"),
        }
    }

    /// Add or replace a gist owned by the authenticated user.
    pub fn put_owned(&self, gist: RemoteGist) {
        let mut state = self.state();
        let gist = state.stash_contents(gist);
        match state.owned.iter_mut().find(|g| g.id == gist.id) {
            Some(slot) => *slot = gist,
            None => state.owned.push(gist),
        }
    }

    /// Add a gist owned by someone else; it is only listed once starred.
    pub fn put_foreign(&self, gist: RemoteGist) {
        let mut state = self.state();
        let gist = state.stash_contents(gist);
        state.foreign.retain(|g| g.id != gist.id);
        state.foreign.push(gist);
    }

    pub fn remove(&self, remote_id: &str) {
        let mut state = self.state();
        state.owned.retain(|g| g.id != remote_id);
        state.foreign.retain(|g| g.id != remote_id);
        state.starred.remove(remote_id);
    }

    pub fn star(&self, remote_id: &str) {
        self.state().starred.insert(remote_id.to_string());
    }

    pub fn unstar(&self, remote_id: &str) {
        self.state().starred.remove(remote_id);
    }

    /// Make every fetch of `filename` fail.
    pub fn fail_fetches_of(&self, filename: &str) {
        self.state().failing_files.insert(filename.to_string());
    }

    /// Cancel `token` once `count` more content fetches have been served.
    pub fn cancel_after_fetches(&self, count: usize, token: CancelToken) {
        let target = self.fetch_count() + count;
        self.state().cancel_after = Some((target, token));
    }

    /// Number of content fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test thread panicked mid-update.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn paginate(&self, items: Vec<RemoteGist>, page: u32) -> Page {
        let start = (page.max(1) as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(items.len());
        let next = (end < items.len()).then_some(page + 1);
        let items = items.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        Page { items, next }
    }
}

impl MemoryState {
    fn stash_contents(&mut self, mut gist: RemoteGist) -> RemoteGist {
        for file in gist.files.values_mut() {
            let url = format!("mem://{}/{}", gist.id, file.filename);
            if let Some(content) = file.content.take() {
                self.contents.insert(url.clone(), content);
            }
            file.raw_url = Some(url);
        }
        gist
    }
}

impl RemoteSource for MemorySource {
    fn login(&self) -> Result<String> {
        Ok(self.login.clone())
    }

    fn list_owned(&self, page: u32) -> Result<Page> {
        let owned = self.state().owned.clone();
        Ok(self.paginate(owned, page))
    }

    fn list_starred(&self, page: u32) -> Result<Page> {
        let starred: Vec<RemoteGist> = {
            let state = self.state();
            state
                .owned
                .iter()
                .chain(state.foreign.iter())
                .filter(|g| state.starred.contains(&g.id))
                .cloned()
                .collect()
        };
        Ok(self.paginate(starred, page))
    }

    fn fetch_file_content(&self, file: &RemoteFile) -> Result<String> {
        let served = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.state();
        if let Some((target, token)) = &state.cancel_after {
            if served >= *target {
                token.cancel();
            }
        }
        if state.failing_files.contains(&file.filename) {
            return Err(Error::ContentFetch {
                file: file.filename.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        file.raw_url
            .as_ref()
            .and_then(|url| state.contents.get(url))
            .cloned()
            .ok_or_else(|| Error::ContentFetch {
                file: file.filename.clone(),
                reason: "no such content".to_string(),
            })
    }

    fn create(&self, gist: &NewGist) -> Result<RemoteGist> {
        let id = {
            let mut state = self.state();
            state.created += 1;
            format!("created{}", state.created)
        };
        let files: Vec<(&str, &str)> = gist
            .files
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        let mut created =
            Self::gist(&id, &self.login, &gist.description, Utc::now(), &files);
        created.public = gist.public;

        self.put_owned(created.clone());
        // The create response carries content inline; drop raw urls so the
        // caller indexes it without a round trip.
        for file in created.files.values_mut() {
            file.raw_url = None;
        }
        Ok(created)
    }

    fn delete(&self, remote_id: &str) -> Result<()> {
        let exists = self.state().owned.iter().any(|g| g.id == remote_id);
        if !exists {
            return Err(Error::RemoteRequest(format!(
                "gist {remote_id} does not exist"
            )));
        }
        self.remove(remote_id);
        Ok(())
    }
}

fn guess_language(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1;
    let language = match ext.to_ascii_lowercase().as_str() {
        "rs" => "Rust",
        "py" => "Python",
        "go" => "Go",
        "js" => "JavaScript",
        "sh" => "Shell",
        "md" => "Markdown",
        "sql" => "SQL",
        _ => return None,
    };
    Some(language)
}

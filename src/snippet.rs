//! The mirrored unit and the aggregates derived from it.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::LazyLock,
};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\B#(\w[\w-]*)").expect("tag pattern is valid")
});

/// One file of a snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetFile {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A gist as mirrored in the local index.
///
/// `id` is the content-version key `remoteId::updatedAt`: any remote edit
/// produces a new `id`, so an indexed record is never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub remote_id: String,
    pub idx: u64,
    pub owner: String,
    pub description: String,
    pub public: bool,
    pub starred: bool,
    pub files: BTreeMap<String, SnippetFile>,
    pub file_count: u64,
    pub languages: Vec<String>,
    pub filenames: Vec<String>,
    pub tags: Vec<String>,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

/// Build the version id for a remote gist at a given update time.
pub fn version_id(remote_id: &str, updated_at: &DateTime<Utc>) -> String {
    format!(
        "{remote_id}::{}",
        updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    )
}

/// Extract `#word` tags from a description, in order of first appearance.
///
/// # Examples
///
/// ```
/// use gistshelf::snippet::parse_tags;
///
/// let tags = parse_tags("quicksort #algo in #rust, more #algo");
/// assert_eq!(tags, vec!["algo", "rust"]);
/// ```
pub fn parse_tags(description: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    TAG_PATTERN
        .captures_iter(description)
        .map(|cap| cap[1].to_string())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Fields shared by every way of constructing a [`Snippet`].
#[derive(Debug, Clone)]
pub struct SnippetParts {
    pub remote_id: String,
    pub owner: String,
    pub description: String,
    pub public: bool,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
}

impl Snippet {
    /// Assemble a snippet, deriving the version id, tags and file lists.
    pub fn assemble(
        parts: SnippetParts,
        idx: u64,
        starred: bool,
        files: BTreeMap<String, SnippetFile>,
    ) -> Self {
        let filenames: Vec<String> = files.keys().cloned().collect();
        let languages: Vec<String> =
            files.values().filter_map(|f| f.language.clone()).collect();
        let tags = parse_tags(&parts.description);

        Self {
            id: version_id(&parts.remote_id, &parts.updated_at),
            remote_id: parts.remote_id,
            idx,
            owner: parts.owner,
            description: parts.description,
            public: parts.public,
            starred,
            file_count: files.len() as u64,
            files,
            languages,
            filenames,
            tags,
            comment_count: parts.comment_count,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            url: parts.url,
        }
    }

    /// Concatenated content of every file, in file order.
    pub fn content(&self) -> String {
        self.files.values().map(|f| f.content.as_str()).collect()
    }
}

/// A tag and the number of snippets carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub count: u64,
}

/// Count tags across snippets, one count per snippet per tag.
///
/// Sorted by count descending, then name.
pub fn count_tags(snippets: &[Snippet]) -> Vec<Tag> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for snippet in snippets {
        let distinct: BTreeSet<&str> =
            snippet.tags.iter().map(String::as_str).collect();
        for tag in distinct {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut tags: Vec<Tag> = counts
        .into_iter()
        .map(|(name, count)| Tag {
            name: name.to_string(),
            count,
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    tags
}

/// Aggregate counts over the whole library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibrarySummary {
    pub gists: u64,
    pub files: u64,
    pub starred: u64,
    pub tags: u64,
    pub languages: u64,
}

impl LibrarySummary {
    pub fn from_snippets(snippets: &[Snippet]) -> Self {
        let tags: BTreeSet<&str> = snippets
            .iter()
            .flat_map(|s| s.tags.iter().map(String::as_str))
            .collect();
        let languages: BTreeSet<&str> = snippets
            .iter()
            .flat_map(|s| s.languages.iter().map(String::as_str))
            .collect();

        Self {
            gists: snippets.len() as u64,
            files: snippets.iter().map(|s| s.file_count).sum(),
            starred: snippets.iter().filter(|s| s.starred).count() as u64,
            tags: tags.len() as u64,
            languages: languages.len() as u64,
        }
    }
}

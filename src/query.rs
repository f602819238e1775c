//! Turn user filters into index searches.
//!
//! A [`SearchQuery`] becomes a typed [`Clause`] tree: the free-text term is
//! a scoring clause, every other filter a required equality clause. An empty
//! query lists the library newest first. A query that matches nothing is
//! retried once with the term matched by edit distance; the structured
//! filters stay required.

use std::{fmt, str::FromStr};

use crate::{
    document_index::{
        Clause,
        DocumentIndex,
        IndexField,
        Occur,
        SearchRequest,
        SortSpec,
        TermValue,
    },
    error::{Error, Result},
    projector::project,
    snippet::Snippet,
};

/// Default number of hits returned by [`search`].
pub const DEFAULT_LIMIT: usize = 100;

/// Cap on fuzzy fallback hits.
pub const FUZZY_LIMIT: usize = 10;

/// Edit distance for the fuzzy fallback.
pub const FUZZY_DISTANCE: u8 = 2;

/// Visibility filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    All,
    Public,
    Private,
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(Error::InvalidFilter(format!(
                "unknown status '{other}' (expected all, public or private)"
            ))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Public => "public",
            Self::Private => "private",
        })
    }
}

/// Filters for one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub tag: Option<String>,
    pub owner: Option<String>,
    pub language: Option<String>,
    pub starred: bool,
    pub status: Status,
    /// Sort alias, optionally prefixed with `-` to flip its direction.
    pub sort: Option<String>,
    pub limit: usize,
    /// Log the clause tree before searching.
    pub debug: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: String::new(),
            tag: None,
            owner: None,
            language: None,
            starred: false,
            status: Status::All,
            sort: None,
            limit: DEFAULT_LIMIT,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<Snippet>,
    /// False for the plain listing of the whole library.
    pub is_query: bool,
    /// Words a renderer may emphasize; they play no part in ranking.
    pub highlight_terms: Vec<String>,
    /// Whether the hits come from the fuzzy fallback.
    pub fuzzy: bool,
    /// Matching documents before the limit.
    pub total: u64,
}

/// Resolve a sort key through the alias table.
///
/// Each alias carries a default direction; a leading `-` flips it. Returns
/// `None` for unknown keys.
///
/// # Examples
///
/// ```
/// use gistshelf::document_index::IndexField;
/// use gistshelf::query::resolve_sort;
///
/// let sort = resolve_sort("-updated").unwrap();
/// assert_eq!(sort.field, IndexField::UpdatedAt);
/// assert!(sort.descending);
/// assert!(resolve_sort("colour").is_none());
/// ```
pub fn resolve_sort(key: &str) -> Option<SortSpec> {
    let key = key.trim();
    let (flip, alias) = match key.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, key),
    };
    let (field, descending) = match alias.to_ascii_lowercase().as_str() {
        "idx" => (IndexField::Idx, false),
        "created" => (IndexField::CreatedAt, false),
        "updated" => (IndexField::UpdatedAt, false),
        "starred" => (IndexField::Starred, false),
        "public" => (IndexField::Public, true),
        "private" => (IndexField::Public, false),
        "owner" => (IndexField::Owner, false),
        "description" => (IndexField::Description, false),
        "files" => (IndexField::FileCount, true),
        "comments" => (IndexField::CommentCount, true),
        _ => return None,
    };
    Some(SortSpec {
        field,
        descending: descending != flip,
    })
}

fn keyword(field: IndexField, value: &str) -> Clause {
    Clause::Term {
        field,
        value: TermValue::Text(value.to_string()),
    }
}

fn flag(field: IndexField, value: bool) -> Clause {
    Clause::Term {
        field,
        value: TermValue::Bool(value),
    }
}

/// The required clauses for every structured filter of a query.
fn filter_clauses(query: &SearchQuery) -> Vec<(Occur, Clause)> {
    let mut clauses = Vec::new();

    let keywords = [
        (IndexField::Tags, &query.tag),
        (IndexField::Languages, &query.language),
        (IndexField::Owner, &query.owner),
    ];
    for (field, value) in keywords {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        {
            clauses.push((Occur::Must, keyword(field, value)));
        }
    }
    if query.starred {
        clauses.push((Occur::Must, flag(IndexField::Starred, true)));
    }
    match query.status {
        Status::All => {}
        Status::Public => clauses.push((Occur::Must, flag(IndexField::Public, true))),
        Status::Private => {
            clauses.push((Occur::Must, flag(IndexField::Public, false)))
        }
    }

    clauses
}

/// Build the clause tree for a query, or `None` when nothing filters.
pub fn build_clause(query: &SearchQuery) -> Option<Clause> {
    let mut clauses = Vec::new();

    let term = query.term.trim();
    if !term.is_empty() {
        clauses.push((Occur::Should, Clause::Text(term.to_string())));
    }
    clauses.extend(filter_clauses(query));

    (!clauses.is_empty()).then_some(Clause::Bool(clauses))
}

/// The fallback clause tree: the term matched by edit distance, every
/// structured filter still required. `None` without a term.
pub fn build_fuzzy_clause(query: &SearchQuery) -> Option<Clause> {
    let term = query.term.trim();
    if term.is_empty() {
        return None;
    }

    let mut clauses = vec![(
        Occur::Must,
        Clause::Fuzzy {
            text: term.to_string(),
            distance: FUZZY_DISTANCE,
        },
    )];
    clauses.extend(filter_clauses(query));
    Some(Clause::Bool(clauses))
}

/// Words to emphasize in rendered hits.
pub fn highlight_terms(query: &SearchQuery) -> Vec<String> {
    let mut terms: Vec<String> =
        query.term.split_whitespace().map(str::to_string).collect();
    for value in [&query.tag, &query.language, &query.owner]
        .into_iter()
        .flatten()
    {
        if !value.trim().is_empty() {
            terms.push(value.trim().to_string());
        }
    }
    terms
}

/// Run a query, falling back to fuzzy matching when nothing matches.
pub fn search<I: DocumentIndex + ?Sized>(
    index: &I,
    query: &SearchQuery,
) -> Result<SearchOutcome> {
    let highlight_terms = highlight_terms(query);

    let Some(clause) = build_clause(query) else {
        let request = SearchRequest {
            clause: Clause::All,
            sort: Some(SortSpec {
                field: IndexField::UpdatedAt,
                descending: true,
            }),
            limit: query.limit,
        };
        if query.debug {
            tracing::info!(?request, "listing");
        }
        let found = index.search(&request)?;
        return Ok(SearchOutcome {
            hits: found.hits.iter().map(project).collect::<Result<_>>()?,
            is_query: false,
            highlight_terms,
            fuzzy: false,
            total: found.total,
        });
    };

    let sort = query.sort.as_deref().and_then(|key| {
        let resolved = resolve_sort(key);
        if resolved.is_none() {
            tracing::warn!(key, "ignoring unknown sort key");
        }
        resolved
    });
    let request = SearchRequest {
        clause,
        sort,
        limit: query.limit,
    };
    if query.debug {
        tracing::info!(clause = ?request.clause, sort = ?request.sort, "query");
    }

    let found = index.search(&request)?;
    if found.total > 0 {
        return Ok(SearchOutcome {
            hits: found.hits.iter().map(project).collect::<Result<_>>()?,
            is_query: true,
            highlight_terms,
            fuzzy: false,
            total: found.total,
        });
    }

    let Some(clause) = build_fuzzy_clause(query) else {
        return Ok(SearchOutcome {
            is_query: true,
            highlight_terms,
            ..Default::default()
        });
    };

    let request = SearchRequest {
        clause,
        sort: None,
        limit: FUZZY_LIMIT.min(query.limit),
    };
    if query.debug {
        tracing::info!(clause = ?request.clause, "fuzzy fallback");
    }
    let found = index.search(&request)?;
    tracing::debug!(hits = found.hits.len(), "fuzzy fallback");

    Ok(SearchOutcome {
        hits: found.hits.iter().map(project).collect::<Result<_>>()?,
        is_query: true,
        highlight_terms,
        fuzzy: true,
        total: found.total,
    })
}

/// Every indexed snippet, in idx order.
pub fn all_snippets<I: DocumentIndex + ?Sized>(index: &I) -> Result<Vec<Snippet>> {
    let count = index.doc_count()?;
    let request = SearchRequest {
        clause: Clause::All,
        sort: Some(SortSpec {
            field: IndexField::Idx,
            descending: false,
        }),
        limit: count as usize,
    };
    index.search(&request)?.hits.iter().map(project).collect()
}

/// The snippet with the given idx, if any.
pub fn find_by_idx<I: DocumentIndex + ?Sized>(
    index: &I,
    idx: u64,
) -> Result<Option<Snippet>> {
    let request = SearchRequest {
        clause: Clause::Term {
            field: IndexField::Idx,
            value: TermValue::U64(idx),
        },
        sort: None,
        limit: 1,
    };
    index.search(&request)?.hits.first().map(project).transpose()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{snippet::tests::sample, tantivy_index::SearchIndex};

    fn library() -> SearchIndex {
        let mut index = SearchIndex::open_in_ram().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let mut sort = sample("g1", 0, "quicksort implementation #algo");
        sort.updated_at = base + Duration::days(1);
        let mut search = sample("g2", 1, "binary search #algo #rust");
        search.updated_at = base + Duration::days(3);
        search.starred = true;
        let mut shell = sample("g3", 2, "backup script #ops");
        shell.updated_at = base + Duration::days(2);
        shell.public = false;
        shell.owner = "hubot".into();

        for snippet in [sort, search, shell] {
            index.index(snippet).unwrap();
        }
        index
    }

    fn remote_ids(outcome: &SearchOutcome) -> Vec<&str> {
        outcome.hits.iter().map(|s| s.remote_id.as_str()).collect()
    }

    #[test]
    fn empty_query_lists_newest_first() {
        let index = library();
        let outcome = search(&index, &SearchQuery::default()).unwrap();

        assert!(!outcome.is_query);
        assert_eq!(remote_ids(&outcome), vec!["g2", "g3", "g1"]);
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn listing_respects_limit() {
        let index = library();
        let query = SearchQuery {
            limit: 2,
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();
        assert_eq!(remote_ids(&outcome), vec!["g2", "g3"]);
        assert_eq!(outcome.total, 3);
    }

    #[test]
    fn tag_filter_is_exact() {
        let index = library();
        let query = SearchQuery {
            tag: Some("algo".into()),
            sort: Some("idx".into()),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();

        assert!(outcome.is_query);
        assert!(!outcome.fuzzy);
        assert_eq!(remote_ids(&outcome), vec!["g1", "g2"]);
        assert_eq!(outcome.highlight_terms, vec!["algo"]);
    }

    #[test]
    fn filters_combine() {
        let index = library();
        let query = SearchQuery {
            tag: Some("algo".into()),
            starred: true,
            ..Default::default()
        };
        assert_eq!(remote_ids(&search(&index, &query).unwrap()), vec!["g2"]);

        let query = SearchQuery {
            status: Status::Private,
            ..Default::default()
        };
        assert_eq!(remote_ids(&search(&index, &query).unwrap()), vec!["g3"]);

        let query = SearchQuery {
            owner: Some("HUBOT".into()),
            ..Default::default()
        };
        assert_eq!(remote_ids(&search(&index, &query).unwrap()), vec!["g3"]);
    }

    #[test]
    fn term_ranks_matches() {
        let index = library();
        let query = SearchQuery {
            term: "binary".into(),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();
        assert_eq!(remote_ids(&outcome), vec!["g2"]);
        assert_eq!(outcome.highlight_terms, vec!["binary"]);
    }

    #[test]
    fn misspelled_term_falls_back_to_fuzzy() {
        let index = library();
        let query = SearchQuery {
            term: "quiksort".into(),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();

        assert!(outcome.fuzzy);
        assert_eq!(remote_ids(&outcome), vec!["g1"]);
    }

    #[test]
    fn no_term_means_no_fallback() {
        let index = library();
        let query = SearchQuery {
            tag: Some("missing".into()),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();

        assert!(outcome.hits.is_empty());
        assert!(!outcome.fuzzy);
    }

    #[test]
    fn fuzzy_fallback_keeps_filters() {
        let index = library();
        let query = SearchQuery {
            term: "quiksort".into(),
            tag: Some("missing".into()),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();
        assert!(outcome.hits.is_empty());

        let query = SearchQuery {
            term: "quiksort".into(),
            tag: Some("algo".into()),
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();
        // The tag alone matches, so the misspelled term only affects ranking.
        assert!(!outcome.fuzzy);
        assert_eq!(outcome.hits.len(), 2);
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let index = library();
        let query = SearchQuery {
            term: "quicksort".into(),
            limit: 0,
            ..Default::default()
        };
        let outcome = search(&index, &query).unwrap();

        assert!(outcome.hits.is_empty());
        assert!(!outcome.fuzzy);
        assert_eq!(outcome.total, 1);

        let query = SearchQuery {
            term: "quiksort".into(),
            limit: 0,
            ..Default::default()
        };
        assert!(search(&index, &query).unwrap().hits.is_empty());
    }

    #[test]
    fn sort_aliases_and_flip() {
        let index = library();
        let query = SearchQuery {
            tag: Some("algo".into()),
            sort: Some("-idx".into()),
            ..Default::default()
        };
        assert_eq!(remote_ids(&search(&index, &query).unwrap()), vec!["g2", "g1"]);

        let private_first = resolve_sort("private").unwrap();
        assert_eq!(private_first.field, IndexField::Public);
        assert!(!private_first.descending);
        assert!(resolve_sort("-public").is_some_and(|s| !s.descending));
    }

    #[test]
    fn unknown_sort_is_ignored() {
        let index = library();
        let query = SearchQuery {
            tag: Some("algo".into()),
            sort: Some("colour".into()),
            ..Default::default()
        };
        assert_eq!(search(&index, &query).unwrap().hits.len(), 2);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("PUBLIC".parse::<Status>().unwrap(), Status::Public);
        assert_eq!("private".parse::<Status>().unwrap(), Status::Private);
        assert!(matches!(
            "secret".parse::<Status>(),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn lookup_helpers() {
        let index = library();
        let all = all_snippets(&index).unwrap();
        let idxs: Vec<u64> = all.iter().map(|s| s.idx).collect();
        assert_eq!(idxs, vec![0, 1, 2]);

        assert_eq!(find_by_idx(&index, 2).unwrap().unwrap().remote_id, "g3");
        assert!(find_by_idx(&index, 9).unwrap().is_none());
    }
}

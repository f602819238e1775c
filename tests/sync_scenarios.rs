use chrono::{DateTime, Duration, TimeZone, Utc};
use gistshelf::{
    DataDir,
    Library,
    MemorySource,
    document_index::{DocumentIndex, FacetField},
    query::{SearchQuery, Status},
    sync::{CancelToken, SyncOptions},
};

fn t(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::days(day)
}

fn open(tmp: &tempfile::TempDir) -> Result<Library, Box<dyn std::error::Error>> {
    Ok(Library::open(DataDir::resolve(Some(tmp.path()))?)?)
}

fn sync(library: &mut Library, source: &MemorySource) -> gistshelf::Result<()> {
    library
        .sync(source, &SyncOptions::default(), &CancelToken::new())
        .map(|_| ())
}

#[test]
fn add_then_edit_keeps_numbering() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let mut library = open(&tmp)?;
    let source = MemorySource::new("octocat", 100);

    source.put_owned(MemorySource::gist("G1", "octocat", "first", t(1), &[("one.rs", "1")]));
    sync(&mut library, &source)?;
    assert_eq!(library.lookup(0)?.remote_id, "G1");
    assert_eq!(library.index().doc_count()?, 1);

    source.put_owned(MemorySource::gist("G2", "octocat", "second", t(2), &[("two.rs", "2")]));
    sync(&mut library, &source)?;
    assert_eq!(library.lookup(0)?.remote_id, "G1");
    assert_eq!(library.lookup(1)?.remote_id, "G2");
    assert_eq!(library.index().doc_count()?, 2);

    let old_id = library.lookup(0)?.id;
    source.put_owned(MemorySource::gist("G1", "octocat", "first, edited", t(3), &[("one.rs", "1")]));
    sync(&mut library, &source)?;

    let edited = library.lookup(0)?;
    assert_eq!(edited.remote_id, "G1");
    assert_ne!(edited.id, old_id);
    assert_eq!(edited.description, "first, edited");
    assert_eq!(library.index().doc_count()?, 2);

    let all = gistshelf::query::all_snippets(library.index())?;
    assert!(all.iter().all(|s| s.id != old_id));
    Ok(())
}

#[test]
fn tag_filter_returns_tagged_newest_first() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let mut library = open(&tmp)?;
    let source = MemorySource::new("octocat", 4);

    for i in 0..10 {
        let description = if i % 3 == 0 && i > 0 {
            format!("gist {i} #todo")
        } else {
            format!("gist {i}")
        };
        source.put_owned(MemorySource::gist(
            &format!("g{i}"),
            "octocat",
            &description,
            t(i),
            &[("f.txt", "body")],
        ));
    }
    sync(&mut library, &source)?;

    let query = SearchQuery {
        tag: Some("todo".into()),
        status: Status::All,
        limit: 10,
        ..Default::default()
    };
    let outcome = library.search(&query)?;
    let ids: Vec<&str> = outcome.hits.iter().map(|s| s.remote_id.as_str()).collect();
    assert_eq!(ids, vec!["g9", "g6", "g3"]);

    let query = SearchQuery {
        tag: Some("todo".into()),
        sort: Some("-updated".into()),
        limit: 10,
        ..Default::default()
    };
    let outcome = library.search(&query)?;
    let ids: Vec<&str> = outcome.hits.iter().map(|s| s.remote_id.as_str()).collect();
    assert_eq!(ids, vec!["g9", "g6", "g3"]);

    let tags = library.summarize(FacetField::Tags)?;
    assert_eq!(tags, vec![("todo".to_string(), 3)]);
    Ok(())
}

#[test]
fn unchanged_remote_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let mut library = open(&tmp)?;
    let source = MemorySource::new("octocat", 2);
    for i in 0..5 {
        source.put_owned(MemorySource::gist(
            &format!("g{i}"),
            "octocat",
            "#x",
            t(i),
            &[("a.py", "pass")],
        ));
    }
    source.put_foreign(MemorySource::gist("other", "hubot", "#y", t(9), &[("b.go", "package b")]));
    source.star("other");

    sync(&mut library, &source)?;
    let before = library.summary()?;
    let fetches = source.fetch_count();

    let report = library.sync(&source, &SyncOptions::default(), &CancelToken::new())?;
    assert_eq!(report.inserted + report.deleted + report.restarred, 0);
    assert_eq!(report.summary, before);
    assert_eq!(source.fetch_count(), fetches);
    assert_eq!(before.gists, 6);
    assert_eq!(before.starred, 1);
    Ok(())
}

#[test]
fn rebuild_replaces_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let mut library = open(&tmp)?;
    let source = MemorySource::new("octocat", 10);
    source.put_owned(MemorySource::gist("a", "octocat", "#old", t(1), &[]));
    sync(&mut library, &source)?;

    source.remove("a");
    source.put_owned(MemorySource::gist("b", "octocat", "#new", t(2), &[]));
    let options = SyncOptions {
        rebuild: true,
        ..Default::default()
    };
    let report = library.sync(&source, &options, &CancelToken::new())?;
    assert_eq!(report.deleted, 1);
    assert_eq!(report.inserted, 1);

    let tags = library.cached_tags()?;
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "new");
    assert_eq!(library.lookup(0)?.remote_id, "b");
    Ok(())
}

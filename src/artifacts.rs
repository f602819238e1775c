//! JSON snapshots written after every sync.
//!
//! `library.json` holds the full snippet list and `tags.json` the tag
//! counts. Both are derived from the index and can be rebuilt at any time.

use std::{fs, io, path::Path};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    data_dir::DataDir,
    error::{Error, Result},
    snippet::{Snippet, Tag, count_tags},
};

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    // Write next to the target and rename, so readers never see a partial
    // file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T> {
    let raw = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            kind,
            name: path.display().to_string(),
        },
        _ => Error::Io(e),
    })?;
    Ok(serde_json::from_slice(&raw)?)
}

fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Persist the library dump and its tag counts.
pub fn write(data_dir: &DataDir, snippets: &[Snippet]) -> Result<()> {
    write_json(&data_dir.library_file(), snippets)?;
    write_json(&data_dir.tags_file(), &count_tags(snippets))?;
    tracing::debug!(snippets = snippets.len(), "wrote library artifacts");
    Ok(())
}

pub fn read_library(data_dir: &DataDir) -> Result<Vec<Snippet>> {
    read_json(&data_dir.library_file(), "library")
}

pub fn read_tags(data_dir: &DataDir) -> Result<Vec<Tag>> {
    read_json(&data_dir.tags_file(), "tag list")
}

/// Delete both artifacts; missing files are fine.
pub fn clear(data_dir: &DataDir) -> Result<()> {
    remove(&data_dir.library_file())?;
    remove(&data_dir.tags_file())
}

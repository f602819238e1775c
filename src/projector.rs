//! Rebuild typed snippets from flattened index hits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    document_index::RawHit,
    error::{Error, Result},
    snippet::{Snippet, SnippetFile},
};

const FILES_PREFIX: &str = "files.";

/// Convert a flattened hit into a [`Snippet`].
///
/// File entries are keyed `files.<filename>.<attribute>`; filenames may
/// themselves contain dots, so the attribute is everything after the last
/// dot and the filename everything between the prefix and that dot.
pub fn project(hit: &RawHit) -> Result<Snippet> {
    let fields = &hit.fields;
    let id = fields
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let malformed = |field: &str| Error::MalformedRecord {
        id: id.clone(),
        field: field.to_string(),
    };

    let text = |key: &str| -> Result<String> {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed(key))
    };
    let number = |key: &str| -> Result<u64> {
        fields
            .get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed(key))
    };
    let flag = |key: &str| -> Result<bool> {
        fields
            .get(key)
            .and_then(Value::as_bool)
            .ok_or_else(|| malformed(key))
    };
    // Missing lists are empty; present ones must hold only strings.
    let list = |key: &str| -> Result<Vec<String>> {
        match fields.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(|| malformed(key)))
                .collect(),
            Some(_) => Err(malformed(key)),
        }
    };
    let time = |key: &str| -> Result<DateTime<Utc>> {
        let raw = text(key)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| malformed(key))
    };

    let mut files: BTreeMap<String, SnippetFile> = BTreeMap::new();
    let mut languages: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in fields.range(FILES_PREFIX.to_string()..) {
        let Some(path) = key.strip_prefix(FILES_PREFIX) else {
            break;
        };
        let Some((filename, attribute)) = path.rsplit_once('.') else {
            return Err(malformed(key));
        };
        match attribute {
            "content" => {
                let content = value.as_str().ok_or_else(|| malformed(key))?;
                files
                    .entry(filename.to_string())
                    .or_insert_with(|| SnippetFile {
                        content: String::new(),
                        language: None,
                    })
                    .content = content.to_string();
            }
            "language" => match value {
                Value::Null => {}
                Value::String(language) => {
                    languages.insert(filename.to_string(), language.clone());
                }
                _ => return Err(malformed(key)),
            },
            _ => {}
        }
    }
    for (filename, language) in languages {
        // A language without content means the file entry itself is broken.
        let file = files
            .get_mut(&filename)
            .ok_or_else(|| malformed(&format!("files.{filename}.content")))?;
        file.language = Some(language);
    }

    if id.is_empty() {
        return Err(malformed("id"));
    }

    Ok(Snippet {
        id: id.clone(),
        remote_id: text("remoteId")?,
        idx: number("idx")?,
        owner: text("owner")?,
        description: text("description")?,
        public: flag("public")?,
        starred: flag("starred")?,
        file_count: number("fileCount")?,
        languages: list("languages")?,
        filenames: list("filenames")?,
        tags: list("tags")?,
        comment_count: number("commentCount")?,
        created_at: time("createdAt")?,
        updated_at: time("updatedAt")?,
        url: text("url")?,
        files,
    })
}

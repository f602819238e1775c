use std::{
    fs::File,
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

/// Exclusive advisory lock on the data directory, released on drop.
#[derive(Debug)]
pub struct LibraryLock {
    file: File,
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The GISTSHELF_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/gistshelf/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("GISTSHELF_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("gistshelf")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn library_file(&self) -> PathBuf {
        self.root.join("library.json")
    }

    pub fn tags_file(&self) -> PathBuf {
        self.root.join("tags.json")
    }

    pub fn tantivy_dir(&self) -> Result<PathBuf> {
        let path = self.root.join("tantivy");
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::DataDir(path.clone()))?;
        Ok(path)
    }

    /// Take the library lock without blocking.
    ///
    /// Two syncs against the same index must never overlap; callers hold
    /// the returned guard for the duration of the operation.
    pub fn lock(&self) -> Result<LibraryLock> {
        let path = self.root.join("gistshelf.lock");
        let file = File::create(&path)?;
        file.try_lock_exclusive().map_err(|_| Error::Locked(path))?;
        Ok(LibraryLock { file })
    }

    /// Remove everything stored under the data directory (logout).
    pub fn wipe(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.config_file(), tmp.path().join("config.json"));
        assert_eq!(dir.library_file(), tmp.path().join("library.json"));
        assert_eq!(dir.tags_file(), tmp.path().join("tags.json"));
    }

    #[test]
    fn tantivy_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();
        let tantivy = dir.tantivy_dir().unwrap();

        assert!(tantivy.exists());
        assert_eq!(tantivy, tmp.path().join("tantivy"));
    }

    #[test]
    fn second_lock_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        let guard = dir.lock().unwrap();
        assert!(matches!(dir.lock(), Err(Error::Locked(_))));
        drop(guard);
        assert!(dir.lock().is_ok());
    }

    #[test]
    fn wipe_removes_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("lib");
        let dir = DataDir::resolve(Some(&root)).unwrap();
        std::fs::write(dir.config_file(), "{}").unwrap();

        dir.wipe().unwrap();
        assert!(!root.exists());
    }
}

use crate::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A regular file found under the gallery root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalkedPath {
    /// Root-relative path, always `/`-separated.
    pub relative: String,
    pub absolute: PathBuf,
}

/// Read-only traversal of a gallery root. Every call to [`PathWalker::walk`]
/// starts a fresh traversal.
#[derive(Debug, Clone)]
pub struct PathWalker {
    root: PathBuf,
    excluded: Option<PathBuf>,
}

impl PathWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            excluded: None,
        }
    }

    /// Prune a directory (and everything below it) from the walk.
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded = Some(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield every regular file under the root. Symlinks are neither
    /// yielded nor followed. Directories that vanish mid-walk are skipped;
    /// any other traversal error is returned and should end the pass.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkedPath, Error>> + '_ {
        let excluded = self.excluded.clone();
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !is_excluded(entry, excluded.as_deref()))
            .filter_map(move |result| self.classify(result).transpose())
    }

    fn classify(&self, result: walkdir::Result<DirEntry>) -> Result<Option<WalkedPath>, Error> {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                let vanished = err
                    .io_error()
                    .is_some_and(|e| e.kind() == io::ErrorKind::NotFound);
                if vanished && err.depth() > 0 {
                    debug!("{} vanished during walk, skipping", path.display());
                    return Ok(None);
                }
                return Err(Error::io(path, io::Error::from(err)));
            }
        };

        if !entry.file_type().is_file() {
            return Ok(None);
        }

        let relative = match entry.path().strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) => {
                return Err(Error::Other(format!(
                    "{} is outside of {}",
                    entry.path().display(),
                    self.root.display()
                )))
            }
        };

        let mut parts: Vec<&str> = Vec::new();
        for component in relative.components() {
            match component.as_os_str().to_str() {
                Some(part) => parts.push(part),
                None => {
                    warn!("Skipping non UTF-8 path {}", entry.path().display());
                    return Ok(None);
                }
            }
        }

        Ok(Some(WalkedPath {
            relative: parts.join("/"),
            absolute: entry.path().to_path_buf(),
        }))
    }
}

fn is_excluded(entry: &DirEntry, excluded: Option<&Path>) -> bool {
    match excluded {
        Some(dir) => entry.file_type().is_dir() && entry.path() == dir,
        None => false,
    }
}

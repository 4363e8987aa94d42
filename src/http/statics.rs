//! Static resource resolution
//!
//! The set of servable files is the listing of the static root taken once
//! when the server is built. Files added later are not served; files removed
//! later resolve to not-found.

use super::{latin1, Error, Result};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File served for `/`
pub const INDEX_FILE: &str = "index.html";

/// Maps a request path to the content to serve
///
/// Every failure is reported as `Error::NotFound`.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<String>;
}

/// Allow-list of regular files in a static root
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    allowed: HashSet<String>,
}

impl StaticFiles {
    /// Snapshot the regular files directly inside `root`
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let file_error = |source| Error::File {
            path: root.clone(),
            source,
        };

        let mut allowed = HashSet::new();
        for entry in std::fs::read_dir(&root).map_err(file_error)? {
            let entry = entry.map_err(file_error)?;
            if !entry.file_type().map_err(file_error)?.is_file() {
                continue;
            }
            // Names that are not valid UTF-8 can never match a request path
            if let Ok(name) = entry.file_name().into_string() {
                allowed.insert(name);
            }
        }

        debug!(root = %root.display(), files = allowed.len(), "Static allow-list loaded");
        Ok(StaticFiles { root, allowed })
    }

    /// Check if a file name is in the allow-list
    pub fn contains(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    /// Get the number of servable files
    pub fn len(&self) -> usize {
        self.allowed.len()
    }
}

/// Map a request path to a file name in the static root
///
/// `/` maps to `index.html`; otherwise one leading `/` and any query string
/// are removed. Names that are not a single normal path component are
/// rejected.
pub fn resource_name(path: &str) -> Result<&str> {
    let path = path.split('?').next().unwrap_or_default();
    let name = match path {
        "/" => INDEX_FILE,
        p => p.strip_prefix('/').unwrap_or(p),
    };

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == name && !name.contains('\\') => Ok(name),
        _ => Err(Error::NotFound(path.to_string())),
    }
}

impl ResourceResolver for StaticFiles {
    fn resolve(&self, path: &str) -> Result<String> {
        let name = resource_name(path)?;

        if !self.allowed.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }

        match std::fs::read(self.root.join(name)) {
            Ok(content) => Ok(latin1::decode(&content)),
            Err(e) => {
                debug!(name, error = %e, "Allowed file is unreadable");
                Err(Error::NotFound(name.to_string()))
            }
        }
    }
}

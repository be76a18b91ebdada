//! Versioned config repository.
//!
//! Each device owns a directory `<repository>/<id>/` holding version files
//! `<id>.<N>` with strictly increasing commit ids, a `<id>.last` shortcut
//! naming the newest id, and transiently a `<id>.tmp` while a commit is in
//! progress.
//!
//! ```text
//! repository/
//! └── r1/
//!     ├── r1.0
//!     ├── r1.1
//!     ├── r1.2
//!     └── r1.last      "2"
//! ```

mod commit;

pub use commit::{prune_versions, save_new_config};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::StoreError;

/// Path prefix of one device's version files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPrefix {
    dir: PathBuf,
    /// File name stem including the trailing dot, e.g. `r1.`
    stem: String,
}

/// A version file and its commit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: u64,
    pub path: PathBuf,
}

impl VersionPrefix {
    pub fn new(dir: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            dir: dir.into(),
            stem: format!("{name}."),
        }
    }

    /// `<repository>/<device_id>/<device_id>.`
    pub fn for_device(repository: &Path, device_id: &str) -> Self {
        Self::new(repository.join(device_id), device_id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn version_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, id))
    }

    pub fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!("{}tmp", self.stem))
    }

    pub fn last_path(&self) -> PathBuf {
        self.dir.join(format!("{}last", self.stem))
    }

    /// Create the device directory if missing.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io("mkdir", &self.dir, e))
    }

    /// Commit id encoded in `file_name`, if it is a version file of this
    /// prefix. Only all-digit suffixes count.
    pub fn commit_id(&self, file_name: &str) -> Result<Option<u64>, StoreError> {
        let Some(suffix) = file_name.strip_prefix(&self.stem) else {
            return Ok(None);
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        suffix
            .parse()
            .map(Some)
            .map_err(|_| StoreError::InvalidCommitId {
                name: file_name.to_string(),
            })
    }
}

/// All versions under `prefix`, oldest first.
///
/// A missing device directory is an empty history. Two files with the same
/// id (`r1.7` and `r1.07`) are rejected as corruption.
pub fn list_versions(prefix: &VersionPrefix) -> Result<Vec<Version>, StoreError> {
    let entries = match fs::read_dir(&prefix.dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(StoreError::io("read dir", &prefix.dir, e)),
    };

    let mut found: Vec<(u64, String)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io("read dir", &prefix.dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(id) = prefix.commit_id(name)? {
            found.push((id, name.to_string()));
        }
    }

    found.sort();
    if let Some(pair) = found.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(StoreError::DuplicateCommitId {
            id: pair[0].0,
            first: pair[0].1.clone(),
            second: pair[1].1.clone(),
        });
    }

    Ok(found
        .into_iter()
        .map(|(id, name)| Version {
            id,
            path: prefix.dir.join(name),
        })
        .collect())
}

/// Newest version under `prefix`, if any.
///
/// A valid shortcut pointing at an existing file is trusted without
/// scanning the directory. Otherwise the directory is scanned.
pub fn find_last_config(prefix: &VersionPrefix) -> Result<Option<Version>, StoreError> {
    if let Some(version) = read_shortcut(prefix) {
        return Ok(Some(version));
    }
    Ok(list_versions(prefix)?.pop())
}

fn read_shortcut(prefix: &VersionPrefix) -> Option<Version> {
    let last = prefix.last_path();
    let content = match fs::read_to_string(&last) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("store: shortcut {}: {}", last.display(), e);
            }
            return None;
        }
    };

    let id = match content.trim().parse::<u64>() {
        Ok(id) => id,
        Err(_) => {
            debug!("store: shortcut {}: bad id '{}'", last.display(), content.trim());
            return None;
        }
    };

    let path = prefix.version_path(id);
    if !path.is_file() {
        debug!("store: shortcut {} points to missing {}", last.display(), path.display());
        return None;
    }
    Some(Version { id, path })
}

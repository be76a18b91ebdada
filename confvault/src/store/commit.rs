//! Atomic commit of a new version.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{VersionPrefix, find_last_config, list_versions};
use crate::error::StoreError;

/// Removes the temp file unless the commit got far enough to rename it.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("store: removing {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Commit a new version of one device's configuration.
///
/// `write` fills the new version through a buffered writer. On success the
/// path of the newest version is returned; with `changes_only` set and
/// content identical to the previous version, that previous path is
/// returned and nothing is committed. After a commit only the `max_files`
/// newest versions are kept (`0` keeps all).
///
/// Concurrent commits for one prefix are refused: the temp file is
/// created exclusively and its presence fails the second writer.
pub fn save_new_config<F>(
    prefix: &VersionPrefix,
    max_files: usize,
    changes_only: bool,
    write: F,
) -> Result<PathBuf, StoreError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    prefix.ensure_dir()?;

    let tmp = prefix.tmp_path();
    let file = match File::options().write(true).create_new(true).open(&tmp) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(StoreError::TempExists { path: tmp });
        }
        Err(e) => return Err(StoreError::io("create", &tmp, e)),
    };
    let mut guard = TempGuard::new(tmp.clone());

    let mut writer = BufWriter::new(file);
    let written = write(&mut writer).and_then(|()| writer.flush());
    if let Err(source) = written {
        return Err(StoreError::Write { path: tmp, source });
    }
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(|e| StoreError::io("sync", &tmp, e))?;
    drop(file);

    let previous = find_last_config(prefix)?;

    if changes_only {
        if let Some(prev) = &previous {
            match files_equal(&prev.path, &tmp) {
                Ok(true) => {
                    debug!("store: {} unchanged", prev.path.display());
                    return Ok(prev.path.clone());
                }
                Ok(false) => {}
                Err(e) => warn!(
                    "store: comparing {} to {}: {}; committing anyway",
                    prev.path.display(),
                    tmp.display(),
                    e
                ),
            }
        }
    }

    let new_id = previous.as_ref().map_or(0, |v| v.id + 1);
    let new_path = prefix.version_path(new_id);
    if fs::symlink_metadata(&new_path).is_ok() {
        return Err(StoreError::VersionExists { path: new_path });
    }

    fs::rename(&tmp, &new_path).map_err(|e| StoreError::io("rename", &tmp, e))?;
    guard.disarm();

    let last = prefix.last_path();
    if let Err(e) = fs::write(&last, new_id.to_string()) {
        // A stale shortcut would hide this commit; scanning is always correct.
        warn!("store: writing shortcut {}: {}", last.display(), e);
        if let Err(e) = fs::remove_file(&last) {
            warn!("store: removing shortcut {}: {}", last.display(), e);
        }
    }

    info!("store: committed {}", new_path.display());

    if let Err(e) = prune_versions(prefix, max_files) {
        warn!("store: pruning {}: {}", prefix.dir().display(), e);
    }

    Ok(new_path)
}

/// Delete the oldest versions so that at most `max_files` remain.
///
/// `0` disables pruning. Returns how many files were removed.
pub fn prune_versions(prefix: &VersionPrefix, max_files: usize) -> Result<usize, StoreError> {
    if max_files == 0 {
        return Ok(0);
    }

    let versions = list_versions(prefix)?;
    if versions.len() <= max_files {
        return Ok(0);
    }

    let excess = versions.len() - max_files;
    let mut removed = 0;
    for version in &versions[..excess] {
        match fs::remove_file(&version.path) {
            Ok(()) => {
                debug!("store: pruned {}", version.path.display());
                removed += 1;
            }
            Err(e) => warn!("store: pruning {}: {}", version.path.display(), e),
        }
    }
    Ok(removed)
}

/// Byte-wise comparison, length first.
fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut ra = BufReader::new(File::open(a)?);
    let mut rb = BufReader::new(File::open(b)?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let na = fill(&mut ra, &mut buf_a)?;
        let nb = fill(&mut rb, &mut buf_b)?;
        if na != nb || buf_a[..na] != buf_b[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

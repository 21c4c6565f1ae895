use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use super::errors::ResultsCacheError;
use super::files::{classify, EntryFile};
use super::id::CacheId;

#[derive(Debug, Clone)]
pub(crate) struct ScannedFile {
    pub(crate) path: PathBuf,
    pub(crate) size: u64,
    /// `None` when the platform could not report an access time.
    pub(crate) accessed: Option<SystemTime>,
    pub(crate) modified: Option<SystemTime>,
}

#[derive(Debug, Default)]
pub(crate) struct ScannedEntry {
    pub(crate) meta: Option<ScannedFile>,
    pub(crate) chunks: Vec<(usize, ScannedFile)>,
}

impl ScannedEntry {
    /// Most recent access across the sidecar and every chunk.
    pub(crate) fn last_access(&self) -> Option<SystemTime> {
        self.meta
            .iter()
            .chain(self.chunks.iter().map(|(_, file)| file))
            .filter_map(|file| file.accessed)
            .max()
    }

    pub(crate) fn files(&self) -> impl Iterator<Item = &ScannedFile> {
        self.chunks.iter().map(|(_, file)| file).chain(self.meta.iter())
    }

    pub(crate) fn size_bytes(&self) -> u64 {
        self.files().map(|file| file.size).sum()
    }
}

#[derive(Debug, Default)]
pub(crate) struct DirectoryScan {
    pub(crate) entries: BTreeMap<CacheId, ScannedEntry>,
    pub(crate) temps: Vec<ScannedFile>,
    /// Names that do not belong to the cache, plus files that could not be
    /// inspected.
    pub(crate) skipped: Vec<PathBuf>,
}

/// Group every file in the cache directory by the entry it belongs to.
///
/// Foreign or unreadable entries are logged and listed in `skipped`; only
/// a failure to list the directory itself is an error.
pub(crate) fn scan_directory(dir: &Path) -> Result<DirectoryScan, ResultsCacheError> {
    let mut scan = DirectoryScan::default();
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(scan),
        Err(err) => {
            return Err(ResultsCacheError::directory(
                dir,
                format!("failed to list directory: {err}"),
            ))
        }
    };

    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "failed to read results cache directory entry");
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name();
        let Some(kind) = name.to_str().and_then(classify) else {
            warn!(path = %path.display(), "unexpected entry in results cache directory");
            scan.skipped.push(path);
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                warn!(path = %path.display(), "results cache entry is not a regular file");
                scan.skipped.push(path);
                continue;
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to stat results cache file");
                scan.skipped.push(path);
                continue;
            }
        };
        let accessed = metadata.accessed().ok();
        if accessed.is_none() {
            warn!(path = %path.display(), "cannot determine access time of results cache file");
        }
        let file = ScannedFile {
            path,
            size: metadata.len(),
            accessed,
            modified: metadata.modified().ok(),
        };
        match kind {
            EntryFile::Meta { id } => scan.entries.entry(id).or_default().meta = Some(file),
            EntryFile::Chunk { id, index } => {
                scan.entries.entry(id).or_default().chunks.push((index, file));
            }
            EntryFile::Temp => scan.temps.push(file),
        }
    }

    for entry in scan.entries.values_mut() {
        entry.chunks.sort_by_key(|(index, _)| *index);
    }
    Ok(scan)
}

/// Every file on disk that belongs to `id`, whatever its sidecar says.
///
/// Unlike [`scan_directory`] this is quiet about foreign names: they are
/// simply not part of the entry.
pub(crate) fn scan_entry(dir: &Path, id: &CacheId) -> Result<ScannedEntry, ResultsCacheError> {
    let mut found = ScannedEntry::default();
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(err) => {
            return Err(ResultsCacheError::directory(
                dir,
                format!("failed to list directory: {err}"),
            ))
        }
    };

    for entry in read_dir.flatten() {
        let kind = entry.file_name().to_str().and_then(classify);
        let belongs = match &kind {
            Some(EntryFile::Meta { id: owner } | EntryFile::Chunk { id: owner, .. }) => {
                owner == id
            }
            _ => false,
        };
        if !belongs {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let file = ScannedFile {
            path: entry.path(),
            size: metadata.len(),
            accessed: metadata.accessed().ok(),
            modified: metadata.modified().ok(),
        };
        match kind {
            Some(EntryFile::Chunk { index, .. }) => found.chunks.push((index, file)),
            Some(EntryFile::Meta { .. }) => found.meta = Some(file),
            Some(EntryFile::Temp) | None => {}
        }
    }
    found.chunks.sort_by_key(|(index, _)| *index);
    Ok(found)
}

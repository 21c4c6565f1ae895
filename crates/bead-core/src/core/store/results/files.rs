//! On-disk naming and low-level file helpers for cache entries.
//!
//! Layout inside the cache directory:
//!
//! ```text
//! resultscache-{id}.{chunk:04}.results   chunk of rows (empty file = no rows)
//! resultscache-{id}.meta                 {"id": ..., "row-count": ...}
//! .resultscache-tmp-*                    in-flight writes, renamed into place
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::debug;

use super::errors::ResultsCacheError;
use super::id::CacheId;

pub(crate) const FILE_PREFIX: &str = "resultscache-";
pub(crate) const CHUNK_EXTENSION: &str = "results";
pub(crate) const META_EXTENSION: &str = "meta";
pub(crate) const TEMP_PREFIX: &str = ".resultscache-tmp-";
#[cfg(unix)]
const ENTRY_FILE_MODE: u32 = 0o660;

#[must_use]
pub(crate) fn chunk_path(dir: &Path, id: &CacheId, index: usize) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{id}.{index:04}.{CHUNK_EXTENSION}"))
}

#[must_use]
pub(crate) fn meta_path(dir: &Path, id: &CacheId) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{id}.{META_EXTENSION}"))
}

/// What a directory entry's name says it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryFile {
    Chunk { id: CacheId, index: usize },
    Meta { id: CacheId },
    Temp,
}

pub(crate) fn classify(name: &str) -> Option<EntryFile> {
    if name.starts_with(TEMP_PREFIX) {
        return Some(EntryFile::Temp);
    }
    let rest = name.strip_prefix(FILE_PREFIX)?;
    if let Some(id) = rest
        .strip_suffix(META_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
    {
        return CacheId::parse(id).ok().map(|id| EntryFile::Meta { id });
    }
    let stem = rest
        .strip_suffix(CHUNK_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))?;
    let (id, index) = stem.rsplit_once('.')?;
    if index.len() < 4 || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = index.parse().ok()?;
    let id = CacheId::parse(id).ok()?;
    Some(EntryFile::Chunk { id, index })
}

/// Write `bytes` to a temp file beside `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ResultsCacheError> {
    let write_err = |source| ResultsCacheError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| write_err(io::Error::other("path has no parent directory")))?;
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(ENTRY_FILE_MODE))
            .map_err(write_err)?;
    }
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Claim `path` by creating it empty; fails if it already exists.
pub(crate) fn reserve(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
}

/// Record an access on `path`. Failure only costs purge precision.
pub(crate) fn touch_access_time(path: &Path) {
    if let Err(err) = filetime::set_file_atime(path, FileTime::now()) {
        debug!(path = %path.display(), %err, "failed to update access time");
    }
}

pub(crate) fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> CacheId {
        CacheId::parse(raw).expect("valid id")
    }

    #[test]
    fn names_follow_the_documented_layout() {
        let dir = Path::new("/cache");
        assert_eq!(
            chunk_path(dir, &id("abc"), 1),
            Path::new("/cache/resultscache-abc.0001.results")
        );
        assert_eq!(
            chunk_path(dir, &id("abc"), 12345),
            Path::new("/cache/resultscache-abc.12345.results")
        );
        assert_eq!(
            meta_path(dir, &id("abc")),
            Path::new("/cache/resultscache-abc.meta")
        );
    }

    #[test]
    fn classify_recognises_entry_files() {
        assert_eq!(
            classify("resultscache-abc.0000.results"),
            Some(EntryFile::Chunk {
                id: id("abc"),
                index: 0
            })
        );
        assert_eq!(
            classify("resultscache-a-b_c.0017.results"),
            Some(EntryFile::Chunk {
                id: id("a-b_c"),
                index: 17
            })
        );
        assert_eq!(
            classify("resultscache-abc.meta"),
            Some(EntryFile::Meta { id: id("abc") })
        );
        assert_eq!(classify(".resultscache-tmp-x1y2"), Some(EntryFile::Temp));
    }

    #[test]
    fn classify_rejects_foreign_names() {
        for name in [
            "notes.txt",
            "resultscache-.meta",
            "resultscache-abc.1.results",
            "resultscache-abc.00x1.results",
            "resultscache-abc.results",
            "resultscache-a.b.meta",
            "resultscache-abc.0000.json",
        ] {
            assert_eq!(classify(name), None, "{name} should not classify");
        }
    }
}

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::ResultsCacheError;
use super::files::{meta_path, touch_access_time, write_atomic};
use super::id::CacheId;

/// JSON sidecar recording an entry's identity and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub id: String,
    #[serde(rename = "row-count")]
    pub row_count: u64,
}

pub(crate) fn write_meta(
    dir: &Path,
    id: &CacheId,
    row_count: usize,
) -> Result<(), ResultsCacheError> {
    let path = meta_path(dir, id);
    let meta = CacheMeta {
        id: id.to_string(),
        row_count: row_count as u64,
    };
    let bytes = serde_json::to_vec(&meta).map_err(|err| ResultsCacheError::Write {
        path: path.clone(),
        source: io::Error::from(err),
    })?;
    write_atomic(&path, &bytes)
}

/// Read the sidecar for `id` and mark it as accessed.
pub(crate) fn read_meta(dir: &Path, id: &CacheId) -> Result<CacheMeta, ResultsCacheError> {
    let meta = peek_meta(dir, id)?;
    touch_access_time(&meta_path(dir, id));
    Ok(meta)
}

/// Read the sidecar without recording an access (listing, purge).
pub(crate) fn peek_meta(dir: &Path, id: &CacheId) -> Result<CacheMeta, ResultsCacheError> {
    let path = meta_path(dir, id);
    let bytes = fs::read(&path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ResultsCacheError::NotFound {
                id: id.to_string(),
            }
        } else {
            ResultsCacheError::Read {
                path: path.clone(),
                source,
            }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|err| ResultsCacheError::CorruptMetadata {
        path,
        error: err.to_string(),
    })
}

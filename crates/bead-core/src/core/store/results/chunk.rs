use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::errors::ResultsCacheError;
use super::files::{chunk_path, touch_access_time, write_atomic};
use super::id::CacheId;
use crate::core::row::Row;

/// Serialize `rows` into chunk `index` of `id`, replacing any previous file.
pub(crate) fn write_chunk(
    dir: &Path,
    id: &CacheId,
    index: usize,
    rows: &[Row],
) -> Result<PathBuf, ResultsCacheError> {
    let path = chunk_path(dir, id, index);
    let bytes = if rows.is_empty() {
        Vec::new()
    } else {
        serde_json::to_vec(rows).map_err(|err| ResultsCacheError::Write {
            path: path.clone(),
            source: io::Error::from(err),
        })?
    };
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Load chunk `index` of `id` and mark it as accessed.
pub(crate) fn read_chunk(
    dir: &Path,
    id: &CacheId,
    index: usize,
) -> Result<Vec<Row>, ResultsCacheError> {
    let path = chunk_path(dir, id, index);
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
    touch_access_time(&path);
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|err| ResultsCacheError::CorruptChunk {
        path,
        error: err.to_string(),
    })
}

/// Everything needed to page an entry's chunks back in.
#[derive(Debug, Clone)]
pub(crate) struct ChunkSource {
    pub(crate) dir: PathBuf,
    pub(crate) id: CacheId,
    pub(crate) row_count: usize,
    pub(crate) chunk_size: usize,
}

impl ChunkSource {
    pub(crate) fn chunk_count(&self) -> usize {
        self.row_count.div_ceil(self.chunk_size).max(1)
    }

    /// Rows chunk `index` must hold for the entry to be consistent.
    fn expected_len(&self, index: usize) -> usize {
        let start = index.saturating_mul(self.chunk_size);
        self.row_count.saturating_sub(start).min(self.chunk_size)
    }

    /// Read chunk `index`, rejecting chunks whose length disagrees with the
    /// recorded row count (a different chunk size or a damaged entry).
    pub(crate) fn load(&self, index: usize) -> Result<Vec<Row>, ResultsCacheError> {
        let rows = read_chunk(&self.dir, &self.id, index)?;
        let expected = self.expected_len(index);
        if rows.len() != expected {
            return Err(ResultsCacheError::CorruptChunk {
                path: chunk_path(&self.dir, &self.id, index),
                error: format!("expected {expected} rows, found {}", rows.len()),
            });
        }
        Ok(rows)
    }
}

/// Single-slot read-ahead cache: at most one chunk resident at a time.
#[derive(Debug, Default)]
pub(crate) struct ResidentChunk {
    index: Option<usize>,
    rows: Vec<Row>,
}

impl ResidentChunk {
    pub(crate) fn fetch(
        &mut self,
        source: &ChunkSource,
        index: usize,
    ) -> Result<&[Row], ResultsCacheError> {
        if self.index != Some(index) {
            // Drop the old chunk first so a failed load never serves stale rows.
            self.index = None;
            self.rows = source.load(index)?;
            self.index = Some(index);
        }
        Ok(&self.rows)
    }

    #[cfg(test)]
    pub(crate) fn resident_index(&self) -> Option<usize> {
        self.index
    }
}

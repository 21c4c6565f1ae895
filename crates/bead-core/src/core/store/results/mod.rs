//! File-backed cache for one-shot database result sets.
//!
//! A [`ResultsCache`] drains a [`RowCursor`] into fixed-size chunk files
//! plus a JSON sidecar, then serves rows by index or in order without
//! holding the whole result set in memory. Entries are write-once; the
//! sidecar is written last and acts as the commit marker.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::core::cursor::RowCursor;
use crate::core::row::Row;
use crate::core::store::{ensure_cache_dir, CacheLocation};

mod chunk;
mod errors;
mod files;
mod id;
mod iter;
mod meta;
mod purge;
mod scan;

use chunk::{write_chunk, ChunkSource, ResidentChunk};
use files::{chunk_path, meta_path, remove_if_present, reserve};

pub(crate) use files::{classify, EntryFile};

pub use errors::ResultsCacheError;
pub use id::CacheId;
pub use iter::Rows;
pub use meta::CacheMeta;
pub use purge::{purge_expired, PurgeError, PurgeOptions, PurgeSummary, DEFAULT_EXPIRY};

/// Rows per chunk file.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

type Result<T, E = ResultsCacheError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultsCacheOptions {
    /// Must match between ingestion and rehydration of an entry.
    pub chunk_size: usize,
}

impl Default for ResultsCacheOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ResultsCacheOptions {
    fn validate(self) -> Result<Self> {
        if self.chunk_size == 0 {
            return Err(ResultsCacheError::InvalidChunkSize);
        }
        Ok(self)
    }
}

/// A persisted, read-only result set.
#[derive(Debug)]
pub struct ResultsCache {
    source: ChunkSource,
    lookup: ResidentChunk,
}

impl ResultsCache {
    /// Drain `cursor` into a new entry using the default chunk size.
    ///
    /// # Errors
    /// See [`ResultsCache::ingest_with`].
    pub fn ingest<C: RowCursor>(
        location: &CacheLocation,
        id: Option<&str>,
        cursor: C,
    ) -> Result<Self> {
        Self::ingest_with(location, id, cursor, ResultsCacheOptions::default())
    }

    /// Drain `cursor` into a new entry named `id` (random when `None`).
    ///
    /// The identifier is claimed before the first row is pulled, so a
    /// collision leaves both the cursor and the existing entry untouched.
    /// If ingestion fails part-way, the chunk files written so far are
    /// removed and the identifier is free again.
    ///
    /// # Errors
    /// Fails if the cache directory is unusable, the identifier is invalid
    /// or already in use, the cursor errors, or a file cannot be written.
    pub fn ingest_with<C: RowCursor>(
        location: &CacheLocation,
        id: Option<&str>,
        mut cursor: C,
        options: ResultsCacheOptions,
    ) -> Result<Self> {
        let options = options.validate()?;
        let id = match id {
            Some(raw) => CacheId::parse(raw)?,
            None => CacheId::generate(),
        };
        ensure_cache_dir(location)?;
        let dir = location.path.clone();

        if meta_path(&dir, &id).exists() {
            return Err(ResultsCacheError::IdInUse { id: id.to_string() });
        }
        let first = chunk_path(&dir, &id, 0);
        reserve(&first).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                ResultsCacheError::IdInUse { id: id.to_string() }
            } else {
                ResultsCacheError::Write {
                    path: first.clone(),
                    source,
                }
            }
        })?;

        let mut pending = PendingEntry {
            dir: &dir,
            id: &id,
            written: vec![first],
            committed: false,
        };
        let row_count = pending.fill(&mut cursor, options.chunk_size)?;
        meta::write_meta(&dir, &id, row_count)?;
        pending.committed = true;
        let chunks = pending.written.len();
        drop(pending);

        debug!(%id, rows = row_count, chunks, "results cache entry ingested");
        Ok(Self::from_source(ChunkSource {
            dir,
            id,
            row_count,
            chunk_size: options.chunk_size,
        }))
    }

    /// Rehydrate an existing entry using the default chunk size.
    ///
    /// # Errors
    /// See [`ResultsCache::open_with`].
    pub fn open(location: &CacheLocation, id: &str) -> Result<Self> {
        Self::open_with(location, id, ResultsCacheOptions::default())
    }

    /// Rehydrate an existing entry from disk. No rows are loaded until
    /// they are asked for.
    ///
    /// # Errors
    /// Fails with [`ResultsCacheError::NotFound`] if the entry's first chunk
    /// or sidecar is missing, and with read/corruption errors otherwise.
    pub fn open_with(
        location: &CacheLocation,
        id: &str,
        options: ResultsCacheOptions,
    ) -> Result<Self> {
        let options = options.validate()?;
        let id = CacheId::parse(id)?;
        let dir = location.path.clone();

        let first = chunk_path(&dir, &id, 0);
        if let Err(source) = fs::File::open(&first) {
            return Err(if source.kind() == io::ErrorKind::NotFound {
                ResultsCacheError::NotFound { id: id.to_string() }
            } else {
                ResultsCacheError::Read {
                    path: first,
                    source,
                }
            });
        }

        let meta = meta::read_meta(&dir, &id)?;
        if meta.id != id.as_str() {
            return Err(ResultsCacheError::IdMismatch {
                expected: id.to_string(),
                found: meta.id,
            });
        }
        let row_count =
            usize::try_from(meta.row_count).map_err(|_| ResultsCacheError::CorruptMetadata {
                path: meta_path(&dir, &id),
                error: format!("row count {} does not fit in memory", meta.row_count),
            })?;

        Ok(Self::from_source(ChunkSource {
            dir,
            id,
            row_count,
            chunk_size: options.chunk_size,
        }))
    }

    /// Whether a committed entry named `id` is present in `location`.
    #[must_use]
    pub fn exists(location: &CacheLocation, id: &str) -> bool {
        CacheId::parse(id).is_ok_and(|id| {
            meta_path(&location.path, &id).is_file() && chunk_path(&location.path, &id, 0).is_file()
        })
    }

    fn from_source(source: ChunkSource) -> Self {
        Self {
            source,
            lookup: ResidentChunk::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &CacheId {
        &self.source.id
    }

    /// Number of cached rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.row_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.row_count == 0
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.source.chunk_size
    }

    /// Number of chunk files backing the entry (at least one).
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.source.chunk_count()
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.source.dir
    }

    /// Row at `index`, paging its chunk in if it is not resident.
    ///
    /// # Errors
    /// Returns [`ResultsCacheError::OutOfRange`] unless
    /// `0 <= index < len()`, or a read error if the chunk cannot be loaded.
    pub fn row(&mut self, index: i64) -> Result<&Row> {
        let position = usize::try_from(index)
            .ok()
            .filter(|position| *position < self.source.row_count)
            .ok_or(ResultsCacheError::OutOfRange {
                index,
                row_count: self.source.row_count,
            })?;
        let chunk_size = self.source.chunk_size;
        let rows = self.lookup.fetch(&self.source, position / chunk_size)?;
        // `fetch` validated the chunk length against the row count.
        Ok(&rows[position % chunk_size])
    }

    /// Entries are immutable once ingested.
    ///
    /// # Errors
    /// Always returns [`ResultsCacheError::ReadOnly`].
    pub fn set(&mut self, _index: i64, _row: Row) -> Result<()> {
        Err(self.read_only())
    }

    /// Entries are immutable once ingested.
    ///
    /// # Errors
    /// Always returns [`ResultsCacheError::ReadOnly`].
    pub fn unset(&mut self, _index: i64) -> Result<()> {
        Err(self.read_only())
    }

    fn read_only(&self) -> ResultsCacheError {
        ResultsCacheError::ReadOnly {
            id: self.source.id.to_string(),
        }
    }

    /// Independent in-order iterator with its own resident chunk.
    #[must_use]
    pub fn rows(&self) -> Rows {
        Rows::new(self.source.clone())
    }

    /// Delete the entry's sidecar and chunk files.
    ///
    /// # Errors
    /// See [`ResultsCache::remove`].
    pub fn destroy(self) -> Result<usize> {
        remove_entry_files(&self.source.dir, &self.source.id)
    }

    /// Delete every file belonging to `id` without rehydrating it, so
    /// entries with damaged or mismatched metadata can still be removed.
    /// The sidecar goes first; if it cannot be deleted the chunks are
    /// kept. Returns the number of files removed (zero when nothing was
    /// there).
    ///
    /// # Errors
    /// Fails for an invalid identifier, an unlistable directory, or the
    /// first file that cannot be deleted; files already removed stay
    /// removed.
    pub fn remove(location: &CacheLocation, id: &str) -> Result<usize> {
        let id = CacheId::parse(id)?;
        remove_entry_files(&location.path, &id)
    }
}

fn remove_entry_files(dir: &Path, id: &CacheId) -> Result<usize> {
    let entry = scan::scan_entry(dir, id)?;
    let mut removed = 0;
    let paths = entry
        .meta
        .iter()
        .chain(entry.chunks.iter().map(|(_, file)| file))
        .map(|file| &file.path);
    for path in paths {
        match remove_if_present(path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(source) => {
                return Err(ResultsCacheError::Write {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
    debug!(%id, removed, "results cache entry removed");
    Ok(removed)
}

/// Chunks written by an in-flight ingestion; removed unless committed.
struct PendingEntry<'a> {
    dir: &'a Path,
    id: &'a CacheId,
    written: Vec<PathBuf>,
    committed: bool,
}

impl PendingEntry<'_> {
    /// Pull every row from `cursor`, flushing a chunk each time one fills.
    /// Returns the total row count.
    fn fill<C: RowCursor>(&mut self, cursor: &mut C, chunk_size: usize) -> Result<usize> {
        let mut buffer = Vec::with_capacity(chunk_size.min(DEFAULT_CHUNK_SIZE));
        let mut chunk_index = 0;
        let mut row_count = 0usize;
        while let Some(row) = cursor
            .next_row()
            .map_err(|source| ResultsCacheError::Cursor {
                id: self.id.to_string(),
                source,
            })?
        {
            buffer.push(row);
            row_count += 1;
            if buffer.len() == chunk_size {
                self.flush(chunk_index, &buffer)?;
                buffer.clear();
                chunk_index += 1;
            }
        }
        if !buffer.is_empty() || row_count == 0 {
            self.flush(chunk_index, &buffer)?;
        }
        Ok(row_count)
    }

    fn flush(&mut self, index: usize, rows: &[Row]) -> Result<()> {
        let path = write_chunk(self.dir, self.id, index, rows)?;
        if index > 0 {
            self.written.push(path);
        }
        Ok(())
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.written {
            if let Err(err) = remove_if_present(path) {
                warn!(
                    path = %path.display(),
                    %err,
                    "failed to clean up partial results cache chunk"
                );
            }
        }
        debug!(id = %self.id, chunks = self.written.len(), "discarded partial results cache entry");
    }
}

/// One committed entry as seen by [`list_entries`].
#[derive(Debug, Clone)]
pub struct EntrySummary {
    pub id: String,
    /// `None` when the sidecar could not be read.
    pub row_count: Option<u64>,
    pub chunk_files: usize,
    pub size_bytes: u64,
    pub last_access: Option<SystemTime>,
}

/// Describe every committed entry without marking any of them as accessed.
///
/// # Errors
/// Returns an error if the cache directory cannot be listed.
pub fn list_entries(location: &CacheLocation) -> Result<Vec<EntrySummary>> {
    let scan = scan::scan_directory(&location.path)?;
    let mut entries = Vec::new();
    for (id, entry) in &scan.entries {
        if entry.meta.is_none() {
            continue;
        }
        let row_count = match meta::peek_meta(&location.path, id) {
            Ok(meta) => Some(meta.row_count),
            Err(err) => {
                warn!(%id, %err, "failed to read results cache metadata");
                None
            }
        };
        entries.push(EntrySummary {
            id: id.to_string(),
            row_count,
            chunk_files: entry.chunks.len(),
            size_bytes: entry.size_bytes(),
            last_access: entry.last_access(),
        });
    }
    Ok(entries)
}

use std::vec;

use super::chunk::ChunkSource;
use super::errors::ResultsCacheError;
use crate::core::row::Row;

/// Sequential view over a cached result set.
///
/// Keeps its own position and its own resident chunk, independent of the
/// random-access path on [`ResultsCache`](super::ResultsCache) and of any
/// other `Rows` over the same entry. After an error the iterator is
/// exhausted until [`Rows::rewind`] is called.
#[derive(Debug)]
pub struct Rows {
    source: ChunkSource,
    position: usize,
    chunk: vec::IntoIter<Row>,
}

impl Rows {
    pub(crate) fn new(source: ChunkSource) -> Self {
        Self {
            source,
            position: 0,
            chunk: Vec::new().into_iter(),
        }
    }

    /// Restart from the first row.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.chunk = Vec::new().into_iter();
    }

    /// Zero-based index of the next row to be yielded.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for Rows {
    type Item = Result<Row, ResultsCacheError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.source.row_count {
            return None;
        }
        if self.chunk.as_slice().is_empty() {
            // Positions only reach an empty buffer on a chunk boundary.
            let index = self.position / self.source.chunk_size;
            match self.source.load(index) {
                Ok(rows) => self.chunk = rows.into_iter(),
                Err(err) => {
                    self.position = self.source.row_count;
                    return Some(Err(err));
                }
            }
        }
        let row = self.chunk.next()?;
        self.position += 1;
        Some(Ok(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // An error ends iteration early, so only the upper bound is exact.
        (0, Some(self.source.row_count - self.position))
    }
}

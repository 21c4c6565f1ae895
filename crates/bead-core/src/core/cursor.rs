//! Forward-only row cursors feeding the results cache.

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Params, Statement};

use crate::core::row::{Row, Value};

/// A one-shot source of rows. Each row is yielded exactly once and the
/// cursor cannot be rewound.
pub trait RowCursor {
    /// Advance the cursor. `Ok(None)` marks exhaustion.
    ///
    /// # Errors
    /// Returns an error if the underlying source fails to produce a row.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

impl<C: RowCursor + ?Sized> RowCursor for &mut C {
    fn next_row(&mut self) -> Result<Option<Row>> {
        (**self).next_row()
    }
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        (**self).next_row()
    }
}

/// Adapts an infallible iterator of rows.
#[derive(Debug)]
pub struct IterCursor<I> {
    inner: I,
}

impl<I: Iterator<Item = Row>> IterCursor<I> {
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: rows.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Row>> RowCursor for IterCursor<I> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.inner.next())
    }
}

/// Adapts an iterator of row results; the first error ends ingestion.
#[derive(Debug)]
pub struct FallibleCursor<I> {
    inner: I,
}

impl<I, E> FallibleCursor<I>
where
    I: Iterator<Item = std::result::Result<Row, E>>,
{
    pub fn new(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: rows.into_iter(),
        }
    }
}

impl<I, E> RowCursor for FallibleCursor<I>
where
    I: Iterator<Item = std::result::Result<Row, E>>,
    E: Into<anyhow::Error>,
{
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.inner.next().transpose().map_err(Into::into)
    }
}

/// Streams the result set of a prepared SQLite statement.
pub struct SqliteCursor<'stmt> {
    columns: Vec<String>,
    rows: rusqlite::Rows<'stmt>,
}

impl<'stmt> SqliteCursor<'stmt> {
    /// Execute `statement` and wrap its result rows.
    ///
    /// # Errors
    /// Returns an error if the statement cannot be executed with `params`.
    pub fn new<P: Params>(statement: &'stmt mut Statement<'_>, params: P) -> Result<Self> {
        let columns = statement
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let rows = statement
            .query(params)
            .context("failed to execute query")?;
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl RowCursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(record) = self.rows.next().context("failed to fetch row")? else {
            return Ok(None);
        };
        let mut row = Row::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let value = record
                .get_ref(idx)
                .with_context(|| format!("failed to read column {column}"))?;
            row.insert(column.clone(), Value::from(value));
        }
        Ok(Some(row))
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(int) => Self::Int(int),
            ValueRef::Real(real) if real.is_finite() => Self::Float(real),
            ValueRef::Real(_) => Self::Null,
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Text(hex::encode(bytes)),
        }
    }
}

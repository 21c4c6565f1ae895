use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::core::config::context::CommandContext;
use crate::core::cursor::SqliteCursor;
use crate::core::store::results::{
    list_entries, purge_expired, EntrySummary, PurgeOptions, PurgeSummary, ResultsCache,
    ResultsCacheError,
};
use crate::core::store::{compute_cache_usage, ensure_cache_dir, CacheLocation};
use crate::core::tooling::outcome::ExecutionOutcome;

/// Rows printed by `bead cache show` when no limit is given.
pub const DEFAULT_SHOW_LIMIT: usize = 20;

#[derive(Clone, Debug, Default)]
pub struct CachePathRequest;

#[derive(Clone, Debug, Default)]
pub struct CacheStatsRequest;

#[derive(Clone, Debug, Default)]
pub struct CacheListRequest;

#[derive(Clone, Debug)]
pub struct CacheIngestRequest {
    pub db: PathBuf,
    pub query: String,
    pub id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CacheShowRequest {
    pub id: String,
    pub row: Option<i64>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct CachePurgeRequest {
    /// Overrides the configured expiry.
    pub older_than: Option<Duration>,
    pub dry_run: bool,
}

#[derive(Clone, Debug)]
pub struct CacheDropRequest {
    pub id: String,
}

pub fn cache_path(ctx: &CommandContext, _request: CachePathRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    if let Err(err) = ensure_cache_dir(cache) {
        return Ok(results_error_outcome(&err, cache));
    }
    let canonical = cache
        .path
        .canonicalize()
        .unwrap_or_else(|_| cache.path.clone());
    let path_str = canonical.display().to_string();
    Ok(ExecutionOutcome::success(
        format!("results cache directory: {path_str}"),
        json!({
            "status": "path",
            "cache_path": path_str,
            "source": cache.source,
        }),
    ))
}

pub fn cache_stats(ctx: &CommandContext, _request: CacheStatsRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    let usage = compute_cache_usage(&cache.path)?;
    let message = if usage.exists {
        format!(
            "stats: {} entries, {} files, {} bytes",
            usage.total_entries, usage.total_files, usage.total_size_bytes
        )
    } else {
        format!("cache path {} not found", cache.path.display())
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "status": "stats",
            "cache_path": cache.path.display().to_string(),
            "cache_exists": usage.exists,
            "total_entries": usage.total_entries,
            "total_files": usage.total_files,
            "total_size_bytes": usage.total_size_bytes,
            "expiry_seconds": ctx.expiry().as_secs(),
        }),
    ))
}

pub fn cache_list(ctx: &CommandContext, _request: CacheListRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    let entries = match list_entries(cache) {
        Ok(entries) => entries,
        Err(err) => return Ok(results_error_outcome(&err, cache)),
    };
    let now = SystemTime::now();
    let rendered: Vec<Value> = entries.iter().map(|entry| entry_json(entry, now)).collect();
    let message = match entries.len() {
        0 => "no cached result sets".to_string(),
        1 => "1 cached result set".to_string(),
        count => format!("{count} cached result sets"),
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "status": "list",
            "cache_path": cache.path.display().to_string(),
            "entries": rendered,
        }),
    ))
}

fn entry_json(entry: &EntrySummary, now: SystemTime) -> Value {
    let last_access = entry.last_access.and_then(format_timestamp);
    let idle_seconds = entry
        .last_access
        .and_then(|at| now.duration_since(at).ok())
        .map(|idle| idle.as_secs());
    json!({
        "id": entry.id,
        "row_count": entry.row_count,
        "chunk_files": entry.chunk_files,
        "size_bytes": entry.size_bytes,
        "last_access": last_access,
        "idle_seconds": idle_seconds,
    })
}

fn format_timestamp(at: SystemTime) -> Option<String> {
    OffsetDateTime::from(at).format(&Rfc3339).ok()
}

pub fn cache_ingest(ctx: &CommandContext, request: CacheIngestRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    let db = request.db.display().to_string();
    if !request.db.is_file() {
        return Ok(ExecutionOutcome::user_error(
            format!("database {db} not found"),
            json!({
                "reason": "missing_database",
                "database": db,
                "hint": "pass the path of an existing SQLite database with --db",
            }),
        ));
    }
    let conn = match Connection::open_with_flags(
        &request.db,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    ) {
        Ok(conn) => conn,
        Err(err) => {
            return Ok(ExecutionOutcome::failure(
                format!("failed to open database {db}"),
                json!({
                    "reason": "database_open_failed",
                    "database": db,
                    "error": err.to_string(),
                }),
            ))
        }
    };
    let mut statement = match conn.prepare(&request.query) {
        Ok(statement) => statement,
        Err(err) => return Ok(invalid_query_outcome(&db, &err.to_string())),
    };
    let cursor = match SqliteCursor::new(&mut statement, []) {
        Ok(cursor) => cursor,
        Err(err) => return Ok(invalid_query_outcome(&db, &format!("{err:#}"))),
    };
    let columns = cursor.columns().to_vec();
    debug!(database = %db, columns = columns.len(), "ingesting query results");

    let entry = match ResultsCache::ingest(cache, request.id.as_deref(), cursor) {
        Ok(entry) => entry,
        Err(err) => return Ok(results_error_outcome(&err, cache)),
    };
    Ok(ExecutionOutcome::success(
        format!("cached {} rows as {}", entry.len(), entry.id()),
        json!({
            "status": "ingested",
            "id": entry.id().as_str(),
            "row_count": entry.len(),
            "chunk_files": entry.chunk_count(),
            "columns": columns,
            "cache_path": cache.path.display().to_string(),
        }),
    ))
}

fn invalid_query_outcome(db: &str, error: &str) -> ExecutionOutcome {
    ExecutionOutcome::user_error(
        "query could not be prepared",
        json!({
            "reason": "invalid_query",
            "database": db,
            "error": error,
            "hint": "check the SQL passed with --query",
        }),
    )
}

pub fn cache_show(ctx: &CommandContext, request: CacheShowRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    match show_rows(cache, &request) {
        Ok(outcome) => Ok(outcome),
        Err(err) => Ok(results_error_outcome(&err, cache)),
    }
}

fn show_rows(
    cache: &CacheLocation,
    request: &CacheShowRequest,
) -> Result<ExecutionOutcome, ResultsCacheError> {
    let mut entry = ResultsCache::open(cache, &request.id)?;
    let row_count = entry.len();
    let (start, rows) = if let Some(index) = request.row {
        let row = entry.row(index)?;
        (index, vec![row_json(row)])
    } else {
        let limit = request.limit.unwrap_or(DEFAULT_SHOW_LIMIT);
        let end = request.offset.saturating_add(limit).min(row_count);
        let mut rows = Vec::with_capacity(end.saturating_sub(request.offset));
        for index in request.offset..end {
            // Indices below `row_count` always fit.
            let index = i64::try_from(index).unwrap_or(i64::MAX);
            rows.push(row_json(entry.row(index)?));
        }
        (i64::try_from(request.offset).unwrap_or(i64::MAX), rows)
    };
    let message = if rows.is_empty() {
        format!("{} holds {row_count} rows; none selected", entry.id())
    } else {
        format!(
            "showing {} of {row_count} rows from {}",
            rows.len(),
            entry.id()
        )
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "status": "rows",
            "id": entry.id().as_str(),
            "row_count": row_count,
            "offset": start,
            "rows": rows,
        }),
    ))
}

fn row_json(row: &crate::core::row::Row) -> Value {
    serde_json::to_value(row).unwrap_or(Value::Null)
}

pub fn cache_purge(ctx: &CommandContext, request: CachePurgeRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    let expiry = request.older_than.unwrap_or_else(|| ctx.expiry());
    if !cache.path.exists() {
        return Ok(ExecutionOutcome::success(
            format!("cache path {} not found", cache.path.display()),
            json!({
                "status": "no-cache",
                "cache_path": cache.path.display().to_string(),
                "cache_exists": false,
                "dry_run": request.dry_run,
                "expiry_seconds": expiry.as_secs(),
                "purged_entries": 0,
                "deleted_files": 0,
                "deleted_size_bytes": 0,
                "errors": [],
            }),
        ));
    }

    let options = PurgeOptions {
        expiry,
        dry_run: request.dry_run,
    };
    let summary = match purge_expired(cache, options) {
        Ok(summary) => summary,
        Err(err) => return Ok(results_error_outcome(&err, cache)),
    };
    Ok(purge_outcome(cache, options, &summary))
}

fn purge_outcome(
    cache: &CacheLocation,
    options: PurgeOptions,
    summary: &PurgeSummary,
) -> ExecutionOutcome {
    let error_count = summary.errors.len();
    let errors_json: Vec<_> = summary
        .errors
        .iter()
        .map(|err| {
            json!({
                "path": err.path.display().to_string(),
                "error": err.error,
            })
        })
        .collect();
    let status = if options.dry_run {
        "dry-run"
    } else if error_count == 0 {
        "success"
    } else {
        "partial"
    };
    let details = json!({
        "status": status,
        "cache_path": cache.path.display().to_string(),
        "cache_exists": true,
        "dry_run": options.dry_run,
        "expiry_seconds": options.expiry.as_secs(),
        "scanned_entries": summary.scanned_entries,
        "expired_entries": summary.expired_entries,
        "purged_entries": summary.purged_entries,
        "retained_entries": summary.retained_entries,
        "orphaned_chunk_sets": summary.orphaned_chunk_sets,
        "purged_ids": summary.purged_ids,
        "candidate_files": summary.candidate_files,
        "candidate_size_bytes": summary.candidate_bytes,
        "deleted_files": summary.deleted_files,
        "deleted_size_bytes": summary.deleted_bytes,
        "skipped": summary
            .skipped
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>(),
        "errors": errors_json,
    });

    if options.dry_run {
        ExecutionOutcome::success(
            format!(
                "would remove {} expired entries ({} files, {} bytes)",
                summary.expired_entries, summary.candidate_files, summary.candidate_bytes
            ),
            details,
        )
    } else if error_count == 0 {
        ExecutionOutcome::success(
            format!(
                "removed {} expired entries ({} files, {} bytes)",
                summary.purged_entries, summary.deleted_files, summary.deleted_bytes
            ),
            details,
        )
    } else {
        ExecutionOutcome::failure(
            format!(
                "removed {} expired entries but {error_count} errors occurred",
                summary.purged_entries
            ),
            details,
        )
    }
}

pub fn cache_drop(ctx: &CommandContext, request: CacheDropRequest) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    // Removal works from the files on disk so damaged entries can go too.
    let removed = ResultsCache::remove(cache, &request.id).and_then(|files| {
        if files == 0 {
            Err(ResultsCacheError::NotFound {
                id: request.id.clone(),
            })
        } else {
            Ok(files)
        }
    });
    match removed {
        Ok(files) => Ok(ExecutionOutcome::success(
            format!("removed {} ({files} files)", request.id),
            json!({
                "status": "dropped",
                "id": request.id,
                "deleted_files": files,
            }),
        )),
        Err(err) => Ok(results_error_outcome(&err, cache)),
    }
}

/// Map a cache error onto an outcome: caller mistakes become user errors,
/// everything else a failure.
fn results_error_outcome(err: &ResultsCacheError, cache: &CacheLocation) -> ExecutionOutcome {
    let mut details = json!({
        "code": err.code(),
        "reason": error_reason(err),
        "cache_path": cache.path.display().to_string(),
    });
    if let Some(hint) = error_hint(err) {
        details["hint"] = Value::String(hint.to_string());
    }
    let message = err.to_string();
    if err.is_user_error() {
        ExecutionOutcome::user_error(message, details)
    } else {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        if !chain.is_empty() {
            details["causes"] = json!(chain);
        }
        ExecutionOutcome::failure(message, details)
    }
}

fn error_reason(err: &ResultsCacheError) -> &'static str {
    match err {
        ResultsCacheError::DirectoryUnavailable { .. } => "directory_unavailable",
        ResultsCacheError::InvalidId { .. } => "invalid_id",
        ResultsCacheError::IdInUse { .. } => "id_in_use",
        ResultsCacheError::IdMismatch { .. } => "id_mismatch",
        ResultsCacheError::Write { .. } => "write_failed",
        ResultsCacheError::Read { .. } => "read_failed",
        ResultsCacheError::NotFound { .. } => "not_found",
        ResultsCacheError::Cursor { .. } => "cursor_failed",
        ResultsCacheError::CorruptChunk { .. } => "corrupt_chunk",
        ResultsCacheError::CorruptMetadata { .. } => "corrupt_metadata",
        ResultsCacheError::OutOfRange { .. } => "out_of_range",
        ResultsCacheError::ReadOnly { .. } => "read_only",
        ResultsCacheError::InvalidChunkSize => "invalid_chunk_size",
    }
}

fn error_hint(err: &ResultsCacheError) -> Option<&'static str> {
    match err {
        ResultsCacheError::DirectoryUnavailable { .. } => {
            Some("set BEAD_APP_ROOT or BEAD_RESULTS_CACHE_PATH to a writable location")
        }
        ResultsCacheError::InvalidId { .. } => {
            Some("identifiers use letters, digits, '-' and '_' (at most 128 characters)")
        }
        ResultsCacheError::IdInUse { .. } => {
            Some("choose another --id or remove the entry with `bead cache drop`")
        }
        ResultsCacheError::NotFound { .. } => Some("run `bead cache list` to see cached entries"),
        ResultsCacheError::OutOfRange { .. } => Some("rows are numbered from 0"),
        ResultsCacheError::CorruptChunk { .. }
        | ResultsCacheError::CorruptMetadata { .. }
        | ResultsCacheError::IdMismatch { .. } => {
            Some("remove the damaged entry with `bead cache drop` and ingest it again")
        }
        _ => None,
    }
}

#![deny(clippy::all)]

mod core;

pub use crate::core::commands::{
    cache_drop, cache_ingest, cache_list, cache_path, cache_purge, cache_show, cache_stats,
    CacheDropRequest, CacheIngestRequest, CacheListRequest, CachePathRequest, CachePurgeRequest,
    CacheShowRequest, CacheStatsRequest, DEFAULT_SHOW_LIMIT,
};
pub use crate::core::config::context::{CommandContext, CommandInfo};
pub use crate::core::config::{AppContext, CacheConfig, Config, GlobalOptions};
pub use crate::core::cursor::{FallibleCursor, IterCursor, RowCursor, SqliteCursor};
pub use crate::core::row::{Row, Value};
pub use crate::core::store::results::{
    list_entries, purge_expired, CacheId, CacheMeta, EntrySummary, PurgeError, PurgeOptions,
    PurgeSummary, ResultsCache, ResultsCacheError, ResultsCacheOptions, Rows, DEFAULT_CHUNK_SIZE,
    DEFAULT_EXPIRY,
};
pub use crate::core::store::{
    compute_cache_usage, ensure_cache_dir, resolve_results_cache_path, CacheLocation, CacheUsage,
};
pub use crate::core::tooling::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::core::tooling::{format_status_message, to_json_response};

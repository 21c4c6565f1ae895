pub mod results;

mod cache;

pub use cache::{
    compute_cache_usage, ensure_cache_dir, resolve_results_cache_path, CacheLocation, CacheUsage,
    RESULTS_CACHE_DIR_NAME,
};
pub use results::{
    list_entries, purge_expired, CacheId, EntrySummary, PurgeOptions, PurgeSummary, ResultsCache,
    ResultsCacheError, ResultsCacheOptions, Rows,
};

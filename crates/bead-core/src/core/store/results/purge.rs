use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::errors::ResultsCacheError;
use super::files::remove_if_present;
use super::scan::{scan_directory, ScannedEntry, ScannedFile};
use crate::core::store::CacheLocation;

/// Entries untouched for this long are eligible for purging.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
pub struct PurgeOptions {
    pub expiry: Duration,
    pub dry_run: bool,
}

impl Default for PurgeOptions {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_EXPIRY,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PurgeError {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct PurgeSummary {
    /// Committed entries (those with a metadata file) that were examined.
    pub scanned_entries: u64,
    pub expired_entries: u64,
    pub purged_entries: u64,
    pub retained_entries: u64,
    /// Expired chunk sets without metadata, left by interrupted ingestion.
    pub orphaned_chunk_sets: u64,
    pub candidate_files: u64,
    pub candidate_bytes: u64,
    pub deleted_files: u64,
    pub deleted_bytes: u64,
    pub purged_ids: Vec<String>,
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<PurgeError>,
}

/// Remove every entry whose most recent access is older than the expiry.
///
/// This is housekeeping for the embedding application to run on a
/// schedule; reads and writes never trigger it. Individual failures are
/// logged and collected in the summary, and the sweep moves on.
///
/// # Errors
///
/// Returns an error only if the cache directory cannot be listed.
pub fn purge_expired(
    location: &CacheLocation,
    options: PurgeOptions,
) -> Result<PurgeSummary, ResultsCacheError> {
    let scan = scan_directory(&location.path)?;
    let cutoff = SystemTime::now()
        .checked_sub(options.expiry)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut summary = PurgeSummary {
        skipped: scan.skipped,
        ..PurgeSummary::default()
    };

    for (id, entry) in &scan.entries {
        let committed = entry.meta.is_some();
        if committed {
            summary.scanned_entries += 1;
        }
        let Some(last_access) = entry.last_access() else {
            warn!(%id, "skipping results cache entry with unknown access time");
            if committed {
                summary.retained_entries += 1;
            }
            continue;
        };
        if last_access > cutoff {
            if committed {
                summary.retained_entries += 1;
            }
            continue;
        }

        if committed {
            summary.expired_entries += 1;
        } else {
            summary.orphaned_chunk_sets += 1;
        }
        for file in entry.files() {
            summary.candidate_files += 1;
            summary.candidate_bytes += file.size;
        }
        if options.dry_run {
            if committed {
                summary.purged_ids.push(id.to_string());
            }
            continue;
        }
        if delete_entry(entry, &mut summary) && committed {
            summary.purged_entries += 1;
            summary.purged_ids.push(id.to_string());
        }
    }

    for temp in &scan.temps {
        let stale = temp.modified.or(temp.accessed).is_some_and(|at| at <= cutoff);
        if !stale {
            continue;
        }
        summary.candidate_files += 1;
        summary.candidate_bytes += temp.size;
        if !options.dry_run {
            delete_file(temp, &mut summary);
        }
    }

    debug!(
        dir = %location.path.display(),
        scanned = summary.scanned_entries,
        purged = summary.purged_entries,
        orphans = summary.orphaned_chunk_sets,
        deleted_files = summary.deleted_files,
        deleted_bytes = summary.deleted_bytes,
        errors = summary.errors.len(),
        dry_run = options.dry_run,
        "results cache purge complete"
    );
    Ok(summary)
}

/// Delete the sidecar first so the entry stops being visible before its
/// chunks disappear. Returns whether every file is gone.
fn delete_entry(entry: &ScannedEntry, summary: &mut PurgeSummary) -> bool {
    let mut clean = true;
    if let Some(meta) = &entry.meta {
        if !delete_file(meta, summary) {
            // Keep the chunks: a live sidecar pointing at missing chunks is worse.
            return false;
        }
    }
    for (_, chunk) in &entry.chunks {
        clean &= delete_file(chunk, summary);
    }
    clean
}

fn delete_file(file: &ScannedFile, summary: &mut PurgeSummary) -> bool {
    match remove_if_present(&file.path) {
        Ok(removed) => {
            if removed {
                summary.deleted_files += 1;
                summary.deleted_bytes += file.size;
            }
            true
        }
        Err(err) => {
            warn!(path = %file.path.display(), %err, "failed to delete results cache file");
            summary.errors.push(PurgeError {
                path: file.path.clone(),
                error: err.to_string(),
            });
            false
        }
    }
}

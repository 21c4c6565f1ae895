use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::config::AppContext;
use crate::core::store::results::{classify, EntryFile, ResultsCacheError};

/// Directory name of the results cache below the configured cache root.
pub const RESULTS_CACHE_DIR_NAME: &str = "bead-resultscache";

#[cfg(unix)]
const RESULTS_CACHE_DIR_MODE: u32 = 0o770;

/// Resolved results cache directory, plus where the path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

impl CacheLocation {
    /// A location pointing straight at `path`, for embedding code and tests.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: "explicit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheUsage {
    pub exists: bool,
    pub total_entries: u64,
    pub total_files: u64,
    pub total_size_bytes: u64,
}

/// Determine the results cache directory for an application.
///
/// `override_path` (from `BEAD_RESULTS_CACHE_PATH`) wins when set; a
/// relative override is taken relative to the application root.
#[must_use]
pub fn resolve_results_cache_path(app: &AppContext, override_path: Option<&str>) -> CacheLocation {
    if let Some(raw) = override_path.filter(|raw| !raw.trim().is_empty()) {
        let path = PathBuf::from(raw);
        let path = if path.is_absolute() {
            path
        } else {
            app.app_root.join(path)
        };
        return CacheLocation {
            path,
            source: crate::core::config::RESULTS_CACHE_PATH_ENV,
        };
    }

    CacheLocation {
        path: app.cache_dir().join(RESULTS_CACHE_DIR_NAME),
        source: if app.cache_root == crate::core::config::DEFAULT_CACHE_ROOT {
            "app root (default cache root)"
        } else {
            "app root (configured cache root)"
        },
    }
}

/// Create the cache directory if needed and check that it is a writable
/// directory. The cache cannot operate otherwise.
///
/// # Errors
///
/// Returns [`ResultsCacheError::DirectoryUnavailable`] if the directory
/// cannot be created, is not a directory, or is not writable.
pub fn ensure_cache_dir(location: &CacheLocation) -> Result<(), ResultsCacheError> {
    let path = &location.path;
    create_cache_dir(path)
        .map_err(|err| ResultsCacheError::directory(path, format!("failed to create: {err}")))?;
    let metadata = fs::metadata(path)
        .map_err(|err| ResultsCacheError::directory(path, format!("failed to stat: {err}")))?;
    if !metadata.is_dir() {
        return Err(ResultsCacheError::directory(path, "not a directory"));
    }
    tempfile::tempfile_in(path)
        .map_err(|err| ResultsCacheError::directory(path, format!("not writable: {err}")))?;
    Ok(())
}

#[cfg(unix)]
fn create_cache_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(RESULTS_CACHE_DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_cache_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

/// Count committed entries, files, and bytes in the cache directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed.
pub fn compute_cache_usage(path: &Path) -> Result<CacheUsage> {
    if !path.exists() {
        return Ok(CacheUsage {
            exists: false,
            total_entries: 0,
            total_files: 0,
            total_size_bytes: 0,
        });
    }

    let mut total_entries = 0u64;
    let mut total_files = 0u64;
    let mut total_size_bytes = 0u64;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            continue;
        }
        total_files += 1;
        total_size_bytes += entry.metadata()?.len();
        if let Some(EntryFile::Meta { .. }) = entry.file_name().to_str().and_then(classify) {
            total_entries += 1;
        }
    }

    Ok(CacheUsage {
        exists: true,
        total_entries,
        total_files,
        total_size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn app(root: &Path, cache_root: &str) -> AppContext {
        AppContext::new(root, cache_root)
    }

    #[test]
    fn resolves_under_app_root_and_cache_root() {
        let location = resolve_results_cache_path(&app(Path::new("/srv/app"), "cache"), None);
        assert_eq!(
            location.path,
            Path::new("/srv/app/cache/bead-resultscache")
        );
        let location = resolve_results_cache_path(&app(Path::new("/srv/app"), "var/tmp"), None);
        assert_eq!(
            location.path,
            Path::new("/srv/app/var/tmp/bead-resultscache")
        );
    }

    #[test]
    fn override_path_wins_and_is_relative_to_app_root() {
        let app = app(Path::new("/srv/app"), "cache");
        let location = resolve_results_cache_path(&app, Some("/var/cache/rc"));
        assert_eq!(location.path, Path::new("/var/cache/rc"));
        assert_eq!(location.source, "BEAD_RESULTS_CACHE_PATH");
        let location = resolve_results_cache_path(&app, Some("scratch"));
        assert_eq!(location.path, Path::new("/srv/app/scratch"));
        let location = resolve_results_cache_path(&app, Some("  "));
        assert_eq!(location.path, Path::new("/srv/app/cache/bead-resultscache"));
    }

    #[test]
    fn ensure_creates_missing_parents() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let location =
            CacheLocation::at(temp.path().join("a").join("b").join(RESULTS_CACHE_DIR_NAME));
        ensure_cache_dir(&location)?;
        assert!(location.path.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&location.path)?.permissions().mode() & 0o777;
            assert_eq!(mode & 0o007, 0, "others must have no access, got {mode:o}");
        }
        Ok(())
    }

    #[test]
    fn ensure_rejects_a_file_in_place_of_the_directory() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("occupied");
        fs::write(&path, b"x")?;
        let err = ensure_cache_dir(&CacheLocation::at(&path)).expect_err("file is not a dir");
        assert!(
            matches!(err, ResultsCacheError::DirectoryUnavailable { .. }),
            "{err}"
        );
        Ok(())
    }

    #[test]
    fn usage_counts_entries_files_and_bytes() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let dir = temp.path();
        fs::write(dir.join("resultscache-a.meta"), b"{}")?;
        fs::write(dir.join("resultscache-a.0000.results"), b"1234")?;
        fs::write(dir.join("stray.txt"), b"xyz")?;
        fs::write(dir.join("resultscache-a.b.meta"), b"{}")?;
        fs::create_dir(dir.join("nested"))?;

        let usage = compute_cache_usage(dir)?;
        assert!(usage.exists);
        assert_eq!(usage.total_entries, 1, "only well-formed sidecars are entries");
        assert_eq!(usage.total_files, 4);
        assert_eq!(usage.total_size_bytes, 11);

        let missing = compute_cache_usage(&dir.join("missing"))?;
        assert!(!missing.exists);
        Ok(())
    }
}

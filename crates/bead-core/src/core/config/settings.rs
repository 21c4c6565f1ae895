use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::core::store::results::DEFAULT_EXPIRY;
use crate::core::store::{resolve_results_cache_path, CacheLocation};

pub const APP_ROOT_ENV: &str = "BEAD_APP_ROOT";
pub const CACHE_ROOT_ENV: &str = "BEAD_CACHE_ROOT";
pub const RESULTS_CACHE_PATH_ENV: &str = "BEAD_RESULTS_CACHE_PATH";
pub const RESULTS_CACHE_EXPIRY_ENV: &str = "BEAD_RESULTS_CACHE_EXPIRY";
pub const DEFAULT_CACHE_ROOT: &str = "cache";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
    pub app_root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.var(key).filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Where the embedding application lives and where it keeps caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub app_root: PathBuf,
    /// Relative to `app_root` unless absolute.
    pub cache_root: String,
}

impl AppContext {
    pub fn new(app_root: impl Into<PathBuf>, cache_root: impl Into<String>) -> Self {
        Self {
            app_root: app_root.into(),
            cache_root: cache_root.into(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.app_root.join(&self.cache_root)
    }
}

#[derive(Debug)]
pub struct Config {
    pub(crate) app: AppContext,
    pub(crate) cache: CacheConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if the working directory cannot be determined or a
    /// setting cannot be parsed.
    pub fn from_env(app_root: Option<&Path>) -> Result<Self> {
        let snapshot = EnvSnapshot::capture();
        let cwd = env::current_dir()?;
        Self::from_snapshot(&snapshot, &cwd, app_root)
    }

    pub(crate) fn from_snapshot(
        snapshot: &EnvSnapshot,
        cwd: &Path,
        app_root: Option<&Path>,
    ) -> Result<Self> {
        let app_root = app_root
            .map(Path::to_path_buf)
            .or_else(|| snapshot.non_empty(APP_ROOT_ENV).map(PathBuf::from))
            .map_or_else(|| cwd.to_path_buf(), |root| absolutize(cwd, root));
        let app = AppContext::new(
            app_root,
            snapshot
                .non_empty(CACHE_ROOT_ENV)
                .unwrap_or(DEFAULT_CACHE_ROOT),
        );
        let results = resolve_results_cache_path(&app, snapshot.var(RESULTS_CACHE_PATH_ENV));
        let expiry = match snapshot.non_empty(RESULTS_CACHE_EXPIRY_ENV) {
            Some(raw) => parse_seconds(raw).ok_or_else(|| {
                anyhow!("{RESULTS_CACHE_EXPIRY_ENV} must be a whole number of seconds, got {raw:?}")
            })?,
            None => DEFAULT_EXPIRY,
        };
        Ok(Self {
            app,
            cache: CacheConfig { results, expiry },
        })
    }

    #[must_use]
    pub fn app(&self) -> &AppContext {
        &self.app
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }
}

#[derive(Debug)]
pub struct CacheConfig {
    pub results: CacheLocation,
    /// Idle time after which `bead cache purge` removes an entry.
    pub expiry: Duration,
}

fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

pub(crate) fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

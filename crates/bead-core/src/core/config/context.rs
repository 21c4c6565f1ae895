use std::time::Duration;

use anyhow::Result;

use crate::core::config::{Config, GlobalOptions};
use crate::core::store::CacheLocation;

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub group: &'static str,
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(group: &'static str, name: &'static str) -> Self {
        Self { group, name }
    }
}

pub struct CommandContext<'a> {
    pub global: &'a GlobalOptions,
    config: Config,
}

impl<'a> CommandContext<'a> {
    /// Creates a new command context with the provided global options.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be prepared.
    pub fn new(global: &'a GlobalOptions) -> Result<Self> {
        let config = Config::from_env(global.app_root.as_deref())?;
        Ok(Self { global, config })
    }

    #[must_use]
    pub fn with_config(global: &'a GlobalOptions, config: Config) -> Self {
        Self { global, config }
    }

    pub fn cache(&self) -> &CacheLocation {
        &self.config.cache().results
    }

    pub fn expiry(&self) -> Duration {
        self.config.cache().expiry
    }
}

//! Registry configuration.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod access;
mod commit;
mod journal;
mod locale;
pub use access::*;
pub use commit::*;
pub use journal::*;
pub use locale::*;
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::Result;

/// Settings of one registry.
///
/// Combines all section configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Locale of roots created without an explicit one
    #[serde(default)]
    pub locale: LocaleConfig,
    /// Commit engine behaviour
    #[serde(default)]
    pub commit: CommitConfig,
    /// Default in-memory modification journal
    #[serde(default)]
    pub journal: JournalConfig,
    /// Access slot housekeeping
    #[serde(default)]
    pub access: AccessConfig,
}

impl RegistryConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `LAYERTREE__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be applied with
    /// `with_override_config()`. Callers must call `validate()` before use;
    /// [`crate::RegistryBuilder::build`] does so.
    ///
    /// # Examples
    /// ```ignore
    /// // Load with default values only
    /// let cfg = RegistryConfig::new()?.validate()?;
    ///
    /// // Load with config file and environment variables
    /// std::env::set_var("CONFIG_PATH", "config/registry.toml");
    /// std::env::set_var("LAYERTREE__LOCALE__DEFAULT", "de-DE");
    /// let cfg = RegistryConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    ///
    /// # Example
    /// ```ignore
    /// let cfg = RegistryConfig::new()?
    ///     .with_override_config("registry_overrides.toml")?
    ///     .validate()?;
    /// ```
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    ///
    /// # Errors
    /// - A default locale that is `"*"` or not a valid name
    /// - A zero sweep threshold
    pub fn validate(self) -> Result<Self> {
        self.locale.validate()?;
        self.commit.validate()?;
        self.journal.validate()?;
        self.access.validate()?;
        Ok(self)
    }
}

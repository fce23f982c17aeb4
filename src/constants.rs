// -
// Locales

/// Root locale selecting every localized value at once
pub const ALL_LOCALES: &str = "*";

/// Prefix of the pseudo-child that picks the best-matching localized value
pub(crate) const LOCALE_CHILD_PREFIX: char = '*';

/// Last-resort locales, tried in this order
pub(crate) const DEFAULT_LOCALES: [&str; 3] = ["en-US", "en", ""];

// -
// Configuration

/// Environment variable prefix for configuration overrides
pub(crate) const ENV_PREFIX: &str = "LAYERTREE";

/// Environment variable naming an additional configuration file
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

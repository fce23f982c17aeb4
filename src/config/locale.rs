use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ALL_LOCALES;
use crate::path::is_valid_name;
use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LocaleConfig {
    /// Locale used by roots created without one. May be empty, in which
    /// case localized properties resolve to their first value.
    ///
    /// Default: `en-US`
    #[serde(default = "default_locale")]
    pub default: String,
}

fn default_locale() -> String {
    "en-US".to_string()
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: default_locale(),
        }
    }
}

impl LocaleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default == ALL_LOCALES {
            return Err(Error::Config(ConfigError::Message(format!(
                "locale.default must name a single locale, got {ALL_LOCALES:?}"
            ))));
        }
        if !self.default.is_empty() && !is_valid_name(&self.default, false) {
            return Err(Error::Config(ConfigError::Message(format!(
                "locale.default {:?} is not a valid locale tag",
                self.default
            ))));
        }
        Ok(())
    }
}

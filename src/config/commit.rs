use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CommitConfig {
    /// Log changes discarded during a commit at `warn` instead of `debug`.
    ///
    /// A change is discarded when its target was finalized, made mandatory
    /// or removed after the change was made.
    #[serde(default = "default_log_dropped_as_warning")]
    pub log_dropped_as_warning: bool,
}

fn default_log_dropped_as_warning() -> bool {
    true
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            log_dropped_as_warning: default_log_dropped_as_warning(),
        }
    }
}

impl CommitConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct JournalConfig {
    /// Maximum number of entries kept by the default in-memory journal;
    /// the oldest are evicted first. `0` keeps everything.
    #[serde(default)]
    pub capacity: usize,
}

impl JournalConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccessConfig {
    /// Number of access slot allocations after which unreachable slots are
    /// reclaimed at the start of the next operation.
    ///
    /// Default: 64
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: usize,
}

fn default_sweep_threshold() -> usize {
    64
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            sweep_threshold: default_sweep_threshold(),
        }
    }
}

impl AccessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweep_threshold == 0 {
            return Err(Error::Config(ConfigError::Message(
                "access.sweep_threshold must be > 0".into(),
            )));
        }
        Ok(())
    }
}

use crate::error::ConfigError;
use render_tree::PoolConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RendererConfig {
    pub pool: PoolConfig,
    /// Dispose a component whose lifecycle hook failed and no error boundary
    /// handled the failure. Its output is cleared first.
    pub dispose_on_lifecycle_failure: bool,
    pub dispatcher_thread_name: String,
    /// Trace a one-line summary of every delivered batch.
    pub log_batches: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            dispose_on_lifecycle_failure: false,
            dispatcher_thread_name: "trellis-dispatcher".to_string(),
            log_batches: false,
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

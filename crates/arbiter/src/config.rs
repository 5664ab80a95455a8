use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PdpError, PdpResult};

/// Decision cache selection: a factory id plus the parameters that factory
/// understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCacheConfig {
    /// Registered cache factory id (`in-memory`, `sqlite`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Implementation-specific parameters, checked by the factory.
    #[serde(flatten)]
    pub params: toml::Table,
}

impl DecisionCacheConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: toml::Table::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFilterConfig {
    /// Registered result filter id.
    #[serde(rename = "type", default = "default_filter")]
    pub kind: String,
}

fn default_filter() -> String {
    crate::filter::DEFAULT_FILTER_ID.to_string()
}

impl Default for ResultFilterConfig {
    fn default() -> Self {
        Self {
            kind: default_filter(),
        }
    }
}

/// PDP configuration, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PdpConfig {
    /// Make the XACML 1.x ordered/unordered deny- and permit-overrides
    /// algorithms available.
    #[serde(default)]
    pub enable_legacy_combining_algorithms: bool,

    /// Require an exact issuer match on attribute lookup. Otherwise a
    /// designator without issuer matches values from any issuer.
    #[serde(default)]
    pub strict_attribute_issuer_match: bool,

    /// No decision cache when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_cache: Option<DecisionCacheConfig>,

    #[serde(default)]
    pub result_filter: ResultFilterConfig,
}

impl PdpConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> PdpResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(PdpError::Io)?;
        let config: PdpConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> PdpResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PdpError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PdpError::Io)?;
        }
        std::fs::write(path, contents).map_err(PdpError::Io)?;
        Ok(())
    }

    /// Validate configuration values. Whether the named cache and filter
    /// exist is checked when the PDP is built.
    pub fn validate(&self) -> PdpResult<()> {
        if let Some(cache) = &self.decision_cache {
            if cache.kind.trim().is_empty() {
                return Err(PdpError::Config(
                    "decision_cache.type must not be empty".into(),
                ));
            }
        }
        if self.result_filter.kind.trim().is_empty() {
            return Err(PdpError::Config(
                "result_filter.type must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// Analysis configuration
//
// Loaded from an optional TOML file; command-line flags override it. Every
// field has a default, so an empty file is a valid configuration.

use crate::error::ProcessError;
use crate::linker::ProximityThresholds;
use crate::operation::ReduceOptions;
use crate::processor::ProcessOptions;
use crate::registry::DEFAULT_KINDS;
use crate::role::OperationKind;
use crate::user_functions::FunctionLayout;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for one correlation run
///
/// # Example
/// ```
/// use netstitch::config::AnalysisConfig;
///
/// let config = AnalysisConfig::from_toml_str(r#"
///     kinds = ["client-connection"]
///
///     [proximity]
///     max_init_delta_ns = 3000000
/// "#).unwrap();
/// assert_eq!(config.proximity.max_init_delta_ns, 3_000_000);
/// assert_eq!(config.proximity.max_after_delta_ns, 10_000_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Operation kinds to reconstruct, in merge priority order
    pub kinds: Vec<OperationKind>,

    /// Embed raw activities in operation summaries
    ///
    /// Off by default: raw resources dominate output size.
    pub include_raw: bool,

    pub function_layout: FunctionLayout,

    /// TLS/TCP proximity windows
    pub proximity: ProximityThresholds,

    /// Replacement role signature table (TOML)
    pub signatures: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_KINDS.to_vec(),
            include_raw: false,
            function_layout: FunctionLayout::default(),
            proximity: ProximityThresholds::default(),
            signatures: None,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse analysis config")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kinds.is_empty() {
            return Err("kinds must name at least one operation kind".to_string());
        }
        self.proximity.validate()
    }

    pub fn process_options(&self) -> Result<ProcessOptions, ProcessError> {
        self.validate().map_err(ProcessError::Config)?;
        Ok(ProcessOptions {
            reduce: ReduceOptions {
                include_raw: self.include_raw,
                function_layout: self.function_layout,
            },
            proximity: self.proximity,
        })
    }
}

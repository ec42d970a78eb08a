//! Inference options, loadable from TOML

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Infer globals and static fields from their initializers
    #[serde(default = "default_true")]
    pub infer_top_level: bool,
    /// Infer instance fields and method signatures from overridden members
    #[serde(default = "default_true")]
    pub infer_instance_members: bool,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Write the JSON inference report here after each run
    pub export_path: Option<PathBuf>,
    /// Include per-expression static types from the final pass
    #[serde(default)]
    pub include_expression_types: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            infer_top_level: true,
            infer_instance_members: true,
            report: ReportConfig::default(),
        }
    }
}

impl InferenceOptions {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CoreError> {
        toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("Failed to parse inference options: {}", e)))
    }

    pub fn with_top_level(mut self, enabled: bool) -> Self {
        self.infer_top_level = enabled;
        self
    }

    pub fn with_instance_members(mut self, enabled: bool) -> Self {
        self.infer_instance_members = enabled;
        self
    }

    pub fn should_export_report(&self) -> bool {
        self.report.export_path.is_some()
    }
}

impl FromStr for InferenceOptions {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

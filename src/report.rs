//! TOML run reports.
//!
//! Each command can persist a report describing what ran: timestamp, crate
//! version, command line, model, configuration and results. Reports land in
//! the output directory (or next to the annotations file) as
//! `<tool>_report.toml`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Execution context for a tool invocation
#[derive(Serialize, Debug, Clone)]
pub struct ExecutionContext {
    pub timestamp: DateTime<Utc>,
    pub plume_version: String,
    pub command_line: Vec<String>,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<String>,
    pub total_processing_time_ms: f64,
}

impl ExecutionContext {
    pub fn new(model_name: &str, weights: Option<&str>, processing_time_ms: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            plume_version: env!("CARGO_PKG_VERSION").to_string(),
            command_line: std::env::args().collect(),
            model_name: model_name.to_string(),
            weights: weights.map(|w| w.to_string()),
            total_processing_time_ms: processing_time_ms,
        }
    }
}

/// A complete run report: execution context, configuration, results.
#[derive(Serialize, Debug)]
pub struct RunReport {
    pub execution: ExecutionContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<toml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<toml::Value>,
}

impl RunReport {
    pub fn new(execution: ExecutionContext) -> Self {
        Self {
            execution,
            config: None,
            results: None,
        }
    }

    pub fn with_config<T: Serialize>(mut self, config: &T) -> Result<Self> {
        self.config = Some(toml::Value::try_from(config)?);
        Ok(self)
    }

    pub fn with_results<T: Serialize>(mut self, results: &T) -> Result<Self> {
        self.results = Some(toml::Value::try_from(results)?);
        Ok(self)
    }

    /// Write the report, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }
}

/// Resolve where a tool's report file belongs: inside `output_dir` when one
/// is configured, otherwise next to the annotations file.
pub fn report_path(
    output_dir: Option<&str>,
    annotations: &Path,
    tool_name: &str,
) -> PathBuf {
    let dir = match output_dir {
        Some(dir) => PathBuf::from(dir),
        None => annotations
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf(),
    };
    dir.join(format!("{tool_name}_report.toml"))
}

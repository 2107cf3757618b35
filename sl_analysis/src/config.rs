use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::polars_err;

pub const CONFIG_FILE: &str = "sl_config.json";

/// Strict lower bound on |min flux| for a pair to count as RSL.
pub const DEFAULT_TOLERANCE: f64 = 0.0;

/// Controls how tables are printed and whether figures are opened after rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `None` prints every row.
    pub max_rows: Option<usize>,
    /// `None` prints every column.
    pub max_columns: Option<usize>,
    pub show_figures: bool,
    /// Program used to open written figures. Falls back to the platform opener.
    pub viewer: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_rows: None,
            max_columns: None,
            show_figures: true,
            viewer: None,
        }
    }
}

impl DisplayConfig {
    /// No truncation and no viewer; used for batch runs and tests.
    pub fn headless() -> Self {
        Self {
            show_figures: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub font_family: String,
    pub font_size: u32,
    pub title_size: u32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            font_size: 14,
            title_size: 20,
        }
    }
}

/// Inputs for one metabolic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInputs {
    pub name: String,
    pub pfba_path: PathBuf,
    pub fva_path: PathBuf,
    /// JSON dump of simulation-harness records, if one was produced.
    #[serde(default)]
    pub harness_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub examples_dir: PathBuf,
    pub results_dir: PathBuf,
    pub tolerance: f64,
    pub path_columns: Vec<String>,
    pub models: Vec<ModelInputs>,
    pub display: DisplayConfig,
    pub chart: ChartStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            examples_dir: PathBuf::from("examples"),
            results_dir: PathBuf::from("results"),
            tolerance: DEFAULT_TOLERANCE,
            path_columns: ["rxns", "PathShort", "PathLong", "pathCommon", "solStatus", "diff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            models: Vec::new(),
            display: DisplayConfig::default(),
            chart: ChartStyle::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> PolarsResult<Self> {
        let file = File::open(path).map_err(|e| polars_err(Box::new(e)))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| polars_err(Box::new(e)))
    }

    /// Reads `sl_config.json` under `project_root`, or returns defaults when absent.
    /// Relative directories are resolved against `project_root`.
    pub fn load(project_root: &Path) -> PolarsResult<Self> {
        let path = project_root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            info!("Reading pipeline configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            info!("No {} found, using default configuration", CONFIG_FILE);
            Self::default()
        };

        if config.examples_dir.is_relative() {
            config.examples_dir = project_root.join(&config.examples_dir);
        }
        if config.results_dir.is_relative() {
            config.results_dir = project_root.join(&config.results_dir);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.tolerance, 0.0);
        assert_eq!(config.results_dir, dir.path().join("results"));
        assert!(config.path_columns.contains(&"diff".to_string()));
        assert!(config.display.max_rows.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "tolerance": 1e-6,
                "results_dir": "/tmp/out",
                "display": { "show_figures": false },
                "models": [{ "name": "e_coli_core", "pfba_path": "a.csv", "fva_path": "b.csv" }]
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.results_dir, PathBuf::from("/tmp/out"));
        assert!(!config.display.show_figures);
        assert_eq!(config.chart.font_family, "serif");
        assert_eq!(config.models[0].name, "e_coli_core");
        assert!(config.models[0].harness_path.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(PipelineConfig::load(dir.path()).is_err());
    }
}

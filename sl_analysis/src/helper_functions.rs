use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::DisplayConfig;
use crate::models::{polars_err, DistanceNorm};

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

/// Writes `df` as CSV, creating parent directories. Overwrites any existing file.
pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path, include_header: bool) -> PolarsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))?;
    }
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .finish(df)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// `<base>/<model>/<model>_<column>_<norm>.csv`
pub fn input_table_path(base: &Path, model: &str, column: &str, norm: DistanceNorm) -> PathBuf {
    base.join(model)
        .join(format!("{}_{}_{}.csv", model, column, norm.tag()))
}

/// `<results>/<model>/<model>_PSL_RSL_distribution.csv`
pub fn distribution_csv_path(results_dir: &Path, model: &str) -> PathBuf {
    results_dir
        .join(model)
        .join(format!("{}_PSL_RSL_distribution.csv", model))
}

/// `<results>/images/<model>_PSL_RSL_dist.png`
pub fn pie_chart_path(results_dir: &Path, model: &str) -> PathBuf {
    results_dir
        .join("images")
        .join(format!("{}_PSL_RSL_dist.png", model))
}

pub fn ensure_parent_dir(path: &Path) -> PolarsResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))
        }
        _ => Ok(()),
    }
}

fn find_viewer(display: &DisplayConfig) -> Option<PathBuf> {
    if let Some(viewer) = &display.viewer {
        return which::which(viewer).ok();
    }
    ["xdg-open", "open"]
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
}

/// Hands a written figure to an external viewer. A missing viewer is not an error.
pub fn show_figure(path: &Path, display: &DisplayConfig) -> PolarsResult<()> {
    if !display.show_figures {
        return Ok(());
    }

    let Some(viewer) = find_viewer(display) else {
        warn!("No figure viewer found, {} was written but not shown", path.display());
        return Ok(());
    };

    info!("Opening {} with {}", path.display(), viewer.display());
    spawn_viewer(&viewer, path)?;
    Ok(())
}

/// Starts the viewer and reaps it on a detached thread once it exits.
fn spawn_viewer(viewer: &Path, path: &Path) -> PolarsResult<JoinHandle<Option<ExitStatus>>> {
    let mut child = Command::new(viewer)
        .arg(path)
        .spawn()
        .map_err(|e| polars_err(Box::new(e)))?;
    let pid = child.id();
    debug!("Viewer {} running as pid {}", viewer.display(), pid);

    Ok(thread::spawn(move || match child.wait() {
        Ok(status) => {
            debug!("Viewer pid {} exited with {}", pid, status);
            Some(status)
        }
        Err(e) => {
            warn!("Could not wait on viewer pid {}: {}", pid, e);
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use tempfile::tempdir;

    #[test]
    fn input_paths_follow_model_layout() {
        let p = input_table_path(Path::new("examples"), "iML1515", "PathShort", DistanceNorm::L1);
        assert_eq!(p, PathBuf::from("examples/iML1515/iML1515_PathShort_L1.csv"));
    }

    #[test]
    fn output_paths_follow_model_layout() {
        let results = Path::new("results");
        assert_eq!(
            distribution_csv_path(results, "e_coli_core"),
            PathBuf::from("results/e_coli_core/e_coli_core_PSL_RSL_distribution.csv")
        );
        assert_eq!(
            pie_chart_path(results, "e_coli_core"),
            PathBuf::from("results/images/e_coli_core_PSL_RSL_dist.png")
        );
    }

    #[test]
    fn csv_round_trip_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let mut df = df!["a" => &[1i64, 2], "b" => &["x", "y"]].unwrap();
        dataframe_to_csv(&mut df, &path, true).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.column("b").unwrap().str().unwrap().get(1), Some("y"));
    }

    #[test]
    fn headless_never_spawns() {
        assert!(show_figure(Path::new("missing.png"), &DisplayConfig::headless()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn viewer_is_reaped_after_exit() {
        let viewer = which::which("true").unwrap();
        let handle = spawn_viewer(&viewer, Path::new("figure.png")).unwrap();
        let status = handle.join().unwrap();
        assert!(status.is_some_and(|s| s.success()));
    }

    #[cfg(unix)]
    #[test]
    fn configured_viewer_is_used() {
        let display = DisplayConfig {
            viewer: Some("true".to_string()),
            ..DisplayConfig::default()
        };
        assert!(show_figure(Path::new("figure.png"), &display).is_ok());
    }
}

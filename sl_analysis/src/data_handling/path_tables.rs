use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::input_table_path;
use crate::models::{polars_err, Dataset, DistanceNorm};

/// Columns whose empty value means "no path" and therefore a count of zero.
const PATH_COLUMNS: [&str; 3] = ["PathShort", "PathLong", "pathCommon"];

/// Columns that must be present for the count drop/rename step.
const REQUIRED_COLUMNS: [&str; 5] = ["PathShort", "PathLong", "pathCommon", "solStatus", "diff"];

/// Count columns without meaning as token counts.
const DROPPED_COUNTS: [&str; 2] = ["num_solStatus", "num_diff"];

/// Count columns that receive the norm prefix.
const PREFIXED_COUNTS: [&str; 4] = ["num_PathShort", "num_PathLong", "num_pathCommon", "num_rxns"];

/// One value per line after the header.
fn read_column_file(path: &Path) -> PolarsResult<Vec<String>> {
    let file = File::open(path).map_err(|e| {
        error!("Failed to open {}: {}", path.display(), e);
        polars_err(Box::new(e))
    })?;

    let mut lines = BufReader::new(file).lines();
    if let Some(header) = lines.next() {
        let header = header.map_err(|e| polars_err(Box::new(e)))?;
        debug!("{} header: {}", path.display(), header);
    }
    lines
        .map(|l| l.map_err(|e| polars_err(Box::new(e))))
        .collect()
}

/// Number of comma-separated tokens; an empty path string counts as zero paths.
fn token_count(column: &str, raw: &str) -> i64 {
    if raw.is_empty() && PATH_COLUMNS.contains(&column) {
        0
    } else {
        raw.split(',').count() as i64
    }
}

/// Builds the wide per-model path table for one distance norm.
pub fn get_dataframes(
    name: &str,
    columns: &[&str],
    norm: DistanceNorm,
    examples_dir: &Path,
) -> PolarsResult<DataFrame> {
    for required in REQUIRED_COLUMNS {
        if !columns.contains(&required) {
            return Err(PolarsError::ColumnNotFound(
                format!("path table for {} needs a `{}` column", name, required).into(),
            ));
        }
    }

    let mut series: Vec<Column> = Vec::with_capacity(columns.len() * 2);
    for &column in columns {
        let path = input_table_path(examples_dir, name, column, norm);
        let values = read_column_file(&path)?;
        debug!("Read {} values for {} from {}", values.len(), column, path.display());

        let counts: Vec<i64> = values.iter().map(|v| token_count(column, v)).collect();
        series.push(Column::new(column.into(), values));
        series.push(Column::new(format!("num_{}", column).into(), counts));
    }

    let mut df = DataFrame::new(series)?;
    for dropped in DROPPED_COUNTS {
        df = df.drop(dropped)?;
    }
    for counted in PREFIXED_COUNTS {
        if df.get_column_index(counted).is_some() {
            df.rename(counted, format!("{}_{}", norm.tag(), counted).into())?;
        }
    }

    info!("Loaded {} {} path table: {} rows", name, norm, df.height());
    Ok(df)
}

pub fn get_dataframes0(name: &str, columns: &[&str], examples_dir: &Path) -> PolarsResult<DataFrame> {
    get_dataframes(name, columns, DistanceNorm::L0, examples_dir)
}

pub fn get_dataframes1(name: &str, columns: &[&str], examples_dir: &Path) -> PolarsResult<DataFrame> {
    get_dataframes(name, columns, DistanceNorm::L1, examples_dir)
}

/// Path table of one model under one norm, as a loadable dataset.
pub struct PathTables {
    pub examples_dir: PathBuf,
    pub model: String,
    pub columns: Vec<String>,
    pub norm: DistanceNorm,
}

impl Dataset for PathTables {
    fn load(&self) -> PolarsResult<DataFrame> {
        let columns: Vec<&str> = self.columns.iter().map(|s| s.as_str()).collect();
        match self.norm {
            DistanceNorm::L0 => get_dataframes0(&self.model, &columns, &self.examples_dir),
            DistanceNorm::L1 => get_dataframes1(&self.model, &columns, &self.examples_dir),
        }
    }
}

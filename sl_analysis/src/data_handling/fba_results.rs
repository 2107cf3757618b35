use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::analysis::table_display;
use crate::config::DisplayConfig;
use crate::helper_functions::read_csv;
use crate::models::Dataset;

/// Column order of a combined pFBA/FVA reaction-pair table.
pub const COMBINED_COLUMNS: [&str; 10] = [
    "Rxn_1", "Rxn_1_Type", "Rxn_1_Min", "Rxn_1_Max",
    "Rxn_2", "Rxn_2_Type", "Rxn_2_Min", "Rxn_2_Max",
    "v1", "v2",
];

/// pFBA classification table: one row per reaction pair with `Rxn_1_Class`/`Rxn_2_Class`.
pub struct PfbaResults {
    pub path: PathBuf,
}

/// FVA flux-range table: one row per reaction pair with min/max bounds and `v1`/`v2`.
pub struct FvaResults {
    pub path: PathBuf,
}

impl Dataset for PfbaResults {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading pFBA classes from {}", self.path.display());
        read_csv(&self.path).map_err(|e| {
            error!("Failed to read pFBA CSV: {}", e);
            e
        })
    }
}

impl Dataset for FvaResults {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading FVA ranges from {}", self.path.display());
        read_csv(&self.path).map_err(|e| {
            error!("Failed to read FVA CSV: {}", e);
            e
        })
    }
}

/// Attaches the pFBA reaction classes to the FVA flux ranges.
///
/// Rows are aligned by position, so both tables must enumerate the reaction
/// pairs in the same order.
pub fn combine_results(
    df_pfba: &DataFrame,
    df_fva: &DataFrame,
    display: &DisplayConfig,
) -> PolarsResult<DataFrame> {
    if df_pfba.height() != df_fva.height() {
        return Err(PolarsError::ShapeMismatch(
            format!(
                "pFBA table has {} rows but FVA table has {}",
                df_pfba.height(),
                df_fva.height()
            )
            .into(),
        ));
    }

    let mut df = df_fva.clone();
    for (class_col, type_col) in [("Rxn_1_Class", "Rxn_1_Type"), ("Rxn_2_Class", "Rxn_2_Type")] {
        let mut c = df_pfba.column(class_col)?.clone();
        c.rename(type_col.into());
        df.with_column(c)?;
    }

    let df = df.select(COMBINED_COLUMNS)?;
    let rendered = table_display::render(&df, display);
    debug!("Combined table:\n{}", rendered);
    Ok(df)
}

use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::helper_functions::{dataframe_to_csv, distribution_csv_path};
use crate::models::Lethality;

/// Grouping key of the PSL/RSL distribution.
pub const DISTRIBUTION_KEY: [&str; 3] = ["Type", "Rxn_1_Type", "Rxn_2_Type"];

/// Labels every reaction pair `RSL` when both minimum fluxes exceed `tol` in
/// magnitude and `PSL` otherwise. Writes the label into `Type`.
pub fn psl_rsl(df: DataFrame, tol: f64) -> PolarsResult<DataFrame> {
    let robust = col("Rxn_1_Min")
        .cast(DataType::Float64)
        .abs()
        .gt(lit(tol))
        .and(col("Rxn_2_Min").cast(DataType::Float64).abs().gt(lit(tol)));

    df.lazy()
        .with_column(
            when(robust)
                .then(lit(Lethality::Rsl.as_str()))
                .otherwise(lit(Lethality::Psl.as_str()))
                .alias("Type"),
        )
        .collect()
}

/// Counts reaction pairs per (`Type`, `Rxn_1_Type`, `Rxn_2_Type`), normalises
/// by the total number of pairs and saves the summary under
/// `results_dir/<model>/<model>_PSL_RSL_distribution.csv`.
pub fn get_distribution(df: &DataFrame, model: &str, results_dir: &Path) -> PolarsResult<DataFrame> {
    let key: Vec<Expr> = DISTRIBUTION_KEY.iter().map(|k| col(*k)).collect();

    let mut summary = df
        .clone()
        .lazy()
        .group_by(key)
        .agg([len().cast(DataType::Int64).alias("Count")])
        .with_column(
            (col("Count").cast(DataType::Float64) / col("Count").sum().cast(DataType::Float64))
                .alias("Fraction"),
        )
        .sort(DISTRIBUTION_KEY, SortMultipleOptions::default())
        .collect()?;

    let path = distribution_csv_path(results_dir, model);
    dataframe_to_csv(&mut summary, &path, true)?;
    info!(
        "{}: {} pair combinations over {} pairs saved to {}",
        model,
        summary.height(),
        df.height(),
        path.display()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use polars::df;
    use std::fs;
    use tempfile::tempdir;

    fn pairs() -> DataFrame {
        df![
            "Rxn_1" => &["A", "B", "C", "D", "E"],
            "Rxn_1_Type" => &["pFBAOpt_Rxns", "ZeroFlux_Rxns", "pFBAOpt_Rxns", "pFBAOpt_Rxns", "ELE_Rxns"],
            "Rxn_1_Min" => &[0.5, 0.0, -2.0, 1.0, 0.1],
            "Rxn_1_Max" => &[1.0, 1.0, 1.0, 1.0, 1.0],
            "Rxn_2" => &["F", "G", "H", "I", "J"],
            "Rxn_2_Type" => &["MLE_Rxns", "pFBAOpt_Rxns", "MLE_Rxns", "MLE_Rxns", "ELE_Rxns"],
            "Rxn_2_Min" => &[0.5, 3.0, 1.0, 0.5, 0.1],
            "Rxn_2_Max" => &[1.0, 4.0, 2.0, 1.0, 1.0],
            "v1" => &[0.7, 0.0, -1.0, 1.0, 0.2],
            "v2" => &[0.6, 3.5, 1.5, 0.7, 0.2]
        ]
        .unwrap()
    }

    fn labels(df: &DataFrame) -> Vec<String> {
        df.column("Type")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn classification_matches_predicate() {
        let df = psl_rsl(pairs(), 0.0).unwrap();
        assert_eq!(labels(&df), vec!["RSL", "PSL", "RSL", "RSL", "RSL"]);
    }

    #[test]
    fn tolerance_boundary_is_psl() {
        let df = psl_rsl(pairs(), 0.5).unwrap();
        assert_eq!(labels(&df), vec!["PSL", "PSL", "RSL", "PSL", "PSL"]);
    }

    #[test]
    fn fractions_sum_to_one_and_counts_to_rows() {
        let dir = tempdir().unwrap();
        let df = psl_rsl(pairs(), 0.0).unwrap();
        let summary = get_distribution(&df, "toy", dir.path()).unwrap();

        let names: Vec<&str> = summary.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Type", "Rxn_1_Type", "Rxn_2_Type", "Count", "Fraction"]);

        let counts = summary.column("Count").unwrap().i64().unwrap();
        assert_eq!(counts.sum(), Some(5));
        let fractions = summary.column("Fraction").unwrap().f64().unwrap();
        assert_relative_eq!(fractions.sum().unwrap(), 1.0, epsilon = 1e-12);
        assert!(fractions.into_no_null_iter().all(|f| f >= 0.0));

        // (RSL, pFBAOpt_Rxns, MLE_Rxns) holds three pairs
        let first_rsl = labels(&summary).iter().position(|t| t == "RSL").unwrap();
        assert_eq!(labels(&summary)[0], "PSL");
        assert!(counts.into_no_null_iter().any(|c| c == 3));
        assert!(first_rsl > 0);
    }

    #[test]
    fn export_is_idempotent() {
        let dir = tempdir().unwrap();
        let df = psl_rsl(pairs(), 0.0).unwrap();
        let path = distribution_csv_path(dir.path(), "toy");

        get_distribution(&df, "toy", dir.path()).unwrap();
        let first = fs::read(&path).unwrap();
        get_distribution(&df, "toy", dir.path()).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with("Type,Rxn_1_Type,Rxn_2_Type,Count,Fraction"));
    }
}

use anyhow::Context;
use polars::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::lethality::{get_distribution, psl_rsl};
use crate::analysis::pie_chart::plot_results;
use crate::analysis::ridgeline::{group_means, plot_ridge_lines, RidgelineOptions};
use crate::config::{ModelInputs, PipelineConfig};
use crate::data_handling::fba_results::{combine_results, FvaResults, PfbaResults};
use crate::data_handling::harness::HarnessDump;
use crate::data_handling::path_tables::PathTables;
use crate::helper_functions::project_root;
use crate::models::{Dataset, DistanceNorm, Lethality};

mod analysis;
mod config;
mod data_handling;
mod helper_functions;
mod models;

const GROUP_COLUMN: &str = "Organism";

fn with_organism(mut df: DataFrame, model: &str) -> PolarsResult<DataFrame> {
    let organism = Column::new(GROUP_COLUMN.into(), vec![model; df.height()]);
    df.with_column(organism)?;
    Ok(df)
}

fn stack(acc: Option<DataFrame>, df: DataFrame) -> PolarsResult<Option<DataFrame>> {
    match acc {
        None => Ok(Some(df)),
        Some(mut acc) => {
            acc.vstack_mut(&df)?;
            Ok(Some(acc))
        }
    }
}

/// Combine, classify, summarise and chart the reaction pairs of one model.
fn run_lethality(model: &ModelInputs, config: &PipelineConfig) -> PolarsResult<()> {
    let df_pfba = PfbaResults { path: model.pfba_path.clone() }.load()?;
    let df_fva = FvaResults { path: model.fva_path.clone() }.load()?;

    let combined = combine_results(&df_pfba, &df_fva, &config.display)?;
    let labelled = psl_rsl(combined, config.tolerance)?;
    let summary = get_distribution(&labelled, &model.name, &config.results_dir)?;
    let totals = plot_results(&summary, &model.name, &config.results_dir, &config.chart, &config.display)?;

    for lethality in Lethality::ALL {
        info!(
            "{} {}: count {}, fraction {:.4}",
            model.name,
            lethality,
            totals.count_of(lethality),
            totals.fraction_of(lethality)
        );
    }
    Ok(())
}

fn ridgeline(df: &DataFrame, value: &str, figname: &str, title: &str, config: &PipelineConfig) -> PolarsResult<()> {
    let opts = RidgelineOptions {
        by: GROUP_COLUMN.to_string(),
        value: value.to_string(),
        means: group_means(df, GROUP_COLUMN, value)?,
        figname: config.results_dir.join("images").join(figname),
        title: title.to_string(),
        xlabel: value.to_string(),
        ylabel: GROUP_COLUMN.to_string(),
        ..Default::default()
    };
    plot_ridge_lines(df, &opts, &config.chart, &config.display)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the synthetic-lethality analysis");

    let root = project_root();
    let config = PipelineConfig::load(&root).context("loading pipeline configuration")?;
    if config.models.is_empty() {
        warn!("No models configured in {}", root.join(config::CONFIG_FILE).display());
    }

    let mut l0_tables = None;
    let mut l1_tables = None;
    let mut harness_tables = None;

    for model in &config.models {
        info!("Processing model {}", model.name);
        run_lethality(model, &config).with_context(|| format!("PSL/RSL analysis of {}", model.name))?;

        if config.examples_dir.join(&model.name).is_dir() {
            for (norm, acc) in [(DistanceNorm::L0, &mut l0_tables), (DistanceNorm::L1, &mut l1_tables)] {
                let table = PathTables {
                    examples_dir: config.examples_dir.clone(),
                    model: model.name.clone(),
                    columns: config.path_columns.clone(),
                    norm,
                }
                .load()
                .with_context(|| format!("{} path tables of {}", norm, model.name))?;
                *acc = stack(acc.take(), with_organism(table, &model.name)?)?;
            }
        } else {
            info!("No path tables for {} under {}", model.name, config.examples_dir.display());
        }

        if let Some(path) = &model.harness_path {
            let df = HarnessDump { path: path.clone() }
                .load()
                .with_context(|| format!("harness records of {}", model.name))?;
            harness_tables = stack(harness_tables, with_organism(df, &model.name)?)?;
        }
    }

    if let Some(df) = &l0_tables {
        ridgeline(df, "L0_num_PathShort", "PathShort_L0_ridgeline.png", "Shortest paths (L0)", &config)?;
    }
    if let Some(df) = &l1_tables {
        ridgeline(df, "L1_num_PathShort", "PathShort_L1_ridgeline.png", "Shortest paths (L1)", &config)?;
    }
    if let Some(df) = &harness_tables {
        ridgeline(df, "sl_size", "sl_size_ridgeline.png", "Synthetic lethal set size", &config)?;
        ridgeline(df, "net_diff", "net_diff_ridgeline.png", "Net flux difference", &config)?;
    }

    info!("Analysis finished");
    Ok(())
}

use std::collections::BTreeSet;
use std::path::Path;

use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use polars::prelude::*;
use tracing::{info, warn};

use crate::config::{ChartStyle, DisplayConfig};
use crate::helper_functions::{ensure_parent_dir, pie_chart_path, show_figure};
use crate::models::{polars_err, Lethality};

/// Inner hole of each donut as a fraction of its radius.
pub const DONUT_HOLE: f64 = 0.4;

const CHART_SIZE: (u32, u32) = (1200, 600);

/// Slice colours, assigned to combinations in sorted order so a combination
/// keeps its colour in both donuts.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x99, 0xcc, 0xff),
    RGBColor(0xcc, 0x99, 0xff),
    RGBColor(0xff, 0x99, 0x66),
    RGBColor(0xff, 0x66, 0x99),
    RGBColor(0xcc, 0xcc, 0xff),
    RGBColor(0xff, 0x99, 0xff),
    RGBColor(0xff, 0x66, 0x00),
    RGBColor(0xff, 0x50, 0x50),
    RGBColor(0xe6, 0xf2, 0xff),
    RGBColor(0xff, 0x00, 0x00),
];

/// Summed `Count` and `Fraction` per lethality type, indexed PSL then RSL.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TypeTotals {
    pub count: [i64; 2],
    pub fraction: [f64; 2],
}

impl TypeTotals {
    fn index(lethality: Lethality) -> usize {
        match lethality {
            Lethality::Psl => 0,
            Lethality::Rsl => 1,
        }
    }

    pub fn count_of(&self, lethality: Lethality) -> i64 {
        self.count[Self::index(lethality)]
    }

    pub fn fraction_of(&self, lethality: Lethality) -> f64 {
        self.fraction[Self::index(lethality)]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Slice {
    label: String,
    percent: f64,
}

/// Adds `Combination` = "<Rxn_1_Type>, <Rxn_2_Type>".
pub fn with_combination(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .with_column((col("Rxn_1_Type") + lit(", ") + col("Rxn_2_Type")).alias("Combination"))
        .collect()
}

fn slices_for(df: &DataFrame, lethality: Lethality) -> PolarsResult<Vec<Slice>> {
    let subset = df
        .clone()
        .lazy()
        .filter(col("Type").eq(lit(lethality.as_str())))
        .select([col("Combination"), col("Fraction").cast(DataType::Float64)])
        .collect()?;

    let labels = subset.column("Combination")?.str()?;
    let fractions = subset.column("Fraction")?.f64()?;
    Ok(labels
        .into_iter()
        .zip(fractions.into_iter())
        .filter_map(|(label, fraction)| {
            Some(Slice {
                label: label?.to_string(),
                percent: fraction? * 100.0,
            })
        })
        .collect())
}

/// Per-type sums, sorted on `Type` so PSL always precedes RSL.
pub fn type_totals(df: &DataFrame) -> PolarsResult<TypeTotals> {
    let grouped = df
        .clone()
        .lazy()
        .group_by([col("Type")])
        .agg([
            col("Count").cast(DataType::Int64).sum().alias("Count"),
            col("Fraction").cast(DataType::Float64).sum().alias("Fraction"),
        ])
        .sort(["Type"], SortMultipleOptions::default())
        .collect()?;

    let types = grouped.column("Type")?.str()?;
    let counts = grouped.column("Count")?.i64()?;
    let fractions = grouped.column("Fraction")?.f64()?;

    let mut totals = TypeTotals::default();
    for i in 0..grouped.height() {
        let lethality = match types.get(i) {
            Some("PSL") => Lethality::Psl,
            Some("RSL") => Lethality::Rsl,
            other => {
                warn!("Ignoring unexpected lethality type {:?}", other);
                continue;
            }
        };
        let idx = TypeTotals::index(lethality);
        totals.count[idx] = counts.get(i).unwrap_or(0);
        totals.fraction[idx] = fractions.get(i).unwrap_or(0.0);
    }
    Ok(totals)
}

fn draw_donut(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    lethality: Lethality,
    slices: &[Slice],
    colours: &[RGBColor],
    style: &ChartStyle,
) -> PolarsResult<()> {
    let font = style.font_family.as_str();
    let area = area
        .titled(lethality.as_str(), (font, style.title_size))
        .map_err(|e| polars_err(Box::new(e)))?;

    let (w, h) = area.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);

    if slices.is_empty() {
        warn!("No {} pairs to chart", lethality);
        area.draw(&Text::new(
            format!("no {} pairs", lethality),
            (center.0 - 40, center.1),
            (font, style.font_size),
        ))
        .map_err(|e| polars_err(Box::new(e)))?;
        return Ok(());
    }

    let radius = w.min(h) as f64 * 0.3;
    let sizes: Vec<f64> = slices.iter().map(|s| s.percent).collect();
    let labels: Vec<&str> = slices.iter().map(|s| s.label.as_str()).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, colours, &labels);
    pie.donut_hole(radius * DONUT_HOLE);
    pie.label_style((font, style.font_size).into_font().color(&BLACK));
    pie.percentages((font, style.font_size.saturating_sub(2)).into_font().color(&BLACK));
    area.draw(&pie).map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}

/// Draws PSL and RSL donuts side by side for a distribution summary, writes the
/// PNG to `results_dir/images/<model>_PSL_RSL_dist.png`, shows it and returns
/// the per-type totals.
pub fn plot_results(
    df: &DataFrame,
    model: &str,
    results_dir: &Path,
    style: &ChartStyle,
    display: &DisplayConfig,
) -> PolarsResult<TypeTotals> {
    let df = with_combination(df)?;
    let psl = slices_for(&df, Lethality::Psl)?;
    let rsl = slices_for(&df, Lethality::Rsl)?;

    let combinations: BTreeSet<&str> = psl.iter().chain(rsl.iter()).map(|s| s.label.as_str()).collect();
    let colour_of = |label: &str| {
        let i = combinations.iter().position(|c| *c == label).unwrap_or(0);
        PALETTE[i % PALETTE.len()]
    };
    let psl_colours: Vec<RGBColor> = psl.iter().map(|s| colour_of(&s.label)).collect();
    let rsl_colours: Vec<RGBColor> = rsl.iter().map(|s| colour_of(&s.label)).collect();

    let path = pie_chart_path(results_dir, model);
    ensure_parent_dir(&path)?;
    {
        let root = BitMapBackend::new(&path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;
        let root = root
            .titled(&format!("Model: {}", model), (style.font_family.as_str(), style.title_size + 4))
            .map_err(|e| polars_err(Box::new(e)))?;

        let (left, right) = root.split_horizontally((CHART_SIZE.0 / 2) as i32);
        draw_donut(&left, Lethality::Psl, &psl, &psl_colours, style)?;
        draw_donut(&right, Lethality::Rsl, &rsl, &rsl_colours, style)?;
        root.present().map_err(|e| polars_err(Box::new(e)))?;
    }
    info!("PSL/RSL donut charts for {} saved to {}", model, path.display());
    show_figure(&path, display)?;

    let totals = type_totals(&df)?;
    info!(
        "{}: PSL {} pairs ({:.3}), RSL {} pairs ({:.3})",
        model,
        totals.count_of(Lethality::Psl),
        totals.fraction_of(Lethality::Psl),
        totals.count_of(Lethality::Rsl),
        totals.fraction_of(Lethality::Rsl)
    );
    Ok(totals)
}

//! Ridgeline (joy) plots: one Gaussian KDE curve per group, stacked vertically
//! over a shared x axis, with optional markers at group means.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array1;
use plotters::coord::Shift;
use plotters::prelude::*;
use polars::prelude::*;
use statrs::distribution::{Continuous, Normal};
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

use crate::config::{ChartStyle, DisplayConfig};
use crate::helper_functions::{ensure_parent_dir, show_figure};
use crate::models::polars_err;

const GRID_POINTS: usize = 500;
const FIGURE_SIZE: (u32, u32) = (1200, 800);
/// Tallest curve height in units of the spacing between baselines.
const RIDGE_HEIGHT: f64 = 1.2;

#[derive(Debug, Clone)]
pub struct RidgelineOptions {
    /// Grouping column; one ridge per distinct value.
    pub by: String,
    /// Numeric column whose distribution is drawn.
    pub value: String,
    /// Mean per group, in ascending group order.
    pub means: Vec<f64>,
    pub figname: PathBuf,
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    pub means_flag: bool,
    pub color: String,
    pub alpha: f64,
}

impl Default for RidgelineOptions {
    fn default() -> Self {
        Self {
            by: String::new(),
            value: String::new(),
            means: Vec::new(),
            figname: PathBuf::from("ridgeline.png"),
            title: String::new(),
            xlabel: String::new(),
            ylabel: String::new(),
            means_flag: true,
            color: "#686de0".to_string(),
            alpha: 1.0,
        }
    }
}

/// A density curve sampled on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl DensityCurve {
    /// Density at the sampled x closest to `x`. On a tie the lower sample wins.
    pub fn height_near(&self, x: f64) -> Option<f64> {
        self.xs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
            .map(|(i, _)| self.ys[i])
    }

    pub fn peak(&self) -> f64 {
        self.ys.iter().cloned().fold(0.0, f64::max)
    }
}

/// Scott's rule bandwidth, `σ · n^(-1/5)`. Degenerate samples get a unit bandwidth.
pub fn scott_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let bw = values.std_dev() * n.powf(-0.2);
    if bw.is_finite() && bw > 0.0 {
        bw
    } else {
        1.0
    }
}

/// Gaussian kernel density estimate of `values` evaluated on `grid`.
pub fn gaussian_kde(values: &[f64], grid: &[f64]) -> PolarsResult<DensityCurve> {
    let bw = scott_bandwidth(values);
    let kernel = Normal::new(0.0, 1.0).map_err(|e| polars_err(Box::new(e)))?;
    let n = values.len() as f64;

    let ys = grid
        .iter()
        .map(|&x| {
            if values.is_empty() {
                return 0.0;
            }
            values.iter().map(|&v| kernel.pdf((x - v) / bw)).sum::<f64>() / (n * bw)
        })
        .collect();

    Ok(DensityCurve {
        xs: grid.to_vec(),
        ys,
    })
}

fn parse_hex_color(hex: &str) -> PolarsResult<RGBColor> {
    let digits = hex.trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => Ok(RGBColor(r, g, b)),
        _ => Err(PolarsError::ComputeError(format!("invalid colour `{}`", hex).into())),
    }
}

/// Values of `value` per distinct `by`, groups in ascending order. Nulls are skipped.
fn grouped_values(df: &DataFrame, by: &str, value: &str) -> PolarsResult<BTreeMap<String, Vec<f64>>> {
    let groups = df.column(by)?.cast(&DataType::String)?;
    let groups = groups.str()?;
    let values = df.column(value)?.cast(&DataType::Float64)?;
    let values = values.f64()?;

    let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (group, v) in groups.into_iter().zip(values.into_iter()) {
        if let (Some(group), Some(v)) = (group, v) {
            out.entry(group.to_string()).or_default().push(v);
        }
    }
    Ok(out)
}

/// Mean of `value` per group of `by`, in the ascending group order used for ridges.
pub fn group_means(df: &DataFrame, by: &str, value: &str) -> PolarsResult<Vec<f64>> {
    Ok(grouped_values(df, by, value)?
        .values()
        .map(|v| v.iter().sum::<f64>() / v.len() as f64)
        .collect())
}

struct Ridge {
    name: String,
    curve: DensityCurve,
    mean: Option<f64>,
}

fn draw_ridges<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    ridges: &[Ridge],
    x_range: (f64, f64),
    opts: &RidgelineOptions,
    style: &ChartStyle,
) -> PolarsResult<()>
where
    DB::ErrorType: 'static,
{
    let font = style.font_family.as_str();
    let colour = parse_hex_color(&opts.color)?.mix(opts.alpha);
    let n = ridges.len();
    let scale = RIDGE_HEIGHT / ridges.iter().map(|r| r.curve.peak()).fold(f64::EPSILON, f64::max);

    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;
    let mut chart = ChartBuilder::on(&root)
        .caption(&opts.title, (font, style.title_size))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(40)
        .build_cartesian_2d(x_range.0..x_range.1, 0.0..(n as f64 - 1.0 + RIDGE_HEIGHT + 0.1))
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_labels(0)
        .x_desc(opts.xlabel.as_str())
        .y_desc(opts.ylabel.as_str())
        .label_style((font, style.font_size))
        .axis_desc_style((font, style.font_size))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    for (i, ridge) in ridges.iter().enumerate() {
        // first group on top
        let base = (n - 1 - i) as f64;

        chart
            .draw_series(LineSeries::new(
                vec![(x_range.0, base), (x_range.1, base)],
                BLACK.mix(0.3),
            ))
            .map_err(|e| polars_err(Box::new(e)))?;

        chart
            .draw_series(LineSeries::new(
                ridge
                    .curve
                    .xs
                    .iter()
                    .zip(&ridge.curve.ys)
                    .map(|(&x, &y)| (x, base + y * scale)),
                colour.stroke_width(2),
            ))
            .map_err(|e| polars_err(Box::new(e)))?;

        chart
            .draw_series(std::iter::once(Text::new(
                ridge.name.clone(),
                (x_range.0, base + 0.15),
                (font, style.font_size),
            )))
            .map_err(|e| polars_err(Box::new(e)))?;

        if let Some(mean) = ridge.mean {
            match ridge.curve.height_near(mean) {
                Some(height) => {
                    chart
                        .draw_series(std::iter::once(PathElement::new(
                            vec![(mean, base), (mean, base + height * scale)],
                            RED.stroke_width(2),
                        )))
                        .map_err(|e| polars_err(Box::new(e)))?;
                }
                None => warn!("No density samples for {}, skipping mean marker", ridge.name),
            }
        }
    }

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}

/// Builds one ridge per group of `opts.by` from `opts.value`, writes the figure
/// to `opts.figname` (SVG when the extension is `svg`, bitmap otherwise) and shows it.
pub fn plot_ridge_lines(
    df: &DataFrame,
    opts: &RidgelineOptions,
    style: &ChartStyle,
    display: &DisplayConfig,
) -> PolarsResult<()> {
    let groups = grouped_values(df, &opts.by, &opts.value)?;
    if groups.is_empty() {
        return Err(PolarsError::ComputeError(
            format!("no `{}` values to plot", opts.value).into(),
        ));
    }

    let all = groups.values().flatten();
    let x_min = all.clone().cloned().fold(f64::INFINITY, f64::min);
    let x_max = all.cloned().fold(f64::NEG_INFINITY, f64::max);
    info!("{} range: {} .. {}", opts.value, x_min, x_max);
    let x_range = if x_max > x_min { (x_min, x_max) } else { (x_min - 0.5, x_max + 0.5) };

    let grid = Array1::linspace(x_range.0, x_range.1, GRID_POINTS).to_vec();
    if opts.means_flag && opts.means.len() != groups.len() {
        warn!(
            "{} means supplied for {} groups; markers follow group order",
            opts.means.len(),
            groups.len()
        );
    }

    let mut ridges = Vec::with_capacity(groups.len());
    for (i, (name, values)) in groups.into_iter().enumerate() {
        debug!("Ridge {} has {} values", name, values.len());
        let curve = gaussian_kde(&values, &grid)?;
        let mean = if opts.means_flag { opts.means.get(i).copied() } else { None };
        ridges.push(Ridge { name, curve, mean });
    }

    ensure_parent_dir(&opts.figname)?;
    let is_svg = opts
        .figname
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    if is_svg {
        let root = SVGBackend::new(&opts.figname, FIGURE_SIZE).into_drawing_area();
        draw_ridges(root, &ridges, x_range, opts, style)?;
    } else {
        let root = BitMapBackend::new(&opts.figname, FIGURE_SIZE).into_drawing_area();
        draw_ridges(root, &ridges, x_range, opts, style)?;
    }

    info!("Ridgeline plot saved to {}", opts.figname.display());
    show_figure(&opts.figname, display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use polars::df;

    #[test]
    fn kde_integrates_to_about_one() {
        let values = [1.0, 2.0, 2.5, 3.0, 7.0];
        let grid = Array1::linspace(-10.0, 20.0, 3001).to_vec();
        let curve = gaussian_kde(&values, &grid).unwrap();
        let step = grid[1] - grid[0];
        let area: f64 = curve.ys.iter().sum::<f64>() * step;
        assert_relative_eq!(area, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn nearest_sample_is_used_for_markers() {
        let curve = DensityCurve {
            xs: vec![0.0, 0.5, 1.0, 1.5],
            ys: vec![0.1, 0.2, 0.3, 0.4],
        };
        assert_eq!(curve.height_near(0.74), Some(0.2));
        assert_eq!(curve.height_near(0.76), Some(0.3));
        assert_eq!(curve.height_near(-3.0), Some(0.1));
        assert_eq!(curve.height_near(99.0), Some(0.4));
    }

    #[test]
    fn equidistant_samples_pick_the_lower_one() {
        let curve = DensityCurve {
            xs: vec![0.0, 0.5, 1.0, 1.5],
            ys: vec![0.1, 0.2, 0.3, 0.4],
        };
        assert_eq!(curve.height_near(0.75), Some(0.2));
        assert_eq!(curve.height_near(1.25), Some(0.3));
    }

    #[test]
    fn empty_curve_has_no_marker_height() {
        let curve = DensityCurve { xs: vec![], ys: vec![] };
        assert_eq!(curve.height_near(1.0), None);
    }

    #[test]
    fn degenerate_sample_gets_unit_bandwidth() {
        assert_eq!(scott_bandwidth(&[4.0]), 1.0);
        assert_eq!(scott_bandwidth(&[2.0, 2.0, 2.0]), 1.0);
        assert!(scott_bandwidth(&[1.0, 2.0, 3.0]) > 0.0);
    }

    #[test]
    fn groups_are_sorted_and_nulls_skipped() {
        let df = df![
            "Organism" => &[Some("iML1515"), Some("e_coli_core"), Some("iML1515"), None],
            "sl_size" => &[Some(2.0), Some(3.0), None, Some(9.0)]
        ]
        .unwrap();
        let groups = grouped_values(&df, "Organism", "sl_size").unwrap();
        let names: Vec<&String> = groups.keys().collect();
        assert_eq!(names, vec!["e_coli_core", "iML1515"]);
        assert_eq!(groups["iML1515"], vec![2.0]);
    }

    #[test]
    fn means_follow_group_order() {
        let df = df![
            "Organism" => &["b", "a", "b", "a"],
            "L0_num_PathShort" => &[4i64, 1, 6, 3]
        ]
        .unwrap();
        assert_eq!(group_means(&df, "Organism", "L0_num_PathShort").unwrap(), vec![2.0, 5.0]);
    }

    #[test]
    fn colour_parsing() {
        assert_eq!(parse_hex_color("#686de0").unwrap(), RGBColor(0x68, 0x6d, 0xe0));
        assert!(parse_hex_color("blue").is_err());
    }

    #[test]
    fn empty_value_column_is_an_error() {
        let df = df!["Organism" => &["a"], "sl_size" => &[None::<f64>]].unwrap();
        let opts = RidgelineOptions {
            by: "Organism".into(),
            value: "sl_size".into(),
            ..Default::default()
        };
        let err = plot_ridge_lines(&df, &opts, &ChartStyle::default(), &DisplayConfig::headless());
        assert!(err.is_err());
    }

    fn two_organisms() -> DataFrame {
        df![
            "Organism" => &["e_coli_core", "e_coli_core", "e_coli_core", "iML1515", "iML1515", "iML1515"],
            "sl_size" => &[2.0, 3.0, 3.0, 4.0, 6.0, 5.0]
        ]
        .unwrap()
    }

    fn options(figname: PathBuf, df: &DataFrame) -> RidgelineOptions {
        RidgelineOptions {
            by: "Organism".into(),
            value: "sl_size".into(),
            means: group_means(df, "Organism", "sl_size").unwrap(),
            figname,
            title: "Synthetic lethal set size".into(),
            xlabel: "sl_size".into(),
            ylabel: "Organism".into(),
            ..Default::default()
        }
    }

    #[test]
    fn writes_ridgeline_png() {
        let dir = tempfile::tempdir().unwrap();
        let df = two_organisms();
        let opts = options(dir.path().join("images/sl_size_ridgeline.png"), &df);
        plot_ridge_lines(&df, &opts, &ChartStyle::default(), &DisplayConfig::headless()).unwrap();

        let written = std::fs::metadata(&opts.figname).unwrap();
        assert!(written.len() > 0);
    }

    #[test]
    fn writes_ridgeline_svg() {
        let dir = tempfile::tempdir().unwrap();
        let df = two_organisms();
        let opts = options(dir.path().join("sl_size_ridgeline.svg"), &df);
        plot_ridge_lines(&df, &opts, &ChartStyle::default(), &DisplayConfig::headless()).unwrap();

        let svg = std::fs::read_to_string(&opts.figname).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("iML1515"));
    }
}

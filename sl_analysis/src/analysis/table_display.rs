//! Plain-text rendering of a DataFrame under an explicit [`DisplayConfig`],
//! independent of any process-wide formatting settings.

use polars::prelude::*;
use prettytable::format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR;
use prettytable::{Cell, Row, Table};

use crate::config::DisplayConfig;

const ELLIPSIS: &str = "…";

fn cell(column: &Column, row: usize) -> String {
    match column.get(row) {
        Ok(value) => match value.get_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        },
        Err(_) => String::new(),
    }
}

/// Renders `df` as a text table. `None` limits print everything.
pub fn render(df: &DataFrame, display: &DisplayConfig) -> String {
    let n_cols = display.max_columns.map_or(df.width(), |m| m.min(df.width()));
    let n_rows = display.max_rows.map_or(df.height(), |m| m.min(df.height()));
    let cut_columns = n_cols < df.width();
    let columns = &df.get_columns()[..n_cols];

    let mut table = Table::new();
    table.set_format(*FORMAT_NO_BORDER_LINE_SEPARATOR);

    let mut titles: Vec<Cell> = columns.iter().map(|c| Cell::new(c.name().as_str())).collect();
    if cut_columns {
        titles.push(Cell::new(ELLIPSIS));
    }
    table.set_titles(Row::new(titles));

    for row in 0..n_rows {
        let mut cells: Vec<Cell> = columns.iter().map(|c| Cell::new(&cell(c, row))).collect();
        if cut_columns {
            cells.push(Cell::new(ELLIPSIS));
        }
        table.add_row(Row::new(cells));
    }

    let mut out = table.to_string();
    if n_rows < df.height() {
        out.push_str(&format!("{} {} more rows\n", ELLIPSIS, df.height() - n_rows));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn frame() -> DataFrame {
        df![
            "Rxn_1" => &["PGK", "ENO", "PYK"],
            "Rxn_1_Min" => &[0.5, -1.25, 0.0],
            "Type" => &["RSL", "PSL", "PSL"]
        ]
        .unwrap()
    }

    #[test]
    fn unrestricted_prints_everything() {
        let text = render(&frame(), &DisplayConfig::headless());
        for expected in ["Rxn_1", "Rxn_1_Min", "Type", "PGK", "ENO", "PYK", "-1.25", "RSL"] {
            assert!(text.contains(expected), "{} missing from\n{}", expected, text);
        }
        assert!(!text.contains(ELLIPSIS));

        let header = text.lines().find(|l| l.contains("Rxn_1")).unwrap();
        assert!(header.find("Rxn_1").unwrap() < header.find("Type").unwrap());
    }

    #[test]
    fn limits_truncate() {
        let display = DisplayConfig {
            max_rows: Some(1),
            max_columns: Some(2),
            ..DisplayConfig::headless()
        };
        let text = render(&frame(), &display);
        assert!(!text.contains("Type"));
        assert!(text.contains("… 2 more rows"));
        assert!(text.contains("PGK"));
        assert!(!text.contains("PYK"));
        assert!(!text.contains("ENO"));
    }

    #[test]
    fn empty_frame_renders_header_only() {
        let empty = frame().head(Some(0));
        let text = render(&empty, &DisplayConfig::headless());
        assert!(text.contains("Rxn_1_Min"));
        assert!(!text.contains("PGK"));
        assert!(!text.contains("more rows"));
    }
}

//! Flattening of simulation-harness records.
//!
//! The harness serialises every value inside singleton arrays: a reaction id
//! arrives as `[["PGK"]]`, a flux difference as `[0.25]`, a deleted reaction as
//! `[[["PGK"]]]`. [`HARNESS_SCHEMA`] declares how deep each field is wrapped;
//! records are validated against it before anything is unwrapped.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use polars::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::models::{polars_err, Dataset};

/// Expected layout of one harness field. `depth` counts the singleton arrays
/// wrapping each value (per element for lists).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    TextList { depth: usize },
    NumberList { depth: usize },
    Text { depth: usize },
    Number { depth: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: FieldShape,
}

pub const HARNESS_SCHEMA: [FieldSpec; 10] = [
    FieldSpec { name: "rxns", shape: FieldShape::TextList { depth: 2 } },
    FieldSpec { name: "diff_flux", shape: FieldShape::NumberList { depth: 1 } },
    FieldSpec { name: "abs_diff_flux", shape: FieldShape::NumberList { depth: 1 } },
    FieldSpec { name: "PathShort", shape: FieldShape::TextList { depth: 2 } },
    FieldSpec { name: "PathLong", shape: FieldShape::TextList { depth: 2 } },
    FieldSpec { name: "pathCommon", shape: FieldShape::TextList { depth: 2 } },
    FieldSpec { name: "del_rxn1", shape: FieldShape::Text { depth: 3 } },
    FieldSpec { name: "del_rxn2", shape: FieldShape::Text { depth: 3 } },
    FieldSpec { name: "totalFluxDiff", shape: FieldShape::Number { depth: 2 } },
    FieldSpec { name: "solStatus", shape: FieldShape::Number { depth: 2 } },
];

/// A harness record after unwrapping, with its derived statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub rxns: Vec<String>,
    pub diff_flux: Vec<f64>,
    pub abs_diff_flux: Vec<f64>,
    pub path_short: Vec<String>,
    pub path_long: Vec<String>,
    pub path_common: Vec<String>,
    pub del_rxn1: String,
    pub del_rxn2: String,
    pub total_flux_diff: f64,
    pub sol_status: f64,
}

impl SimulationRecord {
    pub fn sl_size(&self) -> usize {
        self.rxns.len()
    }

    pub fn common_sl_size(&self) -> usize {
        self.path_common.len()
    }
}

fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.len() > 40 {
        format!("{}…", &text[..text.char_indices().nth(40).map_or(text.len(), |(i, _)| i)])
    } else {
        text
    }
}

fn mismatch(record: usize, field: &str, element: Option<usize>, detail: String) -> PolarsError {
    let at = match element {
        Some(i) => format!("record {}, field `{}`, element {}", record, field, i),
        None => format!("record {}, field `{}`", record, field),
    };
    PolarsError::SchemaMismatch(format!("{}: {}", at, detail).into())
}

/// Strips `depth` singleton arrays. Anything else is reported as found.
fn peel(value: &Value, depth: usize) -> Result<&Value, String> {
    let mut current = value;
    for level in 0..depth {
        match current.as_array() {
            Some(items) if items.len() == 1 => current = &items[0],
            _ => {
                return Err(format!(
                    "expected a singleton array at nesting level {} of {}, found {}",
                    level + 1,
                    depth,
                    describe(current)
                ))
            }
        }
    }
    Ok(current)
}

fn as_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected a string, found {}", describe(other))),
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, found {}", describe(value)))
}

fn list_items<'a>(record: usize, field: &str, value: &'a Value) -> PolarsResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| mismatch(record, field, None, format!("expected a list, found {}", describe(value))))
}

fn text_list(record: usize, field: &str, value: &Value, depth: usize) -> PolarsResult<Vec<String>> {
    list_items(record, field, value)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            peel(item, depth)
                .and_then(as_text)
                .map_err(|detail| mismatch(record, field, Some(i), detail))
        })
        .collect()
}

fn number_list(record: usize, field: &str, value: &Value, depth: usize) -> PolarsResult<Vec<f64>> {
    list_items(record, field, value)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            peel(item, depth)
                .and_then(as_number)
                .map_err(|detail| mismatch(record, field, Some(i), detail))
        })
        .collect()
}

fn text(record: usize, field: &str, value: &Value, depth: usize) -> PolarsResult<String> {
    peel(value, depth)
        .and_then(as_text)
        .map_err(|detail| mismatch(record, field, None, detail))
}

fn number(record: usize, field: &str, value: &Value, depth: usize) -> PolarsResult<f64> {
    peel(value, depth)
        .and_then(as_number)
        .map_err(|detail| mismatch(record, field, None, detail))
}

fn fields(index: usize, record: &Value) -> PolarsResult<&Vec<Value>> {
    match record.as_array() {
        Some(fields) if fields.len() == HARNESS_SCHEMA.len() => Ok(fields),
        Some(fields) => Err(PolarsError::SchemaMismatch(
            format!(
                "record {}: expected {} fields, found {}",
                index,
                HARNESS_SCHEMA.len(),
                fields.len()
            )
            .into(),
        )),
        None => Err(PolarsError::SchemaMismatch(
            format!("record {}: expected an array of fields, found {}", index, describe(record)).into(),
        )),
    }
}

/// Checks every record against [`HARNESS_SCHEMA`] without producing output.
pub fn validate_records(records: &[Value]) -> PolarsResult<()> {
    for (index, record) in records.iter().enumerate() {
        let values = fields(index, record)?;
        for (spec, value) in HARNESS_SCHEMA.iter().zip(values) {
            match spec.shape {
                FieldShape::TextList { depth } => text_list(index, spec.name, value, depth).map(|_| ())?,
                FieldShape::NumberList { depth } => number_list(index, spec.name, value, depth).map(|_| ())?,
                FieldShape::Text { depth } => text(index, spec.name, value, depth).map(|_| ())?,
                FieldShape::Number { depth } => number(index, spec.name, value, depth).map(|_| ())?,
            }
        }
    }
    Ok(())
}

fn unwrap_record(index: usize, record: &Value) -> PolarsResult<SimulationRecord> {
    let f = fields(index, record)?;
    let depth = |i: usize| match HARNESS_SCHEMA[i].shape {
        FieldShape::TextList { depth }
        | FieldShape::NumberList { depth }
        | FieldShape::Text { depth }
        | FieldShape::Number { depth } => depth,
    };
    let name = |i: usize| HARNESS_SCHEMA[i].name;

    Ok(SimulationRecord {
        rxns: text_list(index, name(0), &f[0], depth(0))?,
        diff_flux: number_list(index, name(1), &f[1], depth(1))?,
        abs_diff_flux: number_list(index, name(2), &f[2], depth(2))?,
        path_short: text_list(index, name(3), &f[3], depth(3))?,
        path_long: text_list(index, name(4), &f[4], depth(4))?,
        path_common: text_list(index, name(5), &f[5], depth(5))?,
        del_rxn1: text(index, name(6), &f[6], depth(6))?,
        del_rxn2: text(index, name(7), &f[7], depth(7))?,
        total_flux_diff: number(index, name(8), &f[8], depth(8))?,
        sol_status: number(index, name(9), &f[9], depth(9))?,
    })
}

/// Validates then unwraps a batch of harness records.
pub fn unwrap_records(records: &[Value]) -> PolarsResult<Vec<SimulationRecord>> {
    validate_records(records)?;
    records
        .iter()
        .enumerate()
        .map(|(i, r)| unwrap_record(i, r))
        .collect()
}

/// Sign with sign(0) = 0 (and NaN counted as 0).
fn sign(x: f64) -> i64 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Per row, the number of increased minus decreased fluxes.
pub fn get_diff(values: &[Vec<f64>]) -> Vec<i64> {
    values.iter().map(|row| row.iter().map(|&x| sign(x)).sum()).collect()
}

/// Per row, the net flux difference.
pub fn get_net_diff(values: &[Vec<f64>]) -> Vec<f64> {
    values.iter().map(|row| row.iter().sum()).collect()
}

fn text_list_column(name: &str, rows: Vec<&Vec<String>>) -> Column {
    let inner: Vec<Series> = rows
        .into_iter()
        .map(|items| Series::new(PlSmallStr::EMPTY, items.as_slice()))
        .collect();
    Column::new(name.into(), inner)
}

fn number_list_column(name: &str, rows: Vec<&Vec<f64>>) -> Column {
    let inner: Vec<Series> = rows
        .into_iter()
        .map(|items| Series::new(PlSmallStr::EMPTY, items.as_slice()))
        .collect();
    Column::new(name.into(), inner)
}

/// Flattens unwrapped records into a DataFrame with the derived columns
/// `sl_size`, `common_sl_size`, `num_diff` and `net_diff`.
pub fn records_to_frame(records: &[SimulationRecord]) -> PolarsResult<DataFrame> {
    let diff_flux: Vec<Vec<f64>> = records.iter().map(|r| r.diff_flux.clone()).collect();

    let columns = vec![
        text_list_column("rxns", records.iter().map(|r| &r.rxns).collect()),
        number_list_column("diff_flux", records.iter().map(|r| &r.diff_flux).collect()),
        number_list_column("abs_diff_flux", records.iter().map(|r| &r.abs_diff_flux).collect()),
        text_list_column("PathShort", records.iter().map(|r| &r.path_short).collect()),
        text_list_column("PathLong", records.iter().map(|r| &r.path_long).collect()),
        text_list_column("pathCommon", records.iter().map(|r| &r.path_common).collect()),
        Column::new("del_rxn1".into(), records.iter().map(|r| r.del_rxn1.as_str()).collect::<Vec<_>>()),
        Column::new("del_rxn2".into(), records.iter().map(|r| r.del_rxn2.as_str()).collect::<Vec<_>>()),
        Column::new("totalFluxDiff".into(), records.iter().map(|r| r.total_flux_diff).collect::<Vec<_>>()),
        Column::new("solStatus".into(), records.iter().map(|r| r.sol_status).collect::<Vec<_>>()),
        Column::new("sl_size".into(), records.iter().map(|r| r.sl_size() as i64).collect::<Vec<_>>()),
        Column::new(
            "common_sl_size".into(),
            records.iter().map(|r| r.common_sl_size() as i64).collect::<Vec<_>>(),
        ),
        Column::new("num_diff".into(), get_diff(&diff_flux)),
        Column::new("net_diff".into(), get_net_diff(&diff_flux)),
    ];

    DataFrame::new(columns)
}

/// Unwraps harness records into one flat row per record.
pub fn preprocess(records: &[Value]) -> PolarsResult<DataFrame> {
    let unwrapped = unwrap_records(records)?;
    let df = records_to_frame(&unwrapped)?;
    debug!("Preprocessed {} harness records", df.height());
    Ok(df)
}

/// JSON file holding an array of harness records.
pub struct HarnessDump {
    pub path: PathBuf,
}

impl Dataset for HarnessDump {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading harness records from {}", self.path.display());
        let file = File::open(&self.path).map_err(|e| polars_err(Box::new(e)))?;
        let records: Vec<Value> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| polars_err(Box::new(e)))?;
        preprocess(&records)
    }
}

use std::error::Error;
use std::fmt;

use polars::prelude::*;

/// Wraps any foreign error (I/O, plotting, JSON) into a `PolarsError` so the
/// whole pipeline can speak `PolarsResult`.
pub fn polars_err(e: Box<dyn Error>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}

/// Anything that can be read from disk into a DataFrame.
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

/// Lethality class of a synthetic-lethal reaction pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lethality {
    /// Partial synthetic lethal: at least one minimum flux is at or below tolerance.
    Psl,
    /// Robust synthetic lethal: both minimum fluxes strictly exceed tolerance.
    Rsl,
}

impl Lethality {
    pub const ALL: [Lethality; 2] = [Lethality::Psl, Lethality::Rsl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lethality::Psl => "PSL",
            Lethality::Rsl => "RSL",
        }
    }

    /// Row-wise version of the `Type` column derivation.
    pub fn classify(rxn_1_min: f64, rxn_2_min: f64, tol: f64) -> Lethality {
        if rxn_1_min.abs() > tol && rxn_2_min.abs() > tol {
            Lethality::Rsl
        } else {
            Lethality::Psl
        }
    }
}

impl fmt::Display for Lethality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path-length metric used by the upstream path enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceNorm {
    L0,
    L1,
}

impl DistanceNorm {
    /// File suffix and column prefix, e.g. `L0`.
    pub fn tag(&self) -> &'static str {
        match self {
            DistanceNorm::L0 => "L0",
            DistanceNorm::L1 => "L1",
        }
    }
}

impl fmt::Display for DistanceNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// Meta-analysis estimator contract.
//
// The estimators themselves (MKDA chi-square and friends) live outside
// this crate; the correlation decoder only needs to run one over a
// feature-restricted collection and pull a named 1-D map out of the
// result. Whether an estimator wants a single group or a feature/
// complement pair is declared up front through EstimatorKind rather than
// discovered at call time.

use std::collections::HashMap;

use anyhow::Result;
use ndarray::Array1;

use crate::dataset::StudyCollection;

/// Results image produced by specificity-style pairwise meta-analyses;
/// the correlation decoder's default target.
pub const SPECIFICITY_Z: &str = "z_desc-specificity";

/// How many study groups an estimator consumes per fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Fits on the feature-positive studies alone.
    SingleGroup,
    /// Fits on feature-positive studies against their complement.
    PairedGroup,
}

/// Named 1-D statistical maps produced by one estimator fit.
#[derive(Debug, Clone)]
pub struct MetaResult {
    maps: HashMap<String, Array1<f64>>,
}

impl MetaResult {
    pub fn new(maps: HashMap<String, Array1<f64>>) -> Self {
        Self { maps }
    }

    /// Look up a map by name. A missing map is a contract violation by
    /// the estimator and aborts the enclosing fit.
    pub fn get_map(&self, name: &str) -> Result<&Array1<f64>> {
        self.maps
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Meta-analysis result has no map named '{name}'"))
    }

    pub fn map_names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(|k| k.as_str())
    }
}

/// A meta-analysis method the correlation decoder can drive.
///
/// Implementations declare their group arity via `kind`; the decoder
/// passes a complement collection only for `PairedGroup` estimators.
pub trait MetaEstimator {
    /// Declared group arity. Checked by the decoder before `fit`.
    fn kind(&self) -> EstimatorKind;

    /// Run the meta-analysis over `target`. For `PairedGroup` estimators
    /// `reference` holds the complement collection; for `SingleGroup`
    /// estimators it is always `None`.
    fn fit(&self, target: &StudyCollection, reference: Option<&StudyCollection>)
        -> Result<MetaResult>;
}

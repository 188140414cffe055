// Continuous decoding: unthresholded brain maps into text.
//
// Three paths live here. `decode_map` projects a query map through a
// trained topic model into term weights. CorrelationDecoder builds one
// meta-analytic reference map per feature at fit time and correlates
// query maps against the stack. CorrelationDistributionDecoder keeps the
// raw per-study maps for each feature instead and reports the Fisher-z
// correlation distribution.
//
// Correlations between whole-brain maps have huge degrees of freedom;
// none of the outputs carry significance semantics.

use std::collections::HashSet;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

use crate::dataset::StudyCollection;
use crate::meta::{EstimatorKind, MetaEstimator, SPECIFICITY_Z};
use crate::model::TopicModel;
use crate::stats::{fisher_z, pearson_rows};
use crate::volume::{MapInput, Masker, VolumeMask};

use super::base::{resolve_features, valid_ids, Decoder, RequiredInput};
use super::engine;
use super::table::{
    CorrelationDistributionTable, CorrelationTable, FeatureDistribution, TermWeightTable,
};

/// Decode a spatial map into term weights through a trained topic model.
///
/// The map is masked to voxel values, folded through p(topic|voxel) into
/// topic weights (optionally rescaled by `topic_priors` at influence
/// `prior_weight`), then projected through p(word|topic) into one weight
/// per vocabulary term. Returns the term table and the topic-weight
/// vector behind it.
pub fn decode_map(
    model: &TopicModel,
    image: &MapInput,
    topic_priors: Option<ndarray::ArrayView1<f64>>,
    prior_weight: f64,
) -> Result<(TermWeightTable, Array1<f64>)> {
    let volume = image.load()?;
    let input_values = model.mask().transform(&volume)?;

    let topic_weights =
        engine::topic_weights_from_map(model, input_values.view(), topic_priors, prior_weight)?;
    let word_weights = model.p_word_g_topic().dot(&topic_weights);

    let table = TermWeightTable::new(model.vocabulary(), word_weights.view())?;
    Ok((table, topic_weights))
}

/// References built by a CorrelationDecoder fit.
#[derive(Debug)]
struct CorrelationReferences {
    features: Vec<String>,
    /// features x voxels reference matrix.
    maps: Array2<f64>,
    masker: VolumeMask,
}

/// Decodes a query map by correlating it against one meta-analytic map
/// per feature.
pub struct CorrelationDecoder {
    /// Features to fit. None selects every annotated feature.
    pub features: Option<Vec<String>>,
    /// Minimum frequency-of-mention for a study to count as associated
    /// with a feature.
    pub frequency_threshold: f64,
    /// Name of the estimator results map used as the reference.
    pub target_image: String,
    estimator: Box<dyn MetaEstimator>,
    fitted: Option<CorrelationReferences>,
}

impl CorrelationDecoder {
    pub fn new(estimator: Box<dyn MetaEstimator>) -> Self {
        Self {
            features: None,
            frequency_threshold: 0.001,
            target_image: SPECIFICITY_Z.to_string(),
            estimator,
            fitted: None,
        }
    }

    /// Features retained by the last fit, in fit order.
    pub fn fitted_features(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.features.as_slice())
    }
}

impl Decoder for CorrelationDecoder {
    type Output = CorrelationTable;

    fn required_inputs(&self) -> Vec<RequiredInput> {
        vec![RequiredInput::Coordinates, RequiredInput::Annotations]
    }

    /// Run one meta-analysis per feature and keep the masked result maps
    /// as the reference matrix. Estimator failures abort the fit;
    /// features with zero qualifying studies are logged and dropped.
    fn fit(&mut self, collection: &StudyCollection) -> Result<()> {
        let features = resolve_features(collection, self.features.as_deref())?;
        let valid = valid_ids(collection, &self.required_inputs());

        let pb = ProgressBar::new(features.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  Meta-analyses [{bar:30}] {pos}/{len} ({eta})")
                .unwrap(),
        );

        let mut retained: Vec<String> = Vec::new();
        let mut rows: Vec<Array1<f64>> = Vec::new();

        for feature in &features {
            let labeled: HashSet<String> = collection
                .get_ids_by_label(feature, self.frequency_threshold)?
                .into_iter()
                .collect();
            // Limit selected studies to studies with valid data
            let feature_ids: Vec<String> = valid
                .iter()
                .filter(|id| labeled.contains(id.as_str()))
                .cloned()
                .collect();

            if feature_ids.is_empty() {
                info!(feature = %feature, "Skipping feature: no qualifying studies");
                pb.inc(1);
                continue;
            }

            let feature_dset = collection.slice(&feature_ids);
            debug!(feature = %feature, studies = feature_ids.len(), "Running meta-analysis");

            let meta_results = match self.estimator.kind() {
                EstimatorKind::SingleGroup => self.estimator.fit(&feature_dset, None)?,
                EstimatorKind::PairedGroup => {
                    let feature_set: HashSet<&str> =
                        feature_ids.iter().map(|s| s.as_str()).collect();
                    let nonfeature_ids: Vec<String> = valid
                        .iter()
                        .filter(|id| !feature_set.contains(id.as_str()))
                        .cloned()
                        .collect();
                    let nonfeature_dset = collection.slice(&nonfeature_ids);
                    self.estimator.fit(&feature_dset, Some(&nonfeature_dset))?
                }
            };

            let feature_data = meta_results.get_map(&self.target_image)?;
            if let Some(first) = rows.first() {
                if feature_data.len() != first.len() {
                    anyhow::bail!(
                        "Reference map for '{}' has {} voxels but earlier maps have {}",
                        feature,
                        feature_data.len(),
                        first.len()
                    );
                }
            }
            retained.push(feature.clone());
            rows.push(feature_data.clone());
            pb.inc(1);
        }
        pb.finish_and_clear();

        let n_voxels = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut maps = Array2::zeros((rows.len(), n_voxels));
        for (i, row) in rows.iter().enumerate() {
            maps.row_mut(i).assign(row);
        }

        info!(
            features = retained.len(),
            voxels = n_voxels,
            "Correlation decoder fitted"
        );
        self.fitted = Some(CorrelationReferences {
            features: retained,
            maps,
            masker: collection.masker().clone(),
        });
        Ok(())
    }

    /// Correlate the query map with every reference map. One row per
    /// retained feature, in fit order.
    fn transform(&self, image: &MapInput) -> Result<CorrelationTable> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("CorrelationDecoder must be fitted before transform"))?;

        let volume = image.load()?;
        let img_vec = fitted.masker.transform(&volume)?;
        if fitted.features.is_empty() {
            return CorrelationTable::new(&[], Array1::zeros(0).view());
        }
        let corrs = pearson_rows(img_vec.view(), fitted.maps.view())?;
        CorrelationTable::new(&fitted.features, corrs.view())
    }
}

/// References built by a CorrelationDistributionDecoder fit.
#[derive(Debug)]
struct DistributionReferences {
    features: Vec<String>,
    /// Per feature, the studies x voxels stack of masked study maps.
    stacks: Vec<Array2<f64>>,
    masker: VolumeMask,
}

/// Decodes a query map by correlating it against every study-level map
/// associated with each feature, reporting the Fisher-z distribution.
pub struct CorrelationDistributionDecoder {
    /// Features to fit. None selects every annotated feature.
    pub features: Option<Vec<String>>,
    /// Minimum frequency-of-mention for a study to count as associated
    /// with a feature.
    pub frequency_threshold: f64,
    /// Name of the per-study image to collect.
    pub target_image: String,
    fitted: Option<DistributionReferences>,
}

impl Default for CorrelationDistributionDecoder {
    fn default() -> Self {
        Self {
            features: None,
            frequency_threshold: 0.001,
            target_image: "z".to_string(),
            fitted: None,
        }
    }
}

impl CorrelationDistributionDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features retained by the last fit, in fit order.
    pub fn fitted_features(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.features.as_slice())
    }
}

impl Decoder for CorrelationDistributionDecoder {
    type Output = CorrelationDistributionTable;

    fn required_inputs(&self) -> Vec<RequiredInput> {
        vec![
            RequiredInput::Annotations,
            RequiredInput::Image(self.target_image.clone()),
        ]
    }

    /// Collect and mask the per-study images for each feature. No new
    /// statistical estimation happens here. A feature with no qualifying
    /// images (whether no study matched the label or the matches carry
    /// no image) is logged and dropped.
    fn fit(&mut self, collection: &StudyCollection) -> Result<()> {
        let features = resolve_features(collection, self.features.as_deref())?;
        let valid = valid_ids(collection, &self.required_inputs());
        let masker = collection.masker().clone();

        let mut retained: Vec<String> = Vec::new();
        let mut stacks: Vec<Array2<f64>> = Vec::new();

        for feature in &features {
            let labeled: HashSet<String> = collection
                .get_ids_by_label(feature, self.frequency_threshold)?
                .into_iter()
                .collect();
            let selected_ids: Vec<String> = valid
                .iter()
                .filter(|id| labeled.contains(id.as_str()))
                .cloned()
                .collect();

            let mut vectors: Vec<Array1<f64>> = Vec::new();
            for id in &selected_ids {
                // valid_ids guarantees the image exists for these ids
                if let Some(img) = collection.image(id, &self.target_image) {
                    vectors.push(masker.transform(img)?);
                }
            }

            if vectors.is_empty() {
                info!(feature = %feature, "Skipping feature: no images found");
                continue;
            }

            let n_voxels = vectors[0].len();
            let mut stack = Array2::zeros((vectors.len(), n_voxels));
            for (i, vec) in vectors.iter().enumerate() {
                stack.row_mut(i).assign(vec);
            }
            retained.push(feature.clone());
            stacks.push(stack);
        }

        info!(features = retained.len(), "Distribution decoder fitted");
        self.fitted = Some(DistributionReferences {
            features: retained,
            stacks,
            masker,
        });
        Ok(())
    }

    /// Correlate the query map with each feature's study maps and report
    /// the mean and standard deviation of the Fisher-z coefficients.
    fn transform(&self, image: &MapInput) -> Result<CorrelationDistributionTable> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            anyhow::anyhow!("CorrelationDistributionDecoder must be fitted before transform")
        })?;

        let volume = image.load()?;
        let img_vec = fitted.masker.transform(&volume)?;

        let mut rows = Vec::with_capacity(fitted.features.len());
        for (feature, stack) in fitted.features.iter().zip(&fitted.stacks) {
            let corrs = pearson_rows(img_vec.view(), stack.view())?;
            let corrs_z = fisher_z(corrs.view());
            let mean = corrs_z.mean().unwrap_or(0.0);
            let std = corrs_z.std(0.0);
            rows.push(FeatureDistribution {
                feature: feature.clone(),
                mean,
                std,
            });
        }
        CorrelationDistributionTable::new(rows)
    }
}

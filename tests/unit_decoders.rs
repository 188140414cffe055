// Unit tests for the correlation decoders.
//
// Uses mock meta-analysis estimators that record which study subsets
// they were fitted on, so the tests can check feature selection,
// single- vs paired-group invocation, and error propagation without any
// real meta-analysis.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::{arr1, arr2, Array1};

use neurolex::dataset::{StudyCollection, StudyRecord};
use neurolex::decode::{CorrelationDecoder, CorrelationDistributionDecoder, Decoder};
use neurolex::meta::{EstimatorKind, MetaEstimator, MetaResult};
use neurolex::volume::{MapInput, VolumeImage, VolumeMask};

const N_VOXELS: usize = 4;

fn test_mask() -> VolumeMask {
    VolumeMask::new([N_VOXELS, 1, 1], vec![true; N_VOXELS]).unwrap()
}

fn volume(values: &[f64]) -> VolumeImage {
    VolumeImage::new([N_VOXELS, 1, 1], values.to_vec()).unwrap()
}

/// One fit invocation as seen by a mock estimator: the target ids and,
/// for paired fits, the reference ids.
type SeenFit = (Vec<String>, Option<Vec<String>>);

/// Mock estimator: records every fit and returns a fixed map under the
/// requested name.
struct RecordingEstimator {
    kind: EstimatorKind,
    map_name: String,
    map: Vec<f64>,
    seen: Arc<Mutex<Vec<SeenFit>>>,
}

impl RecordingEstimator {
    fn new(kind: EstimatorKind, map_name: &str, map: Vec<f64>) -> (Self, Arc<Mutex<Vec<SeenFit>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                kind,
                map_name: map_name.to_string(),
                map,
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

impl MetaEstimator for RecordingEstimator {
    fn kind(&self) -> EstimatorKind {
        self.kind
    }

    fn fit(
        &self,
        target: &StudyCollection,
        reference: Option<&StudyCollection>,
    ) -> anyhow::Result<MetaResult> {
        self.seen
            .lock()
            .unwrap()
            .push((target.ids(), reference.map(|r| r.ids())));
        let mut maps = HashMap::new();
        maps.insert(self.map_name.clone(), Array1::from(self.map.clone()));
        Ok(MetaResult::new(maps))
    }
}

/// Mock estimator that always fails.
struct FailingEstimator;

impl MetaEstimator for FailingEstimator {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::SingleGroup
    }

    fn fit(
        &self,
        _target: &StudyCollection,
        _reference: Option<&StudyCollection>,
    ) -> anyhow::Result<MetaResult> {
        anyhow::bail!("estimator exploded")
    }
}

/// Three studies with coordinates; "pain" above threshold for s1 and s2
/// only, "memory" above threshold for s3 only.
fn collection() -> StudyCollection {
    let studies = vec![
        StudyRecord::new("s1").with_coordinates(vec![[0.0, 0.0, 0.0]]),
        StudyRecord::new("s2").with_coordinates(vec![[2.0, 0.0, 0.0]]),
        StudyRecord::new("s3").with_coordinates(vec![[4.0, 0.0, 0.0]]),
    ];
    StudyCollection::new(
        studies,
        vec!["pain".to_string(), "memory".to_string()],
        arr2(&[[0.5, 0.0], [0.9, 0.0], [0.01, 0.6]]),
        test_mask(),
    )
    .unwrap()
}

// ============================================================
// CorrelationDecoder: feature selection and estimator dispatch
// ============================================================

#[test]
fn fit_restricts_meta_analysis_to_thresholded_studies() {
    let (estimator, seen) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.features = Some(vec!["pain".to_string()]);
    decoder.frequency_threshold = 0.1;

    decoder.fit(&collection()).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    // s3's pain frequency (0.01) is below the threshold
    assert_eq!(seen[0].0, vec!["s1", "s2"]);
    assert_eq!(seen[0].1, None);
}

#[test]
fn paired_estimator_receives_the_complement() {
    let (estimator, seen) = RecordingEstimator::new(
        EstimatorKind::PairedGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.features = Some(vec!["pain".to_string()]);
    decoder.frequency_threshold = 0.1;

    decoder.fit(&collection()).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, vec!["s1", "s2"]);
    assert_eq!(seen[0].1.as_deref(), Some(["s3".to_string()].as_slice()));
}

#[test]
fn features_default_to_all_annotated() {
    let (estimator, seen) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.frequency_threshold = 0.1;

    decoder.fit(&collection()).unwrap();

    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(
        decoder.fitted_features(),
        Some(["pain".to_string(), "memory".to_string()].as_slice())
    );
}

#[test]
fn unknown_requested_feature_is_an_error() {
    let (estimator, _) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.features = Some(vec!["sadness".to_string()]);
    assert!(decoder.fit(&collection()).is_err());
}

#[test]
fn feature_with_no_qualifying_studies_is_dropped() {
    let (estimator, seen) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.features = Some(vec!["pain".to_string(), "memory".to_string()]);
    // Threshold above every "memory" frequency
    decoder.frequency_threshold = 0.7;

    decoder.fit(&collection()).unwrap();

    // Only "pain" (s2 at 0.9) survives; no estimator call for "memory"
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(decoder.fitted_features(), Some(["pain".to_string()].as_slice()));
}

#[test]
fn estimator_failure_aborts_the_fit() {
    let mut decoder = CorrelationDecoder::new(Box::new(FailingEstimator));
    decoder.frequency_threshold = 0.1;
    assert!(decoder.fit(&collection()).is_err());
    // The failed fit must not leave usable references behind
    assert!(decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .is_err());
}

#[test]
fn missing_target_map_is_an_error() {
    let (estimator, _) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "some_other_map",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.frequency_threshold = 0.1;
    assert!(decoder.fit(&collection()).is_err());
}

// ============================================================
// CorrelationDecoder: transform
// ============================================================

#[test]
fn transform_returns_one_row_per_retained_feature_in_range() {
    let (estimator, _) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 3.0, 2.0, 5.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.frequency_threshold = 0.1;
    decoder.fit(&collection()).unwrap();

    let table = decoder
        .transform(&MapInput::from(volume(&[0.5, 1.5, 0.0, 2.0])))
        .unwrap();

    assert_eq!(table.len(), 2);
    for row in table.rows() {
        assert!(row.r >= -1.0 && row.r <= 1.0, "r out of range: {}", row.r);
    }
    // Fit-time feature order is preserved
    assert_eq!(table.rows()[0].feature, "pain");
    assert_eq!(table.rows()[1].feature, "memory");
}

#[test]
fn transform_before_fit_is_an_error() {
    let (estimator, _) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let decoder = CorrelationDecoder::new(Box::new(estimator));
    assert!(decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .is_err());
}

#[test]
fn transform_correlates_against_the_reference_map() {
    // Reference map identical to the query (up to affine scale) gives r = 1
    let (estimator, _) = RecordingEstimator::new(
        EstimatorKind::SingleGroup,
        "z_desc-specificity",
        vec![1.0, 2.0, 3.0, 4.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.features = Some(vec!["pain".to_string()]);
    decoder.frequency_threshold = 0.1;
    decoder.fit(&collection()).unwrap();

    let table = decoder
        .transform(&MapInput::from(volume(&[10.0, 20.0, 30.0, 40.0])))
        .unwrap();
    assert!((table.correlation("pain").unwrap() - 1.0).abs() < 1e-12);
}

// ============================================================
// CorrelationDistributionDecoder
// ============================================================

/// Query [1,2,3,4] plus per-study z-images engineered so every study
/// correlates with the query at exactly 0.5.
fn distribution_collection() -> StudyCollection {
    // q centered = [-1.5, -0.5, 0.5, 1.5]; z = [1, -1, -1, 1] is
    // orthogonal to it. y = q_c + c*z has r = sqrt(5)/sqrt(5 + 4c^2),
    // so c = sqrt(15)/2 gives r = 0.5.
    let c = 15.0_f64.sqrt() / 2.0;
    let y: Vec<f64> = vec![-1.5 + c, -0.5 - c, 0.5 - c, 1.5 + c];
    let z_img = volume(&y);

    let studies = vec![
        StudyRecord::new("s1").with_image("z", z_img.clone()),
        StudyRecord::new("s2").with_image("z", z_img),
        // s3 matches "pain" but carries no image
        StudyRecord::new("s3"),
        // s4 carries an image but never crosses any threshold
        StudyRecord::new("s4").with_image("z", volume(&[0.0, 1.0, 0.0, 1.0])),
    ];
    StudyCollection::new(
        studies,
        vec!["pain".to_string(), "hunger".to_string()],
        arr2(&[[0.5, 0.0], [0.9, 0.0], [0.8, 0.0], [0.0, 0.0]]),
        test_mask(),
    )
    .unwrap()
}

#[test]
fn feature_without_images_is_absent_from_output() {
    let mut decoder = CorrelationDistributionDecoder::new();
    decoder.frequency_threshold = 0.1;
    decoder.fit(&distribution_collection()).unwrap();

    // "hunger" matched no studies at all; it must not be retained
    assert_eq!(decoder.fitted_features(), Some(["pain".to_string()].as_slice()));

    let table = decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.distribution("hunger").is_none());
}

#[test]
fn identical_study_correlations_give_zero_std_and_arctanh_mean() {
    let mut decoder = CorrelationDistributionDecoder::new();
    decoder.frequency_threshold = 0.1;
    decoder.fit(&distribution_collection()).unwrap();

    let table = decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .unwrap();

    let (mean, std) = table.distribution("pain").unwrap();
    assert!((mean - 0.5_f64.atanh()).abs() < 1e-9, "mean was {mean}");
    assert!(std.abs() < 1e-9, "std was {std}");
}

#[test]
fn studies_without_the_target_image_are_excluded() {
    // s3 matches "pain" above threshold but has no "z" image: only the
    // two imaged studies contribute to the stack, so the distribution
    // over identical maps still has zero spread.
    let mut decoder = CorrelationDistributionDecoder::new();
    decoder.frequency_threshold = 0.1;
    decoder.fit(&distribution_collection()).unwrap();

    let table = decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .unwrap();
    let (_, std) = table.distribution("pain").unwrap();
    assert!(std.abs() < 1e-9);
}

#[test]
fn distribution_transform_before_fit_is_an_error() {
    let decoder = CorrelationDistributionDecoder::new();
    assert!(decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .is_err());
}

#[test]
fn refit_replaces_previous_references() {
    let mut decoder = CorrelationDistributionDecoder::new();
    decoder.frequency_threshold = 0.1;
    decoder.fit(&distribution_collection()).unwrap();
    assert_eq!(decoder.fitted_features().unwrap().len(), 1);

    // Restrict to a slice where nothing qualifies: the previous
    // references must be fully replaced, not merged
    let empty = distribution_collection().slice(&["s4".to_string()]);
    decoder.fit(&empty).unwrap();
    assert!(decoder.fitted_features().unwrap().is_empty());

    let table = decoder
        .transform(&MapInput::from(volume(&[1.0, 2.0, 3.0, 4.0])))
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn paired_mock_estimator_sees_disjoint_groups() {
    let (estimator, seen) = RecordingEstimator::new(
        EstimatorKind::PairedGroup,
        "z_desc-specificity",
        vec![0.0, 1.0, 2.0, 3.0],
    );
    let mut decoder = CorrelationDecoder::new(Box::new(estimator));
    decoder.frequency_threshold = 0.1;
    decoder.fit(&collection()).unwrap();

    for (target, reference) in seen.lock().unwrap().iter() {
        let reference = reference.as_ref().expect("paired fit must get a reference");
        for id in target {
            assert!(!reference.contains(id), "id {id} in both groups");
        }
    }
}

// ============================================================
// Verify the r = 0.5 construction used above
// ============================================================

#[test]
fn engineered_vector_correlates_at_one_half() {
    let c = 15.0_f64.sqrt() / 2.0;
    let y = arr1(&[-1.5 + c, -0.5 - c, 0.5 - c, 1.5 + c]);
    let q = arr1(&[1.0, 2.0, 3.0, 4.0]);
    let corrs = neurolex::stats::pearson_rows(
        q.view(),
        y.insert_axis(ndarray::Axis(0)).view(),
    )
    .unwrap();
    assert!((corrs[0] - 0.5).abs() < 1e-12);
}

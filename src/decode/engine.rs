// Shared topic-weight engine.
//
// Both cross-modal directions reduce a per-unit distribution against one
// of the model's topic-conditional matrices: decode folds voxel values
// through p(topic|voxel), encode folds term counts through p(topic|word).
// Either result may then be rescaled by topic priors. The output vectors
// are arbitrarily scaled: they are not probabilities and carry no
// significance semantics.

use anyhow::Result;
use ndarray::{Array1, ArrayView1};

use crate::model::TopicModel;

use super::priors::apply_priors;

/// Topic weights for a masked voxel-value vector (decode direction).
///
/// Computes p(topic|voxel) transposed times the input values, yielding one
/// weight per topic.
pub fn topic_weights_from_map(
    model: &TopicModel,
    input_values: ArrayView1<f64>,
    topic_priors: Option<ArrayView1<f64>>,
    prior_weight: f64,
) -> Result<Array1<f64>> {
    if input_values.len() != model.n_voxels() {
        anyhow::bail!(
            "Input vector has {} voxels but the model expects {}",
            input_values.len(),
            model.n_voxels()
        );
    }

    let mut topic_weights = model.p_topic_g_voxel().t().dot(&input_values);
    apply_priors(&mut topic_weights, topic_priors, prior_weight)?;
    Ok(topic_weights)
}

/// Topic weights for a sparse term-count vector (encode direction).
///
/// Sums p(topic|word) rows for the non-zero terms, each scaled by its
/// count. `term_indices` and `term_counts` run in parallel; indices must
/// be valid vocabulary positions.
pub fn topic_weights_from_counts(
    model: &TopicModel,
    term_indices: &[usize],
    term_counts: &[f64],
    topic_priors: Option<ArrayView1<f64>>,
    prior_weight: f64,
) -> Result<Array1<f64>> {
    if term_indices.len() != term_counts.len() {
        anyhow::bail!(
            "Term index list ({}) and count list ({}) differ in length",
            term_indices.len(),
            term_counts.len()
        );
    }

    let p_topic_g_word = model.p_topic_g_word();
    let mut topic_weights = Array1::zeros(model.n_topics());
    for (&idx, &count) in term_indices.iter().zip(term_counts) {
        if idx >= p_topic_g_word.nrows() {
            anyhow::bail!(
                "Term index {} is outside the vocabulary ({} terms)",
                idx,
                p_topic_g_word.nrows()
            );
        }
        topic_weights.scaled_add(count, &p_topic_g_word.row(idx));
    }

    apply_priors(&mut topic_weights, topic_priors, prior_weight)?;
    Ok(topic_weights)
}

// Text-to-image encoding.
//
// The mirror of `decode_map`: align the input text to the model's
// vocabulary, fold the term counts through p(topic|word) into topic
// weights, project through p(voxel|topic), and unmask into a full
// volume. Text with no vocabulary hits encodes to an all-zero volume,
// which is a valid (if empty) encoding, not an error.

use std::path::Path;

use anyhow::Result;
use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::model::TopicModel;
use crate::volume::{Masker, VolumeImage};

use super::engine;
use super::vocab::count_vocabulary_terms;

/// Encode text into a spatial map through a trained topic model.
///
/// Returns the encoded volume and the topic-weight vector behind it.
/// When `out_file` is given the volume is also written there; the write
/// is a side effect and does not change the returned result.
pub fn encode_text(
    model: &TopicModel,
    text: &str,
    out_file: Option<&Path>,
    topic_priors: Option<ArrayView1<f64>>,
    prior_weight: f64,
) -> Result<(VolumeImage, Array1<f64>)> {
    let counts = count_vocabulary_terms(text, model.vocabulary());
    let text_counts: Vec<f64> = counts.nonzero.iter().map(|&i| counts.counts[i]).collect();
    debug!(
        terms = counts.nonzero.len(),
        "Vocabulary terms found in input text"
    );

    let topic_weights = engine::topic_weights_from_counts(
        model,
        &counts.nonzero,
        &text_counts,
        topic_priors,
        prior_weight,
    )?;

    let voxel_weights = model.p_voxel_g_topic().dot(&topic_weights);
    let img = model.mask().inverse_transform(voxel_weights.view())?;

    if let Some(path) = out_file {
        img.save(path)?;
    }
    Ok((img, topic_weights))
}

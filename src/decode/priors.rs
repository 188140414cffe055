// Topic prior weighting.
//
// Turns an externally supplied topic-prior vector and an influence factor
// into a per-topic multiplier: the prior is normalized to a distribution,
// blended with the uniform distribution in proportion to the factor, and
// rescaled to mean 1. A factor of 0, or a uniform prior at any factor,
// yields the identity multiplier, so neutral priors leave topic weights
// untouched.

use anyhow::Result;
use ndarray::{Array1, ArrayView1};

/// Compute per-topic multipliers from a prior vector and influence factor.
///
/// The result has the prior's relative shape scaled by `prior_weight`
/// around a mean of 1; multiply it elementwise into a topic-weight vector
/// to apply the prior.
pub fn weight_priors(topic_priors: ArrayView1<f64>, prior_weight: f64) -> Result<Array1<f64>> {
    if prior_weight < 0.0 {
        anyhow::bail!("Prior weight must be non-negative, got {prior_weight}");
    }
    if topic_priors.is_empty() {
        anyhow::bail!("Topic prior vector is empty");
    }
    let total: f64 = topic_priors.sum();
    if total <= 0.0 {
        anyhow::bail!("Topic prior vector must have a positive sum, got {total}");
    }

    let n_topics = topic_priors.len() as f64;
    // Normalized prior blended toward uniform, rescaled so the
    // multiplier averages 1 across topics.
    Ok(topic_priors.mapv(|p| (1.0 - prior_weight) + prior_weight * n_topics * p / total))
}

/// Apply optional priors to a topic-weight vector in place.
///
/// A `None` prior passes weights through unmodified. Errors if the prior
/// length disagrees with the number of topics.
pub fn apply_priors(
    topic_weights: &mut Array1<f64>,
    topic_priors: Option<ArrayView1<f64>>,
    prior_weight: f64,
) -> Result<()> {
    let Some(priors) = topic_priors else {
        return Ok(());
    };
    if priors.len() != topic_weights.len() {
        anyhow::bail!(
            "Topic prior length {} does not match topic count {}",
            priors.len(),
            topic_weights.len()
        );
    }
    let weighted = weight_priors(priors, prior_weight)?;
    *topic_weights *= &weighted;
    Ok(())
}

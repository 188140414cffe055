// Pre-trained topic model: the voxel <-> topic <-> word factorization.
//
// A TopicModel is loaded once and never mutated. It carries three trained
// probability matrices (p(voxel|topic), p(topic|voxel), p(word|topic))
// plus the ordered vocabulary and the brain mask defining voxel space.
// p(topic|word) is derived at construction by row-normalizing p(word|topic)
// (uniform topic prior; all-zero rows stay zero).
//
// All dimension and uniqueness invariants are checked in `new`, so the
// decode/encode paths can rely on consistent shapes without re-checking.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::volume::{Masker, VolumeMask};

/// Immutable trained factorization linking voxels and words through topics.
#[derive(Debug, Clone)]
pub struct TopicModel {
    p_voxel_g_topic: Array2<f64>, // voxels x topics
    p_topic_g_voxel: Array2<f64>, // voxels x topics
    p_word_g_topic: Array2<f64>,  // words x topics
    p_topic_g_word: Array2<f64>,  // words x topics, derived
    vocabulary: Vec<String>,
    mask: VolumeMask,
}

/// On-disk form of a trained model: the three stored matrices plus
/// vocabulary and mask. The derived matrix is rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
pub struct TopicModelData {
    pub p_voxel_g_topic: Array2<f64>,
    pub p_topic_g_voxel: Array2<f64>,
    pub p_word_g_topic: Array2<f64>,
    pub vocabulary: Vec<String>,
    pub mask: VolumeMask,
}

impl TopicModel {
    /// Build a model from trained matrices, validating every invariant:
    /// matrix dimensions must agree with each other, with the vocabulary
    /// length, and with the mask's voxel count; vocabulary terms must be
    /// unique and non-empty.
    pub fn new(
        p_voxel_g_topic: Array2<f64>,
        p_topic_g_voxel: Array2<f64>,
        p_word_g_topic: Array2<f64>,
        vocabulary: Vec<String>,
        mask: VolumeMask,
    ) -> Result<Self> {
        let n_voxels = mask.n_voxels();
        let n_topics = p_voxel_g_topic.ncols();

        if p_voxel_g_topic.nrows() != n_voxels {
            anyhow::bail!(
                "p(voxel|topic) has {} rows but the mask contains {} voxels",
                p_voxel_g_topic.nrows(),
                n_voxels
            );
        }
        if p_topic_g_voxel.dim() != p_voxel_g_topic.dim() {
            anyhow::bail!(
                "p(topic|voxel) shape {:?} does not match p(voxel|topic) shape {:?}",
                p_topic_g_voxel.dim(),
                p_voxel_g_topic.dim()
            );
        }
        if p_word_g_topic.nrows() != vocabulary.len() {
            anyhow::bail!(
                "p(word|topic) has {} rows but the vocabulary contains {} terms",
                p_word_g_topic.nrows(),
                vocabulary.len()
            );
        }
        if p_word_g_topic.ncols() != n_topics {
            anyhow::bail!(
                "p(word|topic) has {} topic columns but p(voxel|topic) has {}",
                p_word_g_topic.ncols(),
                n_topics
            );
        }

        let mut seen = HashSet::new();
        for term in &vocabulary {
            if term.is_empty() {
                anyhow::bail!("Vocabulary contains an empty term");
            }
            if !seen.insert(term.as_str()) {
                anyhow::bail!("Vocabulary term '{term}' appears more than once");
            }
        }

        let p_topic_g_word = derive_p_topic_g_word(&p_word_g_topic);

        Ok(Self {
            p_voxel_g_topic,
            p_topic_g_voxel,
            p_word_g_topic,
            p_topic_g_word,
            vocabulary,
            mask,
        })
    }

    /// Reconstruct a validated model from its on-disk form.
    pub fn from_data(data: TopicModelData) -> Result<Self> {
        Self::new(
            data.p_voxel_g_topic,
            data.p_topic_g_voxel,
            data.p_word_g_topic,
            data.vocabulary,
            data.mask,
        )
    }

    /// Load a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topic model from {}", path.display()))?;
        let data: TopicModelData = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse topic model {}", path.display()))?;
        Self::from_data(data)
    }

    /// Write the model's stored matrices to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = TopicModelData {
            p_voxel_g_topic: self.p_voxel_g_topic.clone(),
            p_topic_g_voxel: self.p_topic_g_voxel.clone(),
            p_word_g_topic: self.p_word_g_topic.clone(),
            vocabulary: self.vocabulary.clone(),
            mask: self.mask.clone(),
        };
        let raw = serde_json::to_string(&data)?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write topic model to {}", path.display()))?;
        Ok(())
    }

    pub fn n_topics(&self) -> usize {
        self.p_voxel_g_topic.ncols()
    }

    pub fn n_voxels(&self) -> usize {
        self.p_voxel_g_topic.nrows()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn mask(&self) -> &VolumeMask {
        &self.mask
    }

    pub fn p_voxel_g_topic(&self) -> ArrayView2<f64> {
        self.p_voxel_g_topic.view()
    }

    pub fn p_topic_g_voxel(&self) -> ArrayView2<f64> {
        self.p_topic_g_voxel.view()
    }

    pub fn p_word_g_topic(&self) -> ArrayView2<f64> {
        self.p_word_g_topic.view()
    }

    pub fn p_topic_g_word(&self) -> ArrayView2<f64> {
        self.p_topic_g_word.view()
    }
}

/// Row-normalize p(word|topic) into p(topic|word) under a uniform topic
/// prior. Words with no topic mass keep an all-zero row.
fn derive_p_topic_g_word(p_word_g_topic: &Array2<f64>) -> Array2<f64> {
    let mut derived = p_word_g_topic.clone();
    for mut row in derived.axis_iter_mut(Axis(0)) {
        let total: f64 = row.sum();
        if total > 0.0 {
            row.mapv_inplace(|v| v / total);
        }
    }
    derived
}

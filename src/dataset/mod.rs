// Study collections: the repository the correlation decoders are fit on.
//
// All study data lives in one shared arena (StudyTable): records, the
// studies x features annotation matrix, and the collection's masker.
// A StudyCollection is the arena plus a sorted index set. `slice` clones
// the Arc and narrows the index set, so restricting a collection never
// copies study data and never touches the original view.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use ndarray::Array2;

use crate::volume::{VolumeImage, VolumeMask};

/// One study: id, peak coordinates, and named statistical images.
#[derive(Debug, Clone)]
pub struct StudyRecord {
    pub id: String,
    /// Reported activation peaks. Empty when the study has no
    /// coordinate data.
    pub coordinates: Vec<[f64; 3]>,
    /// Per-study statistical maps keyed by image name (e.g. "z").
    pub images: HashMap<String, VolumeImage>,
}

impl StudyRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinates: Vec::new(),
            images: HashMap::new(),
        }
    }

    pub fn with_coordinates(mut self, coordinates: Vec<[f64; 3]>) -> Self {
        self.coordinates = coordinates;
        self
    }

    pub fn with_image(mut self, name: impl Into<String>, image: VolumeImage) -> Self {
        self.images.insert(name.into(), image);
        self
    }
}

/// The shared arena behind every view of a collection.
#[derive(Debug)]
struct StudyTable {
    studies: Vec<StudyRecord>,
    features: Vec<String>,
    /// studies x features frequency-of-mention matrix.
    frequencies: Array2<f64>,
    masker: VolumeMask,
}

/// A read-only view over a study arena.
#[derive(Debug, Clone)]
pub struct StudyCollection {
    table: Arc<StudyTable>,
    /// Arena indices in this view, ordered by study id.
    selected: Vec<usize>,
}

impl StudyCollection {
    /// Build a collection from study records and their annotations.
    ///
    /// `frequencies` is the studies x features matrix, rows in `studies`
    /// order. Ids and feature names must be unique.
    pub fn new(
        studies: Vec<StudyRecord>,
        features: Vec<String>,
        frequencies: Array2<f64>,
        masker: VolumeMask,
    ) -> Result<Self> {
        if frequencies.nrows() != studies.len() {
            anyhow::bail!(
                "Annotation matrix has {} rows but the collection contains {} studies",
                frequencies.nrows(),
                studies.len()
            );
        }
        if frequencies.ncols() != features.len() {
            anyhow::bail!(
                "Annotation matrix has {} columns but {} features are named",
                frequencies.ncols(),
                features.len()
            );
        }

        let mut seen_ids = HashSet::new();
        for study in &studies {
            if !seen_ids.insert(study.id.as_str()) {
                anyhow::bail!("Study id '{}' appears more than once", study.id);
            }
        }
        let mut seen_features = HashSet::new();
        for feature in &features {
            if !seen_features.insert(feature.as_str()) {
                anyhow::bail!("Feature '{feature}' appears more than once");
            }
        }

        let mut selected: Vec<usize> = (0..studies.len()).collect();
        selected.sort_by(|&a, &b| studies[a].id.cmp(&studies[b].id));

        Ok(Self {
            table: Arc::new(StudyTable {
                studies,
                features,
                frequencies,
                masker,
            }),
            selected,
        })
    }

    /// Number of studies in this view.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Study ids in this view, in id order.
    pub fn ids(&self) -> Vec<String> {
        self.selected
            .iter()
            .map(|&i| self.table.studies[i].id.clone())
            .collect()
    }

    /// All features annotated in the collection, in annotation order.
    pub fn features(&self) -> &[String] {
        &self.table.features
    }

    /// The masker shared by every image in the collection.
    pub fn masker(&self) -> &VolumeMask {
        &self.table.masker
    }

    /// Ids in this view whose frequency for `label` is at or above
    /// `threshold`. Errors if the label is not annotated.
    pub fn get_ids_by_label(&self, label: &str, threshold: f64) -> Result<Vec<String>> {
        let col = self
            .table
            .features
            .iter()
            .position(|f| f == label)
            .ok_or_else(|| anyhow::anyhow!("Feature '{label}' is not annotated in the collection"))?;

        Ok(self
            .selected
            .iter()
            .filter(|&&i| self.table.frequencies[[i, col]] >= threshold)
            .map(|&i| self.table.studies[i].id.clone())
            .collect())
    }

    /// Restrict the view to the given ids. Ids absent from this view are
    /// ignored; the arena is shared, not copied.
    pub fn slice(&self, ids: &[String]) -> StudyCollection {
        let wanted: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
        let selected = self
            .selected
            .iter()
            .copied()
            .filter(|&i| wanted.contains(self.table.studies[i].id.as_str()))
            .collect();
        StudyCollection {
            table: Arc::clone(&self.table),
            selected,
        }
    }

    /// Whether the study carries coordinate data. False for unknown ids.
    pub fn has_coordinates(&self, id: &str) -> bool {
        self.find(id)
            .map(|s| !s.coordinates.is_empty())
            .unwrap_or(false)
    }

    /// The named image for a study, if present in this view.
    pub fn image(&self, id: &str, name: &str) -> Option<&VolumeImage> {
        self.find(id).and_then(|s| s.images.get(name))
    }

    fn find(&self, id: &str) -> Option<&StudyRecord> {
        self.selected
            .iter()
            .map(|&i| &self.table.studies[i])
            .find(|s| s.id == id)
    }
}

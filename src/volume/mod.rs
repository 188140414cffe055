// Spatial volumes and masking.
//
// A VolumeImage is a dense 3-D grid of voxel values stored as a flat
// row-major buffer. Volumes are the crate's host image format: they
// serialize to JSON via serde, which is also what `encode --out` writes.
// Parsing neuroimaging formats (NIfTI etc.) is out of scope; callers
// convert to this representation first.

pub mod masker;

pub use masker::{Masker, VolumeMask};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A dense 3-D volume of voxel values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeImage {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl VolumeImage {
    /// Create a volume, checking that the buffer matches the shape.
    pub fn new(shape: [usize; 3], data: Vec<f64>) -> Result<Self> {
        let expected = shape[0] * shape[1] * shape[2];
        if data.len() != expected {
            anyhow::bail!(
                "Volume data length {} does not match shape {:?} ({} voxels)",
                data.len(),
                shape,
                expected
            );
        }
        Ok(Self { shape, data })
    }

    /// An all-zero volume of the given shape.
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            data: vec![0.0; shape[0] * shape[1] * shape[2]],
            shape,
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Flat row-major voxel buffer.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Total voxel count (inside and outside any mask).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a volume from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read volume from {}", path.display()))?;
        let img: VolumeImage = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse volume {}", path.display()))?;
        Ok(img)
    }

    /// Write the volume to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write volume to {}", path.display()))?;
        Ok(())
    }
}

/// A query map supplied to decode/transform operations: either an
/// in-memory volume or a path to a serialized one.
#[derive(Debug, Clone)]
pub enum MapInput {
    Volume(VolumeImage),
    Path(PathBuf),
}

impl MapInput {
    /// Resolve to an in-memory volume, reading from disk if needed.
    pub fn load(&self) -> Result<VolumeImage> {
        match self {
            MapInput::Volume(img) => Ok(img.clone()),
            MapInput::Path(path) => VolumeImage::load(path),
        }
    }
}

impl From<VolumeImage> for MapInput {
    fn from(img: VolumeImage) -> Self {
        MapInput::Volume(img)
    }
}

impl From<PathBuf> for MapInput {
    fn from(path: PathBuf) -> Self {
        MapInput::Path(path)
    }
}

impl From<&Path> for MapInput {
    fn from(path: &Path) -> Self {
        MapInput::Path(path.to_path_buf())
    }
}

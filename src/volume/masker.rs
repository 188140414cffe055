// Masking and unmasking between 3-D volumes and 1-D voxel vectors.
//
// The Masker trait is the seam between this crate and whatever produced
// the brain mask; mask construction itself is out of scope. VolumeMask
// is the binary-mask implementation used by topic models and study
// collections: transform selects in-mask voxels in row-major order,
// inverse_transform scatters them back and zero-fills the rest.

use anyhow::Result;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use super::VolumeImage;

/// Projects between full spatial volumes and 1-D vectors over mask voxels.
pub trait Masker {
    /// Extract the in-mask voxel values from a volume, in mask order.
    fn transform(&self, image: &VolumeImage) -> Result<Array1<f64>>;

    /// Reconstitute a full volume from in-mask values, zero outside the mask.
    fn inverse_transform(&self, values: ArrayView1<f64>) -> Result<VolumeImage>;

    /// Number of voxels inside the mask.
    fn n_voxels(&self) -> usize;
}

/// A binary brain mask over a fixed volume shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMask {
    shape: [usize; 3],
    in_mask: Vec<bool>,
}

impl VolumeMask {
    /// Create a mask, checking that the flag buffer matches the shape.
    pub fn new(shape: [usize; 3], in_mask: Vec<bool>) -> Result<Self> {
        let expected = shape[0] * shape[1] * shape[2];
        if in_mask.len() != expected {
            anyhow::bail!(
                "Mask length {} does not match shape {:?} ({} voxels)",
                in_mask.len(),
                shape,
                expected
            );
        }
        Ok(Self { shape, in_mask })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }
}

impl Masker for VolumeMask {
    fn transform(&self, image: &VolumeImage) -> Result<Array1<f64>> {
        if image.shape() != self.shape {
            anyhow::bail!(
                "Image shape {:?} does not match mask shape {:?}",
                image.shape(),
                self.shape
            );
        }
        let values: Vec<f64> = image
            .data()
            .iter()
            .zip(&self.in_mask)
            .filter(|(_, &keep)| keep)
            .map(|(&v, _)| v)
            .collect();
        Ok(Array1::from(values))
    }

    fn inverse_transform(&self, values: ArrayView1<f64>) -> Result<VolumeImage> {
        if values.len() != self.n_voxels() {
            anyhow::bail!(
                "Vector length {} does not match mask voxel count {}",
                values.len(),
                self.n_voxels()
            );
        }
        let mut image = VolumeImage::zeros(self.shape);
        let mut cursor = values.iter();
        for (slot, &keep) in image.data_mut().iter_mut().zip(&self.in_mask) {
            if keep {
                // cursor length was checked above
                *slot = *cursor.next().unwrap();
            }
        }
        Ok(image)
    }

    fn n_voxels(&self) -> usize {
        self.in_mask.iter().filter(|&&b| b).count()
    }
}

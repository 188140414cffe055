// Decoder lifecycle: the fit/transform protocol shared by all decoders.
//
// A decoder declares which study inputs it needs, builds per-feature
// reference structures from a collection on fit, and scores query maps on
// transform. Fit fully replaces any previous reference state; transform
// before a successful fit is an error.

use anyhow::Result;

use crate::dataset::StudyCollection;
use crate::volume::MapInput;

/// A study input a decoder requires before a study id counts as usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredInput {
    /// Peak coordinate data (consumed by coordinate-based estimators).
    Coordinates,
    /// Feature annotations. Present for every study in a collection.
    Annotations,
    /// A named per-study statistical image.
    Image(String),
}

/// Fit/transform protocol shared by all decoders.
pub trait Decoder {
    /// The table type produced by `transform`.
    type Output;

    /// Inputs a study must carry to participate in fitting.
    fn required_inputs(&self) -> Vec<RequiredInput>;

    /// Build per-feature reference structures from the collection,
    /// replacing any state from a previous fit.
    fn fit(&mut self, collection: &StudyCollection) -> Result<()>;

    /// Score a query map against the fitted references.
    fn transform(&self, image: &MapInput) -> Result<Self::Output>;
}

/// Resolve the feature list for a fit: the requested features, or every
/// annotated feature when none were requested. Requested features missing
/// from the collection are an error.
pub(crate) fn resolve_features(
    collection: &StudyCollection,
    requested: Option<&[String]>,
) -> Result<Vec<String>> {
    match requested {
        None => Ok(collection.features().to_vec()),
        Some(features) => {
            for feature in features {
                if !collection.features().contains(feature) {
                    anyhow::bail!("Feature '{feature}' is not annotated in the collection");
                }
            }
            Ok(features.to_vec())
        }
    }
}

/// Ids in the collection carrying every required input, in id order.
pub(crate) fn valid_ids(
    collection: &StudyCollection,
    required: &[RequiredInput],
) -> Vec<String> {
    collection
        .ids()
        .into_iter()
        .filter(|id| {
            required.iter().all(|input| match input {
                RequiredInput::Coordinates => collection.has_coordinates(id),
                // Every study in a collection has an annotation row
                RequiredInput::Annotations => true,
                RequiredInput::Image(name) => collection.image(id, name).is_some(),
            })
        })
        .collect()
}

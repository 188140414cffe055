// Cross-modal decoding core.
//
// decode_map / encode_text map between spatial maps and term weights
// through a trained topic model; the correlation decoders score query
// maps against per-feature reference maps built from a study collection.

pub mod base;
pub mod continuous;
pub mod encode;
pub mod engine;
pub mod priors;
pub mod table;
pub mod vocab;

pub use base::{Decoder, RequiredInput};
pub use continuous::{decode_map, CorrelationDecoder, CorrelationDistributionDecoder};
pub use encode::encode_text;
pub use table::{CorrelationDistributionTable, CorrelationTable, TermWeightTable};

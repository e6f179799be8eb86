pub mod config;
pub mod normalize;
pub mod transport;
pub mod types;
pub mod xml;

pub use normalize::{NormalizeError, NormalizedResult, Normalizer};
pub use types::*;

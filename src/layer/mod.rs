mod index;

pub use index::{Attributes, Feature, LayerIndex, QueryHit};

mod phase;
mod restriction;

pub use phase::ElectionPhase;
pub use restriction::{Dimension, Mismatch, RestrictionSet};

mod desc;
mod results;
mod spec;

pub use desc::{ElectionDescription, ElectionSummary};
pub use results::{tally, CandidateTally, ElectionResults, PositionResult};
pub use spec::{DisplayFlags, ElectionSpec};

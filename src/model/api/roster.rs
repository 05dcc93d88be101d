use serde::{Deserialize, Serialize};

/// The state of the voter roster after a read or update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStatus {
    /// Number of students listed.
    pub entries: usize,
}

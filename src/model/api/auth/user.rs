use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A kind of user of our application, having defined rights.
pub trait User {
    /// The rights of this user type.
    const RIGHTS: Rights;
}

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Rights {
    Voter,
    Organizer,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Organizer => "organizer",
            }
        )
    }
}

/// A student casting votes.
#[derive(Debug)]
pub struct Voter;

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;
}

/// A member of the election commission.
#[derive(Debug)]
pub struct Organizer;

impl User for Organizer {
    const RIGHTS: Rights = Rights::Organizer;
}

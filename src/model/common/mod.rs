//! Types shared between the API and DB representations.

pub mod election;
pub mod identity;

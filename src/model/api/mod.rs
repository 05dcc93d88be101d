//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod auth;
pub mod candidate;
pub mod election;
pub mod id;
pub mod position;
pub mod roster;
pub mod vote;

//! Data types, split by how they are serialised.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;

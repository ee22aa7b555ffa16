//! Parser subprocess protocol, syntax tree model, and tree caching.

pub mod bridge;
pub mod cache;
pub mod tree;

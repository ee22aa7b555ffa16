//! Semantic analysis over parsed syntax trees.
//!
//! Scope validation and token classification both walk the tree produced
//! by the parser bridge; the scheduler decides when the validation
//! pipeline actually runs.

pub mod scheduler;
pub mod scope;
pub mod tokens;

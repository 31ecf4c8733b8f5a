//! Matching module containing scoring, candidate generation, match
//! resolution, and reconciliation tracking

pub mod candidates;
pub mod engine;
pub mod resolver;
pub mod scoring;
pub mod tracker;

pub use candidates::*;
pub use engine::*;
pub use resolver::*;
pub use scoring::*;
pub use tracker::*;

//! # Reconciliation Core
//!
//! A bank reconciliation engine that matches a statement's transactions
//! against the organization's ledger, including one-to-many and
//! many-to-one combinations, with confidence-scored suggestions and
//! reconciliation-completion reporting.
//!
//! ## Features
//!
//! - **Candidate generation**: direct 1:1 pairing plus bounded
//!   subset-sum search for grouped matches
//! - **Confidence scoring**: weighted amount/date/reference signals
//!   with configurable weights and thresholds
//! - **Match resolution**: atomic confirm/unmatch with optimistic
//!   concurrency, batch application, and an auto-match sweep
//! - **Reconciliation tracking**: computed statistics, outstanding
//!   cheques, audit reports, and the terminal reconciled transition
//! - **Storage abstraction**: database-agnostic design with a
//!   trait-based store offering versioned conditional writes
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{MemoryStore, ReconciliationEngine};
//!
//! // Seed a MemoryStore (or implement ReconciliationStore for your
//! // storage backend), then drive the engine per statement:
//! // let mut engine = ReconciliationEngine::new(store);
//! // let summary = engine.auto_match_transactions("stmt-2025-01", None).await?;
//! ```

pub mod matching;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use matching::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_store::MemoryStore;

//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Identity of a record participating in an atomic update
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    Statement(String),
    BankTransaction(String),
    LedgerTransaction(String),
}

impl RecordKey {
    /// The record id, independent of the record kind
    pub fn id(&self) -> &str {
        match self {
            RecordKey::Statement(id)
            | RecordKey::BankTransaction(id)
            | RecordKey::LedgerTransaction(id) => id,
        }
    }
}

/// Expected version of a record at commit time
///
/// An atomic update only commits while every guarded record still
/// carries the version it had when the caller read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub key: RecordKey,
    pub version: u64,
}

impl RecordVersion {
    pub fn statement(s: &BankStatement) -> Self {
        Self {
            key: RecordKey::Statement(s.id.clone()),
            version: s.version,
        }
    }

    pub fn bank_transaction(t: &BankTransaction) -> Self {
        Self {
            key: RecordKey::BankTransaction(t.id.clone()),
            version: t.version,
        }
    }

    pub fn ledger_transaction(t: &LedgerTransaction) -> Self {
        Self {
            key: RecordKey::LedgerTransaction(t.id.clone()),
            version: t.version,
        }
    }
}

/// A record state to persist inside an atomic update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordWrite {
    Statement(BankStatement),
    BankTransaction(BankTransaction),
    LedgerTransaction(LedgerTransaction),
}

/// Storage abstraction for the reconciliation engine
///
/// This trait allows the engine to work with any storage backend
/// offering versioned conditional writes (compare-and-swap semantics).
/// These are the only persistence primitives the engine depends on;
/// the concrete storage technology is irrelevant to its correctness.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Get a statement by ID
    async fn get_statement(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Option<BankStatement>>;

    /// List every bank transaction imported with a statement
    async fn get_statement_transactions(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Vec<BankTransaction>>;

    /// Get a single bank transaction by ID
    async fn get_bank_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<BankTransaction>>;

    /// List open (unreconciled) ledger transactions within a date range
    async fn get_open_ledger_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ReconciliationResult<Vec<LedgerTransaction>>;

    /// Get a single ledger transaction by ID
    async fn get_ledger_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<LedgerTransaction>>;

    /// Commit a multi-record write atomically
    ///
    /// Every record named in `expected` must still carry exactly that
    /// version, otherwise the call fails with
    /// [`ReconciliationError::Conflict`] and nothing is written.
    /// Versions of written records bump by one on success.
    async fn atomic_update(
        &mut self,
        expected: &[RecordVersion],
        writes: Vec<RecordWrite>,
    ) -> ReconciliationResult<()>;

    /// Persist a new match record
    async fn create_match(&mut self, m: &ReconciliationMatch) -> ReconciliationResult<()>;

    /// Replace an existing match record
    async fn update_match(&mut self, m: &ReconciliationMatch) -> ReconciliationResult<()>;

    /// Get a match by ID
    async fn get_match(&self, match_id: &str)
        -> ReconciliationResult<Option<ReconciliationMatch>>;

    /// List every match ever recorded against a statement
    async fn list_statement_matches(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Vec<ReconciliationMatch>>;
}

/// Trait for implementing custom match-candidate validation rules
pub trait CandidateValidator: Send + Sync {
    /// Validate a candidate before it is confirmed
    fn validate_candidate(&self, candidate: &ReconciliationMatch) -> ReconciliationResult<()>;
}

/// Default candidate validator with basic shape rules
pub struct DefaultCandidateValidator;

impl CandidateValidator for DefaultCandidateValidator {
    fn validate_candidate(&self, candidate: &ReconciliationMatch) -> ReconciliationResult<()> {
        if candidate.bank_transaction_ids.is_empty() {
            return Err(ReconciliationError::Validation(
                "Candidate must name at least one bank transaction".to_string(),
            ));
        }

        if candidate.ledger_transaction_ids.is_empty() {
            return Err(ReconciliationError::Validation(
                "Candidate must name at least one ledger transaction".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for id in candidate
            .bank_transaction_ids
            .iter()
            .chain(candidate.ledger_transaction_ids.iter())
        {
            if !seen.insert(id) {
                return Err(ReconciliationError::Validation(format!(
                    "Candidate names transaction '{}' more than once",
                    id
                )));
            }
        }

        Ok(())
    }
}

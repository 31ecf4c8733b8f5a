//! Main engine facade that coordinates matching and tracking

use crate::matching::candidates::{CandidateGenerator, CandidateSet};
use crate::matching::resolver::{AutoMatchSummary, MatchOutcome, MatchResolver, MatchingConfig};
use crate::matching::tracker::{ReconciliationReport, ReconciliationStats, ReconciliationTracker};
use crate::traits::*;
use crate::types::*;

/// Reconciliation engine orchestrating the whole matching workflow
///
/// Candidate generation and scoring are read-only and can run
/// concurrently across statements; the resolver operations are the only
/// mutations and each commits atomically. The engine is invoked
/// synchronously per statement; no background workers exist.
pub struct ReconciliationEngine<S: ReconciliationStore> {
    store: S,
    resolver: MatchResolver<S>,
    tracker: ReconciliationTracker<S>,
    config: MatchingConfig,
}

impl<S: ReconciliationStore + Clone> ReconciliationEngine<S> {
    /// Create an engine with the default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, MatchingConfig::default())
    }

    /// Create an engine with an explicit configuration
    pub fn with_config(store: S, config: MatchingConfig) -> Self {
        Self {
            store: store.clone(),
            resolver: MatchResolver::with_config(store.clone(), config.clone()),
            tracker: ReconciliationTracker::with_config(store, config.clone()),
            config,
        }
    }

    /// Create an engine with a custom candidate validator
    pub fn with_validator(
        store: S,
        config: MatchingConfig,
        validator: Box<dyn CandidateValidator>,
    ) -> Self {
        Self {
            store: store.clone(),
            resolver: MatchResolver::with_validator(store.clone(), config.clone(), validator),
            tracker: ReconciliationTracker::with_config(store, config.clone()),
            config,
        }
    }

    // Candidate operations
    /// Produce ranked match candidates for a statement
    pub async fn suggest_candidates(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<CandidateSet> {
        let generator = CandidateGenerator::with_config(
            self.store.clone(),
            self.config.scoring.clone(),
            self.config.search.clone(),
        );
        generator.generate(statement_id).await
    }

    // Match operations
    /// Confirm a candidate on behalf of a user
    pub async fn match_transactions(
        &mut self,
        candidate: &ReconciliationMatch,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        self.resolver.match_transactions(candidate, user_id).await
    }

    /// Revert a confirmed match
    pub async fn unmatch_transaction(
        &mut self,
        match_id: &str,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        self.resolver.unmatch_transaction(match_id, user_id).await
    }

    /// Apply a batch of independent candidates, one commit each
    pub async fn match_multiple_transactions(
        &mut self,
        candidates: &[ReconciliationMatch],
        user_id: &str,
    ) -> Vec<MatchOutcome> {
        self.resolver
            .match_multiple_transactions(candidates, user_id)
            .await
    }

    /// Confirm every candidate at or above the auto threshold
    pub async fn auto_match_transactions(
        &mut self,
        statement_id: &str,
        threshold: Option<f64>,
    ) -> ReconciliationResult<AutoMatchSummary> {
        self.resolver
            .auto_match_transactions(statement_id, threshold)
            .await
    }

    // Tracking operations
    /// Compute current statistics for a statement
    pub async fn get_reconciliation_stats(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<ReconciliationStats> {
        self.tracker.get_reconciliation_stats(statement_id).await
    }

    /// Build the audit/export snapshot for a statement
    pub async fn generate_reconciliation_report(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<ReconciliationReport> {
        self.tracker
            .generate_reconciliation_report(statement_id)
            .await
    }

    /// Transition a statement to its terminal reconciled state
    pub async fn mark_statement_as_reconciled(
        &mut self,
        statement_id: &str,
        accepted_outstanding_ids: &[String],
    ) -> ReconciliationResult<BankStatement> {
        self.tracker
            .mark_statement_as_reconciled(statement_id, accepted_outstanding_ids)
            .await
    }
}

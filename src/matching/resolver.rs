//! Confirming, unmatching, and sweeping match candidates

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::matching::candidates::{CandidateGenerator, SearchConfig};
use crate::matching::scoring::ScoringConfig;
use crate::traits::*;
use crate::types::*;

/// Combined configuration for the matching engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
    /// Retries on version conflict before surfacing it to the caller
    pub max_conflict_retries: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            search: SearchConfig::default(),
            max_conflict_retries: 2,
        }
    }
}

/// Per-candidate result of a batch operation
#[derive(Debug)]
pub struct MatchOutcome {
    pub candidate_id: String,
    pub outcome: ReconciliationResult<ReconciliationMatch>,
}

/// Result of an auto-match sweep over a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMatchSummary {
    pub statement_id: String,
    /// Candidates confirmed by the sweep
    pub auto_matched: usize,
    /// Candidates skipped because a higher-scoring candidate consumed
    /// one of their members earlier in the run
    pub skipped_overlap: usize,
    /// Candidates whose confirmation failed validation (e.g. a
    /// near-amount pair that breaks the sum invariant)
    pub failed: usize,
    /// Candidates left below the auto threshold for human review
    pub suggested: usize,
    /// Anchors whose combination search exhausted its budget
    pub needs_manual_review: Vec<String>,
    /// Bank transactions still unmatched after the sweep
    pub remaining_unmatched: usize,
}

/// Applies match decisions to the store
///
/// Every mutating operation executes as one atomic multi-record commit
/// guarded by the versions read during validation; a concurrent write
/// to any member aborts the commit without partial effect and is
/// retried a bounded number of times.
pub struct MatchResolver<S: ReconciliationStore> {
    store: S,
    config: MatchingConfig,
    validator: Box<dyn CandidateValidator>,
}

impl<S: ReconciliationStore + Clone> MatchResolver<S> {
    /// Create a resolver with the default configuration and validator
    pub fn new(store: S) -> Self {
        Self::with_config(store, MatchingConfig::default())
    }

    /// Create a resolver with an explicit configuration
    pub fn with_config(store: S, config: MatchingConfig) -> Self {
        Self {
            store,
            config,
            validator: Box::new(DefaultCandidateValidator),
        }
    }

    /// Create a resolver with a custom candidate validator
    pub fn with_validator(
        store: S,
        config: MatchingConfig,
        validator: Box<dyn CandidateValidator>,
    ) -> Self {
        Self {
            store,
            config,
            validator,
        }
    }

    /// Confirm a candidate on behalf of a user
    ///
    /// Member statuses and the amount-sum invariant are re-validated
    /// inside the atomic attempt, so a candidate that raced with a
    /// concurrent confirmation fails with [`ReconciliationError::Conflict`]
    /// and no partial effect.
    pub async fn match_transactions(
        &mut self,
        candidate: &ReconciliationMatch,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        self.validator.validate_candidate(candidate)?;

        let mut attempt = 0;
        loop {
            match self.try_confirm(candidate, user_id).await {
                Err(ReconciliationError::Conflict(reason))
                    if attempt < self.config.max_conflict_retries =>
                {
                    attempt += 1;
                    debug!(
                        match_id = %candidate.id,
                        attempt,
                        %reason,
                        "retrying after version conflict"
                    );
                }
                other => return other,
            }
        }
    }

    /// Revert a confirmed match
    ///
    /// Only valid while the owning statement is not reconciled. Member
    /// transactions return to `Unmatched` and the match record becomes
    /// `Rejected`, retained for audit.
    pub async fn unmatch_transaction(
        &mut self,
        match_id: &str,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        let mut attempt = 0;
        loop {
            match self.try_unmatch(match_id, user_id).await {
                Err(ReconciliationError::Conflict(reason))
                    if attempt < self.config.max_conflict_retries =>
                {
                    attempt += 1;
                    debug!(%match_id, attempt, %reason, "retrying after version conflict");
                }
                other => return other,
            }
        }
    }

    /// Apply a batch of independent candidates
    ///
    /// Each candidate commits on its own; one conflict never aborts the
    /// rest of the batch.
    pub async fn match_multiple_transactions(
        &mut self,
        candidates: &[ReconciliationMatch],
        user_id: &str,
    ) -> Vec<MatchOutcome> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let outcome = self.match_transactions(candidate, user_id).await;
            outcomes.push(MatchOutcome {
                candidate_id: candidate.id.clone(),
                outcome,
            });
        }
        outcomes
    }

    /// Generate candidates for a statement and confirm every one at or
    /// above the auto threshold, highest score first
    ///
    /// Candidates whose members were consumed by a higher-scoring
    /// candidate earlier in the run are skipped, not failed.
    pub async fn auto_match_transactions(
        &mut self,
        statement_id: &str,
        threshold: Option<f64>,
    ) -> ReconciliationResult<AutoMatchSummary> {
        let threshold = threshold.unwrap_or(self.config.scoring.auto_threshold);
        let generator = CandidateGenerator::with_config(
            self.store.clone(),
            self.config.scoring.clone(),
            self.config.search.clone(),
        );
        let set = generator.generate(statement_id).await?;

        let mut summary = AutoMatchSummary {
            statement_id: statement_id.to_string(),
            auto_matched: 0,
            skipped_overlap: 0,
            failed: 0,
            suggested: 0,
            needs_manual_review: set.needs_manual_review,
            remaining_unmatched: 0,
        };

        let mut consumed: HashSet<String> = HashSet::new();
        for candidate in &set.candidates {
            if candidate.confidence_score < threshold {
                summary.suggested += 1;
                continue;
            }
            if candidate
                .bank_transaction_ids
                .iter()
                .chain(candidate.ledger_transaction_ids.iter())
                .any(|id| consumed.contains(id))
            {
                summary.skipped_overlap += 1;
                continue;
            }

            match self.match_transactions(candidate, "auto-match").await {
                Ok(confirmed) => {
                    summary.auto_matched += 1;
                    consumed.extend(confirmed.bank_transaction_ids.iter().cloned());
                    consumed.extend(confirmed.ledger_transaction_ids.iter().cloned());
                }
                Err(ReconciliationError::Conflict(_)) => summary.skipped_overlap += 1,
                Err(_) => summary.failed += 1,
            }
        }

        summary.remaining_unmatched = self
            .store
            .get_statement_transactions(statement_id)
            .await?
            .iter()
            .filter(|t| t.status == TransactionStatus::Unmatched)
            .count();

        info!(
            %statement_id,
            auto_matched = summary.auto_matched,
            remaining = summary.remaining_unmatched,
            "auto-match sweep finished"
        );
        Ok(summary)
    }

    async fn try_confirm(
        &mut self,
        candidate: &ReconciliationMatch,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        let statement = self
            .store
            .get_statement(&candidate.statement_id)
            .await?
            .ok_or_else(|| {
                ReconciliationError::StatementNotFound(candidate.statement_id.clone())
            })?;
        if !statement.is_open() {
            return Err(ReconciliationError::Validation(format!(
                "Statement '{}' is already reconciled",
                statement.id
            )));
        }

        let mut bank = Vec::with_capacity(candidate.bank_transaction_ids.len());
        for id in &candidate.bank_transaction_ids {
            let txn = self
                .store
                .get_bank_transaction(id)
                .await?
                .ok_or_else(|| ReconciliationError::TransactionNotFound(id.clone()))?;
            if txn.statement_id != candidate.statement_id {
                return Err(ReconciliationError::Validation(format!(
                    "Bank transaction '{}' belongs to statement '{}'",
                    txn.id, txn.statement_id
                )));
            }
            if txn.status != TransactionStatus::Unmatched {
                return Err(ReconciliationError::Conflict(format!(
                    "Bank transaction '{}' is already matched",
                    txn.id
                )));
            }
            bank.push(txn);
        }

        let mut ledger = Vec::with_capacity(candidate.ledger_transaction_ids.len());
        for id in &candidate.ledger_transaction_ids {
            let txn = self
                .store
                .get_ledger_transaction(id)
                .await?
                .ok_or_else(|| ReconciliationError::TransactionNotFound(id.clone()))?;
            if txn.reconciled {
                return Err(ReconciliationError::Conflict(format!(
                    "Ledger transaction '{}' is already reconciled",
                    txn.id
                )));
            }
            ledger.push(txn);
        }

        let bank_total: BigDecimal = bank.iter().map(|t| t.amount()).sum();
        let ledger_total: BigDecimal = ledger.iter().map(|t| t.amount.clone()).sum();
        if (&bank_total - &ledger_total).abs() > self.config.search.amount_epsilon {
            return Err(ReconciliationError::Imbalance {
                bank_total,
                ledger_total,
            });
        }

        let mut expected = vec![RecordVersion::statement(&statement)];
        expected.extend(bank.iter().map(RecordVersion::bank_transaction));
        expected.extend(ledger.iter().map(RecordVersion::ledger_transaction));

        let mut writes = Vec::new();
        for mut txn in bank {
            txn.status = TransactionStatus::Matched;
            if !txn.match_ids.contains(&candidate.id) {
                txn.match_ids.push(candidate.id.clone());
            }
            writes.push(RecordWrite::BankTransaction(txn));
        }
        for mut txn in ledger {
            txn.reconciled = true;
            writes.push(RecordWrite::LedgerTransaction(txn));
        }
        // The first confirmed match moves the statement into the
        // reconciling state; later confirms leave it untouched so
        // disjoint candidates do not contend on the statement record.
        if statement.status == StatementStatus::Imported {
            let mut statement = statement.clone();
            statement.status = StatementStatus::Reconciling;
            statement.updated_at = chrono::Utc::now().naive_utc();
            writes.push(RecordWrite::Statement(statement));
        }

        self.store.atomic_update(&expected, writes).await?;

        let mut confirmed = candidate.clone();
        confirmed.confirm(user_id);
        if self.store.get_match(&confirmed.id).await?.is_some() {
            self.store.update_match(&confirmed).await?;
        } else {
            self.store.create_match(&confirmed).await?;
        }

        info!(
            match_id = %confirmed.id,
            statement_id = %confirmed.statement_id,
            score = confirmed.confidence_score,
            by = %user_id,
            "match confirmed"
        );
        Ok(confirmed)
    }

    async fn try_unmatch(
        &mut self,
        match_id: &str,
        user_id: &str,
    ) -> ReconciliationResult<ReconciliationMatch> {
        let record = self
            .store
            .get_match(match_id)
            .await?
            .ok_or_else(|| ReconciliationError::MatchNotFound(match_id.to_string()))?;
        if record.status != MatchStatus::Confirmed {
            return Err(ReconciliationError::Validation(format!(
                "Match '{}' is not confirmed",
                match_id
            )));
        }

        let statement = self
            .store
            .get_statement(&record.statement_id)
            .await?
            .ok_or_else(|| ReconciliationError::StatementNotFound(record.statement_id.clone()))?;
        if !statement.is_open() {
            return Err(ReconciliationError::Validation(format!(
                "Statement '{}' is already reconciled",
                statement.id
            )));
        }

        let mut expected = Vec::new();
        let mut writes = Vec::new();
        for id in &record.bank_transaction_ids {
            let mut txn = self
                .store
                .get_bank_transaction(id)
                .await?
                .ok_or_else(|| ReconciliationError::TransactionNotFound(id.clone()))?;
            expected.push(RecordVersion::bank_transaction(&txn));
            txn.status = TransactionStatus::Unmatched;
            writes.push(RecordWrite::BankTransaction(txn));
        }
        for id in &record.ledger_transaction_ids {
            let mut txn = self
                .store
                .get_ledger_transaction(id)
                .await?
                .ok_or_else(|| ReconciliationError::TransactionNotFound(id.clone()))?;
            expected.push(RecordVersion::ledger_transaction(&txn));
            txn.reconciled = false;
            writes.push(RecordWrite::LedgerTransaction(txn));
        }

        self.store.atomic_update(&expected, writes).await?;

        let mut rejected = record;
        rejected.reject();
        rejected.created_by = user_id.to_string();
        self.store.update_match(&rejected).await?;

        info!(%match_id, by = %user_id, "match reverted");
        Ok(rejected)
    }
}

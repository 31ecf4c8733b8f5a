//! Candidate generation for statement matching

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::matching::scoring::{ScoringConfig, ScoringEngine};
use crate::traits::ReconciliationStore;
use crate::types::*;

/// Bounds for the candidate search
///
/// Injected rather than hard-coded so the search is tunable and
/// testable independently of the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Days around the statement period to pull ledger transactions from
    pub date_window_days: i64,
    /// Relative tolerance for pairing amounts in the direct 1:1 pass
    pub amount_tolerance_ratio: BigDecimal,
    /// Absolute tolerance for subset sums and the confirm invariant
    pub amount_epsilon: BigDecimal,
    /// Largest combination searched on the grouped side
    pub max_group_size: usize,
    /// Search-step budget per anchor before it degrades to manual review
    pub max_iterations_per_anchor: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            date_window_days: 30,
            amount_tolerance_ratio: BigDecimal::from(1) / BigDecimal::from(100),
            amount_epsilon: BigDecimal::from(1) / BigDecimal::from(100),
            max_group_size: 5,
            max_iterations_per_anchor: 100_000,
        }
    }
}

/// Result of a candidate generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Suggested matches, ranked best-first; nothing is persisted
    pub candidates: Vec<ReconciliationMatch>,
    /// Anchors whose combination search exhausted its budget
    pub needs_manual_review: Vec<String>,
}

/// Enumerates plausible match candidates for a statement
///
/// Read-only over a snapshot of the store; safe to run concurrently
/// across statements.
pub struct CandidateGenerator<S: ReconciliationStore> {
    store: S,
    scoring: ScoringEngine,
    config: SearchConfig,
}

impl<S: ReconciliationStore> CandidateGenerator<S> {
    /// Create a generator with default scoring and search bounds
    pub fn new(store: S) -> Self {
        Self {
            store,
            scoring: ScoringEngine::default(),
            config: SearchConfig::default(),
        }
    }

    /// Create a generator with explicit scoring and search bounds
    pub fn with_config(store: S, scoring: ScoringConfig, config: SearchConfig) -> Self {
        Self {
            store,
            scoring: ScoringEngine::new(scoring),
            config,
        }
    }

    /// Produce ranked match candidates for a statement
    ///
    /// Direct 1:1 candidates come first; transactions that found no
    /// acceptable 1:1 counterpart get a bounded subset-sum search for
    /// one-to-many and many-to-one combinations. Anchors that blow the
    /// search budget are reported for manual review instead of failing
    /// the run.
    pub async fn generate(&self, statement_id: &str) -> ReconciliationResult<CandidateSet> {
        let statement = self
            .store
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconciliationError::StatementNotFound(statement_id.to_string()))?;

        if !statement.is_open() {
            return Err(ReconciliationError::Validation(format!(
                "Statement '{}' is already reconciled",
                statement.id
            )));
        }

        let bank: Vec<BankTransaction> = self
            .store
            .get_statement_transactions(statement_id)
            .await?
            .into_iter()
            .filter(|t| t.status == TransactionStatus::Unmatched)
            .collect();

        let window = Duration::days(self.config.date_window_days);
        let ledger = self
            .store
            .get_open_ledger_transactions(
                statement.period_start - window,
                statement.period_end + window,
            )
            .await?;

        let mut candidates = Vec::new();
        let mut needs_manual_review = Vec::new();

        // Direct pass: every sign-compatible pair within tolerance.
        let mut bank_paired: HashSet<&str> = HashSet::new();
        let mut ledger_paired: HashSet<&str> = HashSet::new();
        for b in &bank {
            for l in &ledger {
                if b.direction() != l.direction {
                    continue;
                }
                if !self.amounts_pair(&b.amount(), &l.amount) {
                    continue;
                }
                let score = self.scoring.score(&[b], &[l]);
                if !self.scoring.config().meets_suggest(score) {
                    continue;
                }
                bank_paired.insert(b.id.as_str());
                ledger_paired.insert(l.id.as_str());
                candidates.push(ReconciliationMatch::suggested(
                    statement.id.clone(),
                    vec![b.id.clone()],
                    vec![l.id.clone()],
                    score,
                ));
            }
        }

        // Grouped pass: bank anchors with no 1:1 counterpart search for
        // ledger combinations summing to their amount.
        for b in bank.iter().filter(|b| !bank_paired.contains(b.id.as_str())) {
            let pool: Vec<&LedgerTransaction> = ledger
                .iter()
                .filter(|l| l.direction == b.direction())
                .collect();
            match self.subset_sum(&pool, |l| l.amount.clone(), &b.amount(), &b.id) {
                Ok(combos) => {
                    for combo in combos {
                        let ledger_ids = combo.iter().map(|l| l.id.clone()).collect();
                        let score = self.scoring.score(&[b], &combo);
                        if self.scoring.config().meets_suggest(score) {
                            candidates.push(ReconciliationMatch::suggested(
                                statement.id.clone(),
                                vec![b.id.clone()],
                                ledger_ids,
                                score,
                            ));
                        }
                    }
                }
                Err(ReconciliationError::SearchBudgetExceeded(anchor)) => {
                    warn!(anchor = %anchor, "combination search budget exceeded");
                    needs_manual_review.push(anchor);
                }
                Err(e) => return Err(e),
            }
        }

        // Mirror image: ledger anchors with no 1:1 counterpart search
        // for bank combinations.
        for l in ledger
            .iter()
            .filter(|l| !ledger_paired.contains(l.id.as_str()))
        {
            let pool: Vec<&BankTransaction> = bank
                .iter()
                .filter(|b| b.direction() == l.direction)
                .collect();
            match self.subset_sum(&pool, |b| b.amount(), &l.amount, &l.id) {
                Ok(combos) => {
                    for combo in combos {
                        let bank_ids = combo.iter().map(|b| b.id.clone()).collect();
                        let score = self.scoring.score(&combo, &[l]);
                        if self.scoring.config().meets_suggest(score) {
                            candidates.push(ReconciliationMatch::suggested(
                                statement.id.clone(),
                                bank_ids,
                                vec![l.id.clone()],
                                score,
                            ));
                        }
                    }
                }
                Err(ReconciliationError::SearchBudgetExceeded(anchor)) => {
                    warn!(anchor = %anchor, "combination search budget exceeded");
                    needs_manual_review.push(anchor);
                }
                Err(e) => return Err(e),
            }
        }

        Self::rank(&mut candidates, &bank);

        Ok(CandidateSet {
            candidates,
            needs_manual_review,
        })
    }

    fn amounts_pair(&self, bank_amount: &BigDecimal, ledger_amount: &BigDecimal) -> bool {
        let difference = (bank_amount - ledger_amount).abs();
        difference <= bank_amount.abs() * &self.config.amount_tolerance_ratio
    }

    /// Bounded depth-first search for combinations of 2 to
    /// `max_group_size` items whose amounts sum to `target` within
    /// epsilon. Items are visited largest-first so oversized branches
    /// prune early.
    fn subset_sum<'p, T>(
        &self,
        pool: &[&'p T],
        amount_of: impl Fn(&T) -> BigDecimal + Copy,
        target: &BigDecimal,
        anchor_id: &str,
    ) -> ReconciliationResult<Vec<Vec<&'p T>>> {
        let mut sorted: Vec<&'p T> = pool.to_vec();
        sorted.sort_by(|a, b| amount_of(b).cmp(&amount_of(a)));

        let mut combos = Vec::new();
        let mut current: Vec<&'p T> = Vec::new();
        let mut iterations: u64 = 0;
        self.descend(
            &sorted,
            amount_of,
            target,
            anchor_id,
            0,
            &BigDecimal::from(0),
            &mut current,
            &mut combos,
            &mut iterations,
        )?;
        Ok(combos)
    }

    #[allow(clippy::too_many_arguments)]
    fn descend<'p, T>(
        &self,
        sorted: &[&'p T],
        amount_of: impl Fn(&T) -> BigDecimal + Copy,
        target: &BigDecimal,
        anchor_id: &str,
        start: usize,
        sum: &BigDecimal,
        current: &mut Vec<&'p T>,
        combos: &mut Vec<Vec<&'p T>>,
        iterations: &mut u64,
    ) -> ReconciliationResult<()> {
        let epsilon = &self.config.amount_epsilon;
        for i in start..sorted.len() {
            *iterations += 1;
            if *iterations > self.config.max_iterations_per_anchor {
                return Err(ReconciliationError::SearchBudgetExceeded(
                    anchor_id.to_string(),
                ));
            }

            let next_sum = sum + amount_of(sorted[i]);
            if next_sum > target + epsilon {
                // Sorted largest-first: a smaller item later may still fit.
                continue;
            }

            current.push(sorted[i]);
            if current.len() >= 2 && (target - &next_sum).abs() <= *epsilon {
                combos.push(current.clone());
            } else if current.len() < self.config.max_group_size {
                self.descend(
                    sorted, amount_of, target, anchor_id, i + 1, &next_sum, current, combos,
                    iterations,
                )?;
            }
            current.pop();
        }
        Ok(())
    }

    /// Rank by score descending; ties break by smaller group size, then
    /// by earliest bank transaction date.
    fn rank(candidates: &mut [ReconciliationMatch], bank: &[BankTransaction]) {
        let dates: HashMap<&str, NaiveDate> =
            bank.iter().map(|b| (b.id.as_str(), b.date)).collect();
        let earliest = |m: &ReconciliationMatch| -> NaiveDate {
            m.bank_transaction_ids
                .iter()
                .filter_map(|id| dates.get(id.as_str()).copied())
                .min()
                .unwrap_or(NaiveDate::MAX)
        };

        candidates.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.group_size().cmp(&b.group_size()))
                .then(earliest(a).cmp(&earliest(b)))
        });
    }
}

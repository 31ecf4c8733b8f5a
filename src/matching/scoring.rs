//! Confidence scoring for match candidates

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{BankTransaction, LedgerTransaction};

/// Tunable weights and thresholds for the scoring engine
///
/// Weights are configuration, not constants: operators tune them per
/// deployment. The defaults reproduce the behaviour the rest of the
/// engine is tested against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight when the side sums are exactly equal
    pub exact_amount_weight: f64,
    /// Weight when the side sums differ but stay within the tolerance
    /// ratio (not awarded on top of the exact weight)
    pub amount_tolerance_weight: f64,
    /// Weight when the closest pair of dates is the same calendar day
    pub same_date_weight: f64,
    /// Weight when the closest pair of dates is within
    /// `near_date_days` (not awarded on top of the same-day weight)
    pub near_date_weight: f64,
    /// Weight when a reference or cheque number matches exactly
    pub reference_match_weight: f64,
    /// Relative amount tolerance for the near-amount signal
    pub amount_tolerance_ratio: BigDecimal,
    /// Day window for the near-date signal
    pub near_date_days: i64,
    /// Upper bound the summed signals are clamped to
    pub score_cap: f64,
    /// Minimum score for automatic confirmation
    pub auto_threshold: f64,
    /// Minimum score for surfacing a candidate to a human
    pub suggest_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exact_amount_weight: 1.0,
            amount_tolerance_weight: 0.8,
            same_date_weight: 0.5,
            near_date_weight: 0.3,
            reference_match_weight: 0.9,
            amount_tolerance_ratio: BigDecimal::from(1) / BigDecimal::from(100),
            near_date_days: 3,
            score_cap: 1.0,
            auto_threshold: 0.95,
            suggest_threshold: 0.4,
        }
    }
}

impl ScoringConfig {
    /// Whether a score qualifies for automatic confirmation
    pub fn meets_auto(&self, score: f64) -> bool {
        score >= self.auto_threshold
    }

    /// Whether a score is worth surfacing to a human at all
    pub fn meets_suggest(&self, score: f64) -> bool {
        score >= self.suggest_threshold
    }
}

/// Per-signal breakdown of a candidate score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Contribution of the amount comparison
    pub amount_signal: f64,
    /// Contribution of the date proximity comparison
    pub date_signal: f64,
    /// Contribution of the reference/cheque-number comparison
    pub reference_signal: f64,
    /// Summed signals clamped to the configured cap
    pub total: f64,
}

/// Pure scoring function over a bank-side and ledger-side set
///
/// Signals contribute additively and the total is clamped to
/// `score_cap`, which keeps the score monotonic: adding a true signal
/// never lowers the result for the same candidate.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a candidate grouping of bank and ledger transactions
    pub fn score(&self, bank: &[&BankTransaction], ledger: &[&LedgerTransaction]) -> f64 {
        self.score_breakdown(bank, ledger).total
    }

    /// Score a candidate and report each signal's contribution
    pub fn score_breakdown(
        &self,
        bank: &[&BankTransaction],
        ledger: &[&LedgerTransaction],
    ) -> ScoreBreakdown {
        if bank.is_empty() || ledger.is_empty() {
            return ScoreBreakdown {
                amount_signal: 0.0,
                date_signal: 0.0,
                reference_signal: 0.0,
                total: 0.0,
            };
        }

        let bank_total: BigDecimal = bank.iter().map(|t| t.amount()).sum();
        let ledger_total: BigDecimal = ledger.iter().map(|t| t.amount.clone()).sum();

        let amount_signal = if bank_total == ledger_total {
            self.config.exact_amount_weight
        } else if self.within_tolerance(&bank_total, &ledger_total) {
            self.config.amount_tolerance_weight
        } else {
            0.0
        };

        let date_signal = match self.min_day_gap(bank, ledger) {
            0 => self.config.same_date_weight,
            gap if gap <= self.config.near_date_days => self.config.near_date_weight,
            _ => 0.0,
        };

        let reference_signal = if self.references_intersect(bank, ledger) {
            self.config.reference_match_weight
        } else {
            0.0
        };

        let total =
            (amount_signal + date_signal + reference_signal).min(self.config.score_cap);

        ScoreBreakdown {
            amount_signal,
            date_signal,
            reference_signal,
            total,
        }
    }

    fn within_tolerance(&self, bank_total: &BigDecimal, ledger_total: &BigDecimal) -> bool {
        let difference = (bank_total - ledger_total).abs();
        difference <= bank_total.abs() * &self.config.amount_tolerance_ratio
    }

    /// Smallest day gap between any bank date and any ledger date
    fn min_day_gap(&self, bank: &[&BankTransaction], ledger: &[&LedgerTransaction]) -> i64 {
        let mut min_gap = i64::MAX;
        for b in bank {
            for l in ledger {
                let gap = (b.date - l.date).num_days().abs();
                if gap < min_gap {
                    min_gap = gap;
                }
            }
        }
        min_gap
    }

    /// Whether any non-empty reference or cheque number appears on both
    /// sides
    fn references_intersect(
        &self,
        bank: &[&BankTransaction],
        ledger: &[&LedgerTransaction],
    ) -> bool {
        let bank_refs: HashSet<&str> = bank
            .iter()
            .flat_map(|t| [t.reference.as_deref(), t.cheque_number.as_deref()])
            .flatten()
            .filter(|r| !r.is_empty())
            .collect();

        if bank_refs.is_empty() {
            return false;
        }

        ledger
            .iter()
            .flat_map(|t| [t.reference.as_deref(), t.cheque_number.as_deref()])
            .flatten()
            .any(|r| !r.is_empty() && bank_refs.contains(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bank_txn(amount: i64, date: NaiveDate) -> BankTransaction {
        BankTransaction::credit(
            "b1".to_string(),
            "stmt1".to_string(),
            date,
            "Customer payment".to_string(),
            BigDecimal::from(amount),
        )
    }

    fn ledger_txn(amount: i64, date: NaiveDate) -> LedgerTransaction {
        LedgerTransaction::new(
            "l1".to_string(),
            date,
            BigDecimal::from(amount),
            crate::types::Direction::Inflow,
            "INR".to_string(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn exact_amount_and_same_date_scores_full() {
        let engine = ScoringEngine::default();
        let b = bank_txn(10000, date(2025, 1, 15));
        let l = ledger_txn(10000, date(2025, 1, 15));

        let score = engine.score(&[&b], &[&l]);
        assert_eq!(score, 1.0);
        assert!(engine.config().meets_auto(score));
    }

    #[test]
    fn near_amount_scores_tolerance_weight() {
        let engine = ScoringEngine::default();
        let b = bank_txn(10000, date(2025, 1, 15));
        let l = ledger_txn(10050, date(2025, 2, 20));

        let breakdown = engine.score_breakdown(&[&b], &[&l]);
        assert_eq!(breakdown.amount_signal, 0.8);
        assert_eq!(breakdown.date_signal, 0.0);
        assert_eq!(breakdown.total, 0.8);
    }

    #[test]
    fn date_within_three_days_scores_near_weight() {
        let engine = ScoringEngine::default();
        let b = bank_txn(500, date(2025, 1, 15));
        let l = ledger_txn(500, date(2025, 1, 17));

        let breakdown = engine.score_breakdown(&[&b], &[&l]);
        assert_eq!(breakdown.date_signal, 0.3);
    }

    #[test]
    fn score_is_monotonic_in_reference_signal() {
        let engine = ScoringEngine::default();
        let b = bank_txn(500, date(2025, 1, 15));
        let l_plain = ledger_txn(480, date(2025, 2, 20));
        let without = engine.score(&[&b], &[&l_plain]);

        let b_ref = bank_txn(500, date(2025, 1, 15)).with_reference("INV-42".to_string());
        let l_ref = ledger_txn(480, date(2025, 2, 20)).with_reference("INV-42".to_string());
        let with = engine.score(&[&b_ref], &[&l_ref]);

        assert!(with >= without);
        assert_eq!(with, 0.9);
    }

    #[test]
    fn cheque_number_counts_as_reference() {
        let engine = ScoringEngine::default();
        let b = bank_txn(500, date(2025, 1, 15)).with_cheque_number("000123".to_string());
        let l = ledger_txn(500, date(2025, 1, 15)).with_cheque_number("000123".to_string());

        let breakdown = engine.score_breakdown(&[&b], &[&l]);
        assert_eq!(breakdown.reference_signal, 0.9);
        // Summed signals exceed the cap and clamp to it.
        assert_eq!(breakdown.total, 1.0);
    }

    #[test]
    fn group_amounts_compare_as_sums() {
        let engine = ScoringEngine::default();
        let b = bank_txn(30000, date(2025, 1, 10));
        let l1 = ledger_txn(10000, date(2025, 1, 9));
        let mut l2 = ledger_txn(10000, date(2025, 1, 10));
        l2.id = "l2".to_string();
        let mut l3 = ledger_txn(10000, date(2025, 1, 11));
        l3.id = "l3".to_string();

        let breakdown = engine.score_breakdown(&[&b], &[&l1, &l2, &l3]);
        assert_eq!(breakdown.amount_signal, 1.0);
        assert_eq!(breakdown.date_signal, 0.5);
    }

    #[test]
    fn empty_side_scores_zero() {
        let engine = ScoringEngine::default();
        let b = bank_txn(500, date(2025, 1, 15));
        assert_eq!(engine.score(&[&b], &[]), 0.0);
    }
}

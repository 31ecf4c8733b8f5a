//! Statement-level reconciliation statistics and reporting

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::matching::resolver::MatchingConfig;
use crate::traits::*;
use crate::types::*;

/// An issued, unmatched debit carrying a cheque number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingCheque {
    pub transaction_id: String,
    pub cheque_number: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
}

/// Computed reconciliation statistics for one statement
///
/// Always derived from current record state, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationStats {
    pub statement_id: String,
    pub total_bank_transactions: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    /// Sum of the amounts covered by confirmed matches
    pub reconciled_amount: BigDecimal,
    /// Statement closing balance minus the reconciled amount
    pub unreconciled_amount: BigDecimal,
    pub outstanding_cheques: Vec<OutstandingCheque>,
    pub outstanding_cheque_total: BigDecimal,
}

/// Snapshot combining statistics with full match and transaction
/// listings, for audit and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub statement_id: String,
    pub bank_account_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub statement_status: StatementStatus,
    pub stats: ReconciliationStats,
    /// Every match recorded against the statement: confirmed,
    /// suggested, and rejected
    pub matches: Vec<ReconciliationMatch>,
    pub unmatched_bank_transactions: Vec<BankTransaction>,
    /// Open ledger transactions within the statement's search window
    pub open_ledger_transactions: Vec<LedgerTransaction>,
    pub generated_at: NaiveDateTime,
}

/// Computes statement statistics and gates the terminal transition
pub struct ReconciliationTracker<S: ReconciliationStore> {
    store: S,
    config: MatchingConfig,
}

impl<S: ReconciliationStore> ReconciliationTracker<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, MatchingConfig::default())
    }

    pub fn with_config(store: S, config: MatchingConfig) -> Self {
        Self { store, config }
    }

    /// Compute current statistics for a statement
    pub async fn get_reconciliation_stats(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<ReconciliationStats> {
        let statement = self.require_statement(statement_id).await?;
        let transactions = self.store.get_statement_transactions(statement_id).await?;
        Ok(Self::stats_from(&statement, &transactions))
    }

    /// Build the audit/export snapshot for a statement
    pub async fn generate_reconciliation_report(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<ReconciliationReport> {
        let statement = self.require_statement(statement_id).await?;
        let transactions = self.store.get_statement_transactions(statement_id).await?;
        let matches = self.store.list_statement_matches(statement_id).await?;

        let window = Duration::days(self.config.search.date_window_days);
        let open_ledger_transactions = self
            .store
            .get_open_ledger_transactions(
                statement.period_start - window,
                statement.period_end + window,
            )
            .await?;

        let stats = Self::stats_from(&statement, &transactions);
        let unmatched_bank_transactions = transactions
            .into_iter()
            .filter(|t| t.status == TransactionStatus::Unmatched)
            .collect();

        debug!(%statement_id, matches = matches.len(), "report generated");
        Ok(ReconciliationReport {
            statement_id: statement.id.clone(),
            bank_account_id: statement.bank_account_id.clone(),
            period_start: statement.period_start,
            period_end: statement.period_end,
            statement_status: statement.status,
            stats,
            matches,
            unmatched_bank_transactions,
            open_ledger_transactions,
            generated_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Transition a statement to its terminal reconciled state
    ///
    /// Every bank transaction must be matched or listed in
    /// `accepted_outstanding_ids`; otherwise the offending ids are
    /// named in the validation error and nothing changes. On success
    /// each matched transaction cascades to `Reconciled` in the same
    /// atomic commit as the statement. A conflict with a concurrent
    /// match operation surfaces to the caller; the resolver is the only
    /// place that retries automatically.
    pub async fn mark_statement_as_reconciled(
        &mut self,
        statement_id: &str,
        accepted_outstanding_ids: &[String],
    ) -> ReconciliationResult<BankStatement> {
        let statement = self.require_statement(statement_id).await?;
        if !statement.is_open() {
            return Err(ReconciliationError::Validation(format!(
                "Statement '{}' is already reconciled",
                statement.id
            )));
        }

        let transactions = self.store.get_statement_transactions(statement_id).await?;
        let unresolved: Vec<&str> = transactions
            .iter()
            .filter(|t| {
                t.status == TransactionStatus::Unmatched
                    && !accepted_outstanding_ids.contains(&t.id)
            })
            .map(|t| t.id.as_str())
            .collect();
        if !unresolved.is_empty() {
            return Err(ReconciliationError::Validation(format!(
                "Statement '{}' has unresolved transactions: {}",
                statement_id,
                unresolved.join(", ")
            )));
        }

        let mut expected = vec![RecordVersion::statement(&statement)];
        let mut writes = Vec::new();
        for txn in &transactions {
            if txn.status == TransactionStatus::Matched {
                expected.push(RecordVersion::bank_transaction(txn));
                let mut txn = txn.clone();
                txn.status = TransactionStatus::Reconciled;
                writes.push(RecordWrite::BankTransaction(txn));
            }
        }

        let mut reconciled = statement;
        reconciled.status = StatementStatus::Reconciled;
        reconciled.updated_at = chrono::Utc::now().naive_utc();
        writes.push(RecordWrite::Statement(reconciled.clone()));

        self.store.atomic_update(&expected, writes).await?;
        // Mirror the version bump the commit applied.
        reconciled.version += 1;

        info!(
            %statement_id,
            accepted_outstanding = accepted_outstanding_ids.len(),
            "statement reconciled"
        );
        Ok(reconciled)
    }

    async fn require_statement(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<BankStatement> {
        self.store
            .get_statement(statement_id)
            .await?
            .ok_or_else(|| ReconciliationError::StatementNotFound(statement_id.to_string()))
    }

    fn stats_from(
        statement: &BankStatement,
        transactions: &[BankTransaction],
    ) -> ReconciliationStats {
        let total_bank_transactions = transactions.len();
        let matched: Vec<&BankTransaction> = transactions
            .iter()
            .filter(|t| t.status != TransactionStatus::Unmatched)
            .collect();
        let matched_count = matched.len();
        let unmatched_count = total_bank_transactions - matched_count;

        let reconciled_amount: BigDecimal = matched.iter().map(|t| t.amount()).sum();
        let unreconciled_amount = &statement.closing_balance - &reconciled_amount;

        let outstanding_cheques: Vec<OutstandingCheque> = transactions
            .iter()
            .filter(|t| {
                t.status == TransactionStatus::Unmatched && t.debit > BigDecimal::from(0)
            })
            .filter_map(|t| {
                t.cheque_number.as_ref().map(|cheque| OutstandingCheque {
                    transaction_id: t.id.clone(),
                    cheque_number: cheque.clone(),
                    date: t.date,
                    amount: t.debit.clone(),
                })
            })
            .collect();
        let outstanding_cheque_total: BigDecimal =
            outstanding_cheques.iter().map(|c| &c.amount).sum();

        ReconciliationStats {
            statement_id: statement.id.clone(),
            total_bank_transactions,
            matched_count,
            unmatched_count,
            reconciled_amount,
            unreconciled_amount,
            outstanding_cheques,
            outstanding_cheque_total,
        }
    }
}

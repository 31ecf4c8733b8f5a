//! In-memory store implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct State {
    statements: HashMap<String, BankStatement>,
    bank_transactions: HashMap<String, BankTransaction>,
    ledger_transactions: HashMap<String, LedgerTransaction>,
    matches: HashMap<String, ReconciliationMatch>,
}

/// In-memory store implementation for testing and development
///
/// All collections live behind one lock so `atomic_update` is genuinely
/// atomic across record kinds. The insert helpers stand in for the
/// out-of-scope ingestion and ledger collaborators.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.statements.clear();
        state.bank_transactions.clear();
        state.ledger_transactions.clear();
        state.matches.clear();
    }

    /// Seed a statement, as the ingestion collaborator would
    pub fn insert_statement(&self, statement: BankStatement) {
        self.state
            .write()
            .unwrap()
            .statements
            .insert(statement.id.clone(), statement);
    }

    /// Seed a bank transaction, as the ingestion collaborator would
    pub fn insert_bank_transaction(&self, transaction: BankTransaction) {
        self.state
            .write()
            .unwrap()
            .bank_transactions
            .insert(transaction.id.clone(), transaction);
    }

    /// Seed a ledger transaction, as the ledger collaborator would
    pub fn insert_ledger_transaction(&self, transaction: LedgerTransaction) {
        self.state
            .write()
            .unwrap()
            .ledger_transactions
            .insert(transaction.id.clone(), transaction);
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn get_statement(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Option<BankStatement>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .statements
            .get(statement_id)
            .cloned())
    }

    async fn get_statement_transactions(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Vec<BankTransaction>> {
        let state = self.state.read().unwrap();
        Ok(state
            .bank_transactions
            .values()
            .filter(|t| t.statement_id == statement_id)
            .cloned()
            .collect())
    }

    async fn get_bank_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<BankTransaction>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .bank_transactions
            .get(transaction_id)
            .cloned())
    }

    async fn get_open_ledger_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ReconciliationResult<Vec<LedgerTransaction>> {
        let state = self.state.read().unwrap();
        Ok(state
            .ledger_transactions
            .values()
            .filter(|t| !t.reconciled && t.date >= start_date && t.date <= end_date)
            .cloned()
            .collect())
    }

    async fn get_ledger_transaction(
        &self,
        transaction_id: &str,
    ) -> ReconciliationResult<Option<LedgerTransaction>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .ledger_transactions
            .get(transaction_id)
            .cloned())
    }

    async fn atomic_update(
        &mut self,
        expected: &[RecordVersion],
        writes: Vec<RecordWrite>,
    ) -> ReconciliationResult<()> {
        let mut state = self.state.write().unwrap();

        // Verify every guard before touching anything.
        for guard in expected {
            let current = match &guard.key {
                RecordKey::Statement(id) => state.statements.get(id).map(|s| s.version),
                RecordKey::BankTransaction(id) => {
                    state.bank_transactions.get(id).map(|t| t.version)
                }
                RecordKey::LedgerTransaction(id) => {
                    state.ledger_transactions.get(id).map(|t| t.version)
                }
            };
            match current {
                Some(version) if version == guard.version => {}
                Some(version) => {
                    return Err(ReconciliationError::Conflict(format!(
                        "Record '{}' is at version {}, expected {}",
                        guard.key.id(),
                        version,
                        guard.version
                    )));
                }
                None => {
                    return Err(ReconciliationError::Conflict(format!(
                        "Record '{}' no longer exists",
                        guard.key.id()
                    )));
                }
            }
        }

        for write in writes {
            match write {
                RecordWrite::Statement(mut s) => {
                    s.version += 1;
                    state.statements.insert(s.id.clone(), s);
                }
                RecordWrite::BankTransaction(mut t) => {
                    t.version += 1;
                    state.bank_transactions.insert(t.id.clone(), t);
                }
                RecordWrite::LedgerTransaction(mut t) => {
                    t.version += 1;
                    state.ledger_transactions.insert(t.id.clone(), t);
                }
            }
        }

        Ok(())
    }

    async fn create_match(&mut self, m: &ReconciliationMatch) -> ReconciliationResult<()> {
        self.state
            .write()
            .unwrap()
            .matches
            .insert(m.id.clone(), m.clone());
        Ok(())
    }

    async fn update_match(&mut self, m: &ReconciliationMatch) -> ReconciliationResult<()> {
        let mut state = self.state.write().unwrap();
        if state.matches.contains_key(&m.id) {
            state.matches.insert(m.id.clone(), m.clone());
            Ok(())
        } else {
            Err(ReconciliationError::MatchNotFound(m.id.clone()))
        }
    }

    async fn get_match(
        &self,
        match_id: &str,
    ) -> ReconciliationResult<Option<ReconciliationMatch>> {
        Ok(self.state.read().unwrap().matches.get(match_id).cloned())
    }

    async fn list_statement_matches(
        &self,
        statement_id: &str,
    ) -> ReconciliationResult<Vec<ReconciliationMatch>> {
        let state = self.state.read().unwrap();
        Ok(state
            .matches
            .values()
            .filter(|m| m.statement_id == statement_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn credit(id: &str, amount: i64) -> BankTransaction {
        BankTransaction::credit(
            id.to_string(),
            "stmt1".to_string(),
            date(15),
            "Receipt".to_string(),
            BigDecimal::from(amount),
        )
    }

    #[tokio::test]
    async fn stale_version_aborts_whole_commit() {
        let mut store = MemoryStore::new();
        store.insert_bank_transaction(credit("b1", 100));
        store.insert_bank_transaction(credit("b2", 200));

        let b1 = store.get_bank_transaction("b1").await.unwrap().unwrap();
        let b2 = store.get_bank_transaction("b2").await.unwrap().unwrap();

        // Another writer bumps b2 in between.
        let mut raced = b2.clone();
        raced.description = "Raced".to_string();
        store
            .atomic_update(
                &[RecordVersion::bank_transaction(&b2)],
                vec![RecordWrite::BankTransaction(raced)],
            )
            .await
            .unwrap();

        let mut write1 = b1.clone();
        write1.status = TransactionStatus::Matched;
        let mut write2 = b2.clone();
        write2.status = TransactionStatus::Matched;
        let err = store
            .atomic_update(
                &[
                    RecordVersion::bank_transaction(&b1),
                    RecordVersion::bank_transaction(&b2),
                ],
                vec![
                    RecordWrite::BankTransaction(write1),
                    RecordWrite::BankTransaction(write2),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::Conflict(_)));

        // b1 was part of the failed commit and stayed untouched.
        let b1_after = store.get_bank_transaction("b1").await.unwrap().unwrap();
        assert_eq!(b1_after.status, TransactionStatus::Unmatched);
        assert_eq!(b1_after.version, 0);
    }

    #[tokio::test]
    async fn committed_writes_bump_versions() {
        let mut store = MemoryStore::new();
        store.insert_bank_transaction(credit("b1", 100));
        let b1 = store.get_bank_transaction("b1").await.unwrap().unwrap();

        let mut write = b1.clone();
        write.status = TransactionStatus::Matched;
        store
            .atomic_update(
                &[RecordVersion::bank_transaction(&b1)],
                vec![RecordWrite::BankTransaction(write)],
            )
            .await
            .unwrap();

        let after = store.get_bank_transaction("b1").await.unwrap().unwrap();
        assert_eq!(after.version, 1);
        assert_eq!(after.status, TransactionStatus::Matched);
    }

    #[tokio::test]
    async fn open_ledger_query_filters_window_and_flag() {
        let store = MemoryStore::new();
        for (id, day, reconciled) in [("l1", 10, false), ("l2", 10, true), ("l3", 25, false)] {
            let mut txn = LedgerTransaction::new(
                id.to_string(),
                date(day),
                BigDecimal::from(100),
                Direction::Inflow,
                "INR".to_string(),
            );
            txn.reconciled = reconciled;
            store.insert_ledger_transaction(txn);
        }

        let open = store
            .get_open_ledger_transactions(date(1), date(20))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "l1");
    }

    #[tokio::test]
    async fn update_match_requires_existing_record() {
        let mut store = MemoryStore::new();
        let m = ReconciliationMatch::suggested(
            "stmt1".to_string(),
            vec!["b1".to_string()],
            vec!["l1".to_string()],
            1.0,
        );
        let err = store.update_match(&m).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::MatchNotFound(_)));

        store.create_match(&m).await.unwrap();
        store.update_match(&m).await.unwrap();
    }
}

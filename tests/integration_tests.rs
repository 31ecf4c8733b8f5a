//! Integration tests for reconciliation-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    BankStatement, BankTransaction, Direction, LedgerTransaction, MatchStatus, MatchType,
    MemoryStore, ReconciliationEngine, ReconciliationError, ReconciliationMatch,
    ReconciliationReport, ReconciliationStore, StatementStatus, TransactionStatus,
};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

/// Seed a January statement with four bank transactions:
/// - b1: 15000 credit with an exact ledger counterpart (l1)
/// - b2: 30000 credit settled by three 10000 ledger receipts (l2-l4)
/// - b3: 5000 cheque debit with no counterpart (outstanding)
/// - b4: 12000 debit split across six 2000 ledger payments (l5-l10),
///   too many for the grouped search to find
fn seed_workflow_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_statement(BankStatement::new(
        "stmt-2025-01".to_string(),
        "acct-current".to_string(),
        date(1),
        date(31),
        BigDecimal::from(40000),
        BigDecimal::from(100000),
        "INR".to_string(),
    ));

    store.insert_bank_transaction(
        BankTransaction::credit(
            "b1".to_string(),
            "stmt-2025-01".to_string(),
            date(15),
            "NEFT ACME LTD".to_string(),
            BigDecimal::from(15000),
        )
        .with_reference("INV-1001".to_string()),
    );
    store.insert_bank_transaction(BankTransaction::credit(
        "b2".to_string(),
        "stmt-2025-01".to_string(),
        date(10),
        "Gateway settlement".to_string(),
        BigDecimal::from(30000),
    ));
    store.insert_bank_transaction(
        BankTransaction::debit(
            "b3".to_string(),
            "stmt-2025-01".to_string(),
            date(20),
            "CHQ 000201 Vendor".to_string(),
            BigDecimal::from(5000),
        )
        .with_cheque_number("000201".to_string()),
    );
    store.insert_bank_transaction(BankTransaction::debit(
        "b4".to_string(),
        "stmt-2025-01".to_string(),
        date(22),
        "Payroll batch".to_string(),
        BigDecimal::from(12000),
    ));

    store.insert_ledger_transaction(
        LedgerTransaction::new(
            "l1".to_string(),
            date(15),
            BigDecimal::from(15000),
            Direction::Inflow,
            "INR".to_string(),
        )
        .with_reference("INV-1001".to_string()),
    );
    for (id, day) in [("l2", 9), ("l3", 10), ("l4", 11)] {
        store.insert_ledger_transaction(LedgerTransaction::new(
            id.to_string(),
            date(day),
            BigDecimal::from(10000),
            Direction::Inflow,
            "INR".to_string(),
        ));
    }
    for i in 5..=10 {
        store.insert_ledger_transaction(LedgerTransaction::new(
            format!("l{}", i),
            date(22),
            BigDecimal::from(2000),
            Direction::Outflow,
            "INR".to_string(),
        ));
    }

    store
}

#[tokio::test]
async fn test_complete_reconciliation_workflow() {
    let store = seed_workflow_store();
    let mut engine = ReconciliationEngine::new(store.clone());

    // Candidate generation finds the exact pair and the grouped
    // settlement, ranked best-first.
    let set = engine.suggest_candidates("stmt-2025-01").await.unwrap();
    assert!(set.candidates.len() >= 2);
    assert_eq!(set.candidates[0].confidence_score, 1.0);
    assert!(set
        .candidates
        .iter()
        .any(|c| c.match_type == MatchType::OneToMany));

    // The auto sweep confirms both high-confidence candidates.
    let summary = engine
        .auto_match_transactions("stmt-2025-01", None)
        .await
        .unwrap();
    assert_eq!(summary.auto_matched, 2);
    assert_eq!(summary.remaining_unmatched, 2);

    let statement = store.get_statement("stmt-2025-01").await.unwrap().unwrap();
    assert_eq!(statement.status, StatementStatus::Reconciling);

    // The payroll batch is split across six ledger payments, one more
    // than the grouped search will combine, so it is matched by hand.
    let manual = ReconciliationMatch::suggested(
        "stmt-2025-01".to_string(),
        vec!["b4".to_string()],
        (5..=10).map(|i| format!("l{}", i)).collect(),
        0.0,
    );
    let confirmed = engine.match_transactions(&manual, "accountant").await.unwrap();
    assert_eq!(confirmed.match_type, MatchType::OneToMany);
    assert_eq!(confirmed.created_by, "accountant");

    // Statistics reflect the three confirmed matches and the
    // outstanding cheque.
    let stats = engine
        .get_reconciliation_stats("stmt-2025-01")
        .await
        .unwrap();
    assert_eq!(stats.total_bank_transactions, 4);
    assert_eq!(stats.matched_count, 3);
    assert_eq!(stats.unmatched_count, 1);
    assert_eq!(stats.reconciled_amount, BigDecimal::from(57000));
    assert_eq!(stats.unreconciled_amount, BigDecimal::from(43000));
    assert_eq!(stats.outstanding_cheques.len(), 1);
    assert_eq!(stats.outstanding_cheque_total, BigDecimal::from(5000));

    // Reconciling with the cheque unresolved names it; accepting it
    // completes the statement and cascades matched transactions.
    let err = engine
        .mark_statement_as_reconciled("stmt-2025-01", &[])
        .await
        .unwrap_err();
    match err {
        ReconciliationError::Validation(message) => assert!(message.contains("b3")),
        other => panic!("unexpected error: {:?}", other),
    }

    let statement = engine
        .mark_statement_as_reconciled("stmt-2025-01", &["b3".to_string()])
        .await
        .unwrap();
    assert_eq!(statement.status, StatementStatus::Reconciled);
    let b1 = store.get_bank_transaction("b1").await.unwrap().unwrap();
    assert_eq!(b1.status, TransactionStatus::Reconciled);

    // Terminal: no further matching is permitted.
    let err = engine
        .match_transactions(&manual, "accountant")
        .await
        .unwrap_err();
    assert!(matches!(err, ReconciliationError::Validation(_)));
}

#[tokio::test]
async fn test_unmatch_rematch_round_trip() {
    let store = seed_workflow_store();
    let mut engine = ReconciliationEngine::new(store.clone());

    engine
        .auto_match_transactions("stmt-2025-01", None)
        .await
        .unwrap();

    let matches = store.list_statement_matches("stmt-2025-01").await.unwrap();
    let grouped = matches
        .iter()
        .find(|m| m.match_type == MatchType::OneToMany)
        .expect("expected the grouped settlement match")
        .clone();

    engine
        .unmatch_transaction(&grouped.id, "accountant")
        .await
        .unwrap();
    let b2 = store.get_bank_transaction("b2").await.unwrap().unwrap();
    assert_eq!(b2.status, TransactionStatus::Unmatched);
    for id in &grouped.ledger_transaction_ids {
        let txn = store.get_ledger_transaction(id).await.unwrap().unwrap();
        assert!(!txn.reconciled);
    }

    // Confirming the same candidate again reproduces the original state.
    let again = engine
        .match_transactions(&grouped, "accountant")
        .await
        .unwrap();
    assert_eq!(again.id, grouped.id);
    assert_eq!(again.status, MatchStatus::Confirmed);
    let b2 = store.get_bank_transaction("b2").await.unwrap().unwrap();
    assert_eq!(b2.status, TransactionStatus::Matched);
    for id in &grouped.ledger_transaction_ids {
        let txn = store.get_ledger_transaction(id).await.unwrap().unwrap();
        assert!(txn.reconciled);
    }
}

#[tokio::test]
async fn test_concurrent_confirmations_never_double_match() {
    let store = seed_workflow_store();
    let candidate = ReconciliationMatch::suggested(
        "stmt-2025-01".to_string(),
        vec!["b1".to_string()],
        vec!["l1".to_string()],
        1.0,
    );

    let mut engine_a = ReconciliationEngine::new(store.clone());
    let mut engine_b = ReconciliationEngine::new(store.clone());
    let candidate_a = candidate.clone();
    let candidate_b = candidate.clone();

    let task_a =
        tokio::spawn(async move { engine_a.match_transactions(&candidate_a, "alice").await });
    let task_b =
        tokio::spawn(async move { engine_b.match_transactions(&candidate_b, "bob").await });

    let result_a = task_a.await.unwrap();
    let result_b = task_b.await.unwrap();

    // Exactly one confirmation wins; the loser sees a conflict.
    assert_eq!(
        u32::from(result_a.is_ok()) + u32::from(result_b.is_ok()),
        1
    );
    let loser = if result_a.is_ok() { result_b } else { result_a };
    assert!(matches!(
        loser.unwrap_err(),
        ReconciliationError::Conflict(_)
    ));

    let b1 = store.get_bank_transaction("b1").await.unwrap().unwrap();
    assert_eq!(b1.status, TransactionStatus::Matched);
    assert_eq!(b1.match_ids.len(), 1);
}

#[tokio::test]
async fn test_report_serializes_for_export() {
    let store = seed_workflow_store();
    let mut engine = ReconciliationEngine::new(store);

    engine
        .auto_match_transactions("stmt-2025-01", None)
        .await
        .unwrap();
    let report = engine
        .generate_reconciliation_report("stmt-2025-01")
        .await
        .unwrap();

    assert_eq!(report.statement_id, "stmt-2025-01");
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.unmatched_bank_transactions.len(), 2);

    let json = serde_json::to_string(&report).unwrap();
    let parsed: ReconciliationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, report);
}

#[tokio::test]
async fn test_batch_reports_each_outcome() {
    let store = seed_workflow_store();
    let mut engine = ReconciliationEngine::new(store);

    let exact = ReconciliationMatch::suggested(
        "stmt-2025-01".to_string(),
        vec!["b1".to_string()],
        vec!["l1".to_string()],
        1.0,
    );
    // Re-uses b1, so it must conflict without affecting the others.
    let overlapping = ReconciliationMatch::suggested(
        "stmt-2025-01".to_string(),
        vec!["b1".to_string()],
        vec!["l2".to_string()],
        0.9,
    );
    let grouped = ReconciliationMatch::suggested(
        "stmt-2025-01".to_string(),
        vec!["b2".to_string()],
        vec!["l2".to_string(), "l3".to_string(), "l4".to_string()],
        1.0,
    );

    let outcomes = engine
        .match_multiple_transactions(&[exact, overlapping, grouped], "accountant")
        .await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].outcome.is_ok());
    assert!(matches!(
        outcomes[1].outcome,
        Err(ReconciliationError::Conflict(_))
    ));
    assert!(outcomes[2].outcome.is_ok());
}

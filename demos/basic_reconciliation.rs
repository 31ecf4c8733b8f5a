//! Basic reconciliation usage example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    BankStatement, BankTransaction, Direction, LedgerTransaction, MemoryStore,
    ReconciliationEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🏦 Reconciliation Core - Basic Example\n");

    // Create an engine over in-memory storage
    let store = MemoryStore::new();
    let mut engine = ReconciliationEngine::new(store.clone());

    // 1. Seed an imported statement, as the ingestion collaborator would
    println!("📥 Importing January statement...");
    store.insert_statement(BankStatement::new(
        "stmt-2025-01".to_string(),
        "acct-current".to_string(),
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        BigDecimal::from(20000),
        BigDecimal::from(60000),
        "INR".to_string(),
    ));

    store.insert_bank_transaction(
        BankTransaction::credit(
            "bank-001".to_string(),
            "stmt-2025-01".to_string(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            "NEFT ACME LTD".to_string(),
            BigDecimal::from(10000),
        )
        .with_reference("INV-1001".to_string()),
    );
    store.insert_bank_transaction(BankTransaction::credit(
        "bank-002".to_string(),
        "stmt-2025-01".to_string(),
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
        "Gateway settlement".to_string(),
        BigDecimal::from(30000),
    ));
    store.insert_bank_transaction(
        BankTransaction::debit(
            "bank-003".to_string(),
            "stmt-2025-01".to_string(),
            NaiveDate::from_ymd_opt(2025, 1, 25).unwrap(),
            "CHQ 000201 Vendor".to_string(),
            BigDecimal::from(5000),
        )
        .with_cheque_number("000201".to_string()),
    );
    println!("  ✓ 3 bank transactions imported");

    // 2. Seed open ledger transactions, as the ledger collaborator would
    store.insert_ledger_transaction(
        LedgerTransaction::new(
            "ledger-001".to_string(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            BigDecimal::from(10000),
            Direction::Inflow,
            "INR".to_string(),
        )
        .with_reference("INV-1001".to_string()),
    );
    for (id, day) in [("ledger-002", 19), ("ledger-003", 20), ("ledger-004", 20)] {
        store.insert_ledger_transaction(LedgerTransaction::new(
            id.to_string(),
            NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            BigDecimal::from(10000),
            Direction::Inflow,
            "INR".to_string(),
        ));
    }
    println!("  ✓ 4 open ledger transactions loaded\n");

    // 3. Generate ranked candidates
    println!("🔍 Generating match candidates...");
    let set = engine.suggest_candidates("stmt-2025-01").await?;
    for candidate in &set.candidates {
        println!(
            "  {:?} candidate: {:?} ↔ {:?} (score {:.2})",
            candidate.match_type,
            candidate.bank_transaction_ids,
            candidate.ledger_transaction_ids,
            candidate.confidence_score
        );
    }
    println!();

    // 4. Run the auto-match sweep
    println!("⚙️  Running auto-match sweep...");
    let summary = engine.auto_match_transactions("stmt-2025-01", None).await?;
    println!(
        "  ✓ {} auto-matched, {} still unmatched\n",
        summary.auto_matched, summary.remaining_unmatched
    );

    // 5. Inspect statement statistics
    println!("📊 Reconciliation statistics:");
    let stats = engine.get_reconciliation_stats("stmt-2025-01").await?;
    println!("  Matched:              {}", stats.matched_count);
    println!("  Unmatched:            {}", stats.unmatched_count);
    println!("  Reconciled amount:    ₹{}", stats.reconciled_amount);
    println!("  Unreconciled amount:  ₹{}", stats.unreconciled_amount);
    println!(
        "  Outstanding cheques:  ₹{}",
        stats.outstanding_cheque_total
    );
    println!();

    // 6. Close the statement, accepting the uncleared cheque
    println!("🔒 Marking statement reconciled...");
    let statement = engine
        .mark_statement_as_reconciled("stmt-2025-01", &["bank-003".to_string()])
        .await?;
    println!("  ✓ Statement status: {:?}", statement.status);

    println!("\n🎉 Example completed successfully!");
    Ok(())
}

//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle of an imported bank statement
///
/// The status only ever advances; `Reconciled` is terminal and no
/// further matching is permitted once it is reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementStatus {
    /// Statement has been imported but no match confirmed yet
    Imported,
    /// At least one match has been confirmed against the statement
    Reconciling,
    /// Every transaction accounted for; terminal
    Reconciled,
}

/// Match state of a single bank transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Not part of any confirmed match
    Unmatched,
    /// Member of exactly one confirmed match
    Matched,
    /// Owning statement was marked reconciled; terminal
    Reconciled,
}

/// Lifecycle of a reconciliation match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Proposed by the candidate generator, not acted on
    Suggested,
    /// Confirmed by a user or the auto-match sweep
    Confirmed,
    /// Rejected outright, or a confirmed match that was unmatched;
    /// retained for audit either way
    Rejected,
}

/// Shape of a match, derived from the cardinality of each side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl MatchType {
    /// Classify a match from the number of transactions on each side
    pub fn classify(bank_count: usize, ledger_count: usize) -> Self {
        match (bank_count, ledger_count) {
            (1, 1) => MatchType::OneToOne,
            (1, _) => MatchType::OneToMany,
            (_, 1) => MatchType::ManyToOne,
            _ => MatchType::ManyToMany,
        }
    }
}

/// Direction of a cash movement relative to the bank account
///
/// A bank credit is an inflow, a bank debit is an outflow. Only
/// transactions moving the same direction are ever matched together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inflow,
    Outflow,
}

/// An imported bank statement for one account and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatement {
    /// Unique identifier for the statement
    pub id: String,
    /// Bank account the statement belongs to
    pub bank_account_id: String,
    /// First day of the statement period
    pub period_start: NaiveDate,
    /// Last day of the statement period
    pub period_end: NaiveDate,
    /// Balance at the start of the period
    pub opening_balance: BigDecimal,
    /// Balance at the end of the period
    pub closing_balance: BigDecimal,
    /// ISO currency code of the statement
    pub currency: String,
    /// Current lifecycle status
    pub status: StatementStatus,
    /// Optimistic-concurrency token, bumped on every committed write
    pub version: u64,
    /// When the statement was imported
    pub created_at: NaiveDateTime,
    /// When the statement was last updated
    pub updated_at: NaiveDateTime,
}

impl BankStatement {
    /// Create a freshly imported statement
    pub fn new(
        id: String,
        bank_account_id: String,
        period_start: NaiveDate,
        period_end: NaiveDate,
        opening_balance: BigDecimal,
        closing_balance: BigDecimal,
        currency: String,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            bank_account_id,
            period_start,
            period_end,
            opening_balance,
            closing_balance,
            currency,
            status: StatementStatus::Imported,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the statement still accepts matching operations
    pub fn is_open(&self) -> bool {
        self.status != StatementStatus::Reconciled
    }
}

/// A single transaction line of a bank statement
///
/// Created during import and never deleted; only its `status` and
/// `match_ids` change, and only through the match resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Unique identifier for the transaction
    pub id: String,
    /// Statement the transaction was imported with
    pub statement_id: String,
    /// Booking date
    pub date: NaiveDate,
    /// Value date (defaults to the booking date)
    pub value_date: NaiveDate,
    /// Description as printed on the statement
    pub description: String,
    /// Debit amount; at most one of debit/credit is non-zero
    pub debit: BigDecimal,
    /// Credit amount; at most one of debit/credit is non-zero
    pub credit: BigDecimal,
    /// Running balance after this transaction
    pub running_balance: BigDecimal,
    /// Optional bank reference
    pub reference: Option<String>,
    /// Optional cheque number
    pub cheque_number: Option<String>,
    /// Current match state
    pub status: TransactionStatus,
    /// Every match the transaction has ever been a member of,
    /// including rejected ones
    pub match_ids: Vec<String>,
    /// Optimistic-concurrency token
    pub version: u64,
    /// When the transaction was imported
    pub created_at: NaiveDateTime,
}

impl BankTransaction {
    fn new(
        id: String,
        statement_id: String,
        date: NaiveDate,
        description: String,
        debit: BigDecimal,
        credit: BigDecimal,
    ) -> Self {
        Self {
            id,
            statement_id,
            date,
            value_date: date,
            description,
            debit,
            credit,
            running_balance: BigDecimal::from(0),
            reference: None,
            cheque_number: None,
            status: TransactionStatus::Unmatched,
            match_ids: Vec::new(),
            version: 0,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Create a debit (outflow) transaction
    pub fn debit(
        id: String,
        statement_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
    ) -> Self {
        Self::new(id, statement_id, date, description, amount, BigDecimal::from(0))
    }

    /// Create a credit (inflow) transaction
    pub fn credit(
        id: String,
        statement_id: String,
        date: NaiveDate,
        description: String,
        amount: BigDecimal,
    ) -> Self {
        Self::new(id, statement_id, date, description, BigDecimal::from(0), amount)
    }

    /// Set the bank reference
    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the cheque number
    pub fn with_cheque_number(mut self, cheque_number: String) -> Self {
        self.cheque_number = Some(cheque_number);
        self
    }

    /// Set the value date when it differs from the booking date
    pub fn with_value_date(mut self, value_date: NaiveDate) -> Self {
        self.value_date = value_date;
        self
    }

    /// Set the running balance after this transaction
    pub fn with_running_balance(mut self, running_balance: BigDecimal) -> Self {
        self.running_balance = running_balance;
        self
    }

    /// The magnitude of the movement, whichever side carries it
    pub fn amount(&self) -> BigDecimal {
        if self.debit > BigDecimal::from(0) {
            self.debit.clone()
        } else {
            self.credit.clone()
        }
    }

    /// Direction of the movement relative to the bank account
    pub fn direction(&self) -> Direction {
        if self.debit > BigDecimal::from(0) {
            Direction::Outflow
        } else {
            Direction::Inflow
        }
    }
}

/// Read view of a ledger transaction, owned by the ledger collaborator
///
/// The engine only reads open (unreconciled) ledger transactions and
/// writes back the `reconciled` flag through the store contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Unique identifier within the ledger
    pub id: String,
    /// Posting date
    pub date: NaiveDate,
    /// Positive magnitude of the movement
    pub amount: BigDecimal,
    /// Cash direction relative to the bank account
    pub direction: Direction,
    /// ISO currency code
    pub currency: String,
    /// Optional reference (invoice number, payment id, ...)
    pub reference: Option<String>,
    /// Optional cheque number
    pub cheque_number: Option<String>,
    /// Whether the transaction is already covered by a confirmed match
    pub reconciled: bool,
    /// Optimistic-concurrency token
    pub version: u64,
}

impl LedgerTransaction {
    /// Create an open ledger transaction view
    pub fn new(
        id: String,
        date: NaiveDate,
        amount: BigDecimal,
        direction: Direction,
        currency: String,
    ) -> Self {
        Self {
            id,
            date,
            amount,
            direction,
            currency,
            reference: None,
            cheque_number: None,
            reconciled: false,
            version: 0,
        }
    }

    /// Set the reference
    pub fn with_reference(mut self, reference: String) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the cheque number
    pub fn with_cheque_number(mut self, cheque_number: String) -> Self {
        self.cheque_number = Some(cheque_number);
        self
    }
}

/// A proposed or confirmed grouping of bank and ledger transactions
/// believed to represent the same economic event
///
/// One tagged shape covers every cardinality; the ordered id lists plus
/// `match_type` replace separate record types per shape. Matches are
/// never hard-deleted: rejected and unmatched records stay for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    /// Unique identifier for the match
    pub id: String,
    /// Statement the bank side belongs to
    pub statement_id: String,
    /// Bank transaction members, in ranking order
    pub bank_transaction_ids: Vec<String>,
    /// Ledger transaction members, in ranking order
    pub ledger_transaction_ids: Vec<String>,
    /// Shape of the match
    pub match_type: MatchType,
    /// Weighted confidence estimate produced by the scoring engine
    pub confidence_score: f64,
    /// Current lifecycle status
    pub status: MatchStatus,
    /// User (or sweep) that put the record in its current status
    pub created_by: String,
    /// When the match record was created
    pub created_at: NaiveDateTime,
    /// When the match was confirmed, if it ever was
    pub confirmed_at: Option<NaiveDateTime>,
}

impl ReconciliationMatch {
    /// Create a suggested match as produced by the candidate generator
    pub fn suggested(
        statement_id: String,
        bank_transaction_ids: Vec<String>,
        ledger_transaction_ids: Vec<String>,
        confidence_score: f64,
    ) -> Self {
        let match_type =
            MatchType::classify(bank_transaction_ids.len(), ledger_transaction_ids.len());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            statement_id,
            bank_transaction_ids,
            ledger_transaction_ids,
            match_type,
            confidence_score,
            status: MatchStatus::Suggested,
            created_by: "candidate-generator".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            confirmed_at: None,
        }
    }

    /// Mark the match confirmed on behalf of `user_id`
    pub fn confirm(&mut self, user_id: &str) {
        self.status = MatchStatus::Confirmed;
        self.created_by = user_id.to_string();
        self.confirmed_at = Some(chrono::Utc::now().naive_utc());
    }

    /// Mark the match rejected (also used when unmatching)
    pub fn reject(&mut self) {
        self.status = MatchStatus::Rejected;
    }

    /// Total number of member transactions across both sides
    pub fn group_size(&self) -> usize {
        self.bank_transaction_ids.len() + self.ledger_transaction_ids.len()
    }
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Statement not found: {0}")]
    StatementNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Match not found: {0}")]
    MatchNotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Amounts do not balance: bank total = {bank_total}, ledger total = {ledger_total}")]
    Imbalance {
        bank_total: BigDecimal,
        ledger_total: BigDecimal,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Search budget exceeded for anchor: {0}")]
    SearchBudgetExceeded(String),
}

/// Result type for reconciliation operations
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

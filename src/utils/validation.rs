//! Validation utilities

use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> ReconciliationResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(ReconciliationError::Validation(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate that a record ID is valid
pub fn validate_record_id(record_id: &str) -> ReconciliationResult<()> {
    if record_id.trim().is_empty() {
        return Err(ReconciliationError::Validation(
            "Record ID cannot be empty".to_string(),
        ));
    }

    if record_id.len() > 64 {
        return Err(ReconciliationError::Validation(
            "Record ID cannot exceed 64 characters".to_string(),
        ));
    }

    // Check for valid characters (alphanumeric, dashes, underscores)
    if !record_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ReconciliationError::Validation(
            "Record ID can only contain alphanumeric characters, dashes, and underscores"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate that a bank transaction carries exactly one movement
///
/// At most one of debit/credit may be non-zero, and that side must be
/// positive.
pub fn validate_bank_transaction(transaction: &BankTransaction) -> ReconciliationResult<()> {
    let zero = BigDecimal::from(0);
    let has_debit = transaction.debit != zero;
    let has_credit = transaction.credit != zero;

    if has_debit && has_credit {
        return Err(ReconciliationError::Validation(format!(
            "Bank transaction '{}' carries both a debit and a credit",
            transaction.id
        )));
    }
    if !has_debit && !has_credit {
        return Err(ReconciliationError::Validation(format!(
            "Bank transaction '{}' carries no movement",
            transaction.id
        )));
    }

    validate_positive_amount(&transaction.amount())
}

/// Enhanced candidate validator with detailed checks
pub struct EnhancedCandidateValidator;

impl CandidateValidator for EnhancedCandidateValidator {
    fn validate_candidate(&self, candidate: &ReconciliationMatch) -> ReconciliationResult<()> {
        // Basic shape rules first
        DefaultCandidateValidator.validate_candidate(candidate)?;

        validate_record_id(&candidate.statement_id)?;
        for id in candidate
            .bank_transaction_ids
            .iter()
            .chain(candidate.ledger_transaction_ids.iter())
        {
            validate_record_id(id)?;
        }

        if candidate.confidence_score < 0.0 {
            return Err(ReconciliationError::Validation(format!(
                "Candidate '{}' has a negative confidence score",
                candidate.id
            )));
        }

        Ok(())
    }
}

use std::sync::Arc;

use crate::error::PartiqlDbError;
use crate::transaction::RequestSlot;

/// Outcome of a data-changing statement.
#[derive(Debug, Clone)]
pub enum ExecResult {
    /// Ran immediately; the service changes at most one record per statement.
    Immediate { rows_affected: u64 },
    /// Staged inside a transaction; resolved when the transaction commits.
    Deferred(Arc<RequestSlot>),
}

impl ExecResult {
    /// Rows changed by the statement.
    ///
    /// A staged statement reports 0 until its transaction commits, 1 after a successful commit,
    /// and the batch error after a failed one. A rolled back statement stays at 0.
    ///
    /// # Errors
    /// The error recorded for a staged statement whose batch failed.
    pub fn rows_affected(&self) -> Result<u64, PartiqlDbError> {
        match self {
            ExecResult::Immediate { rows_affected } => Ok(*rows_affected),
            ExecResult::Deferred(slot) => match slot.outcome() {
                None => Ok(0),
                Some(Ok(_)) => Ok(1),
                Some(Err(err)) => Err(err.clone()),
            },
        }
    }

    /// The service has no generated keys.
    ///
    /// # Errors
    /// Always `PartiqlDbError::NotSupported`.
    pub fn last_insert_id(&self) -> Result<i64, PartiqlDbError> {
        Err(PartiqlDbError::NotSupported("last_insert_id".into()))
    }
}

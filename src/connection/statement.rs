use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use super::Connection;
use crate::binding::Param;
use crate::classify::ParsedStatement;
use crate::error::PartiqlDbError;
use crate::results::{ExecResult, Rows};

/// A statement classified once and executed any number of times.
#[derive(Debug)]
pub struct Statement {
    conn: Connection,
    parsed: ParsedStatement,
    closed: AtomicBool,
}

impl Statement {
    pub(super) fn new(conn: Connection, parsed: ParsedStatement) -> Self {
        Self {
            conn,
            parsed,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of parameters every execution must supply.
    #[must_use]
    pub fn num_input(&self) -> usize {
        self.parsed.placeholder_count()
    }

    #[must_use]
    pub fn parsed(&self) -> &ParsedStatement {
        &self.parsed
    }

    fn ensure_usable(&self) -> Result<(), PartiqlDbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PartiqlDbError::StatementClosed);
        }
        if self.conn.is_closed() {
            return Err(PartiqlDbError::ConnectionClosed);
        }
        Ok(())
    }

    /// # Errors
    /// `StatementClosed`, `ConnectionClosed`, or any error of [`Connection::query`].
    pub async fn query(&self, params: &[Param]) -> Result<Rows, PartiqlDbError> {
        self.query_with_cancel(params, &CancellationToken::new())
            .await
    }

    /// # Errors
    /// `StatementClosed`, `ConnectionClosed`, or any error of [`Connection::query`].
    pub async fn query_with_cancel(
        &self,
        params: &[Param],
        cancel: &CancellationToken,
    ) -> Result<Rows, PartiqlDbError> {
        self.ensure_usable()?;
        self.conn.query_parsed(&self.parsed, params, cancel).await
    }

    /// # Errors
    /// `StatementClosed`, `ConnectionClosed`, or any error of [`Connection::execute`].
    pub async fn execute(&self, params: &[Param]) -> Result<ExecResult, PartiqlDbError> {
        self.ensure_usable()?;
        self.conn.execute_parsed(&self.parsed, params).await
    }

    /// Mark the statement unusable. Safe to call repeatedly.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

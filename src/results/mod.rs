mod cursor;
mod exec_result;
mod fetch;
pub mod meta;
mod result_set;
mod row;
mod tx_cursor;

pub use cursor::{Cursor, Page, PageFetcher, Scanner, Slot};
pub use exec_result::ExecResult;
pub use fetch::StatementFetcher;
pub use result_set::ResultSet;
pub use row::CustomDbRow;
pub use tx_cursor::{TxCommitter, TxCursor};

use crate::error::PartiqlDbError;

/// Records returned by [`Connection::query`](crate::Connection::query).
#[derive(Debug)]
pub enum Rows {
    /// Read directly from the service, page by page.
    Paged(Cursor),
    /// Staged inside a transaction; reading it commits the transaction.
    Tx(TxCursor),
}

impl Rows {
    /// Requested columns; empty when every attribute was requested.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            Rows::Paged(cursor) => cursor.columns(),
            Rows::Tx(cursor) => cursor.columns(),
        }
    }

    /// # Errors
    /// Fetch errors, cancellation, or the batch error of a staged query.
    pub async fn advance_page(&mut self) -> Result<bool, PartiqlDbError> {
        match self {
            Rows::Paged(cursor) => cursor.advance_page().await,
            Rows::Tx(cursor) => cursor.advance_page().await,
        }
    }

    /// # Errors
    /// `WorkerError` if a staged query's transaction worker vanished.
    pub async fn has_next_page(&mut self) -> Result<bool, PartiqlDbError> {
        match self {
            Rows::Paged(cursor) => Ok(cursor.has_next_page()),
            Rows::Tx(cursor) => cursor.has_next_page().await,
        }
    }

    /// Read the current record into `dest`. A paged cursor does not fetch here; a staged query
    /// commits its transaction first.
    ///
    /// # Errors
    /// Scanner errors or the batch error of a staged query.
    pub async fn next(&mut self, dest: &mut [Slot<'_>]) -> Result<bool, PartiqlDbError> {
        match self {
            Rows::Paged(cursor) => cursor.next(dest),
            Rows::Tx(cursor) => cursor.next(dest).await,
        }
    }

    /// # Errors
    /// Fetch errors, cancellation, or the batch error of a staged query.
    pub async fn next_row(&mut self) -> Result<Option<CustomDbRow>, PartiqlDbError> {
        match self {
            Rows::Paged(cursor) => cursor.next_row().await,
            Rows::Tx(cursor) => cursor.next_row().await,
        }
    }

    /// # Errors
    /// Fetch errors, cancellation, or the batch error of a staged query.
    pub async fn collect(self) -> Result<ResultSet, PartiqlDbError> {
        match self {
            Rows::Paged(cursor) => cursor.collect().await,
            Rows::Tx(cursor) => cursor.collect().await,
        }
    }

    pub fn close(&mut self) {
        match self {
            Rows::Paged(cursor) => cursor.close(),
            Rows::Tx(cursor) => cursor.close(),
        }
    }
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::cursor::{Cursor, Page, PageFetcher, Slot};
use super::result_set::ResultSet;
use super::row::CustomDbRow;
use crate::error::PartiqlDbError;
use crate::transaction::{RequestSlot, TxCoordinator};

/// Commits transaction `tx_id` on behalf of a reader that needs its results.
#[derive(Clone)]
pub struct TxCommitter {
    coordinator: Arc<TxCoordinator>,
    tx_id: u64,
}

impl TxCommitter {
    #[must_use]
    pub fn new(coordinator: Arc<TxCoordinator>, tx_id: u64) -> Self {
        Self { coordinator, tx_id }
    }

    /// # Errors
    /// `WorkerError` if the transaction worker vanished.
    pub async fn commit(&self) -> Result<(), PartiqlDbError> {
        self.coordinator.commit_if_current(self.tx_id).await
    }
}

/// Serves the single record held by a staged request's slot.
struct SlotFetcher {
    slot: Arc<RequestSlot>,
}

#[async_trait]
impl PageFetcher for SlotFetcher {
    async fn fetch(&self, _token: Option<String>) -> Result<Page, PartiqlDbError> {
        match self.slot.outcome() {
            None | Some(Ok(None)) => Ok(Page::empty()),
            Some(Ok(Some(item))) => Ok(Page::new(vec![item.clone()], None)),
            Some(Err(err)) => Err(err.clone()),
        }
    }
}

/// Reader for a query staged inside a transaction.
///
/// Staged queries have no result until the transaction commits, so the first page advance or
/// next-page check commits the owning transaction. The cursor then advances exactly once: a
/// staged query yields at most one record.
pub struct TxCursor {
    inner: Cursor,
    committer: TxCommitter,
    advanced: bool,
}

impl fmt::Debug for TxCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxCursor")
            .field("inner", &self.inner)
            .field("tx_id", &self.committer.tx_id)
            .field("advanced", &self.advanced)
            .finish()
    }
}

impl TxCursor {
    #[must_use]
    pub fn new(columns: Vec<String>, slot: Arc<RequestSlot>, committer: TxCommitter) -> Self {
        // The empty token makes the first advance go to the slot.
        let placeholder = Page::new(Vec::new(), Some(String::new()));
        Self {
            inner: Cursor::new(
                columns,
                placeholder,
                Arc::new(SlotFetcher { slot }),
                CancellationToken::new(),
            ),
            committer,
            advanced: false,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    /// Commit the owning transaction, then report whether more pages exist.
    ///
    /// # Errors
    /// `WorkerError` if the transaction worker vanished.
    pub async fn has_next_page(&mut self) -> Result<bool, PartiqlDbError> {
        self.committer.commit().await?;
        Ok(self.inner.has_next_page())
    }

    /// Commit the owning transaction and load the staged record. Only the first call fetches.
    ///
    /// A failed first advance ends the cursor: later calls and
    /// [`has_next_page`](Self::has_next_page) report no more data.
    ///
    /// # Errors
    /// The batch error recorded for this statement, if the commit failed.
    pub async fn advance_page(&mut self) -> Result<bool, PartiqlDbError> {
        self.committer.commit().await?;
        if self.advanced {
            return Ok(self.inner.has_unread());
        }
        self.advanced = true;
        let advanced = self.inner.advance_page().await;
        if advanced.is_err() {
            self.inner.close();
        }
        advanced
    }

    /// # Errors
    /// The batch error recorded for this statement, or a [`Scanner`](super::Scanner) error.
    pub async fn next(&mut self, dest: &mut [Slot<'_>]) -> Result<bool, PartiqlDbError> {
        self.advance_page().await?;
        self.inner.next(dest)
    }

    /// # Errors
    /// The batch error recorded for this statement.
    pub async fn next_row(&mut self) -> Result<Option<CustomDbRow>, PartiqlDbError> {
        self.advance_page().await?;
        Ok(self.inner.read_row())
    }

    /// # Errors
    /// The batch error recorded for this statement.
    pub async fn collect(mut self) -> Result<ResultSet, PartiqlDbError> {
        let mut result_set = ResultSet::default();
        while let Some(row) = self.next_row().await? {
            result_set.add_row(row);
        }
        self.close();
        Ok(result_set)
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

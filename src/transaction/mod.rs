//! Transaction coordinator.
//!
//! `begin` spawns a worker task that owns the queue of staged statements. Statements reach it
//! only through the command channel. `commit` asks the worker to run the whole queue as one
//! atomic batch and waits for the acknowledgment, so every [`RequestSlot`] handed out for the
//! transaction is resolved by the time `commit` returns. A commit that arrives while another is
//! in flight waits for the first one to finish. `rollback` tells the worker to drop the queue and
//! returns without waiting.

mod channel;
mod dispatcher;
mod manager;

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::{ParameterizedStatement, PartiqlClient};
use crate::error::PartiqlDbError;

pub use channel::RequestSlot;
use manager::TxWorker;

/// Lifecycle of the transaction slot on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TxState {
    /// No transaction has been started yet.
    Idle = 0,
    /// Statements may be staged.
    Active = 1,
    Committing = 2,
    RollingBack = 3,
    /// The last transaction finished and its worker is gone.
    Closed = 4,
}

impl TxState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TxState::Active,
            2 => TxState::Committing,
            3 => TxState::RollingBack,
            4 => TxState::Closed,
            _ => TxState::Idle,
        }
    }
}

/// A statement accepted into the active transaction.
#[derive(Debug, Clone)]
pub struct StagedHandle {
    pub tx_id: u64,
    pub slot: Arc<RequestSlot>,
}

/// Worker of the open transaction, or the completion signal of the one being committed.
#[derive(Default)]
struct Session {
    worker: Option<TxWorker>,
    committing: Option<PendingCommit>,
}

struct PendingCommit {
    tx_id: u64,
    done: watch::Receiver<bool>,
}

enum CommitClaim {
    /// This caller runs the commit and signals `done` when it is over.
    Run(TxWorker, watch::Sender<bool>),
    /// Another caller is committing the same transaction.
    Wait(watch::Receiver<bool>),
    Nothing,
}

/// Serializes transaction lifecycle transitions for one connection.
pub struct TxCoordinator {
    client: Arc<dyn PartiqlClient>,
    state: AtomicU8,
    session: Mutex<Session>,
    next_tx_id: AtomicU64,
}

impl std::fmt::Debug for TxCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxCoordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TxCoordinator {
    #[must_use]
    pub fn new(client: Arc<dyn PartiqlClient>) -> Self {
        Self {
            client,
            state: AtomicU8::new(TxState::Idle as u8),
            session: Mutex::new(Session::default()),
            next_tx_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        TxState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while statements are being staged.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TxState::Active
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn try_enter(&self, from: TxState, to: TxState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Open a session and spawn its worker; returns the new transaction id.
    ///
    /// # Errors
    /// `TransactionAlreadyActive` while another session is open or finishing;
    /// `WorkerError` if no async runtime is available.
    pub fn begin(&self) -> Result<u64, PartiqlDbError> {
        let from = self.state();
        if !matches!(from, TxState::Idle | TxState::Closed)
            || !self.try_enter(from, TxState::Active)
        {
            return Err(PartiqlDbError::TransactionAlreadyActive);
        }

        let tx_id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        match TxWorker::spawn(Arc::clone(&self.client), tx_id) {
            Ok(worker) => {
                self.lock_session().worker = Some(worker);
                debug!(tx_id, "transaction started");
                Ok(tx_id)
            }
            Err(err) => {
                self.state.store(TxState::Idle as u8, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Queue a statement on the active session.
    ///
    /// Returns `Ok(None)` when no transaction is active, so the caller can run the statement
    /// directly.
    ///
    /// # Errors
    /// `WorkerError` if the worker has gone away.
    pub fn stage(
        &self,
        statement: ParameterizedStatement,
    ) -> Result<Option<StagedHandle>, PartiqlDbError> {
        let session = self.lock_session();
        let Some(worker) = session.worker.as_ref().filter(|_| self.is_active()) else {
            return Ok(None);
        };
        let slot = worker.stage(statement)?;
        Ok(Some(StagedHandle {
            tx_id: worker.tx_id(),
            slot,
        }))
    }

    /// Execute every staged statement as one batch and wait for the results to be distributed.
    ///
    /// A failed batch is not an error here: the failure is recorded in every staged slot.
    /// If another caller is already committing, this waits until that commit is over.
    /// Without an active transaction this logs a warning and does nothing.
    ///
    /// # Errors
    /// `WorkerError` if the worker vanished before acknowledging.
    pub async fn commit(&self) -> Result<(), PartiqlDbError> {
        match self.claim_commit(None) {
            CommitClaim::Run(worker, done) => self.finish_commit(worker, done).await,
            CommitClaim::Wait(done) => wait_for_commit(done).await,
            CommitClaim::Nothing => {
                warn!("commit called with no active transaction");
                Ok(())
            }
        }
    }

    /// Commit only if transaction `tx_id` is still the active one, or wait for it if it is
    /// being committed; silent otherwise.
    ///
    /// # Errors
    /// `WorkerError` if the worker vanished before acknowledging.
    pub async fn commit_if_current(&self, tx_id: u64) -> Result<(), PartiqlDbError> {
        match self.claim_commit(Some(tx_id)) {
            CommitClaim::Run(worker, done) => self.finish_commit(worker, done).await,
            CommitClaim::Wait(done) => wait_for_commit(done).await,
            CommitClaim::Nothing => Ok(()),
        }
    }

    /// Discard every staged statement. Does not wait for the worker.
    ///
    /// Without an active transaction this logs a warning and does nothing.
    ///
    /// # Errors
    /// `WorkerError` if the worker had already gone away.
    pub fn rollback(&self) -> Result<(), PartiqlDbError> {
        let worker = {
            let mut session = self.lock_session();
            self.take_worker(&mut session, None, TxState::RollingBack)
        };
        let Some(worker) = worker else {
            warn!("rollback called with no active transaction");
            return Ok(());
        };
        let tx_id = worker.tx_id();
        let result = worker.rollback();
        self.state.store(TxState::Closed as u8, Ordering::Release);
        debug!(tx_id, "rollback signalled");
        result
    }

    fn claim_commit(&self, tx_id: Option<u64>) -> CommitClaim {
        let mut session = self.lock_session();
        if let Some(pending) = session
            .committing
            .as_ref()
            .filter(|pending| tx_id.is_none_or(|id| id == pending.tx_id))
        {
            return CommitClaim::Wait(pending.done.clone());
        }
        let Some(worker) = self.take_worker(&mut session, tx_id, TxState::Committing) else {
            return CommitClaim::Nothing;
        };
        let (sender, done) = watch::channel(false);
        session.committing = Some(PendingCommit {
            tx_id: worker.tx_id(),
            done,
        });
        CommitClaim::Run(worker, sender)
    }

    fn take_worker(
        &self,
        session: &mut Session,
        tx_id: Option<u64>,
        next: TxState,
    ) -> Option<TxWorker> {
        let matches = session
            .worker
            .as_ref()
            .is_some_and(|worker| tx_id.is_none_or(|id| id == worker.tx_id()));
        if !matches || !self.try_enter(TxState::Active, next) {
            return None;
        }
        session.worker.take()
    }

    async fn finish_commit(
        &self,
        worker: TxWorker,
        done: watch::Sender<bool>,
    ) -> Result<(), PartiqlDbError> {
        let tx_id = worker.tx_id();
        let result = worker.commit().await;
        {
            let mut session = self.lock_session();
            session.committing = None;
            self.state.store(TxState::Closed as u8, Ordering::Release);
        }
        done.send_replace(true);
        debug!(tx_id, ok = result.is_ok(), "transaction finished");
        result
    }
}

async fn wait_for_commit(mut done: watch::Receiver<bool>) -> Result<(), PartiqlDbError> {
    done.wait_for(|finished| *finished)
        .await
        .map(|_| ())
        .map_err(|_| PartiqlDbError::WorkerError("commit was abandoned before it finished".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        ExecuteStatementInput, ExecuteStatementOutput, ItemResponse, ListTablesOutput,
        TableDescription,
    };
    use crate::error::BackendError;
    use crate::types::AttributeValue;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct BatchOnly {
        fail: bool,
        delay: Option<Duration>,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl PartiqlClient for BatchOnly {
        async fn execute_statement(
            &self,
            _input: ExecuteStatementInput,
        ) -> Result<ExecuteStatementOutput, BackendError> {
            Ok(ExecuteStatementOutput::default())
        }

        async fn execute_transaction(
            &self,
            statements: Vec<ParameterizedStatement>,
        ) -> Result<Vec<ItemResponse>, BackendError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.batches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::msg("TransactionCanceledException"));
            }
            Ok(statements.iter().map(|_| ItemResponse::default()).collect())
        }

        async fn describe_table(
            &self,
            _table_name: &str,
        ) -> Result<Option<TableDescription>, BackendError> {
            Ok(None)
        }

        async fn list_tables(
            &self,
            _exclusive_start_table_name: Option<String>,
        ) -> Result<ListTablesOutput, BackendError> {
            Ok(ListTablesOutput::default())
        }

        async fn describe_endpoints(&self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn statement() -> ParameterizedStatement {
        ParameterizedStatement::new(
            r#"DELETE FROM "users" WHERE id = ?"#,
            vec![AttributeValue::S("1".into())],
        )
    }

    #[tokio::test]
    async fn begin_is_exclusive_until_finished() {
        let coordinator = TxCoordinator::new(Arc::new(BatchOnly::default()));
        let first = coordinator.begin().unwrap();
        assert!(matches!(
            coordinator.begin(),
            Err(PartiqlDbError::TransactionAlreadyActive)
        ));
        coordinator.commit().await.unwrap();
        assert_eq!(coordinator.state(), TxState::Closed);

        let second = coordinator.begin().unwrap();
        assert_ne!(first, second);
        coordinator.rollback().unwrap();
        assert!(coordinator.begin().is_ok());
    }

    #[tokio::test]
    async fn stage_without_transaction_is_declined() {
        let coordinator = TxCoordinator::new(Arc::new(BatchOnly::default()));
        assert!(coordinator.stage(statement()).unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_batch_resolves_every_slot_with_the_error() {
        let client = Arc::new(BatchOnly {
            fail: true,
            ..BatchOnly::default()
        });
        let coordinator = TxCoordinator::new(client.clone());
        coordinator.begin().unwrap();
        let a = coordinator.stage(statement()).unwrap().unwrap();
        let b = coordinator.stage(statement()).unwrap().unwrap();
        coordinator.commit().await.unwrap();

        assert_eq!(client.batches.load(Ordering::SeqCst), 1);
        for handle in [a, b] {
            assert!(matches!(
                handle.slot.outcome(),
                Some(Err(PartiqlDbError::Backend(_)))
            ));
        }
    }

    #[tokio::test]
    async fn commit_and_rollback_without_session_are_no_ops() {
        let client = Arc::new(BatchOnly::default());
        let coordinator = TxCoordinator::new(client.clone());
        coordinator.commit().await.unwrap();
        coordinator.rollback().unwrap();
        assert_eq!(coordinator.state(), TxState::Idle);

        coordinator.begin().unwrap();
        coordinator.commit().await.unwrap();
        assert_eq!(client.batches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_commit_does_not_touch_a_newer_transaction() {
        let coordinator = TxCoordinator::new(Arc::new(BatchOnly::default()));
        let old = coordinator.begin().unwrap();
        coordinator.rollback().unwrap();
        coordinator.begin().unwrap();
        coordinator.commit_if_current(old).await.unwrap();
        assert!(coordinator.is_active());
    }

    #[tokio::test]
    async fn second_commit_waits_for_the_one_in_flight() {
        let client = Arc::new(BatchOnly {
            delay: Some(Duration::from_millis(100)),
            ..BatchOnly::default()
        });
        let coordinator = Arc::new(TxCoordinator::new(client.clone()));
        let tx_id = coordinator.begin().unwrap();
        let handle = coordinator.stage(statement()).unwrap().unwrap();

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.commit().await }
        });
        while coordinator.state() != TxState::Committing {
            tokio::task::yield_now().await;
        }

        coordinator.commit().await.unwrap();
        assert!(matches!(handle.slot.outcome(), Some(Ok(None))));
        coordinator.commit_if_current(tx_id).await.unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(client.batches.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), TxState::Closed);
    }
}

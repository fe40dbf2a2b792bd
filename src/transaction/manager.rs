use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::backend::{ParameterizedStatement, PartiqlClient};
use crate::error::PartiqlDbError;

use super::channel::{Command, RequestSlot, StagedRequest};
use super::dispatcher::run_tx_worker;

/// Handle to the task that owns one transaction's pending statements.
pub(super) struct TxWorker {
    sender: mpsc::UnboundedSender<Command>,
    tx_id: u64,
}

impl TxWorker {
    pub(super) fn spawn(
        client: Arc<dyn PartiqlClient>,
        tx_id: u64,
    ) -> Result<Self, PartiqlDbError> {
        let handle = Handle::try_current().map_err(|err| {
            PartiqlDbError::WorkerError(format!("no async runtime to run the transaction: {err}"))
        })?;
        let (sender, receiver) = mpsc::unbounded_channel::<Command>();
        handle.spawn(run_tx_worker(client, tx_id, receiver));
        Ok(Self { sender, tx_id })
    }

    pub(super) fn tx_id(&self) -> u64 {
        self.tx_id
    }

    fn send_command(&self, command: Command) -> Result<(), PartiqlDbError> {
        self.sender
            .send(command)
            .map_err(|_| worker_error("transaction worker closed"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, PartiqlDbError>>) -> Command,
        drop_message: &'static str,
    ) -> Result<T, PartiqlDbError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(build(tx))?;
        rx.await.map_err(|_| worker_error(drop_message))?
    }

    pub(super) fn stage(
        &self,
        statement: ParameterizedStatement,
    ) -> Result<Arc<RequestSlot>, PartiqlDbError> {
        let slot = Arc::new(RequestSlot::default());
        self.send_command(Command::Stage(StagedRequest {
            statement,
            slot: Arc::clone(&slot),
        }))?;
        Ok(slot)
    }

    /// Run the batch and wait until every staged slot is resolved.
    pub(super) async fn commit(self) -> Result<(), PartiqlDbError> {
        self.request(
            |respond_to| Command::Commit { respond_to },
            "transaction worker dropped while committing",
        )
        .await
    }

    /// Ask the worker to discard its queue. Does not wait.
    pub(super) fn rollback(self) -> Result<(), PartiqlDbError> {
        self.send_command(Command::Rollback)
    }
}

fn worker_error(message: &str) -> PartiqlDbError {
    PartiqlDbError::WorkerError(message.into())
}

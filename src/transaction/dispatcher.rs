use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backend::PartiqlClient;
use crate::error::{BackendError, PartiqlDbError};

use super::channel::{Command, StagedRequest};

pub(super) async fn run_tx_worker(
    client: Arc<dyn PartiqlClient>,
    tx_id: u64,
    mut receiver: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Vec<StagedRequest> = Vec::new();

    while let Some(command) = receiver.recv().await {
        match command {
            Command::Stage(request) => {
                debug!(tx_id, position = pending.len() + 1, "staged statement");
                pending.push(request);
            }
            Command::Commit { respond_to } => {
                execute_batch(client.as_ref(), tx_id, pending).await;
                let _ = respond_to.send(Ok(()));
                return;
            }
            Command::Rollback => {
                debug!(tx_id, discarded = pending.len(), "transaction rolled back");
                return;
            }
        }
    }

    debug!(tx_id, discarded = pending.len(), "transaction worker shut down");
}

async fn execute_batch(client: &dyn PartiqlClient, tx_id: u64, pending: Vec<StagedRequest>) {
    if pending.is_empty() {
        debug!(tx_id, "commit with no staged statements");
        return;
    }

    let statements = pending
        .iter()
        .map(|request| request.statement.clone())
        .collect::<Vec<_>>();
    debug!(tx_id, statements = statements.len(), "dispatching transaction batch");

    match client.execute_transaction(statements).await {
        Ok(responses) if responses.len() == pending.len() => {
            for (request, response) in pending.iter().zip(responses) {
                request.slot.resolve(Ok(response.item));
            }
        }
        Ok(responses) => {
            let err = PartiqlDbError::Backend(BackendError::msg(format!(
                "transaction returned {} responses for {} statements",
                responses.len(),
                pending.len()
            )));
            warn!(tx_id, error = %err, "transaction batch failed");
            fan_out(&pending, &err);
        }
        Err(err) => {
            let err = PartiqlDbError::Backend(err);
            warn!(tx_id, error = %err, "transaction batch failed");
            fan_out(&pending, &err);
        }
    }
}

fn fan_out(pending: &[StagedRequest], err: &PartiqlDbError) {
    for request in pending {
        request.slot.resolve(Err(err.clone()));
    }
}

use std::sync::OnceLock;

use tokio::sync::oneshot;

use crate::backend::ParameterizedStatement;
use crate::error::PartiqlDbError;
use crate::types::Item;

pub(super) enum Command {
    Stage(StagedRequest),
    Commit {
        respond_to: oneshot::Sender<Result<(), PartiqlDbError>>,
    },
    Rollback,
}

pub(super) struct StagedRequest {
    pub(super) statement: ParameterizedStatement,
    pub(super) slot: std::sync::Arc<RequestSlot>,
}

/// Deferred outcome of one statement staged inside a transaction.
///
/// Unresolved until the owning transaction commits; a rolled back transaction leaves it
/// unresolved for good.
#[derive(Debug, Default)]
pub struct RequestSlot {
    outcome: OnceLock<Result<Option<Item>, PartiqlDbError>>,
}

impl RequestSlot {
    pub(crate) fn resolve(&self, outcome: Result<Option<Item>, PartiqlDbError>) {
        let _ = self.outcome.set(outcome);
    }

    /// The record (if any) or error produced for this statement by the commit batch.
    #[must_use]
    pub fn outcome(&self) -> Option<&Result<Option<Item>, PartiqlDbError>> {
        self.outcome.get()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.outcome.get().is_some()
    }
}

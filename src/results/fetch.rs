use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::cursor::{Page, PageFetcher};
use crate::backend::{ExecuteStatementInput, PartiqlClient};
use crate::error::PartiqlDbError;
use crate::types::AttributeValue;

/// Pages through the records of one executed statement.
pub struct StatementFetcher {
    client: Arc<dyn PartiqlClient>,
    statement: String,
    parameters: Vec<AttributeValue>,
    closed: Arc<AtomicBool>,
}

impl StatementFetcher {
    /// `closed` is the owning connection's flag; fetches fail once it is set.
    #[must_use]
    pub fn new(
        client: Arc<dyn PartiqlClient>,
        statement: String,
        parameters: Vec<AttributeValue>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            statement,
            parameters,
            closed,
        }
    }
}

#[async_trait]
impl PageFetcher for StatementFetcher {
    async fn fetch(&self, token: Option<String>) -> Result<Page, PartiqlDbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PartiqlDbError::ConnectionClosed);
        }
        debug!(statement = %self.statement, continued = token.is_some(), "executing statement");
        let output = self
            .client
            .execute_statement(ExecuteStatementInput {
                statement: self.statement.clone(),
                parameters: self.parameters.clone(),
                next_token: token,
            })
            .await?;
        Ok(Page::new(output.items, output.next_token))
    }
}

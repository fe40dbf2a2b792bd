//! Connection handle tying classification, binding, transactions and cursors together.

mod statement;

pub use statement::Statement;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{ExecuteStatementInput, ParameterizedStatement, PartiqlClient};
use crate::binding::{Param, bind};
use crate::classify::{ParsedStatement, StatementKind, classify};
use crate::config::ClientConfig;
use crate::error::PartiqlDbError;
use crate::results::meta::{DescribeTableFetcher, ListTablesFetcher, TABLE_NAME_COLUMN, describe_columns};
use crate::results::{Cursor, ExecResult, PageFetcher, Rows, StatementFetcher, TxCommitter, TxCursor};
use crate::transaction::{TxCoordinator, TxState};
use crate::types::AttributeValue;

struct ConnectionInner {
    client: Arc<dyn PartiqlClient>,
    coordinator: Arc<TxCoordinator>,
    closed: Arc<AtomicBool>,
    config: Option<ClientConfig>,
}

/// Cloneable handle over one backend client.
///
/// At most one transaction is active per connection. While it is, queries and mutations are
/// staged instead of executed; see [`Connection::begin`].
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.is_closed())
            .field("transaction", &self.inner.coordinator.state())
            .finish_non_exhaustive()
    }
}

impl Connection {
    #[must_use]
    pub fn new(client: Arc<dyn PartiqlClient>) -> Self {
        Self::build(client, None)
    }

    /// Validate `config` and keep it alongside the client it was used to build.
    ///
    /// # Errors
    /// Returns `PartiqlDbError::ConfigError` if the configuration is incomplete.
    pub fn with_config(
        config: ClientConfig,
        client: Arc<dyn PartiqlClient>,
    ) -> Result<Self, PartiqlDbError> {
        config.validate()?;
        Ok(Self::build(client, Some(config)))
    }

    fn build(client: Arc<dyn PartiqlClient>, config: Option<ClientConfig>) -> Self {
        let coordinator = Arc::new(TxCoordinator::new(Arc::clone(&client)));
        Self {
            inner: Arc::new(ConnectionInner {
                client,
                coordinator,
                closed: Arc::new(AtomicBool::new(false)),
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> Option<&ClientConfig> {
        self.inner.config.as_ref()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn transaction_state(&self) -> TxState {
        self.inner.coordinator.state()
    }

    fn ensure_open(&self) -> Result<(), PartiqlDbError> {
        if self.is_closed() {
            return Err(PartiqlDbError::ConnectionClosed);
        }
        Ok(())
    }

    /// Run a row-returning statement.
    ///
    /// Outside a transaction the first page is fetched before returning. Inside one the query is
    /// staged and the returned rows commit the transaction when first read.
    ///
    /// # Errors
    /// Classification, parameter count and binding errors; `NotSupported` for statements that
    /// return no rows; `NotSupportedInTransaction` for pseudo-table queries inside a transaction;
    /// backend errors from the first page.
    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Rows, PartiqlDbError> {
        self.query_with_cancel(sql, params, &CancellationToken::new())
            .await
    }

    /// Like [`query`](Self::query); cancelling `cancel` aborts any in-flight page fetch with
    /// `PartiqlDbError::Cancelled`. It does not roll back an active transaction.
    ///
    /// # Errors
    /// See [`query`](Self::query).
    pub async fn query_with_cancel(
        &self,
        sql: &str,
        params: &[Param],
        cancel: &CancellationToken,
    ) -> Result<Rows, PartiqlDbError> {
        self.ensure_open()?;
        let parsed = classify(sql)?;
        self.query_parsed(&parsed, params, cancel).await
    }

    /// Run a data-changing statement (INSERT, UPDATE or DELETE).
    ///
    /// # Errors
    /// Classification, parameter count and binding errors; `NotSupported` for queries; backend
    /// errors when not inside a transaction.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<ExecResult, PartiqlDbError> {
        self.ensure_open()?;
        let parsed = classify(sql)?;
        self.execute_parsed(&parsed, params).await
    }

    /// Classify `sql` once for repeated execution.
    ///
    /// # Errors
    /// `ConnectionClosed` or the classification error.
    pub fn prepare(&self, sql: &str) -> Result<Statement, PartiqlDbError> {
        self.ensure_open()?;
        let parsed = classify(sql)?;
        Ok(Statement::new(self.clone(), parsed))
    }

    /// Start a transaction. Statements issued afterwards are staged until commit.
    ///
    /// # Errors
    /// `ConnectionClosed`, or `TransactionAlreadyActive` while another transaction is open.
    pub fn begin(&self) -> Result<(), PartiqlDbError> {
        self.ensure_open()?;
        self.inner.coordinator.begin().map(|_| ())
    }

    /// Execute every staged statement atomically and resolve their results before returning.
    ///
    /// A failed batch is reported through each staged result, not here.
    ///
    /// # Errors
    /// `ConnectionClosed`, or `WorkerError` if the transaction worker vanished.
    pub async fn commit(&self) -> Result<(), PartiqlDbError> {
        self.ensure_open()?;
        self.inner.coordinator.commit().await
    }

    /// Drop every staged statement without executing it.
    ///
    /// # Errors
    /// `ConnectionClosed`, or `WorkerError` if the transaction worker vanished.
    pub fn rollback(&self) -> Result<(), PartiqlDbError> {
        self.ensure_open()?;
        self.inner.coordinator.rollback()
    }

    /// # Errors
    /// `ConnectionClosed` or the backend's error.
    pub async fn ping(&self) -> Result<(), PartiqlDbError> {
        self.ensure_open()?;
        self.inner.client.describe_endpoints().await?;
        Ok(())
    }

    /// Close the connection, rolling back an active transaction. Safe to call repeatedly.
    ///
    /// # Errors
    /// `WorkerError` if the active transaction's worker had already gone away.
    pub fn close(&self) -> Result<(), PartiqlDbError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.inner.coordinator.is_active() {
            warn!("closing connection with an active transaction; rolling back");
            self.inner.coordinator.rollback()?;
        }
        debug!("connection closed");
        Ok(())
    }

    pub(crate) async fn query_parsed(
        &self,
        parsed: &ParsedStatement,
        params: &[Param],
        cancel: &CancellationToken,
    ) -> Result<Rows, PartiqlDbError> {
        self.ensure_open()?;
        if !parsed.returns_rows() {
            return Err(PartiqlDbError::NotSupported(format!(
                "{} does not return rows; use execute",
                parsed.kind()
            )));
        }
        let bound = bind_checked(parsed, params)?;

        if parsed.kind().is_meta() {
            if self.inner.coordinator.is_active() {
                return Err(PartiqlDbError::NotSupportedInTransaction);
            }
            return self.query_meta(parsed, bound, cancel).await;
        }

        let columns = parsed.selected_columns().to_vec();
        let statement = ParameterizedStatement::new(parsed.rewritten_text(), bound);
        if let Some(handle) = self.inner.coordinator.stage(statement.clone())? {
            let committer = TxCommitter::new(Arc::clone(&self.inner.coordinator), handle.tx_id);
            return Ok(Rows::Tx(TxCursor::new(columns, handle.slot, committer)));
        }

        let fetcher = Arc::new(StatementFetcher::new(
            Arc::clone(&self.inner.client),
            statement.statement,
            statement.parameters,
            Arc::clone(&self.inner.closed),
        ));
        Cursor::open(columns, fetcher, cancel.child_token())
            .await
            .map(Rows::Paged)
    }

    pub(crate) async fn execute_parsed(
        &self,
        parsed: &ParsedStatement,
        params: &[Param],
    ) -> Result<ExecResult, PartiqlDbError> {
        self.ensure_open()?;
        if !parsed.kind().is_mutation() {
            return Err(PartiqlDbError::NotSupported(format!(
                "{} returns rows; use query",
                parsed.kind()
            )));
        }
        let bound = bind_checked(parsed, params)?;
        let statement = ParameterizedStatement::new(parsed.rewritten_text(), bound);
        if let Some(handle) = self.inner.coordinator.stage(statement.clone())? {
            return Ok(ExecResult::Deferred(handle.slot));
        }

        debug!(statement = %statement.statement, "executing statement");
        self.inner
            .client
            .execute_statement(ExecuteStatementInput {
                statement: statement.statement,
                parameters: statement.parameters,
                next_token: None,
            })
            .await?;
        Ok(ExecResult::Immediate { rows_affected: 1 })
    }

    async fn query_meta(
        &self,
        parsed: &ParsedStatement,
        bound: Vec<AttributeValue>,
        cancel: &CancellationToken,
    ) -> Result<Rows, PartiqlDbError> {
        let client = Arc::clone(&self.inner.client);
        let (columns, fetcher) = if parsed.kind() == StatementKind::DescribeTable {
            let table_name = match (parsed.table_name(), bound.first()) {
                (Some(name), _) => name.to_string(),
                (None, Some(AttributeValue::S(name))) => name.clone(),
                (None, _) => {
                    return Err(PartiqlDbError::binding(1, "table name must be a string"));
                }
            };
            let fetcher: Arc<dyn PageFetcher> = Arc::new(DescribeTableFetcher { client, table_name });
            (describe_columns(parsed.selected_columns()), fetcher)
        } else {
            let fetcher: Arc<dyn PageFetcher> = Arc::new(ListTablesFetcher { client });
            (vec![TABLE_NAME_COLUMN.to_string()], fetcher)
        };
        Cursor::open(columns, fetcher, cancel.child_token())
            .await
            .map(Rows::Paged)
    }
}

fn bind_checked(
    parsed: &ParsedStatement,
    params: &[Param],
) -> Result<Vec<AttributeValue>, PartiqlDbError> {
    if parsed.placeholder_count() != params.len() {
        return Err(PartiqlDbError::ParameterCount {
            expected: parsed.placeholder_count(),
            actual: params.len(),
        });
    }
    bind(params)
}

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use partiql_middleware::prelude::*;

/// In-memory `PartiqlClient` that replays scripted responses and records every call.
#[derive(Default)]
pub struct MockClient {
    statement_outputs: Mutex<VecDeque<Result<ExecuteStatementOutput, BackendError>>>,
    pub statements: Mutex<Vec<ExecuteStatementInput>>,
    batch_output: Mutex<Option<Result<Vec<ItemResponse>, BackendError>>>,
    pub batches: Mutex<Vec<Vec<ParameterizedStatement>>>,
    tables: Mutex<HashMap<String, TableDescription>>,
    table_names: Mutex<Vec<String>>,
    list_page_size: usize,
    pub list_calls: AtomicUsize,
    pub pings: AtomicUsize,
    statement_delay: Option<Duration>,
    batch_delay: Option<Duration>,
}

impl MockClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            list_page_size: 2,
            ..Self::default()
        }
    }

    /// Every `execute_statement` call sleeps this long first.
    #[must_use]
    pub fn with_statement_delay(mut self, delay: Duration) -> Self {
        self.statement_delay = Some(delay);
        self
    }

    /// Every `execute_transaction` call sleeps this long first.
    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    /// Queue the response of the next `execute_statement` call.
    pub fn push_page(&self, items: Vec<Item>, next_token: Option<&str>) {
        self.statement_outputs
            .lock()
            .unwrap()
            .push_back(Ok(ExecuteStatementOutput {
                items,
                next_token: next_token.map(str::to_string),
            }));
    }

    pub fn push_statement_error(&self, message: &str) {
        self.statement_outputs
            .lock()
            .unwrap()
            .push_back(Err(BackendError::msg(message)));
    }

    /// Script the next `execute_transaction` result; unset means one empty response per
    /// statement.
    pub fn set_batch_output(&self, output: Result<Vec<ItemResponse>, BackendError>) {
        *self.batch_output.lock().unwrap() = Some(output);
    }

    pub fn add_table(&self, name: &str, description: TableDescription) {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), description);
    }

    pub fn set_table_names(&self, names: &[&str]) {
        *self.table_names.lock().unwrap() = names.iter().map(|n| (*n).to_string()).collect();
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl PartiqlClient for MockClient {
    async fn execute_statement(
        &self,
        input: ExecuteStatementInput,
    ) -> Result<ExecuteStatementOutput, BackendError> {
        if let Some(delay) = self.statement_delay {
            tokio::time::sleep(delay).await;
        }
        self.statements.lock().unwrap().push(input);
        self.statement_outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecuteStatementOutput::default()))
    }

    async fn execute_transaction(
        &self,
        statements: Vec<ParameterizedStatement>,
    ) -> Result<Vec<ItemResponse>, BackendError> {
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        let count = statements.len();
        self.batches.lock().unwrap().push(statements);
        self.batch_output
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(vec![ItemResponse::default(); count]))
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Option<TableDescription>, BackendError> {
        Ok(self.tables.lock().unwrap().get(table_name).cloned())
    }

    async fn list_tables(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<ListTablesOutput, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let names = self.table_names.lock().unwrap().clone();
        let start = exclusive_start_table_name
            .and_then(|after| names.iter().position(|n| *n == after).map(|i| i + 1))
            .unwrap_or(0);
        let end = (start + self.list_page_size).min(names.len());
        let page = names[start..end].to_vec();
        let next_token = (end < names.len()).then(|| names[end - 1].clone());
        Ok(ListTablesOutput {
            table_names: page,
            next_token,
        })
    }

    async fn describe_endpoints(&self) -> Result<(), BackendError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn item(pairs: &[(&str, AttributeValue)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

pub fn n(value: i64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

/// Item with a single numeric `id` attribute.
pub fn id_item(id: i64) -> Item {
    item(&[("id", n(id))])
}

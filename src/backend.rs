//! The remote statement API this crate drives.
//!
//! Implement [`PartiqlClient`] over whatever SDK or HTTP client talks to the service; the rest of
//! the crate only ever sees this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::BackendError;
use crate::types::{AttributeValue, Item};

/// A statement text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedStatement {
    pub statement: String,
    pub parameters: Vec<AttributeValue>,
}

impl ParameterizedStatement {
    #[must_use]
    pub fn new(statement: impl Into<String>, parameters: Vec<AttributeValue>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

/// Input for a single paged statement execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteStatementInput {
    pub statement: String,
    pub parameters: Vec<AttributeValue>,
    pub next_token: Option<String>,
}

/// One page of records plus the token for the next page, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteStatementOutput {
    pub items: Vec<Item>,
    pub next_token: Option<String>,
}

/// Per-statement response of an atomic batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemResponse {
    pub item: Option<Item>,
}

/// A page of table names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTablesOutput {
    pub table_names: Vec<String>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

/// Table metadata as reported by the service.
///
/// Well-known fields are typed; the remaining descriptor sections (archival, billing,
/// throughput, replicas and so on) are carried as JSON under their service names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_protection_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_table_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(flatten)]
    pub other: BTreeMap<String, JsonValue>,
}

/// Operations required from the remote service.
#[async_trait]
pub trait PartiqlClient: Send + Sync {
    /// Execute one statement, returning a single page of records.
    async fn execute_statement(
        &self,
        input: ExecuteStatementInput,
    ) -> Result<ExecuteStatementOutput, BackendError>;

    /// Execute every statement as one all-or-nothing batch.
    async fn execute_transaction(
        &self,
        statements: Vec<ParameterizedStatement>,
    ) -> Result<Vec<ItemResponse>, BackendError>;

    /// Describe a table; `None` when the service returned no descriptor.
    async fn describe_table(&self, table_name: &str)
    -> Result<Option<TableDescription>, BackendError>;

    async fn list_tables(
        &self,
        exclusive_start_table_name: Option<String>,
    ) -> Result<ListTablesOutput, BackendError>;

    /// Cheap liveness probe.
    async fn describe_endpoints(&self) -> Result<(), BackendError>;
}

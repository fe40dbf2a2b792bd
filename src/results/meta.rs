//! Records for the `"!pqxd_describe_table"` and `"!pqxd_list_tables"` pseudo-tables.

use std::sync::Arc;

use async_trait::async_trait;

use super::cursor::{Page, PageFetcher};
use crate::backend::PartiqlClient;
use crate::error::PartiqlDbError;
use crate::types::{AttributeValue, Item, to_item};

/// Columns returned by `SELECT * FROM "!pqxd_describe_table"`.
pub const DESCRIBE_TABLE_COLUMNS: [&str; 18] = [
    "ArchivalSummary",
    "AttributeDefinitions",
    "BillingModeSummary",
    "CreationDateTime",
    "DeletionProtectionEnabled",
    "KeySchema",
    "GlobalSecondaryIndexes",
    "GlobalTableVersion",
    "ItemCount",
    "LocalSecondaryIndexes",
    "OnDemandThroughput",
    "ProvisionedThroughput",
    "Replicas",
    "RestoreSummary",
    "SSEDescription",
    "StreamSpecification",
    "TableClassSummary",
    "TableStatus",
];

/// Column of every list-tables record.
pub const TABLE_NAME_COLUMN: &str = "TableName";

/// Resolve the requested describe columns, expanding an empty (`*`) list.
pub(crate) fn describe_columns(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        DESCRIBE_TABLE_COLUMNS.iter().map(|c| (*c).to_string()).collect()
    } else {
        requested.to_vec()
    }
}

pub(crate) struct DescribeTableFetcher {
    pub(crate) client: Arc<dyn PartiqlClient>,
    pub(crate) table_name: String,
}

#[async_trait]
impl PageFetcher for DescribeTableFetcher {
    async fn fetch(&self, _token: Option<String>) -> Result<Page, PartiqlDbError> {
        let Some(description) = self.client.describe_table(&self.table_name).await? else {
            return Ok(Page::empty());
        };
        Ok(Page::new(vec![to_item(&description)?], None))
    }
}

pub(crate) struct ListTablesFetcher {
    pub(crate) client: Arc<dyn PartiqlClient>,
}

#[async_trait]
impl PageFetcher for ListTablesFetcher {
    async fn fetch(&self, token: Option<String>) -> Result<Page, PartiqlDbError> {
        let output = self.client.list_tables(token).await?;
        let items = output
            .table_names
            .into_iter()
            .map(|name| Item::from([(TABLE_NAME_COLUMN.to_string(), AttributeValue::S(name))]))
            .collect();
        Ok(Page::new(items, output.next_token))
    }
}

//! Convenient imports for common functionality.

pub use crate::backend::{
    ExecuteStatementInput, ExecuteStatementOutput, ItemResponse, ListTablesOutput,
    ParameterizedStatement, PartiqlClient, TableDescription,
};
pub use crate::binding::{Param, Serialized, ValueProvider, bind};
pub use crate::classify::{
    DESCRIBE_TABLE_PSEUDO_TABLE, LIST_TABLES_PSEUDO_TABLE, ParsedStatement, Returning,
    ReturningImage, ReturningScope, StatementKind, classify,
};
pub use crate::config::{ClientConfig, ClientConfigBuilder};
pub use crate::connection::{Connection, Statement};
pub use crate::error::{BackendError, PartiqlDbError};
pub use crate::results::{
    Cursor, CustomDbRow, ExecResult, Page, PageFetcher, ResultSet, Rows, Scanner, Slot,
    TxCursor,
};
pub use crate::transaction::{RequestSlot, TxCoordinator, TxState};
pub use crate::types::{AttributeValue, Item, RowValues, to_item};

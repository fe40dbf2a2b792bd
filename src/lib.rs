//! Statement middleware for a PartiQL-speaking key-value service.
//!
//! Caller SQL is classified against a restricted grammar, positional parameters are bound to
//! the service's typed attribute values, mutations inside a transaction are staged and committed
//! as one atomic batch, and query results are read through paginated cursors.
//!
//! The network client is supplied by the consumer as a [`PartiqlClient`] implementation.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use partiql_middleware::prelude::*;
//!
//! # async fn run(client: Arc<dyn PartiqlClient>) -> Result<(), PartiqlDbError> {
//! let conn = Connection::new(client);
//! let mut rows = conn
//!     .query(r#"SELECT id, name FROM "users" WHERE id = ?"#, &[Param::from("42")])
//!     .await?;
//! while let Some(row) = rows.next_row().await? {
//!     println!("{:?}", row.get("name"));
//! }
//!
//! conn.begin()?;
//! let result = conn
//!     .execute(r#"DELETE FROM "users" WHERE id = ?"#, &[Param::from("42")])
//!     .await?;
//! conn.commit().await?;
//! assert_eq!(result.rows_affected()?, 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod binding;
pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod prelude;
pub mod results;
pub mod transaction;
pub mod types;

pub use backend::PartiqlClient;
pub use connection::{Connection, Statement};
pub use error::{BackendError, PartiqlDbError};

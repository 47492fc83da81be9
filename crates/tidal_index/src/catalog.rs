//! Scoped connections to the metadata/query layer.
//!
//! The failure path loads table descriptors through a connection acquired
//! for exactly one invocation. Implementations sit on whatever transport the
//! deployment uses; the traits here only fix the contract the failure path
//! relies on.

use anyhow::Result;
use async_trait::async_trait;

use crate::metadata::DataTableDescriptor;

/// One scoped connection to the catalog.
///
/// Callers acquire a connection, use it, and close it on every exit path.
/// `close` failures are real errors, not best-effort cleanup: a caller with
/// no earlier error pending surfaces them, a caller with one pending logs
/// them. Implementations validate descriptor records before returning them.
#[async_trait]
pub trait CatalogConnection: Send {
    /// Loads the descriptor for `table_name`, including its indexes.
    async fn data_table(&mut self, table_name: &str) -> Result<DataTableDescriptor>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Source of scoped catalog connections.
#[async_trait]
pub trait CatalogConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>>;
}

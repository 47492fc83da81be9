//! Naming transforms for physical tables hosting local indexes.
//!
//! Global indexes get a physical table of their own, named after the logical
//! index. Local indexes co-partition with their data table and share one
//! physical table whose name is derived from the data table by a reversible
//! prefix transform.

use anyhow::{anyhow, Result};

/// Well-known prefix marking a physical table that multiplexes local indexes.
pub const LOCAL_INDEX_TABLE_PREFIX: &str = "_LOCAL_IDX_";

/// Returns whether `table_name` names a local-index physical table.
pub fn is_local_index_table(table_name: &str) -> bool {
    table_name.starts_with(LOCAL_INDEX_TABLE_PREFIX)
}

/// Physical table name hosting the local indexes of `data_table_name`.
pub fn local_index_table_name(data_table_name: &str) -> String {
    format!("{LOCAL_INDEX_TABLE_PREFIX}{data_table_name}")
}

/// Recovers the primary table name from a local-index physical table name.
pub fn data_table_name(local_index_table: &str) -> Result<&str> {
    local_index_table
        .strip_prefix(LOCAL_INDEX_TABLE_PREFIX)
        .ok_or_else(|| {
            anyhow!("table '{local_index_table}' is not a local-index physical table")
        })
}

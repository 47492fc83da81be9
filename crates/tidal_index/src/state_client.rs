//! Client for administrative index state transitions.
//!
//! Disabling an index is a catalog mutation: one cell rewrites the index's
//! administrative state, a second records the disable timestamp. The client
//! here builds that mutation and submits it through the coordination
//! channel; interpreting the outcome code is left to the caller.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use tidal_store::{MetaCell, MetaCoordinator, StateChangeCode, UpdateIndexStateRequest};

use crate::keys::encode_i64_ordered;
use crate::metadata::IndexState;

/// Column family holding administrative table metadata in the catalog.
pub const CATALOG_FAMILY: &[u8] = b"0";
/// Qualifier of the index administrative-state cell.
pub const INDEX_STATE_QUALIFIER: &[u8] = b"INDEX_STATE";
/// Qualifier of the index disable-timestamp cell.
pub const INDEX_DISABLE_TIMESTAMP_QUALIFIER: &[u8] = b"INDEX_DISABLE_TIMESTAMP";

/// Separator between the schema and table components of a catalog row key.
const TABLE_KEY_SEPARATOR: u8 = 0x00;

/// Catalog row key for an optionally schema-qualified table name.
///
/// `"S.T"` keys as `S<sep>T`; an unqualified `"T"` keys as `<sep>T`, so
/// unqualified names cannot collide with schema-qualified ones.
pub fn catalog_table_key(full_table_name: &str) -> Bytes {
    let (schema, table) = match full_table_name.split_once('.') {
        Some((schema, table)) => (schema, table),
        None => ("", full_table_name),
    };
    let mut out = Vec::with_capacity(schema.len() + 1 + table.len());
    out.extend_from_slice(schema.as_bytes());
    out.push(TABLE_KEY_SEPARATOR);
    out.extend_from_slice(table.as_bytes());
    Bytes::from(out)
}

/// Issues index state transitions against the metadata coordination service.
#[derive(Clone)]
pub struct IndexStateClient {
    coordinator: Arc<dyn MetaCoordinator>,
}

impl IndexStateClient {
    pub fn new(coordinator: Arc<dyn MetaCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Requests that `index_table_name` be marked disabled as of
    /// `disable_timestamp`.
    ///
    /// Returns the service's outcome code; a delivery fault is an error. No
    /// timeout is imposed here and nothing is retried — the channel owns
    /// cancellation policy, the caller owns escalation.
    pub async fn disable_index(
        &self,
        index_table_name: &str,
        disable_timestamp: i64,
    ) -> Result<StateChangeCode> {
        let request = build_disable_request(index_table_name, disable_timestamp);
        self.coordinator
            .update_index_state(request)
            .await
            .with_context(|| {
                format!("update_index_state rpc failed for index '{index_table_name}'")
            })
    }
}

impl fmt::Debug for IndexStateClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStateClient").finish_non_exhaustive()
    }
}

/// Builds the catalog mutation a client issues when disabling an index.
fn build_disable_request(index_table_name: &str, disable_timestamp: i64) -> UpdateIndexStateRequest {
    let cells = vec![
        MetaCell {
            family: Bytes::from_static(CATALOG_FAMILY),
            qualifier: Bytes::from_static(INDEX_STATE_QUALIFIER),
            value: Bytes::copy_from_slice(&[IndexState::Disabled.serialized_byte()]),
        },
        MetaCell {
            family: Bytes::from_static(CATALOG_FAMILY),
            qualifier: Bytes::from_static(INDEX_DISABLE_TIMESTAMP_QUALIFIER),
            value: Bytes::copy_from_slice(&encode_i64_ordered(disable_timestamp)),
        },
    ];
    UpdateIndexStateRequest {
        table_key: catalog_table_key(index_table_name),
        cells,
    }
}

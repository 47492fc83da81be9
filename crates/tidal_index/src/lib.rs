//! Secondary-index subsystem for Tidal.
//!
//! TidalStore maintains secondary indexes out-of-band from the primary write
//! path. This crate owns what the serving path needs when that maintenance
//! cannot be completed:
//! - descriptor records for data tables and their logical indexes,
//! - naming transforms and the row-key codec for local-index tables,
//! - the administrative state-transition client for the catalog,
//! - the failure policy that disables affected indexes instead of letting a
//!   stale index keep answering queries.
//!
//! Index creation and backfill live with the DDL path, not here.

pub mod catalog;
pub mod failure;
pub mod keys;
pub mod metadata;
pub mod naming;
pub mod state_client;

pub use catalog::{CatalogConnection, CatalogConnectionFactory};
pub use failure::{
    batch_disable_timestamp, is_non_retryable, AbortProcessPolicy, AttemptedMutations,
    FallbackPolicy, IndexDisablePolicy, NonRetryableIndexError,
};
pub use keys::IndexRowKeyCodec;
pub use metadata::{DataTableDescriptor, IndexDescriptor, IndexKind, IndexState};
pub use naming::{
    data_table_name, is_local_index_table, local_index_table_name, LOCAL_INDEX_TABLE_PREFIX,
};
pub use state_client::{catalog_table_key, IndexStateClient};

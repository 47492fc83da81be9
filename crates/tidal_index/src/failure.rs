//! Failure escalation for index-write batches that could not be applied.
//!
//! Index maintenance runs after the primary write has committed. When a
//! batch of index mutations fails, the affected indexes have silently missed
//! writes and would return wrong query results if the planner kept trusting
//! them. The policy here disables every affected logical index at the
//! metadata coordination service, stamped with a timestamp taken from the
//! failed batch itself, and hard-fails the serving process only when even
//! that administrative disable cannot be performed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use tidal_store::{RegionBounds, RowMutation, TableRef, TIMESTAMP_UNSET};

use crate::catalog::{CatalogConnection, CatalogConnectionFactory};
use crate::metadata::IndexDescriptor;
use crate::naming::{data_table_name, is_local_index_table};
use crate::state_client::IndexStateClient;

/// Mutations that could not be written, grouped by their target table.
pub type AttemptedMutations = BTreeMap<TableRef, Vec<RowMutation>>;

/// Terminal error surfaced after the fallback policy has run.
///
/// Carries every index table name that was under consideration when the
/// escalation failed, and the original write failure as its source. The
/// write pipeline must not retry a batch that failed with this error.
#[derive(Debug)]
pub struct NonRetryableIndexError {
    index_table_names: Vec<String>,
    cause: anyhow::Error,
}

impl NonRetryableIndexError {
    fn new(index_table_names: Vec<String>, cause: anyhow::Error) -> Self {
        Self {
            index_table_names,
            cause,
        }
    }

    pub fn index_table_names(&self) -> &[String] {
        self.index_table_names.as_slice()
    }
}

impl fmt::Display for NonRetryableIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index writes to {:?} failed and the indexes could not be disabled",
            self.index_table_names
        )
    }
}

impl std::error::Error for NonRetryableIndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Returns whether `err` marks a batch that must not be retried.
pub fn is_non_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<NonRetryableIndexError>().is_some())
}

/// Last-resort action taken when an affected index cannot be disabled.
///
/// Serving queries from an index that silently missed writes is worse than
/// losing the process, so the default implementation aborts. Injected as a
/// collaborator so embedders and tests can substitute their own.
#[async_trait]
pub trait FallbackPolicy: Send + Sync {
    async fn on_unrecoverable_failure(&self, attempted: &AttemptedMutations, cause: &anyhow::Error);
}

/// Default fallback: hard-fail the serving process.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortProcessPolicy;

#[async_trait]
impl FallbackPolicy for AbortProcessPolicy {
    async fn on_unrecoverable_failure(
        &self,
        attempted: &AttemptedMutations,
        cause: &anyhow::Error,
    ) {
        let tables: Vec<&str> = attempted.keys().map(TableRef::name).collect();
        tracing::error!(
            error = ?cause,
            tables = ?tables,
            "could not disable indexes after failed index writes; aborting process rather than serve stale indexes"
        );
        std::process::abort();
    }
}

/// Escalation policy for failed index-write batches.
///
/// Walks the attempted mutations table by table, resolves which logical
/// indexes each table hosts, and disables every affected index at the
/// metadata coordination service. Any error that escapes the procedure runs
/// the fallback policy exactly once and surfaces as a
/// [`NonRetryableIndexError`].
pub struct IndexDisablePolicy {
    state_client: IndexStateClient,
    catalog: Arc<dyn CatalogConnectionFactory>,
    region: RegionBounds,
    fallback: Arc<dyn FallbackPolicy>,
}

impl IndexDisablePolicy {
    /// Builds a policy for the region the failure was observed on, with the
    /// process-aborting fallback.
    pub fn new(
        state_client: IndexStateClient,
        catalog: Arc<dyn CatalogConnectionFactory>,
        region: RegionBounds,
    ) -> Self {
        Self {
            state_client,
            catalog,
            region,
            fallback: Arc::new(AbortProcessPolicy),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackPolicy>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Handles a failed batch of index mutations.
    ///
    /// On success every affected index has been disabled, or no index needed
    /// action. On error the fallback policy has already run and the returned
    /// error is non-retryable: the caller must fail the batch for good.
    /// Disable failures are never swallowed.
    pub async fn handle_failure(
        &self,
        attempted: &AttemptedMutations,
        cause: anyhow::Error,
    ) -> Result<()> {
        let mut considered = Vec::new();
        match self
            .disable_affected_indexes(attempted, &cause, &mut considered)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = ?err, "index disable escalation failed");
                self.fallback
                    .on_unrecoverable_failure(attempted, &cause)
                    .await;
                Err(anyhow::Error::new(NonRetryableIndexError::new(
                    considered, cause,
                )))
            }
        }
    }

    async fn disable_affected_indexes(
        &self,
        attempted: &AttemptedMutations,
        cause: &anyhow::Error,
        considered: &mut Vec<String>,
    ) -> Result<()> {
        for (table_ref, mutations) in attempted {
            let disable_timestamp = batch_disable_timestamp(mutations);

            let affected: Vec<String> = if is_local_index_table(table_ref.name()) {
                let resolved = self
                    .resolve_local_indexes(table_ref.name(), mutations)
                    .await
                    .with_context(|| {
                        format!("resolve local indexes for '{}'", table_ref.name())
                    })?;
                if resolved.is_empty() {
                    // No trusted local index exists for the data table, so
                    // there is nothing to disable for this reference.
                    continue;
                }
                resolved.into_iter().collect()
            } else {
                vec![table_ref.name().to_string()]
            };

            for index_table_name in affected {
                if !considered.contains(&index_table_name) {
                    considered.push(index_table_name.clone());
                }

                let code = self
                    .state_client
                    .disable_index(index_table_name.as_str(), disable_timestamp)
                    .await?;
                if !code.confirms_disable() {
                    tracing::warn!(
                        index = %index_table_name,
                        code = ?code,
                        "attempt to disable index rejected by coordination service"
                    );
                    return Err(anyhow!(
                        "disable of index '{index_table_name}' rejected with code {code:?}"
                    ));
                }
                tracing::info!(
                    index = %index_table_name,
                    timestamp = disable_timestamp,
                    cause = ?cause,
                    "disabled index after failed index writes"
                );
            }
        }
        Ok(())
    }

    /// Maps failed local-index row keys back to the logical indexes they
    /// belong to.
    ///
    /// The catalog connection is scoped to this call and released on every
    /// exit path. A close failure surfaces as the call's error when the
    /// resolution itself succeeded; otherwise the resolution error wins and
    /// the close failure is logged.
    async fn resolve_local_indexes(
        &self,
        physical_table: &str,
        mutations: &[RowMutation],
    ) -> Result<BTreeSet<String>> {
        let mut conn = self
            .catalog
            .connect()
            .await
            .context("open catalog connection")?;
        let resolved = self
            .resolve_with_connection(conn.as_mut(), physical_table, mutations)
            .await;
        let closed = conn.close().await.context("close catalog connection");
        match (resolved, closed) {
            (Ok(names), Ok(())) => Ok(names),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                tracing::warn!(
                    error = ?close_err,
                    "catalog connection close failed after resolution error"
                );
                Err(err)
            }
        }
    }

    async fn resolve_with_connection(
        &self,
        conn: &mut dyn CatalogConnection,
        physical_table: &str,
        mutations: &[RowMutation],
    ) -> Result<BTreeSet<String>> {
        let data_table = data_table_name(physical_table)?;
        let descriptor = conn
            .data_table(data_table)
            .await
            .with_context(|| format!("load data table descriptor for '{data_table}'"))?;

        let mut names_by_id = BTreeMap::new();
        let mut representative: Option<&IndexDescriptor> = None;
        for index in descriptor.active_local_indexes() {
            if representative.is_none() {
                representative = Some(index);
            }
            let id = index
                .index_id
                .ok_or_else(|| anyhow!("local index '{}' has no index id", index.index_name))?;
            names_by_id.insert(id, index.index_name.clone());
        }
        let Some(representative) = representative else {
            return Ok(BTreeSet::new());
        };

        // Every local index on one physical table places the id at the same
        // row-key offset, so one codec decodes ids for the whole batch.
        let codec = representative.row_key_codec()?;
        let offset = self.region.key_prefix_len();

        let mut affected = BTreeSet::new();
        for mutation in mutations {
            let id = codec.index_id_from_row_key(mutation.row_key(), offset)?;
            if let Some(name) = names_by_id.get(&id) {
                affected.insert(name.clone());
            }
        }
        Ok(affected)
    }
}

impl fmt::Debug for IndexDisablePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDisablePolicy")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Timestamp to stamp a disable action with, taken from the failed batch.
///
/// Keeps the most recent non-negative cell timestamp seen across every
/// mutation, seeding from the unset sentinel; a batch with no stamped cell
/// yields the sentinel. Never consults the clock: the stamp must bound the
/// data versions the failed writes covered, not the time the failure was
/// handled.
pub fn batch_disable_timestamp(mutations: &[RowMutation]) -> i64 {
    let mut timestamp = TIMESTAMP_UNSET;
    for mutation in mutations {
        for cell in mutation.cells() {
            if timestamp == TIMESTAMP_UNSET
                || (cell.timestamp >= 0 && timestamp < cell.timestamp)
            {
                timestamp = cell.timestamp;
            }
        }
    }
    timestamp
}

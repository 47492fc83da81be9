//! Client-surface types for the Tidal storage tier.
//!
//! TidalStore maintains secondary indexes out-of-band from the primary write
//! path: index mutations are applied after the primary write has already
//! committed. This crate carries the slice of the store's client surface the
//! indexing layer consumes for that maintenance:
//! - table references and row mutations as the write pipeline hands them over,
//! - partition bounds used for row-key layout decisions,
//! - the metadata-coordination RPC contract for administrative state changes
//!   on catalog rows.
//!
//! Connection management, routing, and request delivery belong to concrete
//! [`MetaCoordinator`] implementations, not to this crate.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Cell timestamp sentinel meaning "no timestamp was ever stamped".
///
/// Stamped timestamps are non-negative; the sentinel doubles as the seed
/// value when scanning a batch for its most recent stamp.
pub const TIMESTAMP_UNSET: i64 = 0;

/// Identity of one physical table targeted by a batch of mutations.
///
/// Equality, ordering, and hashing are by table name so a `TableRef` can be
/// used directly as a grouping key for attempted mutation batches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

/// One timestamped column write inside a row mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
    /// Non-negative when stamped, [`TIMESTAMP_UNSET`] otherwise.
    pub timestamp: i64,
}

/// A set of column writes against one row, as attempted by the write
/// pipeline. Read-only to everything downstream of that pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMutation {
    row_key: Vec<u8>,
    cells: Vec<CellWrite>,
}

impl RowMutation {
    pub fn new(row_key: Vec<u8>) -> Self {
        Self {
            row_key,
            cells: Vec::new(),
        }
    }

    pub fn with_cells(row_key: Vec<u8>, cells: Vec<CellWrite>) -> Self {
        Self { row_key, cells }
    }

    pub fn push_cell(&mut self, cell: CellWrite) {
        self.cells.push(cell);
    }

    pub fn row_key(&self) -> &[u8] {
        self.row_key.as_slice()
    }

    pub fn cells(&self) -> &[CellWrite] {
        self.cells.as_slice()
    }
}

/// Start/end keys of the storage partition a failed batch was observed on.
///
/// Local-index row keys embed their logical index id immediately after the
/// partition prefix, so the prefix length decides where decoding starts.
/// The first partition of the keyspace has an empty start key; its prefix
/// length is taken from the end key instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBounds {
    start_key: Vec<u8>,
    end_key: Vec<u8>,
}

impl RegionBounds {
    pub fn new(start_key: Vec<u8>, end_key: Vec<u8>) -> Self {
        Self { start_key, end_key }
    }

    pub fn start_key(&self) -> &[u8] {
        self.start_key.as_slice()
    }

    pub fn end_key(&self) -> &[u8] {
        self.end_key.as_slice()
    }

    /// Byte offset at which row-key-embedded identifiers begin.
    pub fn key_prefix_len(&self) -> usize {
        if self.start_key.is_empty() {
            self.end_key.len()
        } else {
            self.start_key.len()
        }
    }
}

/// One administrative cell carried by a metadata state-change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaCell {
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
}

/// Administrative state-change request addressed at one catalog row.
///
/// Mimics the mutation a client issues when updating an index state through
/// the coordination service: the catalog row key of the index table plus the
/// column writes to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateIndexStateRequest {
    pub table_key: Bytes,
    pub cells: Vec<MetaCell>,
}

/// Outcome code returned by the metadata coordination service for a
/// state-change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChangeCode {
    /// The target row already reflects the requested administrative
    /// transition. Disable flows treat this as their success sentinel, so a
    /// disable of an already-disabled index is a safe no-op.
    TargetAlreadyInState,
    /// No catalog row exists for the addressed table key.
    TargetNotFound,
    /// A concurrent mutation of the same catalog row won.
    ConcurrentMutation,
    /// The service rejected the requested transition outright.
    TransitionNotAllowed,
}

impl StateChangeCode {
    /// Whether this code confirms a requested disable took (or already held).
    pub fn confirms_disable(self) -> bool {
        matches!(self, Self::TargetAlreadyInState)
    }
}

/// Channel to the metadata coordination service.
///
/// Implementations deliver the request and surface the service's outcome
/// code. A delivery fault (the call could not be executed) is an error,
/// distinct from a delivered call that returns a non-success code. Timeout
/// and cancellation policy belong to the implementation; callers impose
/// none of their own and never retry a failed call themselves.
#[async_trait]
pub trait MetaCoordinator: Send + Sync {
    async fn update_index_state(&self, request: UpdateIndexStateRequest) -> Result<StateChangeCode>;
}

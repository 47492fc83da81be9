//! Descriptor records for data tables and their secondary indexes.
//!
//! These are the persisted-record forms catalog connections return. Loading
//! and caching them is a catalog concern; this module only defines the
//! records, their validation, and the index-side helpers built on them.

use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::keys::IndexRowKeyCodec;

/// Placement kind of a logical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Backed by a physical table of its own, named after the index.
    Global,
    /// Co-located with the data table; shares one physical table with every
    /// other local index of that table, disambiguated by index id.
    Local,
}

/// Administrative state of a logical index.
///
/// Query planners only trust `Active` indexes. `Disabled` records carry a
/// disable timestamp bounding which data versions are stale and need
/// rebuild before the index can be trusted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Building,
    Active,
    Inactive,
    Disabled,
}

impl IndexState {
    /// Stable one-byte code stored in the catalog state cell.
    pub fn serialized_byte(self) -> u8 {
        match self {
            Self::Building => b'b',
            Self::Active => b'a',
            Self::Inactive => b'i',
            Self::Disabled => b'd',
        }
    }

    pub fn from_serialized_byte(code: u8) -> Result<Self> {
        match code {
            b'b' => Ok(Self::Building),
            b'a' => Ok(Self::Active),
            b'i' => Ok(Self::Inactive),
            b'd' => Ok(Self::Disabled),
            other => Err(anyhow!("unknown index state code {other:#04x}")),
        }
    }
}

/// Metadata for one logical secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub index_name: String,
    pub kind: IndexKind,
    pub state: IndexState,
    /// Identifier embedded in local-index row keys; `None` for global
    /// indexes, which never share a physical table.
    #[serde(default)]
    pub index_id: Option<i16>,
}

impl IndexDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(anyhow!("index descriptor has empty index_name"));
        }
        match self.kind {
            IndexKind::Local => {
                if self.index_id.is_none() {
                    return Err(anyhow!(
                        "local index '{}' has no index id",
                        self.index_name
                    ));
                }
            }
            IndexKind::Global => {
                if self.index_id.is_some() {
                    return Err(anyhow!(
                        "global index '{}' carries an index id",
                        self.index_name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether this index is a local index the query layer currently trusts.
    pub fn is_active_local(&self) -> bool {
        self.kind == IndexKind::Local && self.state == IndexState::Active
    }

    /// Row-key codec for this index. Only local indexes embed an id in
    /// their row keys, so only they have a codec.
    pub fn row_key_codec(&self) -> Result<IndexRowKeyCodec> {
        if self.kind != IndexKind::Local {
            return Err(anyhow!(
                "index '{}' is not a local index and has no row-key codec",
                self.index_name
            ));
        }
        let index_id = self
            .index_id
            .ok_or_else(|| anyhow!("local index '{}' has no index id", self.index_name))?;
        Ok(IndexRowKeyCodec::new(index_id))
    }
}

/// Metadata for a primary table and the indexes built against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTableDescriptor {
    pub table_name: String,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl DataTableDescriptor {
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(anyhow!("data table descriptor has empty table_name"));
        }
        let mut names = BTreeSet::new();
        let mut local_ids = BTreeSet::new();
        for index in &self.indexes {
            index.validate()?;
            if !names.insert(index.index_name.as_str()) {
                return Err(anyhow!(
                    "data table '{}' has duplicate index '{}'",
                    self.table_name,
                    index.index_name
                ));
            }
            if let (IndexKind::Local, Some(id)) = (index.kind, index.index_id) {
                if !local_ids.insert(id) {
                    return Err(anyhow!(
                        "data table '{}' has duplicate local index id {}",
                        self.table_name,
                        id
                    ));
                }
            }
        }
        Ok(())
    }

    /// Local indexes the query layer currently trusts.
    pub fn active_local_indexes(&self) -> impl Iterator<Item = &IndexDescriptor> {
        self.indexes
            .iter()
            .filter(|index| index.is_active_local())
    }
}

#[cfg(test)]
mod tests {
    use super::{DataTableDescriptor, IndexDescriptor, IndexKind, IndexState};

    fn local_index(name: &str, id: i16, state: IndexState) -> IndexDescriptor {
        IndexDescriptor {
            index_name: name.to_string(),
            kind: IndexKind::Local,
            state,
            index_id: Some(id),
        }
    }

    #[test]
    fn state_codes_round_trip() {
        for state in [
            IndexState::Building,
            IndexState::Active,
            IndexState::Inactive,
            IndexState::Disabled,
        ] {
            assert_eq!(
                IndexState::from_serialized_byte(state.serialized_byte()).unwrap(),
                state
            );
        }
        assert!(IndexState::from_serialized_byte(b'z').is_err());
    }

    #[test]
    fn validate_rejects_local_index_without_id() {
        let index = IndexDescriptor {
            index_name: "orders_by_status".to_string(),
            kind: IndexKind::Local,
            state: IndexState::Active,
            index_id: None,
        };
        assert!(index.validate().is_err());
    }

    #[test]
    fn validate_rejects_global_index_with_id() {
        let index = IndexDescriptor {
            index_name: "orders_by_status".to_string(),
            kind: IndexKind::Global,
            state: IndexState::Active,
            index_id: Some(3),
        };
        assert!(index.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_local_index_ids() {
        let table = DataTableDescriptor {
            table_name: "orders".to_string(),
            indexes: vec![
                local_index("by_status", 1, IndexState::Active),
                local_index("by_day", 1, IndexState::Active),
            ],
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn active_local_indexes_skips_untrusted_states() {
        let table = DataTableDescriptor {
            table_name: "orders".to_string(),
            indexes: vec![
                local_index("by_status", 1, IndexState::Active),
                local_index("by_day", 2, IndexState::Building),
                local_index("by_merchant", 3, IndexState::Disabled),
                IndexDescriptor {
                    index_name: "global_by_sku".to_string(),
                    kind: IndexKind::Global,
                    state: IndexState::Active,
                    index_id: None,
                },
            ],
        };
        let active: Vec<&str> = table
            .active_local_indexes()
            .map(|index| index.index_name.as_str())
            .collect();
        assert_eq!(active, vec!["by_status"]);
    }

    #[test]
    fn descriptor_records_decode_from_catalog_json() {
        let raw = r#"{
            "table_name": "orders",
            "indexes": [
                {"index_name": "by_status", "kind": "local", "state": "active", "index_id": 4},
                {"index_name": "orders_by_sku", "kind": "global", "state": "disabled"}
            ]
        }"#;
        let table: DataTableDescriptor = serde_json::from_str(raw).unwrap();
        table.validate().unwrap();
        assert_eq!(table.indexes.len(), 2);
        assert_eq!(table.indexes[0].index_id, Some(4));
        assert_eq!(table.indexes[1].index_id, None);
        assert_eq!(table.indexes[1].state, IndexState::Disabled);
    }
}

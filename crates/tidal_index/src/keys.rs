//! Row-key codec for local-index physical tables.
//!
//! Local indexes co-partition with their data table: every index row key is
//! `partition prefix ++ index id ++ logical remainder`. The embedded id and
//! the disable-timestamp catalog cell both use sign-flipped big-endian
//! encodings so encoded bytes order the same way the integers do, matching
//! the ordered-integer encoding used across the Tidal keyspace.

use anyhow::{anyhow, Result};

const SIGN_FLIP_MASK_I16: u16 = 1 << 15;
const SIGN_FLIP_MASK_I64: u64 = 1 << 63;

/// Encoded width of the index id embedded in local-index row keys.
pub const INDEX_ID_LEN: usize = 2;

/// Encodes a local-index id as order-preserving big-endian bytes.
pub fn encode_index_id(id: i16) -> [u8; INDEX_ID_LEN] {
    (id as u16 ^ SIGN_FLIP_MASK_I16).to_be_bytes()
}

/// Decodes an id previously encoded with [`encode_index_id`].
pub fn decode_index_id(bytes: [u8; INDEX_ID_LEN]) -> i16 {
    (u16::from_be_bytes(bytes) ^ SIGN_FLIP_MASK_I16) as i16
}

/// Encodes an i64 as order-preserving big-endian bytes.
pub fn encode_i64_ordered(value: i64) -> [u8; 8] {
    (value as u64 ^ SIGN_FLIP_MASK_I64).to_be_bytes()
}

/// Decodes an i64 previously encoded with [`encode_i64_ordered`].
pub fn decode_i64_ordered(bytes: [u8; 8]) -> i64 {
    (u64::from_be_bytes(bytes) ^ SIGN_FLIP_MASK_I64) as i64
}

/// Row-key layout helper for one logical local index.
///
/// All local indexes sharing a physical table place the id at the same spot,
/// so any one index's codec can decode ids for the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRowKeyCodec {
    index_id: i16,
}

impl IndexRowKeyCodec {
    pub fn new(index_id: i16) -> Self {
        Self { index_id }
    }

    pub fn index_id(&self) -> i16 {
        self.index_id
    }

    /// Builds an index row key for this codec's logical index.
    pub fn encode_row_key(&self, partition_prefix: &[u8], remainder: &[u8]) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(partition_prefix.len() + INDEX_ID_LEN + remainder.len());
        out.extend_from_slice(partition_prefix);
        out.extend_from_slice(&encode_index_id(self.index_id));
        out.extend_from_slice(remainder);
        out
    }

    /// Extracts the embedded index id from `row_key`, starting at `offset`.
    ///
    /// `offset` is the partition-prefix length of the region the key was
    /// written to. A key too short to carry an id at that offset is
    /// malformed and errors.
    pub fn index_id_from_row_key(&self, row_key: &[u8], offset: usize) -> Result<i16> {
        let end = offset
            .checked_add(INDEX_ID_LEN)
            .filter(|end| *end <= row_key.len())
            .ok_or_else(|| {
                anyhow!(
                    "index row key too short for embedded id: offset={} key={}",
                    offset,
                    hex::encode(row_key)
                )
            })?;
        let mut raw = [0u8; INDEX_ID_LEN];
        raw.copy_from_slice(&row_key[offset..end]);
        Ok(decode_index_id(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        decode_i64_ordered, decode_index_id, encode_i64_ordered, encode_index_id,
        IndexRowKeyCodec,
    };

    #[test]
    fn index_id_codec_round_trips() {
        for id in [i16::MIN, -7, -1, 0, 1, 7, i16::MAX] {
            assert_eq!(decode_index_id(encode_index_id(id)), id);
        }
    }

    #[test]
    fn index_id_encoding_preserves_order() {
        let ids = [i16::MIN, -300, -1, 0, 1, 300, i16::MAX];
        for pair in ids.windows(2) {
            assert!(encode_index_id(pair[0]) < encode_index_id(pair[1]));
        }
    }

    #[test]
    fn i64_ordered_codec_round_trips_and_orders() {
        let values = [i64::MIN, -1, 0, 1, 1_700_000_000_000, i64::MAX];
        for value in values {
            assert_eq!(decode_i64_ordered(encode_i64_ordered(value)), value);
        }
        for pair in values.windows(2) {
            assert!(encode_i64_ordered(pair[0]) < encode_i64_ordered(pair[1]));
        }
    }

    #[test]
    fn codec_extracts_id_past_partition_prefix() {
        let codec = IndexRowKeyCodec::new(7);
        let row_key = codec.encode_row_key(&[0xA0, 0xA1, 0xA2], b"rest-of-key");
        assert_eq!(codec.index_id_from_row_key(&row_key, 3).unwrap(), 7);
    }

    #[test]
    fn codec_rejects_keys_too_short_for_an_id() {
        let codec = IndexRowKeyCodec::new(7);
        let err = codec.index_id_from_row_key(&[0xA0, 0xA1, 0xA2], 3).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}

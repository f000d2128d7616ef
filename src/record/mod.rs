//! # Record Cells
//!
//! This module defines the two cell payloads stored in table b-tree pages:
//! variable-length [`Record`] cells on leaf pages and fixed-size
//! [`InteriorNode`] cells on interior pages.
//!
//! ## Record Wire Format
//!
//! A record is a row payload keyed by a 32-bit row id. Its serialized form is
//! what [`crate::pager::MemPage::add_cell`] stores and what
//! [`crate::pager::MemPage::read_record`] parses back:
//!
//! ```text
//! +-------------------+----------------+------------------+
//! | payload length    | row id         | payload bytes    |
//! | (varint)          | (varint)       | (payload length) |
//! +-------------------+----------------+------------------+
//! ```
//!
//! The storage core treats the serialized form as opaque bytes of known
//! length; only the row id is interpreted, for b-tree key ordering.
//!
//! ## Interior Cell Wire Format
//!
//! An interior table cell is exactly 8 bytes, big-endian:
//!
//! ```text
//! Offset  Size  Field
//! 0       4     left_child   page number of the child subtree
//! 4       4     key          largest row id reachable through left_child
//! ```

pub mod varint;

use std::io::Write;

use eyre::{ensure, Result, WrapErr};

use crate::config::{INTERIOR_CELL_SIZE, MAX_VARINT_LEN};
use varint::{decode_varint, encode_varint, varint_len};

/// One table row: a monotonically assigned row id plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    row_id: u32,
    payload: Vec<u8>,
}

impl Record {
    pub fn new(row_id: u32, payload: Vec<u8>) -> Self {
        Self { row_id, payload }
    }

    pub fn row_id(&self) -> u32 {
        self.row_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Encoded length of this record's cell.
    pub fn encoded_len(&self) -> usize {
        varint_len(self.payload.len() as u64) + varint_len(self.row_id as u64) + self.payload.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        let mut scratch = [0u8; MAX_VARINT_LEN];

        let n = encode_varint(self.payload.len() as u64, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);

        let n = encode_varint(self.row_id as u64, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);

        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let (payload_len, n) = decode_varint(buf).wrap_err("failed to decode payload length")?;
        let buf = &buf[n..];

        let (row_id, n) = decode_varint(buf).wrap_err("failed to decode row id")?;
        let buf = &buf[n..];

        ensure!(
            row_id <= u32::MAX as u64,
            "row id {} exceeds 32 bits",
            row_id
        );
        ensure!(
            buf.len() >= payload_len as usize,
            "record payload truncated: {} < {}",
            buf.len(),
            payload_len
        );

        Ok(Self {
            row_id: row_id as u32,
            payload: buf[..payload_len as usize].to_vec(),
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_all(&self.to_bytes())
            .wrap_err("failed to write record")
    }
}

/// One interior table cell: a child pointer and the largest key below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorNode {
    pub left_child: u32,
    pub key: u32,
}

impl InteriorNode {
    pub fn new(left_child: u32, key: u32) -> Self {
        Self { left_child, key }
    }

    pub fn to_bytes(&self) -> [u8; INTERIOR_CELL_SIZE] {
        let mut buf = [0u8; INTERIOR_CELL_SIZE];
        buf[..4].copy_from_slice(&self.left_child.to_be_bytes());
        buf[4..].copy_from_slice(&self.key.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        ensure!(
            buf.len() >= INTERIOR_CELL_SIZE,
            "buffer too small for InteriorNode: {} < {}",
            buf.len(),
            INTERIOR_CELL_SIZE
        );

        Ok(Self {
            left_child: u32::from_be_bytes(buf[..4].try_into().unwrap()), // INVARIANT: length validated by ensure above
            key: u32::from_be_bytes(buf[4..8].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let record = Record::new(42, vec![0x01, 0x02, 0x03]);

        let bytes = record.to_bytes();
        let parsed = Record::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.row_id(), 42);
        assert_eq!(parsed.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(bytes.len(), record.encoded_len());
    }

    #[test]
    fn record_roundtrip_empty_payload() {
        let record = Record::new(1, Vec::new());

        let parsed = Record::from_bytes(&record.to_bytes()).unwrap();

        assert_eq!(parsed.row_id(), 1);
        assert!(parsed.payload().is_empty());
    }

    #[test]
    fn record_parses_from_oversized_buffer() {
        let record = Record::new(7, vec![0xAA; 16]);
        let mut bytes = record.to_bytes();
        bytes.extend_from_slice(&[0xFF; 32]);

        let parsed = Record::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, record);
    }

    #[test]
    fn record_rejects_truncated_payload() {
        let record = Record::new(7, vec![0xAA; 16]);
        let bytes = record.to_bytes();

        let result = Record::from_bytes(&bytes[..bytes.len() - 1]);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("truncated"));
    }

    #[test]
    fn record_write_to_matches_to_bytes() {
        let record = Record::new(9, b"hello".to_vec());
        let mut sink = Vec::new();

        record.write_to(&mut sink).unwrap();

        assert_eq!(sink, record.to_bytes());
    }

    #[test]
    fn interior_node_roundtrip() {
        let node = InteriorNode::new(3, 0xDEAD_BEEF);

        let bytes = node.to_bytes();
        let parsed = InteriorNode::from_bytes(&bytes).unwrap();

        assert_eq!(bytes.len(), INTERIOR_CELL_SIZE);
        assert_eq!(parsed, node);
    }

    #[test]
    fn interior_node_is_big_endian() {
        let node = InteriorNode::new(2, 1);

        let bytes = node.to_bytes();

        assert_eq!(bytes, [0, 0, 0, 2, 0, 0, 0, 1]);
    }

    #[test]
    fn interior_node_rejects_short_buffer() {
        let result = InteriorNode::from_bytes(&[0u8; 4]);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("buffer too small"));
    }
}

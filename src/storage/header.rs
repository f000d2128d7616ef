//! # Database File Header
//!
//! The first 100 bytes of page 1 hold the database header, laid out the way
//! the SQLite format family does. LitDB reads and preserves the whole header
//! but only ever mutates three fields: the page size, the file change counter
//! and the size of the database in pages.
//!
//! ## Header Layout (100 bytes, big-endian)
//!
//! ```text
//! Offset  Size  Field                  Description
//! ------  ----  ---------------------  -----------------------------------
//! 0       16    magic                  "SQLite format 3\0"
//! 16      2     page_size              Bytes per page; 1 encodes 65536
//! 18      1     write_version          File format write version
//! 19      1     read_version           File format read version
//! 20      1     reserved_space         Reserved bytes per page (0)
//! 21      1     max_payload_fraction   Always 64
//! 22      1     min_payload_fraction   Always 32
//! 23      1     leaf_payload_fraction  Always 32
//! 24      4     file_change_counter    Incremented on every file write
//! 28      4     size_in_pages          Database size in pages
//! 32      68    tail                   Remaining fields, preserved verbatim
//! ```
//!
//! ## Zerocopy Safety
//!
//! The struct is `#[repr(C)]` with `zerocopy::big_endian` field types, so it
//! can be read from and written as raw bytes without manual (de)serialization.

use eyre::{ensure, Result};
use zerocopy::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{DB_HEADER_SIZE, MAX_PAGE_SIZE};

pub const DB_MAGIC: &[u8; 16] = b"SQLite format 3\x00";

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DatabaseHeader {
    magic: [u8; 16],
    page_size: U16,
    write_version: u8,
    read_version: u8,
    reserved_space: u8,
    max_payload_fraction: u8,
    min_payload_fraction: u8,
    leaf_payload_fraction: u8,
    file_change_counter: U32,
    size_in_pages: U32,
    tail: [u8; 68],
}

const _: () = assert!(std::mem::size_of::<DatabaseHeader>() == DB_HEADER_SIZE);

impl DatabaseHeader {
    pub fn new(page_size: usize) -> Self {
        Self {
            magic: *DB_MAGIC,
            page_size: U16::new(encode_page_size(page_size)),
            write_version: 1,
            read_version: 1,
            reserved_space: 0,
            max_payload_fraction: 64,
            min_payload_fraction: 32,
            leaf_payload_fraction: 32,
            file_change_counter: U32::new(0),
            size_in_pages: U32::new(0),
            tail: [0u8; 68],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= DB_HEADER_SIZE,
            "buffer too small for DatabaseHeader: {} < {}",
            bytes.len(),
            DB_HEADER_SIZE
        );

        let header = Self::read_from_bytes(&bytes[..DB_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse DatabaseHeader: {:?}", e))?;

        ensure!(
            &header.magic == DB_MAGIC,
            "invalid magic bytes in database header"
        );

        Ok(header)
    }

    pub fn page_size(&self) -> usize {
        decode_page_size(self.page_size.get())
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = U16::new(encode_page_size(page_size));
    }

    pub fn file_change_counter(&self) -> u32 {
        self.file_change_counter.get()
    }

    pub fn increment_change_counter(&mut self) {
        self.file_change_counter = U32::new(self.file_change_counter.get() + 1);
    }

    pub fn size_in_pages(&self) -> u32 {
        self.size_in_pages.get()
    }

    pub fn set_size_in_pages(&mut self, pages: u32) {
        self.size_in_pages = U32::new(pages);
    }
}

// The 2-byte field cannot hold 65536 directly; the format encodes it as 1.
fn encode_page_size(page_size: usize) -> u16 {
    if page_size == MAX_PAGE_SIZE {
        1
    } else {
        page_size as u16
    }
}

fn decode_page_size(raw: u16) -> usize {
    if raw == 1 {
        MAX_PAGE_SIZE
    } else {
        raw as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::IntoBytes;

    #[test]
    fn header_size_is_100() {
        assert_eq!(std::mem::size_of::<DatabaseHeader>(), 100);
    }

    #[test]
    fn header_roundtrip() {
        let mut header = DatabaseHeader::new(4096);
        header.increment_change_counter();
        header.increment_change_counter();
        header.set_size_in_pages(7);

        let parsed = DatabaseHeader::from_bytes(header.as_bytes()).unwrap();

        assert_eq!(parsed.page_size(), 4096);
        assert_eq!(parsed.file_change_counter(), 2);
        assert_eq!(parsed.size_in_pages(), 7);
    }

    #[test]
    fn header_rejects_invalid_magic() {
        let mut bytes = [0u8; 100];
        bytes[..16].copy_from_slice(b"Not a database!!");

        let result = DatabaseHeader::from_bytes(&bytes);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid magic"));
    }

    #[test]
    fn header_rejects_short_buffer() {
        let result = DatabaseHeader::from_bytes(&[0u8; 50]);

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("buffer too small"));
    }

    #[test]
    fn max_page_size_encodes_as_one() {
        let header = DatabaseHeader::new(65536);

        assert_eq!(header.as_bytes()[16..18], [0, 1]);
        assert_eq!(header.page_size(), 65536);
    }

    #[test]
    fn page_size_field_is_big_endian() {
        let header = DatabaseHeader::new(4096);

        assert_eq!(header.as_bytes()[16..18], [0x10, 0x00]);
    }

    #[test]
    fn tail_is_preserved_verbatim() {
        let mut bytes = [0u8; 100];
        bytes[..16].copy_from_slice(DB_MAGIC);
        bytes[16..18].copy_from_slice(&1024u16.to_be_bytes());
        bytes[60] = 0xAB;
        bytes[99] = 0xCD;

        let mut header = DatabaseHeader::from_bytes(&bytes).unwrap();
        header.increment_change_counter();
        header.set_size_in_pages(3);

        let out = header.as_bytes();
        assert_eq!(out[60], 0xAB);
        assert_eq!(out[99], 0xCD);
    }
}

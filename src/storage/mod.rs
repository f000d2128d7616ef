//! # Storage Module
//!
//! This module provides the durable storage layer for LitDB: a paged main
//! database file and a write-ahead log layered on top of it.
//!
//! ## Architecture Overview
//!
//! The layer treats a single regular file as a dense array of fixed-size
//! pages, numbered from 1. Page 1 is special: its first 100 bytes hold the
//! database header, so its b-tree content starts at offset 100.
//!
//! ```text
//! Offset 0:            DatabaseHeader (100 bytes)
//! Offset 100:          Page 1 body (page_size - 100 bytes)
//! Offset page_size:    Page 2 (page_size bytes)
//! Offset 2*page_size:  Page 3 (page_size bytes)
//! ...
//! ```
//!
//! Two implementations of the page I/O traits exist:
//!
//! - [`DbFile`]: raw page-aligned reads and writes against the main file
//! - [`Wal`]: buffers page writes in memory and in a side log file, serves
//!   reads buffer-first, and checkpoints the buffer back into the [`DbFile`]
//!
//! The pager stacks on whichever implementation it is given; the engine wires
//! it over the WAL so every write is logged before it reaches the main file.
//!
//! ## Module Organization
//!
//! - `header`: the 100-byte database header embedded in page 1
//! - `db_file`: the main database file
//! - `wal`: the write-ahead log
//!
//! ## Thread Safety
//!
//! [`DbFile`] and [`Wal`] are `Send + Sync`; each guards its mutable state
//! with a `parking_lot::RwLock` and uses positioned I/O so concurrent readers
//! never share a file cursor.

mod db_file;
mod header;
mod wal;

pub use db_file::DbFile;
pub use header::{DatabaseHeader, DB_MAGIC};
pub use wal::{running_checksum, Wal, WalFrameHeader, WalHeader};

use eyre::Result;

/// One raw page image keyed by its 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: u32,
    pub data: Vec<u8>,
}

impl Page {
    pub fn new(page_number: u32, data: Vec<u8>) -> Self {
        Self { page_number, data }
    }
}

/// Reads whole pages by page number.
pub trait PageReader {
    /// Returns exactly `page_size` bytes. For page 1 the first 100 bytes are
    /// left zeroed; the caller overlays the header if it needs it.
    fn read(&self, page_number: u32) -> Result<Vec<u8>>;
}

/// Writes batches of whole pages. The batch is durable on return.
pub trait PageWriter {
    fn write(&self, pages: &[Page]) -> Result<()>;
}

/// A page-addressed file: the contract the pager consumes.
pub trait PageFile: PageReader + PageWriter {
    fn page_size(&self) -> usize;
    fn total_pages(&self) -> u32;
}

impl<T: PageReader + ?Sized> PageReader for &T {
    fn read(&self, page_number: u32) -> Result<Vec<u8>> {
        (**self).read(page_number)
    }
}

impl<T: PageWriter + ?Sized> PageWriter for &T {
    fn write(&self, pages: &[Page]) -> Result<()> {
        (**self).write(pages)
    }
}

impl<T: PageFile + ?Sized> PageFile for &T {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn total_pages(&self) -> u32 {
        (**self).total_pages()
    }
}

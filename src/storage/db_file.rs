//! # Main Database File
//!
//! [`DbFile`] owns the single regular file that backs a database and the
//! 100-byte header embedded at the start of page 1. It exposes page-aligned
//! reads and durable batch writes; everything above it (WAL, pager, b-tree)
//! goes through those two operations.
//!
//! ## Write Protocol
//!
//! 1. Reject any page that would leave a hole in the file
//! 2. Write each page body at its offset (page 1 skips its first 100 bytes,
//!    which belong to the header and are written separately)
//! 3. Bump the file change counter, rewrite the header at offset 0
//! 4. `fsync`
//!
//! A failure mid-batch can leave some pages updated and the header stale.
//! That is accepted: the WAL above this layer is the durability surface, and
//! a checkpoint replays the same pages on the next attempt.
//!
//! ## Thread Safety
//!
//! All state sits behind a `parking_lot::RwLock`; reads take the read lock
//! and writes the write lock. I/O is positioned (`read_exact_at` /
//! `write_all_at`), so concurrent readers never race on a shared file cursor.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use parking_lot::RwLock;
use zerocopy::IntoBytes;

use super::header::DatabaseHeader;
use super::{Page, PageFile, PageReader, PageWriter};
use crate::config::DB_HEADER_SIZE;

#[derive(Debug)]
pub struct DbFile {
    path: PathBuf,
    page_size: usize,
    state: RwLock<DbFileState>,
}

#[derive(Debug)]
struct DbFileState {
    file: File,
    header: DatabaseHeader,
    total_pages: u32,
}

impl DbFile {
    /// Opens the database file, creating it if absent. For an existing
    /// non-empty file the header's page size overrides `page_size`.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let len = file
            .metadata()
            .wrap_err("failed to stat database file")?
            .len();

        let (header, page_size) = if len > 0 {
            let mut bytes = [0u8; DB_HEADER_SIZE];
            file.read_exact_at(&mut bytes, 0)
                .wrap_err("failed to read database header")?;
            let header = DatabaseHeader::from_bytes(&bytes)?;
            let page_size = header.page_size();
            (header, page_size)
        } else {
            (DatabaseHeader::new(page_size), page_size)
        };

        let total_pages = header.size_in_pages();

        Ok(Self {
            path,
            page_size,
            state: RwLock::new(DbFileState {
                file,
                header,
                total_pages,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_change_counter(&self) -> u32 {
        self.state.read().header.file_change_counter()
    }

    fn page_offset(&self, page_number: u32) -> u64 {
        if page_number == 1 {
            DB_HEADER_SIZE as u64
        } else {
            (page_number as u64 - 1) * self.page_size as u64
        }
    }
}

impl PageReader for DbFile {
    fn read(&self, page_number: u32) -> Result<Vec<u8>> {
        ensure!(page_number >= 1, "page [{}] out of bounds", page_number);

        let state = self.state.read();
        let offset = self.page_offset(page_number);
        let mut data = vec![0u8; self.page_size];

        // Page 1's first 100 bytes are the header; they stay zeroed here and
        // the body is read in after them.
        let body_start = if page_number == 1 { DB_HEADER_SIZE } else { 0 };

        state
            .file
            .read_exact_at(&mut data[body_start..], offset)
            .wrap_err_with(|| format!("failed to read page {}", page_number))?;

        Ok(data)
    }
}

impl PageWriter for DbFile {
    fn write(&self, pages: &[Page]) -> Result<()> {
        let mut state = self.state.write();

        for page in pages {
            ensure!(
                page.page_number >= 1,
                "page [{}] out of bounds",
                page.page_number
            );
            ensure!(
                page.data.len() == self.page_size,
                "page {} has {} bytes, expected {}",
                page.page_number,
                page.data.len(),
                self.page_size
            );
            ensure!(
                page.page_number <= state.total_pages + 1,
                "cannot grow the database file with a gap in pages (page {}, total pages {})",
                page.page_number,
                state.total_pages
            );

            if page.page_number > state.total_pages {
                state.total_pages = page.page_number;
            }

            let offset = self.page_offset(page.page_number);
            let body_start = if page.page_number == 1 {
                DB_HEADER_SIZE
            } else {
                0
            };

            state
                .file
                .write_all_at(&page.data[body_start..], offset)
                .wrap_err_with(|| format!("failed to write page {}", page.page_number))?;
        }

        state.header.increment_change_counter();
        let total_pages = state.total_pages;
        state.header.set_size_in_pages(total_pages);
        state.header.set_page_size(self.page_size);

        state
            .file
            .write_all_at(state.header.as_bytes(), 0)
            .wrap_err("failed to write database header")?;

        state
            .file
            .sync_all()
            .wrap_err("failed to sync database file")?;

        Ok(())
    }
}

impl PageFile for DbFile {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn total_pages(&self) -> u32 {
        self.state.read().total_pages
    }
}

//! # Pager
//!
//! The pager caches parsed [`MemPage`] values by page number on top of any
//! [`PageFile`] implementation and mediates every page read and write from
//! the b-tree layer. The cache is the authoritative view for the writer:
//! reads are served cache-first with parse-on-miss, and mutated pages are
//! handed back through [`Pager::write`] before they reach storage.
//!
//! ## Ownership Protocol
//!
//! [`Pager::read`] and [`Pager::allocate`] hand out working copies of the
//! cached page. The caller mutates its copy in place and returns it through
//! [`Pager::write`], which installs it in the cache as modified. Nothing is
//! persisted until [`Pager::flush`] gathers the dirty pages and writes them
//! through the underlying file in one batch; [`Pager::reset`] instead drops
//! every dirty page, discarding uncommitted state.
//!
//! The cache is unbounded: it grows with the database working set and pages
//! are only dropped by `reset`.
//!
//! ## Thread Safety
//!
//! The pager is single-writer and not thread-safe. Callers serialize access;
//! in practice one writer per database.

mod btree;
mod mem_page;

pub use btree::{BTreeTable, RecordIterator};
pub use mem_page::{header_offset, MemPage, PageHeader, PageType};

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::storage::{Page, PageFile};

pub struct Pager<F: PageFile> {
    file: F,
    page_count: u32,
    cache: HashMap<u32, MemPage>,
}

impl<F: PageFile> Pager<F> {
    pub fn new(file: F) -> Self {
        let page_count = file.total_pages();
        Self {
            file,
            page_count,
            cache: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Returns a working copy of the page, reading and parsing it from the
    /// underlying file on a cache miss.
    pub fn read(&mut self, page_number: u32) -> Result<MemPage> {
        ensure!(page_number >= 1, "page [{}] out of bounds", page_number);

        if let Some(page) = self.cache.get(&page_number) {
            return Ok(page.clone());
        }

        let data = self.file.read(page_number)?;
        let page = MemPage::from_bytes(page_number, data)
            .wrap_err_with(|| format!("failed to parse page {}", page_number))?;

        self.cache.insert(page_number, page.clone());
        Ok(page)
    }

    /// Installs mutated pages back into the cache as modified. This is the
    /// handover of authority; nothing is persisted until [`Pager::flush`].
    pub fn write(&mut self, pages: Vec<MemPage>) {
        for mut page in pages {
            page.mark_dirty();
            self.cache.insert(page.number(), page);
        }
    }

    /// Allocates the next page number and returns a fresh dirty page of the
    /// given type.
    pub fn allocate(&mut self, page_type: PageType) -> MemPage {
        self.page_count += 1;

        let mut page = MemPage::new(page_type, self.page_count, self.file.page_size());
        page.mark_dirty();

        self.cache.insert(page.number(), page.clone());
        page
    }

    /// Writes every dirty page through the underlying file in one batch and
    /// clears the dirty flags on success.
    pub fn flush(&mut self) -> Result<()> {
        let mut batch: SmallVec<[Page; 8]> = self
            .cache
            .values()
            .filter(|page| page.is_dirty())
            .map(|page| page.as_page())
            .collect();
        batch.sort_by_key(|p| p.page_number);

        debug!(dirty = batch.len(), "flushing dirty pages");

        if !batch.is_empty() {
            self.file.write(&batch)?;
            self.page_count = self.file.total_pages();
        }

        for page in self.cache.values_mut() {
            page.clear_dirty();
        }

        Ok(())
    }

    /// Drops every dirty page from the cache, discarding uncommitted state.
    pub fn reset(&mut self) {
        self.page_count = self.file.total_pages();
        self.cache.retain(|_, page| !page.is_dirty());
    }
}

/// Writes the initial leaf page 1 of a brand-new database.
pub fn initialize<F: PageFile>(file: &F) -> Result<()> {
    let page = MemPage::new(PageType::LeafTable, 1, file.page_size());
    file.write(&[page.as_page()])
}

//! # LitDB - Embedded Database Storage Core
//!
//! LitDB is the durable, paged storage core of a small embedded relational
//! database, on-disk compatible with the SQLite page format family. It
//! provides a table b-tree over a write-ahead-logged page file; SQL parsing,
//! query planning and any command-line surface are external collaborators.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │       BTreeTable (insert/scan)      │
//! ├─────────────────────────────────────┤
//! │     Pager (parsed-page cache,       │
//! │     allocation, dirty tracking)     │
//! ├─────────────────────────────────────┤
//! │   Wal (in-memory page buffer +      │
//! │   append-only log, checkpointing)   │
//! ├─────────────────────────────────────┤
//! │   DbFile (page-aligned file I/O,    │
//! │   100-byte header, fsync)           │
//! └─────────────────────────────────────┘
//! ```
//!
//! A write flows top-down: the b-tree mutates pages it borrowed from the
//! pager and hands them back; the pager's flush pushes the dirty set into the
//! WAL; a WAL checkpoint writes the buffered pages through to the main file.
//! Reads flow the same path in reverse, each layer answering from its own
//! state before delegating down.
//!
//! ## File Layout
//!
//! Two files per database inside the data directory:
//!
//! ```text
//! data_dir/
//! ├── lit.db       # pages; page 1 starts with the 100-byte header
//! └── lit.db-wal   # 32-byte WAL header + 24-byte-header frames
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use litdb::{BTreeTable, Config, Engine, Record};
//!
//! let engine = Engine::start(Config::new("./data").page_size(4096))?;
//! let mut pager = engine.pager();
//!
//! let mut table = BTreeTable::new(1, &mut pager);
//! table.insert(&Record::new(engine.next_tx_id(), b"hello".to_vec()))?;
//!
//! pager.flush()?;
//! engine.wal().checkpoint()?;
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: main file, database header, write-ahead log
//! - [`pager`]: parsed-page cache, page representation, table b-tree
//! - [`record`]: record and interior cell codecs
//! - [`engine`]: stack wiring and transaction id allocation
//! - [`config`]: on-disk layout constants
//!
//! ## Limits
//!
//! The core is single-writer, never reclaims pages, and does not split
//! interior b-tree pages: a full interior root is surfaced as an error.

pub mod config;
pub mod engine;
pub mod pager;
pub mod record;
pub mod storage;

pub use engine::{Config, Engine};
pub use pager::{BTreeTable, MemPage, PageHeader, PageType, Pager};
pub use record::{InteriorNode, Record};
pub use storage::{DbFile, Page, PageFile, PageReader, PageWriter, Wal};

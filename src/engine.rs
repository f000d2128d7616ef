//! # Storage Engine
//!
//! [`Engine`] wires the storage stack together: it opens the main database
//! file inside the data directory, initializes a fresh database with a leaf
//! page 1, opens the write-ahead log over the file, and hands out pagers
//! stacked on the WAL. It also allocates the monotonically increasing
//! transaction ids that callers use as row ids.
//!
//! ```text
//! Engine
//!   └── Wal            (buffers writes, serves reads, checkpoints)
//!         └── DbFile   (pages + 100-byte header, fsync on write)
//! ```
//!
//! The engine itself is shareable across threads; each writer thread takes
//! its own [`Pager`], which is single-writer by design.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use eyre::{ensure, Result, WrapErr};
use tracing::{debug, info};

use crate::config::{DB_FILE_NAME, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::pager::{self, Pager};
use crate::storage::{DbFile, PageFile, Wal};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub page_size: usize,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

#[derive(Debug)]
pub struct Engine {
    config: Config,
    wal: Wal,
    tx_id: AtomicU32,
}

impl Engine {
    /// Opens (or creates) the database under `config.data_dir` and brings up
    /// the WAL. The configured page size only applies to a brand-new
    /// database; an existing file keeps the page size in its header.
    pub fn start(config: Config) -> Result<Self> {
        ensure!(
            config.page_size >= MIN_PAGE_SIZE,
            "page size must be at least {} bytes, got {}",
            MIN_PAGE_SIZE,
            config.page_size
        );
        ensure!(
            config.page_size <= MAX_PAGE_SIZE && config.page_size.is_power_of_two(),
            "page size must be a power of two up to {}, got {}",
            MAX_PAGE_SIZE,
            config.page_size
        );

        fs::create_dir_all(&config.data_dir).wrap_err_with(|| {
            format!(
                "failed to create data directory '{}'",
                config.data_dir.display()
            )
        })?;

        let db_path = config.data_dir.join(DB_FILE_NAME);
        info!(
            path = %db_path.display(),
            page_size = config.page_size,
            "starting storage engine"
        );

        let db_file = DbFile::open(&db_path, config.page_size)?;

        // A brand-new database needs at least one page.
        if db_file.total_pages() == 0 {
            debug!("initializing fresh database");
            pager::initialize(&db_file)?;
        }

        let wal = Wal::open(db_file)?;

        Ok(Self {
            config,
            wal,
            tx_id: AtomicU32::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// Allocates the next transaction id. Ids start at 1 and never repeat
    /// for the lifetime of the engine.
    pub fn next_tx_id(&self) -> u32 {
        self.tx_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A fresh pager stacked on the WAL.
    pub fn pager(&self) -> Pager<&Wal> {
        Pager::new(&self.wal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::BTreeTable;
    use crate::record::Record;
    use crate::storage::PageFile;
    use tempfile::tempdir;

    #[test]
    fn start_rejects_small_page_size() {
        let dir = tempdir().unwrap();

        let result = Engine::start(Config::new(dir.path()).page_size(512));

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least"));
    }

    #[test]
    fn start_rejects_non_power_of_two_page_size() {
        let dir = tempdir().unwrap();

        let result = Engine::start(Config::new(dir.path()).page_size(1040));

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("power of two"));
    }

    #[test]
    fn tx_ids_start_at_one_and_increase() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(Config::new(dir.path())).unwrap();

        assert_eq!(engine.next_tx_id(), 1);
        assert_eq!(engine.next_tx_id(), 2);
        assert_eq!(engine.next_tx_id(), 3);
    }

    #[test]
    fn insert_flush_checkpoint_reopen_roundtrip() {
        let dir = tempdir().unwrap();

        {
            let engine = Engine::start(Config::new(dir.path()).page_size(4096)).unwrap();
            let mut pager = engine.pager();

            let row_id = engine.next_tx_id();
            let mut table = BTreeTable::new(1, &mut pager);
            table
                .insert(&Record::new(row_id, vec![0x01, 0x02, 0x03]))
                .unwrap();

            pager.flush().unwrap();
            engine.wal().checkpoint().unwrap();
        }

        let engine = Engine::start(Config::new(dir.path()).page_size(4096)).unwrap();
        assert_eq!(engine.wal().total_pages(), 1);

        let mut pager = engine.pager();
        let mut table = BTreeTable::new(1, &mut pager);
        let records = table.scan().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row_id(), 1);
        assert_eq!(records[0].payload(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn flush_bumps_file_change_counter_once() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(Config::new(dir.path()).page_size(1024)).unwrap();

        // Stack the pager directly on the main file so each flush is one
        // DbFile write.
        let db_file = engine.wal().db_file();
        let mut pager = Pager::new(db_file);
        pager.read(1).unwrap();

        let c0 = db_file.file_change_counter();

        let mut table = BTreeTable::new(1, &mut pager);
        table.insert(&Record::new(1, vec![0xAB])).unwrap();
        pager.flush().unwrap();

        assert_eq!(db_file.file_change_counter(), c0 + 1);
    }

    #[test]
    fn existing_database_keeps_its_page_size() {
        let dir = tempdir().unwrap();

        {
            let engine = Engine::start(Config::new(dir.path()).page_size(2048)).unwrap();
            assert_eq!(engine.wal().page_size(), 2048);
        }

        let engine = Engine::start(Config::new(dir.path()).page_size(8192)).unwrap();

        assert_eq!(engine.wal().page_size(), 2048);
    }

    #[test]
    fn unflushed_writes_stay_out_of_the_main_file() {
        let dir = tempdir().unwrap();
        let engine = Engine::start(Config::new(dir.path()).page_size(1024)).unwrap();
        let mut pager = engine.pager();

        let mut table = BTreeTable::new(1, &mut pager);
        table.insert(&Record::new(1, vec![0xCC; 16])).unwrap();
        pager.flush().unwrap();

        // Flushed to the WAL, but the main file still holds the empty root.
        assert_eq!(engine.wal().db_file().file_change_counter(), 1);

        engine.wal().checkpoint().unwrap();

        assert_eq!(engine.wal().db_file().file_change_counter(), 2);
    }
}

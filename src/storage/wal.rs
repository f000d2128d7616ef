//! # Write-Ahead Log
//!
//! The WAL buffers page writes in memory and appends them as frames to a side
//! file named `<dbpath>-wal`. Reads are served buffer-first, so a page that
//! has been written but not checkpointed shadows the copy in the main file.
//! A checkpoint flushes the buffered pages into the [`DbFile`] and resets the
//! append position; the buffer is retained so reads keep hitting it.
//!
//! ## WAL File Header (32 bytes, big-endian)
//!
//! ```text
//! Offset  Size  Field               Description
//! ------  ----  ------------------  ------------------------------------
//! 0       4     magic               0x377f0682
//! 4       4     format_version      3007000
//! 8       4     page_size           Database page size
//! 12      4     checkpoint_number   Incremented on every header write
//! 16      4     salt1               Random, regenerated per header write
//! 20      4     salt2               Random, regenerated per header write
//! 24      8     checksum            CRC64 of the first 24 bytes
//! ```
//!
//! ## Frame Format (24-byte header + one page body)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  -----------------------------------------
//! 0       4     page_number  Which page this frame carries
//! 4       4     commit       Nonzero on the last frame of a batch
//! 8       4     salt1        Copied from the WAL header
//! 12      4     salt2        Copied from the WAL header
//! 16      8     checksum     Cumulative s0/s1 checksum through this frame
//! ```
//!
//! The cumulative checksum runs over the WAL header's first 24 bytes, then
//! each frame's first 8 header bytes followed by its page body. It is written
//! on every frame but never verified on reopen; crash consistency of a
//! partially written WAL is outside the current contract.
//!
//! ## Write Protocol
//!
//! 1. Take the write lock
//! 2. If the append position is 0, start a new WAL generation: bump the
//!    checkpoint number, regenerate both salts, write and sync the header
//! 3. For each page, in order: copy its bytes into the buffer, bump the page
//!    count, append a frame and sync it
//! 4. Only the last frame of the batch carries the commit flag
//!
//! ## Thread Safety
//!
//! `Wal` is `Send + Sync`. Reads take the read lock and never block behind
//! other readers; `write` and `checkpoint` serialize on the write lock.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use crc::{Crc, CRC_64_ECMA_182};
use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;
use zerocopy::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{DbFile, Page, PageFile, PageReader, PageWriter};
use crate::config::{
    WAL_FILE_SUFFIX, WAL_FORMAT_VERSION, WAL_FRAME_CHECKSUM_LEN, WAL_FRAME_HEADER_SIZE,
    WAL_HEADER_CHECKSUM_LEN, WAL_HEADER_SIZE, WAL_MAGIC,
};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct WalHeader {
    magic: U32,
    format_version: U32,
    page_size: U32,
    checkpoint_number: U32,
    salt1: U32,
    salt2: U32,
    checksum: U64,
}

const _: () = assert!(std::mem::size_of::<WalHeader>() == WAL_HEADER_SIZE);

impl WalHeader {
    fn new(page_size: u32, checkpoint_number: u32, salt1: u32, salt2: u32) -> Self {
        let mut header = Self {
            magic: U32::new(WAL_MAGIC),
            format_version: U32::new(WAL_FORMAT_VERSION),
            page_size: U32::new(page_size),
            checkpoint_number: U32::new(checkpoint_number),
            salt1: U32::new(salt1),
            salt2: U32::new(salt2),
            checksum: U64::new(0),
        };
        header.checksum = U64::new(header.compute_checksum());
        header
    }

    /// CRC64 over the first 24 bytes of the header.
    pub fn compute_checksum(&self) -> u64 {
        CRC64.checksum(&self.as_bytes()[..WAL_HEADER_CHECKSUM_LEN])
    }

    pub fn checksum(&self) -> u64 {
        self.checksum.get()
    }

    pub fn magic(&self) -> u32 {
        self.magic.get()
    }

    pub fn checkpoint_number(&self) -> u32 {
        self.checkpoint_number.get()
    }

    pub fn salt1(&self) -> u32 {
        self.salt1.get()
    }

    pub fn salt2(&self) -> u32 {
        self.salt2.get()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct WalFrameHeader {
    page_number: U32,
    commit: U32,
    salt1: U32,
    salt2: U32,
    checksum1: U32,
    checksum2: U32,
}

const _: () = assert!(std::mem::size_of::<WalFrameHeader>() == WAL_FRAME_HEADER_SIZE);

impl WalFrameHeader {
    fn new(page_number: u32, commit: bool, salt1: u32, salt2: u32) -> Self {
        Self {
            page_number: U32::new(page_number),
            commit: U32::new(if commit { 1 } else { 0 }),
            salt1: U32::new(salt1),
            salt2: U32::new(salt2),
            checksum1: U32::new(0),
            checksum2: U32::new(0),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number.get()
    }

    pub fn is_commit(&self) -> bool {
        self.commit.get() != 0
    }

    pub fn salt1(&self) -> u32 {
        self.salt1.get()
    }

    pub fn salt2(&self) -> u32 {
        self.salt2.get()
    }

    pub fn checksum(&self) -> (u32, u32) {
        (self.checksum1.get(), self.checksum2.get())
    }
}

/// Folds `data` into the rolling (s0, s1) checksum, 8 bytes at a time.
///
/// The chunk count must be odd; both inputs the WAL feeds it (the 24-byte
/// header prefix, and an 8-byte frame prefix plus a power-of-two page body)
/// satisfy that by construction.
pub fn running_checksum(data: &[u8], mut s0: u32, mut s1: u32) -> Result<(u32, u32)> {
    let chunks = data.len() >> 3;
    ensure!(
        data.len() % 8 == 0 && chunks % 2 == 1,
        "running checksum requires an odd multiple of 8 bytes, got {}",
        data.len()
    );

    for chunk in data.chunks_exact(8) {
        let a = u32::from_be_bytes(chunk[..4].try_into().unwrap()); // INVARIANT: chunks_exact yields 8 bytes
        let b = u32::from_be_bytes(chunk[4..].try_into().unwrap());
        s0 = s0.wrapping_add(a).wrapping_add(s1);
        s1 = s1.wrapping_add(b).wrapping_add(s0);
    }

    Ok((s0, s1))
}

/// Fresh salt pair for one WAL generation. Salts only need to distinguish
/// the current generation's frames from stale frames of a prior one, so the
/// wall clock run through a 64-bit finalizer is plenty; folding in the
/// checkpoint number keeps consecutive generations apart even on a coarse
/// clock, and the constant offset keeps the two salts of one header apart.
fn generate_salts(checkpoint_number: u32) -> (u32, u32) {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    let seed = nanos ^ (u64::from(checkpoint_number) << 56);

    (
        mix64(seed) as u32,
        mix64(seed ^ 0x9e37_79b9_7f4a_7c15) as u32,
    )
}

// SplitMix64 finalizer.
fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[derive(Debug)]
pub struct Wal {
    db_file: DbFile,
    path: PathBuf,
    state: RwLock<WalState>,
}

#[derive(Debug)]
struct WalState {
    file: File,
    checkpoint_number: u32,
    salt1: u32,
    salt2: u32,
    pos: u64,
    checksum: (u32, u32),
    total_pages: u32,
    buffer: HashMap<u32, Vec<u8>>,
}

impl Wal {
    /// Opens (creating if absent) the log file next to the database file.
    pub fn open(db_file: DbFile) -> Result<Self> {
        let mut os_path = db_file.path().as_os_str().to_os_string();
        os_path.push(WAL_FILE_SUFFIX);
        let path = PathBuf::from(os_path);

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open WAL file '{}'", path.display()))?;

        let total_pages = db_file.total_pages();

        Ok(Self {
            db_file,
            path,
            state: RwLock::new(WalState {
                file,
                checkpoint_number: 0,
                salt1: 0,
                salt2: 0,
                pos: 0,
                checksum: (0, 0),
                total_pages,
                buffer: HashMap::new(),
            }),
        })
    }

    pub fn db_file(&self) -> &DbFile {
        &self.db_file
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Flushes every buffered page into the database file and resets the
    /// append position, starting a new WAL generation on the next write.
    /// The buffer is retained so reads keep being served from it.
    pub fn checkpoint(&self) -> Result<()> {
        let mut state = self.state.write();

        let mut pages: SmallVec<[Page; 8]> = state
            .buffer
            .iter()
            .map(|(&page_number, data)| Page::new(page_number, data.clone()))
            .collect();
        // The buffer iterates in arbitrary order; ascending page numbers keep
        // the gap check in DbFile::write satisfied.
        pages.sort_by_key(|p| p.page_number);

        debug!(pages = pages.len(), "checkpointing WAL buffer");

        if !pages.is_empty() {
            self.db_file.write(&pages)?;
        }

        state.pos = 0;

        Ok(())
    }
}

impl WalState {
    fn write_header(&mut self, page_size: usize) -> Result<()> {
        self.checkpoint_number += 1;
        let (salt1, salt2) = generate_salts(self.checkpoint_number);
        self.salt1 = salt1;
        self.salt2 = salt2;

        let header = WalHeader::new(
            page_size as u32,
            self.checkpoint_number,
            self.salt1,
            self.salt2,
        );
        let bytes = header.as_bytes();

        self.file
            .write_all_at(bytes, 0)
            .wrap_err("failed to write WAL header")?;
        self.file
            .sync_all()
            .wrap_err("failed to sync WAL header")?;

        self.checksum = running_checksum(&bytes[..WAL_HEADER_CHECKSUM_LEN], 0, 0)?;
        self.pos = WAL_HEADER_SIZE as u64;

        Ok(())
    }

    fn write_frame(&mut self, page_number: u32, data: &[u8], commit: bool) -> Result<()> {
        let mut header = WalFrameHeader::new(page_number, commit, self.salt1, self.salt2);

        let mut covered = Vec::with_capacity(WAL_FRAME_CHECKSUM_LEN + data.len());
        covered.extend_from_slice(&header.as_bytes()[..WAL_FRAME_CHECKSUM_LEN]);
        covered.extend_from_slice(data);

        let (s0, s1) = running_checksum(&covered, self.checksum.0, self.checksum.1)?;
        self.checksum = (s0, s1);
        header.checksum1 = U32::new(s0);
        header.checksum2 = U32::new(s1);

        self.file
            .write_all_at(header.as_bytes(), self.pos)
            .wrap_err("failed to write WAL frame header")?;
        self.file
            .write_all_at(data, self.pos + WAL_FRAME_HEADER_SIZE as u64)
            .wrap_err("failed to write WAL frame body")?;
        self.file
            .sync_all()
            .wrap_err("failed to sync WAL frame")?;

        self.pos += (WAL_FRAME_HEADER_SIZE + data.len()) as u64;

        Ok(())
    }
}

impl PageReader for Wal {
    fn read(&self, page_number: u32) -> Result<Vec<u8>> {
        let state = self.state.read();

        // Buffered pages shadow the main file; hand out a defensive copy so
        // callers cannot mutate the buffer through the returned bytes.
        if let Some(data) = state.buffer.get(&page_number) {
            return Ok(data.clone());
        }
        drop(state);

        self.db_file.read(page_number)
    }
}

impl PageWriter for Wal {
    fn write(&self, pages: &[Page]) -> Result<()> {
        let mut state = self.state.write();
        let page_size = self.db_file.page_size();

        // Append position 0 means a fresh WAL generation: the header goes
        // out first with new salts and a bumped checkpoint number.
        if state.pos == 0 {
            state.write_header(page_size)?;
        }

        for (i, page) in pages.iter().enumerate() {
            ensure!(
                page.data.len() == page_size,
                "page {} has {} bytes, expected {}",
                page.page_number,
                page.data.len(),
                page_size
            );

            let data = page.data.clone();
            state.buffer.insert(page.page_number, data.clone());

            if page.page_number > state.total_pages {
                state.total_pages = page.page_number;
            }

            let commit = i == pages.len() - 1;
            state.write_frame(page.page_number, &data, commit)?;
        }

        Ok(())
    }
}

impl PageFile for Wal {
    fn page_size(&self) -> usize {
        self.db_file.page_size()
    }

    fn total_pages(&self) -> u32 {
        self.state.read().total_pages
    }
}

//! # LitDB Layout Constants
//!
//! This module holds every constant that describes the on-disk format. The
//! format follows the SQLite page-format family: a 100-byte database header
//! embedded in page 1, big-endian b-tree page headers, and a side write-ahead
//! log of full-page frames.
//!
//! ## Dependency Graph
//!
//! ```text
//! page size (per database, >= MIN_PAGE_SIZE, power of two)
//!       │
//!       ├─> DB_HEADER_SIZE (100 bytes, page 1 only)
//!       │     Page 1's b-tree content starts at offset 100; every other
//!       │     page starts at offset 0.
//!       │
//!       ├─> LEAF_HEADER_SIZE (8) / INTERIOR_HEADER_SIZE (12)
//!       │     Interior pages carry a 4-byte right-most child pointer.
//!       │
//!       └─> WAL frame size (WAL_FRAME_HEADER_SIZE + page size)
//!             Each WAL frame is a 24-byte header plus one full page body.
//!
//! WAL_HEADER_SIZE (32)
//!       │
//!       └─> The first 24 bytes are covered by a CRC64 stored in the
//!           final 8 bytes, and seed the cumulative frame checksum.
//! ```
//!
//! ## Usage
//!
//! Import constants from this module rather than redefining them locally:
//!
//! ```ignore
//! use litdb::config::{DB_HEADER_SIZE, MIN_PAGE_SIZE};
//! ```

// ============================================================================
// DATABASE FILE LAYOUT
// ============================================================================

/// Size of the database header embedded at the start of page 1.
pub const DB_HEADER_SIZE: usize = 100;

/// Smallest page size a database may be created with.
pub const MIN_PAGE_SIZE: usize = 1024;

/// Largest page size the 2-byte header field can represent (encoded as 1).
pub const MAX_PAGE_SIZE: usize = 65536;

/// Page size used when no explicit configuration is given.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Main database file name inside the data directory.
pub const DB_FILE_NAME: &str = "lit.db";

/// Suffix appended to the main file path to form the WAL file path.
pub const WAL_FILE_SUFFIX: &str = "-wal";

const _: () = assert!(MIN_PAGE_SIZE.is_power_of_two());
const _: () = assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
const _: () = assert!(MIN_PAGE_SIZE > DB_HEADER_SIZE);

// ============================================================================
// B-TREE PAGE LAYOUT
// ============================================================================

/// Header length of a leaf page.
pub const LEAF_HEADER_SIZE: usize = 8;

/// Header length of an interior page (leaf header + right-most child pointer).
pub const INTERIOR_HEADER_SIZE: usize = 12;

/// Width of one entry in the cell pointer array.
pub const CELL_POINTER_SIZE: usize = 2;

/// Encoded size of an interior table cell (left child + key).
pub const INTERIOR_CELL_SIZE: usize = 8;

const _: () = assert!(INTERIOR_HEADER_SIZE == LEAF_HEADER_SIZE + 4);

// ============================================================================
// WRITE-AHEAD LOG LAYOUT
// ============================================================================

/// Magic number identifying a WAL file.
pub const WAL_MAGIC: u32 = 0x377f_0682;

/// WAL file format version.
pub const WAL_FORMAT_VERSION: u32 = 3_007_000;

/// Size of the WAL file header.
pub const WAL_HEADER_SIZE: usize = 32;

/// Size of the per-frame header preceding each page body in the WAL.
pub const WAL_FRAME_HEADER_SIZE: usize = 24;

/// Length of the WAL header prefix covered by checksums.
pub const WAL_HEADER_CHECKSUM_LEN: usize = 24;

/// Length of the frame header prefix folded into the cumulative checksum.
pub const WAL_FRAME_CHECKSUM_LEN: usize = 8;

const _: () = assert!(WAL_HEADER_CHECKSUM_LEN < WAL_HEADER_SIZE);
const _: () = assert!(WAL_FRAME_CHECKSUM_LEN < WAL_FRAME_HEADER_SIZE);

// The cumulative checksum walks 8-byte chunks and requires an odd chunk
// count per input. The header prefix is 3 chunks; a frame prefix plus any
// power-of-two page body of at least MIN_PAGE_SIZE is 1 + page_size/8 chunks,
// odd because page_size/8 is even for every permitted page size.
const _: () = assert!(WAL_HEADER_CHECKSUM_LEN / 8 % 2 == 1);
const _: () = assert!((WAL_FRAME_CHECKSUM_LEN + MIN_PAGE_SIZE) / 8 % 2 == 1);

// ============================================================================
// RECORD ENCODING
// ============================================================================

/// Largest encoded length of a single varint.
pub const MAX_VARINT_LEN: usize = 9;

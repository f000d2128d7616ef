//! # LitDB Configuration Module
//!
//! This module centralizes the on-disk layout constants for LitDB. The page
//! format, database header and WAL framing are fixed-size structures whose
//! sizes depend on one another; co-locating the constants and pinning the
//! relationships with compile-time assertions keeps them from drifting apart.
//!
//! ## Module Organization
//!
//! - [`constants`]: All layout values with dependency documentation

pub mod constants;
pub use constants::*;

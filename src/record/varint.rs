//! # Variable-Length Integer Encoding
//!
//! Compact encoding for the unsigned integers carried in record cells,
//! following the SQLite family's varint scheme: big-endian groups of 7 bits,
//! high bit set on every byte except the last. Small values dominate (payload
//! lengths and row ids), so the common case is a single byte.
//!
//! ```text
//! Bytes  Payload bits  Range
//! 1      7             0..=0x7f
//! 2      14            ..=0x3fff
//! ...
//! 8      56            ..=0x00ff_ffff_ffff_ffff
//! 9      64            full u64 (ninth byte carries 8 literal bits)
//! ```
//!
//! An encoding never runs past nine bytes: after eight continuation bytes the
//! ninth is taken whole, so `u64::MAX` is exactly `[0xff; 9]`.

use eyre::{ensure, Result};

use crate::config::MAX_VARINT_LEN;

pub fn varint_len(value: u64) -> usize {
    let mut len = 1;
    let mut rest = value >> 7;

    while rest != 0 && len < 8 {
        len += 1;
        rest >>= 7;
    }

    if rest != 0 {
        MAX_VARINT_LEN
    } else {
        len
    }
}

pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    // More than 56 bits of payload: eight continuation bytes, then the low
    // eight bits land in the ninth byte verbatim.
    if value > 0x00ff_ffff_ffff_ffff {
        buf[8] = value as u8;
        let mut rest = value >> 8;
        for slot in buf[..8].iter_mut().rev() {
            *slot = (rest as u8 & 0x7f) | 0x80;
            rest >>= 7;
        }
        return MAX_VARINT_LEN;
    }

    let mut groups = [0u8; 8];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7f) as u8;
        rest >>= 7;
        count += 1;
        if rest == 0 {
            break;
        }
    }

    for i in 0..count {
        let group = groups[count - 1 - i];
        buf[i] = if i == count - 1 { group } else { group | 0x80 };
    }

    count
}

pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    ensure!(!buf.is_empty(), "empty buffer for varint decode");

    let mut value: u64 = 0;
    let prefix = buf.len().min(8);

    for (i, &byte) in buf[..prefix].iter().enumerate() {
        value = (value << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    ensure!(
        buf.len() > 8,
        "truncated varint: continuation past {} bytes",
        buf.len()
    );

    value = (value << 8) | buf[8] as u64;
    Ok((value, MAX_VARINT_LEN))
}

//! Low-level wire types and constants.
//!
//! This module defines:
//! - flag bits for every message class, the message key and each container
//! - the variable-length integer encodings RWF uses for lengths
//!   (`u15rb`, `u16ob`, `u30rb`)
//! - trimmed big-endian integers used for Int/UInt/Real content
//! - `Reader`, a bounds-checked cursor over an encoded buffer
//!
//! The actual encode/decode logic lives in `primitive_codec`,
//! `container_codec` and `msg_codec`.

use bytes::{BufMut, BytesMut};

use crate::error::CodecError;

/// Largest value a `u15rb` can carry.
pub const MAX_U15: usize = 0x7FFF;

/// Largest value a `u16ob` can carry.
pub const MAX_U16: usize = 0xFFFF;

/// Largest value a `u30rb` can carry.
pub const MAX_U30: u32 = 0x3FFF_FFFF;

/// Deepest container nesting the decoder follows.
pub const MAX_NESTING_DEPTH: usize = 16;

// ============================================================================
// Message flags
// ============================================================================

pub mod request_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_PRIORITY: u16 = 0x0002;
    pub const STREAMING: u16 = 0x0004;
    pub const MSG_KEY_IN_UPDATES: u16 = 0x0008;
    pub const CONF_INFO_IN_UPDATES: u16 = 0x0010;
    pub const NO_REFRESH: u16 = 0x0020;
    pub const HAS_QOS: u16 = 0x0040;
    pub const HAS_WORST_QOS: u16 = 0x0080;
    pub const PRIVATE_STREAM: u16 = 0x0100;
    pub const PAUSE: u16 = 0x0200;
    pub const HAS_VIEW: u16 = 0x0400;
    pub const HAS_BATCH: u16 = 0x0800;
    pub const QUALIFIED_STREAM: u16 = 0x1000;
}

pub mod refresh_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_PERM_DATA: u16 = 0x0002;
    pub const HAS_MSG_KEY: u16 = 0x0008;
    pub const HAS_SEQ_NUM: u16 = 0x0010;
    pub const SOLICITED: u16 = 0x0020;
    pub const REFRESH_COMPLETE: u16 = 0x0040;
    pub const HAS_QOS: u16 = 0x0080;
    pub const CLEAR_CACHE: u16 = 0x0100;
    pub const DO_NOT_CACHE: u16 = 0x0200;
    pub const PRIVATE_STREAM: u16 = 0x0400;
    pub const HAS_POST_USER_INFO: u16 = 0x0800;
    pub const HAS_PART_NUM: u16 = 0x1000;
    pub const HAS_REQ_MSG_KEY: u16 = 0x2000;
    pub const QUALIFIED_STREAM: u16 = 0x4000;
}

pub mod update_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_PERM_DATA: u16 = 0x0002;
    pub const HAS_MSG_KEY: u16 = 0x0008;
    pub const HAS_SEQ_NUM: u16 = 0x0010;
    pub const HAS_CONF_INFO: u16 = 0x0020;
    pub const DO_NOT_CACHE: u16 = 0x0040;
    pub const DO_NOT_CONFLATE: u16 = 0x0080;
    pub const DO_NOT_RIPPLE: u16 = 0x0100;
    pub const HAS_POST_USER_INFO: u16 = 0x0200;
    pub const DISCARDABLE: u16 = 0x0400;
}

pub mod status_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_PERM_DATA: u16 = 0x0002;
    pub const HAS_MSG_KEY: u16 = 0x0008;
    pub const HAS_GROUP_ID: u16 = 0x0010;
    pub const HAS_STATE: u16 = 0x0020;
    pub const CLEAR_CACHE: u16 = 0x0040;
    pub const PRIVATE_STREAM: u16 = 0x0080;
    pub const HAS_POST_USER_INFO: u16 = 0x0100;
    pub const HAS_REQ_MSG_KEY: u16 = 0x0200;
    pub const QUALIFIED_STREAM: u16 = 0x0400;
}

pub mod close_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const ACK: u16 = 0x0002;
    pub const HAS_BATCH: u16 = 0x0004;
}

pub mod ack_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_TEXT: u16 = 0x0002;
    pub const PRIVATE_STREAM: u16 = 0x0004;
    pub const HAS_SEQ_NUM: u16 = 0x0008;
    pub const HAS_MSG_KEY: u16 = 0x0010;
    pub const HAS_NAK_CODE: u16 = 0x0020;
    pub const QUALIFIED_STREAM: u16 = 0x0040;
}

pub mod generic_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_PERM_DATA: u16 = 0x0002;
    pub const HAS_MSG_KEY: u16 = 0x0004;
    pub const HAS_SEQ_NUM: u16 = 0x0008;
    pub const MESSAGE_COMPLETE: u16 = 0x0010;
    pub const HAS_SECONDARY_SEQ_NUM: u16 = 0x0020;
    pub const HAS_PART_NUM: u16 = 0x0040;
    pub const HAS_REQ_MSG_KEY: u16 = 0x0080;
    pub const PROVIDER_DRIVEN: u16 = 0x0100;
}

pub mod post_flags {
    pub const HAS_EXTENDED_HEADER: u16 = 0x0001;
    pub const HAS_POST_ID: u16 = 0x0002;
    pub const HAS_MSG_KEY: u16 = 0x0004;
    pub const HAS_SEQ_NUM: u16 = 0x0008;
    pub const POST_COMPLETE: u16 = 0x0020;
    pub const ACK: u16 = 0x0040;
    pub const HAS_PERM_DATA: u16 = 0x0080;
    pub const HAS_PART_NUM: u16 = 0x0100;
    pub const HAS_POST_USER_RIGHTS: u16 = 0x0200;
}

pub mod key_flags {
    pub const HAS_SERVICE_ID: u16 = 0x0001;
    pub const HAS_NAME: u16 = 0x0002;
    pub const HAS_NAME_TYPE: u16 = 0x0004;
    pub const HAS_FILTER: u16 = 0x0008;
    pub const HAS_IDENTIFIER: u16 = 0x0010;
    pub const HAS_ATTRIB: u16 = 0x0020;
}

// ============================================================================
// Container flags
// ============================================================================

pub mod field_list_flags {
    pub const HAS_FIELD_LIST_INFO: u8 = 0x01;
    pub const HAS_SET_DATA: u8 = 0x02;
    pub const HAS_SET_ID: u8 = 0x04;
    pub const HAS_STANDARD_DATA: u8 = 0x08;
}

pub mod element_list_flags {
    pub const HAS_ELEMENT_LIST_INFO: u8 = 0x01;
    pub const HAS_SET_DATA: u8 = 0x02;
    pub const HAS_SET_ID: u8 = 0x04;
    pub const HAS_STANDARD_DATA: u8 = 0x08;
}

pub mod map_flags {
    pub const HAS_SET_DEFS: u8 = 0x01;
    pub const HAS_SUMMARY_DATA: u8 = 0x02;
    pub const HAS_PER_ENTRY_PERM_DATA: u8 = 0x04;
    pub const HAS_TOTAL_COUNT_HINT: u8 = 0x08;
    pub const HAS_KEY_FIELD_ID: u8 = 0x10;
}

pub mod vector_flags {
    pub const HAS_SET_DEFS: u8 = 0x01;
    pub const HAS_SUMMARY_DATA: u8 = 0x02;
    pub const HAS_PER_ENTRY_PERM_DATA: u8 = 0x04;
    pub const HAS_TOTAL_COUNT_HINT: u8 = 0x08;
    pub const SUPPORTS_SORTING: u8 = 0x10;
}

pub mod series_flags {
    pub const HAS_SET_DEFS: u8 = 0x01;
    pub const HAS_SUMMARY_DATA: u8 = 0x02;
    pub const HAS_TOTAL_COUNT_HINT: u8 = 0x04;
}

pub mod filter_list_flags {
    pub const HAS_PER_ENTRY_PERM_DATA: u8 = 0x01;
    pub const HAS_TOTAL_COUNT_HINT: u8 = 0x02;
}

/// Per-entry flags, stored in the high nibble of the action byte.
pub mod entry_flags {
    pub const HAS_PERM_DATA: u8 = 0x01;
    /// FilterList entries only.
    pub const HAS_CONTAINER_TYPE: u8 = 0x02;
}

/// Pack an entry action and its flags into one byte.
pub fn action_byte(action: u8, flags: u8) -> u8 {
    (action & 0x0F) | (flags << 4)
}

/// Split an action byte into `(action, flags)`.
pub fn split_action_byte(b: u8) -> (u8, u8) {
    (b & 0x0F, b >> 4)
}

// ============================================================================
// Writers
// ============================================================================

pub fn put_u15rb(out: &mut BytesMut, v: usize, field: &'static str) -> Result<(), CodecError> {
    if v < 0x80 {
        out.put_u8(v as u8);
    } else if v <= MAX_U15 {
        out.put_u8(((v >> 8) as u8) | 0x80);
        out.put_u8(v as u8);
    } else {
        return Err(CodecError::ValueTooLarge {
            field,
            value: v as u64,
        });
    }
    Ok(())
}

pub fn put_u16ob(out: &mut BytesMut, v: usize, field: &'static str) -> Result<(), CodecError> {
    if v < 0xFE {
        out.put_u8(v as u8);
    } else if v <= MAX_U16 {
        out.put_u8(0xFE);
        out.put_u16(v as u16);
    } else {
        return Err(CodecError::ValueTooLarge {
            field,
            value: v as u64,
        });
    }
    Ok(())
}

pub fn put_u30rb(out: &mut BytesMut, v: u32, field: &'static str) -> Result<(), CodecError> {
    if v < 0x40 {
        out.put_u8(v as u8);
    } else if v < 0x4000 {
        out.put_u16(v as u16 | 0x4000);
    } else if v < 0x40_0000 {
        out.put_u8(((v >> 16) as u8) | 0x80);
        out.put_u16(v as u16);
    } else if v <= MAX_U30 {
        out.put_u32(v | 0xC000_0000);
    } else {
        return Err(CodecError::ValueTooLarge {
            field,
            value: v as u64,
        });
    }
    Ok(())
}

/// One-byte length followed by the bytes.
pub fn put_buf8(out: &mut BytesMut, b: &[u8], field: &'static str) -> Result<(), CodecError> {
    if b.len() > u8::MAX as usize {
        return Err(CodecError::ValueTooLarge {
            field,
            value: b.len() as u64,
        });
    }
    out.put_u8(b.len() as u8);
    out.put_slice(b);
    Ok(())
}

/// `u15rb` length followed by the bytes.
pub fn put_buf15(out: &mut BytesMut, b: &[u8], field: &'static str) -> Result<(), CodecError> {
    put_u15rb(out, b.len(), field)?;
    out.put_slice(b);
    Ok(())
}

/// `u16ob` length followed by the bytes.
pub fn put_buf16(out: &mut BytesMut, b: &[u8], field: &'static str) -> Result<(), CodecError> {
    put_u16ob(out, b.len(), field)?;
    out.put_slice(b);
    Ok(())
}

/// Big-endian two's complement using as few bytes as still sign-extend
/// back to `v` (at least one).
pub fn put_int_trimmed(out: &mut BytesMut, v: i64) {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let b = bytes[start];
        let next_high = bytes[start + 1] & 0x80;
        if (b == 0x00 && next_high == 0) || (b == 0xFF && next_high != 0) {
            start += 1;
        } else {
            break;
        }
    }
    out.put_slice(&bytes[start..]);
}

/// Big-endian unsigned using as few bytes as possible (at least one).
pub fn put_uint_trimmed(out: &mut BytesMut, v: u64) {
    let bytes = v.to_be_bytes();
    let start = bytes.iter().take(7).take_while(|&&b| b == 0).count();
    out.put_slice(&bytes[start..]);
}

/// Sign-extend 1..=8 big-endian bytes.
pub fn read_int_be(b: &[u8]) -> Result<i64, CodecError> {
    if b.is_empty() || b.len() > 8 {
        return Err(CodecError::InvalidData("integer length"));
    }
    let mut v: i64 = if b[0] & 0x80 != 0 { -1 } else { 0 };
    for &byte in b {
        v = (v << 8) | byte as i64;
    }
    Ok(v)
}

/// Zero-extend 1..=8 big-endian bytes.
pub fn read_uint_be(b: &[u8]) -> Result<u64, CodecError> {
    if b.is_empty() || b.len() > 8 {
        return Err(CodecError::InvalidData("integer length"));
    }
    Ok(b.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64))
}

// ============================================================================
// Reader
// ============================================================================

/// Bounds-checked cursor over an encoded buffer. Every read that runs
/// past the end fails with `CodecError::Incomplete`.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Incomplete);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Everything not yet read.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    pub fn skip_to(&mut self, pos: usize) -> Result<(), CodecError> {
        if pos > self.buf.len() || pos < self.pos {
            return Err(CodecError::Incomplete);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16, CodecError> {
        Ok(self.u16()? as i16)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.u32()? as i32)
    }

    pub fn u15rb(&mut self) -> Result<u16, CodecError> {
        let first = self.u8()?;
        if first & 0x80 == 0 {
            Ok(first as u16)
        } else {
            let second = self.u8()?;
            Ok((((first & 0x7F) as u16) << 8) | second as u16)
        }
    }

    pub fn u16ob(&mut self) -> Result<u16, CodecError> {
        match self.u8()? {
            0xFE => self.u16(),
            0xFF => Err(CodecError::InvalidData("u16ob prefix")),
            b => Ok(b as u16),
        }
    }

    pub fn u30rb(&mut self) -> Result<u32, CodecError> {
        let first = self.u8()?;
        let extra = (first >> 6) as usize;
        let mut v = (first & 0x3F) as u32;
        for b in self.bytes(extra)? {
            v = (v << 8) | *b as u32;
        }
        Ok(v)
    }

    pub fn buf8(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u8()? as usize;
        self.bytes(len)
    }

    pub fn buf15(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u15rb()? as usize;
        self.bytes(len)
    }

    pub fn buf16(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u16ob()? as usize;
        self.bytes(len)
    }
}

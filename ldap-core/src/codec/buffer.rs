/*
    This file is part of Donet.

    Copyright © 2024 Max Rodriguez <me@maxrdz.com>

    Donet is free software; you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License,
    as published by the Free Software Foundation, either version 3
    of the License, or (at your option) any later version.

    Donet is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public
    License along with Donet. If not, see <https://www.gnu.org/licenses/>.
*/

//! Bounds-checked BER buffer writer, used by [`crate::codec::repl_entry`]
//! to build the wire payload of a replicated-entry extended operation.
//!
//! The writer builds tag/length/value structures bottom-up: encode the
//! contents of a SEQUENCE or SET into a child [`BerWriter`], then wrap it
//! with [`BerWriter::write_constructed`] in the parent. This keeps every
//! length a definite, precomputed value, so there is no backpatching.

use thiserror::Error;

/// Upper bound on any single BER buffer this codec will build or accept.
/// Chosen generously above any plausible single-entry payload; its purpose
/// is to keep a malformed length field from driving an unbounded allocation.
pub const BER_SIZE_MAX: usize = 64 * 1024 * 1024;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0a;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

#[derive(Debug, Error, PartialEq)]
pub enum BerError {
    #[error("BER buffer overflow; {0}")]
    Overflow(&'static str),
    #[error("malformed BER; {0}")]
    Malformed(&'static str),
    #[error("end of buffer")]
    EndOfBuffer,
}

/// An in-progress BER-encoded buffer.
#[derive(Debug, Default, Clone)]
pub struct BerWriter {
    buffer: Vec<u8>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_add_length(&self, length: usize) -> Result<(), BerError> {
        if self.buffer.len() + length > BER_SIZE_MAX {
            return Err(BerError::Overflow("write would exceed BER_SIZE_MAX"));
        }
        Ok(())
    }

    /// Appends a definite-length header (tag already written by the
    /// caller is not assumed; this writes only the length octets).
    fn write_length(&mut self, len: usize) -> Result<(), BerError> {
        self.check_add_length(5)?;

        if len < 0x80 {
            self.buffer.push(len as u8);
        } else {
            let len_bytes = len.to_be_bytes();
            let first_nonzero = len_bytes.iter().position(|b| *b != 0).unwrap_or(len_bytes.len() - 1);
            let significant = &len_bytes[first_nonzero..];

            if significant.len() > 0x7f {
                return Err(BerError::Overflow("length too large to encode"));
            }
            self.buffer.push(0x80 | significant.len() as u8);
            self.buffer.extend_from_slice(significant);
        }
        Ok(())
    }

    /// Writes a primitive OCTET STRING.
    pub fn write_octet_string(&mut self, bytes: &[u8]) -> Result<(), BerError> {
        self.check_add_length(bytes.len() + 5)?;
        self.buffer.push(TAG_OCTET_STRING);
        self.write_length(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a BOOLEAN. Callers only write this when the field is not
    /// defaulting to false.
    pub fn write_boolean(&mut self, v: bool) -> Result<(), BerError> {
        self.check_add_length(3)?;
        self.buffer.push(TAG_BOOLEAN);
        self.write_length(1)?;
        self.buffer.push(if v { 0xff } else { 0x00 });
        Ok(())
    }

    /// Writes an ENUMERATED value (used for `CSNType`).
    pub fn write_enumerated(&mut self, v: u8) -> Result<(), BerError> {
        self.check_add_length(3)?;
        self.buffer.push(TAG_ENUMERATED);
        self.write_length(1)?;
        self.buffer.push(v);
        Ok(())
    }

    /// Wraps `body`'s already-encoded bytes in a constructed tag
    /// (`TAG_SEQUENCE` or `TAG_SET`), producing `tag { body }`.
    pub fn write_constructed(&mut self, tag: u8, body: &BerWriter) -> Result<(), BerError> {
        let bytes = body.as_bytes();
        self.check_add_length(bytes.len() + 5)?;
        self.buffer.push(tag);
        self.write_length(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Appends another writer's already-encoded bytes verbatim, with no
    /// additional tag/length wrapper. Used to concatenate sibling
    /// elements of a SEQUENCE OF / SET OF into the parent's body.
    pub fn append(&mut self, other: &BerWriter) -> Result<(), BerError> {
        self.check_add_length(other.buffer.len())?;
        self.buffer.extend_from_slice(&other.buffer);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

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

//! Bounds-checked, peek-tag-capable BER buffer reader.
//!
//! [`BerReader::read_constructed`] returns a fresh reader scoped to just
//! that element's content bytes, which is what lets callers iterate a
//! `SEQUENCE OF` / `SET OF` by looping `while sub.remaining() > 0`, and
//! what lets the decoder in [`crate::codec::repl_entry`] distinguish an
//! absent OPTIONAL field from a present one by peeking the next tag
//! before deciding whether to consume it.

use super::buffer::{BerError, TAG_BOOLEAN, TAG_ENUMERATED, TAG_OCTET_STRING};

/// A read-only cursor over a BER-encoded buffer.
#[derive(Debug, Clone)]
pub struct BerReader<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn check_read_length(&self, bytes: usize) -> Result<(), BerError> {
        if self.index + bytes > self.data.len() {
            return Err(BerError::EndOfBuffer);
        }
        Ok(())
    }

    /// Reads a definite-length header already positioned past the tag
    /// octet, returning the decoded content length.
    fn read_length(&mut self) -> Result<usize, BerError> {
        self.check_read_length(1)?;
        let first = self.data[self.index];
        self.index += 1;

        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let count = (first & 0x7f) as usize;
        if count == 0 {
            return Err(BerError::Malformed("indefinite-length encoding not supported"));
        }
        self.check_read_length(count)?;

        let mut len: usize = 0;
        for _ in 0..count {
            len = (len << 8) | self.data[self.index] as usize;
            self.index += 1;
        }
        Ok(len)
    }

    /// Returns the next tag octet without consuming it. Used to decide
    /// whether an OPTIONAL field is present.
    pub fn peek_tag(&self) -> Result<u8, BerError> {
        self.check_read_length(1)?;
        Ok(self.data[self.index])
    }

    /// Reads a tag octet and its definite-length header, returning
    /// `(tag, content_length)`. The cursor is left at the start of the
    /// content.
    pub fn read_tag_length(&mut self) -> Result<(u8, usize), BerError> {
        self.check_read_length(1)?;
        let tag = self.data[self.index];
        self.index += 1;
        let len = self.read_length()?;
        self.check_read_length(len)?;
        Ok((tag, len))
    }

    /// Reads a primitive OCTET STRING and returns its content bytes.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], BerError> {
        let (tag, len) = self.read_tag_length()?;
        if tag != TAG_OCTET_STRING {
            return Err(BerError::Malformed("expected OCTET STRING tag"));
        }
        let bytes = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(bytes)
    }

    pub fn read_boolean(&mut self) -> Result<bool, BerError> {
        let (tag, len) = self.read_tag_length()?;
        if tag != TAG_BOOLEAN || len != 1 {
            return Err(BerError::Malformed("expected BOOLEAN tag"));
        }
        let v = self.data[self.index] != 0;
        self.index += 1;
        Ok(v)
    }

    pub fn read_enumerated(&mut self) -> Result<u8, BerError> {
        let (tag, len) = self.read_tag_length()?;
        if tag != TAG_ENUMERATED || len != 1 {
            return Err(BerError::Malformed("expected ENUMERATED tag"));
        }
        let v = self.data[self.index];
        self.index += 1;
        Ok(v)
    }

    /// Reads a constructed element (expected to carry `expected_tag`)
    /// and returns a reader scoped to exactly its content bytes.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<BerReader<'a>, BerError> {
        let (tag, len) = self.read_tag_length()?;
        if tag != expected_tag {
            return Err(BerError::Malformed("unexpected constructed tag"));
        }
        let sub = &self.data[self.index..self.index + len];
        self.index += len;
        Ok(BerReader::new(sub))
    }
}

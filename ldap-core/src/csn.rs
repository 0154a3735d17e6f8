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

//! Change-Sequence Number: the totally ordered logical clock used for
//! replication conflict resolution.

use std::fmt;
use thiserror::Error;

/// A logical clock value. Total-ordered by lexicographic comparison of
/// `(tstamp, seqnum, rid, subseqnum)` — the derived [`Ord`] impl relies
/// on field declaration order matching that, so do not reorder the
/// fields below without checking [`Csn`]'s ordering tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Csn {
    pub tstamp: u64,
    pub seqnum: u16,
    pub rid: u16,
    pub subseqnum: u16,
}

#[derive(Debug, Error, PartialEq)]
pub enum CsnParseError {
    #[error("CSN string must be exactly 20 hex characters, got {0}")]
    WrongLength(usize),
    #[error("CSN string contains non-hex characters")]
    NotHex,
}

impl Csn {
    pub fn new(tstamp: u64, seqnum: u16, rid: u16, subseqnum: u16) -> Self {
        Self {
            tstamp,
            seqnum,
            rid,
            subseqnum,
        }
    }

    /// Parses the fixed-width canonical string form: 8 hex digits of
    /// `tstamp`, then 4 of `seqnum`, 4 of `rid`, 4 of `subseqnum`.
    pub fn parse(s: &str) -> Result<Self, CsnParseError> {
        if s.len() != 20 {
            return Err(CsnParseError::WrongLength(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CsnParseError::NotHex);
        }
        let tstamp = u64::from_str_radix(&s[0..8], 16).map_err(|_| CsnParseError::NotHex)?;
        let seqnum = u16::from_str_radix(&s[8..12], 16).map_err(|_| CsnParseError::NotHex)?;
        let rid = u16::from_str_radix(&s[12..16], 16).map_err(|_| CsnParseError::NotHex)?;
        let subseqnum = u16::from_str_radix(&s[16..20], 16).map_err(|_| CsnParseError::NotHex)?;

        Ok(Self {
            tstamp,
            seqnum,
            rid,
            subseqnum,
        })
    }
}

impl fmt::Display for Csn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}{:04x}{:04x}{:04x}",
            self.tstamp, self.seqnum, self.rid, self.subseqnum
        )
    }
}

/// On-the-wire tag values from the `AnnotatedCsn` grammar.
/// `AttributeDeleted` has no wire tag of its own; it is carried
/// out of band (see [`crate::attribute::Attribute::deletion_csn`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsnType {
    ValueUpdated,
    ValueDeleted,
    ValueDistinguished,
    AttributeDeleted,
}

impl CsnType {
    /// Returns the wire tag for the three enumerable types, or `None`
    /// for `AttributeDeleted`, which is never tagged on the wire.
    pub fn wire_tag(self) -> Option<u8> {
        match self {
            CsnType::ValueUpdated => Some(1),
            CsnType::ValueDeleted => Some(2),
            CsnType::ValueDistinguished => Some(3),
            CsnType::AttributeDeleted => None,
        }
    }

    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(CsnType::ValueUpdated),
            2 => Some(CsnType::ValueDeleted),
            3 => Some(CsnType::ValueDistinguished),
            _ => None,
        }
    }
}

/// A multimap from [`CsnType`] to [`Csn`], attached to a [`crate::value::Value`].
///
/// Invariants: at most one `AttributeDeleted`
/// entry (callers enforce this at the attribute level, not here); entries
/// are iterable in insertion order; [`CsnSet::purge`] drops everything
/// `<= up_to`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsnSet {
    entries: Vec<(CsnType, Csn)>,
}

impl CsnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: CsnType, csn: Csn) {
        self.entries.push((kind, csn));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CsnType, Csn)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, kind: CsnType) -> Option<Csn> {
        self.entries.iter().find(|(k, _)| *k == kind).map(|(_, c)| *c)
    }

    /// Drops every entry whose CSN is `<= up_to`.
    pub fn purge(&mut self, up_to: Csn) {
        self.entries.retain(|(_, csn)| *csn > up_to);
    }

    /// Returns a copy of this set with every `AttributeDeleted` entry
    /// removed — used by the replicated-entry encoder, which never
    /// serializes that type inside a value's CSN set.
    pub fn without_attribute_deleted(&self) -> CsnSet {
        CsnSet {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| *k != CsnType::AttributeDeleted)
                .cloned()
                .collect(),
        }
    }

    /// The supremum of every CSN in this set, if any.
    pub fn max(&self) -> Option<Csn> {
        self.entries.iter().map(|(_, c)| *c).max()
    }
}

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

//! nsuniqueid / entryUUID parsing and formatting.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum UuidParseError {
    #[error("uuid string must be 36 characters, got {0}")]
    WrongLength(usize),
    #[error("uuid string is missing a '-' at position {0}")]
    MissingDash(usize),
    #[error("uuid string contains non-hex characters")]
    NotHex,
}

/// A 16-byte globally-unique entry identifier, serialized as a dashed
/// hexadecimal UUID with dashes at positions 8-13-17-21.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid([u8; 16]);

const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

impl Uuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses the strict 32-hex-digit, 4-dash form.
    pub fn parse(s: &str) -> Result<Self, UuidParseError> {
        if s.len() != 36 {
            return Err(UuidParseError::WrongLength(s.len()));
        }
        let bytes = s.as_bytes();
        for pos in DASH_POSITIONS {
            if bytes[pos] != b'-' {
                return Err(UuidParseError::MissingDash(pos));
            }
        }

        let mut hex = String::with_capacity(32);
        for (i, b) in bytes.iter().enumerate() {
            if DASH_POSITIONS.contains(&i) {
                continue;
            }
            hex.push(*b as char);
        }
        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(UuidParseError::NotHex);
        }

        let mut out = [0u8; 16];
        for i in 0..16 {
            out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| UuidParseError::NotHex)?;
        }
        Ok(Self(out))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

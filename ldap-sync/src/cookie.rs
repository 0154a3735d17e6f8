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

//! Sync cookie parsing and formatting.
//!
//! A cookie is three `#`-separated fields: a server signature (the
//! server identity the cookie was issued by), a client signature (the
//! bind DN/base/filter the session was opened with), and the change
//! number the client has seen up to.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CookieParseError {
    #[error("cookie must have exactly three '#'-separated fields, got {0}")]
    WrongFieldCount(usize),
    #[error("change-info field is not a valid integer")]
    InvalidChangeInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub server_sig: String,
    pub client_sig: String,
    /// The change number the client has seen up to, or `-1` for a
    /// client that has not yet completed an initial refresh.
    pub change_info: i64,
}

impl Cookie {
    pub fn new(server_sig: impl Into<String>, client_sig: impl Into<String>, change_info: i64) -> Self {
        Self {
            server_sig: server_sig.into(),
            client_sig: client_sig.into(),
            change_info,
        }
    }

    pub fn parse(s: &str) -> Result<Self, CookieParseError> {
        let fields: Vec<&str> = s.split('#').collect();
        if fields.len() != 3 {
            return Err(CookieParseError::WrongFieldCount(fields.len()));
        }
        let change_info = fields[2]
            .parse::<i64>()
            .map_err(|_| CookieParseError::InvalidChangeInfo)?;
        Ok(Self {
            server_sig: fields[0].to_string(),
            client_sig: fields[1].to_string(),
            change_info,
        })
    }

    /// A client-presented cookie is valid against a session when both
    /// signatures match the session's own and the client's change
    /// number falls within `[-1, session.change_info]`.
    pub fn is_valid_for_session(&self, session_server_sig: &str, session_client_sig: &str, session_change_info: i64) -> bool {
        self.server_sig == session_server_sig
            && self.client_sig == session_client_sig
            && self.change_info >= -1
            && self.change_info <= session_change_info
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}#{}", self.server_sig, self.client_sig, self.change_info)
    }
}

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

//! LDAP result codes surfaced by the core.
//!
//! Mirrors the small type-alias-and-result-codes module the rest of this
//! workspace leans on for cross-crate error reporting, the way the
//! original codebase kept a single `globals`/`results` module backing
//! every other component.

/// Result codes this core can surface to a client or to an internal
/// caller. Not an exhaustive LDAPv3 result-code enumeration — only the
/// ones this core actually emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Success = 0,
    OperationsError = 1,
    ProtocolError = 2,
    TimeLimitExceeded = 3,
    AdminLimitExceeded = 11,
    InappropriateMatching = 18,
    ConstraintViolation = 19,
    TypeOrValueExists = 20,
    InvalidDnSyntax = 34,
    InappropriateAuthentication = 48,
    InsufficientAccess = 50,
    Busy = 51,
    UnwillingToPerform = 53,
    NoSuchObject = 32,
    AlreadyExists = 68,
    AffectsMultipleDSAs = 71,
    NamingViolation = 64,
    Referral = 10,
    /// `e-syncRefreshRequired`, the sync-specific result code returned
    /// when a client presents an invalid sync cookie.
    SyncRefreshRequired = 0x1000,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.as_i32())
    }
}

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

//! Content-sync refresh planning: turns a sync-request control plus a
//! client cookie into either an initial-content refresh or a delta
//! refresh over reduced change records.
//!
//! IO (fetching entries, walking the backend's change log) stays at the
//! call site — this module is pure policy over already-fetched records
//! so it can be exercised without a live backend.

use ldap_core::result_code::ResultCode;

use crate::cookie::{Cookie, CookieParseError};
use crate::reduction::{reduce, ReducedChange};
use ldap_backend::ChangeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    RefreshOnly,
    RefreshAndPersist,
}

impl RefreshMode {
    /// `syncRequestValue.mode` is an ENUMERATED with `refreshOnly (1)`
    /// and `refreshAndPersist (3)` as its only legal values here.
    pub fn from_enumerated(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::RefreshOnly),
            3 => Some(Self::RefreshAndPersist),
            _ => None,
        }
    }
}

pub struct RefreshRequest {
    pub mode: RefreshMode,
    pub cookie: Option<String>,
    pub reload_hint: bool,
}

pub enum RefreshOutcome {
    /// No client cookie: a normal search runs and every entry is sent
    /// with a `syncStateControl{state=add}`; no per-entry cookie.
    InitialContent,
    /// A valid client cookie: the reduced change set to replay.
    Delta(Vec<ReducedChange>),
    /// The cookie failed to parse or doesn't match this session;
    /// surfaces as `e-syncRefreshRequired`.
    CookieInvalid,
}

impl RefreshOutcome {
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            RefreshOutcome::CookieInvalid => Some(ResultCode::SyncRefreshRequired),
            _ => None,
        }
    }
}

/// Plans a refresh given the request, this session's signatures, and
/// its current change number. `records_since` is called only for a
/// valid delta-refresh cookie, with the client's change number as its
/// argument, and should return every change record after that point.
pub fn plan(
    request: &RefreshRequest,
    server_sig: &str,
    client_sig: &str,
    session_change_number: u64,
    records_since: impl FnOnce(i64) -> Vec<ChangeRecord>,
) -> RefreshOutcome {
    let Some(raw) = &request.cookie else {
        return RefreshOutcome::InitialContent;
    };
    let parsed: Result<Cookie, CookieParseError> = Cookie::parse(raw);
    match parsed {
        Ok(cookie) if cookie.is_valid_for_session(server_sig, client_sig, session_change_number as i64) => {
            let records = records_since(cookie.change_info);
            RefreshOutcome::Delta(reduce(&records))
        }
        _ => RefreshOutcome::CookieInvalid,
    }
}

/// Builds the cookie a session hands back to the client for its
/// current position in the change log.
pub fn server_cookie(server_sig: &str, client_sig: &str, change_number: u64) -> Cookie {
    Cookie::new(server_sig, client_sig, change_number as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_backend::ChangeOp;
    use ldap_core::csn::Csn;
    use ldap_core::dn::Dn;
    use ldap_core::uuid::Uuid;

    #[test]
    fn refresh_mode_rejects_unknown_enumerated_values() {
        assert_eq!(RefreshMode::from_enumerated(1), Some(RefreshMode::RefreshOnly));
        assert_eq!(RefreshMode::from_enumerated(3), Some(RefreshMode::RefreshAndPersist));
        assert_eq!(RefreshMode::from_enumerated(2), None);
    }

    #[test]
    fn no_cookie_is_initial_content() {
        let request = RefreshRequest {
            mode: RefreshMode::RefreshOnly,
            cookie: None,
            reload_hint: false,
        };
        let outcome = plan(&request, "srv", "cli", 10, |_| panic!("should not be called"));
        assert!(matches!(outcome, RefreshOutcome::InitialContent));
    }

    #[test]
    fn invalid_cookie_surfaces_sync_refresh_required() {
        let request = RefreshRequest {
            mode: RefreshMode::RefreshOnly,
            cookie: Some("srv#cli#999".into()),
            reload_hint: false,
        };
        let outcome = plan(&request, "srv", "cli", 10, |_| vec![]);
        assert!(matches!(outcome, RefreshOutcome::CookieInvalid));
        assert_eq!(outcome.result_code(), Some(ResultCode::SyncRefreshRequired));
    }

    #[test]
    fn valid_cookie_produces_a_reduced_delta() {
        let request = RefreshRequest {
            mode: RefreshMode::RefreshOnly,
            cookie: Some("srv#cli#1".into()),
            reload_hint: false,
        };
        let outcome = plan(&request, "srv", "cli", 5, |from| {
            assert_eq!(from, 1);
            vec![ChangeRecord {
                change_number: 2,
                entry_uuid: Uuid::from_bytes([9; 16]),
                op: ChangeOp::Add,
                dn: Dn::new("uid=new,o=example"),
                csn: Csn::new(2, 0, 1, 0),
            }]
        });
        match outcome {
            RefreshOutcome::Delta(changes) => assert_eq!(changes.len(), 1),
            _ => panic!("expected a delta refresh"),
        }
    }
}

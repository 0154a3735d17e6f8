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

//! Drives a memory backend's change log through the refresh planner and
//! into a persistent-search session, the way a sync-capable search
//! handler would end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ldap_backend::{Backend, MemoryBackend};
use ldap_core::csn::Csn;
use ldap_core::dn::Dn;
use ldap_core::entry::Entry;
use ldap_core::uuid::Uuid;
use ldap_sync::persist::{PersistEngine, SyncQueueNode};
use ldap_sync::refresh::{plan, server_cookie, RefreshMode, RefreshOutcome, RefreshRequest};
use ldap_sync::reduction::SyncAction;

fn entry_with_identity(dn: &str, uuid: [u8; 16], csn: Csn) -> Entry {
    let mut entry = Entry::new(Dn::new(dn));
    entry.set_uniqueid(Uuid::from_bytes(uuid));
    entry.set_dn(Dn::new(dn), csn);
    entry
}

#[tokio::test]
async fn a_client_with_no_cookie_gets_initial_content_then_a_valid_resume_cookie() {
    let backend = MemoryBackend::new();
    backend
        .add(entry_with_identity("uid=alice,o=example", [1; 16], Csn::new(1, 0, 1, 0)))
        .await
        .unwrap();
    backend
        .add(entry_with_identity("uid=bob,o=example", [2; 16], Csn::new(2, 0, 1, 0)))
        .await
        .unwrap();

    let request = RefreshRequest {
        mode: RefreshMode::RefreshOnly,
        cookie: None,
        reload_hint: false,
    };
    let outcome = plan(&request, "srv1", "o=example", 0, |_| unreachable!());
    assert!(matches!(outcome, RefreshOutcome::InitialContent));

    let change_number = backend.max_change_number().await.unwrap();
    let cookie = server_cookie("srv1", "o=example", change_number);
    assert_eq!(cookie.to_string(), "srv1#o=example#2");

    backend.delete(&Dn::new("uid=alice,o=example")).await.unwrap();
    backend
        .add(entry_with_identity("uid=carol,o=example", [3; 16], Csn::new(3, 0, 1, 0)))
        .await
        .unwrap();

    // `plan`'s `records_since` callback is synchronous; fetch the
    // records up front with the backend's async accessor and hand the
    // already-fetched slice to the closure.
    let latest = backend.max_change_number().await.unwrap();
    let fetched = backend.changes_since(change_number, latest).await.unwrap();

    let resume_request = RefreshRequest {
        mode: RefreshMode::RefreshOnly,
        cookie: Some(cookie.to_string()),
        reload_hint: false,
    };
    let resumed = plan(&resume_request, "srv1", "o=example", change_number, |_from| fetched);

    match resumed {
        RefreshOutcome::Delta(changes) => assert_eq!(changes.len(), 2),
        _ => panic!("expected a delta refresh from the resume cookie"),
    }
}

#[tokio::test]
async fn a_persist_session_is_notified_of_changes_after_its_refresh_completes() {
    let backend = MemoryBackend::new();
    let engine = PersistEngine::new(4);
    let session = engine.register("srv1".into(), "o=example".into()).await.unwrap();

    // changes arriving during refresh are queued but not yet delivered
    backend
        .add(entry_with_identity("uid=dave,o=example", [4; 16], Csn::new(1, 0, 1, 0)))
        .await
        .unwrap();
    engine
        .notify_change(
            SyncQueueNode {
                dn: Dn::new("uid=dave,o=example"),
                entry_uuid: Uuid::from_bytes([4; 16]),
                action: SyncAction::Add,
                csn: Csn::new(1, 0, 1, 0),
            },
            |_, _| true,
        )
        .await;

    session.mark_active();
    session.mark_complete();

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    session
        .clone()
        .run(
            || false,
            move |_node| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    engine.unregister(session.id()).await;
    assert_eq!(engine.active_session_count().await, 0);
}

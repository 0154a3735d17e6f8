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

//! Exercises the mapping tree and an attached memory backend together,
//! the way a connection handler would: resolve a target DN to a
//! backend name, then drive that backend directly.

use ldap_backend::{Backend, BackendError, MemoryBackend};
use ldap_core::csn::Csn;
use ldap_core::dn::Dn;
use ldap_core::entry::Entry;
use ldap_core::uuid::Uuid;
use ldap_routing::tree::{BackendSlot, MappingTree, NodeState, Resolution};

fn entry_with_identity(dn: &str, uuid: [u8; 16]) -> Entry {
    let mut entry = Entry::new(Dn::new(dn));
    entry.set_uniqueid(Uuid::from_bytes(uuid));
    entry.set_dn(Dn::new(dn), Csn::new(1, 0, 1, 0));
    entry
}

#[tokio::test]
async fn resolved_backend_name_reaches_the_right_store() {
    let tree = MappingTree::new();
    tree.add_node(&Dn::new(""), Dn::new("o=example"), NodeState::Backend)
        .await
        .unwrap();
    tree.attach_backend(&Dn::new("o=example"), BackendSlot::new("userroot"))
        .await
        .unwrap();

    let backends = std::collections::HashMap::from([("userroot", MemoryBackend::new())]);

    let target = Dn::new("uid=alice,ou=people,o=example");
    let resolution = tree.resolve(&target, true, false, None).await;

    let name = match resolution {
        Resolution::Backend { name, continuation } => {
            assert!(!continuation);
            name
        }
        other => panic!("expected a single-backend resolution, got {:?}", other),
    };

    let backend = backends.get(name.as_str()).expect("resolved backend name must be attached");
    backend.add(entry_with_identity(target.udn(), [9; 16])).await.unwrap();

    let fetched = backend.get(&target).await.unwrap();
    assert!(fetched.is_some());
}

#[tokio::test]
async fn disabled_suffix_never_reaches_a_backend() {
    let tree = MappingTree::new();
    tree.add_node(&Dn::new(""), Dn::new("o=retired"), NodeState::Disabled)
        .await
        .unwrap();

    let resolution = tree
        .resolve(&Dn::new("uid=bob,o=retired"), false, false, None)
        .await;
    assert_eq!(resolution, Resolution::OperationsError);
}

#[tokio::test]
async fn offline_backend_state_survives_a_failed_write_attempt() {
    let tree = MappingTree::new();
    tree.add_node(&Dn::new(""), Dn::new("o=example"), NodeState::Backend)
        .await
        .unwrap();
    tree.attach_backend(&Dn::new("o=example"), BackendSlot::new("userroot"))
        .await
        .unwrap();
    tree.set_backend_state(&Dn::new("o=example"), "userroot", ldap_routing::tree::BackendSlotState::Offline)
        .await
        .unwrap();

    let backend = MemoryBackend::new();
    let missing = backend.delete(&Dn::new("uid=ghost,o=example")).await.unwrap_err();
    assert!(matches!(missing, BackendError::NoSuchObject(_)));

    // the mapping tree keeps routing to the slot regardless of its
    // on/offline state; draining a backend is the caller's job, not
    // something `resolve` enforces.
    let resolution = tree.resolve(&Dn::new("uid=bob,o=example"), true, false, None).await;
    assert!(matches!(resolution, Resolution::Backend { .. }));
}

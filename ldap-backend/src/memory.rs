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

//! In-memory reference [`Backend`] implementation.
//!
//! Shaped after a connection-pool-wrapping SQL backend (a single
//! guarded connection standing in for whatever storage engine a
//! deployment picks), generalized here into a `BTreeMap` keyed on the
//! entry's normalized DN, behind one lock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use ldap_core::dn::Dn;
use ldap_core::entry::Entry;

use crate::{Backend, BackendError, ChangeOp, ChangeRecord};

struct State {
    entries: BTreeMap<String, Entry>,
    log: Vec<ChangeRecord>,
    next_change_number: u64,
}

/// Not durable across restarts; meant for tests and for a `kind =
/// "memory"` backend configuration rather than production deployments.
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                entries: BTreeMap::new(),
                log: Vec::new(),
                next_change_number: 1,
            }),
        }
    }

    fn record(state: &mut State, op: ChangeOp, dn: &Dn, entry: &Entry) {
        let change_number = state.next_change_number;
        state.next_change_number += 1;
        let Some(uuid) = entry.uniqueid() else {
            debug!("skipping change log entry for {}: no entry UUID assigned", dn.dn());
            return;
        };
        let Some(csn) = entry.max_csn() else {
            debug!("skipping change log entry for {}: no CSN recorded", dn.dn());
            return;
        };
        state.log.push(ChangeRecord {
            change_number,
            entry_uuid: uuid,
            op,
            dn: dn.clone(),
            csn,
        });
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, dn: &Dn) -> Result<Option<Entry>, BackendError> {
        let state = self.state.read().await;
        Ok(state.entries.get(dn.ndn()).cloned())
    }

    async fn add(&self, entry: Entry) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        let dn = entry.dn().clone();
        if state.entries.contains_key(dn.ndn()) {
            return Err(BackendError::AlreadyExists(dn.dn().to_string()));
        }
        Self::record(&mut state, ChangeOp::Add, &dn, &entry);
        state.entries.insert(dn.ndn().to_string(), entry);
        Ok(())
    }

    async fn delete(&self, dn: &Dn) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        let Some(entry) = state.entries.remove(dn.ndn()) else {
            return Err(BackendError::NoSuchObject(dn.dn().to_string()));
        };
        Self::record(&mut state, ChangeOp::Delete, dn, &entry);
        Ok(())
    }

    async fn modify(&self, dn: &Dn, entry: Entry) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        if !state.entries.contains_key(dn.ndn()) {
            return Err(BackendError::NoSuchObject(dn.dn().to_string()));
        }
        Self::record(&mut state, ChangeOp::Modify, dn, &entry);
        state.entries.insert(dn.ndn().to_string(), entry);
        Ok(())
    }

    async fn max_change_number(&self) -> Option<u64> {
        let state = self.state.read().await;
        state.log.last().map(|r| r.change_number)
    }

    async fn changes_since(&self, from: u64, to: u64) -> Result<Vec<ChangeRecord>, BackendError> {
        let state = self.state.read().await;
        Ok(state
            .log
            .iter()
            .filter(|r| r.change_number > from && r.change_number <= to)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_core::csn::Csn;
    use ldap_core::uuid::Uuid;

    fn entry_with_identity(dn: &str, uuid: [u8; 16], csn: Csn) -> Entry {
        let mut entry = Entry::new(Dn::new(dn));
        entry.set_uniqueid(Uuid::from_bytes(uuid));
        entry.set_dn(Dn::new(dn), csn);
        entry
    }

    #[tokio::test]
    async fn add_then_get_round_trips_the_entry() {
        let backend = MemoryBackend::new();
        let csn = Csn::new(1, 0, 1, 0);
        let entry = entry_with_identity("uid=alice,ou=people,o=example", [1; 16], csn);

        backend.add(entry).await.unwrap();

        let fetched = backend
            .get(&Dn::new("uid=alice,ou=people,o=example"))
            .await
            .unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn add_twice_is_rejected() {
        let backend = MemoryBackend::new();
        let csn = Csn::new(1, 0, 1, 0);
        let dn = Dn::new("uid=bob,ou=people,o=example");
        backend
            .add(entry_with_identity(dn.udn(), [2; 16], csn))
            .await
            .unwrap();

        let err = backend
            .add(entry_with_identity(dn.udn(), [2; 16], csn))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn delete_missing_entry_is_rejected() {
        let backend = MemoryBackend::new();
        let err = backend
            .delete(&Dn::new("uid=ghost,ou=people,o=example"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NoSuchObject(_)));
    }

    #[tokio::test]
    async fn changes_since_respects_the_from_to_bounds() {
        let backend = MemoryBackend::new();
        let dn1 = Dn::new("uid=one,ou=people,o=example");
        let dn2 = Dn::new("uid=two,ou=people,o=example");
        backend
            .add(entry_with_identity(dn1.udn(), [3; 16], Csn::new(1, 0, 1, 0)))
            .await
            .unwrap();
        backend
            .add(entry_with_identity(dn2.udn(), [4; 16], Csn::new(2, 0, 1, 0)))
            .await
            .unwrap();
        backend.delete(&dn1).await.unwrap();

        let all = backend.changes_since(0, 10).await.unwrap();
        assert_eq!(all.len(), 3);

        let tail = backend.changes_since(1, 10).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].op, ChangeOp::Add);
        assert_eq!(tail[1].op, ChangeOp::Delete);
    }
}

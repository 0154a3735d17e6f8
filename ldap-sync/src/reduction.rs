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

//! Change-log reduction: collapse a `(from, to]` run of change records
//! into one logical action per entry, in order of first appearance.
//!
//! `ModRdn` records are folded into `Modify` before the transition table
//! below is applied. Telling an in-scope rename apart from a rename that
//! moves an entry into or out of the session's scope needs the entry's
//! pre-image DN, which the backend's change log does not currently
//! track per record; until it does, every rename is handled as a plain
//! modify, which is correct for the common in-scope case.

use std::collections::HashMap;

use ldap_backend::{ChangeOp, ChangeRecord};
use ldap_core::dn::Dn;
use ldap_core::uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Add,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedChange {
    pub entry_uuid: Uuid,
    pub action: SyncAction,
    pub dn: Dn,
    pub change_number: u64,
}

fn normalize(op: ChangeOp) -> SyncAction {
    match op {
        ChangeOp::Add => SyncAction::Add,
        ChangeOp::Modify | ChangeOp::ModRdn => SyncAction::Modify,
        ChangeOp::Delete => SyncAction::Delete,
    }
}

/// Reduces `records` (oldest first) into one [`ReducedChange`] per
/// entry UUID, preserving the order each UUID first appeared in.
pub fn reduce(records: &[ChangeRecord]) -> Vec<ReducedChange> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut state: HashMap<Uuid, ReducedChange> = HashMap::new();

    for rec in records {
        let incoming = normalize(rec.op);
        match state.get(&rec.entry_uuid).map(|c| c.action) {
            None => {
                order.push(rec.entry_uuid);
                state.insert(
                    rec.entry_uuid,
                    ReducedChange {
                        entry_uuid: rec.entry_uuid,
                        action: incoming,
                        dn: rec.dn.clone(),
                        change_number: rec.change_number,
                    },
                );
            }
            Some(SyncAction::Add) if incoming == SyncAction::Delete => {
                state.remove(&rec.entry_uuid);
                order.retain(|u| *u != rec.entry_uuid);
            }
            Some(SyncAction::Add) | Some(SyncAction::Modify) if incoming == SyncAction::Modify => {
                // keep the earlier action, this sighting is dropped
            }
            Some(SyncAction::Modify) if incoming == SyncAction::Delete => {
                let entry = state.get_mut(&rec.entry_uuid).expect("present, just matched");
                entry.action = SyncAction::Delete;
                entry.dn = rec.dn.clone();
                entry.change_number = rec.change_number;
            }
            Some(_) => {
                let entry = state.get_mut(&rec.entry_uuid).expect("present, just matched");
                entry.action = incoming;
                entry.dn = rec.dn.clone();
                entry.change_number = rec.change_number;
            }
        }
    }

    order.into_iter().filter_map(|uuid| state.remove(&uuid)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_core::csn::Csn;

    fn record(change_number: u64, uuid_byte: u8, op: ChangeOp, dn: &str) -> ChangeRecord {
        ChangeRecord {
            change_number,
            entry_uuid: Uuid::from_bytes([uuid_byte; 16]),
            op,
            dn: Dn::new(dn),
            csn: Csn::new(change_number, 0, 1, 0),
        }
    }

    #[test]
    fn add_then_delete_drops_both() {
        let records = vec![
            record(1, 1, ChangeOp::Add, "uid=a,o=example"),
            record(2, 1, ChangeOp::Delete, "uid=a,o=example"),
        ];
        assert!(reduce(&records).is_empty());
    }

    #[test]
    fn add_then_modify_keeps_add() {
        let records = vec![
            record(1, 1, ChangeOp::Add, "uid=a,o=example"),
            record(2, 1, ChangeOp::Modify, "uid=a,o=example"),
        ];
        let reduced = reduce(&records);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].action, SyncAction::Add);
        assert_eq!(reduced[0].change_number, 1);
    }

    #[test]
    fn modify_then_delete_becomes_delete() {
        let records = vec![
            record(1, 1, ChangeOp::Modify, "uid=a,o=example"),
            record(2, 1, ChangeOp::Delete, "uid=a,o=example"),
        ];
        let reduced = reduce(&records);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].action, SyncAction::Delete);
        assert_eq!(reduced[0].change_number, 2);
    }

    #[test]
    fn independent_entries_preserve_first_seen_order() {
        let records = vec![
            record(1, 2, ChangeOp::Add, "uid=b,o=example"),
            record(2, 1, ChangeOp::Add, "uid=a,o=example"),
            record(3, 2, ChangeOp::Modify, "uid=b,o=example"),
        ];
        let reduced = reduce(&records);
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0].entry_uuid, Uuid::from_bytes([2; 16]));
        assert_eq!(reduced[1].entry_uuid, Uuid::from_bytes([1; 16]));
    }
}

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

//! In-memory entry representation: DN history, attributes, and
//! replication/virtual-attribute bookkeeping.

use crate::attribute::Attribute;
use crate::csn::{Csn, CsnType};
use crate::dn::{Dn, Rdn};
use crate::uuid::Uuid;

bitflags::bitflags! {
    /// Entry-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u32 {
        const TOMBSTONE = 0b0001;
        const CONFLICT  = 0b0010;
        const GLUE      = 0b0100;
        const SUBENTRY  = 0b1000;
    }
}

/// A directory entry: its DN history, unique identifier, attribute
/// table, and replication/virtual-attribute bookkeeping.
///
/// DN changes are tracked as a small history (`dn_csns`) rather than a
/// single field, since a modrdn/moddn leaves the old DN's CSN attached
/// for conflict resolution.
#[derive(Debug, Clone)]
pub struct Entry {
    dn: Dn,
    uniqueid: Option<Uuid>,
    dn_csns: Vec<(Dn, Csn)>,
    max_csn: Option<Csn>,
    attrs: Vec<Attribute>,
    deleted_attrs: Vec<Attribute>,
    virtual_attrs: Vec<Attribute>,
    flags: EntryFlags,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            uniqueid: None,
            dn_csns: Vec::new(),
            max_csn: None,
            attrs: Vec::new(),
            deleted_attrs: Vec::new(),
            virtual_attrs: Vec::new(),
            flags: EntryFlags::empty(),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn rdn(&self) -> Rdn {
        self.dn.rdn()
    }

    pub fn uniqueid(&self) -> Option<Uuid> {
        self.uniqueid
    }

    pub fn set_uniqueid(&mut self, uuid: Uuid) {
        self.uniqueid = Some(uuid);
    }

    /// Renames the entry, recording the outgoing DN alongside the CSN of
    /// the rename so conflict resolution can still see it.
    pub fn set_dn(&mut self, dn: Dn, csn: Csn) {
        let old = std::mem::replace(&mut self.dn, dn);
        self.dn_csns.push((old, csn));
        self.bump_max_csn(csn);
    }

    pub fn dn_history(&self) -> &[(Dn, Csn)] {
        &self.dn_csns
    }

    pub fn max_csn(&self) -> Option<Csn> {
        self.max_csn
    }

    fn bump_max_csn(&mut self, csn: Csn) {
        self.max_csn = Some(match self.max_csn {
            Some(existing) if existing >= csn => existing,
            _ => csn,
        });
    }

    pub fn add_present_attribute(&mut self, attr: Attribute) {
        if let Some(max) = attr
            .present()
            .iter()
            .filter_map(|v| v.csns().max())
            .max()
        {
            self.bump_max_csn(max);
        }
        self.attrs.push(attr);
    }

    pub fn add_deleted_attribute(&mut self, attr: Attribute) {
        if let Some(csn) = attr.deletion_csn() {
            self.bump_max_csn(csn);
        }
        self.deleted_attrs.push(attr);
    }

    pub fn add_virtual_attribute(&mut self, attr: Attribute) {
        self.virtual_attrs.push(attr);
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn deleted_attrs(&self) -> &[Attribute] {
        &self.deleted_attrs
    }

    pub fn virtual_attrs(&self) -> &[Attribute] {
        &self.virtual_attrs
    }

    pub fn attr_find(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name().eq_ignore_ascii_case(name))
    }

    pub fn attr_find_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.iter_mut().find(|a| a.name().eq_ignore_ascii_case(name))
    }

    pub fn set_flag(&mut self, flag: EntryFlags) {
        self.flags.insert(flag);
    }

    pub fn clear_flag(&mut self, flag: EntryFlags) {
        self.flags.remove(flag);
    }

    pub fn has_flag(&self, flag: EntryFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Purges CSN history at or below `up_to` across the entry's DN
    /// history and every present/deleted attribute.
    pub fn purge(&mut self, up_to: Csn) {
        self.dn_csns.retain(|(_, csn)| *csn > up_to);
        for attr in self.attrs.iter_mut() {
            attr.purge(up_to);
        }
        self.deleted_attrs.retain_mut(|attr| {
            attr.purge(up_to);
            attr.deletion_csn().is_some() || !attr.deleted().is_empty()
        });
    }
}

/// The one CSN type a deleted attribute must never carry inside its
/// value-level CSN set; retained here only to document the invariant
/// that [`CsnType::AttributeDeleted`] is an attribute-level, not a
/// value-level, marker.
#[allow(dead_code)]
const ATTRIBUTE_DELETED_IS_OUT_OF_BAND: CsnType = CsnType::AttributeDeleted;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_rule::case_ignore;
    use crate::value::Value;

    #[test]
    fn set_dn_records_history_and_bumps_max_csn() {
        let mut entry = Entry::new(Dn::new("cn=a,o=x"));
        let csn = Csn::new(5, 0, 0, 0);
        entry.set_dn(Dn::new("cn=b,o=x"), csn);

        assert_eq!(entry.dn().dn(), "cn=b,o=x");
        assert_eq!(entry.dn_history().len(), 1);
        assert_eq!(entry.max_csn(), Some(csn));
    }

    #[test]
    fn attr_find_is_case_insensitive() {
        let mut entry = Entry::new(Dn::new("cn=a,o=x"));
        let mut attr = Attribute::new("cn", case_ignore());
        attr.add_present(Value::new(*b"a"));
        entry.add_present_attribute(attr);

        assert!(entry.attr_find("CN").is_some());
        assert!(entry.attr_find("sn").is_none());
    }

    #[test]
    fn flags_round_trip() {
        let mut entry = Entry::new(Dn::new(""));
        entry.set_flag(EntryFlags::TOMBSTONE);
        assert!(entry.has_flag(EntryFlags::TOMBSTONE));
        entry.clear_flag(EntryFlags::TOMBSTONE);
        assert!(!entry.has_flag(EntryFlags::TOMBSTONE));
    }
}

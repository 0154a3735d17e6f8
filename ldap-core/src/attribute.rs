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

//! Attribute storage: present values, deleted-value tombstones, and the
//! attribute-level deletion CSN.

use std::sync::Arc;

use crate::csn::Csn;
use crate::matching_rule::MatchingRule;
use crate::value::{AddOutcome, Value, ValueSet};

/// Where a looked-up value was found, if at all.
#[derive(Debug, PartialEq, Eq)]
pub enum FindResult {
    Present(usize),
    Deleted(usize),
    NotFound,
}

/// One attribute on an [`crate::entry::Entry`]: a type name, its equality
/// matching rule, a present-value set, and a deleted-value tombstone set
/// retained for conflict resolution until purged.
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    eq_rule: Arc<dyn MatchingRule>,
    present: ValueSet,
    deleted: ValueSet,
    /// Set when the whole attribute (not just individual values) was
    /// deleted; dominates over any later-purged value-level CSNs when
    /// deciding whether the attribute still exists.
    deletion_csn: Option<Csn>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, eq_rule: Arc<dyn MatchingRule>) -> Self {
        Self {
            name: name.into(),
            eq_rule,
            present: ValueSet::new(),
            deleted: ValueSet::new(),
            deletion_csn: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn present(&self) -> &ValueSet {
        &self.present
    }

    pub fn present_mut(&mut self) -> &mut ValueSet {
        &mut self.present
    }

    pub fn deleted(&self) -> &ValueSet {
        &self.deleted
    }

    pub fn deletion_csn(&self) -> Option<Csn> {
        self.deletion_csn
    }

    pub fn add_present(&mut self, value: Value) -> AddOutcome {
        self.present.add(value, self.eq_rule.as_ref())
    }

    pub fn add_deleted(&mut self, value: Value) -> AddOutcome {
        self.deleted.add(value, self.eq_rule.as_ref())
    }

    /// Searches present values first, then tombstoned ones.
    pub fn find(&self, bytes: &[u8]) -> FindResult {
        if let Some(i) = self.present.find(bytes, self.eq_rule.as_ref()) {
            return FindResult::Present(i);
        }
        if let Some(i) = self.deleted.find(bytes, self.eq_rule.as_ref()) {
            return FindResult::Deleted(i);
        }
        FindResult::NotFound
    }

    /// Records that the attribute itself was deleted at `csn`. A later
    /// call with a newer CSN overwrites; an older one is ignored, since
    /// the newest delete always dominates purge decisions for the whole
    /// attribute.
    pub fn set_deletion_csn(&mut self, csn: Csn) {
        match self.deletion_csn {
            Some(existing) if existing >= csn => {}
            _ => self.deletion_csn = Some(csn),
        }
    }

    /// Drops every value-level and attribute-level CSN at or below
    /// `up_to`, and every tombstoned value whose CSN set is now empty.
    pub fn purge(&mut self, up_to: Csn) {
        for v in self.present.iter_mut() {
            v.csns_mut().purge(up_to);
        }
        self.deleted.purge_and_drop_empty(up_to);
        if let Some(csn) = self.deletion_csn {
            if csn <= up_to {
                self.deletion_csn = None;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_rule::case_ignore;

    #[test]
    fn add_present_then_find_locates_it() {
        let mut attr = Attribute::new("cn", case_ignore());
        attr.add_present(Value::new(*b"Alice"));
        assert_eq!(attr.find(b"alice"), FindResult::Present(0));
    }

    #[test]
    fn deleted_values_are_found_but_reported_distinctly() {
        let mut attr = Attribute::new("cn", case_ignore());
        attr.add_deleted(Value::new(*b"Bob"));
        assert_eq!(attr.find(b"BOB"), FindResult::Deleted(0));
        assert_eq!(attr.find(b"nobody"), FindResult::NotFound);
    }

    #[test]
    fn set_deletion_csn_keeps_the_newest() {
        let mut attr = Attribute::new("cn", case_ignore());
        let older = Csn::new(1, 0, 0, 0);
        let newer = Csn::new(2, 0, 0, 0);
        attr.set_deletion_csn(newer);
        attr.set_deletion_csn(older);
        assert_eq!(attr.deletion_csn(), Some(newer));
    }
}

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

//! Attribute value storage: a single value plus the CSN set it carries,
//! and the ordered collection of values an attribute holds.

use crate::csn::CsnSet;
use crate::matching_rule::MatchingRule;

/// A single attribute value: its raw bytes plus the CSN history attached
/// to it (when it was added, when it was deleted, whether it is the
/// attribute's distinguished value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    bytes: Vec<u8>,
    csns: CsnSet,
}

impl Value {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            csns: CsnSet::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn csns(&self) -> &CsnSet {
        &self.csns
    }

    pub fn csns_mut(&mut self) -> &mut CsnSet {
        &mut self.csns
    }
}

/// Outcome of [`ValueSet::add`].
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The value was appended; no equal value existed.
    Added,
    /// A value equal under the attribute's equality matching rule already
    /// existed at this index; the new value was not added.
    Duplicate(usize),
}

/// An ordered collection of an attribute's values. Appends are O(1);
/// duplicate detection is a linear scan under the supplied equality
/// matching rule, mirroring the small-cardinality assumption most LDAP
/// attributes hold in practice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSet {
    values: Vec<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    /// Appends `value` unless a byte-identical-under-`eq_rule` value
    /// already exists, in which case the existing index is reported and
    /// the new value is discarded.
    pub fn add(&mut self, value: Value, eq_rule: &dyn MatchingRule) -> AddOutcome {
        if let Some(existing) = self.find(value.bytes(), eq_rule) {
            return AddOutcome::Duplicate(existing);
        }
        self.values.push(value);
        AddOutcome::Added
    }

    /// Unconditionally appends, bypassing duplicate detection — used by
    /// the replicated-entry decoder, which trusts the wire form to
    /// already be deduplicated.
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Finds the index of a value equal to `bytes` under `eq_rule`.
    pub fn find(&self, bytes: &[u8], eq_rule: &dyn MatchingRule) -> Option<usize> {
        self.values.iter().position(|v| eq_rule.equal(v.bytes(), bytes))
    }

    pub fn remove(&mut self, index: usize) -> Value {
        self.values.remove(index)
    }

    /// Purges every value's CSN set down to `up_to`, then drops any value
    /// left with no CSNs at all — the tombstone has served its purpose.
    pub fn purge_and_drop_empty(&mut self, up_to: crate::csn::Csn) {
        for v in self.values.iter_mut() {
            v.csns_mut().purge(up_to);
        }
        self.values.retain(|v| !v.csns().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching_rule::CaseIgnoreMatch;

    #[test]
    fn add_appends_when_no_equal_value_exists() {
        let mut set = ValueSet::new();
        let rule = CaseIgnoreMatch;
        assert_eq!(set.add(Value::new(*b"a"), &rule), AddOutcome::Added);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn add_reports_duplicate_under_equality_matching_rule() {
        let mut set = ValueSet::new();
        let rule = CaseIgnoreMatch;
        set.add(Value::new(*b"Alice"), &rule);
        assert_eq!(set.add(Value::new(*b"alice"), &rule), AddOutcome::Duplicate(0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn find_uses_the_supplied_matching_rule() {
        let mut set = ValueSet::new();
        let rule = CaseIgnoreMatch;
        set.push(Value::new(*b"Bob"));
        assert_eq!(set.find(b"BOB", &rule), Some(0));
        assert_eq!(set.find(b"carol", &rule), None);
    }
}

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

//! Matching-rule plug-ins: equality, ordering, and substring comparison
//! for attribute values.
//!
//! A matching rule is the comparison strategy an [`crate::attribute::Attribute`]
//! delegates to for duplicate detection, filter evaluation, and ordering.
//! Real attribute syntaxes in 389-family servers pick these by OID from a
//! plug-in table; this core models the handful that the rest of the
//! component design actually exercises and leaves the rest as an
//! extension point (`dyn MatchingRule`).

use std::sync::Arc;

/// A substring filter, already split into its three RFC 4515 parts.
#[derive(Debug, Clone, Default)]
pub struct SubstringFilter {
    pub initial: Option<Vec<u8>>,
    pub any: Vec<Vec<u8>>,
    pub final_: Option<Vec<u8>>,
}

/// Equality / ordering / substring behavior for one attribute syntax.
pub trait MatchingRule: Send + Sync + std::fmt::Debug {
    /// The rule's canonical name, e.g. `"caseIgnoreMatch"`.
    fn name(&self) -> &'static str;

    /// Produces the normalized form of a value under this rule. Two
    /// values are equal under the rule iff their normalized forms are
    /// byte-identical.
    fn normalize(&self, value: &[u8]) -> Vec<u8>;

    fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.normalize(a) == self.normalize(b)
    }

    /// Ordering rules override this; the default always reports `Equal`
    /// unless the normalized bytes differ lexicographically, which is
    /// correct for exact-match-only rules that have no declared ORDERING.
    fn compare(&self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        self.normalize(a).cmp(&self.normalize(b))
    }

    fn matches_substring(&self, value: &[u8], filter: &SubstringFilter) -> bool {
        let normalized = self.normalize(value);
        let mut cursor: &[u8] = &normalized;

        if let Some(initial) = &filter.initial {
            let initial = self.normalize(initial);
            if !cursor.starts_with(initial.as_slice()) {
                return false;
            }
            cursor = &cursor[initial.len()..];
        }
        for any in &filter.any {
            let any = self.normalize(any);
            match find_subslice(cursor, &any) {
                Some(pos) => cursor = &cursor[pos + any.len()..],
                None => return false,
            }
        }
        if let Some(final_) = &filter.final_ {
            let final_ = self.normalize(final_);
            if !cursor.ends_with(final_.as_slice()) {
                return false;
            }
        }
        true
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `caseExactMatch` / `octetStringMatch`: byte-identical comparison.
#[derive(Debug, Default)]
pub struct CaseExactMatch;

impl MatchingRule for CaseExactMatch {
    fn name(&self) -> &'static str {
        "caseExactMatch"
    }

    fn normalize(&self, value: &[u8]) -> Vec<u8> {
        value.to_vec()
    }
}

/// `caseIgnoreMatch`: ASCII case-folded, whitespace-collapsed comparison.
#[derive(Debug, Default)]
pub struct CaseIgnoreMatch;

impl MatchingRule for CaseIgnoreMatch {
    fn name(&self) -> &'static str {
        "caseIgnoreMatch"
    }

    fn normalize(&self, value: &[u8]) -> Vec<u8> {
        let s = String::from_utf8_lossy(value);
        s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase().into_bytes()
    }
}

/// `integerMatch` / `integerOrderingMatch`: numeric comparison of an
/// ASCII decimal octet string.
#[derive(Debug, Default)]
pub struct IntegerMatch;

impl MatchingRule for IntegerMatch {
    fn name(&self) -> &'static str {
        "integerMatch"
    }

    fn normalize(&self, value: &[u8]) -> Vec<u8> {
        value.to_vec()
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        let pa: i64 = String::from_utf8_lossy(a).parse().unwrap_or(0);
        let pb: i64 = String::from_utf8_lossy(b).parse().unwrap_or(0);
        pa.cmp(&pb)
    }
}

pub fn case_exact() -> Arc<dyn MatchingRule> {
    Arc::new(CaseExactMatch)
}

pub fn case_ignore() -> Arc<dyn MatchingRule> {
    Arc::new(CaseIgnoreMatch)
}

pub fn integer_match() -> Arc<dyn MatchingRule> {
    Arc::new(IntegerMatch)
}

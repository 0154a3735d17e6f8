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

//! Distinguished Name / Relative Distinguished Name representation.
//!
//! Normalization here is deliberately simple (case-fold plus
//! whitespace-collapse around `,`/`=`) since full RFC 4514 DN parsing and
//! attribute-syntax-aware normalization belong to the excluded schema/ACL
//! collaborators, not this core.

/// A distinguished name, retaining the as-supplied, normalized, and
/// case-normalized forms — normalization happens once, at construction,
/// and is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dn {
    /// As supplied by the client (`udn`).
    udn: String,
    /// Normalized (whitespace-collapsed) form (`dn`).
    dn: String,
    /// Case-normalized form, used for suffix/equality comparisons (`ndn`).
    ndn: String,
}

fn normalize(raw: &str) -> String {
    raw.split(',')
        .map(|rdn| {
            rdn.split('=')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("=")
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl Dn {
    pub fn new(udn: impl Into<String>) -> Self {
        let udn = udn.into();
        let dn = normalize(&udn);
        let ndn = dn.to_lowercase();
        Self { udn, dn, ndn }
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }

    pub fn ndn(&self) -> &str {
        &self.ndn
    }

    pub fn is_empty(&self) -> bool {
        self.dn.is_empty()
    }

    /// Returns true if `self` is equal to or a descendant of `suffix`,
    /// comparing normalized case-folded forms. The mapping tree's
    /// best-match walk is built on this.
    pub fn is_under_suffix(&self, suffix: &Dn) -> bool {
        if suffix.ndn.is_empty() {
            return true; // the root suffix matches everything
        }
        if self.ndn == suffix.ndn {
            return true;
        }
        self.ndn.ends_with(&format!(",{}", suffix.ndn))
    }

    /// The immediate parent DN, or `None` if this DN is the root suffix.
    pub fn parent(&self) -> Option<Dn> {
        self.dn.split_once(',').map(|(_, rest)| Dn::new(rest))
    }

    pub fn rdn(&self) -> Rdn {
        let first = self.dn.split(',').next().unwrap_or("");
        Rdn::new(first)
    }
}

impl std::fmt::Display for Dn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dn)
    }
}

/// A relative distinguished name: the first component of a [`Dn`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rdn {
    udn: String,
    ndn: String,
}

impl Rdn {
    pub fn new(raw: &str) -> Self {
        let normalized = normalize(raw);
        Self {
            ndn: normalized.to_lowercase(),
            udn: raw.to_string(),
        }
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn ndn(&self) -> &str {
        &self.ndn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whitespace_around_separators() {
        let dn = Dn::new("cn = a , o = x");
        assert_eq!(dn.dn(), "cn=a,o=x");
    }

    #[test]
    fn is_under_suffix_matches_descendants_and_self() {
        let suffix = Dn::new("o=x");
        assert!(Dn::new("ou=people,o=x").is_under_suffix(&suffix));
        assert!(Dn::new("o=x").is_under_suffix(&suffix));
        assert!(!Dn::new("o=y").is_under_suffix(&suffix));
    }

    #[test]
    fn empty_suffix_is_the_root_and_matches_everything() {
        let root = Dn::new("");
        assert!(Dn::new("cn=config").is_under_suffix(&root));
    }

    #[test]
    fn parent_strips_leading_rdn() {
        let dn = Dn::new("uid=a,ou=people,o=x");
        assert_eq!(dn.parent().unwrap().dn(), "ou=people,o=x");
    }

    #[test]
    fn rdn_is_case_normalized_for_comparison_but_keeps_original_case() {
        let rdn = Rdn::new("CN=Admin");
        assert_eq!(rdn.udn(), "CN=Admin");
        assert_eq!(rdn.ndn(), "cn=admin");
    }
}

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

//! Attribute-syntax and matching-rule registry.
//!
//! Mirrors the refcounted-descriptor/tombstone-bit registry pattern the
//! 389-family plug-in table uses, built here as a dual name/OID lookup
//! behind a single lock rather than the original's separate hash tables,
//! since a single `RwLock<Registry>` is the idiomatic translation of
//! "one lock guards both tables" onto `std::sync`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::matching_rule::{case_exact, case_ignore, integer_match, MatchingRule};

/// A registered attribute syntax: its OID, its primary name, any
/// aliases, and the equality matching rule attributes of this syntax
/// use by default.
#[derive(Clone)]
pub struct SyntaxDescriptor {
    pub oid: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub equality: Arc<dyn MatchingRule>,
    /// Marked for delete but not yet collected — refcount reached zero
    /// on a prior [`SyntaxRegistry::delete`] call was deferred until no
    /// attribute still referenced it; this core never actually drops the
    /// descriptor, since attributes hold an `Arc` clone directly rather
    /// than an index into the registry, but the bit is kept for parity
    /// with the tombstone-bit registry behavior this mirrors.
    marked_for_delete: bool,
}

impl std::fmt::Debug for SyntaxDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxDescriptor")
            .field("oid", &self.oid)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("marked_for_delete", &self.marked_for_delete)
            .finish()
    }
}

/// Bitflag-style addition behavior, mirroring the OVERRIDE flag a
/// plug-in registry's `add` operation is typically called with: by
/// default, adding a name/OID that already exists is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    RejectExisting,
    Override,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("syntax '{0}' is already registered")]
    AlreadyExists(String),
    #[error("syntax '{0}' is not registered")]
    NotFound(String),
}

struct Inner {
    by_oid: HashMap<String, Arc<SyntaxDescriptor>>,
    by_name: HashMap<String, Arc<SyntaxDescriptor>>,
}

/// The dual OID/name registry of attribute syntaxes, installed once at
/// daemon startup and looked up frequently thereafter.
pub struct SyntaxRegistry {
    inner: RwLock<Inner>,
}

impl Default for SyntaxRegistry {
    fn default() -> Self {
        let registry = Self {
            inner: RwLock::new(Inner {
                by_oid: HashMap::new(),
                by_name: HashMap::new(),
            }),
        };
        registry.install_well_known();
        registry
    }
}

impl SyntaxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn install_well_known(&self) {
        let octet_string = SyntaxDescriptor {
            oid: "1.3.6.1.4.1.1466.115.121.1.40".to_string(),
            name: "OctetString".to_string(),
            aliases: vec![],
            equality: case_exact(),
            marked_for_delete: false,
        };
        let directory_string = SyntaxDescriptor {
            oid: "1.3.6.1.4.1.1466.115.121.1.15".to_string(),
            name: "DirectoryString".to_string(),
            aliases: vec!["CaseIgnoreString".to_string()],
            equality: case_ignore(),
            marked_for_delete: false,
        };
        let integer = SyntaxDescriptor {
            oid: "1.3.6.1.4.1.1466.115.121.1.27".to_string(),
            name: "INTEGER".to_string(),
            aliases: vec![],
            equality: integer_match(),
            marked_for_delete: false,
        };
        for descriptor in [octet_string, directory_string, integer] {
            self.add(descriptor, AddMode::Override).expect("well-known syntaxes never collide");
        }
    }

    pub fn add(&self, descriptor: SyntaxDescriptor, mode: AddMode) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if mode == AddMode::RejectExisting
            && (inner.by_oid.contains_key(&descriptor.oid) || inner.by_name.contains_key(&descriptor.name.to_lowercase()))
        {
            return Err(RegistryError::AlreadyExists(descriptor.name));
        }
        let arc = Arc::new(descriptor);
        inner.by_oid.insert(arc.oid.clone(), arc.clone());
        inner.by_name.insert(arc.name.to_lowercase(), arc.clone());
        for alias in &arc.aliases {
            inner.by_name.insert(alias.to_lowercase(), arc.clone());
        }
        Ok(())
    }

    /// Marks a descriptor for deletion. Existing `Arc` holders (attributes
    /// already bound to this syntax) keep it alive; new lookups by name
    /// or OID will no longer find it.
    pub fn delete(&self, name_or_oid: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let key = name_or_oid.to_lowercase();
        let descriptor = inner
            .by_name
            .get(&key)
            .or_else(|| inner.by_oid.get(name_or_oid))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name_or_oid.to_string()))?;

        inner.by_oid.remove(&descriptor.oid);
        inner.by_name.remove(&descriptor.name.to_lowercase());
        for alias in &descriptor.aliases {
            inner.by_name.remove(&alias.to_lowercase());
        }
        Ok(())
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<SyntaxDescriptor>> {
        self.inner.read().expect("registry lock poisoned").by_name.get(&name.to_lowercase()).cloned()
    }

    pub fn lookup_by_oid(&self, oid: &str) -> Option<Arc<SyntaxDescriptor>> {
        self.inner.read().expect("registry lock poisoned").by_oid.get(oid).cloned()
    }

    /// Looks up by name, falling back first to the registered
    /// `OctetString` descriptor and, only if that too is missing from
    /// the registry, to a synthetic `DirectoryString` descriptor built
    /// directly rather than looked up — the registry's stated
    /// default-syntax behavior.
    pub fn lookup_with_default(&self, name: &str) -> Arc<SyntaxDescriptor> {
        self.lookup_by_name(name)
            .or_else(|| self.lookup_by_name("OctetString"))
            .unwrap_or_else(synthetic_directory_string)
    }

    pub fn enumerate(&self) -> Vec<Arc<SyntaxDescriptor>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut seen = std::collections::HashSet::new();
        inner
            .by_oid
            .values()
            .filter(|d| seen.insert(d.oid.clone()))
            .cloned()
            .collect()
    }

    /// Splits an attribute description into its base type, returning the
    /// part before the first `;` (its option tags, if any, are dropped).
    /// Writes into `buf` and returns the written slice without allocating
    /// when the base type fits; otherwise allocates.
    pub fn attr_basetype<'a>(&self, attr_description: &str, buf: &'a mut [u8]) -> std::borrow::Cow<'a, str> {
        let base = attr_description.split(';').next().unwrap_or(attr_description);
        let bytes = base.as_bytes();
        if bytes.len() <= buf.len() {
            buf[..bytes.len()].copy_from_slice(bytes);
            std::borrow::Cow::Borrowed(std::str::from_utf8(&buf[..bytes.len()]).expect("copied from a &str"))
        } else {
            std::borrow::Cow::Owned(base.to_string())
        }
    }
}

/// Built directly rather than looked up, since this is the fallback of
/// last resort for a registry that's had even `OctetString` removed.
fn synthetic_directory_string() -> Arc<SyntaxDescriptor> {
    Arc::new(SyntaxDescriptor {
        oid: "1.3.6.1.4.1.1466.115.121.1.15".to_string(),
        name: "DirectoryString".to_string(),
        aliases: vec!["CaseIgnoreString".to_string()],
        equality: case_ignore(),
        marked_for_delete: false,
    })
}

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

//! Pluggable storage collaborator behind the mapping tree.
//!
//! A `Backend` owns the entries under one or more suffixes and keeps a
//! change log the content-sync engine replays from. The mapping tree
//! only ever talks to backends through this trait, never to a concrete
//! storage engine directly, so a deployment can swap in whatever
//! storage it wants without touching routing or sync code.

use async_trait::async_trait;
use thiserror::Error;

use ldap_core::csn::Csn;
use ldap_core::dn::Dn;
use ldap_core::entry::Entry;
use ldap_core::uuid::Uuid;

pub mod memory;

pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no such object: {0}")]
    NoSuchObject(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("operations error: {0}")]
    OperationsError(String),
}

/// One entry in a backend's change log, as handed to the content-sync
/// refresh engine when it walks a `(from, to]` range of change numbers.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub change_number: u64,
    pub entry_uuid: Uuid,
    pub op: ChangeOp,
    pub dn: Dn,
    pub csn: Csn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Add,
    Modify,
    Delete,
    ModRdn,
}

/// Storage collaborator for one or more suffixes in the mapping tree.
///
/// Implementations must be safe to share behind an `Arc` and called
/// from many connection tasks concurrently; the trait takes `&self`
/// throughout and leaves locking to the implementation.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, dn: &Dn) -> Result<Option<Entry>, BackendError>;

    async fn add(&self, entry: Entry) -> Result<(), BackendError>;

    async fn delete(&self, dn: &Dn) -> Result<(), BackendError>;

    /// Replace the stored entry at `dn` with `entry`. Callers are
    /// responsible for merging attribute-level CSN state before calling
    /// this; the backend just persists whatever entry state it's given.
    async fn modify(&self, dn: &Dn, entry: Entry) -> Result<(), BackendError>;

    /// The highest change number currently in this backend's change log,
    /// or `None` if the log is empty. Used as a session's starting point
    /// when refreshOnly sync has no prior cookie to resume from.
    async fn max_change_number(&self) -> Option<u64>;

    /// Change records with `from < change_number <= to`, oldest first.
    async fn changes_since(&self, from: u64, to: u64) -> Result<Vec<ChangeRecord>, BackendError>;
}

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

//! Mapping tree: the suffix-rooted tree that routes every operation to
//! one or more backends or to a referral.
//!
//! One global RW lock (`mt_lock`) guards the whole tree structure;
//! per-backend RW locks are independent and exist only to serialize
//! "drain" during a state transition. `mt_lock` is a
//! `tokio::sync::RwLock` rather than `std::sync::RwLock` since resolution
//! happens inline with the rest of this core's async operation path and
//! must not block a worker thread while holding it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ldap_core::dn::Dn;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Disabled,
    Backend,
    Referral,
    ReferralOnUpdate,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSlotState {
    On,
    Offline,
    Delete,
}

/// A single backend attached to a mapping-tree node. The drain lock is
/// independent of `mt_lock`: flipping `state` only requires `mt_lock` in
/// write mode, but waiting for in-flight operations to finish requires
/// taking this lock in write mode too, which blocks until every
/// outstanding read-locker (an in-progress operation) releases it.
#[derive(Clone)]
pub struct BackendSlot {
    pub name: String,
    pub state: BackendSlotState,
    pub drain_lock: Arc<RwLock<()>>,
}

impl BackendSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: BackendSlotState::On,
            drain_lock: Arc::new(RwLock::new(())),
        }
    }
}

#[derive(Clone)]
pub struct Node {
    pub subtree: Dn,
    pub state: NodeState,
    pub backends: Vec<BackendSlot>,
    /// A duplicated LDAP referral entry, carried as its already-rendered
    /// LDIF-ish string form — building/parsing real referral entries is
    /// an ACL/schema-layer concern this core does not own.
    pub referral: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    fn new(subtree: Dn, state: NodeState) -> Self {
        Self {
            subtree,
            state,
            backends: Vec::new(),
            referral: None,
            children: Vec::new(),
        }
    }
}

/// Outcome of [`MappingTree::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    OperationsError,
    Referral(String),
    Backend { name: String, continuation: bool },
}

/// A pluggable tie-breaker when a node has more than one backend slot.
pub trait DistributionPlugin: Send + Sync {
    fn select(&self, target: &Dn, names: &[String], states: &[BackendSlotState]) -> DistributionOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionOutcome {
    Index(usize),
    AllBackends,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingTreeError {
    #[error("a node already owns suffix '{0}'")]
    SuffixCollision(String),
    #[error("node '{0}' has children and cannot be deleted")]
    HasChildren(String),
    #[error("no node owns suffix '{0}'")]
    NotFound(String),
    #[error("backend '{0}' is not attached to this node")]
    NoSuchBackend(String),
}

type Listener = Box<dyn Fn(&str, BackendSlotState, BackendSlotState) + Send + Sync>;

/// The suffix-rooted routing tree. `mt_lock` is this struct's `root`
/// field's own lock; per-backend drain locks are reached through
/// [`BackendSlot::drain_lock`], independent of it — two separate lock
/// tiers serving two separate purposes.
pub struct MappingTree {
    root: RwLock<Node>,
    listeners: std::sync::Mutex<Vec<(u64, Listener)>>,
    next_handle: AtomicU64,
}

impl MappingTree {
    /// Builds a tree whose root owns the empty suffix, pre-populated
    /// with the well-known private operational containers.
    pub fn new() -> Self {
        let mut root = Node::new(Dn::new(""), NodeState::Container);
        for suffix in ["cn=config", "cn=monitor", "cn=schema"] {
            root.children.push(Node::new(Dn::new(suffix), NodeState::Backend));
        }
        Self {
            root: RwLock::new(root),
            listeners: std::sync::Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub async fn add_node(&self, parent_suffix: &Dn, subtree: Dn, state: NodeState) -> Result<(), MappingTreeError> {
        let mut root = self.root.write().await;
        let parent = find_mut(&mut root, parent_suffix).ok_or_else(|| MappingTreeError::NotFound(parent_suffix.dn().to_string()))?;
        if parent.children.iter().any(|c| c.subtree.ndn() == subtree.ndn()) {
            return Err(MappingTreeError::SuffixCollision(subtree.dn().to_string()));
        }
        parent.children.push(Node::new(subtree, state));
        Ok(())
    }

    pub async fn delete_node(&self, subtree: &Dn) -> Result<(), MappingTreeError> {
        let mut root = self.root.write().await;
        delete_child(&mut root, subtree)
    }

    pub async fn attach_backend(&self, subtree: &Dn, backend: BackendSlot) -> Result<(), MappingTreeError> {
        let mut root = self.root.write().await;
        let node = find_mut(&mut root, subtree).ok_or_else(|| MappingTreeError::NotFound(subtree.dn().to_string()))?;
        node.backends.push(backend);
        Ok(())
    }

    /// Walks from root, descending into the child whose subtree is a
    /// suffix of `target` with the longest normalized length among
    /// matching siblings, until no child matches.
    pub async fn best_match(&self, target: &Dn) -> Node {
        let root = self.root.read().await;
        let mut current = &*root;
        loop {
            let next = current
                .children
                .iter()
                .filter(|c| target.is_under_suffix(&c.subtree))
                .max_by_key(|c| c.subtree.ndn().len());
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        current.clone()
    }

    /// Resolution protocol for one operation. The caller is expected to
    /// hold the returned backend's drain lock in read mode for the
    /// duration of the operation and release it on completion; this
    /// method itself only resolves the target, then releases `mt_lock`.
    pub async fn resolve(
        &self,
        target: &Dn,
        is_write: bool,
        override_referral: bool,
        distribution: Option<&dyn DistributionPlugin>,
    ) -> Resolution {
        let node = self.best_match(target).await;

        match node.state {
            NodeState::Disabled => return Resolution::OperationsError,
            NodeState::Referral if !override_referral => {
                return Resolution::Referral(node.referral.clone().unwrap_or_default());
            }
            NodeState::ReferralOnUpdate if is_write && !override_referral => {
                return Resolution::Referral(node.referral.clone().unwrap_or_default());
            }
            _ => {}
        }

        match node.backends.len() {
            0 => Resolution::OperationsError,
            1 => Resolution::Backend {
                name: node.backends[0].name.clone(),
                continuation: false,
            },
            _ => {
                let names: Vec<String> = node.backends.iter().map(|b| b.name.clone()).collect();
                let states: Vec<BackendSlotState> = node.backends.iter().map(|b| b.state).collect();
                match distribution.map(|d| d.select(target, &names, &states)) {
                    Some(DistributionOutcome::Index(i)) => Resolution::Backend {
                        name: names[i].clone(),
                        continuation: false,
                    },
                    Some(DistributionOutcome::AllBackends) | None => Resolution::Backend {
                        name: names[0].clone(),
                        continuation: true,
                    },
                }
            }
        }
    }

    /// One `(node, backend, referral)` triple per backend slot per
    /// in-scope node, descending children before siblings. A referral at
    /// the scan base is terminal for the whole scan; a referral found
    /// deeper only terminates that subtree.
    pub async fn scan(&self, base: &Dn, one_level: bool) -> Vec<(String, Option<String>, Option<String>)> {
        let root = self.root.read().await;
        let base_node = find(&root, base);
        let Some(base_node) = base_node else { return Vec::new() };

        if let Some(referral) = &base_node.referral {
            return vec![(base_node.subtree.dn().to_string(), None, Some(referral.clone()))];
        }

        let mut out = Vec::new();
        collect_scan(base_node, one_level, &mut out);
        out
    }

    pub async fn set_backend_state(&self, subtree: &Dn, backend_name: &str, new_state: BackendSlotState) -> Result<(), MappingTreeError> {
        let old_state;
        {
            let mut root = self.root.write().await;
            let node = find_mut(&mut root, subtree).ok_or_else(|| MappingTreeError::NotFound(subtree.dn().to_string()))?;
            let slot = node
                .backends
                .iter_mut()
                .find(|b| b.name == backend_name)
                .ok_or_else(|| MappingTreeError::NoSuchBackend(backend_name.to_string()))?;
            old_state = slot.state;
            slot.state = new_state;
        }

        // Drain: acquire the backend's own write lock, blocking until
        // every in-progress read-locker (an in-flight operation) finishes.
        let drain_lock = {
            let root = self.root.read().await;
            find(&root, subtree)
                .and_then(|n| n.backends.iter().find(|b| b.name == backend_name))
                .map(|b| b.drain_lock.clone())
        };
        if let Some(lock) = drain_lock {
            let _ = lock.write().await;
        }

        self.notify_listeners(backend_name, old_state, new_state);
        Ok(())
    }

    /// Registers a backend-state-change listener and returns its handle.
    pub fn register_listener(&self, callback: Listener) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().expect("listener lock poisoned").push((handle, callback));
        handle
    }

    /// Unregistering an unknown handle is a no-op (idempotent).
    pub fn unregister_listener(&self, handle: u64) {
        self.listeners.lock().expect("listener lock poisoned").retain(|(h, _)| *h != handle);
    }

    fn notify_listeners(&self, name: &str, old: BackendSlotState, new: BackendSlotState) {
        for (_, callback) in self.listeners.lock().expect("listener lock poisoned").iter() {
            callback(name, old, new);
        }
    }
}

impl Default for MappingTree {
    fn default() -> Self {
        Self::new()
    }
}

fn find<'a>(node: &'a Node, subtree: &Dn) -> Option<&'a Node> {
    if node.subtree.ndn() == subtree.ndn() {
        return Some(node);
    }
    node.children.iter().find_map(|c| find(c, subtree))
}

fn find_mut<'a>(node: &'a mut Node, subtree: &Dn) -> Option<&'a mut Node> {
    if node.subtree.ndn() == subtree.ndn() {
        return Some(node);
    }
    node.children.iter_mut().find_map(|c| find_mut(c, subtree))
}

fn delete_child(node: &mut Node, subtree: &Dn) -> Result<(), MappingTreeError> {
    if let Some(pos) = node.children.iter().position(|c| c.subtree.ndn() == subtree.ndn()) {
        if !node.children[pos].children.is_empty() {
            return Err(MappingTreeError::HasChildren(subtree.dn().to_string()));
        }
        node.children.remove(pos);
        return Ok(());
    }
    for child in node.children.iter_mut() {
        if delete_child(child, subtree).is_ok() {
            return Ok(());
        }
    }
    Err(MappingTreeError::NotFound(subtree.dn().to_string()))
}

fn collect_scan(node: &Node, one_level: bool, out: &mut Vec<(String, Option<String>, Option<String>)>) {
    if node.backends.is_empty() {
        out.push((node.subtree.dn().to_string(), None, node.referral.clone()));
    }
    for backend in &node.backends {
        out.push((node.subtree.dn().to_string(), Some(backend.name.clone()), node.referral.clone()));
    }
    if one_level {
        return;
    }
    for child in &node.children {
        if child.referral.is_some() {
            out.push((child.subtree.dn().to_string(), None, child.referral.clone()));
            continue;
        }
        collect_scan(child, one_level, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn best_match_picks_the_longest_matching_suffix() {
        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Backend).await.unwrap();
        tree.add_node(&Dn::new("o=x"), Dn::new("ou=people,o=x"), NodeState::Backend).await.unwrap();

        let node = tree.best_match(&Dn::new("uid=a,ou=people,o=x")).await;
        assert_eq!(node.subtree.dn(), "ou=people,o=x");
    }

    #[tokio::test]
    async fn resolve_returns_operations_error_for_disabled_node() {
        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Disabled).await.unwrap();

        let resolution = tree.resolve(&Dn::new("o=x"), false, false, None).await;
        assert_eq!(resolution, Resolution::OperationsError);
    }

    #[tokio::test]
    async fn resolve_returns_referral_unless_overridden() {
        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Referral).await.unwrap();
        tree.attach_backend(&Dn::new("o=x"), BackendSlot::new("unused")).await.unwrap();

        {
            let mut root = tree.root.write().await;
            find_mut(&mut root, &Dn::new("o=x")).unwrap().referral = Some("ldap://elsewhere/o=x".to_string());
        }

        let resolution = tree.resolve(&Dn::new("o=x"), false, false, None).await;
        assert_eq!(resolution, Resolution::Referral("ldap://elsewhere/o=x".to_string()));

        let overridden = tree.resolve(&Dn::new("o=x"), false, true, None).await;
        assert!(matches!(overridden, Resolution::Backend { .. }));
    }

    #[tokio::test]
    async fn resolve_single_backend_picks_it_without_a_distribution_plugin() {
        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Backend).await.unwrap();
        tree.attach_backend(&Dn::new("o=x"), BackendSlot::new("db1")).await.unwrap();

        let resolution = tree.resolve(&Dn::new("cn=a,o=x"), false, false, None).await;
        assert_eq!(
            resolution,
            Resolution::Backend {
                name: "db1".to_string(),
                continuation: false
            }
        );
    }

    #[tokio::test]
    async fn delete_is_refused_while_children_exist() {
        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Backend).await.unwrap();
        tree.add_node(&Dn::new("o=x"), Dn::new("ou=people,o=x"), NodeState::Backend).await.unwrap();

        assert_eq!(
            tree.delete_node(&Dn::new("o=x")).await,
            Err(MappingTreeError::HasChildren("o=x".to_string()))
        );
    }

    #[tokio::test]
    async fn backend_state_transition_notifies_listeners() {
        use std::sync::{Arc, Mutex};

        let tree = MappingTree::new();
        tree.add_node(&Dn::new(""), Dn::new("o=x"), NodeState::Backend).await.unwrap();
        tree.attach_backend(&Dn::new("o=x"), BackendSlot::new("db1")).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        tree.register_listener(Box::new(move |name, old, new| {
            seen_clone.lock().unwrap().push((name.to_string(), old, new));
        }));

        tree.set_backend_state(&Dn::new("o=x"), "db1", BackendSlotState::Offline).await.unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], ("db1".to_string(), BackendSlotState::On, BackendSlotState::Offline));
    }
}

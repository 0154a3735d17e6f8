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

//! Persistent-search (refreshAndPersist) session engine.
//!
//! One worker per session pops queued changes and hands them to a
//! delivery closure; `register`/`unregister` keep a process-wide cap on
//! how many sessions can be active at once, grounded on the same
//! notify-driven timed-wait shape the sync persist design calls for
//! (an async mutex plus `tokio::sync::Notify` standing in for the
//! condition variable a thread-based implementation would use).

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use ldap_core::csn::Csn;
use ldap_core::dn::Dn;
use ldap_core::uuid::Uuid;

use crate::reduction::SyncAction;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Too many active synchronization sessions")]
    TooManySessions,
}

#[derive(Debug, Clone)]
pub struct SyncQueueNode {
    pub dn: Dn,
    pub entry_uuid: Uuid,
    pub action: SyncAction,
    pub csn: Csn,
}

/// One refreshAndPersist session's queue and lifecycle flags.
pub struct Session {
    id: u64,
    pub server_sig: String,
    pub client_sig: String,
    queue: Mutex<VecDeque<SyncQueueNode>>,
    notify: Notify,
    active: AtomicBool,
    complete: AtomicBool,
}

impl Session {
    fn new(id: u64, server_sig: String, client_sig: String) -> Self {
        Self {
            id,
            server_sig,
            client_sig,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            active: AtomicBool::new(false),
            complete: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// A session only receives queued changes once its initial refresh
    /// has finished; before that, post-ops still observed during
    /// refresh are queued but not yet drained.
    pub fn mark_active(&self) {
        self.active.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    async fn enqueue(&self, node: SyncQueueNode) {
        self.queue.lock().await.push_back(node);
        self.notify.notify_waiters();
    }

    /// The worker loop for this session: pop queued changes one at a
    /// time and hand each to `deliver`. A `mark_complete` only ends the
    /// session once its queue has drained — changes already queued
    /// before completion still get delivered. Exits early if
    /// `is_abandoned` reports true, and never holds the queue lock
    /// while `deliver` runs.
    pub async fn run<F, Fut>(self: Arc<Self>, is_abandoned: impl Fn() -> bool, mut deliver: F)
    where
        F: FnMut(SyncQueueNode) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        loop {
            if is_abandoned() {
                break;
            }
            if !self.active.load(Ordering::SeqCst) {
                self.wait_up_to_one_second().await;
                continue;
            }
            let next = self.queue.lock().await.pop_front();
            match next {
                Some(node) => {
                    if let Err(err) = deliver(node).await {
                        warn!("sync session {} delivery failed, ending session: {}", self.id, err);
                        break;
                    }
                }
                None => {
                    if self.is_complete() {
                        break;
                    }
                    self.wait_up_to_one_second().await;
                }
            }
        }
    }

    async fn wait_up_to_one_second(&self) {
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
}

/// Process-wide registry of active persistent-search sessions.
pub struct PersistEngine {
    max_sessions: usize,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
    next_id: AtomicU64,
}

impl PersistEngine {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn register(&self, server_sig: String, client_sig: String) -> Result<Arc<Session>, SyncError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_sessions {
            return Err(SyncError::TooManySessions);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(Session::new(id, server_sig, client_sig));
        sessions.insert(id, session.clone());
        Ok(session)
    }

    pub async fn unregister(&self, id: u64) {
        self.sessions.lock().await.remove(&id);
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Enqueue `node` on every registered session whose scope predicate
    /// (built from the session's own base/filter by the caller) matches
    /// its DN.
    pub async fn notify_change(&self, node: SyncQueueNode, in_scope: impl Fn(&Session, &Dn) -> bool) {
        let sessions = self.sessions.lock().await;
        for session in sessions.values() {
            if in_scope(session, &node.dn) {
                session.enqueue(node.clone()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn node(dn: &str) -> SyncQueueNode {
        SyncQueueNode {
            dn: Dn::new(dn),
            entry_uuid: Uuid::from_bytes([1; 16]),
            action: SyncAction::Add,
            csn: Csn::new(1, 0, 1, 0),
        }
    }

    #[tokio::test]
    async fn register_enforces_the_session_cap() {
        let engine = PersistEngine::new(1);
        let first = engine.register("srv".into(), "a".into()).await;
        assert!(first.is_ok());

        let second = engine.register("srv".into(), "b".into()).await;
        assert_eq!(second.unwrap_err(), SyncError::TooManySessions);
    }

    #[tokio::test]
    async fn unregister_frees_a_cap_slot() {
        let engine = PersistEngine::new(1);
        let session = engine.register("srv".into(), "a".into()).await.unwrap();
        engine.unregister(session.id()).await;

        assert!(engine.register("srv".into(), "b".into()).await.is_ok());
    }

    #[tokio::test]
    async fn worker_delivers_queued_nodes_and_stops_on_complete() {
        let engine = PersistEngine::new(4);
        let session = engine.register("srv".into(), "a".into()).await.unwrap();
        session.mark_active();

        engine
            .notify_change(node("uid=a,o=example"), |_, _| true)
            .await;
        session.mark_complete();

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = delivered.clone();
        session
            .clone()
            .run(
                || false,
                move |_node| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }
}

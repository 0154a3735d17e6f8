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

//! Per-connection operation bookkeeping.
//!
//! Grounded on the per-connection dispatch shape of a trait with a
//! required accessor and default async hook methods, and on
//! `ldap_network`'s `LdapClient` for the actual transport.

use std::collections::HashMap;
use std::sync::Arc;

use ldap_core::dn::Dn;
use log::debug;
use tokio::sync::Mutex;

pub type MessageId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Processing,
    Abandoned,
    WillComplete,
    ResultSent,
}

/// One in-flight operation, keyed by its LDAPMessage `message-id`.
pub struct Operation {
    pub message_id: MessageId,
    pub status: OperationStatus,
    pub target: Dn,
    pub result_handler: Option<Box<dyn FnOnce() + Send>>,
    pub entry_handler: Option<Box<dyn Fn(&Dn) + Send + Sync>>,
    pub referral_handler: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl Operation {
    pub fn new(message_id: MessageId, target: Dn) -> Self {
        Self {
            message_id,
            status: OperationStatus::Processing,
            target,
            result_handler: None,
            entry_handler: None,
            referral_handler: None,
        }
    }
}

/// Outcome of one plug-in hook point in the dispatch chain.
pub enum HookOutcome {
    Continue,
    Stop(Result<(), String>),
}

/// Named hook points a connection core fires around an operation's
/// lifecycle. Non-exhaustive by design — extended-op hooks are keyed by
/// OID at the call site rather than enumerated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreBind,
    PostBind,
    PreUnbind,
    PostUnbind,
    PreSearch,
    PostSearchEntry,
    PreResult,
    PostResult,
    PreAdd,
    PostAdd,
    PreModify,
    PostModify,
    PreModrdn,
    PostModrdn,
    PreDelete,
    PostDelete,
    PreAbandon,
    PostAbandon,
    BackendPre,
    BackendPost,
    InternalPre,
    InternalPost,
}

pub type Hook = Box<dyn Fn() -> HookOutcome + Send + Sync>;

#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookPoint, Vec<Hook>>,
}

impl HookRegistry {
    pub fn register(&mut self, point: HookPoint, hook: Hook) {
        self.hooks.entry(point).or_default().push(hook);
    }

    /// Runs every hook registered at `point` in registration order,
    /// stopping at the first `HookOutcome::Stop`.
    pub fn run(&self, point: HookPoint) -> HookOutcome {
        for hook in self.hooks.get(&point).into_iter().flatten() {
            if let HookOutcome::Stop(result) = hook() {
                return HookOutcome::Stop(result);
            }
        }
        HookOutcome::Continue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStrengthFactor {
    None,
    Weak,
    Strong,
}

#[derive(Default)]
pub struct Counters {
    pub ops_initiated: u64,
    pub ops_completed: u64,
    pub refcnt: u64,
}

/// Per-connection state: one per accepted TCP connection, guarded by
/// its own `Mutex` so at most one task mutates operation bookkeeping at
/// a time, plus a dedicated PDU-write mutex so at most one reply is
/// ever serialized onto the wire concurrently.
pub struct Connection {
    pub client: ldap_network::LdapClient,
    operations: Mutex<HashMap<MessageId, Operation>>,
    write_lock: Mutex<()>,
    pub counters: Mutex<Counters>,
    pub authenticated_dn: Mutex<Option<Dn>>,
    pub ssf: SecurityStrengthFactor,
    pub hooks: Arc<HookRegistry>,
}

impl Connection {
    pub fn new(client: ldap_network::LdapClient, hooks: Arc<HookRegistry>) -> Self {
        Self {
            client,
            operations: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
            counters: Mutex::new(Counters::default()),
            authenticated_dn: Mutex::new(None),
            ssf: SecurityStrengthFactor::None,
            hooks,
        }
    }

    pub async fn begin_operation(&self, message_id: MessageId, target: Dn) {
        let mut ops = self.operations.lock().await;
        ops.insert(message_id, Operation::new(message_id, target));
        drop(ops);
        self.counters.lock().await.ops_initiated += 1;
    }

    pub async fn complete_operation(&self, message_id: MessageId) {
        let mut ops = self.operations.lock().await;
        if let Some(op) = ops.get_mut(&message_id) {
            op.status = OperationStatus::ResultSent;
        }
        drop(ops);
        self.counters.lock().await.ops_completed += 1;
    }

    /// Sends a reply while holding the PDU-write mutex, so concurrent
    /// operations on the same connection never interleave responses.
    pub async fn send_reply(&mut self, encoded: Vec<u8>) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.client.enqueue(encoded);
        self.client.flush().await
    }

    /// Finds the operation with `target_msgid` under the connection
    /// mutex and abandons it. No LDAP response is ever emitted for
    /// abandon, per protocol; a not-found target is logged at `debug`
    /// and otherwise silently ignored.
    pub async fn abandon(&self, self_msgid: MessageId, target_msgid: MessageId) {
        if self_msgid == target_msgid {
            return;
        }
        let mut ops = self.operations.lock().await;
        match ops.get_mut(&target_msgid) {
            Some(op) if op.status != OperationStatus::ResultSent => {
                if let HookOutcome::Stop(_) = self.hooks.run(HookPoint::PreAbandon) {
                    return;
                }
                op.status = OperationStatus::Abandoned;
                self.hooks.run(HookPoint::PostAbandon);
            }
            Some(_) => {}
            None => {
                debug!("abandon: targetop=NOTFOUND msgid={}", target_msgid);
            }
        }
    }

    pub async fn operation_status(&self, message_id: MessageId) -> Option<OperationStatus> {
        self.operations.lock().await.get(&message_id).map(|op| op.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_client() -> ldap_network::LdapClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        drop(accepted.unwrap());
        ldap_network::LdapClient::new(connected.unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn abandon_of_unknown_msgid_is_a_silent_no_op() {
        let conn = Connection::new(test_client().await, Arc::new(HookRegistry::default()));
        conn.abandon(1, 99).await;
        assert_eq!(conn.operation_status(99).await, None);
    }

    #[tokio::test]
    async fn abandon_transitions_a_processing_operation() {
        let conn = Connection::new(test_client().await, Arc::new(HookRegistry::default()));
        conn.begin_operation(2, Dn::new("o=x")).await;

        conn.abandon(1, 2).await;

        assert_eq!(conn.operation_status(2).await, Some(OperationStatus::Abandoned));
    }

    #[tokio::test]
    async fn abandon_leaves_a_result_sent_operation_untouched() {
        let conn = Connection::new(test_client().await, Arc::new(HookRegistry::default()));
        conn.begin_operation(3, Dn::new("o=x")).await;
        conn.complete_operation(3).await;

        conn.abandon(1, 3).await;

        assert_eq!(conn.operation_status(3).await, Some(OperationStatus::ResultSent));
    }

    #[tokio::test]
    async fn abandon_cannot_target_itself() {
        let conn = Connection::new(test_client().await, Arc::new(HookRegistry::default()));
        conn.begin_operation(4, Dn::new("o=x")).await;

        conn.abandon(4, 4).await;

        assert_eq!(conn.operation_status(4).await, Some(OperationStatus::Processing));
    }

    #[tokio::test]
    async fn pre_abandon_hook_can_stop_the_chain() {
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();
        let mut hooks = HookRegistry::default();
        hooks.register(
            HookPoint::PreAbandon,
            Box::new(move || {
                stopped_clone.store(true, Ordering::SeqCst);
                HookOutcome::Stop(Ok(()))
            }),
        );

        let conn = Connection::new(test_client().await, Arc::new(hooks));
        conn.begin_operation(5, Dn::new("o=x")).await;

        conn.abandon(1, 5).await;

        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(conn.operation_status(5).await, Some(OperationStatus::Processing));
    }
}

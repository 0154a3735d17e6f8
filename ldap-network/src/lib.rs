/*
    This file is part of Donet.

    Copyright © 2024 Max Rodriguez

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

pub mod tcp;

use log::debug;
use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// One LDAP client's TCP transport: the raw socket plus a queue of
/// already-BER-encoded outbound `LDAPMessage` buffers awaiting a flush.
/// Queuing whole encoded messages (rather than individual bytes) keeps
/// one caller's multi-response search from interleaving with another
/// operation's response on the same connection.
pub struct LdapClient {
    socket: Option<TcpStream>,
    remote: SocketAddr,
    local: SocketAddr,
    queue: Vec<Vec<u8>>,
    is_sending: bool,
}

impl LdapClient {
    pub async fn new(socket: TcpStream) -> Result<Self> {
        Ok(Self {
            remote: socket.peer_addr()?,
            local: socket.local_addr()?,
            socket: Some(socket),
            queue: vec![],
            is_sending: false,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Queues an encoded `LDAPMessage` for this connection. Callers flush
    /// with [`LdapClient::flush`] once the queue should be drained.
    pub fn enqueue(&mut self, message: Vec<u8>) {
        self.queue.push(message);
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.is_sending {
            return Ok(());
        }
        self.is_sending = true;
        let result = self.write_queue().await;
        self.is_sending = false;
        result
    }

    async fn write_queue(&mut self) -> Result<()> {
        let Some(sock) = &mut self.socket else {
            return Err(Error::new(ErrorKind::NotConnected, "client has no socket"));
        };
        while let Some(message) = self.queue.first() {
            sock.write_all(message).await?;
            self.queue.remove(0);
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(sock) = &mut self.socket {
            self.queue.clear();
            sock.shutdown().await?;
        } else {
            debug!("Tried to disconnect client with no existing socket!");
            return Err(Error::new(ErrorKind::NotConnected, "Client has no socket!"));
        }

        // Dropping the `TcpStream` will disconnect the client for us.
        let _: TcpStream = self.socket.take().unwrap();
        Ok(())
    }
}

// Copyright (C) The Ifrit Authors.
// This file is part of the ifrit library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{ca, Config};

use ifrit_identity::{Identity, PeerId};
use ifrit_node::{GossipHandler, MessageHandler, Node};
use ifrit_node_tcp::Tcp;

use anyhow::Result;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// The surface an embedding application uses: a running membership node plus
/// payload delivery on top of it.
pub struct Client {
    node: Node,
    tcp: Tcp,
    entry_addrs: Vec<String>,
}

impl Client {
    /// Initializes a new client from the given configuration. The listener is
    /// bound to an ephemeral port first so the certificate can advertise the
    /// final address.
    pub async fn new(config: Config) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", 0)).await?;
        let port = listener.local_addr()?.port();
        let host = local_ip().unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));
        let addr = format!("{host}:{port}");

        let identity = if config.ca {
            let identity = Identity::generate(config.num_rings, &addr, &addr, &addr)?;
            let certificate = ca::certificate_from_ca(&config.ca_addr, identity.certificate().der()).await?;
            identity.with_certificate(certificate)?
        } else {
            Identity::generate(config.num_rings, &addr, &addr, &addr)?
        };
        let identity = Arc::new(identity);

        let tcp = Tcp::from_listener(listener, identity.clone(), Tcp::MAXIMUM_CONCURRENT_STREAMS)?;
        let node = Node::new(identity, Arc::new(tcp.clone()))?;

        Ok(Self { node, tcp, entry_addrs: config.entry_addrs })
    }

    /// Starts serving inbound exchanges, the protocol loops, and the
    /// bootstrap exchange with every entry address.
    pub async fn start(&self) -> Result<()> {
        self.tcp.enable_listener(Arc::new(self.node.clone()))?;
        self.node.start();
        self.node.join(&self.entry_addrs).await;
        info!("Client started on '{}'", self.addr());
        Ok(())
    }

    /// Stops the client's loops and listener.
    pub fn stop(&self) {
        self.node.shut_down();
        self.tcp.shut_down();
    }

    /// Returns the identifier of the local node.
    pub fn id(&self) -> PeerId {
        self.node.id()
    }

    /// Returns the address the client serves exchanges on.
    pub fn addr(&self) -> String {
        self.node.addr()
    }

    /// Returns the identifiers of every peer currently considered alive.
    pub fn members(&self) -> Vec<PeerId> {
        self.node.members()
    }

    /// Delivers a payload to the given peer; the reply arrives on the
    /// returned channel.
    pub fn send_to(&self, id: PeerId, payload: Vec<u8>) -> oneshot::Receiver<Result<Vec<u8>>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let node = self.node.clone();
        tokio::spawn(async move {
            let _ = reply_tx.send(node.send_to(&id, payload).await);
        });
        reply_rx
    }

    /// Delivers a payload to every live peer. Returns the channel the replies
    /// arrive on and the number of recipients.
    pub fn send_to_all(&self, payload: Vec<u8>) -> (mpsc::Receiver<Result<Vec<u8>>>, usize) {
        let recipients: Vec<PeerId> =
            self.node.members().into_iter().filter(|id| *id != self.node.id()).collect();
        let count = recipients.len();
        let (reply_tx, reply_rx) = mpsc::channel(count.max(1));

        for id in recipients {
            let node = self.node.clone();
            let reply_tx = reply_tx.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                let _ = reply_tx.send(node.send_to(&id, payload).await).await;
            });
        }
        (reply_rx, count)
    }

    /// Registers the handler invoked on direct application payloads.
    pub fn register_msg_handler(&self, handler: MessageHandler) {
        self.node.register_msg_handler(handler);
    }

    /// Registers the handler invoked on gossip-carried application payloads.
    pub fn register_gossip_handler(&self, handler: GossipHandler) {
        self.node.register_gossip_handler(handler);
    }

    /// Sets the payload attached to every outbound gossip exchange.
    pub fn set_gossip_content(&self, content: Vec<u8>) {
        self.node.set_gossip_content(content);
    }

    /// Returns the underlying node.
    pub fn node(&self) -> &Node {
        &self.node
    }
}

/// Returns the address of the interface holding the default route, without
/// sending any traffic.
fn local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    Some(socket.local_addr().ok()?.ip())
}

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

#![forbid(unsafe_code)]

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;

mod eval;
mod gossip;
mod monitor;
mod routing;

use ifrit_identity::{Identity, PeerId};
use ifrit_node_messages::{full_mask, Note};
use ifrit_node_tcp::Transport;
use ifrit_node_view::{Peer, View};

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The callback invoked on every direct application payload; its return value
/// is sent back to the sender.
pub type MessageHandler = Box<dyn Fn(Vec<u8>) -> Result<Vec<u8>> + Send + Sync>;

/// The callback invoked on every application payload carried by gossip.
pub type GossipHandler = Box<dyn Fn(Vec<u8>) + Send + Sync>;

/// The composition root of the membership protocol: owns the local identity
/// and view, runs the gossip and monitoring loops, and exposes the message
/// API the transport dispatches into.
#[derive(Clone)]
pub struct Node(Arc<InnerNode>);

impl Deref for Node {
    type Target = Arc<InnerNode>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct InnerNode {
    /// The signing identity of the local node.
    pub(crate) identity: Arc<Identity>,
    /// The local database of known peers.
    view: View,
    /// The authenticated transport capabilities.
    pub(crate) transport: Arc<dyn Transport>,
    /// The ring mask the local node declares in its notes.
    mask: u32,
    /// The payload attached to every outbound Spread, if any.
    pub(crate) gossip_content: RwLock<Option<Vec<u8>>>,
    /// The registered direct-message handler.
    pub(crate) msg_handler: RwLock<Option<MessageHandler>>,
    /// The registered gossip-payload handler.
    pub(crate) gossip_handler: RwLock<Option<GossipHandler>>,
    /// The spawned handles.
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// The shutdown signal.
    shutdown: Arc<AtomicBool>,
}

impl Node {
    /// The interval between outbound gossip rounds.
    const GOSSIP_INTERVAL_IN_SECS: u64 = 10;
    /// The maximum number of liveness probes per monitoring round, across all
    /// rings.
    const MAX_PINGS_PER_ROUND: usize = 3;
    /// The interval between monitoring rounds.
    const MONITOR_INTERVAL_IN_SECS: u64 = 10;
    /// How long an accused peer has to rebut before it is evicted.
    const REBUTTAL_DEADLINE_IN_SECS: u64 = 60;
    /// The interval at which the deadline dispatcher scans for expiries.
    const TIMER_SCAN_INTERVAL_IN_SECS: u64 = 1;

    /// Initializes a new node around the given identity and transport, and
    /// publishes the local note at epoch 1.
    pub fn new(identity: Arc<Identity>, transport: Arc<dyn Transport>) -> Result<Self> {
        let certificate = identity.certificate().clone();
        let num_rings = certificate.num_rings();
        let mask = full_mask(num_rings);
        let view = View::new(Peer::new(certificate), num_rings);

        let node = Self(Arc::new(InnerNode {
            identity,
            view,
            transport,
            mask,
            gossip_content: Default::default(),
            msg_handler: Default::default(),
            gossip_handler: Default::default(),
            handles: Default::default(),
            shutdown: Default::default(),
        }));
        node.publish_note(1);
        Ok(node)
    }

    /// Starts the gossip loop, the failure detector, and the deadline
    /// dispatcher.
    pub fn start(&self) {
        self.initialize_gossip();
        self.initialize_monitor();
        self.initialize_timers();
    }

    /// Performs an initial exchange with each bootstrap address. An empty
    /// list means the node operates alone until someone contacts it.
    pub async fn join(&self, entry_addrs: &[String]) {
        for addr in entry_addrs {
            let state = self.build_state();
            match self.transport.spread(addr, state).await {
                Ok(response) => {
                    self.merge_response(response);
                    info!("Joined the network via '{addr}'");
                }
                Err(error) => warn!("Unable to bootstrap from '{addr}' - {error}"),
            }
        }
    }

    /// Shuts down the node's loops. Cancellation is cooperative; each loop
    /// also observes the flag at its tick boundaries.
    pub fn shut_down(&self) {
        info!("Shutting down...");
        self.shutdown.store(true, Ordering::SeqCst);
        self.handles.lock().iter().for_each(|handle| handle.abort());
    }

    /// Returns the identifier of the local node.
    pub fn id(&self) -> PeerId {
        self.view.self_id()
    }

    /// Returns the local view.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Returns the address the local node serves gossip exchanges on.
    pub fn addr(&self) -> String {
        self.identity.certificate().service_addr().to_string()
    }

    /// Returns the identifiers of every peer currently considered alive.
    pub fn members(&self) -> Vec<PeerId> {
        self.view.live_ids()
    }

    /// Delivers an application payload to the given peer and returns its
    /// reply.
    pub async fn send_to(&self, id: &PeerId, payload: Vec<u8>) -> Result<Vec<u8>> {
        let peer = self.view.peer(id).ok_or_else(|| anyhow!("unknown peer '{id}'"))?;
        let addr = peer.certificate().service_addr().to_string();
        self.transport.send(&addr, payload).await
    }

    /// Sets the payload attached to every outbound Spread.
    pub fn set_gossip_content(&self, content: Vec<u8>) {
        *self.gossip_content.write() = Some(content);
    }

    /// Registers the handler invoked on direct application payloads.
    pub fn register_msg_handler(&self, handler: MessageHandler) {
        *self.msg_handler.write() = Some(handler);
    }

    /// Registers the handler invoked on gossip-carried application payloads.
    pub fn register_gossip_handler(&self, handler: GossipHandler) {
        *self.gossip_handler.write() = Some(handler);
    }

    /// Signs and publishes a local note at the given epoch.
    pub(crate) fn publish_note(&self, epoch: u64) {
        let note = Note::new(self.id(), epoch, self.mask, self.identity.keypair());
        self.view.self_peer().set_note(note);
        self.view.add_live(self.id());
    }

    /// Spawns a long-running task onto the node's handle set.
    pub(crate) fn spawn<T: Future<Output = ()> + Send + 'static>(&self, future: T) {
        self.handles.lock().push(tokio::spawn(future));
    }

    /// Returns `true` once shutdown has been signalled.
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

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

use ifrit_identity::{Identity, PeerId};
use ifrit_node::Node;
use ifrit_node_messages::{full_mask, Note, State, StateResponse};
use ifrit_node_tcp::Transport;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use std::sync::Arc;

pub const NUM_RINGS: u32 = 32;

/// A transport whose calls never reach a network; the protocol logic under
/// test runs entirely against the local view.
pub struct StubTransport;

#[async_trait::async_trait]
impl Transport for StubTransport {
    async fn spread(&self, _addr: &str, _state: State) -> Result<StateResponse> {
        bail!("the stub transport reaches no network")
    }

    async fn ping(&self, _addr: &str) -> Result<()> {
        bail!("the stub transport reaches no network")
    }

    async fn send(&self, _addr: &str, _payload: Vec<u8>) -> Result<Vec<u8>> {
        bail!("the stub transport reaches no network")
    }
}

/// Returns a fresh identity with placeholder addresses.
pub fn sample_identity() -> Identity {
    Identity::generate(NUM_RINGS, "127.0.0.1:0", "127.0.0.1:0", "127.0.0.1:0").unwrap()
}

/// Returns a node wired to the stub transport.
pub fn sample_node() -> Node {
    Node::new(Arc::new(sample_identity()), Arc::new(StubTransport)).unwrap()
}

/// Seeds the node with synthetic peers, each alive at epoch 1.
pub fn seed_peers(node: &Node, count: usize) -> Vec<Identity> {
    (0..count)
        .map(|_| {
            let identity = sample_identity();
            node.eval_certificate(identity.certificate()).unwrap();
            node.eval_note(&Note::new(identity.id(), 1, full_mask(NUM_RINGS), identity.keypair())).unwrap();
            identity
        })
        .collect()
}

/// Builds a caller digest that matches the node's view exactly.
pub fn exhaustive_state(node: &Node, caller: &Identity) -> State {
    let mut existing = IndexMap::new();
    for peer in node.view().full() {
        existing.insert(peer.id(), peer.note_epoch());
    }
    State {
        own_note: Note::new(caller.id(), 1, full_mask(NUM_RINGS), caller.keypair()),
        existing,
        content: None,
    }
}

/// Returns a seeded identity adjacent to the node on some ring, excluding the
/// given identifiers.
pub fn find_neighbour<'a>(node: &Node, peers: &'a [Identity], excluded: &[PeerId]) -> &'a Identity {
    peers
        .iter()
        .find(|identity| {
            !excluded.contains(&identity.id()) && node.view().should_be_neighbour(&identity.id())
        })
        .expect("some seeded peer is adjacent to the node")
}

/// Returns a seeded identity that is not adjacent to the node on any ring.
pub fn find_non_neighbour<'a>(node: &Node, peers: &'a [Identity]) -> &'a Identity {
    peers
        .iter()
        .find(|identity| !node.view().should_be_neighbour(&identity.id()))
        .expect("with enough peers, someone is not adjacent to the node")
}

/// Returns a seeded identity that monitors `target` on some ring, along with
/// that ring number.
pub fn find_monitor<'a>(node: &Node, peers: &'a [Identity], target: &PeerId) -> (&'a Identity, u32) {
    for identity in peers {
        for ring in 1..=NUM_RINGS {
            if node.view().is_ring_predecessor(&identity.id(), target, ring) {
                return (identity, ring);
            }
        }
    }
    panic!("no seeded peer monitors the target");
}

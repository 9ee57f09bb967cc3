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

use crate::Node;

use ifrit_identity::{Certificate, PeerId};
use ifrit_node_messages::{ProtocolError, State, StateResponse};
use ifrit_node_tcp::Transport;

use indexmap::IndexMap;
use std::time::Duration;

impl Node {
    /// Starts the periodic outbound gossip loop.
    pub(crate) fn initialize_gossip(&self) {
        let node = self.clone();
        self.spawn(async move {
            loop {
                if node.is_shutting_down() {
                    break;
                }
                node.gossip_round().await;
                tokio::time::sleep(Duration::from_secs(Node::GOSSIP_INTERVAL_IN_SECS)).await;
            }
        });
    }

    /// Performs one gossip round: a Spread exchange with the ring successor
    /// on every active ring.
    async fn gossip_round(&self) {
        for target in self.view().gossip_targets() {
            if self.is_shutting_down() {
                return;
            }
            let addr = target.certificate().service_addr().to_string();
            let state = self.build_state();
            match self.transport.spread(&addr, state).await {
                Ok(response) => self.merge_response(response),
                Err(error) => debug!("Unable to gossip with '{}' - {error}", target.id()),
            }
        }
    }

    /// Builds the digest of the local view sent with an outbound Spread.
    pub fn build_state(&self) -> State {
        let own_note =
            self.view().self_peer().note().expect("the local note is published at construction");
        let mut existing = IndexMap::new();
        for peer in self.view().full() {
            existing.insert(peer.id(), peer.note_epoch());
        }
        State { own_note, existing, content: self.gossip_content.read().clone() }
    }

    /// Handles an inbound Spread exchange from an authenticated caller.
    ///
    /// An unknown caller with a valid certificate is admitted and seeded with
    /// the certificates and notes of its ring neighbours plus the local node.
    /// A known caller must be a ring neighbour; everything else is answered
    /// with whatever its digest shows it is missing.
    pub fn handle_spread(&self, caller: &Certificate, state: State) -> Result<StateResponse, ProtocolError> {
        let caller_id = caller.id();
        let is_new = !self.view().contains(&caller_id);
        self.eval_certificate(caller)?;

        let mut reply = StateResponse::default();
        if is_new {
            debug!("Seeding the bootstrapping peer '{caller_id}'");
            if let Err(error) = self.eval_note(&state.own_note) {
                trace!("Ignored the note of '{caller_id}' - {error}");
            }
            self.deliver_gossip_content(state.content);

            let mut seed = self.view().find_neighbours(&caller_id);
            if !seed.iter().any(|peer| peer.id() == self.id()) {
                seed.push(self.view().self_peer());
            }
            for peer in seed {
                if peer.id() == caller_id {
                    continue;
                }
                reply.certificates.push(peer.certificate().der().to_vec());
                if let Some(note) = peer.note() {
                    reply.notes.push(note);
                }
            }
            return Ok(reply);
        }

        if !self.view().should_be_neighbour(&caller_id) {
            return Err(ProtocolError::NotMyNeighbour);
        }

        if let Err(error) = self.eval_note(&state.own_note) {
            trace!("Ignored the note of '{caller_id}' - {error}");
        }
        self.deliver_gossip_content(state.content);
        self.merge_views(&state.existing, &mut reply);
        Ok(reply)
    }

    /// Fills the reply with everything the caller's digest shows it is
    /// missing: certificates for peers it does not know, notes newer than the
    /// epochs it holds, and accusations for peers it holds at the same epoch
    /// without knowing they are accused. Peers the caller is ahead on are
    /// left out; it will push them in its own exchanges.
    fn merge_views(&self, existing: &IndexMap<PeerId, u64>, reply: &mut StateResponse) {
        for peer in self.view().full() {
            let id = peer.id();
            match existing.get(&id) {
                None => {
                    reply.certificates.push(peer.certificate().der().to_vec());
                    if self.view().is_alive(&id) {
                        if let Some(note) = peer.note() {
                            reply.notes.push(note);
                        }
                    }
                }
                Some(&held_epoch) => {
                    let local_epoch = peer.note_epoch();
                    if local_epoch > held_epoch {
                        if let Some(note) = peer.note() {
                            reply.notes.push(note);
                        }
                    } else if local_epoch == held_epoch && peer.is_accused() {
                        reply.accusations.extend(peer.accusations());
                    }
                }
            }
        }
    }

    /// Merges a Spread response into the view. Certificates are applied
    /// first so note and accusation signatures can be checked; notes are
    /// applied before accusations so a note carrying the same epoch as a
    /// stale accusation voids it within the round.
    pub fn merge_response(&self, response: StateResponse) {
        for der in &response.certificates {
            if let Err(error) = self.eval_certificate_der(der) {
                match error {
                    ProtocolError::SelfCertificate => trace!("Skipped our own certificate"),
                    _ => debug!("Discarded a certificate - {error}"),
                }
            }
        }
        for note in &response.notes {
            if let Err(error) = self.eval_note(note) {
                trace!("Discarded a note for '{}' - {error}", note.id());
            }
        }
        for accusation in &response.accusations {
            if let Err(error) = self.eval_accusation(accusation) {
                debug!("Discarded an accusation against '{}' - {error}", accusation.accused());
            }
        }
    }

    /// Hands a gossip-carried application payload to the registered handler.
    fn deliver_gossip_content(&self, content: Option<Vec<u8>>) {
        if let Some(content) = content {
            if let Some(handler) = self.gossip_handler.read().as_ref() {
                handler(content);
            }
        }
    }
}

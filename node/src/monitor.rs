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

use ifrit_node_messages::{Accusation, ProtocolError};
use ifrit_node_tcp::Transport;
use ifrit_node_view::Peer;

use std::time::Duration;

impl Node {
    /// Starts the periodic failure-detector loop.
    pub(crate) fn initialize_monitor(&self) {
        let node = self.clone();
        self.spawn(async move {
            loop {
                if node.is_shutting_down() {
                    break;
                }
                node.monitor_round().await;
                tokio::time::sleep(Duration::from_secs(Node::MONITOR_INTERVAL_IN_SECS)).await;
            }
        });
    }

    /// Performs one monitoring round: probes the ring successor on every
    /// active ring, bounded to a fixed number of probes, and accuses whoever
    /// fails to answer.
    async fn monitor_round(&self) {
        for (ring, target) in self.view().monitor_targets().into_iter().take(Self::MAX_PINGS_PER_ROUND) {
            if self.is_shutting_down() {
                return;
            }
            let addr = target.certificate().ping_addr().to_string();
            match self.transport.ping(&addr).await {
                Ok(()) => trace!("'{}' answered the probe for ring {ring}", target.id()),
                Err(error) => {
                    warn!("No response from '{}' on ring {ring} - {error}", target.id());
                    self.accuse(ring, &target);
                }
            }
        }
    }

    /// Signs an accusation against the given peer and applies it locally; the
    /// next gossip round carries it outwards like any other artifact.
    pub(crate) fn accuse(&self, ring: u32, target: &Peer) {
        let note = match target.note() {
            Some(note) => note,
            // Without a note there is no epoch to anchor the accusation to.
            None => return,
        };
        let accusation = Accusation::new(ring, target.id(), self.id(), note.epoch(), self.identity.keypair());
        match self.eval_accusation(&accusation) {
            Ok(()) => debug!("Accused '{}' on ring {ring}", target.id()),
            Err(ProtocolError::AccAlreadyExists) => {
                trace!("'{}' is already accused on ring {ring}", target.id())
            }
            Err(error) => debug!("Did not record our accusation against '{}' - {error}", target.id()),
        }
    }

    /// Starts the deadline dispatcher, which periodically drains expired
    /// rebuttal deadlines and evicts peers that never rebutted.
    pub(crate) fn initialize_timers(&self) {
        let node = self.clone();
        self.spawn(async move {
            loop {
                if node.is_shutting_down() {
                    break;
                }
                for timer in node.view().timers().expired(Duration::from_secs(Node::REBUTTAL_DEADLINE_IN_SECS)) {
                    node.view().apply_timeout(&timer);
                }
                tokio::time::sleep(Duration::from_secs(Node::TIMER_SCAN_INTERVAL_IN_SECS)).await;
            }
        });
    }
}

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
extern crate tracing;

mod peer;
pub use peer::*;

mod rings;
pub use rings::*;

mod timers;
pub use timers::*;

use ifrit_identity::PeerId;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

/// The local database of known peers and their states.
///
/// `full` holds every peer whose certificate has been validated; `live` is
/// the subset currently considered alive (unaccused, with a note). Ring
/// placements cover everything in `full`; liveness is applied at query time.
///
/// Lock discipline: reads take the shared side, writes the exclusive side,
/// and the per-peer cells inside [`Peer`] have their own locks. Locks are
/// acquired in the order full, live, rings and are never held across I/O.
pub struct View {
    /// The identifier of the local node.
    self_id: PeerId,
    /// The number of rings in every placement.
    num_rings: u32,
    /// Every peer with a validated certificate, including the local node.
    full: RwLock<IndexMap<PeerId, Peer>>,
    /// The peers currently considered alive.
    live: RwLock<IndexSet<PeerId>>,
    /// The ring placements of everything in `full`.
    rings: RwLock<Rings>,
    /// The running accusation deadlines.
    timers: TimerTable,
}

impl View {
    /// Initializes a view seeded with the local node's own record. The local
    /// node joins `live` once its first note is published.
    pub fn new(self_peer: Peer, num_rings: u32) -> Self {
        let self_id = self_peer.id();
        let mut full = IndexMap::new();
        full.insert(self_id, self_peer);
        let mut rings = Rings::new(num_rings);
        rings.insert(self_id);

        Self {
            self_id,
            num_rings,
            full: RwLock::new(full),
            live: Default::default(),
            rings: RwLock::new(rings),
            timers: Default::default(),
        }
    }

    /// Returns the identifier of the local node.
    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    /// Returns the ring count.
    pub fn num_rings(&self) -> u32 {
        self.num_rings
    }

    /// Returns the record of the local node.
    pub fn self_peer(&self) -> Peer {
        self.full.read().get(&self.self_id).cloned().expect("the local node is always in its own view")
    }

    /// Returns the record for the given peer, if its certificate is known.
    pub fn peer(&self, id: &PeerId) -> Option<Peer> {
        self.full.read().get(id).cloned()
    }

    /// Returns `true` if the given peer's certificate is known.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.full.read().contains_key(id)
    }

    /// Returns every known peer.
    pub fn full(&self) -> Vec<Peer> {
        self.full.read().values().cloned().collect()
    }

    /// Returns the identifiers of every known peer.
    pub fn full_ids(&self) -> Vec<PeerId> {
        self.full.read().keys().copied().collect()
    }

    /// Returns every peer currently considered alive.
    pub fn live(&self) -> Vec<Peer> {
        let full = self.full.read();
        let live = self.live.read();
        live.iter().filter_map(|id| full.get(id).cloned()).collect()
    }

    /// Returns the identifiers of every live peer.
    pub fn live_ids(&self) -> Vec<PeerId> {
        self.live.read().iter().copied().collect()
    }

    /// Returns `true` if the given peer is currently considered alive.
    pub fn is_alive(&self, id: &PeerId) -> bool {
        self.live.read().contains(id)
    }

    /// Returns the number of known peers.
    pub fn number_of_peers(&self) -> usize {
        self.full.read().len()
    }

    /// Returns the number of live peers.
    pub fn number_of_live(&self) -> usize {
        self.live.read().len()
    }

    /// Returns the accusation deadline table.
    pub fn timers(&self) -> &TimerTable {
        &self.timers
    }

    /// Inserts a validated peer into `full` and places it on every ring.
    /// Returns `false` if the peer was already known.
    pub fn add_full(&self, peer: Peer) -> bool {
        let id = peer.id();
        let mut full = self.full.write();
        if full.contains_key(&id) {
            return false;
        }
        full.insert(id, peer);
        self.rings.write().insert(id);
        true
    }

    /// Marks a known peer as alive.
    pub fn add_live(&self, id: PeerId) {
        if self.full.read().contains_key(&id) {
            self.live.write().insert(id);
        }
    }

    /// Removes a peer from the live set. The peer stays in `full`.
    pub fn remove_live(&self, id: &PeerId) {
        self.live.write().shift_remove(id);
    }

    /// Returns the nearest alive clockwise and counter-clockwise peers from
    /// the local node on the given ring, skipping peers that deactivated it.
    pub fn my_ring_neighbours(&self, ring_num: u32) -> (Option<Peer>, Option<Peer>) {
        let full = self.full.read();
        let live = self.live.read();
        let rings = self.rings.read();
        let ring = match rings.ring(ring_num) {
            Some(ring) => ring,
            None => return (None, None),
        };

        let succ = ring
            .successors(&self.self_id)
            .find(|id| Self::is_monitorable(&full, &live, id, ring_num))
            .and_then(|id| full.get(&id).cloned());
        let prev = ring
            .predecessors(&self.self_id)
            .find(|id| Self::is_monitorable(&full, &live, id, ring_num))
            .and_then(|id| full.get(&id).cloned());
        (succ, prev)
    }

    /// Returns the distinct ring successors the local node gossips with, one
    /// per ring the local note activates.
    pub fn gossip_targets(&self) -> Vec<Peer> {
        self.monitor_targets().into_iter().map(|(_, peer)| peer).collect()
    }

    /// Returns the distinct ring successors the local node monitors, paired
    /// with the first ring each was selected on.
    pub fn monitor_targets(&self) -> Vec<(u32, Peer)> {
        let full = self.full.read();
        let live = self.live.read();
        let rings = self.rings.read();

        let mut seen = IndexSet::new();
        let mut targets = Vec::new();
        for ring_num in self.active_ring_numbers(&full) {
            let ring = match rings.ring(ring_num) {
                Some(ring) => ring,
                None => continue,
            };
            if let Some(id) =
                ring.successors(&self.self_id).find(|id| Self::is_monitorable(&full, &live, id, ring_num))
            {
                if seen.insert(id) {
                    if let Some(peer) = full.get(&id) {
                        targets.push((ring_num, peer.clone()));
                    }
                }
            }
        }
        targets
    }

    /// Returns `true` if the given peer is adjacent to the local node on some
    /// ring the local node is active on. Noteless peers count as placed so a
    /// bootstrapping caller is not rejected before its first note lands.
    pub fn should_be_neighbour(&self, id: &PeerId) -> bool {
        if *id == self.self_id {
            return false;
        }
        let full = self.full.read();
        let rings = self.rings.read();

        for ring_num in self.active_ring_numbers(&full) {
            let ring = match rings.ring(ring_num) {
                Some(ring) => ring,
                None => continue,
            };
            let succ = ring.successors(&self.self_id).find(|id| Self::is_placed(&full, id, ring_num));
            if succ.as_ref() == Some(id) {
                return true;
            }
            let prev = ring.predecessors(&self.self_id).find(|id| Self::is_placed(&full, id, ring_num));
            if prev.as_ref() == Some(id) {
                return true;
            }
        }
        false
    }

    /// Returns the union over all rings of the given peer's immediate
    /// neighbours.
    pub fn find_neighbours(&self, id: &PeerId) -> Vec<Peer> {
        let full = self.full.read();
        let rings = self.rings.read();

        let mut neighbours = IndexSet::new();
        for ring_num in 1..=self.num_rings {
            let ring = match rings.ring(ring_num) {
                Some(ring) => ring,
                None => continue,
            };
            if let Some(succ) = ring.successors(id).find(|id| Self::is_placed(&full, id, ring_num)) {
                neighbours.insert(succ);
            }
            if let Some(prev) = ring.predecessors(id).find(|id| Self::is_placed(&full, id, ring_num)) {
                neighbours.insert(prev);
            }
        }
        neighbours.into_iter().filter_map(|id| full.get(&id).cloned()).collect()
    }

    /// Returns `true` if `accuser` is the nearest alive predecessor of
    /// `accused` on the given ring, i.e. the peer responsible for monitoring
    /// it there.
    pub fn is_ring_predecessor(&self, accuser: &PeerId, accused: &PeerId, ring_num: u32) -> bool {
        let full = self.full.read();
        let live = self.live.read();
        let rings = self.rings.read();
        let ring = match rings.ring(ring_num) {
            Some(ring) => ring,
            None => return false,
        };
        let nearest = ring.predecessors(accused).find(|id| Self::is_monitorable(&full, &live, id, ring_num));
        nearest.as_ref() == Some(accuser)
    }

    /// The rings the local node is active on: all of them until the first
    /// local note is published, then whatever the note mask declares.
    fn active_ring_numbers(&self, full: &IndexMap<PeerId, Peer>) -> Vec<u32> {
        let self_note = full.get(&self.self_id).and_then(Peer::note);
        (1..=self.num_rings)
            .filter(|ring| self_note.as_ref().map_or(true, |note| note.participates_on(*ring)))
            .collect()
    }

    /// A peer is a valid monitoring endpoint on a ring if it is alive and its
    /// note activates that ring.
    fn is_monitorable(
        full: &IndexMap<PeerId, Peer>,
        live: &IndexSet<PeerId>,
        id: &PeerId,
        ring_num: u32,
    ) -> bool {
        live.contains(id) && full.get(id).map_or(false, |peer| peer.participates_on(ring_num))
    }

    /// A peer occupies a ring position for topology purposes unless its note
    /// explicitly deactivates that ring.
    fn is_placed(full: &IndexMap<PeerId, Peer>, id: &PeerId, ring_num: u32) -> bool {
        full.get(id).map_or(false, |peer| peer.participates_on(ring_num))
    }

    /// Applies an expired deadline: if the pinned note is still current the
    /// peer is evicted from `live` (it stays in `full`; only a strictly newer
    /// note readmits it). Returns `true` if the peer was evicted.
    pub fn apply_timeout(&self, timer: &LivenessTimer) -> bool {
        let peer = match self.peer(&timer.accused) {
            Some(peer) => peer,
            None => return false,
        };
        if peer.note_epoch() != timer.epoch {
            // The peer rebutted before the deadline fired.
            return false;
        }
        self.remove_live(&timer.accused);
        warn!("Evicted '{}' (accused by '{}' at epoch {})", timer.accused, timer.accuser, timer.epoch);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifrit_identity::Identity;
    use ifrit_node_messages::{full_mask, Note};

    const NUM_RINGS: u32 = 4;

    fn identities(count: usize) -> Vec<Identity> {
        (0..count).map(|_| Identity::generate(NUM_RINGS, "a", "b", "c").unwrap()).collect()
    }

    fn view_of(identities: &[Identity]) -> View {
        let view = View::new(Peer::new(identities[0].certificate().clone()), NUM_RINGS);
        let self_note = Note::new(identities[0].id(), 1, full_mask(NUM_RINGS), identities[0].keypair());
        view.self_peer().set_note(self_note);
        view.add_live(identities[0].id());

        for identity in &identities[1..] {
            let peer = Peer::new(identity.certificate().clone());
            peer.set_note(Note::new(identity.id(), 1, full_mask(NUM_RINGS), identity.keypair()));
            view.add_full(peer);
            view.add_live(identity.id());
        }
        view
    }

    #[test]
    fn live_tracks_known_peers_only() {
        let ids = identities(3);
        let view = view_of(&ids);

        assert_eq!(view.number_of_peers(), 3);
        assert_eq!(view.number_of_live(), 3);

        let stranger = Identity::generate(NUM_RINGS, "a", "b", "c").unwrap();
        view.add_live(stranger.id());
        assert_eq!(view.number_of_live(), 3);
    }

    #[test]
    fn ring_neighbours_are_deterministic() {
        let ids = identities(6);
        let view = view_of(&ids);

        for ring in 1..=NUM_RINGS {
            let (succ, prev) = view.my_ring_neighbours(ring);
            let (succ_again, prev_again) = view.my_ring_neighbours(ring);
            assert_eq!(succ.map(|p| p.id()), succ_again.map(|p| p.id()));
            assert_eq!(prev.map(|p| p.id()), prev_again.map(|p| p.id()));
        }
    }

    #[test]
    fn neighbours_skip_dead_peers() {
        let ids = identities(4);
        let view = view_of(&ids);

        let (succ, _) = view.my_ring_neighbours(1);
        let succ_id = succ.unwrap().id();
        view.remove_live(&succ_id);

        let (next, _) = view.my_ring_neighbours(1);
        assert_ne!(next.map(|p| p.id()), Some(succ_id));
    }

    #[test]
    fn ring_successor_is_a_neighbour() {
        let ids = identities(8);
        let view = view_of(&ids);

        let (succ, prev) = view.my_ring_neighbours(2);
        assert!(view.should_be_neighbour(&succ.unwrap().id()));
        assert!(view.should_be_neighbour(&prev.unwrap().id()));
        assert!(!view.should_be_neighbour(&view.self_id()));
    }

    #[test]
    fn find_neighbours_excludes_the_anchor() {
        let ids = identities(6);
        let view = view_of(&ids);

        let anchor = ids[3].id();
        let neighbours = view.find_neighbours(&anchor);
        assert!(!neighbours.is_empty());
        assert!(neighbours.iter().all(|peer| peer.id() != anchor));
    }

    #[test]
    fn monitor_targets_are_distinct() {
        let ids = identities(10);
        let view = view_of(&ids);

        let targets = view.monitor_targets();
        let mut seen = std::collections::HashSet::new();
        for (_, peer) in &targets {
            assert!(seen.insert(peer.id()));
        }
        assert!(!targets.is_empty());
    }

    #[test]
    fn timeout_evicts_unless_rebutted() {
        let ids = identities(3);
        let view = view_of(&ids);
        let target = ids[1].id();

        let timer = LivenessTimer { accused: target, accuser: ids[2].id(), epoch: 1, started: std::time::Instant::now() };
        assert!(view.apply_timeout(&timer));
        assert!(!view.is_alive(&target));

        // A newer note voids the pinned deadline.
        let rebutted = ids[1].id();
        view.peer(&rebutted).unwrap().set_note(Note::new(rebutted, 2, full_mask(NUM_RINGS), ids[1].keypair()));
        view.add_live(rebutted);
        let stale = LivenessTimer { accused: rebutted, accuser: ids[2].id(), epoch: 1, started: std::time::Instant::now() };
        assert!(!view.apply_timeout(&stale));
        assert!(view.is_alive(&rebutted));
    }
}

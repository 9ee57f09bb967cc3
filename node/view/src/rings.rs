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

use ifrit_identity::PeerId;

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// The placement key of a peer on a ring: the ring hash of its identifier,
/// tie-broken lexicographically on the raw identifier bytes.
type RingKey = ([u8; 32], PeerId);

/// One deterministic circular ordering of all known identifiers.
///
/// Placement is keyed by `SHA-256(ring_le || id)`, so every peer that knows
/// the same identifiers computes the same ordering, successors, and
/// predecessors.
pub struct Ring {
    ring_num: u32,
    order: BTreeMap<RingKey, PeerId>,
    positions: HashMap<PeerId, RingKey>,
}

impl Ring {
    fn new(ring_num: u32) -> Self {
        Self { ring_num, order: BTreeMap::new(), positions: HashMap::new() }
    }

    fn key_of(&self, id: &PeerId) -> RingKey {
        (id.ring_hash(self.ring_num), *id)
    }

    /// Places an identifier on the ring.
    pub fn insert(&mut self, id: PeerId) {
        let key = self.key_of(&id);
        if self.positions.insert(id, key).is_none() {
            self.order.insert(key, id);
        }
    }

    /// Removes an identifier from the ring.
    pub fn remove(&mut self, id: &PeerId) {
        if let Some(key) = self.positions.remove(id) {
            self.order.remove(&key);
        }
    }

    /// Returns `true` if the identifier is placed on the ring.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.positions.contains_key(id)
    }

    /// Returns the number of placed identifiers.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no identifiers are placed.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates the ring clockwise starting after `id`, wrapping around and
    /// excluding `id` itself. The anchor does not have to be a member.
    pub fn successors<'a>(&'a self, id: &PeerId) -> impl Iterator<Item = PeerId> + 'a {
        let key = self.key_of(id);
        self.order
            .range((Bound::Excluded(key), Bound::Unbounded))
            .chain(self.order.range(..key))
            .map(|(_, id)| *id)
    }

    /// Iterates the ring counter-clockwise starting before `id`, wrapping
    /// around and excluding `id` itself.
    pub fn predecessors<'a>(&'a self, id: &PeerId) -> impl Iterator<Item = PeerId> + 'a {
        let key = self.key_of(id);
        self.order
            .range(..key)
            .rev()
            .chain(self.order.range((Bound::Excluded(key), Bound::Unbounded)).rev())
            .map(|(_, id)| *id)
    }
}

/// The full set of ring placements, one per ring number in `[1, num_rings]`.
pub struct Rings {
    num_rings: u32,
    rings: Vec<Ring>,
}

impl Rings {
    /// Initializes empty placements for the given ring count.
    pub fn new(num_rings: u32) -> Self {
        Self { num_rings, rings: (1..=num_rings).map(Ring::new).collect() }
    }

    /// Returns the ring count.
    pub fn num_rings(&self) -> u32 {
        self.num_rings
    }

    /// Returns the ring with the given 1-indexed number.
    pub fn ring(&self, ring_num: u32) -> Option<&Ring> {
        if ring_num == 0 || ring_num > self.num_rings {
            return None;
        }
        self.rings.get(ring_num as usize - 1)
    }

    /// Places an identifier on every ring.
    pub fn insert(&mut self, id: PeerId) {
        for ring in &mut self.rings {
            ring.insert(id);
        }
    }

    /// Removes an identifier from every ring.
    pub fn remove(&mut self, id: &PeerId) {
        for ring in &mut self.rings {
            ring.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::collection::hash_set;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;

    fn id(byte: u8) -> PeerId {
        PeerId::new([byte; 32])
    }

    #[test]
    fn successors_cycle_through_every_other_member() {
        let mut ring = Ring::new(1);
        let ids: Vec<_> = (0..10).map(id).collect();
        for id in &ids {
            ring.insert(*id);
        }

        let walked: Vec<_> = ring.successors(&ids[0]).collect();
        assert_eq!(walked.len(), ids.len() - 1);
        assert!(!walked.contains(&ids[0]));
    }

    #[test]
    fn predecessors_reverse_successors() {
        let mut ring = Ring::new(3);
        let ids: Vec<_> = (0..8).map(id).collect();
        for id in &ids {
            ring.insert(*id);
        }

        let clockwise: Vec<_> = ring.successors(&ids[0]).collect();
        let mut counter: Vec<_> = ring.predecessors(&ids[0]).collect();
        counter.reverse();
        assert_eq!(clockwise, counter);
    }

    #[test]
    fn removal_skips_the_removed_member() {
        let mut ring = Ring::new(1);
        for byte in 0..5 {
            ring.insert(id(byte));
        }
        let succ = ring.successors(&id(0)).next().unwrap();
        ring.remove(&succ);
        assert!(!ring.contains(&succ));
        assert_ne!(ring.successors(&id(0)).next().unwrap(), succ);
        assert_eq!(ring.len(), 4);
    }

    proptest! {
        #[test]
        fn placement_is_insertion_order_independent(
            bytes in hash_set(any::<[u8; 32]>(), 2..40),
            seed in any::<u64>(),
        ) {
            let ids: Vec<_> = bytes.iter().map(|bytes| PeerId::new(*bytes)).collect();

            let mut sorted = Ring::new(7);
            for id in &ids {
                sorted.insert(*id);
            }

            let mut shuffled_ids = ids.clone();
            let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(seed);
            shuffled_ids.shuffle(&mut rng);
            let mut shuffled = Ring::new(7);
            for id in &shuffled_ids {
                shuffled.insert(*id);
            }

            let anchor = ids[0];
            let lhs: Vec<_> = sorted.successors(&anchor).collect();
            let rhs: Vec<_> = shuffled.successors(&anchor).collect();
            prop_assert_eq!(lhs, rhs);
        }

        #[test]
        fn rings_order_members_differently(bytes in hash_set(any::<[u8; 32]>(), 8..20)) {
            let ids: Vec<_> = bytes.iter().map(|bytes| PeerId::new(*bytes)).collect();
            let mut rings = Rings::new(2);
            for id in &ids {
                rings.insert(*id);
            }

            // Both rings hold the same members; their orderings are
            // independent functions of the ring number.
            let first: Vec<_> = rings.ring(1).unwrap().successors(&ids[0]).collect();
            let second: Vec<_> = rings.ring(2).unwrap().successors(&ids[0]).collect();
            prop_assert_eq!(first.len(), second.len());
        }
    }
}

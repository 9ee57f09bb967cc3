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

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// A running accusation deadline for one peer, with the note epoch and
/// accuser pinned at start time.
#[derive(Clone, Debug)]
pub struct LivenessTimer {
    /// The accused peer.
    pub accused: PeerId,
    /// The peer whose accusation started the timer.
    pub accuser: PeerId,
    /// The note epoch the accusation was anchored to.
    pub epoch: u64,
    /// When the timer was started.
    pub started: Instant,
}

/// The table of running accusation deadlines, keyed by the accused peer.
///
/// Timers reference their target by identifier, so cancellation is a map
/// delete; a dedicated dispatcher drains expired entries periodically.
#[derive(Default)]
pub struct TimerTable {
    entries: Mutex<IndexMap<PeerId, LivenessTimer>>,
}

impl TimerTable {
    /// Starts a deadline for the given peer. Returns `false` if one is
    /// already running; the existing deadline keeps counting.
    pub fn start(&self, accused: PeerId, epoch: u64, accuser: PeerId) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&accused) {
            return false;
        }
        entries.insert(accused, LivenessTimer { accused, accuser, epoch, started: Instant::now() });
        true
    }

    /// Cancels the deadline for the given peer, if one is running.
    pub fn cancel(&self, id: &PeerId) -> bool {
        self.entries.lock().shift_remove(id).is_some()
    }

    /// Returns `true` if a deadline is running for the given peer.
    pub fn is_running(&self, id: &PeerId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Returns the number of running deadlines.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no deadlines are running.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns every deadline older than the given time to live.
    pub fn expired(&self, ttl: Duration) -> Vec<LivenessTimer> {
        let mut entries = self.entries.lock();
        let (kept, expired) =
            std::mem::take(&mut *entries).into_iter().partition(|(_, timer)| timer.started.elapsed() < ttl);
        *entries = kept;
        expired.into_iter().map(|(_, timer)| timer).collect::<Vec<_>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> PeerId {
        PeerId::new([byte; 32])
    }

    #[test]
    fn duplicate_start_keeps_the_first_deadline() {
        let timers = TimerTable::default();
        assert!(timers.start(id(1), 4, id(2)));
        assert!(!timers.start(id(1), 4, id(3)));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn cancel_removes_the_deadline() {
        let timers = TimerTable::default();
        timers.start(id(1), 1, id(2));
        assert!(timers.cancel(&id(1)));
        assert!(!timers.cancel(&id(1)));
        assert!(timers.is_empty());
    }

    #[test]
    fn expiry_drains_old_deadlines_only() {
        let timers = TimerTable::default();
        timers.start(id(1), 1, id(2));
        timers.start(id(3), 2, id(4));

        assert!(timers.expired(Duration::from_secs(60)).is_empty());
        assert_eq!(timers.len(), 2);

        let expired = timers.expired(Duration::ZERO);
        assert_eq!(expired.len(), 2);
        assert!(timers.is_empty());
    }
}

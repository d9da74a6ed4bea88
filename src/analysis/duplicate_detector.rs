//! Bounded-memory detection of repeated data segments.

use std::collections::VecDeque;

use log::trace;

use crate::decoding::{BodyRecord, Direction};

pub const DEFAULT_DUPLICATE_WINDOW: usize = 256;

/// Identity of a segment for duplicate lookup. No payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketKey {
    pub flow_id: u32,
    pub seq: u32,
    pub ack: u32,
    pub size: u32,
}

impl PacketKey {
    pub fn from_record(record: &BodyRecord) -> Self {
        Self {
            flow_id: record.flow_id,
            seq: record.th_seq,
            ack: record.th_ack,
            size: record.data_sz,
        }
    }
}

/// Recently seen data segments of one direction, oldest first.
#[derive(Debug)]
struct SeenRing {
    keys: VecDeque<PacketKey>,
    duplicates: u64,
}

impl SeenRing {
    fn new(capacity: usize) -> Self {
        Self {
            keys: VecDeque::with_capacity(capacity),
            duplicates: 0,
        }
    }
}

/// Flags data segments whose key repeats one of the last `window` data
/// segments seen in the same direction.
#[derive(Debug)]
pub struct DuplicateDetector {
    window: usize,
    inbound: SeenRing,
    outbound: SeenRing,
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_WINDOW)
    }
}

impl DuplicateDetector {
    /// `window` is clamped to at least one entry.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            inbound: SeenRing::new(window),
            outbound: SeenRing::new(window),
        }
    }

    fn ring_mut(&mut self, direction: Direction) -> &mut SeenRing {
        match direction {
            Direction::In => &mut self.inbound,
            Direction::Out => &mut self.outbound,
        }
    }

    /// Returns whether `key` is a duplicate, remembering it otherwise.
    ///
    /// Keys without payload (pure ACKs) are never flagged nor remembered.
    pub fn check(&mut self, direction: Direction, key: PacketKey) -> bool {
        if key.size == 0 {
            return false;
        }
        let window = self.window;
        let ring = self.ring_mut(direction);
        if ring.keys.contains(&key) {
            ring.duplicates += 1;
            trace!(
                "duplicate {} segment flow={} seq={} ack={} size={}",
                direction,
                key.flow_id,
                key.seq,
                key.ack,
                key.size
            );
            return true;
        }
        if ring.keys.len() >= window {
            ring.keys.pop_front();
        }
        ring.keys.push_back(key);
        false
    }

    pub fn total(&self) -> u64 {
        self.inbound.duplicates + self.outbound.duplicates
    }

    pub fn total_for(&self, direction: Direction) -> u64 {
        match direction {
            Direction::In => self.inbound.duplicates,
            Direction::Out => self.outbound.duplicates,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seq: u32, size: u32) -> PacketKey {
        PacketKey {
            flow_id: 7,
            seq,
            ack: 1,
            size,
        }
    }

    #[test]
    fn repeated_data_segment_is_flagged() {
        let mut detector = DuplicateDetector::default();
        assert!(!detector.check(Direction::Out, key(1000, 1448)));
        assert!(!detector.check(Direction::Out, key(2448, 1448)));
        assert!(detector.check(Direction::Out, key(1000, 1448)));
        assert_eq!(detector.total(), 1);
        assert_eq!(detector.total_for(Direction::Out), 1);
        assert_eq!(detector.total_for(Direction::In), 0);
    }

    #[test]
    fn pure_ack_is_never_flagged() {
        let mut detector = DuplicateDetector::default();
        for _ in 0..5 {
            assert!(!detector.check(Direction::In, key(1000, 0)));
        }
        assert_eq!(detector.total(), 0);
    }

    #[test]
    fn directions_are_tracked_separately() {
        let mut detector = DuplicateDetector::default();
        assert!(!detector.check(Direction::Out, key(1000, 100)));
        assert!(!detector.check(Direction::In, key(1000, 100)));
        assert!(detector.check(Direction::In, key(1000, 100)));
        assert_eq!(detector.total_for(Direction::In), 1);
    }

    #[test]
    fn oldest_key_is_evicted_when_window_is_full() {
        let mut detector = DuplicateDetector::new(2);
        assert!(!detector.check(Direction::Out, key(1, 10)));
        assert!(!detector.check(Direction::Out, key(2, 10)));
        assert!(!detector.check(Direction::Out, key(3, 10)));
        // key 1 has been evicted by key 3
        assert!(!detector.check(Direction::Out, key(1, 10)));
        assert!(detector.check(Direction::Out, key(3, 10)));
    }

    #[test]
    fn zero_window_is_clamped() {
        let mut detector = DuplicateDetector::new(0);
        assert_eq!(detector.window(), 1);
        assert!(!detector.check(Direction::Out, key(1, 10)));
        assert!(detector.check(Direction::Out, key(1, 10)));
    }
}

//! Deferred spawn scheduler.
//!
//! Incursions do not place vehicles immediately. They enqueue
//! [`SpawnEvent`]s keyed by the tick they become due, and the orchestrator
//! drains every due event once per cycle after time has advanced.
//!
//! Ordering is by ascending scheduled tick; events scheduled for the same
//! tick come out in insertion order.
//!
//! # Example
//!
//! ```
//! use citysim_core::math::Vec3Fixed;
//! use citysim_core::scheduler::{SpawnEvent, SpawnQueue};
//!
//! let mut queue = SpawnQueue::new();
//! queue.push(SpawnEvent::new(200, "UFO_SCOUT", Vec3Fixed::ZERO, Vec::new()));
//! queue.push(SpawnEvent::new(100, "UFO_SCOUT", Vec3Fixed::ZERO, Vec::new()));
//!
//! assert!(queue.pop_due(99).is_empty());
//! let due = queue.pop_due(200);
//! assert_eq!(due.len(), 2);
//! assert_eq!(due[0].scheduled_tick, 100);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::math::Vec3Fixed;
use crate::mission::Mission;
use crate::state_ref::StateRef;
use crate::vehicle::VehicleType;

/// A vehicle launch waiting for its tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnEvent {
    /// Tick at which the event becomes due.
    pub scheduled_tick: u64,
    /// Type of vehicle to send.
    pub vehicle_type: StateRef<VehicleType>,
    /// Where the vehicle appears.
    pub position: Vec3Fixed,
    /// Missions replacing the vehicle's queue on arrival.
    pub missions: Vec<Mission>,
}

impl SpawnEvent {
    /// Create a spawn event.
    #[must_use]
    pub fn new(
        scheduled_tick: u64,
        vehicle_type: impl Into<String>,
        position: Vec3Fixed,
        missions: Vec<Mission>,
    ) -> Self {
        Self {
            scheduled_tick,
            vehicle_type: StateRef::new(vehicle_type),
            position,
            missions,
        }
    }
}

/// Heap entry; `seq` keeps same-tick events in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueuedSpawn {
    seq: u64,
    event: SpawnEvent,
}

impl QueuedSpawn {
    const fn key(&self) -> (u64, u64) {
        (self.event.scheduled_tick, self.seq)
    }
}

impl PartialEq for QueuedSpawn {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedSpawn {}

impl Ord for QueuedSpawn {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap yields the earliest tick, then lowest seq.
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for QueuedSpawn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of pending spawn events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnQueue {
    heap: BinaryHeap<QueuedSpawn>,
    next_seq: u64,
}

impl SpawnQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event. O(log n).
    pub fn push(&mut self, event: SpawnEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedSpawn { seq, event });
    }

    /// Remove and return every event scheduled at or before `now`, in
    /// scheduled order.
    pub fn pop_due(&mut self, now: u64) -> Vec<SpawnEvent> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|q| q.event.scheduled_tick <= now)
        {
            if let Some(queued) = self.heap.pop() {
                due.push(queued.event);
            }
        }
        due
    }

    /// Tick of the earliest pending event.
    #[must_use]
    pub fn peek_next_tick(&self) -> Option<u64> {
        self.heap.peek().map(|q| q.event.scheduled_tick)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending events in the order they will be processed.
    #[must_use]
    pub fn pending(&self) -> Vec<&SpawnEvent> {
        let mut entries: Vec<&QueuedSpawn> = self.heap.iter().collect();
        entries.sort_by_key(|q| q.key());
        entries.into_iter().map(|q| &q.event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(tick: u64, kind: &str) -> SpawnEvent {
        SpawnEvent::new(tick, kind, Vec3Fixed::ZERO, Vec::new())
    }

    #[test]
    fn test_event_at_current_tick_is_due() {
        let mut queue = SpawnQueue::new();
        queue.push(event(50, "A"));
        assert!(queue.pop_due(49).is_empty());
        assert_eq!(queue.pop_due(50).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_tick_keeps_insertion_order() {
        let mut queue = SpawnQueue::new();
        queue.push(event(10, "FIRST"));
        queue.push(event(10, "SECOND"));
        queue.push(event(5, "EARLIEST"));
        let due = queue.pop_due(10);
        let kinds: Vec<_> = due.iter().map(|e| e.vehicle_type.to_string()).collect();
        assert_eq!(kinds, vec!["EARLIEST", "FIRST", "SECOND"]);
    }

    #[test]
    fn test_peek_and_pending() {
        let mut queue = SpawnQueue::new();
        assert_eq!(queue.peek_next_tick(), None);
        queue.push(event(30, "B"));
        queue.push(event(20, "A"));
        assert_eq!(queue.peek_next_tick(), Some(20));
        let pending: Vec<_> = queue.pending().iter().map(|e| e.scheduled_tick).collect();
        assert_eq!(pending, vec![20, 30]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_future_events_stay_queued() {
        let mut queue = SpawnQueue::new();
        queue.push(event(100, "A"));
        queue.push(event(300, "B"));
        let due = queue.pop_due(200);
        assert_eq!(due.len(), 1);
        assert_eq!(queue.peek_next_tick(), Some(300));
    }
}

use std::collections::VecDeque;

use super::message::OutboundMessage;

/// Fixed-capacity pending queue with a priority lane.
///
/// - `push` is O(1); when full it evicts the oldest routine entry.
/// - Emergency messages live in a separate lane that drains first (FIFO among themselves)
///   and is only evicted once no routine entry is left.
/// - The combined length never exceeds `capacity`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundQueue {
    priority: VecDeque<OutboundMessage>,
    routine: VecDeque<OutboundMessage>,
    capacity: usize,
    evicted: u64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            priority: VecDeque::new(),
            routine: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Enqueue a message; returns the entry evicted to make room, if any.
    pub fn push(&mut self, message: OutboundMessage) -> Option<OutboundMessage> {
        // Capacity==0 means "store nothing"; the message itself is the casualty.
        if self.capacity == 0 {
            self.evicted = self.evicted.saturating_add(1);
            return Some(message);
        }

        let evicted = if self.is_full() {
            self.evicted = self.evicted.saturating_add(1);
            self.routine
                .pop_front()
                .or_else(|| self.priority.pop_front())
        } else {
            None
        };

        if message.is_emergency() {
            self.priority.push_back(message);
        } else {
            self.routine.push_back(message);
        }
        evicted
    }

    /// Put a message back at the head of its lane (used when a drain write fails).
    pub fn push_front(&mut self, message: OutboundMessage) -> Option<OutboundMessage> {
        if self.capacity == 0 {
            return Some(message);
        }
        let evicted = if self.is_full() {
            self.evicted = self.evicted.saturating_add(1);
            self.routine.pop_back().or_else(|| self.priority.pop_back())
        } else {
            None
        };
        if message.is_emergency() {
            self.priority.push_front(message);
        } else {
            self.routine.push_front(message);
        }
        evicted
    }

    pub fn pop_front(&mut self) -> Option<OutboundMessage> {
        self.priority
            .pop_front()
            .or_else(|| self.routine.pop_front())
    }

    /// Drain order: priority lane first, then routine traffic in enqueue order.
    pub fn iter(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.priority.iter().chain(self.routine.iter())
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.routine.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.routine.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Number of entries dropped by overflow since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.priority.clear();
        self.routine.clear();
    }
}

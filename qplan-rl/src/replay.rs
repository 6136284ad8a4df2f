//! Replay memory: a bounded ring buffer of transitions, `push_count
//! mod capacity` semantics over a fixed-size arena rather than a linked
//! list.

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Vec<f64>,
    pub action: u64,
    pub next_state: Vec<f64>,
    pub reward: f64,
}

pub struct ReplayMemory {
    capacity: usize,
    buffer: Vec<Transition>,
    cursor: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay memory capacity must be > 0");
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity.min(1 << 16)),
            cursor: 0,
        }
    }

    /// FIFO overwrite once full.
    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.cursor] = transition;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn can_provide_sample(&self, n: usize) -> bool {
        self.buffer.len() >= n
    }

    /// Uniformly-random size-`n` subset, without replacement.
    pub fn sample<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<&Transition> {
        self.buffer.iter().choose_multiple(rng, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(action: u64) -> Transition {
        Transition {
            state: vec![0.0],
            action,
            next_state: vec![0.0],
            reward: 0.0,
        }
    }

    #[test]
    fn push_overwrites_fifo_once_full() {
        let mut mem = ReplayMemory::new(3);
        mem.push(t(1));
        mem.push(t(2));
        mem.push(t(3));
        mem.push(t(4)); // overwrites slot 0 (action 1)
        assert_eq!(mem.len(), 3);
        let actions: Vec<u64> = mem.buffer.iter().map(|x| x.action).collect();
        assert_eq!(actions, vec![4, 2, 3]);
    }

    #[test]
    fn can_provide_sample_requires_enough_entries() {
        let mut mem = ReplayMemory::new(5);
        assert!(!mem.can_provide_sample(1));
        mem.push(t(1));
        assert!(mem.can_provide_sample(1));
        assert!(!mem.can_provide_sample(2));
    }

    #[test]
    fn sample_returns_requested_count() {
        let mut mem = ReplayMemory::new(10);
        for i in 0..10 {
            mem.push(t(i));
        }
        let mut rng = rand::thread_rng();
        let batch = mem.sample(4, &mut rng);
        assert_eq!(batch.len(), 4);
    }
}

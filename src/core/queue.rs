use keyed_priority_queue::KeyedPriorityQueue;
use std::{cmp::Ordering, collections::VecDeque};

use super::state::{Pid, Ticks};

/// Ordering key for keyed ready queues: `rank` first (burst length or
/// priority), then arrival time, then pid. Smaller wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub rank: i64,
    pub arrival: Ticks,
    pub pid: Pid,
}

impl QueueKey {
    fn ascending(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| self.arrival.cmp(&other.arrival))
            .then_with(|| self.pid.cmp(&other.pid))
    }
}

// KeyedPriorityQueue is a max-heap, so we need to flip-flop QueueKey's Ord
impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.ascending(self)
    }
}

#[derive(Debug)]
pub enum ReadyQueue {
    Fifo { procs: VecDeque<Pid> },
    Keyed { procs: KeyedPriorityQueue<Pid, QueueKey> },
}

impl ReadyQueue {
    pub fn new_fifo() -> Self {
        Self::Fifo {
            procs: VecDeque::new(),
        }
    }

    pub fn new_keyed() -> Self {
        Self::Keyed {
            procs: KeyedPriorityQueue::new(),
        }
    }

    pub fn push_back(&mut self, pid: Pid) {
        debug_assert!(!self.contains(pid), "process {pid} queued twice");
        match self {
            Self::Fifo { procs } => procs.push_back(pid),
            Self::Keyed { .. } => panic!("keyed ready queue needs a key for process {pid}"),
        }
    }

    pub fn push_keyed(&mut self, key: QueueKey) {
        debug_assert!(!self.contains(key.pid), "process {} queued twice", key.pid);
        match self {
            Self::Fifo { procs } => procs.push_back(key.pid),
            Self::Keyed { procs } => {
                procs.push(key.pid, key);
            }
        }
    }

    pub fn pop(&mut self) -> Option<Pid> {
        match self {
            Self::Fifo { procs } => procs.pop_front(),
            Self::Keyed { procs } => procs.pop().map(|(pid, _)| pid),
        }
    }

    /// Key of the process that would be popped next (keyed queues only).
    pub fn peek_key(&self) -> Option<QueueKey> {
        match self {
            Self::Fifo { .. } => None,
            Self::Keyed { procs } => procs.peek().map(|(_, key)| *key),
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        match self {
            Self::Fifo { procs } => procs.contains(&pid),
            Self::Keyed { procs } => procs.get_priority(&pid).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Fifo { procs } => procs.len(),
            Self::Keyed { procs } => procs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue contents in service order.
    pub fn ordered(&self) -> Vec<Pid> {
        match self {
            Self::Fifo { procs } => procs.iter().copied().collect(),
            Self::Keyed { procs } => {
                let mut keys: Vec<QueueKey> = procs.iter().map(|(_, key)| *key).collect();
                // Ord is flipped, so descending order is service order
                keys.sort_by(|a, b| b.cmp(a));
                keys.into_iter().map(|key| key.pid).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rank: i64, arrival: Ticks, pid: Pid) -> QueueKey {
        QueueKey { rank, arrival, pid }
    }

    #[test]
    fn keyed_queue_pops_smallest_rank_first() {
        let mut q = ReadyQueue::new_keyed();
        q.push_keyed(key(5, 0, 1));
        q.push_keyed(key(2, 3, 2));
        q.push_keyed(key(2, 1, 3));
        q.push_keyed(key(2, 1, 4));

        assert_eq!(q.ordered(), vec![3, 4, 2, 1]);
        assert_eq!(q.peek_key(), Some(key(2, 1, 3)));
        let popped: Vec<Pid> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(popped, vec![3, 4, 2, 1]);
    }

    #[test]
    fn fifo_queue_keeps_insertion_order() {
        let mut q = ReadyQueue::new_fifo();
        q.push_back(3);
        q.push_back(1);
        q.push_back(2);
        assert!(q.contains(1));
        assert_eq!(q.ordered(), vec![3, 1, 2]);
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.len(), 2);
    }
}

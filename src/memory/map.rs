use serde::{Deserialize, Serialize};

use crate::{
    core::Pid,
    error::{Result, SimError},
};

/// Which piece of a process a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemUnit {
    Whole,
    Page(u64),
    Segment(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    Free,
    Process { pid: Pid, unit: MemUnit },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub start: u64,
    pub size: u64,
    pub owner: Owner,
    /// Internal fragmentation: units inside this block the owner does not use.
    pub waste: u64,
}

impl Block {
    fn free(start: u64, size: u64) -> Self {
        Self {
            start,
            size,
            owner: Owner::Free,
            waste: 0,
        }
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn is_free(&self) -> bool {
        self.owner == Owner::Free
    }

    pub fn owned_by(&self, pid: Pid) -> bool {
        matches!(self.owner, Owner::Process { pid: owner, .. } if owner == pid)
    }
}

/// A contiguous placement the engine asks the map to claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: u64,
    pub size: u64,
    pub unit: MemUnit,
    pub waste: u64,
}

/// Address-ordered list of blocks partitioning `[0, capacity)`.
// Framed maps keep one block per frame and never split or coalesce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    capacity: u64,
    frame_size: Option<u64>,
    blocks: Vec<Block>,
}

impl MemoryMap {
    pub fn new_contiguous(capacity: u64) -> Self {
        Self {
            capacity,
            frame_size: None,
            blocks: vec![Block::free(0, capacity)],
        }
    }

    pub fn new_framed(capacity: u64, frame_size: u64) -> Self {
        assert!(
            frame_size > 0 && capacity % frame_size == 0,
            "capacity {capacity} is not a whole number of {frame_size}-unit frames"
        );
        let blocks = (0..capacity / frame_size)
            .map(|frame| Block::free(frame * frame_size, frame_size))
            .collect();
        Self {
            capacity,
            frame_size: Some(frame_size),
            blocks,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn frame_size(&self) -> Option<u64> {
        self.frame_size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn free_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_free())
    }

    pub fn free_total(&self) -> u64 {
        self.free_blocks().map(|b| b.size).sum()
    }

    pub fn largest_free(&self) -> u64 {
        self.free_blocks().map(|b| b.size).max().unwrap_or(0)
    }

    pub fn internal_waste(&self) -> u64 {
        self.blocks.iter().map(|b| b.waste).sum()
    }

    pub fn owned_by(&self, pid: Pid) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.owned_by(pid))
    }

    /// Hand `extent` to `pid`. The extent must sit inside a single free block;
    /// anything else means a strategy produced a bad placement.
    pub fn claim(&mut self, pid: Pid, extent: Extent) -> Result<()> {
        let violation = |reason: String| SimError::PolicyViolation {
            policy: "memory-map",
            reason,
        };

        let index = self
            .blocks
            .iter()
            .position(|b| b.is_free() && b.start <= extent.start && extent.start + extent.size <= b.end())
            .ok_or_else(|| {
                violation(format!(
                    "extent [{}, {}) for process {pid} is not inside a free block",
                    extent.start,
                    extent.start + extent.size
                ))
            })?;

        if extent.size == 0 {
            return Err(violation(format!("empty extent for process {pid}")));
        }
        if self.frame_size.is_some() && self.blocks[index].size != extent.size {
            return Err(violation(format!(
                "extent of {} units does not match a frame",
                extent.size
            )));
        }

        let free = self.blocks[index].clone();
        let mut replacement = Vec::with_capacity(3);
        if extent.start > free.start {
            replacement.push(Block::free(free.start, extent.start - free.start));
        }
        replacement.push(Block {
            start: extent.start,
            size: extent.size,
            owner: Owner::Process {
                pid,
                unit: extent.unit,
            },
            waste: extent.waste,
        });
        if extent.start + extent.size < free.end() {
            replacement.push(Block::free(
                extent.start + extent.size,
                free.end() - (extent.start + extent.size),
            ));
        }
        self.blocks.splice(index..=index, replacement);
        Ok(())
    }

    /// Free every block `pid` owns. Returns the released blocks in address
    /// order, as they were before release.
    pub fn release(&mut self, pid: Pid) -> Vec<Block> {
        let mut released = Vec::new();
        for block in self.blocks.iter_mut().filter(|b| b.owned_by(pid)) {
            released.push(block.clone());
            block.owner = Owner::Free;
            block.waste = 0;
        }
        if self.frame_size.is_none() {
            self.coalesce();
        }
        released
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<Block> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            match merged.last_mut() {
                Some(prev) if prev.is_free() && block.is_free() => prev.size += block.size,
                _ => merged.push(block),
            }
        }
        self.blocks = merged;
    }

    /// Blocks tile `[0, capacity)` exactly: no gaps, no overlaps, no empty
    /// blocks.
    pub fn is_partitioned(&self) -> bool {
        let mut cursor = 0;
        for block in &self.blocks {
            if block.start != cursor || block.size == 0 || block.waste > block.size {
                return false;
            }
            cursor = block.end();
        }
        cursor == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole(start: u64, size: u64) -> Extent {
        Extent {
            start,
            size,
            unit: MemUnit::Whole,
            waste: 0,
        }
    }

    #[test]
    fn claim_splits_free_block() {
        let mut map = MemoryMap::new_contiguous(100);
        map.claim(1, whole(20, 30)).unwrap();

        let layout: Vec<(u64, u64, bool)> = map
            .blocks()
            .iter()
            .map(|b| (b.start, b.size, b.is_free()))
            .collect();
        assert_eq!(layout, vec![(0, 20, true), (20, 30, false), (50, 50, true)]);
        assert!(map.is_partitioned());
    }

    #[test]
    fn release_coalesces_neighbours() {
        let mut map = MemoryMap::new_contiguous(100);
        map.claim(1, whole(0, 30)).unwrap();
        map.claim(2, whole(30, 30)).unwrap();
        map.claim(3, whole(60, 40)).unwrap();

        map.release(1);
        map.release(3);
        assert_eq!(map.free_blocks().count(), 2);

        let released = map.release(2);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].start, 30);
        assert_eq!(map.blocks().len(), 1);
        assert_eq!(map.largest_free(), 100);
    }

    #[test]
    fn claim_outside_free_space_is_a_violation() {
        let mut map = MemoryMap::new_contiguous(100);
        map.claim(1, whole(0, 50)).unwrap();
        let err = map.claim(2, whole(40, 20)).unwrap_err();
        assert!(err.is_fatal());
        assert!(map.is_partitioned());
    }

    #[test]
    fn framed_map_never_coalesces() {
        let mut map = MemoryMap::new_framed(40, 10);
        map.claim(
            1,
            Extent {
                start: 10,
                size: 10,
                unit: MemUnit::Page(0),
                waste: 3,
            },
        )
        .unwrap();
        assert_eq!(map.internal_waste(), 3);
        map.release(1);
        assert_eq!(map.blocks().len(), 4);
        assert_eq!(map.internal_waste(), 0);
        assert!(map.is_partitioned());
    }
}

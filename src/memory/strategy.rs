use serde::{Deserialize, Serialize};

use super::map::{Block, Extent, MemUnit, MemoryMap};
use crate::{
    core::{Pid, Process},
    error::{Result, SimError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitStrategy {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
}

impl FitStrategy {
    /// Free block a request of `size` units goes into, if any. Ties go to the
    /// lowest address.
    pub fn select(self, map: &MemoryMap, size: u64) -> Option<&Block> {
        let mut fits = map.free_blocks().filter(|b| b.size >= size);
        match self {
            Self::FirstFit => fits.next(),
            Self::BestFit => fits.fold(None, |best: Option<&Block>, b| match best {
                Some(cur) if cur.size <= b.size => Some(cur),
                _ => Some(b),
            }),
            Self::WorstFit => fits.fold(None, |best: Option<&Block>, b| match best {
                Some(cur) if cur.size >= b.size => Some(cur),
                _ => Some(b),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FirstFit => "first-fit",
            Self::BestFit => "best-fit",
            Self::WorstFit => "worst-fit",
        }
    }
}

/// Where a whole request lands. Claimed atomically by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub extents: Vec<Extent>,
    pub internal_waste: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStrategy {
    Contiguous(FitStrategy),
    Paging { frame_size: u64 },
    Segmentation(FitStrategy),
}

impl MemoryStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contiguous(fit) => fit.name(),
            Self::Paging { .. } => "paging",
            Self::Segmentation(_) => "segmentation",
        }
    }

    pub fn new_map(&self, capacity: u64) -> MemoryMap {
        match *self {
            Self::Paging { frame_size } => MemoryMap::new_framed(capacity, frame_size),
            Self::Contiguous(_) | Self::Segmentation(_) => MemoryMap::new_contiguous(capacity),
        }
    }

    /// Whether `process` could be placed in an empty memory of `capacity`.
    pub fn can_ever_fit(&self, capacity: u64, process: &Process) -> bool {
        match *self {
            Self::Contiguous(_) => process.size <= capacity,
            Self::Paging { frame_size } => {
                process.size.div_ceil(frame_size) <= capacity / frame_size
            }
            Self::Segmentation(_) => process.size <= capacity,
        }
    }

    pub fn place(&self, map: &MemoryMap, process: &Process) -> Result<Placement> {
        match *self {
            Self::Contiguous(fit) => place_contiguous(fit, map, process),
            Self::Paging { frame_size } => place_pages(frame_size, map, process),
            Self::Segmentation(fit) => place_segments(fit, map, process),
        }
    }
}

fn insufficient(map: &MemoryMap, pid: Pid, requested: u64) -> SimError {
    SimError::InsufficientMemory {
        pid,
        requested,
        largest_free: map.largest_free(),
    }
}

fn place_contiguous(fit: FitStrategy, map: &MemoryMap, process: &Process) -> Result<Placement> {
    let block = fit
        .select(map, process.size)
        .ok_or_else(|| insufficient(map, process.pid, process.size))?;
    Ok(Placement {
        extents: vec![Extent {
            start: block.start,
            size: process.size,
            unit: MemUnit::Whole,
            waste: 0,
        }],
        internal_waste: 0,
    })
}

fn place_pages(frame_size: u64, map: &MemoryMap, process: &Process) -> Result<Placement> {
    let pages = process.size.div_ceil(frame_size);
    let frames: Vec<&Block> = map
        .free_blocks()
        .take(usize::try_from(pages).unwrap_or(usize::MAX))
        .collect();
    if (frames.len() as u64) < pages {
        return Err(SimError::InsufficientMemory {
            pid: process.pid,
            requested: process.size,
            largest_free: map.free_total(),
        });
    }

    let waste = pages * frame_size - process.size;
    let extents = frames
        .iter()
        .zip(0..)
        .map(|(frame, page)| Extent {
            start: frame.start,
            size: frame_size,
            unit: MemUnit::Page(page),
            // Only the last page is partly used
            waste: if page + 1 == pages { waste } else { 0 },
        })
        .collect();
    Ok(Placement {
        extents,
        internal_waste: waste,
    })
}

fn place_segments(fit: FitStrategy, map: &MemoryMap, process: &Process) -> Result<Placement> {
    let whole = [process.size];
    let segments: &[u64] = if process.segments.is_empty() {
        &whole
    } else {
        &process.segments
    };

    // Place segment by segment on a scratch copy so later segments see the
    // space taken by earlier ones
    let mut scratch = map.clone();
    let mut extents = Vec::with_capacity(segments.len());
    for (index, &size) in (0u32..).zip(segments) {
        let start = fit
            .select(&scratch, size)
            .map(|b| b.start)
            .ok_or_else(|| insufficient(map, process.pid, size))?;
        let extent = Extent {
            start,
            size,
            unit: MemUnit::Segment(index),
            waste: 0,
        };
        scratch.claim(process.pid, extent)?;
        extents.push(extent);
    }
    Ok(Placement {
        extents,
        internal_waste: 0,
    })
}

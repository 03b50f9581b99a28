pub mod engine;
pub mod map;
pub mod strategy;

pub use engine::MemCore;
pub use map::{Block, Extent, MemUnit, MemoryMap, Owner};
pub use strategy::{FitStrategy, MemoryStrategy, Placement};

//! Core Primitives
//!
//! Pure spatial helpers with no I/O:
//! - `geometry`: tile positions, inclusive bounds, step clamping
//! - `chunk`: chunk indexing

pub mod geometry;
pub mod chunk;

pub use geometry::{Bounds, TilePos, clamp_step, ranges_overlap};
pub use chunk::{ChunkCoord, ChunkGrid, ChunkIndexer, DEFAULT_CHUNK_SIZE};

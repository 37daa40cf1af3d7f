//! Chunk Indexer
//!
//! Groups world tiles into fixed-size square chunks.

use crate::core::geometry::TilePos;

/// Default edge length of a chunk, in tiles.
pub const DEFAULT_CHUNK_SIZE: i32 = 32;

/// Chunk coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// Chunk column.
    pub cx: i32,
    /// Chunk row.
    pub cy: i32,
}

/// Summary of how a map divides into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkGrid {
    /// Chunk edge length used.
    pub chunk_size: i32,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Number of chunk columns.
    pub chunks_x: u32,
    /// Number of chunk rows.
    pub chunks_y: u32,
}

/// Maps tile positions to chunk coordinates.
#[derive(Clone, Copy, Debug)]
pub struct ChunkIndexer {
    chunk_size: i32,
}

impl ChunkIndexer {
    /// Create an indexer. Non-positive sizes fall back to [`DEFAULT_CHUNK_SIZE`].
    pub fn new(chunk_size: i32) -> Self {
        Self {
            chunk_size: effective_size(Some(chunk_size), DEFAULT_CHUNK_SIZE),
        }
    }

    /// Configured chunk edge length.
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    /// Chunk containing a position. Negative coordinates floor toward negative chunks.
    pub fn chunk_for(&self, pos: TilePos) -> ChunkCoord {
        self.chunk_for_with_size(pos, None)
    }

    /// Chunk containing a position using an optional size override.
    pub fn chunk_for_with_size(&self, pos: TilePos, size: Option<i32>) -> ChunkCoord {
        let s = effective_size(size, self.chunk_size);
        ChunkCoord {
            cx: pos.x.div_euclid(s),
            cy: pos.y.div_euclid(s),
        }
    }

    /// Describe the chunk grid covering a `width x height` map.
    pub fn describe(&self, width: u32, height: u32, size: Option<i32>) -> ChunkGrid {
        let s = effective_size(size, self.chunk_size) as u32;
        ChunkGrid {
            chunk_size: s as i32,
            width,
            height,
            chunks_x: width.div_ceil(s),
            chunks_y: height.div_ceil(s),
        }
    }
}

impl Default for ChunkIndexer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

fn effective_size(size: Option<i32>, fallback: i32) -> i32 {
    match size {
        Some(s) if s > 0 => s,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_for_positive() {
        let idx = ChunkIndexer::default();
        assert_eq!(idx.chunk_for(TilePos::new(0, 0)), ChunkCoord { cx: 0, cy: 0 });
        assert_eq!(idx.chunk_for(TilePos::new(31, 31)), ChunkCoord { cx: 0, cy: 0 });
        assert_eq!(idx.chunk_for(TilePos::new(32, 64)), ChunkCoord { cx: 1, cy: 2 });
    }

    #[test]
    fn test_chunk_for_negative_floors() {
        let idx = ChunkIndexer::default();
        assert_eq!(idx.chunk_for(TilePos::new(-1, -32)), ChunkCoord { cx: -1, cy: -1 });
        assert_eq!(idx.chunk_for(TilePos::new(-33, 0)), ChunkCoord { cx: -2, cy: 0 });
    }

    #[test]
    fn test_invalid_size_falls_back() {
        let idx = ChunkIndexer::new(0);
        assert_eq!(idx.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(
            idx.chunk_for_with_size(TilePos::new(20, 20), Some(-4)),
            ChunkCoord { cx: 0, cy: 0 }
        );
        assert_eq!(
            idx.chunk_for_with_size(TilePos::new(20, 20), Some(8)),
            ChunkCoord { cx: 2, cy: 2 }
        );
    }

    #[test]
    fn test_describe_rounds_up() {
        let grid = ChunkIndexer::default().describe(100, 64, None);
        assert_eq!(grid.chunks_x, 4);
        assert_eq!(grid.chunks_y, 2);

        let grid = ChunkIndexer::default().describe(10, 10, Some(4));
        assert_eq!(grid.chunk_size, 4);
        assert_eq!(grid.chunks_x, 3);
    }
}

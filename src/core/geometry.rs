//! Tile Geometry
//!
//! Integer tile positions and inclusive rectangular bounds.
//! Every coordinate in the world is a whole tile; there is no sub-tile state.

use std::fmt;

/// A tile coordinate in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a new position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    #[inline]
    pub fn manhattan(self, other: TilePos) -> u64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        dx + dy
    }

    /// Offset by a delta, saturating at the i32 limits.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> TilePos {
        TilePos::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for TilePos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Inclusive rectangular bounds `[min_x, max_x] x [min_y, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Bounds {
    /// Smallest column.
    pub min_x: i32,
    /// Largest column.
    pub max_x: i32,
    /// Smallest row.
    pub min_y: i32,
    /// Largest row.
    pub max_y: i32,
}

impl Bounds {
    /// Bounds covering every representable tile.
    pub const UNBOUNDED: Bounds = Bounds {
        min_x: i32::MIN,
        max_x: i32::MAX,
        min_y: i32::MIN,
        max_y: i32::MAX,
    };

    /// Create new bounds.
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self { min_x, max_x, min_y, max_y }
    }

    /// Bounds of a `width x height` map anchored at `origin`.
    ///
    /// A zero-sized map yields empty bounds (`max < min`).
    pub fn anchored(origin: TilePos, width: u32, height: u32) -> Self {
        let max_x = i64::from(origin.x) + i64::from(width) - 1;
        let max_y = i64::from(origin.y) + i64::from(height) - 1;
        Self {
            min_x: origin.x,
            max_x: clamp_i32(max_x),
            min_y: origin.y,
            max_y: clamp_i32(max_y),
        }
    }

    /// Whether a position lies inside (edges inclusive).
    #[inline]
    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }

    /// Intersection of two bounds. May be empty.
    pub fn intersect(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        }
    }

    /// True if no tile lies inside.
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// Centre tile (rounded toward negative infinity).
    pub fn center(&self) -> TilePos {
        let cx = (i64::from(self.min_x) + i64::from(self.max_x)).div_euclid(2);
        let cy = (i64::from(self.min_y) + i64::from(self.max_y)).div_euclid(2);
        TilePos::new(clamp_i32(cx), clamp_i32(cy))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]x[{}, {}]", self.min_x, self.max_x, self.min_y, self.max_y)
    }
}

/// Whether two inclusive ranges share at least one value.
#[inline]
pub fn ranges_overlap(a_min: i32, a_max: i32, b_min: i32, b_max: i32) -> bool {
    a_min <= b_max && b_min <= a_max
}

/// Reduce a requested move to a single legal step from `from`.
///
/// Diagonals and jumps collapse to one tile. When both axes change,
/// the horizontal component wins and the vertical one is dropped.
pub fn clamp_step(from: TilePos, to: TilePos) -> TilePos {
    let dx = i64::from(to.x) - i64::from(from.x);
    let dy = i64::from(to.y) - i64::from(from.y);
    if dx.unsigned_abs() + dy.unsigned_abs() == 1 {
        return to;
    }

    let (sx, sy) = if dx != 0 && dy != 0 {
        (dx.signum() as i32, 0)
    } else {
        (dx.signum() as i32, dy.signum() as i32)
    };
    from.offset(sx, sy)
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

//! Movement Validation
//!
//! Point and area walkability against a [`MapCatalog`].
//!
//! Area tests use half-tile units so the midpoint between two adjacent tiles
//! is exact: a box of side 1 centred at `c` overlaps tile `t` on an axis iff
//! `|2c - 2t| < 2`.

use crate::core::geometry::TilePos;
use crate::world::map::MapCatalog;

/// A point in half-tile units (`2 * world coordinate`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfPos {
    /// Doubled x.
    pub x2: i64,
    /// Doubled y.
    pub y2: i64,
}

impl HalfPos {
    /// Centre of a tile.
    pub fn of_tile(pos: TilePos) -> Self {
        Self {
            x2: 2 * i64::from(pos.x),
            y2: 2 * i64::from(pos.y),
        }
    }

    /// Midpoint between two tiles.
    pub fn midpoint(a: TilePos, b: TilePos) -> Self {
        Self {
            x2: i64::from(a.x) + i64::from(b.x),
            y2: i64::from(a.y) + i64::from(b.y),
        }
    }
}

/// Tile indices overlapped on one axis by a unit box centred at `c2 / 2`.
fn overlapped(c2: i64) -> impl Iterator<Item = i64> {
    // Even centre: exactly its own tile. Odd centre: the two tiles it straddles.
    let lo = c2.div_euclid(2);
    let hi = (c2 + 1).div_euclid(2);
    lo..=hi
}

/// Walkability checks for one map.
#[derive(Clone, Copy, Debug)]
pub struct MovementValidator<'a> {
    map: &'a MapCatalog,
}

impl<'a> MovementValidator<'a> {
    /// Validate against a map.
    pub fn new(map: &'a MapCatalog) -> Self {
        Self { map }
    }

    /// Single-tile test: no blocking object and a walkable (or unknown) tile type.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        !self.map.object_blocks(pos) && !self.map.tile_blocks(pos)
    }

    /// Unit-box test: every tile the box overlaps must be walkable.
    pub fn is_area_walkable(&self, center: HalfPos) -> bool {
        for tx in overlapped(center.x2) {
            for ty in overlapped(center.y2) {
                let (Ok(x), Ok(y)) = (i32::try_from(tx), i32::try_from(ty)) else {
                    return false;
                };
                if !self.is_walkable(TilePos::new(x, y)) {
                    return false;
                }
            }
        }
        true
    }

    /// Full move test used for accepted steps: the swept midpoint, the
    /// destination box, and the destination tile must all be clear.
    pub fn can_traverse(&self, from: TilePos, to: TilePos) -> bool {
        self.is_area_walkable(HalfPos::midpoint(from, to))
            && self.is_area_walkable(HalfPos::of_tile(to))
            && self.is_walkable(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled_map() -> MapCatalog {
        MapCatalog::new(10, 10)
            .with_tile_def("wall", false)
            .with_object_def("boulder", true)
            .with_tile(TilePos::new(2, 2), "wall")
            .with_object(TilePos::new(3, 3), "boulder")
    }

    #[test]
    fn test_point_walkability() {
        let map = walled_map();
        let v = MovementValidator::new(&map);
        assert!(!v.is_walkable(TilePos::new(2, 2)));
        assert!(!v.is_walkable(TilePos::new(3, 3)));
        assert!(v.is_walkable(TilePos::new(0, 0)));
        assert!(v.is_walkable(TilePos::new(500, -3)));
    }

    #[test]
    fn test_overlapped_tiles() {
        assert_eq!(overlapped(4).collect::<Vec<_>>(), vec![2]);
        assert_eq!(overlapped(5).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(overlapped(-1).collect::<Vec<_>>(), vec![-1, 0]);
    }

    #[test]
    fn test_midpoint_straddles_both_tiles() {
        let map = walled_map();
        let v = MovementValidator::new(&map);
        // (1,2) -> (2,2): midpoint touches the wall.
        assert!(!v.is_area_walkable(HalfPos::midpoint(TilePos::new(1, 2), TilePos::new(2, 2))));
        // (1,1) -> (1,0): clear.
        assert!(v.is_area_walkable(HalfPos::midpoint(TilePos::new(1, 1), TilePos::new(1, 0))));
    }

    #[test]
    fn test_can_traverse() {
        let map = walled_map();
        let v = MovementValidator::new(&map);
        assert!(v.can_traverse(TilePos::new(5, 5), TilePos::new(6, 5)));
        assert!(!v.can_traverse(TilePos::new(4, 3), TilePos::new(3, 3)));
        assert!(!v.can_traverse(TilePos::new(2, 1), TilePos::new(2, 2)));
    }

    #[test]
    fn test_leaving_blocked_tile_still_blocked_by_sweep() {
        // The swept box covers the origin tile too.
        let map = walled_map();
        let v = MovementValidator::new(&map);
        assert!(!v.can_traverse(TilePos::new(2, 2), TilePos::new(1, 2)));
    }
}

//! Spatial hash grid for obstacle queries
//!
//! Divides the arena into square cells and stores, for each cell, the indices
//! of props whose bounding box overlaps it. Point and segment tests only look
//! at the cells around the query, so cost does not grow with prop count.

use std::f32::consts::TAU;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::constants::arena;
use crate::game::map::{ArenaMap, Prop};
use crate::util::vec2::Vec2;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Prop indices stored per cell; most cells hold a handful
pub type CellProps = SmallVec<[u32; 8]>;

/// Hard cap on samples for a single segment test
const MAX_SEGMENT_SAMPLES: usize = 512;

/// Immutable index from cell to overlapping props.
///
/// Built once per map and never patched; regenerate the map to change it.
#[derive(Debug, Clone)]
pub struct MapGridIndex {
    inv_cell_size: f32,
    cells: HashMap<CellKey, CellProps>,
}

impl Default for MapGridIndex {
    fn default() -> Self {
        Self::build(&[], arena::GRID_CELL_SIZE)
    }
}

impl MapGridIndex {
    pub fn build(props: &[Prop], cell_size: f32) -> Self {
        let mut index = Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(props.len() * 2),
        };

        for (i, prop) in props.iter().enumerate() {
            let reach = prop.bounding_radius();
            let (min_x, min_y) = index.position_to_cell(prop.position - Vec2::new(reach, reach));
            let (max_x, max_y) = index.position_to_cell(prop.position + Vec2::new(reach, reach));
            for cx in min_x..=max_x {
                for cy in min_y..=max_y {
                    index.cells.entry((cx, cy)).or_default().push(i as u32);
                }
            }
        }

        index
    }

    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Prop indices in cells overlapping the square of half-size `radius`
    /// around `position`. May yield an index more than once.
    pub fn query(&self, position: Vec2, radius: f32) -> impl Iterator<Item = u32> + '_ {
        let (min_x, min_y) = self.position_to_cell(position - Vec2::new(radius, radius));
        let (max_x, max_y) = self.position_to_cell(position + Vec2::new(radius, radius));
        (min_x..=max_x).flat_map(move |cx| {
            (min_y..=max_y).flat_map(move |cy| {
                self.cells
                    .get(&(cx, cy))
                    .into_iter()
                    .flat_map(|cell| cell.iter().copied())
            })
        })
    }
}

impl ArenaMap {
    /// True if a circle of `padding` at (x, y) overlaps any prop or leaves the arena
    pub fn is_blocked(&self, x: f32, y: f32, padding: f32) -> bool {
        let limit = arena::HALF_EXTENT - padding.max(0.0);
        if x.abs() > limit || y.abs() > limit {
            return true;
        }
        let point = Vec2::new(x, y);
        // Props are indexed by bounding box, so the padding neighborhood is enough
        self.grid.query(point, padding.max(0.0)).any(|i| {
            self.props
                .get(i as usize)
                .is_some_and(|prop| prop.overlaps(point, padding))
        })
    }

    /// Sample the segment at a bounded step and test each sample
    pub fn is_segment_blocked(&self, ax: f32, ay: f32, bx: f32, by: f32, padding: f32) -> bool {
        let a = Vec2::new(ax, ay);
        let b = Vec2::new(bx, by);
        let length = a.distance_to(b);
        let samples = ((length / arena::SEGMENT_STEP).ceil() as usize).clamp(1, MAX_SEGMENT_SAMPLES);
        (0..=samples).any(|i| {
            let p = a.lerp(b, i as f32 / samples as f32);
            self.is_blocked(p.x, p.y, padding)
        })
    }

    /// Nearest free position by expanding ring search, or the clamped input
    /// if nothing is free within the search ceiling
    pub fn find_free_spot(&self, x: f32, y: f32, padding: f32) -> Vec2 {
        let limit = arena::HALF_EXTENT - padding.max(0.0) - 1.0;
        let origin = Vec2::new(x, y).clamp_to_square(limit);
        if !self.is_blocked(origin.x, origin.y, padding) {
            return origin;
        }
        for ring in 1..=arena::FREE_SPOT_MAX_RINGS {
            let radius = ring as f32 * arena::FREE_SPOT_RING_STEP;
            for step in 0..arena::FREE_SPOT_ANGLE_STEPS {
                let angle = step as f32 * TAU / arena::FREE_SPOT_ANGLE_STEPS as f32;
                let candidate = (origin + Vec2::from_angle(angle) * radius).clamp_to_square(limit);
                if !self.is_blocked(candidate.x, candidate.y, padding) {
                    return candidate;
                }
            }
        }
        origin
    }

    /// Line of sight between two points, ignoring entity padding
    pub fn has_line_of_sight(&self, a: Vec2, b: Vec2) -> bool {
        !self.is_segment_blocked(a.x, a.y, b.x, b.y, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{PropDecor, PropShape};

    fn rock(x: f32, y: f32, r: f32) -> Prop {
        Prop {
            shape: PropShape::Circle,
            decor: PropDecor::Rock,
            position: Vec2::new(x, y),
            half_size: Vec2::new(r, r),
        }
    }

    fn create_test_map() -> ArenaMap {
        ArenaMap::from_props(
            0,
            vec![
                rock(0.0, 0.0, 50.0),
                rock(500.0, 500.0, 30.0),
                Prop {
                    shape: PropShape::Rect,
                    decor: PropDecor::Crate,
                    position: Vec2::new(-300.0, 0.0),
                    half_size: Vec2::new(20.0, 200.0),
                },
            ],
            Vec::new(),
        )
    }

    #[test]
    fn test_point_blocked() {
        let map = create_test_map();
        assert!(map.is_blocked(10.0, 10.0, 0.0));
        assert!(!map.is_blocked(80.0, 0.0, 0.0));
        // Padding reaches the rock
        assert!(map.is_blocked(80.0, 0.0, 40.0));
        assert!(map.is_blocked(-300.0, 150.0, 0.0));
    }

    #[test]
    fn test_outside_arena_is_blocked() {
        let map = create_test_map();
        assert!(map.is_blocked(arena::HALF_EXTENT + 1.0, 0.0, 0.0));
        assert!(map.is_blocked(arena::HALF_EXTENT - 5.0, 0.0, 10.0));
    }

    #[test]
    fn test_prop_spanning_cells() {
        // The wall spans several cells; a point far from its center still hits
        let map = create_test_map();
        assert!(map.is_blocked(-300.0, -190.0, 0.0));
        assert!(map.grid.cell_count() > 3);
    }

    #[test]
    fn test_segment_blocked() {
        let map = create_test_map();
        // Passes through the wall
        assert!(map.is_segment_blocked(-500.0, 0.0, -100.0, 0.0, 0.0));
        // Parallel to the wall, clear
        assert!(!map.is_segment_blocked(-500.0, 300.0, -100.0, 300.0, 0.0));
        assert!(!map.has_line_of_sight(Vec2::new(-500.0, 0.0), Vec2::new(-100.0, 0.0)));
    }

    #[test]
    fn test_find_free_spot() {
        let map = create_test_map();
        let spot = map.find_free_spot(0.0, 0.0, 18.0);
        assert!(!map.is_blocked(spot.x, spot.y, 18.0));
        assert!(spot.length() < 100.0);

        // Already free: returned unchanged
        assert_eq!(map.find_free_spot(200.0, 200.0, 18.0), Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_find_free_spot_clamps_input() {
        let map = create_test_map();
        let spot = map.find_free_spot(99_999.0, 0.0, 10.0);
        assert!(spot.x <= arena::HALF_EXTENT - 10.0);
        assert!(!map.is_blocked(spot.x, spot.y, 10.0));
    }

    #[test]
    fn test_empty_map_never_blocks() {
        let map = ArenaMap::from_props(0, Vec::new(), Vec::new());
        assert!(!map.is_blocked(0.0, 0.0, 50.0));
        assert!(!map.is_segment_blocked(-1000.0, -1000.0, 1000.0, 1000.0, 10.0));
    }
}

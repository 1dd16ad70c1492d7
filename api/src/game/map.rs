//! Procedural arena generation
//!
//! The layout is a pure function of [`MapParams`]: same params, same props.
//! All randomness comes from a private [`Lcg`] so gameplay RNG consumption
//! never changes what an admin regeneration produces.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::game::constants::arena;
use crate::game::spatial::MapGridIndex;
use crate::util::rng::Lcg;
use crate::util::vec2::Vec2;

/// Obstacle footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropShape {
    /// `half_size.x` is the radius
    Circle,
    /// Axis-aligned, `half_size` holds the half extents
    Rect,
}

/// Purely cosmetic prop flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropDecor {
    Rock,
    Tree,
    Bush,
    Crate,
    Ruin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub shape: PropShape,
    pub decor: PropDecor,
    pub position: Vec2,
    pub half_size: Vec2,
}

impl Prop {
    /// Radius of the bounding circle
    pub fn bounding_radius(&self) -> f32 {
        match self.shape {
            PropShape::Circle => self.half_size.x,
            PropShape::Rect => self.half_size.length(),
        }
    }

    /// True if a circle of `padding` radius at `point` overlaps this prop
    pub fn overlaps(&self, point: Vec2, padding: f32) -> bool {
        match self.shape {
            PropShape::Circle => {
                let reach = self.half_size.x + padding;
                point.distance_sq_to(self.position) < reach * reach
            }
            PropShape::Rect => {
                let local = point - self.position;
                let dx = (local.x.abs() - self.half_size.x).max(0.0);
                let dy = (local.y.abs() - self.half_size.y).max(0.0);
                if padding <= 0.0 {
                    dx <= 0.0 && dy <= 0.0
                } else {
                    dx * dx + dy * dy < padding * padding
                }
            }
        }
    }
}

/// Named landmark used as a loot anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub name: String,
    pub position: Vec2,
}

/// Fixed landmark layout
const POI_BLUEPRINT: [(&str, f32, f32); 7] = [
    ("Cornucopia", 0.0, 0.0),
    ("Old Mill", 950.0, -700.0),
    ("Watchtower", -1000.0, -650.0),
    ("Quarry", -900.0, 900.0),
    ("Lakeside", 1000.0, 850.0),
    ("Ruins", 0.0, 1250.0),
    ("Orchard", 0.0, -1250.0),
];

/// Number of evenly spaced spawn points on the outer ring
pub const SPAWN_POINTS: usize = 16;

/// Generator inputs. Anything not in here cannot change the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct MapParams {
    pub seed: u64,
    pub obstacle_count: u32,
    pub density: f32,
    pub size_variance: f32,
    pub lane_width: f32,
    /// Radius of the carved ring lane
    pub ring_radius: f32,
}

impl MapParams {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            seed: config.map_seed,
            obstacle_count: config.obstacle_count,
            density: config.obstacle_density,
            size_variance: config.size_variance,
            lane_width: config.lane_width,
            // Just inside the starting border so the ring stays walkable
            ring_radius: (config.border_start_radius * 0.92).min(arena::HALF_EXTENT * 0.95),
        }
    }
}

/// Generated playfield
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArenaMap {
    pub seed: u64,
    pub props: Vec<Prop>,
    pub pois: Vec<Poi>,
    #[serde(skip)]
    pub grid: MapGridIndex,
}

impl ArenaMap {
    /// Wrap an explicit prop list (tests, tooling) and index it
    pub fn from_props(seed: u64, props: Vec<Prop>, pois: Vec<Poi>) -> Self {
        let grid = MapGridIndex::build(&props, arena::GRID_CELL_SIZE);
        Self {
            seed,
            props,
            pois,
            grid,
        }
    }
}

pub fn blueprint_pois() -> Vec<Poi> {
    POI_BLUEPRINT
        .iter()
        .map(|(name, x, y)| Poi {
            name: (*name).to_string(),
            position: Vec2::new(*x, *y),
        })
        .collect()
}

pub fn spawn_points() -> Vec<Vec2> {
    (0..SPAWN_POINTS)
        .map(|i| Vec2::from_angle(i as f32 * TAU / SPAWN_POINTS as f32) * arena::OUTER_RING_RADIUS)
        .collect()
}

/// Chest layout: a central cluster, an inner ring and an outer ring
pub fn chest_points() -> Vec<Vec2> {
    let mut points = Vec::with_capacity(28);
    for i in 0..4 {
        let angle = i as f32 * TAU / 4.0 + TAU / 8.0;
        points.push(Vec2::from_angle(angle) * arena::CENTER_RING_RADIUS);
    }
    for i in 0..8 {
        let angle = i as f32 * TAU / 8.0 + TAU / 16.0;
        points.push(Vec2::from_angle(angle) * arena::INNER_RING_RADIUS);
    }
    for i in 0..12 {
        let angle = i as f32 * TAU / 12.0 + TAU / 24.0;
        points.push(Vec2::from_angle(angle) * arena::OUTER_RING_RADIUS);
    }
    points
}

/// Generate an arena from `params`
pub fn generate(params: &MapParams) -> ArenaMap {
    let mut rng = Lcg::new(params.seed);
    let pois = blueprint_pois();

    let mut anchors: Vec<Vec2> = pois.iter().map(|p| p.position).collect();
    anchors.extend(spawn_points());
    anchors.extend(chest_points());

    let target = params.obstacle_count as usize;
    let density = params.density.clamp(0.0, 1.0);
    let variance = params.size_variance.clamp(0.0, 1.0);
    let scatter_count = (target as f32 * (0.4 + 0.6 * density)).round() as usize;
    let spread = arena::HALF_EXTENT - arena::MAX_PROP_SIZE;

    // Scatter
    let mut props: Vec<Prop> = Vec::with_capacity(target);
    for _ in 0..scatter_count {
        let position = Vec2::new(rng.range(-spread, spread), rng.range(-spread, spread));
        let base = 30.0 + 40.0 * density;
        let size = (base * (1.0 + variance * rng.range(-1.0, 1.0)))
            .clamp(arena::MIN_PROP_SIZE, arena::MAX_PROP_SIZE);
        let prop = roll_prop(&mut rng, position, size);
        if near_anchor(&anchors, &prop) || crowded(&props, &prop) {
            continue;
        }
        props.push(prop);
    }

    // Carve lanes
    props.retain(|p| !in_lane(p.position, &pois, params));

    // Backfill small props up to the retained floor
    let floor = (target as f32 * (0.35 + 0.35 * density)).round() as usize;
    let budget = target * arena::BACKFILL_ATTEMPTS_PER_PROP;
    let mut attempts = 0;
    while props.len() < floor && attempts < budget {
        attempts += 1;
        let position = Vec2::new(rng.range(-spread, spread), rng.range(-spread, spread));
        let size = rng.range(arena::MIN_PROP_SIZE, arena::MIN_PROP_SIZE * 1.8);
        let prop = roll_prop(&mut rng, position, size);
        if in_lane(prop.position, &pois, params) || near_anchor(&anchors, &prop) || crowded(&props, &prop) {
            continue;
        }
        props.push(prop);
    }

    tracing::debug!(
        seed = params.seed,
        props = props.len(),
        attempts,
        "Arena generated"
    );

    ArenaMap::from_props(params.seed, props, pois)
}

fn roll_prop(rng: &mut Lcg, position: Vec2, size: f32) -> Prop {
    let decor = match rng.index(5) {
        0 => PropDecor::Rock,
        1 => PropDecor::Tree,
        2 => PropDecor::Bush,
        3 => PropDecor::Crate,
        _ => PropDecor::Ruin,
    };
    match decor {
        PropDecor::Crate | PropDecor::Ruin => {
            let aspect = rng.range(0.6, 1.6);
            Prop {
                shape: PropShape::Rect,
                decor,
                position,
                half_size: Vec2::new(size * 0.5 * aspect, size * 0.5 / aspect),
            }
        }
        _ => Prop {
            shape: PropShape::Circle,
            decor,
            position,
            half_size: Vec2::new(size * 0.5, size * 0.5),
        },
    }
}

fn near_anchor(anchors: &[Vec2], prop: &Prop) -> bool {
    let reach = arena::AVOID_RADIUS + prop.bounding_radius();
    anchors
        .iter()
        .any(|a| a.distance_sq_to(prop.position) < reach * reach)
}

/// Local density control against the most recently placed props
fn crowded(props: &[Prop], prop: &Prop) -> bool {
    let start = props.len().saturating_sub(arena::LOCAL_WINDOW);
    props[start..].iter().any(|other| {
        let reach = arena::LOCAL_SPACING + other.bounding_radius() + prop.bounding_radius();
        other.position.distance_sq_to(prop.position) < reach * reach
    })
}

/// Lanes: center to each POI, both cardinal axes, and a ring near the border
fn in_lane(point: Vec2, pois: &[Poi], params: &MapParams) -> bool {
    let w = params.lane_width;
    if point.x.abs() < w || point.y.abs() < w {
        return true;
    }
    if (point.length() - params.ring_radius).abs() < w {
        return true;
    }
    pois.iter()
        .any(|poi| point.distance_to_segment(Vec2::ZERO, poi.position) < w)
}

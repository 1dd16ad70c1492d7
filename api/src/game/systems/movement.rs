//! Player movement against the obstacle grid
//!
//! Intent and knockback are integrated together. A blocked move slides along
//! whichever axis is still free instead of stopping dead.

use crate::game::constants::{arena, items, player};
use crate::game::state::{BuffKind, Millis, Player, World};
use crate::util::vec2::Vec2;

/// Movement speed for `p` at `now`, including swift and speed boost
pub fn speed_of(p: &Player, now: Millis) -> f32 {
    let mut speed = player::BASE_SPEED;
    if p.buffs.has(BuffKind::Swift, now) {
        speed *= items::SWIFT_MULTIPLIER;
    }
    if p.buffs.is_speed_boosted(now) {
        speed *= items::SPEED_BOOST_MULTIPLIER;
    }
    speed
}

/// Integrate all active players
pub fn update(world: &mut World, dt: f32) {
    let now = world.now();
    let retain = player::KNOCKBACK_RETAIN_PER_SEC.powf(dt);
    let limit = arena::HALF_EXTENT - player::RADIUS - 1.0;
    let map = &world.map;

    for p in world.players.values_mut().filter(|p| p.is_active()) {
        let intent = p.move_intent.clamp_length(1.0);
        let velocity = intent * speed_of(p, now) + p.knockback;
        p.knockback *= retain;
        if p.knockback.length_sq() < 1.0 {
            p.knockback = Vec2::ZERO;
        }

        let step = velocity * dt;
        if step.length_sq() <= f32::EPSILON {
            continue;
        }

        let from = p.position;
        let full = (from + step).clamp_to_square(limit);
        p.position = if !map.is_blocked(full.x, full.y, player::RADIUS) {
            full
        } else {
            let slide_x = Vec2::new(full.x, from.y);
            let slide_y = Vec2::new(from.x, full.y);
            if !map.is_blocked(slide_x.x, slide_x.y, player::RADIUS) {
                slide_x
            } else if !map.is_blocked(slide_y.x, slide_y.y, player::RADIUS) {
                slide_y
            } else {
                from
            }
        };
    }
}

/// Clamp and store a movement intent. Non-finite input is ignored.
pub fn set_intent(p: &mut Player, mx: f32, my: f32, angle: f32, now: Millis) {
    if mx.is_finite() && my.is_finite() {
        p.move_intent = Vec2::new(mx.clamp(-1.0, 1.0), my.clamp(-1.0, 1.0));
    }
    if angle.is_finite() {
        p.facing = angle;
    }
    p.last_input_at = now;
}

/// Move anyone stuck inside an obstacle (after a map regeneration)
pub fn unstick_all(world: &mut World) {
    let map = &world.map;
    for p in world.players.values_mut() {
        if map.is_blocked(p.position.x, p.position.y, player::RADIUS) {
            p.position = map.find_free_spot(p.position.x, p.position.y, player::RADIUS);
        }
    }
}

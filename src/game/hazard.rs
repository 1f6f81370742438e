//! Asteroid Hazards
//!
//! Deterministic segment-vs-circle checks for completed movements.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{MatchState, ShipId};

/// A circular asteroid field, fixed for the match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AsteroidField {
    /// Field center
    pub center: Vec2,
    /// Field radius
    pub radius: f64,
}

impl AsteroidField {
    /// Whether a travelled segment passes within the field plus clearance.
    #[inline]
    pub fn touches_segment(&self, from: Vec2, to: Vec2, clearance: f64) -> bool {
        self.center.distance_to_segment(from, to) <= self.radius + clearance
    }
}

/// Generate the asteroid fields of a match.
///
/// Uses its own generator seeded from the match seed so the shared RNG is
/// left untouched.
pub fn generate_asteroid_fields(seed: &str, config: &MatchConfig) -> Vec<AsteroidField> {
    let mut rng = DeterministicRng::from_seed_str(&format!("{seed}:asteroids"));
    let count = rng.next_int(config.min_asteroid_fields, config.max_asteroid_fields).max(0);
    (0..count)
        .map(|_| {
            let x = rng.next_float(-config.arena_half_width, config.arena_half_width);
            let y = rng.next_float(-config.arena_half_height, config.arena_half_height);
            let radius = rng.next_float(config.min_asteroid_radius, config.max_asteroid_radius);
            AsteroidField { center: Vec2::new(x, y), radius }
        })
        .collect()
}

/// Resolve asteroid strikes along a ship's travelled segment.
///
/// Each field in range draws one d6 from the shared RNG; the ship takes the
/// roll minus one. Every field in range rolls even after the ship is
/// destroyed; damage to a wreck is discarded. Returns the rolled damage per
/// field index.
pub fn resolve_movement(state: &mut MatchState, ship: ShipId, from: Vec2, to: Vec2) -> Vec<(usize, u32)> {
    let clearance = state.config.asteroid_clearance;
    let mut strikes = Vec::new();

    for index in 0..state.asteroid_fields.len() {
        let field = state.asteroid_fields[index];
        if !field.touches_segment(from, to, clearance) {
            continue;
        }

        let damage = u32::from(state.rng.roll_d6().saturating_sub(1));
        debug!("Ship {} crossed asteroid field {} for {} damage", ship.short(), index, damage);
        strikes.push((index, damage));
        if damage > 0 && state.ship(&ship).is_some_and(|s| s.alive) {
            let round = state.round;
            state.push_event(GameEvent::new(round, GameEventData::HazardStruck { ship, field: index, damage }));
            state.apply_damage(ship, damage, None);
        }
    }

    strikes
}

//! Autopilot
//!
//! A simple `LocalCommander` that plays a fleet without human input: it
//! deploys in line at its seat's edge, closes on the nearest enemy and fires
//! the first weapon that has a target in range. Used by the replay binary
//! and by tests that need a match to actually progress.

use std::collections::BTreeMap;

use crate::core::vec2::Vec2;
use crate::game::action::plan_challenge;
use crate::game::context::{ActionDecision, CommandDecision, DeployDecision, LocalCommander, MoveDecision};
use crate::game::phase::PendingChallenge;
use crate::game::state::{MatchState, PlayerId, Ship, ShipId};
use crate::game::systems::SystemKind;
use crate::game::tick::Simulation;

/// Distance kept from the nearest enemy when closing in.
const STANDOFF: f64 = 10.0;

/// Spacing between ships deployed in line.
const LINE_SPACING: f64 = 6.0;

/// Slack kept off the thrust budget so rounding never overruns it.
const BUDGET_EPSILON: f64 = 1e-6;

/// Inset from the arena edge for deployment.
const EDGE_INSET: f64 = 8.0;

/// Computer player for one seat.
#[derive(Clone, Debug)]
pub struct Autopilot {
    player: PlayerId,
}

impl Autopilot {
    /// Autopilot flying `player`'s fleet.
    pub fn new(player: PlayerId) -> Self {
        Self { player }
    }

    /// Player this autopilot commands.
    pub fn player(&self) -> PlayerId {
        self.player
    }

    fn nearest_enemy<'a>(&self, state: &'a MatchState, from: Vec2) -> Option<&'a Ship> {
        state
            .ships_in_seat_order()
            .iter()
            .filter_map(|id| state.ship(id))
            .filter(|s| s.active() && s.owner != self.player)
            .fold(None, |best: Option<&Ship>, ship| match best {
                Some(b) if b.position.distance(from) <= ship.position.distance(from) => Some(b),
                _ => Some(ship),
            })
    }

    /// First ready weapon with a target in range, nearest targets first.
    fn pick_shot(&self, state: &MatchState, ship_id: &ShipId) -> Option<ActionDecision> {
        let ship = state.ship(ship_id)?;
        let template = state.template_of(ship)?;

        let mut targets: Vec<&Ship> = state
            .ships
            .values()
            .filter(|s| s.active() && s.owner != self.player)
            .collect();
        targets.sort_by(|a, b| {
            a.position
                .distance(ship.position)
                .total_cmp(&b.position.distance(ship.position))
                .then(a.id.cmp(&b.id))
        });

        for index in 0..ship.systems.len() {
            let Some(system) = ship.effective_system(template, index) else {
                continue;
            };
            if !matches!(system.kind, SystemKind::Weapon(_)) || ship.systems[index].used {
                continue;
            }
            for target in &targets {
                if plan_challenge(state, ship_id, &target.id, &system.name).is_ok() {
                    return Some(ActionDecision::Fire {
                        ship: *ship_id,
                        weapon: system.name.clone(),
                        target: target.id,
                    });
                }
            }
        }
        None
    }
}

impl LocalCommander for Autopilot {
    fn deploy(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<DeployDecision> {
        let state = &sim.state;
        let ship = *ships.first()?;
        let seat = state.player(&self.player)?.seat;
        let slot = state.fleet(&self.player).position(|s| s.id == ship)?;

        let config = &state.config;
        let west = seat % 2 == 0;
        let x = if west {
            -(config.arena_half_width - EDGE_INSET)
        } else {
            config.arena_half_width - EDGE_INSET
        };
        let lane = f64::from(seat / 2) * LINE_SPACING * 3.0;
        let y = (slot as f64 * LINE_SPACING + lane - config.arena_half_height / 2.0)
            .clamp(-config.arena_half_height, config.arena_half_height);

        Some(DeployDecision {
            ship,
            location: Vec2::new(x, y),
            rotation: if west { 0.0 } else { 180.0 },
        })
    }

    fn command(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<CommandDecision> {
        let state = &sim.state;
        let ship = *ships.first()?;
        let template = state.ship(&ship).and_then(|s| state.template_of(s))?;

        let selections: BTreeMap<usize, i8> = template
            .systems
            .iter()
            .enumerate()
            .filter(|(_, system)| system.is_composite())
            .map(|(index, _)| (index, 0))
            .collect();
        Some(CommandDecision { ship, order: None, selections })
    }

    fn movement(&mut self, sim: &Simulation, ships: &[ShipId]) -> Option<MoveDecision> {
        let state = &sim.state;
        let ship_id = *ships.first()?;
        let ship = state.ship(&ship_id)?;
        let coast = ship.coast_point();

        let destination = match self.nearest_enemy(state, coast) {
            Some(enemy) => {
                let offset = enemy.position - coast;
                let budget = (f64::from(ship.thrust_remaining.max(0)) * state.config.distance_per_thrust
                    - BUDGET_EPSILON)
                    .max(0.0);
                let step = (offset.length() - STANDOFF).clamp(0.0, budget);
                coast + offset.normalize() * step
            }
            None => coast,
        };
        Some(MoveDecision { ship: ship_id, destination })
    }

    fn action(&mut self, sim: &Simulation, ships: &[ShipId], active: Option<ShipId>) -> Option<ActionDecision> {
        let ship = active.or_else(|| ships.first().copied())?;
        self.pick_shot(&sim.state, &ship).or(Some(ActionDecision::End { ship }))
    }

    fn respond(&mut self, _sim: &Simulation, _challenge: &PendingChallenge) -> Option<Vec<usize>> {
        Some(Vec::new())
    }
}

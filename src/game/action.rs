//! Action Phase
//!
//! A ship's activation is a sequence of challenges, each answered by the
//! target's owner, closed by an activation end. Challenges are resolved when
//! their response is applied.

use std::collections::BTreeMap;
use tracing::debug;

use crate::game::combat::{resolve_challenge, CombatOutcome};
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::phase::PendingChallenge;
use crate::game::state::{MatchState, Order, ShipId};
use crate::game::systems::SystemKind;
use crate::game::turn::Turn;

/// Validated attack.
#[derive(Clone, Debug, PartialEq)]
pub struct ChallengePlan {
    /// Index of the firing system
    pub system: usize,
    /// Dice thrown
    pub shots: u32,
    /// Damage per hit
    pub damage: u32,
    /// Range band modifier
    pub modifier: i32,
    /// Distance to the target
    pub distance: f64,
}

/// Check that `attacker` can fire `weapon` at `target`.
pub fn plan_challenge(state: &MatchState, attacker: &ShipId, target: &ShipId, weapon: &str) -> Result<ChallengePlan> {
    let ship = state
        .ship(attacker)
        .filter(|s| s.active())
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {attacker} cannot fire")))?;
    if ship.order == Some(Order::AllAheadFull) {
        return Err(GameError::InvalidSelection(format!(
            "ship {} is running all ahead full",
            attacker.short()
        )));
    }
    let template = state
        .template_of(ship)
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {attacker} has no template")))?;

    let armed = ship.find_system(template, weapon).and_then(|index| {
        let used = ship.systems.get(index).is_some_and(|s| s.used);
        match ship.effective_system(template, index).map(|s| &s.kind) {
            Some(SystemKind::Weapon(stats)) if !used => Some((index, stats)),
            _ => None,
        }
    });
    let Some((system, stats)) = armed else {
        return Err(GameError::InvalidSelection(format!("no ready weapon named {weapon:?}")));
    };

    let enemy = state
        .ship(target)
        .filter(|t| t.active() && t.owner != ship.owner)
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {target} is not a valid target")))?;
    let distance = ship.position.distance(enemy.position);
    let modifier = stats.ranges.modifier_at(distance).ok_or(GameError::OutOfRange {
        target: *target,
        distance,
        max_range: stats.ranges.long,
    })?;

    Ok(ChallengePlan { system, shots: stats.shots, damage: stats.damage, modifier, distance })
}

fn check_field(field: &'static str, expected: i64, found: Option<i32>) -> std::result::Result<(), ViolationKind> {
    let found = found.ok_or(ViolationKind::MissingField(field))?;
    if i64::from(found) != expected {
        return Err(ViolationKind::Mismatch { field, expected: expected.to_string(), found: found.to_string() });
    }
    Ok(())
}

/// Apply a challenge entry and return the challenge now awaiting a response.
pub fn apply_challenge(state: &mut MatchState, turn: &Turn) -> std::result::Result<PendingChallenge, ViolationKind> {
    let target = turn.target.ok_or(ViolationKind::MissingField("target"))?;
    let weapon = turn.weapon.as_deref().ok_or(ViolationKind::MissingField("weapon"))?;
    let plan = plan_challenge(state, &turn.ship, &target, weapon)?;
    check_field("shots", i64::from(plan.shots), turn.shots)?;
    check_field("damage", i64::from(plan.damage), turn.damage)?;
    check_field("defence_modifier", i64::from(plan.modifier), turn.defence_modifier)?;

    let responder = state.ship(&target).map(|t| t.owner).ok_or(ViolationKind::UnknownShip(target))?;
    if let Some(status) = state.ship_mut(&turn.ship).and_then(|s| s.systems.get_mut(plan.system)) {
        status.used = true;
    }

    debug!(
        "Ship {} challenges {} with {} at {:.1}",
        turn.ship.short(),
        target.short(),
        weapon,
        plan.distance
    );
    let round = state.round;
    state.push_event(GameEvent::new(
        round,
        GameEventData::ChallengeIssued {
            attacker: turn.ship,
            target,
            weapon: weapon.to_string(),
            shots: plan.shots,
        },
    ));

    Ok(PendingChallenge {
        attacker: turn.ship,
        target,
        responder,
        system: plan.system,
        shots: plan.shots,
        damage: plan.damage,
        modifier: plan.modifier,
    })
}

/// Operational defence systems of the target named by a response, with their dice.
pub fn engaged_defences(
    state: &MatchState,
    target: &ShipId,
    selections: &BTreeMap<i32, i32>,
) -> Result<Vec<(usize, u32)>> {
    let ship = state
        .ship(target)
        .ok_or_else(|| GameError::InvalidSelection(format!("unknown ship {target}")))?;
    let template = state
        .template_of(ship)
        .ok_or_else(|| GameError::InvalidSelection(format!("ship {target} has no template")))?;

    let mut engaged = Vec::new();
    for (&index, &value) in selections {
        if value == 0 {
            continue;
        }
        let defence = usize::try_from(index).ok().and_then(|i| {
            match ship.effective_system(template, i).map(|s| &s.kind) {
                Some(SystemKind::Defence { dice }) if value == 1 => Some((i, *dice)),
                _ => None,
            }
        });
        match defence {
            Some(entry) => engaged.push(entry),
            None => {
                return Err(GameError::InvalidSelection(format!("system {index} cannot be engaged")));
            }
        }
    }
    Ok(engaged)
}

/// Apply a response entry, resolving the pending challenge.
pub fn apply_response(
    state: &mut MatchState,
    challenge: &PendingChallenge,
    turn: &Turn,
) -> std::result::Result<CombatOutcome, ViolationKind> {
    if turn.ship != challenge.target {
        return Err(ViolationKind::Mismatch {
            field: "ship",
            expected: challenge.target.to_string(),
            found: turn.ship.to_string(),
        });
    }
    if let Some(attacker) = turn.target.filter(|a| *a != challenge.attacker) {
        return Err(ViolationKind::Mismatch {
            field: "target",
            expected: challenge.attacker.to_string(),
            found: attacker.to_string(),
        });
    }

    let empty = BTreeMap::new();
    let selections = turn.system_status.as_ref().unwrap_or(&empty);
    let engaged = engaged_defences(state, &challenge.target, selections)?;
    Ok(resolve_challenge(state, challenge, &engaged))
}

/// Close a ship's activation.
pub fn apply_action_end(state: &mut MatchState, ship: ShipId) {
    let round = state.round;
    state.push_event(GameEvent::new(round, GameEventData::ActivationEnded { ship }));
}

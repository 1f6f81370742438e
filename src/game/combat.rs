//! Combat Resolution
//!
//! Dice resolution for a challenge once its response is on the log. All
//! draws come from the shared RNG in a fixed order:
//!
//! 1. attack dice
//! 2. attacker rerolls (Lock on Target)
//! 3. defender rerolls (Brace for Impact)
//! 4. defence dice, per engaged system in index order
//! 5. critical locations

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::phase::PendingChallenge;
use crate::game::state::{MatchState, Order};
use crate::game::systems::Training;

/// Lowest face a roll can need.
pub const MIN_TARGET_NUMBER: u8 = 2;

/// Highest face a roll can need.
pub const MAX_TARGET_NUMBER: u8 = 6;

/// Face needed by an attack from a crew at `training` with a range modifier.
pub fn target_number(training: Training, modifier: i32) -> u8 {
    let raw = i32::from(training.target_number()) - modifier;
    raw.clamp(i32::from(MIN_TARGET_NUMBER), i32::from(MAX_TARGET_NUMBER)) as u8
}

/// Reroll every die matching `predicate`, in order. Returns how many were rerolled.
pub fn reroll_where<F>(rng: &mut DeterministicRng, dice: &mut [u8], predicate: F) -> u32
where
    F: Fn(u8) -> bool,
{
    let mut rerolled = 0;
    for die in dice.iter_mut() {
        if predicate(*die) {
            *die = rng.roll_d6();
            rerolled += 1;
        }
    }
    rerolled
}

/// Result of one resolved challenge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatOutcome {
    /// Final attack dice
    pub dice: Vec<u8>,
    /// Face each die needed
    pub target_number: u8,
    /// Successful attack dice
    pub hits: u32,
    /// Hits cancelled by defences
    pub intercepted: u32,
    /// Hull damage dealt
    pub damage: u32,
    /// Systems knocked out by criticals
    pub criticals: Vec<usize>,
    /// Target destroyed by this challenge
    pub destroyed: bool,
}

/// Resolve a challenge against its target.
///
/// `engaged` lists the target's defence systems the responder committed;
/// callers have already checked they are operational defences.
pub fn resolve_challenge(state: &mut MatchState, challenge: &PendingChallenge, engaged: &[(usize, u32)]) -> CombatOutcome {
    let (Some(attacker), Some(defender)) = (state.ship(&challenge.attacker), state.ship(&challenge.target)) else {
        return CombatOutcome::default();
    };
    let needed = target_number(attacker.training, challenge.modifier);
    let attacker_order = attacker.order;
    let defender_order = defender.order;
    let defence_target = defender.training.target_number();
    let system_count = defender.systems.len();

    let rng = &mut state.rng;
    let mut dice = rng.roll_d6s(challenge.shots);
    if attacker_order == Some(Order::LockOnTarget) {
        reroll_where(rng, &mut dice, |face| face < needed);
    }
    if defender_order == Some(Order::BraceForImpact) {
        reroll_where(rng, &mut dice, |face| face >= needed);
    }

    let hits = dice.iter().filter(|face| **face >= needed).count() as u32;
    let natural_sixes = dice.iter().filter(|face| **face == 6).count() as u32;

    let mut intercepted = 0;
    for (_, defence_dice) in engaged {
        intercepted += rng.count_successes(*defence_dice, defence_target);
    }
    let intercepted = intercepted.min(hits);
    let surviving = hits - intercepted;
    let damage = surviving * challenge.damage;

    debug!(
        "Challenge {} -> {}: dice {:?} need {} hits {} intercepted {}",
        challenge.attacker.short(),
        challenge.target.short(),
        dice,
        needed,
        hits,
        intercepted
    );

    let round = state.round;
    state.push_event(GameEvent::new(
        round,
        GameEventData::ChallengeResolved {
            attacker: challenge.attacker,
            target: challenge.target,
            hits,
            intercepted,
            damage,
        },
    ));

    let destroyed = state.apply_damage(challenge.target, damage, Some(challenge.attacker));

    let mut criticals = Vec::new();
    if !destroyed && system_count > 0 {
        for _ in 0..natural_sixes.min(surviving) {
            let index = state.rng.next_int(0, system_count as i32 - 1) as usize;
            state.damage_system(challenge.target, index);
            criticals.push(index);
        }
    }

    CombatOutcome {
        dice,
        target_number: needed,
        hits,
        intercepted,
        damage,
        criticals,
        destroyed,
    }
}

//! Turn Application
//!
//! The phase machine every client drives with the same log entries.
//!
//! # Determinism
//!
//! Applying the same entries to simulations built from the same seed and
//! roster yields identical state:
//! - Uses BTreeMap and seat/fleet order for iteration
//! - Uses the shared DeterministicRng for every draw
//! - Automatic phases (Initiative, Cleanup) settle inline after each entry
//! - No wall clock, no unordered containers

use tracing::{debug, error, info};

use crate::core::hash::{StateHash, StateHasher};
use crate::game::action::{apply_action_end, apply_challenge, apply_response};
use crate::game::command::apply_command;
use crate::game::deploy::{apply_deployment, undeployed_ships};
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::initiative::{
    eligible_players, eligible_ships, next_in_rotation, roll_initiative, select_starter, FairnessQueue,
};
use crate::game::movement::apply_movement;
use crate::game::phase::{PendingChallenge, Phase, PhaseState, STEP_EXHAUSTED, STEP_LOWEST};
use crate::game::state::{MatchState, PlayerId, ShipId};
use crate::game::turn::{Turn, TurnAction};

/// What the phase machine waits for next.
#[derive(Clone, Debug, PartialEq)]
pub enum Expectation {
    /// Nothing can happen: the match is decided or no ship can act
    Idle,
    /// A player must place one of these ships
    Deploy {
        /// Deploying player
        player: PlayerId,
        /// Ships still to place, in fleet order
        ships: Vec<ShipId>,
    },
    /// A player must resolve one of these ships in a gated phase
    Activate {
        /// Gated phase
        phase: Phase,
        /// Initiative step
        step: u8,
        /// Acting player
        player: PlayerId,
        /// Eligible ships, in fleet order
        ships: Vec<ShipId>,
    },
    /// A ship mid-activation may challenge again or end its activation
    Continue {
        /// Acting player
        player: PlayerId,
        /// Active ship
        ship: ShipId,
    },
    /// The target owner must answer a challenge
    Respond {
        /// Responding player
        player: PlayerId,
        /// Challenge to answer
        challenge: PendingChallenge,
    },
}

impl Expectation {
    /// Player whose entry comes next.
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Expectation::Idle => None,
            Expectation::Deploy { player, .. }
            | Expectation::Activate { player, .. }
            | Expectation::Continue { player, .. }
            | Expectation::Respond { player, .. } => Some(*player),
        }
    }
}

/// Match entities plus phase machine.
#[derive(Clone, Debug)]
pub struct Simulation {
    /// Entity registry and shared RNG
    pub state: MatchState,
    /// Phase machine counters
    pub phase: PhaseState,
    /// Recent contested starters
    pub fairness: FairnessQueue,
    /// Last player standing, once decided
    pub winner: Option<PlayerId>,
}

impl Simulation {
    /// Start a match at deployment.
    pub fn new(state: MatchState) -> Self {
        let fairness = FairnessQueue::new(state.config.fairness_window);
        let mut sim = Self {
            state,
            phase: PhaseState::default(),
            fairness,
            winner: None,
        };
        sim.settle();
        sim
    }

    /// Current phase.
    pub fn current_phase(&self) -> Phase {
        self.phase.phase
    }

    /// Current round (0 during deployment).
    pub fn round(&self) -> u32 {
        self.phase.round
    }

    /// What entry the machine accepts next.
    pub fn expected(&self) -> Expectation {
        if self.winner.is_some() {
            return Expectation::Idle;
        }
        let Some(player) = self.phase.acting else {
            return match &self.phase.challenge {
                Some(challenge) => Expectation::Respond { player: challenge.responder, challenge: challenge.clone() },
                None => Expectation::Idle,
            };
        };
        if let Some(challenge) = &self.phase.challenge {
            return Expectation::Respond { player: challenge.responder, challenge: challenge.clone() };
        }

        match self.phase.phase {
            Phase::Deployment => Expectation::Deploy { player, ships: undeployed_ships(&self.state, &player) },
            Phase::Command | Phase::Movement | Phase::Action => match self.phase.active_ship {
                Some(ship) => Expectation::Continue { player, ship },
                None => Expectation::Activate {
                    phase: self.phase.phase,
                    step: self.phase.step,
                    player,
                    ships: eligible_ships(&self.state, &self.phase.resolved, self.phase.step, &player),
                },
            },
            Phase::Initiative | Phase::Cleanup => Expectation::Idle,
        }
    }

    /// Apply the log entry at `index`.
    ///
    /// On error the simulation may be partially mutated; callers replaying a
    /// batch restore a snapshot (see `ReplicationCursor`).
    pub fn apply_turn(&mut self, index: usize, turn: &Turn) -> Result<()> {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!("entry {}: {}", index, String::from_utf8_lossy(&turn.to_json()));

        if let Err(kind) = self.dispatch(turn) {
            error!("Protocol violation at log index {}: {}", index, kind);
            return Err(GameError::ProtocolViolation { index, kind });
        }
        debug!("Applied {:?} for ship {} at index {}", turn.action, turn.ship.short(), index);

        self.phase.turn = index + 1;
        self.settle();
        Ok(())
    }

    /// Hash of entities, RNG and phase counters.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_match_state();
        hasher.update_bytes(&self.state.compute_hash());
        hasher.update_u8(self.phase.phase as u8);
        hasher.update_u32(self.phase.turn as u32);
        hasher.update_u8(self.phase.step);
        for ship in &self.phase.resolved {
            hasher.update_uuid(ship.as_bytes());
        }
        hasher.finalize()
    }

    /// Take events generated since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.state.take_events()
    }

    fn dispatch(&mut self, turn: &Turn) -> std::result::Result<(), ViolationKind> {
        if !self.state.players.contains_key(&turn.player) {
            return Err(ViolationKind::UnknownPlayer(turn.player));
        }
        let owner = self
            .state
            .ship(&turn.ship)
            .map(|s| s.owner)
            .ok_or(ViolationKind::UnknownShip(turn.ship))?;
        if owner != turn.player {
            return Err(ViolationKind::NotOwner { player: turn.player, ship: turn.ship });
        }

        let phase = self.phase.phase;
        let unexpected = || ViolationKind::UnexpectedAction { phase, found: turn.action };
        let out_of_turn = |expected: PlayerId| {
            if turn.player == expected {
                Ok(())
            } else {
                Err(ViolationKind::OutOfTurn { expected: Some(expected), found: turn.player })
            }
        };

        match self.expected() {
            Expectation::Idle => Err(ViolationKind::NothingToResolve),

            Expectation::Deploy { player, ships } => {
                if turn.action != TurnAction::Deploy {
                    return Err(unexpected());
                }
                out_of_turn(player)?;
                if !ships.contains(&turn.ship) {
                    return Err(ViolationKind::IneligibleShip(turn.ship));
                }
                apply_deployment(&mut self.state, turn)?;
                self.phase.acting = self.next_deployer(&player);
                Ok(())
            }

            Expectation::Respond { player, challenge } => {
                if turn.action != TurnAction::ActionResponse {
                    return Err(ViolationKind::AwaitingResponse(challenge.target));
                }
                out_of_turn(player)?;
                apply_response(&mut self.state, &challenge, turn)?;
                self.phase.challenge = None;
                Ok(())
            }

            Expectation::Continue { player, ship } => {
                if !matches!(turn.action, TurnAction::ActionChallenge | TurnAction::ActionEnd) {
                    return Err(unexpected());
                }
                out_of_turn(player)?;
                if turn.ship != ship {
                    return Err(ViolationKind::IneligibleShip(turn.ship));
                }
                if turn.action == TurnAction::ActionChallenge {
                    self.phase.challenge = Some(apply_challenge(&mut self.state, turn)?);
                } else {
                    apply_action_end(&mut self.state, ship);
                    self.resolve_ship(ship);
                }
                Ok(())
            }

            Expectation::Activate { phase, player, ships, .. } => {
                let accepted = matches!(
                    (phase, turn.action),
                    (Phase::Command, TurnAction::CommandPhase)
                        | (Phase::Movement, TurnAction::MovementPhase)
                        | (Phase::Action, TurnAction::ActionChallenge)
                        | (Phase::Action, TurnAction::ActionEnd)
                );
                if !accepted {
                    return Err(unexpected());
                }
                out_of_turn(player)?;
                if !ships.contains(&turn.ship) {
                    return Err(ViolationKind::IneligibleShip(turn.ship));
                }

                match turn.action {
                    TurnAction::CommandPhase => {
                        apply_command(&mut self.state, turn)?;
                        self.resolve_ship(turn.ship);
                    }
                    TurnAction::MovementPhase => {
                        apply_movement(&mut self.state, turn)?;
                        self.resolve_ship(turn.ship);
                    }
                    TurnAction::ActionChallenge => {
                        let challenge = apply_challenge(&mut self.state, turn)?;
                        self.phase.active_ship = Some(turn.ship);
                        self.phase.challenge = Some(challenge);
                    }
                    _ => {
                        apply_action_end(&mut self.state, turn.ship);
                        self.resolve_ship(turn.ship);
                    }
                }
                Ok(())
            }
        }
    }

    /// Mark a ship done for this phase and pass play on.
    fn resolve_ship(&mut self, ship: ShipId) {
        self.phase.resolved.insert(ship);
        self.phase.active_ship = None;

        let eligible = eligible_players(&self.state, &self.phase.resolved, self.phase.step);
        self.phase.acting = self
            .phase
            .acting
            .and_then(|current| next_in_rotation(&self.state.seats, &current, &eligible));
        if self.phase.acting.is_none() {
            self.phase.step = self.phase.step.saturating_sub(1);
        }
    }

    fn next_deployer(&self, current: &PlayerId) -> Option<PlayerId> {
        let waiting: Vec<(PlayerId, usize)> = self
            .state
            .seats
            .iter()
            .map(|p| (*p, undeployed_ships(&self.state, p).len()))
            .filter(|(_, n)| *n > 0)
            .collect();
        next_in_rotation(&self.state.seats, current, &waiting)
    }

    fn first_deployer(&self) -> Option<PlayerId> {
        self.state
            .seats
            .iter()
            .find(|p| !undeployed_ships(&self.state, p).is_empty())
            .copied()
    }

    /// Run automatic transitions until an entry is needed.
    fn settle(&mut self) {
        loop {
            if self.phase.phase != Phase::Deployment && self.check_decided() {
                return;
            }

            match self.phase.phase {
                Phase::Deployment => {
                    if self.phase.acting.is_some() {
                        return;
                    }
                    match self.first_deployer() {
                        Some(player) => {
                            self.phase.acting = Some(player);
                            return;
                        }
                        None => self.transition(Phase::Initiative),
                    }
                }
                Phase::Initiative => {
                    self.phase.round += 1;
                    self.state.round = self.phase.round;
                    info!("Round {} begins", self.phase.round);
                    let round = self.phase.round;
                    self.state.push_event(GameEvent::new(round, GameEventData::RoundStarted { round }));
                    roll_initiative(&mut self.state);
                    self.transition(Phase::Command);
                }
                Phase::Command | Phase::Movement | Phase::Action => {
                    if self.phase.acting.is_some() || self.phase.challenge.is_some() {
                        return;
                    }
                    if self.open_step() {
                        return;
                    }
                    let next = self.phase.phase.next();
                    self.transition(next);
                }
                Phase::Cleanup => {
                    for ship in self.state.ships.values_mut() {
                        for status in &mut ship.systems {
                            status.used = false;
                        }
                    }
                    self.transition(Phase::Initiative);
                }
            }
        }
    }

    /// Find the next step with eligible ships and pick its starter.
    fn open_step(&mut self) -> bool {
        while self.phase.step >= STEP_LOWEST && self.phase.step < STEP_EXHAUSTED {
            let step = self.phase.step;
            let eligible = eligible_players(&self.state, &self.phase.resolved, step);
            if let Some(starter) = select_starter(&eligible, &self.fairness, &mut self.state.rng) {
                if eligible.len() > 1 {
                    self.fairness.record(starter);
                }
                debug!("Step {} of {} opens with player {}", step, self.phase.phase, starter.short());
                self.phase.acting = Some(starter);
                let round = self.phase.round;
                self.state.push_event(GameEvent::new(round, GameEventData::StepStarted { step, starter }));
                return true;
            }
            self.phase.step -= 1;
        }
        self.phase.step = STEP_EXHAUSTED;
        false
    }

    fn check_decided(&mut self) -> bool {
        if self.winner.is_some() {
            return true;
        }
        if let Some(winner) = self.state.sole_survivor() {
            info!("Match decided in round {}: player {} wins", self.phase.round, winner.short());
            self.winner = Some(winner);
            self.phase.acting = None;
            self.phase.challenge = None;
            let round = self.phase.round;
            self.state.push_event(GameEvent::new(round, GameEventData::MatchDecided { winner }));
            return true;
        }
        if self.state.active_ship_count() == 0 {
            self.phase.acting = None;
            return true;
        }
        false
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase.phase;
        self.phase.enter(to);
        info!("Phase {} -> {} (round {})", from, to, self.phase.round);
        let round = self.phase.round;
        self.state.push_event(GameEvent::phase_changed(round, from, to));
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::config::MatchConfig;
    use crate::game::phase::STEP_HIGHEST;
    use crate::game::systems::{ShipCatalog, Training, CORVETTE};
    use uuid::Uuid;

    const A: PlayerId = PlayerId(Uuid::from_u128(0xA));
    const B: PlayerId = PlayerId(Uuid::from_u128(0xB));
    const A1: ShipId = ShipId(Uuid::from_u128(0xA1));
    const A2: ShipId = ShipId(Uuid::from_u128(0xA2));
    const B1: ShipId = ShipId(Uuid::from_u128(0xB1));

    fn new_sim(seed: &str) -> Simulation {
        let mut state = MatchState::new(seed, MatchConfig::default(), ShipCatalog::standard());
        state.asteroid_fields.clear();
        state.add_player(A, "A").unwrap();
        state.add_player(B, "B").unwrap();
        state.add_ship(A, A1, CORVETTE, Training::Regular).unwrap();
        state.add_ship(A, A2, CORVETTE, Training::Regular).unwrap();
        state.add_ship(B, B1, CORVETTE, Training::Regular).unwrap();
        Simulation::new(state)
    }

    fn deployed_sim(seed: &str) -> Simulation {
        let mut sim = new_sim(seed);
        let entries = [
            Turn::deploy(A, A1, Vec2::new(-50.0, 0.0), 0.0),
            Turn::deploy(B, B1, Vec2::new(50.0, 0.0), 180.0),
            Turn::deploy(A, A2, Vec2::new(-50.0, 10.0), 0.0),
        ];
        for (i, turn) in entries.iter().enumerate() {
            sim.apply_turn(i, turn).unwrap();
        }
        sim
    }

    #[test]
    fn test_deployment_rotates_by_seat() {
        let mut sim = new_sim("deploy");
        assert_eq!(sim.expected(), Expectation::Deploy { player: A, ships: vec![A1, A2] });

        sim.apply_turn(0, &Turn::deploy(A, A1, Vec2::new(-50.0, 0.0), 0.0)).unwrap();
        assert_eq!(sim.expected(), Expectation::Deploy { player: B, ships: vec![B1] });

        sim.apply_turn(1, &Turn::deploy(B, B1, Vec2::new(50.0, 0.0), 0.0)).unwrap();
        // B has nothing left; A deploys again
        assert_eq!(sim.expected(), Expectation::Deploy { player: A, ships: vec![A2] });
    }

    #[test]
    fn test_deployment_completion_enters_command() {
        let sim = deployed_sim("deploy-done");
        assert_eq!(sim.round(), 1);
        assert_eq!(sim.current_phase(), Phase::Command);
        for ship in sim.state.ships.values() {
            assert!((2..=12).contains(&ship.initiative));
        }
        match sim.expected() {
            Expectation::Activate { phase, step, ships, .. } => {
                assert_eq!(phase, Phase::Command);
                assert!(step <= STEP_HIGHEST);
                assert!(!ships.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_action_is_violation() {
        let mut sim = new_sim("violation");
        let err = sim.apply_turn(0, &Turn::action_end(A, A1)).unwrap_err();
        assert_eq!(
            err,
            GameError::ProtocolViolation {
                index: 0,
                kind: ViolationKind::UnexpectedAction { phase: Phase::Deployment, found: TurnAction::ActionEnd },
            }
        );
    }

    #[test]
    fn test_out_of_turn_and_ownership() {
        let mut sim = new_sim("turn-order");
        let err = sim.apply_turn(0, &Turn::deploy(B, B1, Vec2::ZERO, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            GameError::ProtocolViolation { kind: ViolationKind::OutOfTurn { expected: Some(A), found: B }, .. }
        ));

        let err = sim.apply_turn(0, &Turn::deploy(A, B1, Vec2::ZERO, 0.0)).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { kind: ViolationKind::NotOwner { .. }, .. }));

        let stranger = ShipId(Uuid::from_u128(0xFF));
        let err = sim.apply_turn(0, &Turn::deploy(A, stranger, Vec2::ZERO, 0.0)).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { kind: ViolationKind::UnknownShip(_), .. }));
    }

    /// Build the entry the expected player would submit, doing nothing clever.
    fn passive_entry(sim: &Simulation) -> Option<Turn> {
        match sim.expected() {
            Expectation::Activate { phase, player, ships, .. } => {
                let ship = *ships.first()?;
                Some(match phase {
                    Phase::Command => Turn::command(player, ship, None, Default::default()),
                    Phase::Movement => {
                        let s = sim.state.ship(&ship)?;
                        let to = s.coast_point();
                        let speed = (to - s.position).length().round() as i32;
                        Turn::movement(player, ship, to, s.rotation, speed)
                    }
                    _ => Turn::action_end(player, ship),
                })
            }
            Expectation::Continue { player, ship } => Some(Turn::action_end(player, ship)),
            Expectation::Respond { player, challenge } => {
                Some(Turn::response(player, challenge.target, challenge.attacker, &[]))
            }
            _ => None,
        }
    }

    #[test]
    fn test_full_round_cycles_to_next_round() {
        let mut sim = deployed_sim("cycle");
        let mut index = 3;
        while sim.round() == 1 {
            let turn = passive_entry(&sim).unwrap();
            sim.apply_turn(index, &turn).unwrap();
            index += 1;
        }
        // Three ships, three gated phases
        assert_eq!(index, 3 + 9);
        assert_eq!(sim.round(), 2);
        assert_eq!(sim.current_phase(), Phase::Command);
    }

    #[test]
    fn test_steps_descend_and_every_ship_acts_once() {
        let mut sim = deployed_sim("descend");
        let mut index = 3;
        let mut last_step = u8::MAX;
        let mut seen = Vec::new();
        while sim.current_phase() == Phase::Command {
            let Expectation::Activate { step, ships, .. } = sim.expected() else {
                panic!("command phase waits on activations");
            };
            assert!(step <= last_step);
            last_step = step;
            let ship = sim.state.ship(&ships[0]).unwrap();
            assert_eq!(ship.initiative, step);
            seen.push(ships[0]);
            sim.apply_turn(index, &passive_entry(&sim).unwrap()).unwrap();
            index += 1;
        }
        seen.sort();
        assert_eq!(seen, vec![A1, A2, B1]);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let run = || {
            let mut sim = deployed_sim("replay");
            let mut log = Vec::new();
            for index in 3..40 {
                let turn = passive_entry(&sim).unwrap();
                sim.apply_turn(index, &turn).unwrap();
                log.push(turn);
            }
            (sim.state_hash(), log)
        };
        let (hash1, log1) = run();
        let (hash2, log2) = run();
        assert_eq!(hash1, hash2);
        assert_eq!(log1, log2);
    }

    #[test]
    fn test_challenge_blocks_until_response() {
        let mut sim = deployed_sim("challenge");
        let mut index = 3;
        while sim.current_phase() != Phase::Action {
            sim.apply_turn(index, &passive_entry(&sim).unwrap()).unwrap();
            index += 1;
        }
        // Re-place after movement so Light Guns are at short range
        sim.state.ship_mut(&A1).unwrap().position = Vec2::new(0.0, 0.0);
        sim.state.ship_mut(&A2).unwrap().position = Vec2::new(0.0, 3.0);
        sim.state.ship_mut(&B1).unwrap().position = Vec2::new(5.0, 0.0);

        let (player, ship) = match sim.expected() {
            Expectation::Activate { player, ships, .. } => (player, ships[0]),
            other => panic!("unexpected {other:?}"),
        };
        let target = if player == A { B1 } else { A1 };
        sim.apply_turn(index, &Turn::challenge(player, ship, target, "Light Guns", 1, 2, 1)).unwrap();
        index += 1;

        let responder = if player == A { B } else { A };
        assert!(matches!(sim.expected(), Expectation::Respond { player, .. } if player == responder));

        let err = sim.apply_turn(index, &Turn::action_end(player, ship)).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { kind: ViolationKind::AwaitingResponse(_), .. }));

        sim.apply_turn(index, &Turn::response(responder, target, ship, &[])).unwrap();
        if sim.winner.is_none() {
            assert_eq!(sim.expected(), Expectation::Continue { player, ship });
        }
    }

    #[test]
    fn test_thrust_capacity_set_in_command() {
        let mut sim = deployed_sim("thrust");
        let mut index = 3;
        while sim.current_phase() == Phase::Command {
            sim.apply_turn(index, &passive_entry(&sim).unwrap()).unwrap();
            index += 1;
        }
        for ship in sim.state.ships.values() {
            assert_eq!(ship.thrust_capacity, 4);
            assert_eq!(ship.thrust_remaining, 4);
        }
    }

    #[test]
    fn test_no_ships_is_idle() {
        let mut state = MatchState::new("empty", MatchConfig::default(), ShipCatalog::standard());
        state.add_player(A, "A").unwrap();
        state.add_player(B, "B").unwrap();
        let mut sim = Simulation::new(state);
        assert_eq!(sim.expected(), Expectation::Idle);
        let err = sim.apply_turn(0, &Turn::action_end(A, A1)).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { kind: ViolationKind::UnknownShip(_), .. }));
    }

    #[test]
    fn test_sole_survivor_decides_match() {
        let mut sim = new_sim("decided");
        sim.state.apply_damage(B1, 10, Some(A1));
        sim.apply_turn(0, &Turn::deploy(A, A1, Vec2::new(-50.0, 0.0), 0.0)).unwrap();
        // B has nothing left to place
        assert_eq!(sim.expected(), Expectation::Deploy { player: A, ships: vec![A2] });
        sim.apply_turn(1, &Turn::deploy(A, A2, Vec2::new(-50.0, 10.0), 0.0)).unwrap();

        assert_eq!(sim.winner, Some(A));
        assert_eq!(sim.expected(), Expectation::Idle);
        assert!(sim
            .take_events()
            .iter()
            .any(|e| e.data == GameEventData::MatchDecided { winner: A }));
    }
}

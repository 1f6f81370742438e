//! Replication Cursor
//!
//! Tracks how much of the authoritative log has been applied and keeps a
//! running digest of the applied prefix. The cursor only moves forward; a
//! batch is applied completely or not at all.

use tracing::debug;

use crate::core::hash::{chain_digest, StateHash};
use crate::game::error::{GameError, Result, ViolationKind};
use crate::game::tick::Simulation;
use crate::game::turn::Turn;

/// Read position in the turn log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicationCursor {
    next: usize,
    digest: StateHash,
}

impl ReplicationCursor {
    /// Cursor at the start of the log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next entry to apply.
    #[inline]
    pub fn position(&self) -> usize {
        self.next
    }

    /// Digest of every entry applied so far.
    #[inline]
    pub fn digest(&self) -> StateHash {
        self.digest
    }

    /// Entries not yet applied.
    pub fn pending<'a>(&self, log: &'a [Turn]) -> Result<&'a [Turn]> {
        log.get(self.next..).ok_or(GameError::ProtocolViolation {
            index: log.len(),
            kind: ViolationKind::LogRewound { applied: self.next, fetched: log.len() },
        })
    }

    /// Apply every pending entry of `log` to `sim`.
    ///
    /// On failure both the simulation and the cursor are restored to their
    /// state before the batch. Returns the number of entries applied.
    pub fn apply_batch(&mut self, sim: &mut Simulation, log: &[Turn]) -> Result<usize> {
        let pending = self.pending(log)?;
        if pending.is_empty() {
            return Ok(0);
        }

        let snapshot = sim.clone();
        let start = self.next;
        let mut digest = self.digest;
        for (offset, turn) in pending.iter().enumerate() {
            if let Err(err) = sim.apply_turn(start + offset, turn) {
                *sim = snapshot;
                return Err(err);
            }
            digest = chain_digest(&digest, &turn.to_json());
        }

        self.next = log.len();
        self.digest = digest;
        debug!("Cursor advanced {} -> {} (digest {})", start, self.next, hex::encode(&digest[..4]));
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::config::MatchConfig;
    use crate::game::state::{MatchState, PlayerId, ShipId};
    use crate::game::systems::{ShipCatalog, Training, CORVETTE};
    use proptest::prelude::*;
    use uuid::Uuid;

    const A: PlayerId = PlayerId(Uuid::from_u128(0xA));
    const B: PlayerId = PlayerId(Uuid::from_u128(0xB));

    fn sim() -> Simulation {
        let mut state = MatchState::new("cursor", MatchConfig::default(), ShipCatalog::standard());
        state.add_player(A, "A").unwrap();
        state.add_player(B, "B").unwrap();
        for n in 0..3u128 {
            state.add_ship(A, ShipId(Uuid::from_u128(0xA0 + n)), CORVETTE, Training::Regular).unwrap();
            state.add_ship(B, ShipId(Uuid::from_u128(0xB0 + n)), CORVETTE, Training::Regular).unwrap();
        }
        Simulation::new(state)
    }

    /// Six deployments alternating A, B.
    fn deployment_log() -> Vec<Turn> {
        (0..3u128)
            .flat_map(|n| {
                let y = n as f64 * 8.0;
                [
                    Turn::deploy(A, ShipId(Uuid::from_u128(0xA0 + n)), Vec2::new(-40.0, y), 0.0),
                    Turn::deploy(B, ShipId(Uuid::from_u128(0xB0 + n)), Vec2::new(40.0, y), 180.0),
                ]
            })
            .collect()
    }

    #[test]
    fn test_batch_advances_cursor() {
        let mut sim = sim();
        let mut cursor = ReplicationCursor::new();
        let log = deployment_log();

        assert_eq!(cursor.apply_batch(&mut sim, &log[..2]).unwrap(), 2);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.apply_batch(&mut sim, &log[..2]).unwrap(), 0);
        assert_eq!(cursor.apply_batch(&mut sim, &log).unwrap(), 4);
        assert_eq!(cursor.position(), 6);
        assert_eq!(sim.round(), 1);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut sim = sim();
        let mut cursor = ReplicationCursor::new();
        let mut log = deployment_log();
        cursor.apply_batch(&mut sim, &log[..2]).unwrap();
        let hash = sim.state_hash();
        let before = cursor.clone();

        // Third entry is B deploying out of turn
        log.swap(2, 3);
        let err = cursor.apply_batch(&mut sim, &log).unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { index: 2, .. }));
        assert_eq!(cursor, before);
        assert_eq!(sim.state_hash(), hash);
    }

    #[test]
    fn test_shrinking_log_is_violation() {
        let mut sim = sim();
        let mut cursor = ReplicationCursor::new();
        let log = deployment_log();
        cursor.apply_batch(&mut sim, &log[..4]).unwrap();
        assert!(matches!(
            cursor.apply_batch(&mut sim, &log[..3]),
            Err(GameError::ProtocolViolation { kind: ViolationKind::LogRewound { applied: 4, fetched: 3 }, .. })
        ));
    }

    #[test]
    fn test_digest_matches_between_clients() {
        let log = deployment_log();
        let mut first = (sim(), ReplicationCursor::new());
        let mut second = (sim(), ReplicationCursor::new());

        first.1.apply_batch(&mut first.0, &log).unwrap();
        for end in 1..=log.len() {
            second.1.apply_batch(&mut second.0, &log[..end]).unwrap();
        }
        assert_eq!(first.1.digest(), second.1.digest());
        assert_eq!(first.0.state_hash(), second.0.state_hash());
    }

    proptest! {
        #[test]
        fn prop_cursor_monotonic(cuts in proptest::collection::vec(0usize..=6, 1..12)) {
            let log = deployment_log();
            let mut sim = sim();
            let mut cursor = ReplicationCursor::new();
            let mut applied = 0usize;

            for cut in cuts {
                let before = cursor.position();
                match cursor.apply_batch(&mut sim, &log[..cut]) {
                    Ok(count) => {
                        prop_assert_eq!(cursor.position(), before + count);
                        applied += count;
                    }
                    Err(_) => prop_assert_eq!(cursor.position(), before),
                }
                prop_assert!(cursor.position() >= before);
            }

            // Every entry applied at most once
            prop_assert_eq!(applied, cursor.position());
            prop_assert!(applied <= log.len());
        }
    }
}

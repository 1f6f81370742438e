//! Client Driver
//!
//! Async polling loop around `MatchContext::advance`. Runs at a fixed
//! interval until the match is finished, the tick limit is reached or a
//! shutdown signal arrives. Transport hiccups and local rejections are
//! logged and retried on the next tick; protocol violations end the loop.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::game::context::{AdvanceOutcome, LocalCommander, MatchContext};
use crate::game::error::Result;
use crate::game::state::PlayerId;
use crate::network::transport::Transport;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Time between polls
    pub tick_interval: Duration,
    /// Stop after this many polls (None = run until finished)
    pub max_ticks: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            max_ticks: None,
        }
    }
}

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No further entries can be applied
    Finished,
    /// `max_ticks` polls were made
    TickLimit,
    /// Shutdown signal received
    Shutdown,
}

/// What a driver run did.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSummary {
    /// Polls made
    pub ticks: u64,
    /// Entries submitted for the local player
    pub submitted: u64,
    /// Polls that failed without halting
    pub failures: u64,
    /// Winner, if the match was decided
    pub winner: Option<PlayerId>,
    /// Why the loop ended
    pub reason: StopReason,
}

/// Poll `ctx` until it finishes, hits the tick limit or is told to stop.
pub async fn drive<T, C>(
    ctx: &mut MatchContext,
    transport: &T,
    commander: &mut C,
    config: &DriverConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<DriveSummary>
where
    T: Transport + ?Sized,
    C: LocalCommander + ?Sized,
{
    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut summary = DriveSummary {
        ticks: 0,
        submitted: 0,
        failures: 0,
        winner: None,
        reason: StopReason::TickLimit,
    };

    loop {
        if config.max_ticks.is_some_and(|max| summary.ticks >= max) {
            summary.reason = StopReason::TickLimit;
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                info!("Shutdown signal received");
                summary.reason = StopReason::Shutdown;
                break;
            }
            _ = ticker.tick() => {}
        }
        summary.ticks += 1;

        match ctx.advance(transport, commander) {
            Ok(AdvanceOutcome::Finished { winner }) => {
                summary.winner = winner;
                summary.reason = StopReason::Finished;
                break;
            }
            Ok(AdvanceOutcome::Submitted { log_len, .. }) => {
                summary.submitted += 1;
                if let Some(player) = ctx.local_player() {
                    info!("Player {} submitted log entry {}", player.short(), log_len.saturating_sub(1));
                }
            }
            Ok(_) => {}
            Err(err) if err.is_fatal() => {
                error!("Replay halted: {}", err);
                return Err(err);
            }
            Err(err) => {
                warn!("Tick {} failed: {}", summary.ticks, err);
                summary.failures += 1;
            }
        }
    }

    info!(
        "Driver stopped after {} ticks ({:?}, {} submitted)",
        summary.ticks, summary.reason, summary.submitted
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::autopilot::Autopilot;
    use crate::game::config::MatchConfig;
    use crate::game::error::GameError;
    use crate::game::state::ShipId;
    use crate::game::systems::{ShipCatalog, Training, CORVETTE};
    use crate::game::turn::Turn;
    use crate::network::protocol::{FleetRoster, GameState, RosterShip};
    use crate::network::transport::InMemoryTransport;
    use uuid::Uuid;

    const A: PlayerId = PlayerId(Uuid::from_u128(0xA));
    const B: PlayerId = PlayerId(Uuid::from_u128(0xB));

    fn transport() -> InMemoryTransport {
        let transport = InMemoryTransport::new(GameState::new("drive", "Skirmish", "driver", 2));
        for (player, ship) in [(A, 0xA1), (B, 0xB1)] {
            let roster = FleetRoster {
                faction: "Fleet".into(),
                ships: vec![RosterShip {
                    ship_uuid: ShipId(Uuid::from_u128(ship)),
                    template_uuid: CORVETTE,
                    training: Training::Regular,
                }],
            };
            transport.join(player, roster).unwrap();
        }
        transport
    }

    fn fast(max_ticks: u64) -> DriverConfig {
        DriverConfig { tick_interval: Duration::from_millis(1), max_ticks: Some(max_ticks) }
    }

    #[tokio::test]
    async fn test_two_drivers_stay_in_step() {
        let transport = transport();
        let (_tx, rx) = broadcast::channel::<()>(1);
        let rx_b = rx.resubscribe();

        let mut a = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let mut b = MatchContext::new(B, MatchConfig::default(), ShipCatalog::standard());
        let mut pilot_a = Autopilot::new(A);
        let mut pilot_b = Autopilot::new(B);
        let config = fast(80);

        let (sa, sb) = tokio::join!(
            drive(&mut a, &transport, &mut pilot_a, &config, rx),
            drive(&mut b, &transport, &mut pilot_b, &config, rx_b),
        );
        let (sa, sb) = (sa.unwrap(), sb.unwrap());
        assert!(sa.submitted > 0 && sb.submitted > 0);

        let latest = transport.fetch_state().unwrap();
        a.sync(&latest).unwrap();
        b.sync(&latest).unwrap();
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_polling() {
        let transport = transport();
        let (tx, rx) = broadcast::channel::<()>(1);
        tx.send(()).unwrap();

        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let summary = drive(&mut ctx, &transport, &mut Autopilot::new(A), &DriverConfig::default(), rx)
            .await
            .unwrap();
        assert_eq!(summary.reason, StopReason::Shutdown);
        assert_eq!(summary.ticks, 0);
        assert_eq!(transport.log_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried() {
        let transport = transport();
        transport.fail_fetches(3).unwrap();
        let (_tx, rx) = broadcast::channel::<()>(1);

        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let summary = drive(&mut ctx, &transport, &mut Autopilot::new(A), &fast(5), rx).await.unwrap();
        assert_eq!(summary.failures, 3);
        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.reason, StopReason::TickLimit);
    }

    /// Accepts submissions without appending them.
    struct DroppingTransport(InMemoryTransport);

    impl Transport for DroppingTransport {
        fn fetch_state(&self) -> std::result::Result<GameState, crate::network::transport::TransportError> {
            self.0.fetch_state()
        }

        fn submit_turn(&self, _turn: Turn) -> std::result::Result<GameState, crate::network::transport::TransportError> {
            self.0.fetch_state()
        }
    }

    #[tokio::test]
    async fn test_empty_log_after_submit_keeps_driving() {
        let transport = DroppingTransport(transport());
        let mut submitted = 0;
        for player in [A, B] {
            let (_tx, rx) = broadcast::channel::<()>(1);
            let mut ctx = MatchContext::new(player, MatchConfig::default(), ShipCatalog::standard());
            let summary = drive(&mut ctx, &transport, &mut Autopilot::new(player), &fast(3), rx).await.unwrap();
            assert_eq!(summary.reason, StopReason::TickLimit);
            submitted += summary.submitted;
        }
        assert_eq!(submitted, 3);
        assert_eq!(transport.0.log_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_protocol_violation_ends_drive() {
        let transport = transport();
        transport.append_raw(Turn::deploy(B, ShipId(Uuid::from_u128(0xB1)), Vec2::ZERO, 0.0)).unwrap();
        let (_tx, rx) = broadcast::channel::<()>(1);

        let mut ctx = MatchContext::new(A, MatchConfig::default(), ShipCatalog::standard());
        let err = drive(&mut ctx, &transport, &mut Autopilot::new(A), &fast(5), rx).await.unwrap_err();
        assert!(matches!(err, GameError::ProtocolViolation { index: 0, .. }));
    }
}

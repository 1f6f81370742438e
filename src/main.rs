//! Armada Replay
//!
//! Plays a skirmish between two autopilot clients over an in-memory log,
//! then replays the finished log as a late observer and checks that every
//! client reached the same state.
//!
//! Usage: `armada-replay [config.json]`

use anyhow::{bail, Context};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use armada::{
    game::{
        autopilot::Autopilot,
        config::MatchConfig,
        context::MatchContext,
        events::GameEventData,
        state::{PlayerId, ShipId},
        systems::{ShipCatalog, Training, CORVETTE, CRUISER, FRIGATE},
    },
    network::{
        driver::{drive, DriverConfig},
        protocol::{FleetRoster, GameState, RosterShip},
        transport::{InMemoryTransport, Transport},
    },
    VERSION,
};

/// Polls per client before the demo gives up on a decision.
const MAX_TICKS: u64 = 5_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Armada replay v{}", VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            MatchConfig::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => MatchConfig::default(),
    };
    let catalog = ShipCatalog::standard();

    let game_id = Uuid::new_v4().to_string();
    let seed = "armada-demo";
    info!("Game {} (seed {:?})", game_id, seed);

    let transport = InMemoryTransport::new(GameState::new(&game_id, "Skirmish", seed, 2));
    let players = [PlayerId(Uuid::from_u128(0xA)), PlayerId(Uuid::from_u128(0xB))];
    for (seat, player) in players.iter().enumerate() {
        let roster = demo_roster(seat as u128);
        let cost = roster.cost(&catalog).unwrap_or_default();
        info!("Player {} joins with {} ships ({} points)", player.short(), roster.ships.len(), cost);
        transport.join(*player, roster)?;
    }

    // Both clients poll the same log until the match is over
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let driver_config = DriverConfig { tick_interval: Duration::from_millis(2), max_ticks: Some(MAX_TICKS) };
    let mut handles = Vec::new();
    for player in players {
        let transport = transport.clone();
        let config = config.clone();
        let catalog = catalog.clone();
        let driver_config = driver_config.clone();
        let shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ctx = MatchContext::new(player, config, catalog);
            let mut pilot = Autopilot::new(player);
            let summary = drive(&mut ctx, &transport, &mut pilot, &driver_config, shutdown).await;
            (ctx, summary)
        }));
    }

    let mut clients = Vec::new();
    for handle in handles {
        let (ctx, summary) = handle.await.context("client task panicked")?;
        let summary = summary?;
        info!(
            "Client finished: {:?} after {} ticks, {} entries submitted",
            summary.reason, summary.ticks, summary.submitted
        );
        clients.push(ctx);
    }

    // Late observer replays the whole log in one batch
    info!("=== Verifying Determinism ===");
    let latest = transport.fetch_state()?;
    info!("Log holds {} entries", latest.turns.len());

    let mut observer = MatchContext::observer(config, catalog);
    observer.sync(&latest)?;
    report_events(&mut observer);

    let Some(expected) = observer.state_hash() else {
        bail!("rosters never completed");
    };
    info!("Observer state hash: {}", hex::encode(expected));
    info!("Observer log digest: {}", hex::encode(observer.log_digest()));

    let mut verified = true;
    for ctx in &mut clients {
        ctx.sync(&latest)?;
        let hash = ctx.state_hash().unwrap_or_default();
        let player = ctx.local_player().map(|p| p.short()).unwrap_or_default();
        if hash == expected {
            info!("Client {} hash matches", player);
        } else {
            warn!("Client {} hash differs: {}", player, hex::encode(hash));
            verified = false;
        }
    }

    if !verified {
        bail!("DETERMINISM FAILURE: hashes differ");
    }
    info!("DETERMINISM VERIFIED: all clients agree");
    Ok(())
}

fn demo_roster(seat: u128) -> FleetRoster {
    let ship = |n: u128, template, training| RosterShip {
        ship_uuid: ShipId(Uuid::from_u128(((seat + 1) << 8) | n)),
        template_uuid: template,
        training,
    };
    FleetRoster {
        faction: if seat == 0 { "Terran Union" } else { "Kel Ascendancy" }.to_string(),
        ships: vec![
            ship(1, CRUISER, Training::Regular),
            ship(2, FRIGATE, Training::Veteran),
            ship(3, CORVETTE, Training::Green),
        ],
    }
}

fn report_events(observer: &mut MatchContext) {
    let round = observer.simulation().map(|s| s.round()).unwrap_or_default();
    let events = observer.take_events();
    let mut hits = 0;
    for event in &events {
        match &event.data {
            GameEventData::ShipDestroyed { ship, .. } => {
                info!("Round {}: ship {} destroyed", event.round, ship.short());
            }
            GameEventData::MatchDecided { winner } => {
                info!("Match decided: player {} wins", winner.short());
            }
            _ if event.is_damage() => hits += 1,
            _ => {}
        }
    }
    info!("{} events over {} rounds, {} damage events", events.len(), round, hits);
}

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pulselane_core::simulation::{self, SimulationConfig};
use pulselane_core::storage::{Database, MemoryStore, SessionStore};
use pulselane_core::timeline::Metric;
use pulselane_core::{
    EndReason, EngineConfig, Reading, SessionEngine, SessionOrchestrator,
};

use crate::common;

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of simulated participants
    #[arg(long, default_value = "4")]
    pub participants: usize,

    /// Ticks to simulate
    #[arg(long, default_value = "120")]
    pub ticks: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the tick interval in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Write the resulting record JSON to this path
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Persist the session into the local SQLite store
    #[arg(long)]
    pub db: bool,

    /// Run in real time through the orchestrator instead of stepping the
    /// engine directly
    #[arg(long)]
    pub live: bool,
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut engine_config = common::load_engine_config()?;
    if let Some(tick_ms) = args.tick_ms {
        engine_config.tick_interval_ms = tick_ms;
        engine_config.autosave_interval_ms = engine_config.autosave_interval_ms.max(tick_ms);
    }

    if args.live {
        return run_live(&args, engine_config);
    }

    let sim_config = SimulationConfig {
        participants: args.participants,
        ticks: args.ticks,
        seed: args.seed,
        ..Default::default()
    };
    let outcome = simulation::run(&sim_config, engine_config)?;
    let record = &outcome.record;

    println!("session   {}", record.session.id);
    println!("ticks     {}", record.timeline.tick_count);
    println!("entities  {}", record.entities.len());
    println!("dropouts  {}", outcome.dropouts);
    println!("coins     {:.0}", record.totals.coins);
    println!("zones     {}", common::format_zone_totals(record));

    if let Some(path) = &args.out {
        std::fs::write(path, record.to_json()?)?;
        println!("record written to {}", path.display());
    }
    if args.db {
        let db = Database::open()?;
        db.save(record)?;
        println!("record saved to the local store");
    }
    Ok(())
}

/// Drive a real orchestrator at wall-clock pace: joins, readings at every
/// tick, then an explicit end with its forced persist.
fn run_live(args: &SimulateArgs, engine_config: EngineConfig) -> Result<(), Box<dyn Error>> {
    let tick_ms = engine_config.tick_interval_ms;
    let participants = args.participants;
    let ticks = args.ticks;
    let save_to_db = args.db;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let store: Arc<dyn SessionStore> = if save_to_db {
            Arc::new(Database::open()?)
        } else {
            Arc::new(MemoryStore::new())
        };
        let engine = SessionEngine::new(engine_config)?;
        let mut orchestrator = SessionOrchestrator::new(engine, store);

        for i in 0..participants {
            orchestrator.join(&format!("device-{i}"), &format!("profile-{i}"))?;
        }
        orchestrator.start();
        println!("session {} running", orchestrator.session_id());

        for tick in 0..ticks {
            for i in 0..participants {
                // A slow deterministic intensity wave per rider.
                let phase = (tick as f64 / 10.0) + i as f64;
                let value = 120.0 + 45.0 * phase.sin();
                orchestrator.ingest_reading(Reading {
                    device_id: format!("device-{i}"),
                    metric: Metric::HeartRate,
                    value,
                    timestamp: chrono::Utc::now(),
                })?;
            }
            tokio::time::sleep(std::time::Duration::from_millis(tick_ms)).await;
        }

        let record = orchestrator.end(EndReason::Requested).await?;
        println!("ticks     {}", record.timeline.tick_count);
        println!("coins     {:.0}", record.totals.coins);
        println!("zones     {}", common::format_zone_totals(&record));
        Ok(())
    })
}

use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use chrono::Utc;
use pulselane_core::storage::{Database, SessionStore};
use pulselane_core::SessionRecord;

use crate::common;

#[derive(Args)]
pub struct InspectArgs {
    /// Record JSON file to inspect
    #[arg(long, conflicts_with_all = ["session", "list"])]
    pub file: Option<PathBuf>,

    /// Session id to load from the local SQLite store
    #[arg(long)]
    pub session: Option<String>,

    /// List sessions in the local SQLite store
    #[arg(long)]
    pub list: bool,
}

pub fn run(args: InspectArgs) -> Result<(), Box<dyn Error>> {
    if args.list {
        return list_sessions();
    }

    let record = if let Some(path) = &args.file {
        common::load_record(path)?
    } else if let Some(id) = &args.session {
        let db = Database::open()?;
        db.load(id)?
            .ok_or_else(|| format!("no stored session with id {id}"))?
    } else {
        return Err("pass --file, --session or --list".into());
    };

    print_record(&record)
}

fn list_sessions() -> Result<(), Box<dyn Error>> {
    let db = Database::open()?;
    let rows = db.list_sessions()?;
    if rows.is_empty() {
        println!("no stored sessions");
        return Ok(());
    }
    for row in rows {
        let status = if row.ended_at.is_some() { "ended" } else { "active" };
        println!(
            "{}  {}  ticks={}  coins={:.0}  [{}]",
            row.id,
            row.started_at.format("%Y-%m-%d %H:%M"),
            row.tick_count,
            row.coins,
            status
        );
    }
    Ok(())
}

fn print_record(record: &SessionRecord) -> Result<(), Box<dyn Error>> {
    let config = common::load_engine_config()?;
    let gate = record.validate(
        Utc::now(),
        config.min_session_duration_ms,
        config.series_size_cap,
    );
    match &gate {
        Ok(()) => println!("validation  ok"),
        Err(err) => println!("validation  FAILED [{}] {err}", err.code()),
    }

    println!("session     {}", record.session.id);
    println!("started     {}", record.session.start_time.to_rfc3339());
    match record.session.end_time {
        Some(end) => println!("ended       {}", end.to_rfc3339()),
        None => println!("ended       (still active)"),
    }
    println!("ticks       {} x {} ms", record.timeline.tick_count, record.session.tick_interval_ms);
    println!("series      {}", record.timeline.series.len());
    println!("coins       {:.0}", record.totals.coins);
    println!("zones       {}", common::format_zone_totals(record));

    println!("entities:");
    for entity in &record.entities {
        println!(
            "  {}  profile={}  device={}  coins={:.0}  status={:?}",
            entity.entity_id, entity.profile_id, entity.device_id, entity.coins, entity.status
        );
    }

    // Dropout history, rebuilt from the record alone.
    let (_, monitor) = record.reconstruct_activity(config.max_dropout_events)?;
    let dropouts: Vec<_> = monitor.all_events().collect();
    if dropouts.is_empty() {
        println!("dropouts:   none");
    } else {
        println!("dropouts:");
        for event in dropouts {
            println!(
                "  {}  tick={}  coins={:.0}",
                event.participant_id, event.tick, event.coins_at_dropout
            );
        }
    }
    Ok(())
}

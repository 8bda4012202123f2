use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use pulselane_core::codec::SeriesValue;
use pulselane_core::layout::{
    ElementKind, LayoutConfig, LayoutElement, LayoutManager,
};
use pulselane_core::timeline::{Metric, SeriesKey};
use pulselane_core::SessionRecord;

use crate::common;

#[derive(Args)]
pub struct LayoutArgs {
    /// Record JSON file to derive the frame from
    #[arg(long)]
    pub file: PathBuf,

    /// Tick to render; defaults to the last collected tick
    #[arg(long)]
    pub tick: Option<u64>,

    /// Pretty-print the resolved frame
    #[arg(long)]
    pub pretty: bool,
}

pub fn run(args: LayoutArgs) -> Result<(), Box<dyn Error>> {
    let record = common::load_record(&args.file)?;
    let engine_config = common::load_engine_config()?;

    let last_tick = record.timeline.tick_count.saturating_sub(1);
    let tick = args.tick.unwrap_or(last_tick).min(last_tick);

    let config = LayoutConfig::default();
    let elements = frame_from_record(&record, tick, &config, engine_config.max_dropout_events)?;
    let result = LayoutManager::new(config).layout(&elements, tick);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{rendered}");
    Ok(())
}

/// Derive one chart frame from a persisted record: an avatar per entity
/// still transmitting at `tick`, a badge per reconstructed dropout event.
/// The layout engine itself never sees the timeline; this is the caller's
/// half of the contract.
fn frame_from_record(
    record: &SessionRecord,
    tick: u64,
    config: &LayoutConfig,
    max_dropout_events: usize,
) -> Result<Vec<LayoutElement>, Box<dyn Error>> {
    let (timeline, monitor) = record.reconstruct_activity(max_dropout_events)?;
    let ticks = timeline.tick_count().max(1) as f64;
    let bounds = config.bounds;
    let width = bounds.max_x - bounds.min_x;
    let height = bounds.max_y - bounds.min_y;

    let max_coins = record
        .entities
        .iter()
        .map(|e| e.coins)
        .fold(1.0_f64, f64::max);
    let x_at = |t: u64| bounds.min_x + (t as f64 + 0.5) / ticks * width;
    let y_at = |coins: f64| bounds.max_y - coins / max_coins * (height - 64.0) - 32.0;

    let coins_at = |entity_id: &str, t: u64| -> f64 {
        timeline
            .series(&SeriesKey::entity(entity_id, Metric::Coins))
            .and_then(|s| s.get(t as usize).cloned())
            .flatten()
            .and_then(|sample| match sample {
                SeriesValue::Number(v) => Some(v),
                SeriesValue::Label(_) => None,
            })
            .unwrap_or(0.0)
    };

    let mut elements = Vec::new();
    for (join_order, entity) in record.entities.iter().enumerate() {
        let transmitting = timeline
            .series(&SeriesKey::entity(&entity.entity_id, Metric::HeartRate))
            .and_then(|s| s.get(tick as usize).cloned())
            .flatten()
            .is_some();
        if !transmitting {
            continue;
        }
        elements.push(LayoutElement {
            id: format!("avatar-{}", entity.entity_id),
            kind: ElementKind::Avatar,
            x: x_at(tick),
            y: y_at(coins_at(&entity.entity_id, tick)),
            radius: 16.0,
            priority: join_order as i32,
            tick: None,
            participant_id: Some(entity.entity_id.clone()),
        });
    }

    for event in monitor.all_events() {
        if event.tick > tick {
            continue;
        }
        elements.push(LayoutElement {
            id: format!("badge-{}-{}", event.participant_id, event.tick),
            kind: ElementKind::Badge,
            x: x_at(event.tick),
            y: y_at(event.coins_at_dropout),
            radius: 12.0,
            priority: 0,
            tick: Some(event.tick),
            participant_id: Some(event.participant_id.clone()),
        });
    }
    Ok(elements)
}

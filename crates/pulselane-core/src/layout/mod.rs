//! Collision-resolving layout for the live race chart.
//!
//! A pure function from a frame of avatar/badge descriptors to final
//! positions and leader lines. No timeline access, no shared mutable
//! state, and a hard determinism contract: the same input yields the same
//! output, so a remounted renderer stays visually stable. Callers are
//! expected to memoize on a content fingerprint; nothing here caches.
//!
//! Resolution runs in phases: partition into current/historical zones,
//! cluster within each zone, pick a spread strategy per cluster size,
//! relax residual overlaps for a bounded number of iterations, clamp into
//! the chart bounds, then emit connectors and place value labels.

mod cluster;
mod connector;
mod label;
mod strategy;

pub use cluster::{ClusterDetector, ClusterZone};
pub use connector::Connector;
pub use label::LabelSide;

use serde::{Deserialize, Serialize};

/// What a layout element renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Live marker; its X always tracks the current tick.
    Avatar,
    /// Frozen-in-time dropout marker; its X is immutable.
    Badge,
}

/// One drawable marker handed to the layout engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutElement {
    pub id: String,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    /// Join order; later joiners yield in ties.
    #[serde(default)]
    pub priority: i32,
    /// Tick a badge is frozen at.
    #[serde(default)]
    pub tick: Option<u64>,
    #[serde(default)]
    pub participant_id: Option<String>,
}

/// A layout element with its resolved position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionedElement {
    #[serde(flatten)]
    pub element: LayoutElement,
    pub final_x: f64,
    pub final_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub label_side: LabelSide,
}

impl PositionedElement {
    /// Distance between original and final position.
    pub fn displacement(&self) -> f64 {
        self.offset_x.hypot(self.offset_y)
    }
}

/// Resolved frame: positioned elements plus leader lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutResult {
    pub elements: Vec<PositionedElement>,
    pub connectors: Vec<Connector>,
}

/// Visible chart area. Final positions never leave it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChartBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for ChartBounds {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1000.0,
            max_y: 600.0,
        }
    }
}

/// Layout tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub bounds: ChartBounds,

    /// Cluster when pairwise distance is below this many avatar radii.
    #[serde(default = "default_cluster_threshold_factor")]
    pub cluster_threshold_factor: f64,

    /// Minimum vertical separation produced by the spread strategies.
    #[serde(default = "default_min_gap")]
    pub min_gap: f64,

    /// Badges at most this many ticks old share the current zone with the
    /// avatars.
    #[serde(default = "default_recency_threshold_ticks")]
    pub recency_threshold_ticks: u64,

    /// Emit a leader line when displacement exceeds this many radii.
    #[serde(default = "default_connector_factor")]
    pub connector_factor: f64,

    #[serde(default = "default_label_width")]
    pub label_width: f64,
    #[serde(default = "default_label_height")]
    pub label_height: f64,
    #[serde(default = "default_label_margin")]
    pub label_margin: f64,

    /// Relaxation passes before accepting residual overlap.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_cluster_threshold_factor() -> f64 {
    3.0
}
fn default_min_gap() -> f64 {
    64.0
}
fn default_recency_threshold_ticks() -> u64 {
    3
}
fn default_connector_factor() -> f64 {
    1.5
}
fn default_label_width() -> f64 {
    48.0
}
fn default_label_height() -> f64 {
    16.0
}
fn default_label_margin() -> f64 {
    6.0
}
fn default_max_iterations() -> usize {
    8
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            bounds: ChartBounds::default(),
            cluster_threshold_factor: default_cluster_threshold_factor(),
            min_gap: default_min_gap(),
            recency_threshold_ticks: default_recency_threshold_ticks(),
            connector_factor: default_connector_factor(),
            label_width: default_label_width(),
            label_height: default_label_height(),
            label_margin: default_label_margin(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// FNV-1a over an element id: the last resort of the deterministic
/// tie-break chain.
pub(crate) fn stable_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Deterministic order for elements with identical values: participant id
/// (lexicographic), then join order, then a stable hash of the element id.
/// Never an arbitrary or allocation-dependent order.
pub(crate) fn tie_break(a: &LayoutElement, b: &LayoutElement) -> std::cmp::Ordering {
    a.participant_id
        .as_deref()
        .unwrap_or("")
        .cmp(b.participant_id.as_deref().unwrap_or(""))
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| stable_hash(&a.id).cmp(&stable_hash(&b.id)))
}

/// Vertical order: by Y, ties resolved deterministically.
pub(crate) fn vertical_order(a: &LayoutElement, b: &LayoutElement) -> std::cmp::Ordering {
    a.y.total_cmp(&b.y).then_with(|| tie_break(a, b))
}

/// The layout engine. Safe to call concurrently from multiple rendering
/// frames; it holds configuration only.
#[derive(Debug, Clone, Default)]
pub struct LayoutManager {
    config: LayoutConfig,
}

impl LayoutManager {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Resolve one frame. Never fails for structurally valid input; when
    /// relaxation cannot converge within the iteration budget the best
    /// effort so far is returned (residual overlap is acceptable
    /// degradation, out-of-bounds is not).
    pub fn layout(&self, elements: &[LayoutElement], current_tick: u64) -> LayoutResult {
        let mut positioned: Vec<PositionedElement> = elements
            .iter()
            .map(|element| PositionedElement {
                final_x: element.x,
                final_y: element.y,
                offset_x: 0.0,
                offset_y: 0.0,
                label_side: LabelSide::Right,
                element: element.clone(),
            })
            .collect();
        if positioned.is_empty() {
            return LayoutResult {
                elements: positioned,
                connectors: Vec::new(),
            };
        }

        let (current, historical) = self.partition(elements, current_tick);
        let detector = ClusterDetector::new(self.config.cluster_threshold_factor);

        for (zone, indices) in [
            (ClusterZone::Current, current),
            (ClusterZone::Historical, historical),
        ] {
            for cluster in detector.detect(elements, &indices, zone) {
                for (index, x, y) in strategy::resolve(elements, &cluster, zone, &self.config) {
                    positioned[index].final_x = x;
                    positioned[index].final_y = y;
                }
            }
        }

        self.relax(&mut positioned);
        self.clamp(&mut positioned);

        for p in &mut positioned {
            p.offset_x = p.final_x - p.element.x;
            p.offset_y = p.final_y - p.element.y;
        }

        let connectors = connector::generate(&positioned, self.config.connector_factor);
        label::place_labels(&mut positioned, &self.config);

        LayoutResult {
            elements: positioned,
            connectors,
        }
    }

    /// Avatars and recent badges form the current zone; older badges are
    /// historical and may only move vertically.
    fn partition(&self, elements: &[LayoutElement], current_tick: u64) -> (Vec<usize>, Vec<usize>) {
        let mut current = Vec::new();
        let mut historical = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let is_current = match element.kind {
                ElementKind::Avatar => true,
                ElementKind::Badge => element
                    .tick
                    .map(|tick| current_tick.saturating_sub(tick) <= self.config.recency_threshold_ticks)
                    .unwrap_or(false),
            };
            if is_current {
                current.push(index);
            } else {
                historical.push(index);
            }
        }
        (current, historical)
    }

    /// Push residually overlapping pairs apart vertically, a bounded
    /// number of passes. Vertical-only moves keep badge X frozen.
    fn relax(&self, positioned: &mut [PositionedElement]) {
        for _ in 0..self.config.max_iterations {
            let mut moved = false;
            for i in 0..positioned.len() {
                for j in (i + 1)..positioned.len() {
                    let dx = positioned[j].final_x - positioned[i].final_x;
                    let dy = positioned[j].final_y - positioned[i].final_y;
                    let needed = positioned[i].element.radius + positioned[j].element.radius;
                    let distance = dx.hypot(dy);
                    if distance >= needed {
                        continue;
                    }
                    let push = (needed - distance) / 2.0 + 0.5;
                    if positioned[i].final_y <= positioned[j].final_y {
                        positioned[i].final_y -= push;
                        positioned[j].final_y += push;
                    } else {
                        positioned[i].final_y += push;
                        positioned[j].final_y -= push;
                    }
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }
    }

    /// Clamp final positions into the chart bounds, radius inset included.
    /// Clamping takes priority over whatever the strategies produced.
    fn clamp(&self, positioned: &mut [PositionedElement]) {
        let bounds = self.config.bounds;
        for p in positioned {
            let r = p.element.radius;
            let lo_x = bounds.min_x + r;
            let hi_x = (bounds.max_x - r).max(lo_x);
            let lo_y = bounds.min_y + r;
            let hi_y = (bounds.max_y - r).max(lo_y);
            p.final_x = p.final_x.clamp(lo_x, hi_x);
            p.final_y = p.final_y.clamp(lo_y, hi_y);
        }
    }
}

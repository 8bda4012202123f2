//! Race-chart layout scenarios: a mixed frame of live avatars and frozen
//! dropout badges, resolved end to end.

use pulselane_core::layout::{
    ChartBounds, ElementKind, LayoutConfig, LayoutElement, LayoutManager,
};

fn avatar(id: &str, y: f64, priority: i32) -> LayoutElement {
    LayoutElement {
        id: format!("avatar-{id}"),
        kind: ElementKind::Avatar,
        x: 900.0,
        y,
        radius: 16.0,
        priority,
        tick: None,
        participant_id: Some(id.to_string()),
    }
}

fn badge(id: &str, x: f64, y: f64, tick: u64) -> LayoutElement {
    LayoutElement {
        id: format!("badge-{id}"),
        kind: ElementKind::Badge,
        x,
        y,
        radius: 12.0,
        priority: 0,
        tick: Some(tick),
        participant_id: Some(id.to_string()),
    }
}

fn mixed_frame() -> Vec<LayoutElement> {
    vec![
        // Seven live riders bunched at the right edge of the lane.
        avatar("amy", 300.0, 0),
        avatar("ben", 303.0, 1),
        avatar("cat", 306.0, 2),
        avatar("dev", 309.0, 3),
        avatar("eli", 312.0, 4),
        avatar("fay", 315.0, 5),
        avatar("gus", 318.0, 6),
        // Historical dropout badges scattered across the chart.
        badge("old-1", 200.0, 250.0, 10),
        badge("old-2", 203.0, 252.0, 12),
        // A fresh badge still in the current zone.
        badge("recent", 890.0, 310.0, 99),
    ]
}

#[test]
fn identical_frames_resolve_identically() {
    let manager = LayoutManager::default();
    let frame = mixed_frame();

    let first = manager.layout(&frame, 100);
    let second = manager.layout(&frame, 100);

    assert_eq!(first.elements.len(), second.elements.len());
    for (a, b) in first.elements.iter().zip(&second.elements) {
        assert_eq!(a.element.id, b.element.id);
        assert_eq!(a.final_x, b.final_x);
        assert_eq!(a.final_y, b.final_y);
        assert_eq!(a.label_side, b.label_side);
    }
    assert_eq!(first.connectors, second.connectors);
}

#[test]
fn every_position_respects_the_chart_bounds() {
    let manager = LayoutManager::default();
    let result = manager.layout(&mixed_frame(), 100);
    let ChartBounds {
        min_x,
        min_y,
        max_x,
        max_y,
    } = manager.config().bounds;

    for p in &result.elements {
        let r = p.element.radius;
        assert!(
            p.final_x >= min_x + r && p.final_x <= max_x - r,
            "{} escaped horizontally: {}",
            p.element.id,
            p.final_x
        );
        assert!(
            p.final_y >= min_y + r && p.final_y <= max_y - r,
            "{} escaped vertically: {}",
            p.element.id,
            p.final_y
        );
    }
}

#[test]
fn historical_badge_x_is_frozen_through_resolution() {
    let manager = LayoutManager::default();
    let frame = mixed_frame();
    let result = manager.layout(&frame, 100);

    for p in result
        .elements
        .iter()
        .filter(|p| p.element.id.starts_with("badge-old"))
    {
        assert_eq!(p.final_x, p.element.x);
    }
}

#[test]
fn crowded_cluster_separates_and_reports_offsets() {
    let manager = LayoutManager::default();
    let result = manager.layout(&mixed_frame(), 100);

    // The seven-rider pack resolves to distinct positions.
    let avatars: Vec<_> = result
        .elements
        .iter()
        .filter(|p| p.element.kind == ElementKind::Avatar)
        .collect();
    for i in 0..avatars.len() {
        for j in (i + 1)..avatars.len() {
            let dx = avatars[i].final_x - avatars[j].final_x;
            let dy = avatars[i].final_y - avatars[j].final_y;
            assert!(
                dx.hypot(dy) > 1.0,
                "{} and {} still coincide",
                avatars[i].element.id,
                avatars[j].element.id
            );
        }
    }

    // Offsets reconcile original and final positions.
    for p in &result.elements {
        assert_eq!(p.final_x, p.element.x + p.offset_x);
        assert_eq!(p.final_y, p.element.y + p.offset_y);
    }
}

#[test]
fn connectors_only_appear_for_real_displacement() {
    let manager = LayoutManager::default();
    let result = manager.layout(&mixed_frame(), 100);

    for connector in &result.connectors {
        let moved = (connector.to_x - connector.from_x).hypot(connector.to_y - connector.from_y);
        assert!(moved > 0.0);
    }

    // A lone, unclustered element never gets one.
    let lone = manager.layout(&[avatar("solo", 300.0, 0)], 100);
    assert!(lone.connectors.is_empty());
}

#[test]
fn custom_bounds_are_honored() {
    let config = LayoutConfig {
        bounds: ChartBounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 400.0,
            max_y: 200.0,
        },
        ..Default::default()
    };
    let manager = LayoutManager::new(config);
    let result = manager.layout(&mixed_frame(), 100);

    for p in &result.elements {
        let r = p.element.radius;
        assert!(p.final_x <= 400.0 - r);
        assert!(p.final_y <= 200.0 - r);
        assert!(p.final_x >= r);
        assert!(p.final_y >= r);
    }
}

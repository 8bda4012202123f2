//! Spread strategies, selected by cluster size.
//!
//! - 1: nothing to resolve
//! - 2: straddle above/below the pair centroid
//! - 3-4: vertical stack, original order preserved
//! - 5-6: fan arcing to the right
//! - 7+: two-column grid to the right, ordered by value
//!
//! Historical clusters use the vertical strategies at any size: badge X is
//! frozen, so fan and grid (which move X) stay in the current zone.

use super::cluster::ClusterZone;
use super::{vertical_order, LayoutConfig, LayoutElement};

/// Resolved placement for one cluster member.
pub(crate) type Placement = (usize, f64, f64);

/// Compute final positions for one cluster. Members arrive in index
/// order; ordering inside a strategy is by value with the deterministic
/// tie-break.
pub(crate) fn resolve(
    elements: &[LayoutElement],
    cluster: &[usize],
    zone: ClusterZone,
    config: &LayoutConfig,
) -> Vec<Placement> {
    match (cluster.len(), zone) {
        (0, _) => Vec::new(),
        (1, _) => {
            let e = &elements[cluster[0]];
            vec![(cluster[0], e.x, e.y)]
        }
        (2, _) => straddle(elements, cluster, config),
        (_, ClusterZone::Historical) => stack(elements, cluster, config),
        (3..=4, ClusterZone::Current) => stack(elements, cluster, config),
        (5..=6, ClusterZone::Current) => fan(elements, cluster, config),
        (_, ClusterZone::Current) => grid(elements, cluster, config),
    }
}

fn ordered(elements: &[LayoutElement], cluster: &[usize]) -> Vec<usize> {
    let mut members = cluster.to_vec();
    members.sort_by(|&a, &b| vertical_order(&elements[a], &elements[b]));
    members
}

fn centroid(elements: &[LayoutElement], cluster: &[usize]) -> (f64, f64) {
    let n = cluster.len() as f64;
    let cx = cluster.iter().map(|&i| elements[i].x).sum::<f64>() / n;
    let cy = cluster.iter().map(|&i| elements[i].y).sum::<f64>() / n;
    (cx, cy)
}

/// Two members spread symmetrically above and below the pair centroid by
/// half the minimum gap. No bias toward either original position.
fn straddle(elements: &[LayoutElement], cluster: &[usize], config: &LayoutConfig) -> Vec<Placement> {
    let (_, cy) = centroid(elements, cluster);
    let members = ordered(elements, cluster);
    let half = config.min_gap / 2.0;
    vec![
        (members[0], elements[members[0]].x, cy - half),
        (members[1], elements[members[1]].x, cy + half),
    ]
}

/// Vertical stack: original vertical order preserved, spaced evenly
/// around the centroid. X untouched, so it is safe for frozen badges.
fn stack(elements: &[LayoutElement], cluster: &[usize], config: &LayoutConfig) -> Vec<Placement> {
    let (_, cy) = centroid(elements, cluster);
    let members = ordered(elements, cluster);
    let n = members.len() as f64;
    members
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let offset = (i as f64 - (n - 1.0) / 2.0) * config.min_gap;
            (index, elements[index].x, cy + offset)
        })
        .collect()
}

/// Fan: arc the cluster to the right of the original X, ordered
/// vertically along the arc.
fn fan(elements: &[LayoutElement], cluster: &[usize], config: &LayoutConfig) -> Vec<Placement> {
    let (cx, cy) = centroid(elements, cluster);
    let members = ordered(elements, cluster);
    let n = members.len();
    let max_radius = cluster
        .iter()
        .map(|&i| elements[i].radius)
        .fold(0.0_f64, f64::max);
    let arc_radius = config.min_gap.max(n as f64 * max_radius);
    let sweep = std::f64::consts::FRAC_PI_3; // 60 degrees each side

    members
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let t = if n == 1 {
                0.0
            } else {
                i as f64 / (n as f64 - 1.0)
            };
            let angle = -sweep + t * 2.0 * sweep;
            // cos stays positive across the sweep: always to the right.
            let x = cx + arc_radius * angle.cos();
            let y = cy + arc_radius * angle.sin();
            (index, x, y)
        })
        .collect()
}

/// Grid: two columns to the right of the original X, ordered by value
/// (the chart's Y axis) with the deterministic tie-break, rows centered
/// on the centroid.
fn grid(elements: &[LayoutElement], cluster: &[usize], config: &LayoutConfig) -> Vec<Placement> {
    let (cx, cy) = centroid(elements, cluster);
    let members = ordered(elements, cluster);
    let spacing = config.min_gap / 2.0;
    let rows = members.len().div_ceil(2) as f64;
    let top = cy - (rows - 1.0) / 2.0 * spacing;

    members
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let col = (i % 2) as f64;
            let row = (i / 2) as f64;
            let x = cx + spacing + col * spacing;
            let y = top + row * spacing;
            (index, x, y)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ElementKind;

    fn avatar(id: &str, x: f64, y: f64) -> LayoutElement {
        LayoutElement {
            id: id.to_string(),
            kind: ElementKind::Avatar,
            x,
            y,
            radius: 16.0,
            priority: 0,
            tick: None,
            participant_id: Some(id.to_string()),
        }
    }

    fn config() -> LayoutConfig {
        LayoutConfig {
            min_gap: 64.0,
            ..Default::default()
        }
    }

    #[test]
    fn straddle_is_symmetric_about_the_centroid() {
        let elements = vec![avatar("a", 500.0, 100.0), avatar("b", 500.0, 98.0)];
        let placements = resolve(&elements, &[0, 1], ClusterZone::Current, &config());

        // Centroid 99, half gap 32.
        let by_index: std::collections::BTreeMap<usize, (f64, f64)> = placements
            .into_iter()
            .map(|(i, x, y)| (i, (x, y)))
            .collect();
        assert_eq!(by_index[&1], (500.0, 67.0)); // b was above
        assert_eq!(by_index[&0], (500.0, 131.0)); // a was below
    }

    #[test]
    fn stack_preserves_original_vertical_order() {
        let elements = vec![
            avatar("a", 500.0, 120.0),
            avatar("b", 500.0, 100.0),
            avatar("c", 500.0, 110.0),
        ];
        let placements = resolve(&elements, &[0, 1, 2], ClusterZone::Current, &config());

        let mut ys: Vec<(usize, f64)> = placements.iter().map(|&(i, _, y)| (i, y)).collect();
        ys.sort_by(|l, r| l.1.total_cmp(&r.1));
        let order: Vec<usize> = ys.iter().map(|&(i, _)| i).collect();
        assert_eq!(order, vec![1, 2, 0]); // b, c, a as originally

        // Spacing is even around the centroid (110).
        assert_eq!(ys[0].1, 110.0 - 64.0);
        assert_eq!(ys[1].1, 110.0);
        assert_eq!(ys[2].1, 110.0 + 64.0);
    }

    #[test]
    fn fan_arcs_strictly_to_the_right() {
        let elements: Vec<LayoutElement> = (0..5)
            .map(|i| avatar(&format!("p{i}"), 400.0, 200.0 + i as f64))
            .collect();
        let cluster: Vec<usize> = (0..5).collect();
        let placements = resolve(&elements, &cluster, ClusterZone::Current, &config());

        assert_eq!(placements.len(), 5);
        for &(_, x, _) in &placements {
            assert!(x > 400.0);
        }
        // Ordered vertically along the arc.
        let ys: Vec<f64> = placements.iter().map(|&(_, _, y)| y).collect();
        for pair in ys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn grid_uses_two_columns_to_the_right() {
        let elements: Vec<LayoutElement> = (0..7)
            .map(|i| avatar(&format!("p{i}"), 400.0, 200.0))
            .collect();
        let cluster: Vec<usize> = (0..7).collect();
        let placements = resolve(&elements, &cluster, ClusterZone::Current, &config());

        let xs: std::collections::BTreeSet<i64> =
            placements.iter().map(|&(_, x, _)| x as i64).collect();
        assert_eq!(xs.len(), 2);
        for &(_, x, _) in &placements {
            assert!(x > 400.0);
        }
    }

    #[test]
    fn identical_values_order_by_participant_then_priority_then_hash() {
        let mut a = avatar("id-a", 400.0, 200.0);
        let mut b = avatar("id-b", 400.0, 200.0);
        a.participant_id = Some("zed".to_string());
        b.participant_id = Some("amy".to_string());
        let elements = vec![a, b];
        let placements = resolve(&elements, &[0, 1], ClusterZone::Current, &config());

        // "amy" sorts first, so b takes the upper slot.
        let by_index: std::collections::BTreeMap<usize, f64> =
            placements.into_iter().map(|(i, _, y)| (i, y)).collect();
        assert!(by_index[&1] < by_index[&0]);
    }

    #[test]
    fn historical_cluster_of_six_stacks_vertically() {
        let elements: Vec<LayoutElement> = (0..6)
            .map(|i| avatar(&format!("p{i}"), 250.0, 300.0 + i as f64))
            .collect();
        let cluster: Vec<usize> = (0..6).collect();
        let placements = resolve(&elements, &cluster, ClusterZone::Historical, &config());

        for &(i, x, _) in &placements {
            assert_eq!(x, elements[i].x);
        }
    }
}

//! Cluster detection.
//!
//! Single-linkage grouping under a weighted distance. In the current zone
//! every avatar shares nearly the same X, so Y dominates the metric; in
//! the historical zone badges are scattered across time and both axes
//! weigh equally.

use super::LayoutElement;

/// Which partition a cluster lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterZone {
    /// Avatars plus recent badges; full strategy set applies.
    Current,
    /// Older badges; X is frozen, vertical strategies only.
    Historical,
}

impl ClusterZone {
    /// Horizontal weight in the clustering metric.
    fn x_weight(self) -> f64 {
        match self {
            ClusterZone::Current => 0.25,
            ClusterZone::Historical => 1.0,
        }
    }
}

/// Groups elements whose pairwise distance falls below the threshold.
#[derive(Debug, Clone)]
pub struct ClusterDetector {
    threshold_factor: f64,
}

impl ClusterDetector {
    /// `threshold_factor` is in units of average pair radius; the default
    /// of 3 clusters anything within three avatar radii.
    pub fn new(threshold_factor: f64) -> Self {
        Self { threshold_factor }
    }

    /// Detect clusters among `indices` into `elements`.
    ///
    /// Returns clusters ordered by their smallest member index, members in
    /// index order; singletons are clusters of one.
    pub fn detect(
        &self,
        elements: &[LayoutElement],
        indices: &[usize],
        zone: ClusterZone,
    ) -> Vec<Vec<usize>> {
        let n = indices.len();
        if n == 0 {
            return Vec::new();
        }
        let mut parent: Vec<usize> = (0..n).collect();

        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let x_weight = zone.x_weight();
        for a in 0..n {
            for b in (a + 1)..n {
                let ea = &elements[indices[a]];
                let eb = &elements[indices[b]];
                let dx = (ea.x - eb.x) * x_weight;
                let dy = ea.y - eb.y;
                let threshold = self.threshold_factor * (ea.radius + eb.radius) / 2.0;
                if dx.hypot(dy) < threshold {
                    let (ra, rb) = (root(&mut parent, a), root(&mut parent, b));
                    if ra != rb {
                        parent[rb.max(ra)] = rb.min(ra);
                    }
                }
            }
        }

        let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let r = root(&mut parent, i);
            clusters[r].push(indices[i]);
        }
        clusters.retain(|c| !c.is_empty());
        clusters
    }
}

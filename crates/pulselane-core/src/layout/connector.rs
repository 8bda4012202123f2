//! Leader lines from original to final positions.

use serde::{Deserialize, Serialize};

use super::PositionedElement;

/// A leader line drawn when an element was displaced far enough that the
/// viewer could lose track of where it belongs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub from_x: f64,
    pub from_y: f64,
    pub to_x: f64,
    pub to_y: f64,
}

/// Emit a connector for every element whose displacement exceeds
/// `factor x radius`.
pub(crate) fn generate(positioned: &[PositionedElement], factor: f64) -> Vec<Connector> {
    positioned
        .iter()
        .filter(|p| p.displacement() > factor * p.element.radius)
        .map(|p| Connector {
            from_x: p.element.x,
            from_y: p.element.y,
            to_x: p.final_x,
            to_y: p.final_y,
        })
        .collect()
}

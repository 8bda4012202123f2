//! Value label placement.
//!
//! Runs after element positions are final: a label whose rectangle would
//! cover another element tries the alternate sides before giving up and
//! accepting the overlap.

use serde::{Deserialize, Serialize};

use super::{LayoutConfig, PositionedElement};

/// Which side of its element a value label sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSide {
    Right,
    Left,
    Above,
    Below,
}

impl LabelSide {
    const TRY_ORDER: [LabelSide; 4] = [
        LabelSide::Right,
        LabelSide::Left,
        LabelSide::Above,
        LabelSide::Below,
    ];
}

struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

fn label_rect(p: &PositionedElement, side: LabelSide, config: &LayoutConfig) -> Rect {
    let r = p.element.radius;
    let (w, h, m) = (config.label_width, config.label_height, config.label_margin);
    match side {
        LabelSide::Right => Rect {
            x: p.final_x + r + m,
            y: p.final_y - h / 2.0,
            width: w,
            height: h,
        },
        LabelSide::Left => Rect {
            x: p.final_x - r - m - w,
            y: p.final_y - h / 2.0,
            width: w,
            height: h,
        },
        LabelSide::Above => Rect {
            x: p.final_x - w / 2.0,
            y: p.final_y - r - m - h,
            width: w,
            height: h,
        },
        LabelSide::Below => Rect {
            x: p.final_x - w / 2.0,
            y: p.final_y + r + m,
            width: w,
            height: h,
        },
    }
}

fn rect_hits_circle(rect: &Rect, cx: f64, cy: f64, radius: f64) -> bool {
    let nearest_x = cx.clamp(rect.x, rect.x + rect.width);
    let nearest_y = cy.clamp(rect.y, rect.y + rect.height);
    (cx - nearest_x).hypot(cy - nearest_y) < radius
}

/// Pick a side for every element's value label. Labels that overlap on
/// every side keep the default; residual label overlap is acceptable
/// degradation.
pub(crate) fn place_labels(positioned: &mut [PositionedElement], config: &LayoutConfig) {
    for i in 0..positioned.len() {
        for side in LabelSide::TRY_ORDER {
            let rect = label_rect(&positioned[i], side, config);
            let clear = positioned
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .all(|(_, other)| {
                    !rect_hits_circle(&rect, other.final_x, other.final_y, other.element.radius)
                });
            if clear {
                positioned[i].label_side = side;
                break;
            }
        }
    }
}

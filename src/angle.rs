//! Angle utilities for classifying line segments.

use serde::{Deserialize, Serialize};

/// Grid line family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

/// Direction of a segment in degrees, folded into `[0, 180)`.
#[inline]
pub fn segment_angle_deg(p0: [f32; 2], p1: [f32; 2]) -> f32 {
    let deg = (p1[1] - p0[1]).atan2(p1[0] - p0[0]).to_degrees();
    let folded = deg.rem_euclid(180.0);
    if folded >= 180.0 {
        0.0
    } else {
        folded
    }
}

/// Band classification: horizontal within `tol_deg` of 0°/180°, vertical
/// within `tol_deg` of 90°, otherwise `None`.
#[inline]
pub fn classify_angle(angle_deg: f32, tol_deg: f32) -> Option<Orientation> {
    if angle_deg <= tol_deg || angle_deg >= 180.0 - tol_deg {
        Some(Orientation::Horizontal)
    } else if (angle_deg - 90.0).abs() <= tol_deg {
        Some(Orientation::Vertical)
    } else {
        None
    }
}

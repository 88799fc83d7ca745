use serde::{Deserialize, Serialize};

/// The twelve standard leads in conventional order.
pub const STANDARD_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Pixel rectangle of one lead, supplied by the layout segmentation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRegion {
    pub name: String,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl LeadRegion {
    pub fn new(name: impl Into<String>, x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle is non-empty and lies inside a `w × h` image.
    pub fn fits(&self, w: usize, h: usize) -> bool {
        self.width > 0
            && self.height > 0
            && self.x.saturating_add(self.width) <= w
            && self.y.saturating_add(self.height) <= h
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Extracted,
    /// The region was unusable; the values are zeros.
    ZeroFilled,
}

/// Voltage samples of one lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSignal {
    pub name: String,
    /// Millivolts.
    pub values: Vec<f32>,
    pub sampling_rate: u32,
    /// Seconds.
    pub duration: f32,
    pub status: LeadStatus,
}

impl LeadSignal {
    pub fn zero_filled(name: impl Into<String>, sampling_rate: u32, duration: f32) -> Self {
        let n = (sampling_rate as f32 * duration).round() as usize;
        Self {
            name: name.into(),
            values: vec![0.0; n],
            sampling_rate,
            duration,
            status: LeadStatus::ZeroFilled,
        }
    }
}

/// Overall grade of a finished digitization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Ok,
    /// Usable, but the grid was detected with low confidence.
    Warning,
    /// Every tier failed; the best attempt is returned for manual review.
    ManualReview,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bounds() {
        let r = LeadRegion::new("V1", 10, 20, 100, 50);
        assert!(r.fits(110, 70));
        assert!(!r.fits(109, 70));
        assert!(!LeadRegion::new("I", 0, 0, 0, 10).fits(100, 100));
    }

    #[test]
    fn zero_filled_length_matches_duration() {
        let s = LeadSignal::zero_filled("aVR", 500, 2.5);
        assert_eq!(s.values.len(), 1250);
        assert!(s.values.iter().all(|&v| v == 0.0));
        assert_eq!(s.status, LeadStatus::ZeroFilled);
    }
}

//! Normalized detector output: canonical names, material sets and boxes.

use crate::config::BoxPolicy;
use glam::DVec2;
use seer_data::DetectionRecord;
use std::collections::BTreeSet;

/// Fold case and whitespace: lowercase, trim, collapse internal runs.
pub fn canonical_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Four normalized corners in `[0, 1]²`, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    corners: [DVec2; 4],
}

impl NormalizedBox {
    /// Apply `policy` to raw corners.
    ///
    /// Returns the box and whether any coordinate was clamped, or `None`
    /// if a coordinate is non-finite or out of range under
    /// [`BoxPolicy::Reject`].
    pub fn from_corners(raw: [[f64; 2]; 4], policy: BoxPolicy) -> Option<(Self, bool)> {
        let mut clamped = false;
        let mut corners = [DVec2::ZERO; 4];

        for (corner, [x, y]) in corners.iter_mut().zip(raw) {
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            let point = DVec2::new(x, y);
            let inside = point.clamp(DVec2::ZERO, DVec2::ONE);
            if inside != point {
                match policy {
                    BoxPolicy::Clamp => clamped = true,
                    BoxPolicy::Reject => return None,
                }
            }
            *corner = inside;
        }

        Some((Self { corners }, clamped))
    }

    pub fn corners(&self) -> &[DVec2; 4] {
        &self.corners
    }
}

/// A detector observation of one object in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Canonical name.
    pub name: String,
    /// Normalized, non-empty material labels.
    pub materials: BTreeSet<String>,
    pub bbox: NormalizedBox,
}

impl Detection {
    /// Create a detection, normalizing the name and material labels.
    pub fn new<I, S>(name: &str, materials: I, bbox: NormalizedBox) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: canonical_name(name),
            materials: materials
                .into_iter()
                .map(|m| canonical_name(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
            bbox,
        }
    }

    /// Convert an untrusted detector record.
    ///
    /// Returns the detection and whether its box was clamped, or `None`
    /// when the box is unusable or the name normalizes to nothing.
    pub fn from_record(record: &DetectionRecord, policy: BoxPolicy) -> Option<(Self, bool)> {
        let (bbox, clamped) = NormalizedBox::from_corners(record.corners, policy)?;
        let detection = Self::new(&record.name, &record.materials, bbox);
        if detection.name.is_empty() {
            return None;
        }
        Some((detection, clamped))
    }
}

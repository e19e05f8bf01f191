//! Raw detector outputs consumed by the aggregator
//!
//! These are produced by external inference (vision / audio analysis) and are
//! the only shape the engine accepts from detectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One video frame's detector output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameSignals {
    pub person_count: u32,
    #[serde(default)]
    pub detected_object_labels: BTreeSet<String>,
    pub face_count: u32,
    /// Vertical ear offset in normalized image coordinates
    #[serde(default)]
    pub head_tilt_magnitude: f64,
}

/// One audio chunk's detector output
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioSignals {
    pub voice_rms_energy: f64,
    /// Share of spectral magnitude in the lowest quarter of the spectrum
    #[serde(default)]
    pub low_frequency_ratio: f64,
    pub spectral_peak_count: u32,
    /// Std-dev of per-segment RMS energy across the chunk
    #[serde(default)]
    pub energy_variance: f64,
    #[serde(default)]
    pub mean_abs_amplitude: f64,
}

impl FrameSignals {
    pub fn has_label(&self, label: &str) -> bool {
        self.detected_object_labels.contains(label)
    }
}

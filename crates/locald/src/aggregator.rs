//! Signal aggregation
//!
//! Normalizes one frame's or one audio chunk's detector output into a set of
//! per-kind conditions. Stateless: the same input always yields the same map.
//!
//! An empty map means "no evidence either way" and must leave timers alone.

use crate::config::Thresholds;
use crate::detector::DetectorError;
use proctor_core::{AudioSignals, FrameSignals, ViolationKind};
use std::collections::BTreeMap;
use tracing::warn;

/// Condition currently true/false for each kind relevant to one modality
pub type Conditions = BTreeMap<ViolationKind, bool>;

#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    thresholds: Thresholds,
}

impl SignalAggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn frame_conditions(&self, signals: &FrameSignals) -> Conditions {
        let t = &self.thresholds;
        BTreeMap::from([
            (ViolationKind::NoPersonDetected, signals.person_count == 0),
            (
                ViolationKind::MultiplePersons,
                signals.person_count > 1 || signals.face_count > 1,
            ),
            (ViolationKind::PhoneDetected, signals.has_label(&t.phone_label)),
            (ViolationKind::BookDetected, signals.has_label(&t.book_label)),
            (ViolationKind::FaceNotVisible, signals.face_count == 0),
            (
                ViolationKind::SuspiciousHeadMovement,
                signals.head_tilt_magnitude > t.head_tilt,
            ),
        ])
    }

    pub fn audio_conditions(&self, signals: &AudioSignals) -> Conditions {
        let t = &self.thresholds;
        BTreeMap::from([
            (
                ViolationKind::SuspiciousAudio,
                signals.voice_rms_energy > t.voice_activity
                    && signals.low_frequency_ratio > t.low_frequency_ratio,
            ),
            (
                ViolationKind::MultipleVoices,
                signals.spectral_peak_count > t.spectral_peaks,
            ),
            (
                ViolationKind::BackgroundConversation,
                signals.mean_abs_amplitude > t.background_noise
                    && signals.energy_variance > t.energy_variance,
            ),
        ])
    }

    /// Frame conditions from a detector result; failures degrade to no signal
    pub fn frame_outcome(
        &self,
        session_id: &str,
        outcome: Result<FrameSignals, DetectorError>,
    ) -> Conditions {
        match outcome {
            Ok(signals) => self.frame_conditions(&signals),
            Err(e) => {
                warn!(session_id, code = e.code().as_str(), error = %e, "frame detector failed");
                Conditions::new()
            }
        }
    }

    /// Audio conditions from a detector result; failures degrade to no signal
    pub fn audio_outcome(
        &self,
        session_id: &str,
        outcome: Result<AudioSignals, DetectorError>,
    ) -> Conditions {
        match outcome {
            Ok(signals) => self.audio_conditions(&signals),
            Err(e) => {
                warn!(session_id, code = e.code().as_str(), error = %e, "audio detector failed");
                Conditions::new()
            }
        }
    }
}

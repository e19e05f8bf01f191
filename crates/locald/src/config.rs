//! Engine configuration
//!
//! YAML/JSON configuration for aggregator thresholds, per-kind violation
//! policies, scoring weights, emission policy and evidence storage.
//! Every field has a default so an empty document is a valid config.

use proctor_core::{Severity, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Per-kind overrides; kinds not listed keep their default policy
    #[serde(default)]
    pub policies: BTreeMap<ViolationKind, ViolationPolicy>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub emission: EmissionPolicy,

    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Capacity of each session's effect queue
    #[serde(default = "default_effect_queue_depth")]
    pub effect_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            policies: BTreeMap::new(),
            scoring: ScoringConfig::default(),
            emission: EmissionPolicy::default(),
            evidence: EvidenceConfig::default(),
            effect_queue_depth: default_effect_queue_depth(),
        }
    }
}

impl EngineConfig {
    /// Load from YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as JSON
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_json_file(path),
        }
    }

    /// Effective policy for a kind (override or built-in default)
    pub fn policy(&self, kind: ViolationKind) -> ViolationPolicy {
        self.policies
            .get(&kind)
            .copied()
            .unwrap_or_else(|| ViolationPolicy::default_for(kind))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        for (kind, policy) in &self.policies {
            if !policy.confirm_seconds.is_finite() || policy.confirm_seconds < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: confirm_seconds must be a finite value >= 0",
                    kind
                )));
            }
        }

        self.scoring.validate()?;

        if self.effect_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "effect_queue_depth must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn default_effect_queue_depth() -> usize {
    64
}

/// Aggregator thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub head_tilt: f64,
    pub voice_activity: f64,
    pub low_frequency_ratio: f64,
    /// MULTIPLE_VOICES fires when the peak count is strictly above this
    pub spectral_peaks: u32,
    pub background_noise: f64,
    pub energy_variance: f64,
    pub phone_label: String,
    pub book_label: String,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            head_tilt: 0.05,
            voice_activity: 0.02,
            low_frequency_ratio: 0.7,
            spectral_peaks: 2,
            background_noise: 0.01,
            energy_variance: 0.01,
            phone_label: "cell phone".to_string(),
            book_label: "book".to_string(),
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let scalars = [
            ("head_tilt", self.head_tilt),
            ("voice_activity", self.voice_activity),
            ("low_frequency_ratio", self.low_frequency_ratio),
            ("background_noise", self.background_noise),
            ("energy_variance", self.energy_variance),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{} must be a finite value >= 0",
                    name
                )));
            }
        }
        if self.phone_label.trim().is_empty() || self.book_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "object labels must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Severity and hysteresis duration for one violation kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViolationPolicy {
    pub severity: Severity,
    pub confirm_seconds: f64,
}

impl ViolationPolicy {
    pub fn default_for(kind: ViolationKind) -> Self {
        let (severity, confirm_seconds) = match kind {
            ViolationKind::NoPersonDetected => (Severity::High, 5.0),
            ViolationKind::MultiplePersons => (Severity::High, 3.0),
            ViolationKind::PhoneDetected => (Severity::High, 3.0),
            ViolationKind::BookDetected => (Severity::Medium, 3.0),
            ViolationKind::FaceNotVisible => (Severity::High, 5.0),
            ViolationKind::SuspiciousHeadMovement => (Severity::Medium, 2.0),
            ViolationKind::SuspiciousAudio => (Severity::Medium, 3.0),
            ViolationKind::MultipleVoices => (Severity::High, 3.0),
            ViolationKind::BackgroundConversation => (Severity::High, 5.0),
            ViolationKind::TabSwitch => (Severity::Medium, 0.0),
        };
        Self {
            severity,
            confirm_seconds,
        }
    }

    pub fn confirm_ms(&self) -> i64 {
        (self.confirm_seconds * 1000.0).round() as i64
    }
}

/// Whether a continuously-true condition emits once or on every observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// Re-emit on every observation after maturation (live dashboards)
    #[default]
    EveryObservation,
    /// Emit at maturation, then stay silent until the condition clears
    OncePerEpisode,
}

/// Where captured evidence goes; one mode per deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvidenceConfig {
    #[default]
    Disabled,
    Disk {
        root: PathBuf,
    },
    Blob {
        db_path: PathBuf,
    },
}

/// Cheating score weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_severity_weights")]
    pub severity_weights: BTreeMap<Severity, u32>,

    /// Kinds absent from this table use `default_kind_weight`
    #[serde(default = "default_kind_weights")]
    pub kind_weights: BTreeMap<ViolationKind, u32>,

    #[serde(default = "default_kind_weight")]
    pub default_kind_weight: u32,

    /// Raw total that maps to a score of 100
    #[serde(default = "default_normalizer")]
    pub normalizer: f64,

    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            severity_weights: default_severity_weights(),
            kind_weights: default_kind_weights(),
            default_kind_weight: default_kind_weight(),
            normalizer: default_normalizer(),
            max_score: default_max_score(),
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for severity in Severity::ALL {
            if !self.severity_weights.contains_key(&severity) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.severity_weights is missing {}",
                    severity
                )));
            }
        }
        if !self.normalizer.is_finite() || self.normalizer <= 0.0 {
            return Err(ConfigError::Invalid(
                "scoring.normalizer must be > 0".to_string(),
            ));
        }
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(ConfigError::Invalid(
                "scoring.max_score must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_severity_weights() -> BTreeMap<Severity, u32> {
    BTreeMap::from([
        (Severity::Low, 1),
        (Severity::Medium, 3),
        (Severity::High, 5),
    ])
}

fn default_kind_weights() -> BTreeMap<ViolationKind, u32> {
    BTreeMap::from([
        (ViolationKind::FaceNotVisible, 2),
        (ViolationKind::PhoneDetected, 4),
        (ViolationKind::MultiplePersons, 5),
        (ViolationKind::SuspiciousAudio, 3),
        (ViolationKind::TabSwitch, 2),
    ])
}

fn default_kind_weight() -> u32 {
    1
}

fn default_normalizer() -> f64 {
    150.0
}

fn default_max_score() -> f64 {
    100.0
}

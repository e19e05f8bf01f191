//! Proctoring rule categories
//!
//! Every confirmed violation, policy entry and scoring weight is keyed by one
//! of these kinds. Serialized names match the violation log column values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which detector stream drives a kind's condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Frame,
    Audio,
    /// Reported by the client, never derived from detector output
    Direct,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    NoPersonDetected,
    MultiplePersons,
    PhoneDetected,
    BookDetected,
    FaceNotVisible,
    SuspiciousHeadMovement,
    SuspiciousAudio,
    MultipleVoices,
    BackgroundConversation,
    TabSwitch,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 10] = [
        ViolationKind::NoPersonDetected,
        ViolationKind::MultiplePersons,
        ViolationKind::PhoneDetected,
        ViolationKind::BookDetected,
        ViolationKind::FaceNotVisible,
        ViolationKind::SuspiciousHeadMovement,
        ViolationKind::SuspiciousAudio,
        ViolationKind::MultipleVoices,
        ViolationKind::BackgroundConversation,
        ViolationKind::TabSwitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::NoPersonDetected => "NO_PERSON_DETECTED",
            ViolationKind::MultiplePersons => "MULTIPLE_PERSONS",
            ViolationKind::PhoneDetected => "PHONE_DETECTED",
            ViolationKind::BookDetected => "BOOK_DETECTED",
            ViolationKind::FaceNotVisible => "FACE_NOT_VISIBLE",
            ViolationKind::SuspiciousHeadMovement => "SUSPICIOUS_HEAD_MOVEMENT",
            ViolationKind::SuspiciousAudio => "SUSPICIOUS_AUDIO",
            ViolationKind::MultipleVoices => "MULTIPLE_VOICES",
            ViolationKind::BackgroundConversation => "BACKGROUND_CONVERSATION",
            ViolationKind::TabSwitch => "TAB_SWITCH",
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            ViolationKind::NoPersonDetected
            | ViolationKind::MultiplePersons
            | ViolationKind::PhoneDetected
            | ViolationKind::BookDetected
            | ViolationKind::FaceNotVisible
            | ViolationKind::SuspiciousHeadMovement => Modality::Frame,
            ViolationKind::SuspiciousAudio
            | ViolationKind::MultipleVoices
            | ViolationKind::BackgroundConversation => Modality::Audio,
            ViolationKind::TabSwitch => Modality::Direct,
        }
    }

    /// Human-readable text recorded with the violation
    pub fn default_description(&self) -> &'static str {
        match self {
            ViolationKind::NoPersonDetected => "No person detected in frame",
            ViolationKind::MultiplePersons => "Multiple persons detected in frame",
            ViolationKind::PhoneDetected => "Cell phone detected in frame",
            ViolationKind::BookDetected => "Book or reading material detected",
            ViolationKind::FaceNotVisible => "Student face not visible",
            ViolationKind::SuspiciousHeadMovement => "Suspicious head movement detected",
            ViolationKind::SuspiciousAudio => "Suspicious voice pattern detected",
            ViolationKind::MultipleVoices => "Multiple voices detected in audio",
            ViolationKind::BackgroundConversation => "Background conversation detected",
            ViolationKind::TabSwitch => "Student switched browser tabs",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown violation kind: {}", s))
    }
}

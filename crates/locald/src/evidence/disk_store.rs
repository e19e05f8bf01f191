//! Disk evidence store
//!
//! Layout under the evidence root:
//!   evidence/<session_id>/<YYYYmmdd_HHMMSS>_<8 hex>.jpg
//!   audio_evidence/<session_id>/<YYYYmmdd_HHMMSS>_<8 hex>.wav

use super::path_safety::{ensure_within_root, safe_join, validate_session_id};
use super::{EvidenceError, EvidenceMedia, EvidenceStore, MediaKind};
use chrono::{TimeZone, Utc};
use proctor_core::EvidenceRef;
use std::fs;
use std::path::PathBuf;

const FRAME_DIR: &str = "evidence";
const AUDIO_DIR: &str = "audio_evidence";

const WAV_SAMPLE_RATE: u32 = 44_100;
const WAV_CHANNELS: u16 = 1;
const WAV_BITS_PER_SAMPLE: u16 = 16;

pub struct DiskEvidenceStore {
    root: PathBuf,
}

impl DiskEvidenceStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn file_name(media: &EvidenceMedia) -> String {
        let stamp = Utc
            .timestamp_millis_opt(media.captured_at_ms)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let ext = match media.kind {
            MediaKind::Frame => "jpg",
            MediaKind::Audio => "wav",
        };
        format!("{}_{}.{}", stamp, &suffix[..8], ext)
    }
}

impl EvidenceStore for DiskEvidenceStore {
    fn capture(
        &self,
        session_id: &str,
        media: &EvidenceMedia,
    ) -> Result<EvidenceRef, EvidenceError> {
        validate_session_id(session_id)?;

        let kind_dir = match media.kind {
            MediaKind::Frame => FRAME_DIR,
            MediaKind::Audio => AUDIO_DIR,
        };
        let session_dir = safe_join(&self.root.join(kind_dir), session_id)?;
        fs::create_dir_all(&session_dir)?;
        let session_dir = ensure_within_root(&self.root, &session_dir)?;

        let path = session_dir.join(Self::file_name(media));
        match media.kind {
            MediaKind::Frame => fs::write(&path, &media.bytes)?,
            MediaKind::Audio => fs::write(&path, wav_bytes(&media.bytes))?,
        }

        Ok(EvidenceRef::Path {
            path: path.display().to_string(),
        })
    }
}

/// Wrap raw PCM in a canonical 44-byte RIFF/WAVE header
fn wav_bytes(pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let block_align = WAV_CHANNELS * (WAV_BITS_PER_SAMPLE / 8);
    let byte_rate = WAV_SAMPLE_RATE * block_align as u32;

    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&WAV_CHANNELS.to_le_bytes());
    out.extend_from_slice(&WAV_SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&WAV_BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn media(kind: MediaKind, bytes: &[u8]) -> EvidenceMedia {
        EvidenceMedia {
            kind,
            bytes: bytes.into(),
            captured_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_frame_written_under_session_dir() {
        let tmpdir = TempDir::new().unwrap();
        let store = DiskEvidenceStore::new(tmpdir.path().to_path_buf());

        let evidence = store
            .capture("session-1", &media(MediaKind::Frame, b"\xff\xd8jpeg"))
            .unwrap();
        let path = evidence.path().unwrap();

        assert!(path.contains("evidence/session-1/"));
        assert!(path.ends_with(".jpg"));
        assert!(path.contains("20231114_"));
        assert_eq!(fs::read(path).unwrap(), b"\xff\xd8jpeg");
    }

    #[test]
    fn test_audio_gets_wav_header() {
        let tmpdir = TempDir::new().unwrap();
        let store = DiskEvidenceStore::new(tmpdir.path().to_path_buf());

        let pcm = [0u8, 1, 2, 3];
        let evidence = store
            .capture("session-1", &media(MediaKind::Audio, &pcm))
            .unwrap();
        let path = evidence.path().unwrap();
        assert!(path.contains("audio_evidence"));

        let written = fs::read(Path::new(path)).unwrap();
        assert_eq!(written.len(), 48);
        assert_eq!(&written[0..4], b"RIFF");
        assert_eq!(&written[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(written[24..28].try_into().unwrap()), 44_100);
        assert_eq!(&written[44..], &pcm);
    }

    #[test]
    fn test_traversal_session_id_rejected() {
        let tmpdir = TempDir::new().unwrap();
        let store = DiskEvidenceStore::new(tmpdir.path().to_path_buf());

        let result = store.capture("../escape", &media(MediaKind::Frame, b"x"));
        assert!(matches!(result, Err(EvidenceError::Path(_))));
        assert!(!tmpdir.path().join("escape").exists());
    }
}

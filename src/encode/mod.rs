//! Output encoding
//!
//! Turns rendered stereo buffers into downloadable artifacts:
//! - 16-bit PCM WAV
//! - Constant-bitrate MP3
//! - Uncompressed ZIP archives of per-track WAVs

pub mod archive;
pub mod mp3;
pub mod wav;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

pub use archive::write_zip;
pub use mp3::{LameCodec, Mp3Codec};
pub use wav::encode_wav;

/// Kind of encoded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Wav,
    Mp3,
    Zip,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Wav => "wav",
            ArtifactKind::Mp3 => "mp3",
            ArtifactKind::Zip => "zip",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::Wav => "audio/wav",
            ArtifactKind::Mp3 => "audio/mpeg",
            ArtifactKind::Zip => "application/zip",
        }
    }
}

/// A named, typed binary payload ready to be saved
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub filename: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl EncodedArtifact {
    /// Create an artifact named `<stem>.<extension>`
    pub fn new(stem: &str, kind: ArtifactKind, bytes: Vec<u8>) -> Self {
        Self {
            filename: format!("{}.{}", stem, kind.extension()),
            kind,
            bytes,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex SHA-256 of the payload
    pub fn sha256(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }

    /// Write the payload into `dir` under its filename
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Convert a float sample to signed 16-bit PCM
///
/// Input is clamped to [-1, 1]. Negative values scale by 32768 and
/// non-negative values by 32767, so both rails are reachable.
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_float_to_i16_rails() {
        assert_eq!(float_to_i16(1.0), 32767);
        assert_eq!(float_to_i16(-1.0), -32768);
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(2.5), 32767);
        assert_eq!(float_to_i16(-3.0), -32768);
        assert_eq!(float_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_float_to_i16_rounds() {
        assert_eq!(float_to_i16(0.5), 16384);
        assert_eq!(float_to_i16(-0.5), -16384);
    }

    #[test]
    fn test_artifact_naming() {
        let artifact = EncodedArtifact::new("song", ArtifactKind::Zip, vec![1, 2, 3]);
        assert_eq!(artifact.filename, "song.zip");
        assert_eq!(artifact.kind.mime_type(), "application/zip");
        assert_eq!(artifact.len(), 3);
    }

    #[test]
    fn test_artifact_sha256() {
        let artifact = EncodedArtifact::new("empty", ArtifactKind::Wav, Vec::new());
        assert_eq!(
            artifact.sha256(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_artifact_write_to() {
        let dir = tempdir().unwrap();
        let artifact = EncodedArtifact::new("mix", ArtifactKind::Mp3, vec![0xff, 0xfb]);
        let path = artifact.write_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "mix.mp3");
        assert_eq!(std::fs::read(path).unwrap(), vec![0xff, 0xfb]);
    }
}

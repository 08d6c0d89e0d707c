//! Error types for artifact encoding and decoding.

use std::fmt;
use std::io;

/// Errors raised while building or reading an artifact.
#[derive(Debug)]
pub enum ArtifactError {
    /// Reading a binary payload failed, typically because it is truncated.
    Io(io::Error),
    /// JSON serialisation failed.
    Json(serde_json::Error),
    /// The payload does not start with the expected magic bytes.
    InvalidMagic {
        /// The magic this decoder accepts.
        expected: [u8; 4],
    },
    /// The layout version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the payload.
        found: u8,
    },
    /// Sizes in a header or argument list disagree.
    Malformed {
        /// What went wrong.
        detail: String,
    },
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON encoding failed: {e}"),
            Self::InvalidMagic { expected } => write!(
                f,
                "invalid magic bytes (expected b\"{}\")",
                String::from_utf8_lossy(expected)
            ),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported layout version {found}")
            }
            Self::Malformed { detail } => write!(f, "malformed artifact: {detail}"),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ArtifactError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

//! Error handling for Mixdown
//!
//! Every stage re-tags failures with its own context and propagates them.
//! Nothing in the render or encode path is retried.

use thiserror::Error;

/// Result type alias for Mixdown operations
pub type Result<T> = std::result::Result<T, MixdownError>;

/// Boxed cause attached to compile, render and decode failures
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Machine-distinguishable failure kind surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream compilation/evaluation failed
    Compile,
    /// The project resolves to zero-length output
    EmptyResult,
    /// The offline render backend raised during the pass
    Render,
    /// A malformed buffer reached the encoder
    Encode,
    /// Configuration, I/O and input validation failures
    Other,
}

/// Main error type for Mixdown operations
#[derive(Error, Debug)]
pub enum MixdownError {
    // Pipeline Errors
    #[error("Compile error: {reason}")]
    Compile {
        reason: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Project produced an empty result")]
    EmptyResult,

    #[error("Render error: {reason}")]
    Render {
        reason: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Encode error: {reason}")]
    Encode { reason: String },

    #[error("Export of track {track_index} failed: {source}")]
    TrackExport {
        track_index: usize,
        #[source]
        source: Box<MixdownError>,
    },

    // Input Errors
    #[error("Invalid project: {reason}")]
    InvalidProject { reason: String },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixdownError {
    /// Shorthand for a render failure without an underlying cause
    pub fn render(reason: impl Into<String>) -> Self {
        MixdownError::Render {
            reason: reason.into(),
            source: None,
        }
    }

    /// Shorthand for an encoder failure
    pub fn encode(reason: impl Into<String>) -> Self {
        MixdownError::Encode {
            reason: reason.into(),
        }
    }

    /// Get the kind of this error, looking through per-track wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            MixdownError::Compile { .. } => ErrorKind::Compile,
            MixdownError::EmptyResult => ErrorKind::EmptyResult,
            MixdownError::Render { .. } => ErrorKind::Render,
            MixdownError::Encode { .. } => ErrorKind::Encode,
            MixdownError::TrackExport { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixdownError::Compile { .. } => "COMPILE_ERROR",
            MixdownError::EmptyResult => "EMPTY_RESULT_ERROR",
            MixdownError::Render { .. } => "RENDER_ERROR",
            MixdownError::Encode { .. } => "ENCODE_ERROR",
            MixdownError::TrackExport { .. } => "TRACK_EXPORT_ERROR",
            MixdownError::InvalidProject { .. } => "INVALID_PROJECT",
            MixdownError::InvalidAudio { .. } => "INVALID_AUDIO",
            MixdownError::Config { .. } => "CONFIG_ERROR",
            MixdownError::Io(_) => "IO_ERROR",
            MixdownError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable by retrying the same call
    ///
    /// Always false: every failure is terminal for its export/render call.
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Get a user-facing message for display next to the script
    pub fn friendly_message(&self) -> String {
        match self.kind() {
            ErrorKind::Compile => {
                "The script could not be compiled, so there is nothing to export.".to_string()
            }
            ErrorKind::EmptyResult => {
                "The script ran but produced no audio. Add some clips and try again.".to_string()
            }
            ErrorKind::Render => "Something went wrong while rendering the audio.".to_string(),
            _ => self.to_string(),
        }
    }
}

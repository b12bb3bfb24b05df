//! Error types for the voice session system

use thiserror::Error;

/// Result type alias for voice session operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in the voice session system
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The host environment has no speech capture capability.
    #[error("speech capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The user declined microphone access.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Speech synthesis could not start. Non-fatal: the session continues text-only.
    #[error("speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// Transport-level failure reaching the tutoring backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend error {status}: {detail}")]
    Backend { status: u16, detail: String },

    /// A typed message exceeded the client-side word cap.
    #[error("message exceeds {max} word limit")]
    WordLimit { max: usize },

    #[error("channel send error: {0}")]
    ChannelSend(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl VoiceError {
    /// Map a reqwest transport error to the session taxonomy.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        VoiceError::Network(err.to_string())
    }
}

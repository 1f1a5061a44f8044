//! The external transcription collaborator. Narrow async-trait boundary
//! matching `note-service`'s `NoteStore` pattern: the engine depends only on
//! this trait, never on a concrete transcription backend.

use async_trait::async_trait;
use std::fmt;

/// spec.md §9: failures are classified transient (worth retrying) or
/// terminal (retrying can't help) by the collaborator itself via a tagged
/// variant. Substring matching against the message text is kept only as a
/// compatibility fallback for transcribers that can't yet tag their errors
/// (see `TranscriberError::classify_legacy_message`), not as the primary
/// signal.
#[derive(Debug, Clone)]
pub enum TranscriberError {
    Transient(String),
    Terminal(String),
}

impl TranscriberError {
    pub fn message(&self) -> &str {
        match self {
            TranscriberError::Transient(message) => message,
            TranscriberError::Terminal(message) => message,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TranscriberError::Transient(_))
    }

    /// Compatibility shim for transcribers that only ever return a message
    /// string with no transient/terminal tag. New transcribers should
    /// construct `TranscriberError::Transient`/`Terminal` directly instead
    /// of relying on this matching.
    pub fn classify_legacy_message(message: impl Into<String>) -> Self {
        let message = message.into();
        const TRANSIENT_HINTS: &[&str] = &[
            "timeout",
            "timed out",
            "temporarily unavailable",
            "connection reset",
            "connection aborted",
            "network",
            "502",
            "503",
            "504",
        ];
        let lower = message.to_lowercase();
        if TRANSIENT_HINTS.iter().any(|hint| lower.contains(hint)) {
            TranscriberError::Transient(message)
        } else {
            TranscriberError::Terminal(message)
        }
    }
}

impl fmt::Display for TranscriberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for TranscriberError {}

#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub duration_ms: u64,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &str) -> Result<TranscriptionOutcome, TranscriberError>;
}

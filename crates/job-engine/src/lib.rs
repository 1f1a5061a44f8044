//! Durable async transcription job queue built on top of `note-service`:
//! a bounded worker pool, retry/backoff classification of transcriber
//! failures, cooperative cancellation, crash/restart recovery, and
//! history pruning. Ported operation-for-operation from the Python
//! reference's `TranscriptionJobService`.

mod engine;
mod job;
mod settings;
mod transcriber;
mod upload_guard;

pub use engine::{JobEngine, JobEngineError};
pub use job::{JobErrorCode, JobId, JobRecord, JobStatus, JobView};
pub use settings::Settings;
pub use transcriber::{Transcriber, TranscriberError, TranscriptionOutcome};
pub use upload_guard::UploadGuard;

//! The durable transcription job queue: admission, a bounded worker pool,
//! retry/backoff classification, cancellation, restart recovery, and
//! history pruning. Operation-for-operation port of the Python reference's
//! `TranscriptionJobService` (`examples/original_source/backend/services/
//! transcription_job_service.py`), expressed as tokio tasks rather than OS
//! threads since the rest of this workspace is tokio-first.

use crate::job::{JobErrorCode, JobId, JobRecord, JobStatus, JobView};
use crate::settings::Settings;
use crate::transcriber::{Transcriber, TranscriberError};
use crate::upload_guard::UploadGuard;
use chrono::{DateTime, Utc};
use note_index::{persistence, Clock, NoteId};
use note_service::{MarkerApplyResult, NoteService, NoteServiceError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Workers spawned regardless of `max_concurrent_jobs`; each one checks the
/// live setting every poll and idles if its index falls outside the current
/// limit. Caps the thread/task footprint at the ceiling of the declared
/// `max_concurrent_jobs` range (8) without restarting tasks when the limit
/// changes at runtime.
const WORKER_SLOTS: u32 = 8;
const IDLE_POLL: Duration = Duration::from_millis(200);
/// Restart recovery requeues an interrupted job at most once automatically;
/// further attempts require an explicit `resume_job` call.
const MAX_AUTO_REQUEUE: u32 = 1;
const FAILURE_PLACEHOLDER_MAX_LEN: usize = 180;

#[derive(Debug, thiserror::Error)]
pub enum JobEngineError {
    #[error("job queue is full")]
    QueueFull,
    #[error("target note not found")]
    NoteNotFound,
    #[error("job not found")]
    JobNotFound,
    #[error("job is not interrupted")]
    NotInterrupted,
    #[error(transparent)]
    NoteService(#[from] NoteServiceError),
    #[error(transparent)]
    Persist(#[from] persistence::PersistError),
}

#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    version: u32,
    jobs: HashMap<JobId, JobRecord>,
}

#[derive(Debug, Clone, Serialize)]
struct JobEvent {
    job_id: JobId,
    at: DateTime<Utc>,
    kind: String,
    detail: Option<String>,
    /// Ready-queue length at the moment the event was recorded. Observability
    /// only, not a stored invariant — lets forensic replay see how deep the
    /// queue was running without cross-referencing the snapshot.
    queue_depth: usize,
}

struct EngineState {
    jobs: HashMap<JobId, JobRecord>,
    queue: VecDeque<JobId>,
}

pub struct JobEngine {
    note_service: Arc<NoteService>,
    transcriber: Arc<dyn Transcriber>,
    clock: Arc<dyn Clock>,
    snapshot_path: PathBuf,
    event_log_path: PathBuf,
    settings: RwLock<Settings>,
    state: Mutex<EngineState>,
    notify: Notify,
    shutdown: AtomicBool,
}

impl JobEngine {
    pub async fn load(
        note_service: Arc<NoteService>,
        transcriber: Arc<dyn Transcriber>,
        clock: Arc<dyn Clock>,
        snapshot_path: PathBuf,
        event_log_path: PathBuf,
        settings: Settings,
    ) -> Result<Arc<Self>, JobEngineError> {
        let snapshot = persistence::load_json::<EngineSnapshot>(&snapshot_path)
            .await
            .unwrap_or_else(|| EngineSnapshot {
                version: 1,
                jobs: HashMap::new(),
            });

        let settings = settings.clamped();
        let mut jobs = snapshot.jobs;
        let mut requeued = Vec::new();
        for record in jobs.values_mut() {
            if matches!(record.status, JobStatus::Running | JobStatus::CancelRequested) {
                record.status = JobStatus::Interrupted;
                record.error_code = Some(JobErrorCode::RestartInterrupted);
                record.cancel_requested = false;
                record.updated_at = clock.now_iso();

                if settings.auto_requeue_interrupted && record.restart_requeues < MAX_AUTO_REQUEUE {
                    record.restart_requeues += 1;
                    record.status = JobStatus::Queued;
                    record.available_at = clock.now_epoch_secs();
                    requeued.push(record.id.clone());
                }
            }
        }

        let mut queue: Vec<JobId> = jobs
            .values()
            .filter(|job| job.status == JobStatus::Queued)
            .map(|job| job.id.clone())
            .collect();
        queue.sort_by_key(|id| jobs[id].created_at);

        let engine = Arc::new(Self {
            note_service,
            transcriber,
            clock,
            snapshot_path,
            event_log_path,
            settings: RwLock::new(settings),
            state: Mutex::new(EngineState {
                jobs,
                queue: queue.into(),
            }),
            notify: Notify::new(),
            shutdown: AtomicBool::new(false),
        });

        engine.persist_snapshot().await?;
        for job_id in requeued {
            engine
                .append_event(&job_id, "restart_auto_requeued", None)
                .await?;
        }
        engine.prune_history().await;
        Ok(engine)
    }

    pub async fn replace_settings(&self, settings: Settings) {
        let mut guard = self.settings.write().await;
        *guard = settings.clamped();
    }

    pub async fn current_settings(&self) -> Settings {
        *self.settings.read().await
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Spawns the worker pool. Each task polls its own eligibility against
    /// the live `max_concurrent_jobs` setting every cycle, so raising or
    /// lowering the limit at runtime takes effect without restarting tasks.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..WORKER_SLOTS)
            .map(|worker_index| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.worker_loop(worker_index).await })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>, worker_index: u32) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let active = self.current_settings().await.max_concurrent_jobs;
            if worker_index >= active {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }
            match self.try_lease_job().await {
                Some(job_id) => self.run_job(job_id).await,
                None => tokio::time::sleep(IDLE_POLL).await,
            }
        }
    }

    /// Single pass over the ready-queue: entries whose job no longer exists
    /// or is no longer `queued` are dropped as they're encountered (spec.md
    /// §4.3); entries that are still queued but not yet due are left in
    /// place. The first eligible (queued, due) id found is removed and
    /// returned; the scan keeps going past it only to finish cleaning up
    /// stale entries, never to pick a second one.
    async fn try_lease_job(&self) -> Option<JobId> {
        let now = self.clock.now_epoch_secs();
        let mut guard = self.state.lock().await;

        let mut chosen = None;
        let mut i = 0;
        while i < guard.queue.len() {
            let id = guard.queue[i].clone();
            let still_queued = guard.jobs.get(&id).map(|job| job.status == JobStatus::Queued).unwrap_or(false);
            if !still_queued {
                guard.queue.remove(i);
                continue;
            }
            if chosen.is_none() && guard.jobs[&id].available_at <= now {
                chosen = Some(id);
                guard.queue.remove(i);
                continue;
            }
            i += 1;
        }
        let job_id = chosen?;
        let job = guard.jobs.get_mut(&job_id)?;
        job.status = JobStatus::Running;
        job.started_at = Some(self.clock.now_iso());
        job.attempts += 1;
        job.updated_at = self.clock.now_iso();
        drop(guard);

        if let Err(error) = self.persist_snapshot().await {
            warn!(%error, "failed to persist snapshot after leasing job");
        }
        let _ = self.append_event(&job_id, "job_started", None).await;
        Some(job_id)
    }

    /// Runs one lease to completion: cancel checks bracket the transcription
    /// call (which happens outside any lock), then the outcome is
    /// classified into a retry, a terminal failure, or success.
    async fn run_job(&self, job_id: JobId) {
        if self.consume_cancel_before_start(&job_id).await {
            return;
        }

        let (audio_path, marker_token, note_id) = {
            let guard = self.state.lock().await;
            let job = &guard.jobs[&job_id];
            (job.audio_path.clone(), job.marker_token.clone(), job.note_id.clone())
        };

        let outcome = self.transcriber.transcribe(&audio_path).await;

        if self.consume_cancel_after_run(&job_id).await {
            self.cleanup_audio(&audio_path).await;
            return;
        }

        match outcome {
            Ok(transcription) => {
                self.finish_success(&job_id, &note_id, &marker_token, transcription.text, transcription.duration_ms)
                    .await;
                self.cleanup_audio(&audio_path).await;
            }
            Err(error) => {
                self.handle_failure(&job_id, &note_id, &marker_token, &audio_path, error).await;
            }
        }
        self.prune_history().await;
    }

    async fn consume_cancel_before_start(&self, job_id: &JobId) -> bool {
        let mut guard = self.state.lock().await;
        let Some(job) = guard.jobs.get_mut(job_id) else {
            return true;
        };
        if !job.cancel_requested {
            return false;
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(self.clock.now_iso());
        job.error_code = Some(JobErrorCode::CancelRequestedBeforeStart);
        job.updated_at = self.clock.now_iso();
        let audio_path = job.audio_path.clone();
        drop(guard);
        self.cleanup_audio(&audio_path).await;
        let _ = self.persist_snapshot().await;
        let _ = self.append_event(job_id, "job_cancelled", None).await;
        self.prune_history().await;
        true
    }

    async fn consume_cancel_after_run(&self, job_id: &JobId) -> bool {
        let mut guard = self.state.lock().await;
        let Some(job) = guard.jobs.get_mut(job_id) else {
            return true;
        };
        if !job.cancel_requested {
            return false;
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(self.clock.now_iso());
        job.error_code = Some(JobErrorCode::CancelRequestedDuringRun);
        job.updated_at = self.clock.now_iso();
        drop(guard);
        let _ = self.persist_snapshot().await;
        let _ = self.append_event(job_id, "job_cancelled", None).await;
        self.prune_history().await;
        true
    }

    async fn finish_success(&self, job_id: &JobId, note_id: &NoteId, marker_token: &str, text: String, duration_ms: u64) {
        let apply_result = self
            .note_service
            .replace_marker(note_id, marker_token, &text)
            .await;

        let mut guard = self.state.lock().await;
        let Some(job) = guard.jobs.get_mut(job_id) else {
            return;
        };
        job.transcript_text = Some(text.clone());
        job.duration_ms = Some(duration_ms);
        job.completed_at = Some(self.clock.now_iso());
        job.updated_at = job.completed_at.unwrap();

        let mut needs_side_file = false;
        match apply_result {
            Ok(MarkerApplyResult::Applied { note_path, revision, .. }) => {
                job.status = JobStatus::Completed;
                job.note_path = Some(note_path);
                job.note_revision = Some(revision);
                job.last_result = Some(MarkerApplyResult::Applied {
                    note_id: note_id.clone(),
                    note_path: job.note_path.clone().unwrap(),
                    revision,
                });
            }
            Ok(MarkerApplyResult::MarkerMissing { note_id, note_path, revision }) => {
                job.status = JobStatus::Orphaned;
                job.error_code = Some(JobErrorCode::MarkerMissing);
                job.error = Some("marker not found in note".to_string());
                job.note_path = Some(note_path.clone());
                job.note_revision = Some(revision);
                job.last_result = Some(MarkerApplyResult::MarkerMissing { note_id, note_path, revision });
            }
            Ok(MarkerApplyResult::NoteDeleted { note_id }) => {
                job.status = JobStatus::Failed;
                job.error_code = Some(JobErrorCode::TargetNoteMissing);
                job.error = Some("target note no longer exists".to_string());
                job.last_result = Some(MarkerApplyResult::NoteDeleted { note_id });
                needs_side_file = true;
            }
            // A `NoteServiceError` here is store/index I/O failing on an
            // already-successful transcript, not the transcriber — narrower
            // than spec §4.3's transient/terminal split and the failure-
            // placeholder splice, both of which only apply to a failed
            // transcription itself. Recorded terminal, no retry attempted.
            Err(error) => {
                job.status = JobStatus::Failed;
                job.error_code = Some(JobErrorCode::TranscriptionError);
                job.error = Some(error.to_string());
            }
        }
        drop(guard);

        // The note is gone and there's no placeholder left to splice into —
        // save the transcript to disk instead of dropping it on the floor.
        if needs_side_file {
            if let Some(side_file) = self.save_orphan_transcript(job_id, &text).await {
                let mut guard = self.state.lock().await;
                if let Some(job) = guard.jobs.get_mut(job_id) {
                    job.transcript_side_file = Some(side_file);
                }
            }
        }

        let _ = self.persist_snapshot().await;
        let _ = self.append_event(job_id, "job_completed", None).await;
    }

    /// Writes a transcript that can no longer be spliced anywhere to a plain
    /// text file beside the snapshot, keyed by job id. Best-effort: a
    /// failure here is logged, not propagated, since the job is already
    /// terminal by the time this runs.
    async fn save_orphan_transcript(&self, job_id: &JobId, text: &str) -> Option<String> {
        let dir = self
            .snapshot_path
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("orphaned-transcripts");
        if let Err(error) = tokio::fs::create_dir_all(&dir).await {
            warn!(%error, "failed to create orphaned-transcripts directory");
            return None;
        }
        let file_path = dir.join(format!("{job_id}.txt"));
        if let Err(error) = tokio::fs::write(&file_path, text).await {
            warn!(%error, "failed to write orphaned transcript side file");
            return None;
        }
        Some(file_path.to_string_lossy().to_string())
    }

    async fn handle_failure(&self, job_id: &JobId, note_id: &NoteId, marker_token: &str, audio_path: &str, error: TranscriberError) {
        let settings = self.current_settings().await;
        let attempts = {
            let guard = self.state.lock().await;
            guard.jobs[job_id].attempts
        };

        if error.is_transient() && attempts <= settings.retry_max {
            let backoff_ms = u64::from(settings.retry_base_ms) * 2u64.saturating_pow(attempts.saturating_sub(1));
            let backoff_secs = backoff_ms.div_ceil(1000).max(1);
            let mut guard = self.state.lock().await;
            if let Some(job) = guard.jobs.get_mut(job_id) {
                job.status = JobStatus::Queued;
                job.available_at = self.clock.now_epoch_secs() + backoff_secs;
                job.error_code = Some(JobErrorCode::TransientError);
                job.error = Some(error.message().to_string());
                job.updated_at = self.clock.now_iso();
                guard.queue.push_back(job_id.clone());
            }
            drop(guard);
            let _ = self.persist_snapshot().await;
            let _ = self
                .append_event(job_id, "job_retry_scheduled", Some(error.message().to_string()))
                .await;
            return;
        }

        self.splice_failure_placeholder(note_id, marker_token, error.message()).await;

        let mut guard = self.state.lock().await;
        if let Some(job) = guard.jobs.get_mut(job_id) {
            job.status = JobStatus::Failed;
            job.error_code = Some(JobErrorCode::TranscriptionError);
            job.error = Some(error.message().to_string());
            job.completed_at = Some(self.clock.now_iso());
            job.updated_at = job.completed_at.unwrap();
        }
        drop(guard);
        self.cleanup_audio(audio_path).await;
        let _ = self.persist_snapshot().await;
        let _ = self
            .append_event(job_id, "job_failed", Some(error.message().to_string()))
            .await;
    }

    /// Best-effort: splices a visible failure placeholder into the note so
    /// the marker doesn't sit unresolved forever. The job is marked failed
    /// regardless of whether the splice itself succeeds.
    async fn splice_failure_placeholder(&self, note_id: &NoteId, marker_token: &str, message: &str) {
        let cleaned: String = message.chars().filter(|c| !c.is_control()).collect();
        let truncated = if cleaned.chars().count() > FAILURE_PLACEHOLDER_MAX_LEN {
            let mut s: String = cleaned.chars().take(FAILURE_PLACEHOLDER_MAX_LEN).collect();
            s.push('\u{2026}');
            s
        } else {
            cleaned
        };
        let placeholder = format!("[Transcription failed: {truncated}]");
        if let Err(error) = self.note_service.replace_marker(note_id, marker_token, &placeholder).await {
            warn!(%error, note_id = %note_id, "failed to splice failure placeholder into note");
        }
    }

    async fn cleanup_audio(&self, audio_path: &str) {
        if let Err(error) = tokio::fs::remove_file(audio_path).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = audio_path, %error, "failed to remove job audio file");
            }
        }
    }

    pub async fn create_job(
        &self,
        note_path: &str,
        marker_token: &str,
        upload: UploadGuard,
        source_filename: String,
        launch_source: String,
    ) -> Result<JobView, JobEngineError> {
        let settings = self.current_settings().await;
        {
            let guard = self.state.lock().await;
            let active = guard.jobs.values().filter(|job| !job.status.is_terminal()).count() as u32;
            if active >= settings.max_queued_jobs {
                return Err(JobEngineError::QueueFull);
            }
        }

        let note = match self.note_service.get_note(note_path).await {
            Ok(note) => note,
            Err(NoteServiceError::NotFound) => return Err(JobEngineError::NoteNotFound),
            Err(other) => return Err(other.into()),
        };

        let audio_path = upload.commit();
        let now_iso = self.clock.now_iso();
        let record = JobRecord {
            id: JobId::generate(),
            status: JobStatus::Queued,
            created_at: now_iso,
            updated_at: now_iso,
            started_at: None,
            completed_at: None,
            available_at: self.clock.now_epoch_secs(),
            attempts: 0,
            restart_requeues: 0,
            note_id: note.note_id.clone(),
            marker_token: marker_token.to_string(),
            audio_path: audio_path.to_string_lossy().to_string(),
            source_filename,
            launch_source,
            transcript_text: None,
            last_result: None,
            duration_ms: None,
            error_code: None,
            error: None,
            cancel_requested: false,
            note_path: Some(note.path.clone()),
            note_revision: Some(note.revision),
            transcript_side_file: None,
        };

        let job_id = record.id.clone();
        {
            let mut guard = self.state.lock().await;
            guard.queue.push_back(job_id.clone());
            guard.jobs.insert(job_id.clone(), record.clone());
        }
        self.persist_snapshot().await?;
        self.append_event(&job_id, "job_created", None).await?;
        self.notify.notify_one();
        self.prune_history().await;

        Ok(JobView::from_record(record, Some(note.path)))
    }

    pub async fn cancel_job(&self, job_id: &JobId) -> Result<JobView, JobEngineError> {
        let mut guard = self.state.lock().await;
        let job = guard.jobs.get(job_id).ok_or(JobEngineError::JobNotFound)?;

        if job.status.is_terminal() {
            return Ok(JobView::from_record(job.clone(), None));
        }

        let view = if matches!(job.status, JobStatus::Queued | JobStatus::Interrupted) {
            let job = guard.jobs.get_mut(job_id).unwrap();
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(self.clock.now_iso());
            job.updated_at = job.completed_at.unwrap();
            let audio_path = job.audio_path.clone();
            guard.queue.retain(|id| id != job_id);
            let snapshot = job.clone();
            drop(guard);
            self.cleanup_audio(&audio_path).await;
            snapshot
        } else {
            let job = guard.jobs.get_mut(job_id).unwrap();
            job.cancel_requested = true;
            job.status = JobStatus::CancelRequested;
            job.updated_at = self.clock.now_iso();
            let snapshot = job.clone();
            drop(guard);
            snapshot
        };

        self.persist_snapshot().await?;
        self.append_event(job_id, "job_cancel_requested", None).await?;
        self.prune_history().await;
        Ok(JobView::from_record(view, None))
    }

    pub async fn resume_job(&self, job_id: &JobId) -> Result<JobView, JobEngineError> {
        let mut guard = self.state.lock().await;
        let job = guard.jobs.get_mut(job_id).ok_or(JobEngineError::JobNotFound)?;
        if job.status != JobStatus::Interrupted {
            return Err(JobEngineError::NotInterrupted);
        }
        job.status = JobStatus::Queued;
        job.available_at = self.clock.now_epoch_secs();
        job.updated_at = self.clock.now_iso();
        let snapshot = job.clone();
        guard.queue.push_back(job_id.clone());
        drop(guard);

        self.persist_snapshot().await?;
        self.append_event(job_id, "job_resumed", None).await?;
        self.notify.notify_one();
        Ok(JobView::from_record(snapshot, None))
    }

    /// Resumes every currently `interrupted` job, the bulk counterpart to
    /// `resume_job` spec.md §4.3 names alongside it.
    pub async fn resume_interrupted(&self) -> Result<Vec<JobView>, JobEngineError> {
        let interrupted_ids: Vec<JobId> = {
            let guard = self.state.lock().await;
            guard
                .jobs
                .values()
                .filter(|job| job.status == JobStatus::Interrupted)
                .map(|job| job.id.clone())
                .collect()
        };
        let mut resumed = Vec::with_capacity(interrupted_ids.len());
        for job_id in interrupted_ids {
            resumed.push(self.resume_job(&job_id).await?);
        }
        Ok(resumed)
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<JobView, JobEngineError> {
        let record = {
            let guard = self.state.lock().await;
            guard.jobs.get(job_id).cloned().ok_or(JobEngineError::JobNotFound)?
        };
        let note_path = self.note_service.resolve_note_path(&record.note_id).await;
        Ok(JobView::from_record(record, note_path))
    }

    pub async fn list_jobs(&self) -> Vec<JobView> {
        let records: Vec<JobRecord> = {
            let guard = self.state.lock().await;
            let mut records: Vec<JobRecord> = guard.jobs.values().cloned().collect();
            records.sort_by_key(|job| std::cmp::Reverse(job.created_at));
            records
        };
        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let note_path = self.note_service.resolve_note_path(&record.note_id).await;
            views.push(JobView::from_record(record, note_path));
        }
        views
    }

    /// Two-pass prune: a TTL cutoff first, then a max-entries cap over
    /// whatever survives, both applied to terminal jobs only — active jobs
    /// are never pruned regardless of age.
    async fn prune_history(&self) {
        let settings = self.current_settings().await;
        let now = self.clock.now_epoch_secs();
        let ttl_secs = settings.history_ttl_secs();

        let mut guard = self.state.lock().await;
        let cutoff_ids: Vec<JobId> = guard
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| {
                // fallback chain: completed_at, then updated_at, then created_at
                let reference = job.completed_at.unwrap_or(job.updated_at);
                let reference_secs = reference.timestamp().max(0) as u64;
                now.saturating_sub(reference_secs) > ttl_secs
            })
            .map(|job| job.id.clone())
            .collect();
        for id in &cutoff_ids {
            guard.jobs.remove(id);
        }

        let mut terminal: Vec<(JobId, DateTime<Utc>)> = guard
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .map(|job| (job.id.clone(), job.completed_at.unwrap_or(job.updated_at)))
            .collect();
        let mut capped_any = false;
        if terminal.len() as u32 > settings.history_max_entries {
            terminal.sort_by_key(|(_, completed_at)| std::cmp::Reverse(*completed_at));
            for (id, _) in terminal.into_iter().skip(settings.history_max_entries as usize) {
                guard.jobs.remove(&id);
                capped_any = true;
            }
        }
        drop(guard);

        if !cutoff_ids.is_empty() || capped_any {
            if let Err(error) = self.persist_snapshot().await {
                warn!(%error, "failed to persist snapshot after history pruning");
            }
        }
    }

    async fn persist_snapshot(&self) -> Result<(), JobEngineError> {
        let guard = self.state.lock().await;
        let snapshot = EngineSnapshot {
            version: 1,
            jobs: guard.jobs.clone(),
        };
        drop(guard);
        persistence::atomic_write_json(&self.snapshot_path, &snapshot).await?;
        Ok(())
    }

    async fn append_event(&self, job_id: &JobId, kind: &str, detail: Option<String>) -> Result<(), JobEngineError> {
        let queue_depth = self.state.lock().await.queue.len();
        let event = JobEvent {
            job_id: job_id.clone(),
            at: self.clock.now_iso(),
            kind: kind.to_string(),
            detail,
            queue_depth,
        };
        persistence::append_jsonl_line(&self.event_log_path, &event).await?;
        info!(job_id = %job_id, kind, "job event");
        Ok(())
    }
}

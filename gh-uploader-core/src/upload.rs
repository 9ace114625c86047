//! Upload orchestration: walks the file selection and drives each unit through
//! lookup → change detection → write.
//!
//! A run is a lazy, finite sequence of [`UploadEvent`]s. Nothing happens until
//! the host asks for the next event; each request advances the run by at most
//! one unit, awaiting every remote call before starting the next one.
//!
//! # Major Types
//! - [`UploadRun`]: the state machine (`Idle -> Running -> Completed | Aborted`)
//! - [`upload_files`]: one-shot entrypoint that drains a run into a [`RunReport`]
//!
//! # Units
//! Files larger than [`UploadOptions::split_threshold`] are replaced by their
//! chunks (see [`crate::split`]); every chunk is then its own unit. Chunks are
//! looked up so an existing chunk is overwritten with its current `sha`, but
//! their content is only compared when [`UploadOptions::compare_chunks`] is set.
//!
//! # Error Handling
//! Lookup, fetch and write failures end that unit as `failed` and the run moves
//! on. A failure producing the next file from the selection aborts the run with
//! a single [`UploadEvent::Aborted`].

use std::collections::VecDeque;

use futures::stream::{self, Stream};
use tracing::{debug, error, info, warn};

use crate::change::has_changed;
use crate::config::{UploadOptions, UploadTarget};
use crate::contract::{LocalFileUnit, RemoteRepository, UploadError};
use crate::executor;
use crate::lookup::lookup_remote;
use crate::progress::{ProgressState, RunReport, RunState, StatusEvent, UnitOutcome, UploadEvent};
use crate::split::chunk_units;

type FileSelection<'a> =
    Box<dyn ExactSizeIterator<Item = Result<LocalFileUnit, UploadError>> + Send + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    WholeFile,
    Chunk,
}

struct PendingUnit {
    unit: LocalFileUnit,
    kind: UnitKind,
}

/// One upload run over a file selection.
pub struct UploadRun<'a, R: RemoteRepository + ?Sized> {
    target: UploadTarget,
    options: UploadOptions,
    remote: &'a R,
    files: FileSelection<'a>,
    pending: VecDeque<PendingUnit>,
    queued: VecDeque<UploadEvent>,
    progress: ProgressState,
    state: RunState,
    statuses: Vec<StatusEvent>,
    abort_detail: Option<String>,
}

impl<'a, R> UploadRun<'a, R>
where
    R: RemoteRepository + ?Sized,
{
    /// Prepare a run. Files are pulled from `files` one at a time, in order.
    pub fn new<I>(
        target: UploadTarget,
        options: UploadOptions,
        remote: &'a R,
        files: I,
    ) -> Result<Self, UploadError>
    where
        I: IntoIterator<Item = Result<LocalFileUnit, UploadError>>,
        I::IntoIter: ExactSizeIterator + Send + 'a,
    {
        options.validate()?;
        let files = files.into_iter();
        let progress = ProgressState::new(files.len());
        Ok(Self {
            target,
            options,
            remote,
            files: Box::new(files),
            pending: VecDeque::new(),
            queued: VecDeque::new(),
            progress,
            state: RunState::Idle,
            statuses: Vec::new(),
            abort_detail: None,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    /// Advance the run until it has something to report.
    ///
    /// Returns `None` once the completion or abort event has been handed out.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            match self.state {
                RunState::Completed | RunState::Aborted => return None,
                RunState::Idle => {
                    info!(
                        repo = %self.target.display_name(),
                        files = self.progress.total_units,
                        "[UPLOAD] Starting upload run"
                    );
                    self.state = RunState::Running;
                }
                RunState::Running => self.step().await,
            }
        }
    }

    /// Consume the run as a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = UploadEvent> + 'a {
        stream::unfold(self, |mut run| async move {
            run.next_event().await.map(|event| (event, run))
        })
    }

    /// Drive the run to its end, handing every event to `sink`.
    pub async fn run_to_end<F>(mut self, mut sink: F) -> RunReport
    where
        F: FnMut(&UploadEvent),
    {
        while let Some(event) = self.next_event().await {
            sink(&event);
        }
        self.report()
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            state: self.state,
            progress: self.progress,
            statuses: self.statuses.clone(),
            abort_detail: self.abort_detail.clone(),
        }
    }

    async fn step(&mut self) {
        if let Some(pending) = self.pending.pop_front() {
            let outcome =
                process_unit(self.remote, &self.target, &self.options, &pending).await;
            self.record(pending.unit.name(), outcome);
            return;
        }
        match self.files.next() {
            Some(Ok(file)) => self.admit(file),
            Some(Err(e)) => self.abort(e),
            None => self.finish(),
        }
    }

    fn admit(&mut self, file: LocalFileUnit) {
        if file.size() > self.options.split_threshold {
            let chunks = chunk_units(&file, self.options.chunk_size);
            self.progress.expand_unit(chunks.len());
            debug!(
                file = %file.name(),
                total_units = self.progress.total_units,
                "[UPLOAD] Progress total grown by split"
            );
            self.pending.extend(chunks.into_iter().map(|unit| PendingUnit {
                unit,
                kind: UnitKind::Chunk,
            }));
        } else {
            self.pending.push_back(PendingUnit {
                unit: file,
                kind: UnitKind::WholeFile,
            });
        }
    }

    fn record(&mut self, unit_name: &str, outcome: UnitOutcome) {
        self.progress.complete_unit();
        let status = StatusEvent {
            unit_name: unit_name.to_string(),
            outcome,
        };
        match &status.outcome {
            UnitOutcome::Failed(detail) => {
                warn!(unit = %unit_name, detail = %detail, "[UPLOAD] Unit failed")
            }
            other => info!(unit = %unit_name, outcome = other.label(), "[UPLOAD] Unit finished"),
        }
        match serde_json::to_string(&status) {
            Ok(json) => debug!(json = %json, "[UPLOAD][DEBUG] Status event as JSON"),
            Err(e) => error!(error = ?e, "[UPLOAD][DEBUG] Failed to serialize status event"),
        }
        self.statuses.push(status.clone());
        self.queued.push_back(UploadEvent::Status(status));
        self.queued.push_back(UploadEvent::Progress(self.progress));
    }

    fn abort(&mut self, e: UploadError) {
        error!(error = %e, completed = self.progress.completed_units, "[UPLOAD][ERROR] Run aborted");
        let detail = e.to_string();
        self.state = RunState::Aborted;
        self.pending.clear();
        self.abort_detail = Some(detail.clone());
        self.queued.push_back(UploadEvent::Aborted { detail });
    }

    fn finish(&mut self) {
        info!(
            completed = self.progress.completed_units,
            total = self.progress.total_units,
            "[UPLOAD] Upload run completed"
        );
        self.state = RunState::Completed;
        self.queued.push_back(UploadEvent::Completed(self.progress));
    }
}

async fn process_unit<R>(
    remote: &R,
    target: &UploadTarget,
    options: &UploadOptions,
    pending: &PendingUnit,
) -> UnitOutcome
where
    R: RemoteRepository + ?Sized,
{
    let unit = &pending.unit;
    let compare = match pending.kind {
        UnitKind::WholeFile => true,
        UnitKind::Chunk => options.compare_chunks,
    };
    info!(unit = %unit.name(), size = unit.size(), kind = ?pending.kind, "[UPLOAD] Processing unit");

    let prior = match lookup_remote(remote, target, unit.name(), compare).await {
        Ok(prior) => prior,
        Err(e) => return UnitOutcome::Failed(e.to_string()),
    };

    if compare {
        let remote_content = prior.as_ref().and_then(|r| r.decoded_content.as_deref());
        if !has_changed(unit.content(), remote_content) {
            info!(unit = %unit.name(), "[UPLOAD] No changes detected, skipping");
            return UnitOutcome::Skipped;
        }
    }

    executor::upload(remote, target, unit.name(), unit.content(), prior.as_ref()).await
}

/// Upload `files` to `target` one unit at a time and return the run report.
///
/// `on_event` sees every status, progress and terminal event as it happens.
pub async fn upload_files<'a, R, I, F>(
    target: UploadTarget,
    options: UploadOptions,
    remote: &'a R,
    files: I,
    on_event: F,
) -> Result<RunReport, UploadError>
where
    R: RemoteRepository + ?Sized,
    I: IntoIterator<Item = Result<LocalFileUnit, UploadError>>,
    I::IntoIter: ExactSizeIterator + Send + 'a,
    F: FnMut(&UploadEvent),
{
    let run = UploadRun::new(target, options, remote, files)?;
    Ok(run.run_to_end(on_event).await)
}

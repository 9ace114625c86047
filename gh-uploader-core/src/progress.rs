//! Status events, progress accounting and the run report.

use serde::Serialize;
use std::fmt;

/// Terminal outcome of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum UnitOutcome {
    Uploaded,
    /// Remote already holds identical content.
    Skipped,
    Failed(String),
}

impl UnitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UnitOutcome::Uploaded => "uploaded",
            UnitOutcome::Skipped => "skipped",
            UnitOutcome::Failed(_) => "failed",
        }
    }
}

/// Emitted once per unit, in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub unit_name: String,
    pub outcome: UnitOutcome,
}

impl StatusEvent {
    pub fn detail(&self) -> Option<&str> {
        match &self.outcome {
            UnitOutcome::Failed(detail) => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            UnitOutcome::Uploaded => write!(f, "Uploaded: {}", self.unit_name),
            UnitOutcome::Skipped => write!(
                f,
                "No changes detected for {}. Skipping upload.",
                self.unit_name
            ),
            UnitOutcome::Failed(detail) => {
                write!(f, "Failed to upload {}: {}", self.unit_name, detail)
            }
        }
    }
}

/// Completed versus known units.
///
/// `total_units` starts at the number of selected files and grows by
/// `chunks - 1` whenever a file turns out to need splitting.
/// `completed_units` only ever increases and never passes `total_units`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressState {
    pub total_units: usize,
    pub completed_units: usize,
}

impl ProgressState {
    pub fn new(total_units: usize) -> Self {
        Self {
            total_units,
            completed_units: 0,
        }
    }

    /// Replace one announced unit by `parts` units.
    pub(crate) fn expand_unit(&mut self, parts: usize) {
        self.total_units = self.total_units + parts - 1;
    }

    pub(crate) fn complete_unit(&mut self) {
        debug_assert!(self.completed_units < self.total_units);
        self.completed_units = (self.completed_units + 1).min(self.total_units);
    }

    /// Completion ratio in whole percent, 0 to 100. An empty run is complete.
    pub fn percent(&self) -> u8 {
        if self.total_units == 0 {
            return 100;
        }
        ((self.completed_units * 100 + self.total_units / 2) / self.total_units) as u8
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Everything a run reports to its host, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UploadEvent {
    Status(StatusEvent),
    Progress(ProgressState),
    /// Last event of a run that processed every unit.
    Completed(ProgressState),
    /// Last event of a run stopped by a run-level error.
    Aborted { detail: String },
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub progress: ProgressState,
    pub statuses: Vec<StatusEvent>,
    pub abort_detail: Option<String>,
}

impl RunReport {
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Uploaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed(_)))
    }

    /// Completed without an abort and without a failed unit.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed && self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.statuses.iter().filter(|s| pred(&s.outcome)).count()
    }
}

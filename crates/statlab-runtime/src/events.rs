#![forbid(unsafe_code)]

//! Consumer-observable session events.
//!
//! Components push events into the [`RuntimeContext`](crate::RuntimeContext)
//! queue as they happen; the host drains them in emission order. Preview
//! and commit are separate variants so a host can count a completed drag as
//! one interaction while still redrawing on every preview.

use statlab_core::{Sample, SampleId};

/// Something the host widget may react to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum SessionEvent {
    /// One trial was recorded.
    TrialCompleted { sample: Sample },
    /// A batch run finished all its steps.
    BatchCompleted { count: u64 },
    /// A run ended early: explicit stop, or an auto run reached its target.
    RunStopped { completed: u64 },
    /// The trial generator failed and the run was aborted.
    RunFailed { message: String },
    /// Intermediate drag value.
    DragPreview { id: SampleId, value: f64 },
    /// Final drag value on pointer up or cancel.
    DragCommitted { id: SampleId, value: f64 },
    /// The session was reset.
    Reset,
}

impl SessionEvent {
    /// Short kebab-case name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrialCompleted { .. } => "trial-completed",
            Self::BatchCompleted { .. } => "batch-completed",
            Self::RunStopped { .. } => "run-stopped",
            Self::RunFailed { .. } => "run-failed",
            Self::DragPreview { .. } => "drag-preview",
            Self::DragCommitted { .. } => "drag-committed",
            Self::Reset => "reset",
        }
    }

    /// Whether this event changed sample data.
    #[must_use]
    pub fn touches_data(&self) -> bool {
        matches!(
            self,
            Self::TrialCompleted { .. }
                | Self::DragPreview { .. }
                | Self::DragCommitted { .. }
                | Self::Reset
        )
    }
}

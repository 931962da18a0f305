#![forbid(unsafe_code)]

//! Pointer drag of individual samples, with hover mutual exclusion.
//!
//! [`DragController`] turns pointer-down / move / up / cancel sequences into
//! in-place sample edits. Moves produce `DragPreview` events; the end of a
//! gesture produces exactly one `DragCommitted`.
//!
//! # State Machine
//!
//! ```text
//!   idle ──pointer_down(live id)──▶ dragging
//!   dragging ──pointer_move──▶ dragging        (edit + preview if value changed)
//!   dragging ──pointer_up / pointer_cancel──▶ idle   (commit)
//!   dragging ──sample evicted──▶ idle          (silent, no commit)
//! ```
//!
//! # Invariants
//!
//! 1. Every value written by a move lies inside the scale's domain.
//! 2. An edit is issued only when the value differs from the last emitted
//!    one, so a stationary pointer produces no events.
//! 3. While dragging, hover feedback is suppressed for every element and the
//!    current hover is cleared.
//! 4. At most one gesture is active; a second `pointer_down` is ignored.
//!
//! # Failure Modes
//!
//! - The dragged sample was evicted by a running simulation: the gesture
//!   ends as a no-op. This race is expected and only logged at trace level.
//! - Non-finite pointer coordinates: the move is ignored.

use statlab_core::{Axis, EditOutcome, LinearScale, Point, SampleBuffer, SampleId};
use statlab_runtime::{RuntimeContext, SessionEvent, SimulationSession};

// ---------------------------------------------------------------------------
// Edit target
// ---------------------------------------------------------------------------

/// Something whose samples a drag may rewrite.
pub trait EditTarget {
    /// Current value of `id`, if present.
    fn value_of(&self, id: SampleId) -> Option<f64>;
    /// Rewrite `id` to `value`.
    fn edit(&mut self, id: SampleId, value: f64) -> EditOutcome;
}

impl EditTarget for SampleBuffer {
    fn value_of(&self, id: SampleId) -> Option<f64> {
        self.get(id).map(|s| s.value)
    }

    fn edit(&mut self, id: SampleId, value: f64) -> EditOutcome {
        SampleBuffer::edit(self, id, value)
    }
}

impl EditTarget for SimulationSession {
    fn value_of(&self, id: SampleId) -> Option<f64> {
        self.buffer().get(id).map(|s| s.value)
    }

    fn edit(&mut self, id: SampleId, value: f64) -> EditOutcome {
        SimulationSession::edit(self, id, value)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Drag behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    /// Screen axis the scale runs along (default: horizontal).
    pub axis: Axis,
    /// Round values to the nearest multiple of this step before clamping
    /// (default: none).
    pub snap: Option<f64>,
    /// Restore the starting value on pointer cancel (default: true).
    pub revert_on_cancel: bool,
    /// Move by the pointer's offset from where the drag started instead of
    /// jumping to the pointer (default: false).
    pub relative: bool,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            axis: Axis::Horizontal,
            snap: None,
            revert_on_cancel: true,
            relative: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Hover
// ---------------------------------------------------------------------------

/// Hover feedback, suppressed while a drag is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverGate<K> {
    hovered: Option<K>,
    suspended: bool,
}

impl<K> Default for HoverGate<K> {
    fn default() -> Self {
        Self {
            hovered: None,
            suspended: false,
        }
    }
}

impl<K: PartialEq> HoverGate<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer is now over `key` (or nothing). Returns whether hover feedback
    /// is shown for it.
    pub fn hover(&mut self, key: Option<K>) -> bool {
        if self.suspended {
            return false;
        }
        self.hovered = key;
        self.hovered.is_some()
    }

    /// Element currently showing hover feedback.
    #[must_use]
    pub fn hovered(&self) -> Option<&K> {
        self.hovered.as_ref()
    }

    /// Whether `key` shows hover feedback.
    #[must_use]
    pub fn is_hovered(&self, key: &K) -> bool {
        self.hovered.as_ref() == Some(key)
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Clear the hover and ignore hover input until [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.hovered = None;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }
}

// ---------------------------------------------------------------------------
// DragController
// ---------------------------------------------------------------------------

/// The gesture in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    /// Sample being dragged.
    pub id: SampleId,
    /// Pointer coordinate (along the drag axis) at pointer down.
    pub pointer_start: f64,
    /// Sample value at pointer down.
    pub value_at_start: f64,
    /// Last value written.
    pub last_value: f64,
}

/// Result of [`DragController::pointer_move`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragUpdate {
    /// No gesture active.
    Ignored,
    /// Value did not change; nothing was written.
    Unchanged,
    /// The sample now has `value`.
    Preview { id: SampleId, value: f64 },
    /// The sample is gone; the gesture ended without a commit.
    Ended { id: SampleId },
}

/// Drag state machine over an [`EditTarget`].
#[derive(Debug, Clone, Default)]
pub struct DragController {
    config: DragConfig,
    state: Option<DragState>,
    hover: HoverGate<SampleId>,
    commits: u64,
}

impl DragController {
    #[must_use]
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DragConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.state.is_some()
    }

    #[must_use]
    pub fn state(&self) -> Option<&DragState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn active_id(&self) -> Option<SampleId> {
        self.state.map(|s| s.id)
    }

    /// Completed gestures, for interaction counters.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.commits
    }

    #[must_use]
    pub fn hover_gate(&self) -> &HoverGate<SampleId> {
        &self.hover
    }

    /// Pointer is over `id` (or nothing). Returns whether hover feedback is
    /// shown; always `false` while dragging.
    pub fn hover(&mut self, id: Option<SampleId>) -> bool {
        self.hover.hover(id)
    }

    /// Start dragging `id`. Returns `false` if a gesture is already active or
    /// the sample is not present.
    pub fn pointer_down<T>(&mut self, id: SampleId, pointer: Point, target: &T) -> bool
    where
        T: EditTarget + ?Sized,
    {
        if self.state.is_some() {
            tracing::trace!(
                target: "statlab.drag",
                %id,
                "pointer down ignored; gesture already active"
            );
            return false;
        }
        let Some(value) = target.value_of(id) else {
            tracing::trace!(target: "statlab.drag", %id, "pointer down on absent sample");
            return false;
        };
        self.state = Some(DragState {
            id,
            pointer_start: pointer.along(self.config.axis),
            value_at_start: value,
            last_value: value,
        });
        self.hover.suspend();
        tracing::debug!(target: "statlab.drag", %id, value, "drag started");
        true
    }

    /// Move the pointer. Writes the clamped domain value when it changed.
    pub fn pointer_move<T>(
        &mut self,
        pointer: Point,
        scale: &LinearScale,
        target: &mut T,
        ctx: &mut RuntimeContext,
    ) -> DragUpdate
    where
        T: EditTarget + ?Sized,
    {
        let Some(state) = self.state else {
            return DragUpdate::Ignored;
        };
        let value = self.value_at(pointer, scale, &state);
        if !value.is_finite() || value == state.last_value {
            return DragUpdate::Unchanged;
        }

        match target.edit(state.id, value) {
            EditOutcome::Applied { .. } | EditOutcome::Unchanged => {
                self.state = Some(DragState {
                    last_value: value,
                    ..state
                });
                ctx.emit(SessionEvent::DragPreview { id: state.id, value });
                DragUpdate::Preview { id: state.id, value }
            }
            EditOutcome::Stale => {
                tracing::trace!(
                    target: "statlab.drag",
                    id = %state.id,
                    "dragged sample evicted; gesture ended"
                );
                self.end();
                DragUpdate::Ended { id: state.id }
            }
            EditOutcome::Rejected => DragUpdate::Unchanged,
        }
    }

    /// Finish the gesture and emit the commit. Returns the committed value,
    /// or `None` if no gesture was active or the sample is gone.
    pub fn pointer_up<T>(&mut self, target: &T, ctx: &mut RuntimeContext) -> Option<(SampleId, f64)>
    where
        T: EditTarget + ?Sized,
    {
        let state = self.state?;
        self.end();
        let value = target.value_of(state.id)?;
        self.commit(state.id, value, ctx);
        Some((state.id, value))
    }

    /// Abort the gesture. Restores the starting value when configured, then
    /// emits the commit.
    pub fn pointer_cancel<T>(
        &mut self,
        target: &mut T,
        ctx: &mut RuntimeContext,
    ) -> Option<(SampleId, f64)>
    where
        T: EditTarget + ?Sized,
    {
        let state = self.state?;
        self.end();
        if self.config.revert_on_cancel
            && state.last_value != state.value_at_start
            && !target.edit(state.id, state.value_at_start).is_live()
        {
            return None;
        }
        let value = target.value_of(state.id)?;
        self.commit(state.id, value, ctx);
        Some((state.id, value))
    }

    /// Drop any gesture without events (reset and teardown path).
    pub fn abort(&mut self) {
        if let Some(state) = self.state {
            tracing::debug!(target: "statlab.drag", id = %state.id, "drag aborted");
        }
        self.end();
    }

    fn end(&mut self) {
        self.state = None;
        self.hover.resume();
    }

    fn commit(&mut self, id: SampleId, value: f64, ctx: &mut RuntimeContext) {
        self.commits += 1;
        tracing::debug!(target: "statlab.drag", %id, value, "drag committed");
        ctx.emit(SessionEvent::DragCommitted { id, value });
    }

    fn value_at(&self, pointer: Point, scale: &LinearScale, state: &DragState) -> f64 {
        let coord = pointer.along(self.config.axis);
        let raw = if self.config.relative {
            state.value_at_start + scale.to_domain(coord) - scale.to_domain(state.pointer_start)
        } else {
            scale.to_domain(coord)
        };
        let snapped = match self.config.snap {
            Some(step) if step > 0.0 => (raw / step).round() * step,
            _ => raw,
        };
        scale.clamp_to_domain(snapped)
    }
}

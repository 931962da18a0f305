#![forbid(unsafe_code)]

//! One interactive simulation widget.
//!
//! [`SimulationWidget`] wires the components together for a host UI: the
//! scheduler and its session, the runtime context, a scene binder over
//! [`Visual`] marks keyed by [`SampleId`], the drag controller, and the
//! chart scale. The host forwards pointer input, calls
//! [`advance`](SimulationWidget::advance) once per frame, and drains events.
//!
//! # Invariants
//!
//! 1. Rendering happens only inside `advance`, and only when data changed
//!    since the last render. A step never renders halfway.
//! 2. Drag moves update one mark through the binder's preview path; they
//!    never trigger a full reconciliation on their own.
//! 3. After `reset`, no run is active and the lifecycle registry holds no
//!    handles.
//! 4. After `teardown`, nothing can be started and every mark is detached.
//!
//! # Failure Modes
//!
//! - Generator failure during a run: `advance` still renders, then returns
//!   the error. The session keeps its samples and its failure message.
//! - Calls after `teardown`: runs fail with [`LifecycleError::Closed`],
//!   pointer input is ignored.

use std::fmt;
use std::time::Duration;

use statlab_core::{LinearScale, Point, Sample, SampleId, Trial, Visual};
use statlab_runtime::{
    LifecycleError, LifecycleHandle, RunMode, RuntimeContext, SessionEvent, SessionSnapshot,
    SimulationScheduler, SimulationSession, TrialGenerator,
};
use statlab_scene::{DragController, DragUpdate, SceneBinder, SceneRenderer, faded};
use web_time::Instant;

use crate::config::LessonConfig;
use crate::error::{Error, Result};

/// Maps a sample and its buffer index to its mark.
pub type Projection = Box<dyn Fn(&Sample, usize, &LinearScale) -> Visual>;

/// Default projection: a zero-size dot at the sample's value on a strip.
#[must_use]
pub fn dot_strip(sample: &Sample, _index: usize, scale: &LinearScale) -> Visual {
    Visual::new(scale.to_range(sample.value), 0.0, 0.0, 0.0)
}

/// A simulation with live statistics, animated marks and draggable samples.
pub struct SimulationWidget {
    config: LessonConfig,
    ctx: RuntimeContext,
    scheduler: SimulationScheduler,
    binder: SceneBinder<SampleId, Visual>,
    drag: DragController,
    scale: LinearScale,
    projection: Projection,
    dirty: bool,
    torn_down: bool,
}

impl fmt::Debug for SimulationWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationWidget")
            .field("scheduler", &self.scheduler)
            .field("binder", &self.binder)
            .field("drag", &self.drag)
            .field("scale", &self.scale)
            .field("dirty", &self.dirty)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl SimulationWidget {
    /// Build a widget that draws samples with [`dot_strip`].
    pub fn new(config: LessonConfig, generator: impl TrialGenerator + 'static) -> Result<Self> {
        Self::with_projection(config, generator, dot_strip)
    }

    /// Build a widget with a custom sample-to-mark projection.
    pub fn with_projection(
        config: LessonConfig,
        generator: impl TrialGenerator + 'static,
        projection: impl Fn(&Sample, usize, &LinearScale) -> Visual + 'static,
    ) -> Result<Self> {
        let config = config.validated()?;
        let scale = config.to_scale()?;
        let scheduler = SimulationScheduler::new(config.capacity, generator)?;
        let binder = SceneBinder::new(config.to_transition_config())
            .enter_from(faded)
            .exit_to(faded);
        let drag = DragController::new(config.to_drag_config());
        tracing::debug!(target: "statlab.lifecycle", config = %config.to_jsonl(), "widget created");
        Ok(Self {
            config,
            ctx: RuntimeContext::new(),
            scheduler,
            binder,
            drag,
            scale,
            projection: Box::new(projection),
            dirty: true,
            torn_down: false,
        })
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Draw one trial now.
    pub fn step(&mut self) -> Result<Sample> {
        self.ensure_open()?;
        self.dirty = true;
        Ok(self.scheduler.step(&mut self.ctx)?)
    }

    /// Start a batch of the configured size and pacing.
    pub fn start_batch(&mut self, now: Instant) -> Result<Option<LifecycleHandle>> {
        self.start_batch_of(self.config.batch.count, now)
    }

    /// Start a batch of `n` trials at the configured pacing.
    pub fn start_batch_of(&mut self, n: u64, now: Instant) -> Result<Option<LifecycleHandle>> {
        let interval = self.config.batch_interval();
        Ok(self.scheduler.start_batch(&mut self.ctx, n, interval, now)?)
    }

    /// Start an auto run toward the configured target.
    pub fn start_auto(&mut self, now: Instant) -> Result<Option<LifecycleHandle>> {
        self.start_auto_until(self.config.auto.target, now)
    }

    /// Start an auto run that stops at `target` trials, or never.
    pub fn start_auto_until(
        &mut self,
        target: Option<u64>,
        now: Instant,
    ) -> Result<Option<LifecycleHandle>> {
        let interval = self.config.auto_interval();
        Ok(self.scheduler.start_auto(&mut self.ctx, interval, target, now)?)
    }

    /// Stop any run. Returns whether one was active.
    pub fn stop(&mut self) -> bool {
        self.scheduler.stop(&mut self.ctx)
    }

    /// Stop, clear, and cancel everything in flight.
    ///
    /// Marks snap to their final state; the next `advance` animates them out.
    pub fn reset<R>(&mut self, now: Instant, renderer: &mut R)
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        self.drag.abort();
        self.scheduler.reset(&mut self.ctx);
        let cancelled = self.ctx.lifecycle.cancel_all();
        self.binder.finish_now(now, renderer, &mut self.ctx.lifecycle);
        self.dirty = true;
        tracing::debug!(target: "statlab.lifecycle", cancelled, "widget reset");
    }

    /// Deliver due timers, render if data changed, and step transitions.
    ///
    /// Returns whether the host should schedule another frame.
    pub fn advance<R>(&mut self, now: Instant, renderer: &mut R) -> Result<bool>
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        if self.torn_down {
            return Ok(false);
        }
        let mut failure = None;
        while let Some(id) = self.ctx.timers.pop_due(now) {
            match self.scheduler.on_timer(&mut self.ctx, id) {
                Ok(fired) => self.dirty |= fired,
                Err(err) => {
                    self.dirty = true;
                    failure.get_or_insert(err);
                }
            }
        }
        if self.dirty {
            self.render(now, renderer);
        }
        let animating = self.binder.advance(now, renderer, &mut self.ctx.lifecycle);
        if let Some(err) = failure {
            return Err(err.into());
        }
        Ok(animating || self.binder.has_pending() || self.scheduler.mode().is_running())
    }

    /// Replace every sample at once (distribution regeneration).
    pub fn replace_samples(&mut self, trials: impl IntoIterator<Item = Trial>) -> Vec<SampleId> {
        self.drag.abort();
        self.dirty = true;
        self.scheduler.session_mut().replace_all(trials)
    }

    /// Add a user-placed sample. Returns `None` for a non-finite value.
    pub fn insert_sample(&mut self, trial: Trial) -> Option<Sample> {
        let sample = self.scheduler.session_mut().insert(trial)?;
        self.dirty = true;
        Some(sample)
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    /// Start dragging the mark under `point`, if any.
    pub fn pointer_down_at(&mut self, point: Point) -> Option<SampleId> {
        if self.torn_down {
            return None;
        }
        let id = self.binder.hit_test(point, self.config.hit_radius)?;
        self.drag
            .pointer_down(id, point, self.scheduler.session())
            .then_some(id)
    }

    /// Move the pointer during a drag.
    pub fn pointer_move<R>(&mut self, point: Point, renderer: &mut R) -> DragUpdate
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        let update = self.drag.pointer_move(
            point,
            &self.scale,
            self.scheduler.session_mut(),
            &mut self.ctx,
        );
        match update {
            DragUpdate::Preview { id, .. } => self.preview(id, renderer),
            DragUpdate::Ended { .. } => self.dirty = true,
            DragUpdate::Ignored | DragUpdate::Unchanged => {}
        }
        update
    }

    /// Release the pointer. Returns the committed sample and value.
    pub fn pointer_up(&mut self) -> Option<(SampleId, f64)> {
        let committed = self.drag.pointer_up(self.scheduler.session(), &mut self.ctx);
        self.dirty |= committed.is_some();
        committed
    }

    /// Abort the drag, restoring the starting value when configured.
    pub fn pointer_cancel<R>(&mut self, renderer: &mut R) -> Option<(SampleId, f64)>
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        let committed = self
            .drag
            .pointer_cancel(self.scheduler.session_mut(), &mut self.ctx);
        if let Some((id, _)) = committed {
            self.preview(id, renderer);
        }
        committed
    }

    /// Pointer hovers at `point`. Returns the mark showing hover feedback.
    pub fn hover_at(&mut self, point: Point) -> Option<SampleId> {
        let hit = self.binder.hit_test(point, self.config.hit_radius);
        if self.drag.hover(hit) { hit } else { None }
    }

    // -----------------------------------------------------------------------
    // Scale
    // -----------------------------------------------------------------------

    /// Resize: map the same domain onto a new range. Re-renders on the next
    /// `advance`.
    pub fn set_range(&mut self, range: (f64, f64)) -> Result<()> {
        self.scale = self.scale.with_range(range)?;
        self.dirty = true;
        Ok(())
    }

    /// Replace the data domain.
    pub fn set_domain(&mut self, domain: (f64, f64)) -> Result<()> {
        self.scale = self.scale.with_domain(domain)?;
        self.dirty = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifetime
    // -----------------------------------------------------------------------

    /// Cancel everything, detach every mark, and close the widget.
    ///
    /// Returns how many activities were cancelled. Idempotent.
    pub fn teardown<R>(&mut self, renderer: &mut R) -> usize
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        if self.torn_down {
            return 0;
        }
        self.drag.abort();
        let cancelled = self.ctx.lifecycle.teardown();
        self.scheduler.sync(&mut self.ctx);
        self.binder.detach_all(renderer, &mut self.ctx.lifecycle);
        self.torn_down = true;
        tracing::debug!(target: "statlab.lifecycle", cancelled, "widget torn down");
        cancelled
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.ctx.drain_events()
    }

    /// Counters and statistics for host persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.scheduler.snapshot()
    }

    #[must_use]
    pub fn session(&self) -> &SimulationSession {
        self.scheduler.session()
    }

    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.scheduler.mode()
    }

    #[must_use]
    pub fn config(&self) -> &LessonConfig {
        &self.config
    }

    #[must_use]
    pub fn scale(&self) -> &LinearScale {
        &self.scale
    }

    #[must_use]
    pub fn binder(&self) -> &SceneBinder<SampleId, Visual> {
        &self.binder
    }

    #[must_use]
    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Timers, lifecycle registry and event queue.
    #[must_use]
    pub fn context(&self) -> &RuntimeContext {
        &self.ctx
    }

    /// When the host next needs to call `advance` for a timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.ctx.next_deadline()
    }

    /// Time until the next timer, saturating at zero.
    #[must_use]
    pub fn time_to_deadline(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|due| due.saturating_duration_since(now))
    }

    /// Whether data changed since the last render.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_open(&self) -> Result<()> {
        if self.torn_down {
            return Err(Error::Lifecycle(LifecycleError::Closed));
        }
        Ok(())
    }

    fn render<R>(&mut self, now: Instant, renderer: &mut R)
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        let projection = &self.projection;
        let scale = &self.scale;
        let items: Vec<(SampleId, Visual)> = self
            .scheduler
            .session()
            .buffer()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, projection(s, i, scale)))
            .collect();
        self.binder
            .reconcile(items, renderer, &mut self.ctx.lifecycle, now);
        self.dirty = false;
    }

    fn preview<R>(&mut self, id: SampleId, renderer: &mut R)
    where
        R: SceneRenderer<SampleId, Visual> + ?Sized,
    {
        let buffer = self.scheduler.session().buffer();
        let Some((index, sample)) = buffer.iter().enumerate().find(|(_, s)| s.id == id) else {
            return;
        };
        let props = (self.projection)(sample, index, &self.scale);
        if !self.binder.preview(&id, props, renderer) {
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statlab_runtime::GeneratorError;

    struct Null;

    impl SceneRenderer<SampleId, Visual> for Null {
        fn create(&mut self, _: &SampleId, _: &Visual) {}
        fn update(&mut self, _: &SampleId, _: &Visual) {}
        fn remove(&mut self, _: &SampleId) {}
    }

    fn widget() -> SimulationWidget {
        let mut n = 0.0;
        SimulationWidget::new(LessonConfig::default(), move || {
            n += 1.0;
            Ok(Trial::new(n, true))
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LessonConfig {
            capacity: 0,
            ..LessonConfig::default()
        };
        let err = SimulationWidget::new(config, || Ok(Trial::new(1.0, true))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn step_marks_dirty_and_advance_renders() {
        let t0 = Instant::now();
        let mut w = widget();
        w.advance(t0, &mut Null).unwrap();
        assert!(!w.is_dirty());
        w.step().unwrap();
        assert!(w.is_dirty());
        w.advance(t0, &mut Null).unwrap();
        assert!(!w.is_dirty());
        assert_eq!(w.binder().len(), 1);
    }

    #[test]
    fn generator_failure_surfaces_from_advance() {
        let t0 = Instant::now();
        let mut w = SimulationWidget::new(LessonConfig::default(), || {
            Err(GeneratorError::failed("rng exhausted"))
        })
        .unwrap();
        w.start_batch(t0).unwrap();
        let err = w.advance(t0 + Duration::from_millis(100), &mut Null).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(w.mode(), RunMode::Idle);
        assert!(w.session().failure().is_some());
    }

    #[test]
    fn teardown_closes_widget() {
        let t0 = Instant::now();
        let mut w = widget();
        w.start_auto(t0).unwrap();
        assert_eq!(w.teardown(&mut Null), 1);
        assert_eq!(w.mode(), RunMode::Idle);
        assert!(w.step().is_err());
        assert!(matches!(w.start_batch(t0), Err(Error::Lifecycle(_))));
        assert_eq!(w.teardown(&mut Null), 0);
        assert!(!w.advance(t0, &mut Null).unwrap());
    }

    #[test]
    fn set_range_rerenders() {
        let t0 = Instant::now();
        let mut w = widget();
        w.insert_sample(Trial::new(5.0, false));
        w.advance(t0, &mut Null).unwrap();
        w.set_range((0.0, 800.0)).unwrap();
        assert!(w.is_dirty());
        assert!(w.set_range((3.0, 3.0)).is_err());
    }
}

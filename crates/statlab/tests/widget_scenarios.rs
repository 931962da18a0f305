//! End-to-end widget scenarios on a simulated clock.
//!
//! The host loop is `advance(now)` with hand-picked instants, and the
//! renderer mirrors the marks it was told about so tests can check what a
//! learner would actually see.

use std::collections::BTreeMap;
use std::time::Duration;

use statlab::prelude::*;
use statlab::{DragUpdate, GeneratorError, RunMode};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Renderer that keeps the live marks.
#[derive(Default)]
struct Mirror {
    marks: BTreeMap<SampleId, Visual>,
    violations: usize,
}

impl SceneRenderer<SampleId, Visual> for Mirror {
    fn create(&mut self, key: &SampleId, props: &Visual) {
        if self.marks.insert(*key, *props).is_some() {
            self.violations += 1;
        }
    }

    fn update(&mut self, key: &SampleId, props: &Visual) {
        match self.marks.get_mut(key) {
            Some(mark) => *mark = *props,
            None => self.violations += 1,
        }
    }

    fn remove(&mut self, key: &SampleId) {
        if self.marks.remove(key).is_none() {
            self.violations += 1;
        }
    }
}

fn counting() -> impl TrialGenerator + 'static {
    let mut n = 0.0;
    move || {
        n += 1.0;
        Ok(Trial::new(n, n > 2.0))
    }
}

struct Harness {
    t0: Instant,
    widget: SimulationWidget,
    mirror: Mirror,
}

impl Harness {
    fn new(config: LessonConfig) -> Self {
        Self {
            t0: Instant::now(),
            widget: SimulationWidget::new(config, counting()).unwrap(),
            mirror: Mirror::default(),
        }
    }

    fn at(&self, offset_ms: u64) -> Instant {
        self.t0 + ms(offset_ms)
    }

    fn advance_to(&mut self, offset_ms: u64) -> Result<bool> {
        let now = self.at(offset_ms);
        self.widget.advance(now, &mut self.mirror)
    }
}

fn fast_batches() -> LessonConfig {
    let mut config = LessonConfig::default();
    config.batch.interval_ms = 10;
    config
}

fn wide_scale() -> LessonConfig {
    let mut config = LessonConfig::default();
    config.capacity = 5;
    config.scale.domain = (0.0, 40.0);
    config.scale.range = (0.0, 400.0);
    config
}

// ═══════════════════════════════════════════════════════════════════════
// Buffer and drag
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn eviction_then_drag_edit_updates_mean() {
    let mut h = Harness::new(wide_scale());
    for v in 1..=6 {
        h.widget.insert_sample(Trial::new(f64::from(v), false));
    }
    let values: Vec<f64> = h.widget.session().buffer().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(h.widget.snapshot().stats.mean, Some(4.0));

    h.advance_to(0).unwrap();
    let three = h.widget.pointer_down_at(Point::new(30.0, 0.0)).unwrap();
    assert_eq!(h.widget.session().buffer().get(three).map(|s| s.value), Some(3.0));

    let update = h.widget.pointer_move(Point::new(300.0, 0.0), &mut h.mirror);
    assert_eq!(update, DragUpdate::Preview { id: three, value: 30.0 });
    assert_eq!(h.mirror.marks.get(&three).map(|m| m.x), Some(300.0));

    let mean = h.widget.snapshot().stats.mean.unwrap();
    assert!((mean - 9.4).abs() < 1e-12, "mean = {mean}");

    assert_eq!(h.widget.pointer_up(), Some((three, 30.0)));
    let names: Vec<&str> = h.widget.drain_events().iter().map(SessionEvent::name).collect();
    assert_eq!(names, vec!["drag-preview", "drag-committed"]);
}

#[test]
fn drag_outside_range_clamps_to_domain() {
    let mut h = Harness::new(wide_scale());
    let id = h.widget.insert_sample(Trial::new(10.0, false)).unwrap().id;
    h.advance_to(0).unwrap();
    assert_eq!(h.widget.pointer_down_at(Point::new(100.0, 0.0)), Some(id));

    h.widget.pointer_move(Point::new(9_000.0, 0.0), &mut h.mirror);
    assert_eq!(h.widget.session().buffer().get(id).map(|s| s.value), Some(40.0));
    h.widget.pointer_move(Point::new(-9_000.0, 0.0), &mut h.mirror);
    assert_eq!(h.widget.session().buffer().get(id).map(|s| s.value), Some(0.0));
}

#[test]
fn held_drag_survives_queued_pass() {
    let mut h = Harness::new(wide_scale());
    let id = h.widget.insert_sample(Trial::new(10.0, false)).unwrap().id;
    h.advance_to(0).unwrap();
    h.widget.insert_sample(Trial::new(20.0, false));
    h.advance_to(10).unwrap();

    assert_eq!(h.widget.pointer_down_at(Point::new(100.0, 0.0)), Some(id));
    let update = h.widget.pointer_move(Point::new(300.0, 0.0), &mut h.mirror);
    assert_eq!(update, DragUpdate::Preview { id, value: 30.0 });

    // Pointer still held while every queued pass drains.
    for t in (500..=4_000).step_by(500) {
        h.advance_to(t).unwrap();
    }
    assert!(h.widget.drag().is_dragging());
    assert_eq!(h.widget.session().buffer().get(id).map(|s| s.value), Some(30.0));
    assert_eq!(h.mirror.marks.get(&id).map(|m| m.x), Some(300.0));
    assert_eq!(h.mirror.violations, 0);
}

#[test]
fn drag_of_evicted_sample_ends_quietly() {
    let mut config = wide_scale();
    config.capacity = 2;
    let mut h = Harness::new(config);
    let first = h.widget.insert_sample(Trial::new(5.0, false)).unwrap().id;
    h.advance_to(0).unwrap();
    assert_eq!(h.widget.pointer_down_at(Point::new(50.0, 0.0)), Some(first));

    h.widget.step().unwrap();
    h.widget.step().unwrap();
    h.widget.drain_events();

    let update = h.widget.pointer_move(Point::new(200.0, 0.0), &mut h.mirror);
    assert_eq!(update, DragUpdate::Ended { id: first });
    assert!(!h.widget.drag().is_dragging());
    assert_eq!(h.widget.pointer_up(), None);
    assert!(h.widget.drain_events().is_empty());
}

#[test]
fn hover_suppressed_while_dragging() {
    let mut h = Harness::new(wide_scale());
    let a = h.widget.insert_sample(Trial::new(10.0, false)).unwrap().id;
    let b = h.widget.insert_sample(Trial::new(30.0, false)).unwrap().id;
    h.advance_to(0).unwrap();

    assert_eq!(h.widget.hover_at(Point::new(300.0, 0.0)), Some(b));
    h.widget.pointer_down_at(Point::new(100.0, 0.0));
    assert_eq!(h.widget.hover_at(Point::new(300.0, 0.0)), None);
    assert_eq!(h.widget.drag().active_id(), Some(a));

    h.widget.pointer_cancel(&mut h.mirror);
    assert_eq!(h.widget.hover_at(Point::new(300.0, 0.0)), Some(b));
}

// ═══════════════════════════════════════════════════════════════════════
// Runs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn batch_of_three_done_by_50ms() {
    let mut h = Harness::new(fast_batches());
    let now = h.at(0);
    h.widget.start_batch_of(3, now).unwrap();
    h.advance_to(50).unwrap();
    assert_eq!(h.widget.session().trials_completed(), 3);
    assert_eq!(h.widget.mode(), RunMode::Idle);
    assert_eq!(h.mirror.marks.len(), 3);
}

#[test]
fn double_start_registers_one_handle() {
    let mut h = Harness::new(fast_batches());
    let now = h.at(0);
    let first = h.widget.start_batch_of(3, now).unwrap();
    let second = h.widget.start_batch_of(3, now).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.widget.context().lifecycle.outstanding(), 1);
    assert_eq!(h.widget.context().timers.live(), 1);
}

#[test]
fn stop_freezes_count_past_schedule() {
    for k in 1..10u64 {
        let mut h = Harness::new(fast_batches());
        let now = h.at(0);
        h.widget.start_batch_of(10, now).unwrap();
        h.advance_to(k * 10).unwrap();
        assert!(h.widget.stop());
        h.advance_to(1_000).unwrap();
        assert_eq!(h.widget.session().trials_completed(), k, "k = {k}");
    }
}

#[test]
fn reset_during_auto_leaves_nothing_running() {
    let mut h = Harness::new(LessonConfig::default());
    let now = h.at(0);
    h.widget.start_auto(now).unwrap();
    h.advance_to(175).unwrap();
    assert_eq!(h.widget.session().trials_completed(), 3);

    let now = h.at(175);
    h.widget.reset(now, &mut h.mirror);
    assert_eq!(h.widget.session().trials_completed(), 0);
    assert_eq!(h.widget.mode(), RunMode::Idle);
    assert_eq!(h.widget.context().lifecycle.outstanding(), 0);

    // Marks animate out, then nothing more happens.
    h.advance_to(200).unwrap();
    h.advance_to(2_000).unwrap();
    assert!(h.mirror.marks.is_empty());
    assert_eq!(h.mirror.violations, 0);
    assert_eq!(h.widget.session().trials_completed(), 0);
    assert!(!h.advance_to(5_000).unwrap());
}

#[test]
fn generator_failure_shows_stopped_state() {
    let t0 = Instant::now();
    let mut calls = 0;
    let mut widget = SimulationWidget::new(fast_batches(), move || {
        calls += 1;
        if calls > 2 {
            Err(GeneratorError::failed("urn is empty"))
        } else {
            Ok(Trial::new(1.0, true))
        }
    })
    .unwrap();
    let mut mirror = Mirror::default();

    widget.start_batch_of(5, t0).unwrap();
    let err = widget.advance(t0 + ms(50), &mut mirror).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(widget.mode(), RunMode::Idle);
    assert_eq!(widget.session().trials_completed(), 2);
    assert_eq!(mirror.marks.len(), 2);

    let snap = widget.snapshot();
    assert!(snap.failure.as_deref().is_some_and(|m| m.contains("urn is empty")));
    assert!(
        widget
            .drain_events()
            .iter()
            .any(|e| matches!(e, SessionEvent::RunFailed { .. }))
    );

    // The user restarts explicitly; the failure clears.
    widget.start_batch_of(1, t0 + ms(50)).unwrap();
    assert!(widget.session().failure().is_none());
}

// ═══════════════════════════════════════════════════════════════════════
// Scene
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn marks_fade_in_to_full_opacity() {
    let mut h = Harness::new(LessonConfig::default());
    let id = h.widget.step().unwrap().id;
    h.advance_to(0).unwrap();
    assert_eq!(h.mirror.marks.get(&id).map(|m| m.opacity), Some(0.0));
    h.advance_to(100).unwrap();
    let mid = h.mirror.marks.get(&id).map(|m| m.opacity).unwrap();
    assert!(mid > 0.0 && mid < 1.0);
    assert!(!h.advance_to(250).unwrap());
    assert_eq!(h.mirror.marks.get(&id).map(|m| m.opacity), Some(1.0));
    assert_eq!(h.widget.context().lifecycle.outstanding(), 0);
}

#[test]
fn resize_moves_marks() {
    let mut h = Harness::new(wide_scale());
    let id = h.widget.insert_sample(Trial::new(20.0, false)).unwrap().id;
    h.advance_to(0).unwrap();
    h.advance_to(1_000).unwrap();
    assert_eq!(h.mirror.marks.get(&id).map(|m| m.x), Some(200.0));

    h.widget.set_range((0.0, 800.0)).unwrap();
    h.advance_to(1_000).unwrap();
    h.advance_to(2_000).unwrap();
    assert_eq!(h.mirror.marks.get(&id).map(|m| m.x), Some(400.0));
}

#[test]
fn replace_samples_rebinds_every_mark() {
    let mut h = Harness::new(wide_scale());
    h.widget.insert_sample(Trial::new(1.0, false));
    h.advance_to(0).unwrap();
    let ids = h
        .widget
        .replace_samples([4.0, 8.0, 12.0].map(|v| Trial::new(v, true)));
    h.advance_to(1_000).unwrap();
    h.advance_to(2_000).unwrap();
    h.advance_to(3_000).unwrap();
    let live: Vec<SampleId> = h.mirror.marks.keys().copied().collect();
    assert_eq!(live, ids);
    assert_eq!(h.widget.snapshot().stats.mean, Some(8.0));
    assert_eq!(h.widget.snapshot().stats.proportion, Some(1.0));
}

#[test]
fn teardown_detaches_everything() {
    let mut h = Harness::new(fast_batches());
    let now = h.at(0);
    h.widget.start_auto(now).unwrap();
    h.advance_to(100).unwrap();
    assert!(!h.mirror.marks.is_empty());

    let cancelled = h.widget.teardown(&mut h.mirror);
    assert!(cancelled >= 1);
    assert!(h.mirror.marks.is_empty());
    assert_eq!(h.widget.context().lifecycle.outstanding(), 0);
    assert!(h.widget.context().lifecycle.is_closed());
    assert_eq!(h.mirror.violations, 0);
}

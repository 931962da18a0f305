//! Scheduler scenarios driven through a simulated clock.
//!
//! Time only moves when the test pumps the timer queue, so "waiting" past a
//! schedule is exact and repeatable.

use std::time::Duration;

use statlab_core::Trial;
use statlab_runtime::{
    RunMode, RuntimeContext, SessionEvent, SimulationScheduler, TrialGenerator,
};
use web_time::Instant;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
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
    ctx: RuntimeContext,
    sched: SimulationScheduler,
}

impl Harness {
    fn new(capacity: usize) -> Self {
        Self {
            t0: Instant::now(),
            ctx: RuntimeContext::new(),
            sched: SimulationScheduler::new(capacity, counting()).unwrap(),
        }
    }

    fn at(&self, offset_ms: u64) -> Instant {
        self.t0 + ms(offset_ms)
    }

    /// Deliver every timer due by `offset_ms`.
    fn advance_to(&mut self, offset_ms: u64) {
        let now = self.at(offset_ms);
        while let Some(id) = self.ctx.timers.pop_due(now) {
            let _ = self.sched.on_timer(&mut self.ctx, id);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Batch
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn batch_of_three_at_10ms_finishes_by_50ms() {
    let mut h = Harness::new(100);
    let now = h.at(0);
    h.sched.start_batch(&mut h.ctx, 3, ms(10), now).unwrap();
    h.advance_to(50);
    assert_eq!(h.sched.session().trials_completed(), 3);
    assert_eq!(h.sched.mode(), RunMode::Idle);
}

#[test]
fn back_to_back_start_registers_one_handle() {
    let mut h = Harness::new(100);
    let now = h.at(0);
    h.sched.start_batch(&mut h.ctx, 3, ms(10), now).unwrap();
    h.sched.start_batch(&mut h.ctx, 3, ms(10), now).unwrap();
    assert_eq!(h.ctx.lifecycle.outstanding(), 1);
    h.advance_to(1_000);
    assert_eq!(h.sched.session().trials_completed(), 3);
}

#[test]
fn stop_after_k_of_ten_records_nothing_more() {
    for k in 1..10u64 {
        let mut h = Harness::new(100);
        let now = h.at(0);
        h.sched.start_batch(&mut h.ctx, 10, ms(10), now).unwrap();
        h.advance_to(k * 10);
        assert_eq!(h.sched.session().trials_completed(), k);

        h.sched.stop(&mut h.ctx);
        h.advance_to(10_000);
        assert_eq!(h.sched.session().trials_completed(), k, "k = {k}");
        assert_eq!(h.sched.mode(), RunMode::Idle);
        assert_eq!(h.ctx.lifecycle.outstanding(), 0);
        assert!(h.ctx.timers.is_idle());
    }
}

#[test]
fn batch_events_in_order() {
    let mut h = Harness::new(100);
    let now = h.at(0);
    h.sched.start_batch(&mut h.ctx, 2, ms(10), now).unwrap();
    h.advance_to(20);
    let names: Vec<&str> = h.ctx.drain_events().iter().map(SessionEvent::name).collect();
    assert_eq!(names, vec!["trial-completed", "trial-completed", "batch-completed"]);
}

// ═══════════════════════════════════════════════════════════════════════
// Auto and reset
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn reset_during_auto_clears_everything() {
    let mut h = Harness::new(100);
    let now = h.at(0);
    h.sched.start_auto(&mut h.ctx, ms(50), None, now).unwrap();
    h.advance_to(175);
    assert_eq!(h.sched.session().trials_completed(), 3);

    h.sched.reset(&mut h.ctx);
    assert_eq!(h.sched.session().trials_completed(), 0);
    assert_eq!(h.sched.mode(), RunMode::Idle);
    assert_eq!(h.ctx.lifecycle.outstanding(), 0);
    assert!(h.sched.session().buffer().is_empty());

    h.advance_to(5_000);
    assert_eq!(h.sched.session().trials_completed(), 0);
    assert_eq!(h.ctx.drain_events().last(), Some(&SessionEvent::Reset));
}

#[test]
fn restart_after_stop_runs_one_loop() {
    let mut h = Harness::new(100);
    let now = h.at(0);
    h.sched.start_auto(&mut h.ctx, ms(10), None, now).unwrap();
    h.sched.stop(&mut h.ctx);
    h.sched.start_auto(&mut h.ctx, ms(10), None, now).unwrap();
    assert_eq!(h.ctx.timers.live(), 1);
    h.advance_to(50);
    assert_eq!(h.sched.session().trials_completed(), 5);
}

#[test]
fn eviction_keeps_counting_trials() {
    let mut h = Harness::new(3);
    let now = h.at(0);
    h.sched.start_auto(&mut h.ctx, ms(1), Some(10), now).unwrap();
    h.advance_to(100);
    let session = h.sched.session();
    assert_eq!(session.trials_completed(), 10);
    assert_eq!(session.buffer().len(), 3);
    assert_eq!(session.stats().mean, Some(9.0));
}

#[test]
fn snapshot_for_persistence() {
    let mut h = Harness::new(10);
    let now = h.at(0);
    h.sched.start_batch(&mut h.ctx, 4, ms(10), now).unwrap();
    h.advance_to(20);
    let snap = h.sched.snapshot();
    assert_eq!(snap.trials_requested, 4);
    assert_eq!(snap.trials_completed, 2);
    assert_eq!(snap.mode, RunMode::Batch);
    assert_eq!(snap.stats.proportion, Some(0.0));
}

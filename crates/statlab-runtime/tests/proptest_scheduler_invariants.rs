//! Property-based invariant tests for the scheduler and lifecycle registry.
//!
//! 1. At most one lifecycle handle and one live timer exist at any time
//! 2. Idle mode implies zero outstanding handles
//! 3. Trials never land after a stop or reset without a new start
//! 4. `trials_completed` never exceeds what was requested plus manual steps

use std::time::Duration;

use proptest::prelude::*;
use statlab_core::Trial;
use statlab_runtime::{RunMode, RuntimeContext, SimulationScheduler};
use web_time::Instant;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Step,
    Batch(u64, u64),
    Auto(u64, Option<u64>),
    Stop,
    Reset,
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Step),
        (0u64..8, 1u64..30).prop_map(|(n, i)| Op::Batch(n, i)),
        (1u64..30, proptest::option::of(0u64..20)).prop_map(|(i, t)| Op::Auto(i, t)),
        Just(Op::Stop),
        Just(Op::Reset),
        (0u64..100).prop_map(Op::Advance),
    ]
}

fn scheduler() -> SimulationScheduler {
    SimulationScheduler::new(16, || Ok(Trial::new(1.0, true))).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
// 1-2. Single active run
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn never_more_than_one_run(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let t0 = Instant::now();
        let mut clock = 0u64;
        let mut ctx = RuntimeContext::new();
        let mut s = scheduler();

        for op in ops {
            let now = t0 + Duration::from_millis(clock);
            match op {
                Op::Step => {
                    s.step(&mut ctx).unwrap();
                }
                Op::Batch(n, i) => {
                    s.start_batch(&mut ctx, n, Duration::from_millis(i), now).unwrap();
                }
                Op::Auto(i, t) => {
                    s.start_auto(&mut ctx, Duration::from_millis(i), t, now).unwrap();
                }
                Op::Stop => {
                    s.stop(&mut ctx);
                }
                Op::Reset => s.reset(&mut ctx),
                Op::Advance(dt) => {
                    clock += dt;
                    let now = t0 + Duration::from_millis(clock);
                    while let Some(id) = ctx.timers.pop_due(now) {
                        s.on_timer(&mut ctx, id).unwrap();
                    }
                }
            }

            prop_assert!(ctx.lifecycle.outstanding() <= 1);
            prop_assert!(ctx.timers.live() <= 1);
            if s.mode() == RunMode::Idle {
                prop_assert_eq!(ctx.lifecycle.outstanding(), 0);
                prop_assert_eq!(ctx.timers.live(), 0);
            } else {
                prop_assert!(s.mode().is_running());
                prop_assert_eq!(ctx.lifecycle.outstanding(), 1);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. Nothing fires after stop
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stop_freezes_trial_count(
        n in 1u64..20,
        interval in 1u64..25,
        stop_after in 0u64..400,
        wait in 0u64..2_000,
    ) {
        let t0 = Instant::now();
        let mut ctx = RuntimeContext::new();
        let mut s = scheduler();
        s.start_batch(&mut ctx, n, Duration::from_millis(interval), t0).unwrap();

        let pump = |s: &mut SimulationScheduler, ctx: &mut RuntimeContext, at: u64| {
            let now = t0 + Duration::from_millis(at);
            while let Some(id) = ctx.timers.pop_due(now) {
                s.on_timer(ctx, id).unwrap();
            }
        };

        pump(&mut s, &mut ctx, stop_after);
        s.stop(&mut ctx);
        let frozen = s.session().trials_completed();
        prop_assert_eq!(frozen, (stop_after / interval).min(n));

        pump(&mut s, &mut ctx, stop_after + wait);
        prop_assert_eq!(s.session().trials_completed(), frozen);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4. Completed never exceeds requested
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn completed_bounded_by_requested(
        batches in proptest::collection::vec((0u64..6, 1u64..20), 1..6),
    ) {
        let t0 = Instant::now();
        let mut clock = 0u64;
        let mut ctx = RuntimeContext::new();
        let mut s = scheduler();
        for (n, interval) in batches {
            let start = t0 + Duration::from_millis(clock);
            s.start_batch(&mut ctx, n, Duration::from_millis(interval), start).unwrap();
            clock += n * interval;
            let now = t0 + Duration::from_millis(clock);
            while let Some(id) = ctx.timers.pop_due(now) {
                s.on_timer(&mut ctx, id).unwrap();
            }
            prop_assert_eq!(s.mode(), RunMode::Idle);
        }
        prop_assert_eq!(
            s.session().trials_completed(),
            s.session().trials_requested()
        );
    }
}

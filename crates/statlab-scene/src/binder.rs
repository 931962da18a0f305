#![forbid(unsafe_code)]

//! Keyed scene binding with enter/update/exit transitions.
//!
//! A [`SceneBinder`] reconciles a keyed array of target properties against
//! the elements it previously bound, and tells a [`SceneRenderer`] what to
//! create, update, and remove:
//!
//! - **enter**: a key not bound before is created at its "entering" props
//!   and tweened to its target.
//! - **update**: a bound key whose target changed is tweened from its
//!   current props to the new target.
//! - **exit**: a bound key missing from the array is tweened to its
//!   "exiting" props and then removed.
//!
//! # Invariants
//!
//! 1. Passes never overlap. While a pass has transitions in flight, new
//!    arrays are queued; only the latest queued array is kept, and it is
//!    applied as soon as the in-flight pass finishes.
//! 2. All three phases of a pass are issued inside one `reconcile` call,
//!    removals first.
//! 3. Every pass with at least one transition holds exactly one lifecycle
//!    handle, released when its last transition finishes.
//! 4. An element has at most one active tween. A new tween or a
//!    [`preview`](SceneBinder::preview) replaces the old one.
//! 5. If a pass's lifecycle handle is cancelled (reset, unmount), the next
//!    `advance` or `reconcile` snaps every element to its final state
//!    before doing anything else. A queued array is then dropped by
//!    `reconcile` (the new array supersedes it) or applied without
//!    transitions by `advance`, so an older array never lands after a
//!    newer one.
//!
//! # Failure Modes
//!
//! - Duplicate keys in one array: the first occurrence wins, later ones are
//!   dropped and logged.
//! - Lifecycle closed (after teardown): passes apply immediately with no
//!   transitions, so nothing is left mid-animation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use statlab_core::{Easing, Interpolate, Point, Tween, Visual};
use statlab_runtime::{
    AnimationLifecycle, CancellationSource, CancellationToken, LifecycleHandle, telemetry,
};
use web_time::Instant;

// ---------------------------------------------------------------------------
// Renderer seam
// ---------------------------------------------------------------------------

/// Drawing callbacks for one chart.
///
/// Implementations only draw; they never mutate the data model.
pub trait SceneRenderer<K, P> {
    /// A new element appears with `props`.
    fn create(&mut self, key: &K, props: &P);
    /// An existing element now has `props`.
    fn update(&mut self, key: &K, props: &P);
    /// The element is detached.
    fn remove(&mut self, key: &K);
}

/// Pointer targeting for bound props.
pub trait Hittable {
    /// Distance score if `point` hits this mark within `radius`, else `None`.
    /// Lower scores win.
    fn hit(&self, point: Point, radius: f64) -> Option<f64>;
}

impl Hittable for Visual {
    fn hit(&self, point: Point, radius: f64) -> Option<f64> {
        let inside_x = point.x >= self.x - radius && point.x <= self.x + self.width + radius;
        let inside_y = point.y >= self.y - radius && point.y <= self.y + self.height + radius;
        if !(inside_x && inside_y) {
            return None;
        }
        let center = Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0);
        Some(center.distance_sq(point))
    }
}

impl Hittable for (f64, f64) {
    fn hit(&self, point: Point, radius: f64) -> Option<f64> {
        let d = Point::new(self.0, self.1).distance_sq(point);
        (d <= radius * radius).then_some(d)
    }
}

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Transition durations and easing. A zero duration applies that phase
/// immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionConfig {
    /// Enter duration (default: 250ms).
    pub enter: Duration,
    /// Update duration (default: 300ms).
    pub update: Duration,
    /// Exit duration (default: 200ms).
    pub exit: Duration,
    /// Easing for all phases (default: ease-out).
    pub easing: Easing,
}

impl TransitionConfig {
    /// No animation at all.
    pub const IMMEDIATE: Self = Self {
        enter: Duration::ZERO,
        update: Duration::ZERO,
        exit: Duration::ZERO,
        easing: Easing::Linear,
    };
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enter: Duration::from_millis(250),
            update: Duration::from_millis(300),
            exit: Duration::from_millis(200),
            easing: Easing::EaseOut,
        }
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    pub entered: usize,
    pub updated: usize,
    pub exited: usize,
}

impl PassStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.entered + self.updated + self.exited
    }
}

/// Result of [`SceneBinder::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The pass was applied now.
    Applied(PassStats),
    /// A pass is in flight; the array was queued. `superseded` is true when
    /// an older queued array was dropped in favour of this one.
    Queued { superseded: bool },
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Element<P> {
    current: P,
    target: P,
    tween: Option<Tween<P>>,
    exiting: bool,
}

#[derive(Debug)]
struct ActivePass {
    handle: LifecycleHandle,
    token: CancellationToken,
}

/// Maps props to the props an element enters from or exits to.
pub type PropsFn<P> = Box<dyn Fn(&P) -> P>;

/// Keyed diff engine over render callbacks.
pub struct SceneBinder<K, P> {
    config: TransitionConfig,
    elements: BTreeMap<K, Element<P>>,
    pass: Option<ActivePass>,
    pending: Option<Vec<(K, P)>>,
    enter_from: PropsFn<P>,
    exit_to: PropsFn<P>,
    passes_applied: u64,
    passes_coalesced: u64,
}

impl<K: fmt::Debug, P: fmt::Debug> fmt::Debug for SceneBinder<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneBinder")
            .field("config", &self.config)
            .field("elements", &self.elements.len())
            .field("pass", &self.pass)
            .field("pending", &self.pending.as_ref().map(Vec::len))
            .field("passes_applied", &self.passes_applied)
            .finish_non_exhaustive()
    }
}

/// Keyed `(key, props)` pairs from a data array.
pub fn keyed<D, K, P>(
    data: &[D],
    key: impl Fn(&D) -> K,
    project: impl Fn(&D, usize) -> P,
) -> Vec<(K, P)> {
    data.iter()
        .enumerate()
        .map(|(i, d)| (key(d), project(d, i)))
        .collect()
}

/// `props` at zero opacity. The usual enter/exit style for marks.
#[must_use]
pub fn faded(props: &Visual) -> Visual {
    props.with_opacity(0.0)
}

impl<K, P> SceneBinder<K, P>
where
    K: Ord + Clone + fmt::Debug,
    P: Interpolate + PartialEq + 'static,
{
    /// Create a binder whose elements enter and exit at their own props.
    #[must_use]
    pub fn new(config: TransitionConfig) -> Self {
        Self {
            config,
            elements: BTreeMap::new(),
            pass: None,
            pending: None,
            enter_from: Box::new(P::clone),
            exit_to: Box::new(P::clone),
            passes_applied: 0,
            passes_coalesced: 0,
        }
    }

    /// Props an entering element starts from, given its target.
    #[must_use]
    pub fn enter_from(mut self, f: impl Fn(&P) -> P + 'static) -> Self {
        self.enter_from = Box::new(f);
        self
    }

    /// Props an exiting element ends at, given its current props.
    #[must_use]
    pub fn exit_to(mut self, f: impl Fn(&P) -> P + 'static) -> Self {
        self.exit_to = Box::new(f);
        self
    }

    #[must_use]
    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Takes effect from the next pass.
    pub fn set_config(&mut self, config: TransitionConfig) {
        self.config = config;
    }

    /// Reconcile the bound elements against `items`.
    pub fn reconcile<R>(
        &mut self,
        items: Vec<(K, P)>,
        renderer: &mut R,
        lifecycle: &mut AnimationLifecycle,
        now: Instant,
    ) -> ReconcileOutcome
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        if self.settle_cancelled(renderer) && self.pending.take().is_some() {
            self.passes_coalesced += 1;
        }
        if self.pass.is_some() {
            let superseded = self.pending.replace(items).is_some();
            if superseded {
                self.passes_coalesced += 1;
            }
            tracing::trace!(
                target: "statlab.scene",
                superseded,
                "pass queued behind in-flight transitions"
            );
            return ReconcileOutcome::Queued { superseded };
        }
        let config = self.config;
        ReconcileOutcome::Applied(self.apply_pass(items, config, renderer, lifecycle, now))
    }

    /// Step every active transition to `now`.
    ///
    /// Finished exits are detached, a finished pass releases its handle, and
    /// a queued array starts as the next pass. Returns whether anything is
    /// still animating.
    pub fn advance<R>(
        &mut self,
        now: Instant,
        renderer: &mut R,
        lifecycle: &mut AnimationLifecycle,
    ) -> bool
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        if self.settle_cancelled(renderer) {
            if let Some(next) = self.pending.take() {
                self.apply_pass(next, TransitionConfig::IMMEDIATE, renderer, lifecycle, now);
            }
        }

        let mut finished_exits = Vec::new();
        for (key, el) in self.elements.iter_mut() {
            let Some(tween) = &el.tween else {
                continue;
            };
            el.current = tween.sample(now);
            let done = tween.is_complete(now);
            if done {
                el.tween = None;
            }
            if done && el.exiting {
                finished_exits.push(key.clone());
            } else {
                renderer.update(key, &el.current);
            }
        }
        for key in finished_exits {
            self.elements.remove(&key);
            renderer.remove(&key);
        }

        if !self.has_tweens() {
            if let Some(pass) = self.pass.take() {
                lifecycle.release(pass.handle);
            }
            if let Some(next) = self.pending.take() {
                let config = self.config;
                self.apply_pass(next, config, renderer, lifecycle, now);
            }
        }
        self.is_animating()
    }

    /// Drag write path: set one element's props immediately, cancelling any
    /// transition on it. A queued array carrying the key is patched too, so
    /// the element does not jump back when that array is applied. Returns
    /// `false` if the key is not bound.
    pub fn preview<R>(&mut self, key: &K, props: P, renderer: &mut R) -> bool
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        match self.elements.get_mut(key) {
            Some(el) if !el.exiting => {
                if let Some(queued) = self.pending.as_mut() {
                    for (_, p) in queued.iter_mut().filter(|(k, _)| k == key) {
                        *p = props.clone();
                    }
                }
                el.tween = None;
                el.current = props.clone();
                el.target = props;
                renderer.update(key, &el.current);
                true
            }
            _ => false,
        }
    }

    /// Snap every element to its final state, release the pass handle, and
    /// apply any queued array without transitions.
    pub fn finish_now<R>(
        &mut self,
        now: Instant,
        renderer: &mut R,
        lifecycle: &mut AnimationLifecycle,
    )
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        if let Some(pass) = self.pass.take() {
            lifecycle.release(pass.handle);
        }
        self.snap(renderer);
        if let Some(next) = self.pending.take() {
            self.apply_pass(next, TransitionConfig::IMMEDIATE, renderer, lifecycle, now);
        }
    }

    /// Remove every element immediately (unmount).
    pub fn detach_all<R>(&mut self, renderer: &mut R, lifecycle: &mut AnimationLifecycle)
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        if let Some(pass) = self.pass.take() {
            lifecycle.cancel(pass.handle);
        }
        self.pending = None;
        for key in std::mem::take(&mut self.elements).into_keys() {
            renderer.remove(&key);
        }
    }

    /// Key of the closest non-exiting element hit by `point`.
    #[must_use]
    pub fn hit_test(&self, point: Point, radius: f64) -> Option<K>
    where
        P: Hittable,
    {
        self.elements
            .iter()
            .filter(|(_, el)| !el.exiting)
            .filter_map(|(k, el)| el.current.hit(point, radius).map(|d| (k, d)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k.clone())
    }

    /// Current (possibly mid-transition) props of `key`.
    #[must_use]
    pub fn props(&self, key: &K) -> Option<&P> {
        self.elements.get(key).map(|el| &el.current)
    }

    /// Final props `key` is heading to.
    #[must_use]
    pub fn target(&self, key: &K) -> Option<&P> {
        self.elements.get(key).map(|el| &el.target)
    }

    /// Whether `key` is bound and not exiting.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.elements.get(key).is_some_and(|el| !el.exiting)
    }

    /// Bound keys, exiting ones included, in key order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.elements.keys()
    }

    /// Number of bound elements, exiting ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether a pass has transitions in flight.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.pass.is_some()
    }

    /// Whether an array is queued behind the in-flight pass.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Lifecycle handle of the in-flight pass.
    #[must_use]
    pub fn pass_handle(&self) -> Option<LifecycleHandle> {
        self.pass.as_ref().map(|p| p.handle)
    }

    /// Passes applied so far.
    #[must_use]
    pub fn passes_applied(&self) -> u64 {
        self.passes_applied
    }

    /// Queued arrays dropped because a newer one arrived first.
    #[must_use]
    pub fn passes_coalesced(&self) -> u64 {
        self.passes_coalesced
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn has_tweens(&self) -> bool {
        self.elements.values().any(|el| el.tween.is_some())
    }

    /// Returns whether a cancelled pass was found and snapped.
    fn settle_cancelled<R>(&mut self, renderer: &mut R) -> bool
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        if !self.pass.as_ref().is_some_and(|p| p.token.is_cancelled()) {
            return false;
        }
        tracing::debug!(target: "statlab.scene", "pass cancelled; snapping to final state");
        self.pass = None;
        self.snap(renderer);
        true
    }

    fn snap<R>(&mut self, renderer: &mut R)
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        let mut removed = Vec::new();
        for (key, el) in self.elements.iter_mut() {
            if el.tween.take().is_none() {
                continue;
            }
            el.current = el.target.clone();
            if el.exiting {
                removed.push(key.clone());
            } else {
                renderer.update(key, &el.current);
            }
        }
        for key in removed {
            self.elements.remove(&key);
            renderer.remove(&key);
        }
    }

    fn apply_pass<R>(
        &mut self,
        items: Vec<(K, P)>,
        config: TransitionConfig,
        renderer: &mut R,
        lifecycle: &mut AnimationLifecycle,
        now: Instant,
    ) -> PassStats
    where
        R: SceneRenderer<K, P> + ?Sized,
    {
        let animate = !lifecycle.is_closed();
        let easing = config.easing.function();
        let mut stats = PassStats::default();

        let mut seen = BTreeSet::new();
        let mut incoming = Vec::with_capacity(items.len());
        for (key, props) in items {
            if seen.insert(key.clone()) {
                incoming.push((key, props));
            } else {
                tracing::debug!(target: "statlab.scene", key = ?key, "duplicate key dropped");
            }
        }

        // Exit
        let stale: Vec<K> = self
            .elements
            .iter()
            .filter(|(k, el)| !el.exiting && !seen.contains(*k))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            stats.exited += 1;
            if !animate || config.exit.is_zero() {
                self.elements.remove(&key);
                renderer.remove(&key);
                continue;
            }
            if let Some(el) = self.elements.get_mut(&key) {
                let end = (self.exit_to)(&el.current);
                let tween = Tween::new(el.current.clone(), end.clone(), now, config.exit);
                el.tween = Some(tween.easing(easing));
                el.target = end;
                el.exiting = true;
            }
        }

        // Update and enter
        for (key, target) in incoming {
            if let Some(el) = self.elements.get_mut(&key) {
                if el.target == target && !el.exiting {
                    continue;
                }
                el.exiting = false;
                stats.updated += 1;
                if !animate || config.update.is_zero() {
                    el.tween = None;
                    el.current = target.clone();
                    el.target = target;
                    renderer.update(&key, &el.current);
                } else {
                    let tween = Tween::new(el.current.clone(), target.clone(), now, config.update);
                    el.tween = Some(tween.easing(easing));
                    el.target = target;
                }
                continue;
            }

            stats.entered += 1;
            let element = if !animate || config.enter.is_zero() {
                renderer.create(&key, &target);
                Element {
                    current: target.clone(),
                    target,
                    tween: None,
                    exiting: false,
                }
            } else {
                let start = (self.enter_from)(&target);
                renderer.create(&key, &start);
                Element {
                    tween: Some(
                        Tween::new(start.clone(), target.clone(), now, config.enter).easing(easing),
                    ),
                    current: start,
                    target,
                    exiting: false,
                }
            };
            self.elements.insert(key, element);
        }

        self.passes_applied += 1;
        if self.has_tweens() {
            let source = CancellationSource::new();
            let token = source.token();
            match lifecycle.register(Box::new(move || source.cancel())) {
                Ok(handle) => self.pass = Some(ActivePass { handle, token }),
                Err(err) => {
                    tracing::debug!(
                        target: "statlab.scene",
                        error = %err,
                        "pass applied without transitions"
                    );
                    self.snap(renderer);
                }
            }
            telemetry::record_transitions_started(stats.entered, stats.updated, stats.exited);
        }
        stats
    }
}

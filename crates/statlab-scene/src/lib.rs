#![forbid(unsafe_code)]

//! Scene: keyed visual binding and direct manipulation.
//!
//! # Role in statlab
//! `statlab-scene` sits between the simulation data and whatever draws it.
//! [`SceneBinder`] diffs keyed props against the elements it bound last time
//! and drives a host [`SceneRenderer`] through enter, update and exit
//! transitions. [`DragController`] converts pointer gestures into sample
//! edits through a [`LinearScale`](statlab_core::LinearScale).
//!
//! # How it fits in the system
//! Both components borrow the widget's
//! [`AnimationLifecycle`](statlab_runtime::AnimationLifecycle) and
//! [`RuntimeContext`](statlab_runtime::RuntimeContext) per call. A reset
//! cancels the binder's pass handle through the registry; the binder notices
//! on its next call and snaps to final state.

pub mod binder;
pub mod drag;

pub use binder::{
    Hittable, PassStats, PropsFn, ReconcileOutcome, SceneBinder, SceneRenderer, TransitionConfig,
    faded, keyed,
};
pub use drag::{DragConfig, DragController, DragState, DragUpdate, EditTarget, HoverGate};

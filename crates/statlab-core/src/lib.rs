#![forbid(unsafe_code)]

//! Core: scales, samples, bounded sample buffers, and tween primitives.
//!
//! # Role in statlab
//! `statlab-core` is the data layer. It owns the mapping between data values
//! and drawing coordinates ([`scale::LinearScale`]), the bounded trial
//! history with incrementally maintained aggregates ([`buffer::SampleBuffer`]),
//! and the easing/interpolation math the scene layer animates with.
//!
//! # How it fits in the system
//! The runtime (`statlab-runtime`) pushes trial outcomes into a
//! [`buffer::SampleBuffer`] on a schedule; the scene layer (`statlab-scene`)
//! maps buffer contents through a [`scale::LinearScale`] into visual
//! properties and tweens them with [`animation::Tween`]. Nothing in this
//! crate performs I/O or keeps time on its own.

pub mod animation;
pub mod buffer;
pub mod geometry;
pub mod sample;
pub mod scale;
pub mod stats;

pub use animation::{Easing, EasingFn, Interpolate, Tween, Visual};
pub use buffer::{Aggregates, BufferError, EditOutcome, SampleBuffer};
pub use geometry::{Axis, Point};
pub use sample::{Sample, SampleId, SequenceGen, Trial};
pub use scale::{LinearScale, ScaleAxis, ScaleError};
pub use stats::StatSnapshot;

//! guise-core — Face tracking and replacement engine.
//!
//! Tracks a detected face across frames, maintains a bounded identity
//! buffer, and substitutes the tracked face with a previously-seen face
//! via radial alpha compositing, executed identically on a serial host
//! backend and a data-parallel backend.

pub mod backend;
pub mod compose;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod hist;
pub mod mask;
pub mod person;
pub mod pipeline;
pub mod recog;

pub use backend::{Backend, HostBackend, ParallelBackend};
pub use frame::{AlphaFrame, GrayFrame, RgbFrame};
pub use geometry::Rect;
pub use mask::{RadiusPair, RampMode};
pub use person::Person;
pub use pipeline::{CancelToken, LoopExit, ReplacementPipeline};

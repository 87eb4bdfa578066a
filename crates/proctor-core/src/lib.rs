//! proctor-core: Session controller, timers, and data model.
//!
//! This crate holds the timed assessment state machine and the event loop
//! that drives it. It knows nothing about HTTP or terminals; those sit
//! behind the [`traits::AssessmentApi`] and [`runner::View`] traits.

pub mod controller;
pub mod error;
pub mod input;
pub mod model;
pub mod runner;
pub mod timer;
pub mod traits;

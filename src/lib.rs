//! # circledrop: 2D Circle Physics Sandbox
//!
//! circledrop simulates thousands of circles falling, bouncing, and piling up
//! inside a resizable rectangular arena. The simulation runs at a fixed
//! timestep that adapts to machine load, and exposes its state as parallel
//! arrays that a display surface can upload directly as per-attribute
//! instance buffers.
//!
//! ## Architecture Overview
//!
//! Everything lives in the [`simulation`] module:
//!
//! - [`simulation::engine::Engine`] - owns the state and advances it one
//!   fixed step at a time: spawn, integrate, wall resolution, collision
//!   detection, contact resolution
//! - [`simulation::circle_state::CircleState`] - Structure-of-Arrays (SoA)
//!   layout for all per-circle data
//! - [`simulation::spatial_grid::SpatialGrid`] - uniform grid broad phase;
//!   cell size is the largest circle diameter so only adjacent cells can
//!   hold overlapping circles
//! - [`simulation::worker_pool::WorkerPool`] - fixed-size thread pool that
//!   shards the narrow phase into contiguous batches
//! - [`simulation::step_clock::StepClock`] - fixed-timestep accumulator
//!   with adaptive physics frequency, driven by the host frame loop
//!
//! **Key design**: all cross-references between circles are integer indices
//! into the SoA arrays. There are no entity objects and no links to
//! invalidate when the arrays grow, and the parallel narrow phase can read
//! the arrays without any lifetime bookkeeping.
//!
//! ## Host Contract
//!
//! A host accumulates real frame time into the [`StepClock`], calls
//! [`Engine::step`] while a step is due, and renders from
//! [`Engine::snapshot`], interpolating each circle between its previous and
//! current position with the leftover accumulator fraction. The bundled
//! binary is a headless host that does exactly this and reports telemetry
//! once per second.

pub mod simulation;

pub use simulation::circle_state::{CircleState, Snapshot};
pub use simulation::engine::{Contact, Engine};
pub use simulation::physics_config::EngineConfig;
pub use simulation::spatial_grid::SpatialGrid;
pub use simulation::step_clock::StepClock;
pub use simulation::worker_pool::WorkerPool;

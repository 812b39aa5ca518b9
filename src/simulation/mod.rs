pub mod circle_state;
pub mod engine;
pub mod physics_config;
pub mod spatial_grid;
pub mod step_clock;
pub mod worker_pool;

pub use physics_config::*;

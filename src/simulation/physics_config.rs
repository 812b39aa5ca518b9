use serde::{Deserialize, Serialize};

/// Engine configuration for the circle simulation
///
/// All values are plain numbers in world units. The world half-height is 1;
/// the half-width is the aspect ratio. Hosts working in pixels are expected
/// to convert before constructing the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Smallest radius sampled for newly spawned circles
    pub min_radius: f32,

    /// Largest radius sampled for newly spawned circles
    ///
    /// Also fixes the spatial grid cell size at `2.0 * max_radius` for the
    /// lifetime of the engine.
    pub max_radius: f32,

    /// Hard cap on the number of live circles
    pub spawn_limit: usize,

    /// Gravitational acceleration, applied in negative y
    pub gravity: f32,

    /// Coefficient of restitution in [0, 1]
    pub restitution: f32,

    /// Circles spawned per second of simulation time (0 spawns everything at once)
    pub spawn_rate: f32,

    /// Arena aspect ratio at construction, used for grid sizing and spawn placement
    pub initial_aspect_ratio: f32,

    /// Window height at construction, only used to derive outline widths
    pub initial_window_height: f32,

    /// Number of positional correction iterations per step
    pub correction_iterations: u32,

    /// Optional deterministic seed for the spawn PRNG
    ///
    /// `None` seeds from OS entropy. Runs that need reproducible spawns
    /// (tests, replays) set this explicitly.
    pub seed: Option<u64>,

    /// Evaluate all candidate pairs on the caller thread
    pub single_threaded: bool,

    /// Use the spatial grid broad phase instead of checking every pair
    pub spatial_partitioning: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_radius: 0.02,
            max_radius: 0.05,
            spawn_limit: 1000,
            gravity: 1.0,
            restitution: 0.5,
            spawn_rate: 50.0,
            initial_aspect_ratio: 16.0 / 9.0,
            initial_window_height: 1080.0,
            correction_iterations: 3,
            seed: None,
            single_threaded: false,
            spatial_partitioning: true,
        }
    }
}

impl EngineConfig {
    /// Clamp out-of-domain values instead of failing construction
    pub fn sanitized(mut self) -> Self {
        self.max_radius = self.max_radius.max(self.min_radius);
        self.restitution = self.restitution.clamp(0.0, 1.0);
        self.correction_iterations = self.correction_iterations.max(1);
        self
    }
}

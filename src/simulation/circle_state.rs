//! Circle state in Structure-of-Arrays layout
//!
//! All live circles are stored as parallel arrays indexed by circle index.
//! The hot loops (integration, wall resolution, narrow phase) each touch only
//! the arrays they need, which keeps cache traffic low when the circle count
//! gets large, and the layout maps directly onto per-attribute GPU instance
//! buffers on the rendering side.
//!
//! Arrays are reserved to the spawn limit at construction and only ever grow
//! by appending. Circles are never removed, so indices are stable for the
//! lifetime of the program.

use glam::Vec2;

/// All per-circle data as parallel arrays
///
/// Every array has the same length, equal to [`CircleState::count`]. Appends
/// happen only inside the engine step, before any reads of that step begin.
#[derive(Debug, Clone, Default)]
pub struct CircleState {
    /// Current x positions
    pub positions_x: Vec<f32>,
    /// Current y positions
    pub positions_y: Vec<f32>,

    /// X positions at the start of the current step, kept for render interpolation
    pub prev_positions_x: Vec<f32>,
    /// Y positions at the start of the current step
    pub prev_positions_y: Vec<f32>,

    /// X velocities
    pub velocities_x: Vec<f32>,
    /// Y velocities
    pub velocities_y: Vec<f32>,

    /// Reciprocal masses. Zero means infinite mass: the circle never moves.
    pub inverse_masses: Vec<f32>,

    /// Collision and display radii, always positive
    pub radii: Vec<f32>,

    /// Red color component in [0, 1]
    pub reds: Vec<f32>,
    /// Green color component in [0, 1]
    pub greens: Vec<f32>,
    /// Blue color component in [0, 1]
    pub blues: Vec<f32>,

    /// Stroke width for outlined rendering, derived at spawn time
    pub outline_widths: Vec<f32>,
}

impl CircleState {
    /// Create an empty state with all arrays reserved to `capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions_x: Vec::with_capacity(capacity),
            positions_y: Vec::with_capacity(capacity),
            prev_positions_x: Vec::with_capacity(capacity),
            prev_positions_y: Vec::with_capacity(capacity),
            velocities_x: Vec::with_capacity(capacity),
            velocities_y: Vec::with_capacity(capacity),
            inverse_masses: Vec::with_capacity(capacity),
            radii: Vec::with_capacity(capacity),
            reds: Vec::with_capacity(capacity),
            greens: Vec::with_capacity(capacity),
            blues: Vec::with_capacity(capacity),
            outline_widths: Vec::with_capacity(capacity),
        }
    }

    /// Number of live circles
    #[inline]
    pub fn count(&self) -> usize {
        self.positions_x.len()
    }

    /// Append one circle to every array
    ///
    /// The previous position starts equal to the current position so a
    /// freshly spawned circle interpolates to itself.
    #[allow(clippy::too_many_arguments)]
    pub fn push_circle(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        inverse_mass: f32,
        radius: f32,
        red: f32,
        green: f32,
        blue: f32,
        outline_width: f32,
    ) {
        self.positions_x.push(position.x);
        self.positions_y.push(position.y);
        self.prev_positions_x.push(position.x);
        self.prev_positions_y.push(position.y);
        self.velocities_x.push(velocity.x);
        self.velocities_y.push(velocity.y);
        self.inverse_masses.push(inverse_mass);
        self.radii.push(radius);
        self.reds.push(red);
        self.greens.push(green);
        self.blues.push(blue);
        self.outline_widths.push(outline_width);
    }

    /// Borrow the render-facing arrays as one consistent view
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            positions_x: &self.positions_x,
            positions_y: &self.positions_y,
            previous_positions_x: &self.prev_positions_x,
            previous_positions_y: &self.prev_positions_y,
            reds: &self.reds,
            greens: &self.greens,
            blues: &self.blues,
            radii: &self.radii,
            outline_widths: &self.outline_widths,
            count: self.count(),
        }
    }
}

/// Read-only view of everything a display surface needs
///
/// A host interpolates each circle between `previous_positions` and
/// `positions` using its leftover accumulator fraction.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub positions_x: &'a [f32],
    pub positions_y: &'a [f32],
    pub previous_positions_x: &'a [f32],
    pub previous_positions_y: &'a [f32],
    pub reds: &'a [f32],
    pub greens: &'a [f32],
    pub blues: &'a [f32],
    pub radii: &'a [f32],
    pub outline_widths: &'a [f32],
    pub count: usize,
}

//! Physical constants and solver tuning parameters.
//!
//! ## Coordinate conventions
//!
//! The domain is the unit square with `y` increasing downward (image space).
//! Grid quantities index cells in row-major order; particle positions are
//! stored in cell units, solid bodies live in world units. The cell size is
//! `1 / min(width, height)`.
//!
//! ## Temperature conventions
//!
//! Temperature is absolute (Kelvin-like) and must stay strictly positive:
//! it divides the buoyant-density formula. The ambient value doubles as the
//! initial condition and the neutral point of the buoyancy force.

/// Ambient temperature. Initial value of the temperature field and the
/// reference point for buoyancy.
pub const AMBIENT_TEMPERATURE: f64 = 294.0;

/// Gravity magnitude. Positive; buoyant cells accelerate toward negative y
/// (upward in image space).
pub const GRAVITY: f64 = 9.81;

/// FLIP/PIC blend factor. Tiny PIC fraction to keep particle noise bounded
/// while staying almost fully FLIP.
pub const FLIP_ALPHA: f64 = 0.001;

// =============================================================================
// PARTICLE BUDGETS
// =============================================================================

/// Particles seeded per cell at initialization.
pub const AVG_PER_CELL: usize = 4;

/// Cells with fewer live particles than this are reseeded.
pub const MIN_PER_CELL: usize = 3;

/// Cells with more live particles than this are pruned. Also sets the hard
/// capacity of the particle store: `width * height * MAX_PER_CELL`.
pub const MAX_PER_CELL: usize = 12;

/// Default seed for the jitter RNG. Any seed works; a fixed default keeps
/// runs reproducible.
pub const PARTICLE_SEED: u64 = 0xBA5E_BA11;

// =============================================================================
// LINEAR SOLVER
// =============================================================================

/// Convergence threshold on the residual infinity norm.
pub const PCG_TOLERANCE: f64 = 1e-5;

/// Hard iteration budget for the conjugate-gradient loop. Exhausting it is
/// logged, not fatal; the step proceeds with the approximate solution.
pub const PCG_ITERATION_LIMIT: usize = 2000;

// =============================================================================
// CUT-CELL GUARDS
// =============================================================================

/// Fluid-area fractions below this clamp to zero so nearly-solid cells do
/// not produce near-singular matrix rows.
pub const MIN_CELL_VOLUME: f64 = 0.01;

/// Face densities clamp to this fraction of the air density to keep the
/// pressure-matrix factor bounded.
pub const MIN_DENSITY_FRACTION: f64 = 0.05;

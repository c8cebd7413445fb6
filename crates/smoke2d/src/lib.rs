//! 2D incompressible FLIP/PIC smoke simulation.
//!
//! A hybrid particle/grid solver on a staggered MAC grid with:
//! - variational cut-cell treatment of arbitrary moving solid obstacles
//!   (boxes and spheres with rigid motion),
//! - a buoyancy-driven smoke model carrying soot density and temperature,
//! - an implicit heat-diffusion step,
//! - a MIC(0)-preconditioned conjugate-gradient pressure projection,
//! - extrapolation of fluid values into solid and starved cells so every
//!   bilinear gather is well defined.
//!
//! The crate is framework-agnostic and handles simulation only. The host
//! drives the loop: queue inflows, step the solver, advance body poses,
//! and consume the RGBA8 frame buffer.
//!
//! # Example
//!
//! ```
//! use smoke2d::FluidSolver;
//!
//! let mut solver = FluidSolver::new(32, 32, 0.1, 0.25, 0.01, Vec::new());
//! for _ in 0..4 {
//!     let t_hot = solver.ambient_t() + 300.0;
//!     solver.add_inflow(0.35, 0.9, 0.1, 0.05, 1.0, t_hot, 0.0, 0.0);
//!     solver.update(0.0025);
//! }
//!
//! let mut image = vec![0u8; 32 * 32 * 4];
//! solver.to_image(&mut image, false);
//! ```

pub mod body;
pub mod constants;
pub mod kernels;
pub mod particles;
pub mod quantity;
pub mod solve;
pub mod solver;

pub use body::{RigidState, SolidBody, SolidBox, SolidSphere};
pub use kernels::{cubic_pulse, occupancy};
pub use particles::ParticleSet;
pub use quantity::{CellType, FluidQuantity};
pub use solve::{FivePointMatrix, PcgScratch, SolveStats};
pub use solver::{FluidSolver, SolverParams};

//! Solver orchestration.
//!
//! `FluidSolver` owns the four staggered quantities, the marker particles,
//! the solid bodies and the linear-solver scratch, and runs the per-step
//! pipeline:
//!
//! 1. Refresh cut-cell geometry against the current body poses
//! 2. Deposit particles onto the grids (grid becomes authoritative)
//! 3. Snapshot all quantities
//! 4. Stamp queued inflows
//! 5. Implicit heat diffusion, then extrapolate temperature
//! 6. Buoyancy body force
//! 7. Solid/wall boundary conditions
//! 8. Pressure projection
//! 9. Extrapolate density and velocities, re-apply boundaries
//! 10. FLIP/PIC delta blend onto particles
//! 11. Advect particles in the corrected field

mod heat;
mod projection;
mod render;

use crate::body::SolidBody;
use crate::constants::{AMBIENT_TEMPERATURE, FLIP_ALPHA, GRAVITY, PARTICLE_SEED};
use crate::particles::ParticleSet;
use crate::quantity::FluidQuantity;
use crate::solve::{FivePointMatrix, PcgScratch};

/// Construction-time configuration.
#[derive(Clone, Copy, Debug)]
pub struct SolverParams {
    /// Density of clear air.
    pub rho_air: f64,
    /// Density of soot-laden smoke; together with `rho_air` this sets the
    /// concentration buoyancy coefficient.
    pub rho_soot: f64,
    /// Heat diffusion coefficient, in cell-area per unit time.
    pub diffusion: f64,
    /// Seed for the particle jitter RNG.
    pub seed: u64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            rho_air: 0.1,
            rho_soot: 0.25,
            diffusion: 0.01,
            seed: PARTICLE_SEED,
        }
    }
}

/// A queued inflow rectangle, stamped during the next step between
/// snapshot and delta so the particles actually receive it.
#[derive(Clone, Copy, Debug)]
struct InflowRegion {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    density: f64,
    temperature: f64,
    u: f64,
    v: f64,
}

pub struct FluidSolver {
    w: usize,
    h: usize,
    hx: f64,

    density_air: f64,
    density_soot: f64,
    diffusion: f64,

    /// Gravity magnitude; buoyant cells accelerate toward -y.
    pub gravity: f64,
    /// FLIP/PIC blend factor. Near zero is almost pure FLIP.
    pub flip_alpha: f64,
    t_amb: f64,

    d: FluidQuantity,
    t: FluidQuantity,
    u: FluidQuantity,
    v: FluidQuantity,

    particles: ParticleSet,
    bodies: Vec<Box<dyn SolidBody>>,
    inflows: Vec<InflowRegion>,

    mat: FivePointMatrix,
    scratch: PcgScratch,
    r: Vec<f64>,
    p: Vec<f64>,
    u_density: Vec<f64>,
    v_density: Vec<f64>,
}

impl FluidSolver {
    /// Standard construction mirroring the solver's physical inputs.
    pub fn new(
        w: usize,
        h: usize,
        rho_air: f64,
        rho_soot: f64,
        diffusion: f64,
        bodies: Vec<Box<dyn SolidBody>>,
    ) -> Self {
        Self::with_params(
            w,
            h,
            SolverParams {
                rho_air,
                rho_soot,
                diffusion,
                ..SolverParams::default()
            },
            bodies,
        )
    }

    pub fn with_params(
        w: usize,
        h: usize,
        params: SolverParams,
        bodies: Vec<Box<dyn SolidBody>>,
    ) -> Self {
        let hx = 1.0 / w.min(h) as f64;

        let d = FluidQuantity::new(w, h, 0.5, 0.5, hx);
        let mut t = FluidQuantity::new(w, h, 0.5, 0.5, hx);
        let u = FluidQuantity::new(w + 1, h, 0.0, 0.5, hx);
        let v = FluidQuantity::new(w, h + 1, 0.5, 0.0, hx);

        t.fill(AMBIENT_TEMPERATURE);

        let mut particles = ParticleSet::with_seed(w, h, hx, &bodies, params.seed);
        for _ in 0..4 {
            particles.register_quantity();
        }

        let mut solver = Self {
            w,
            h,
            hx,
            density_air: params.rho_air,
            density_soot: params.rho_soot,
            diffusion: params.diffusion,
            gravity: GRAVITY,
            flip_alpha: FLIP_ALPHA,
            t_amb: AMBIENT_TEMPERATURE,
            d,
            t,
            u,
            v,
            particles,
            bodies,
            inflows: Vec::new(),
            mat: FivePointMatrix::new(w, h),
            scratch: PcgScratch::new(w, h),
            r: vec![0.0; w * h],
            p: vec![0.0; w * h],
            u_density: vec![0.0; (w + 1) * h],
            v_density: vec![0.0; w * (h + 1)],
        };
        solver.reset_particles_from_grid();
        solver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn cell_size(&self) -> f64 {
        self.hx
    }

    pub fn ambient_t(&self) -> f64 {
        self.t_amb
    }

    pub fn particle_count(&self) -> usize {
        self.particles.count()
    }

    pub fn density(&self) -> &FluidQuantity {
        &self.d
    }

    pub fn density_mut(&mut self) -> &mut FluidQuantity {
        &mut self.d
    }

    pub fn temperature(&self) -> &FluidQuantity {
        &self.t
    }

    pub fn temperature_mut(&mut self) -> &mut FluidQuantity {
        &mut self.t
    }

    pub fn velocity_u(&self) -> &FluidQuantity {
        &self.u
    }

    pub fn velocity_u_mut(&mut self) -> &mut FluidQuantity {
        &mut self.u
    }

    pub fn velocity_v(&self) -> &FluidQuantity {
        &self.v
    }

    pub fn velocity_v_mut(&mut self) -> &mut FluidQuantity {
        &mut self.v
    }

    /// The solid bodies. The host advances their poses between steps.
    pub fn bodies_mut(&mut self) -> &mut [Box<dyn SolidBody>] {
        &mut self.bodies
    }

    /// Reload every particle property from the grids (pure PIC). Call
    /// after seeding grid state directly.
    pub fn reset_particles_from_grid(&mut self) {
        self.particles
            .grid_to_particles(&[&self.d, &self.t, &self.u, &self.v], 1.0);
    }

    /// Queue an inflow rectangle (world units) carrying density,
    /// temperature and velocity. Stamped during the next `update`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_inflow(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        density: f64,
        temperature: f64,
        u: f64,
        v: f64,
    ) {
        self.inflows.push(InflowRegion {
            x,
            y,
            w,
            h,
            density,
            temperature,
            u,
            v,
        });
    }

    /// Advance the simulation by `dt`.
    pub fn update(&mut self, dt: f64) {
        self.d.fill_solid_fields(&self.bodies);
        self.t.fill_solid_fields(&self.bodies);
        self.u.fill_solid_fields(&self.bodies);
        self.v.fill_solid_fields(&self.bodies);

        self.particles.particles_to_grid(
            &mut [&mut self.d, &mut self.t, &mut self.u, &mut self.v],
            &self.bodies,
        );

        self.d.copy();
        self.t.copy();
        self.u.copy();
        self.v.copy();

        self.stamp_inflows();

        self.diffuse_heat(dt);

        self.add_buoyancy(dt);
        self.set_boundary_condition();

        self.pressure_project(dt);

        self.d.extrapolate();
        self.u.extrapolate();
        self.v.extrapolate();

        self.set_boundary_condition();

        let alpha = self.flip_alpha;
        self.d.diff(alpha);
        self.t.diff(alpha);
        self.u.diff(alpha);
        self.v.diff(alpha);

        self.particles
            .grid_to_particles(&[&self.d, &self.t, &self.u, &self.v], alpha);

        self.d.undiff(alpha);
        self.t.undiff(alpha);
        self.u.undiff(alpha);
        self.v.undiff(alpha);

        self.particles.advect(dt, &self.u, &self.v, &self.bodies);
    }

    fn stamp_inflows(&mut self) {
        let inflows = std::mem::take(&mut self.inflows);
        for f in &inflows {
            let (x0, y0) = (f.x, f.y);
            let (x1, y1) = (f.x + f.w, f.y + f.h);
            self.d.add_inflow(x0, y0, x1, y1, f.density);
            self.t.add_inflow(x0, y0, x1, y1, f.temperature);
            self.u.add_inflow(x0, y0, x1, y1, f.u);
            self.v.add_inflow(x0, y0, x1, y1, f.v);
        }
    }

    /// Buoyancy from soot load and temperature deviation, split evenly
    /// onto the two vertical faces of each cell.
    fn add_buoyancy(&mut self, dt: f64) {
        let alpha = (self.density_soot - self.density_air) / self.density_air;

        for y in 0..self.h {
            for x in 0..self.w {
                let buoyancy = dt
                    * self.gravity
                    * (alpha * self.d.at(x, y) - (self.t.at(x, y) - self.t_amb) / self.t_amb);

                *self.v.at_mut(x, y) += buoyancy * 0.5;
                *self.v.at_mut(x, y + 1) += buoyancy * 0.5;
            }
        }
    }
}

//! Lagrangian marker particles and the grid transfer pipeline.
//!
//! Particles carry one scalar property per registered grid quantity.
//! Positions are stored in cell units; solid-body queries convert to world
//! units with the cell size. Storage is flat parallel arrays preallocated
//! to `width * height * MAX_PER_CELL`; the live set is the prefix
//! `[0, count)` and deletion swaps with the last live slot.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::body::SolidBody;
use crate::constants::{AVG_PER_CELL, MAX_PER_CELL, MIN_PER_CELL, PARTICLE_SEED};
use crate::quantity::FluidQuantity;

pub struct ParticleSet {
    w: usize,
    h: usize,
    hx: f64,

    max_particles: usize,
    count: usize,

    pos_x: Vec<f64>,
    pos_y: Vec<f64>,
    /// One property array per registered quantity, in registration order.
    properties: Vec<Vec<f64>>,

    /// Deposition weight scratch, shared across quantities.
    weight: Vec<f64>,
    /// Per-cell live particle counts.
    counts: Vec<i32>,

    rng: ChaCha8Rng,
}

impl ParticleSet {
    /// Create the set and seed `AVG_PER_CELL` jittered particles per cell,
    /// rejecting positions inside solid bodies. Uses the default seed; see
    /// [`ParticleSet::with_seed`] for reproducible alternatives.
    pub fn new(w: usize, h: usize, hx: f64, bodies: &[Box<dyn SolidBody>]) -> Self {
        Self::with_seed(w, h, hx, bodies, PARTICLE_SEED)
    }

    pub fn with_seed(
        w: usize,
        h: usize,
        hx: f64,
        bodies: &[Box<dyn SolidBody>],
        seed: u64,
    ) -> Self {
        let max_particles = w * h * MAX_PER_CELL;
        let mut set = Self {
            w,
            h,
            hx,
            max_particles,
            count: 0,
            pos_x: vec![0.0; max_particles],
            pos_y: vec![0.0; max_particles],
            properties: Vec::new(),
            weight: vec![0.0; (w + 1) * (h + 1)],
            counts: vec![0; w * h],
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        set.init_particles(bodies);
        set
    }

    /// Register one more carried quantity. Properties start at zero; run a
    /// pure-PIC [`ParticleSet::grid_to_particles`] with `alpha = 1.0` to
    /// pick up the grid state.
    pub fn register_quantity(&mut self) {
        self.properties.push(vec![0.0; self.max_particles]);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    fn point_in_body(bodies: &[Box<dyn SolidBody>], hx: f64, x: f64, y: f64) -> bool {
        let p = DVec2::new(x * hx, y * hx);
        bodies.iter().any(|b| b.distance(p) < 0.0)
    }

    /// Jittered-lattice seeding: `AVG_PER_CELL` attempts per cell,
    /// positions inside solids are discarded.
    fn init_particles(&mut self, bodies: &[Box<dyn SolidBody>]) {
        let mut idx = 0;
        for y in 0..self.h {
            for x in 0..self.w {
                for _ in 0..AVG_PER_CELL {
                    let px = x as f64 + self.rng.gen::<f64>();
                    let py = y as f64 + self.rng.gen::<f64>();

                    if Self::point_in_body(bodies, self.hx, px, py) {
                        continue;
                    }
                    self.pos_x[idx] = px;
                    self.pos_y[idx] = py;
                    idx += 1;
                }
            }
        }
        self.count = idx;
    }

    fn count_particles(&mut self) {
        self.counts.fill(0);
        for i in 0..self.count {
            let ix = self.pos_x[i] as usize;
            let iy = self.pos_y[i] as usize;
            if ix < self.w && iy < self.h {
                self.counts[ix + iy * self.w] += 1;
            }
        }
    }

    /// Decimate crowded cells. Single forward pass; deletion swaps the last
    /// live particle in and re-examines the slot.
    fn prune_particles(&mut self) {
        let mut i = 0;
        while i < self.count {
            let ix = self.pos_x[i] as usize;
            let iy = self.pos_y[i] as usize;
            let idx = ix + iy * self.w;

            if self.counts[idx] > MAX_PER_CELL as i32 {
                self.count -= 1;
                let j = self.count;
                self.pos_x[i] = self.pos_x[j];
                self.pos_y[i] = self.pos_y[j];
                for prop in self.properties.iter_mut() {
                    prop[i] = prop[j];
                }
                self.counts[idx] -= 1;
            } else {
                i += 1;
            }
        }
    }

    /// Refill sparse cells up to `MIN_PER_CELL`, initializing properties by
    /// bilinear gather of each registered quantity at the spawn position.
    /// Stops silently when the preallocated capacity is reached.
    fn seed_particles(&mut self, bodies: &[Box<dyn SolidBody>], quantities: &[&FluidQuantity]) {
        for y in 0..self.h {
            for x in 0..self.w {
                let idx = x + y * self.w;
                let missing = (MIN_PER_CELL as i32 - self.counts[idx]).max(0);
                for _ in 0..missing {
                    if self.count == self.max_particles {
                        return;
                    }

                    let px = x as f64 + self.rng.gen::<f64>();
                    let py = y as f64 + self.rng.gen::<f64>();

                    if Self::point_in_body(bodies, self.hx, px, py) {
                        continue;
                    }

                    let j = self.count;
                    self.pos_x[j] = px;
                    self.pos_y[j] = py;
                    for (prop, q) in self.properties.iter_mut().zip(quantities.iter()) {
                        prop[j] = q.lerp(px, py);
                    }
                    self.count += 1;
                }
            }
        }
    }

    /// Deposit every property onto its grid quantity, extrapolate, then
    /// rebalance the particle population (prune crowded cells, reseed
    /// sparse ones). The grid is authoritative after this call.
    pub fn particles_to_grid(
        &mut self,
        quantities: &mut [&mut FluidQuantity],
        bodies: &[Box<dyn SolidBody>],
    ) {
        for (q, prop) in quantities.iter_mut().zip(self.properties.iter()) {
            q.from_particles(&mut self.weight, self.count, &self.pos_x, &self.pos_y, prop);
            q.extrapolate();
        }

        self.count_particles();
        self.prune_particles();
        let shared: Vec<&FluidQuantity> = quantities.iter().map(|q| &**q).collect();
        self.seed_particles(bodies, &shared);

        log::debug!("particle count: {}", self.count);
    }

    /// Blend grid values back onto the particles:
    /// `property = (1 - alpha) * property + gather(position)`.
    ///
    /// With `alpha = 1` this is a pure PIC load of the grid state; during a
    /// step it is called with the tiny FLIP blend factor after the grids
    /// have been turned into deltas.
    pub fn grid_to_particles(&mut self, quantities: &[&FluidQuantity], alpha: f64) {
        let count = self.count;
        let pos_x = &self.pos_x[..count];
        let pos_y = &self.pos_y[..count];

        for (prop, q) in self.properties.iter_mut().zip(quantities.iter()) {
            prop[..count]
                .par_iter_mut()
                .zip(pos_x.par_iter().zip(pos_y.par_iter()))
                .for_each(|(p, (&x, &y))| {
                    *p = (1.0 - alpha) * *p + q.lerp(x, y);
                });
        }
    }

    /// Trace every particle forward through the velocity field with
    /// third-order Runge-Kutta, push escapees out of solid bodies, and
    /// clamp into the domain.
    pub fn advect(
        &mut self,
        dt: f64,
        u: &FluidQuantity,
        v: &FluidQuantity,
        bodies: &[Box<dyn SolidBody>],
    ) {
        let count = self.count;
        let (w, h, hx) = (self.w, self.h, self.hx);

        self.pos_x[..count]
            .par_iter_mut()
            .zip(self.pos_y[..count].par_iter_mut())
            .for_each(|(x, y)| {
                runge_kutta3(x, y, dt, hx, u, v);
                back_project(bodies, hx, x, y);

                *x = x.clamp(0.0, w as f64 - 0.001);
                *y = y.clamp(0.0, h as f64 - 0.001);
            });
    }
}

/// Ralston's third-order Runge-Kutta, forward in time, in cell units.
///
/// The first two stages convert the sampled velocities to cell units; the
/// final stage reads them unscaled. The asymmetry is intentional, see
/// DESIGN.md (advection notes) before touching the stage scaling.
fn runge_kutta3(x: &mut f64, y: &mut f64, dt: f64, hx: f64, u: &FluidQuantity, v: &FluidQuantity) {
    let first_u = u.lerp(*x, *y) / hx;
    let first_v = v.lerp(*x, *y) / hx;

    let mid_x = *x + 0.5 * dt * first_u;
    let mid_y = *y + 0.5 * dt * first_v;

    let mid_u = u.lerp(mid_x, mid_y) / hx;
    let mid_v = v.lerp(mid_x, mid_y) / hx;

    let last_x = *x + 0.75 * dt * mid_u;
    let last_y = *y + 0.75 * dt * mid_v;

    let last_u = u.lerp(last_x, last_y);
    let last_v = v.lerp(last_x, last_y);

    *x += dt * ((2.0 / 9.0) * first_u + (3.0 / 9.0) * mid_u + (4.0 / 9.0) * last_u);
    *y += dt * ((2.0 / 9.0) * first_v + (3.0 / 9.0) * mid_v + (4.0 / 9.0) * last_v);
}

/// Push a particle that sank deeper than one cell into a solid back to the
/// surface, then one cell width along the outward normal.
fn back_project(bodies: &[Box<dyn SolidBody>], hx: f64, x: &mut f64, y: &mut f64) {
    let mut d = f64::INFINITY;
    let mut closest = None;
    let p = DVec2::new(*x * hx, *y * hx);

    for body in bodies {
        let id = body.distance(p);
        if id < d {
            d = id;
            closest = Some(body);
        }
    }

    if let Some(body) = closest {
        if d < -hx {
            let mut q = body.closest_surface_point(p);
            q += body.distance_normal(q) * hx;
            *x = q.x / hx;
            *y = q.y / hx;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::SolidSphere;

    fn no_bodies() -> Vec<Box<dyn SolidBody>> {
        Vec::new()
    }

    #[test]
    fn test_initial_seeding_density_and_bounds() {
        let bodies = no_bodies();
        let set = ParticleSet::new(8, 8, 1.0 / 8.0, &bodies);
        assert_eq!(set.count(), 8 * 8 * AVG_PER_CELL);
        for i in 0..set.count() {
            assert!((0.0..8.0).contains(&set.pos_x[i]));
            assert!((0.0..8.0).contains(&set.pos_y[i]));
        }
    }

    #[test]
    fn test_seeding_rejects_solid_interior() {
        let hx = 1.0 / 8.0;
        let bodies: Vec<Box<dyn SolidBody>> = vec![Box::new(SolidSphere::new(
            DVec2::new(0.5, 0.5),
            0.5,
            0.0,
            DVec2::ZERO,
            0.0,
        ))];
        let set = ParticleSet::new(8, 8, hx, &bodies);
        assert!(set.count() < 8 * 8 * AVG_PER_CELL, "some spawns must be rejected");
        for i in 0..set.count() {
            let p = DVec2::new(set.pos_x[i] * hx, set.pos_y[i] * hx);
            assert!(bodies[0].distance(p) >= 0.0, "no particle inside the sphere");
        }
    }

    #[test]
    fn test_prune_caps_cell_population() {
        let bodies = no_bodies();
        let mut set = ParticleSet::new(4, 4, 0.25, &bodies);
        set.register_quantity();

        // Cram everything into cell (0, 0).
        for i in 0..set.count() {
            set.pos_x[i] = 0.5;
            set.pos_y[i] = 0.5;
            set.properties[0][i] = i as f64;
        }
        set.count_particles();
        set.prune_particles();

        set.count_particles();
        for &c in &set.counts {
            assert!(c <= MAX_PER_CELL as i32, "cell count {c} exceeds cap");
        }
        assert_eq!(set.count(), MAX_PER_CELL);
    }

    #[test]
    fn test_seed_fill_restores_minimum() {
        let bodies = no_bodies();
        let mut set = ParticleSet::new(4, 4, 0.25, &bodies);
        set.register_quantity();

        // Empty out the set entirely, then reseed from a uniform field.
        set.count = 0;
        let mut q = FluidQuantity::new(4, 4, 0.5, 0.5, 0.25);
        q.fill(9.0);

        set.count_particles();
        set.seed_particles(&bodies, &[&q]);

        set.count_particles();
        for &c in &set.counts {
            assert!(c >= MIN_PER_CELL as i32, "cell count {c} below minimum");
        }
        for i in 0..set.count() {
            assert_eq!(set.properties[0][i], 9.0, "seeded from the grid field");
        }
    }

    #[test]
    fn test_advect_uniform_field_translates() {
        let bodies = no_bodies();
        let hx = 1.0 / 8.0;
        let mut set = ParticleSet::new(8, 8, hx, &bodies);
        let mut u = FluidQuantity::new(9, 8, 0.0, 0.5, hx);
        let mut v = FluidQuantity::new(8, 9, 0.5, 0.0, hx);
        u.fill(1.0);
        v.fill(0.0);

        let x0 = set.pos_x[0];
        let y0 = set.pos_y[0];
        let dt = 0.01;
        set.advect(dt, &u, &v, &bodies);

        // Stages 1-2 sample 1/hx = 8, the last stage samples 1 unscaled:
        // dx = dt * (2/9 * 8 + 3/9 * 8 + 4/9 * 1).
        let expected = dt * ((2.0 / 9.0) * 8.0 + (3.0 / 9.0) * 8.0 + (4.0 / 9.0) * 1.0);
        assert!(
            (set.pos_x[0] - x0 - expected).abs() < 1e-9,
            "moved {}, expected {expected}",
            set.pos_x[0] - x0
        );
        assert!((set.pos_y[0] - y0).abs() < 1e-12);
    }

    #[test]
    fn test_back_project_leaves_solids() {
        let hx = 1.0 / 8.0;
        let bodies: Vec<Box<dyn SolidBody>> = vec![Box::new(SolidSphere::new(
            DVec2::new(0.5, 0.5),
            0.8,
            0.0,
            DVec2::ZERO,
            0.0,
        ))];

        // Deep inside the sphere (distance -0.4 << -hx).
        let mut x = 4.0;
        let mut y = 4.0;
        back_project(&bodies, hx, &mut x, &mut y);
        let p = DVec2::new(x * hx, y * hx);
        assert!(
            bodies[0].distance(p) > 0.0,
            "particle must end up outside, distance {}",
            bodies[0].distance(p)
        );
    }

    #[test]
    fn test_transfer_roundtrip_preserves_uniform_value() {
        let bodies = no_bodies();
        let mut set = ParticleSet::new(8, 8, 1.0 / 8.0, &bodies);
        set.register_quantity();

        let mut q = FluidQuantity::new(8, 8, 0.5, 0.5, 1.0 / 8.0);
        q.fill(2.5);
        set.grid_to_particles(&[&q], 1.0);

        q.fill(0.0);
        set.particles_to_grid(&mut [&mut q], &bodies);

        for y in 0..8 {
            for x in 0..8 {
                assert!(
                    (q.at(x, y) - 2.5).abs() < 1e-9,
                    "cell ({x}, {y}) = {}",
                    q.at(x, y)
                );
            }
        }
    }
}

//! Pressure projection: right-hand side with cut-cell body coupling, face
//! densities, matrix assembly, the solve, and the velocity correction.

use glam::DVec2;

use super::FluidSolver;
use crate::constants::MIN_DENSITY_FRACTION;
use crate::quantity::CellType;
use crate::solve::{build_preconditioner, solve_default};

impl FluidSolver {
    /// Enforce incompressibility on the current velocity field. Builds the
    /// negative-divergence right-hand side, assembles the variational
    /// pressure matrix over the fluid cells, solves it, and corrects the
    /// face velocities.
    pub fn pressure_project(&mut self, dt: f64) {
        self.build_rhs();
        self.compute_face_densities();
        self.build_pressure_matrix(dt);

        build_preconditioner(&self.mat, self.d.cells(), &mut self.scratch.precon);
        let stats = solve_default(
            &self.mat,
            self.d.cells(),
            &mut self.scratch,
            &mut self.r,
            &mut self.p,
        );
        if stats.converged {
            log::debug!(
                "pressure solve: {} iterations, residual {:.3e}",
                stats.iterations,
                stats.residual
            );
        } else {
            log::warn!(
                "pressure solve exceeded {} iterations, residual {:.3e}",
                stats.iterations,
                stats.residual
            );
        }

        self.apply_pressure(dt);
    }

    /// Negative volume-weighted divergence per fluid cell. With bodies
    /// present, the mismatch between face and cell fluid volumes couples
    /// in the body's rigid velocity at each face center.
    fn build_rhs(&mut self) {
        let scale = 1.0 / self.hx;
        let (w, h, hx) = (self.w, self.h, self.hx);
        let cell = self.d.cells();
        let body = self.d.bodies();

        for y in 0..h {
            for x in 0..w {
                let idx = x + y * w;
                if cell[idx] != CellType::Fluid {
                    self.r[idx] = 0.0;
                    continue;
                }

                self.r[idx] = -scale
                    * (self.u.volume(x + 1, y) * self.u.at(x + 1, y)
                        - self.u.volume(x, y) * self.u.at(x, y)
                        + self.v.volume(x, y + 1) * self.v.at(x, y + 1)
                        - self.v.volume(x, y) * self.v.at(x, y));

                if self.bodies.is_empty() {
                    continue;
                }
                let vol = self.d.volume(x, y);

                if x > 0 {
                    let b = &self.bodies[body[idx - 1] as usize];
                    self.r[idx] -= (self.u.volume(x, y) - vol)
                        * b.velocity_at(DVec2::new(x as f64 * hx, (y as f64 + 0.5) * hx)).x;
                }
                if y > 0 {
                    let b = &self.bodies[body[idx - w] as usize];
                    self.r[idx] -= (self.v.volume(x, y) - vol)
                        * b.velocity_at(DVec2::new((x as f64 + 0.5) * hx, y as f64 * hx)).y;
                }
                if x < w - 1 {
                    let b = &self.bodies[body[idx + 1] as usize];
                    self.r[idx] += (self.u.volume(x + 1, y) - vol)
                        * b.velocity_at(DVec2::new((x as f64 + 1.0) * hx, (y as f64 + 0.5) * hx))
                            .x;
                }
                if y < h - 1 {
                    let b = &self.bodies[body[idx + w] as usize];
                    self.r[idx] += (self.v.volume(x, y + 1) - vol)
                        * b.velocity_at(DVec2::new((x as f64 + 0.5) * hx, (y as f64 + 1.0) * hx))
                            .y;
                }
            }
        }
    }

    /// Average the buoyant cell densities onto the faces. The mixture
    /// density falls with temperature and rises with soot load; the clamp
    /// keeps the matrix factor bounded in nearly-evacuated cells.
    fn compute_face_densities(&mut self) {
        let alpha = (self.density_soot - self.density_air) / self.density_air;
        let (w, h) = (self.w, self.h);

        self.u_density.fill(0.0);
        self.v_density.fill(0.0);

        for y in 0..h {
            for x in 0..w {
                let density = (self.density_air * self.t_amb / self.t.at(x, y)
                    * (1.0 + alpha * self.d.at(x, y)))
                .max(MIN_DENSITY_FRACTION * self.density_air);

                self.u_density[x + y * (w + 1)] += 0.5 * density;
                self.u_density[(x + 1) + y * (w + 1)] += 0.5 * density;
                self.v_density[x + y * w] += 0.5 * density;
                self.v_density[x + (y + 1) * w] += 0.5 * density;
            }
        }
    }

    /// Assemble the SPD pressure system over fluid-fluid face couplings,
    /// weighted by face fluid volume over face density.
    fn build_pressure_matrix(&mut self, dt: f64) {
        let scale = dt / (self.hx * self.hx);
        let (w, h) = (self.w, self.h);
        let cell = self.d.cells();

        self.mat.clear();

        for y in 0..h {
            for x in 0..w {
                let idx = x + y * w;
                if cell[idx] != CellType::Fluid {
                    continue;
                }

                if x < w - 1 && cell[idx + 1] == CellType::Fluid {
                    let factor =
                        scale * self.u.volume(x + 1, y) / self.u_density[(x + 1) + y * (w + 1)];
                    self.mat.diag[idx] += factor;
                    self.mat.diag[idx + 1] += factor;
                    self.mat.plus_x[idx] = -factor;
                }
                if y < h - 1 && cell[idx + w] == CellType::Fluid {
                    let factor =
                        scale * self.v.volume(x, y + 1) / self.v_density[x + (y + 1) * w];
                    self.mat.diag[idx] += factor;
                    self.mat.diag[idx + w] += factor;
                    self.mat.plus_y[idx] = -factor;
                }
            }
        }
    }

    /// Subtract the pressure gradient from the incident face velocities of
    /// every fluid cell.
    fn apply_pressure(&mut self, dt: f64) {
        let scale = dt / self.hx;
        let (w, h) = (self.w, self.h);

        for y in 0..h {
            for x in 0..w {
                let idx = x + y * w;
                if self.d.cells()[idx] != CellType::Fluid {
                    continue;
                }
                let p = self.p[idx];

                *self.u.at_mut(x, y) -= scale * p / self.u_density[x + y * (w + 1)];
                *self.v.at_mut(x, y) -= scale * p / self.v_density[x + y * w];
                *self.u.at_mut(x + 1, y) += scale * p / self.u_density[(x + 1) + y * (w + 1)];
                *self.v.at_mut(x, y + 1) += scale * p / self.v_density[x + (y + 1) * w];
            }
        }
    }

    /// Overwrite face velocities inside solids with the owning body's
    /// rigid motion, then pin the outermost wall faces to zero.
    pub(super) fn set_boundary_condition(&mut self) {
        let (w, h, hx) = (self.w, self.h, self.hx);

        for y in 0..h {
            for x in 0..w {
                let idx = x + y * w;
                if self.d.cells()[idx] != CellType::Solid {
                    continue;
                }
                let b = &self.bodies[self.d.bodies()[idx] as usize];

                // All four faces take the x component of the body velocity,
                // v faces included; see DESIGN.md (solid boundary
                // coupling) before changing this.
                *self.u.at_mut(x, y) =
                    b.velocity_at(DVec2::new(x as f64 * hx, (y as f64 + 0.5) * hx)).x;
                *self.v.at_mut(x, y) =
                    b.velocity_at(DVec2::new((x as f64 + 0.5) * hx, y as f64 * hx)).x;
                *self.u.at_mut(x + 1, y) = b
                    .velocity_at(DVec2::new((x as f64 + 1.0) * hx, (y as f64 + 0.5) * hx))
                    .x;
                *self.v.at_mut(x, y + 1) = b
                    .velocity_at(DVec2::new((x as f64 + 0.5) * hx, (y as f64 + 1.0) * hx))
                    .x;
            }
        }

        for y in 0..h {
            *self.u.at_mut(0, y) = 0.0;
            *self.u.at_mut(w, y) = 0.0;
        }
        for x in 0..w {
            *self.v.at_mut(x, 0) = 0.0;
            *self.v.at_mut(x, h) = 0.0;
        }
    }
}

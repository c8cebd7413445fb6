//! Implicit heat diffusion.
//!
//! Backward-Euler step for the temperature field: solve
//! `(I + dt * kappa * L) T_new = T` with the five-point Laplacian `L`
//! restricted to fluid-fluid couplings, reusing the shared PCG kernel.

use super::FluidSolver;
use crate::quantity::CellType;
use crate::solve::{build_preconditioner, solve_default};

impl FluidSolver {
    pub(super) fn diffuse_heat(&mut self, dt: f64) {
        self.r.copy_from_slice(self.t.src());
        self.build_heat_matrix(dt);

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
                "heat solve: {} iterations, residual {:.3e}",
                stats.iterations,
                stats.residual
            );
        } else {
            log::warn!(
                "heat solve exceeded {} iterations, residual {:.3e}",
                stats.iterations,
                stats.residual
            );
        }

        self.t.src_mut().copy_from_slice(&self.p);
        self.t.extrapolate();
    }

    fn build_heat_matrix(&mut self, dt: f64) {
        let scale = self.diffusion * dt / (self.hx * self.hx);
        let (w, h) = (self.w, self.h);
        let cell = self.d.cells();

        self.mat.diag.fill(1.0);
        self.mat.plus_x.fill(0.0);
        self.mat.plus_y.fill(0.0);

        for y in 0..h {
            for x in 0..w {
                let idx = x + y * w;
                if cell[idx] != CellType::Fluid {
                    continue;
                }

                if x < w - 1 && cell[idx + 1] == CellType::Fluid {
                    self.mat.diag[idx] += scale;
                    self.mat.diag[idx + 1] += scale;
                    self.mat.plus_x[idx] = -scale;
                }
                if y < h - 1 && cell[idx + w] == CellType::Fluid {
                    self.mat.diag[idx] += scale;
                    self.mat.diag[idx + w] += scale;
                    self.mat.plus_y[idx] = -scale;
                }
            }
        }
    }
}

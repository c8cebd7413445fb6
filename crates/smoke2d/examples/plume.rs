//! Headless buoyant-plume run with a tilted box obstacle.
//!
//! Demonstrates the host loop: queue the inflow, step the solver, advance
//! the body poses, read back the frame buffer. Prints coarse diagnostics
//! every few frames instead of rendering.

use glam::DVec2;
use smoke2d::{FluidSolver, SolidBody, SolidBox};

const SIZE: usize = 128;
const TIMESTEP: f64 = 0.0025;
const DENSITY_AIR: f64 = 0.1;
const DENSITY_SOOT: f64 = 0.25;
const DIFFUSION: f64 = 0.01;

fn main() {
    let bodies: Vec<Box<dyn SolidBody>> = vec![Box::new(SolidBox::new(
        DVec2::new(0.5, 0.6),
        DVec2::new(0.7, 0.1),
        std::f64::consts::PI * 0.25,
        DVec2::ZERO,
        0.0,
    ))];

    let mut solver = FluidSolver::new(SIZE, SIZE, DENSITY_AIR, DENSITY_SOOT, DIFFUSION, bodies);
    let mut image = vec![0u8; SIZE * SIZE * 4];

    let mut time = 0.0;
    let mut frame = 0;
    while time < 2.0 {
        for _ in 0..4 {
            let t_hot = solver.ambient_t() + 300.0;
            solver.add_inflow(0.35, 0.9, 0.1, 0.05, 1.0, t_hot, 0.0, 0.0);
            solver.update(TIMESTEP);
            time += TIMESTEP;
        }
        for body in solver.bodies_mut() {
            body.update(TIMESTEP);
        }

        solver.to_image(&mut image, false);
        frame += 1;

        let d = solver.density();
        let mut total_soot = 0.0;
        let mut peak = 0.0f64;
        for y in 0..SIZE {
            for x in 0..SIZE {
                total_soot += d.at(x, y);
                peak = peak.max(d.at(x, y));
            }
        }
        println!(
            "frame {frame:4}  t={time:.3}  particles={}  soot total={total_soot:.1} peak={peak:.3}",
            solver.particle_count()
        );
    }
}

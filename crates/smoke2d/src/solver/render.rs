//! Frame-buffer output.
//!
//! The host owns windowing, texture upload and encoding; the solver only
//! fills an RGBA8 buffer. The density panel shades soot load modulated by
//! fluid volume, with starved (empty) cells flagged pure red; the optional
//! heat panel uses a black-red-yellow-white ramp on the temperature
//! deviation.

use super::FluidSolver;
use crate::quantity::CellType;

/// Temperature deviation mapped to full ramp saturation.
const HEAT_RAMP_RANGE: f64 = 70.0;

impl FluidSolver {
    /// Write the current state as RGBA8 pixels: `w * h` pixels, or
    /// `2w * h` with `render_heat` (heat panel left, density panel right).
    pub fn to_image(&self, rgba: &mut [u8], render_heat: bool) {
        let (w, h) = (self.w, self.h);

        for y in 0..h {
            for x in 0..w {
                let idxr = if render_heat {
                    4 * (x + y * w * 2 + w)
                } else {
                    4 * (x + y * w)
                };

                let volume = self.d.volume(x, y);

                let shade = ((1.0 - self.d.at(x, y)) * volume).clamp(0.0, 1.0);
                let byte = (shade * 255.0) as u8;
                rgba[idxr] = byte;
                rgba[idxr + 1] = byte;
                rgba[idxr + 2] = byte;
                rgba[idxr + 3] = 0xFF;

                if self.d.cell_at(x, y) == CellType::Empty {
                    rgba[idxr] = 0xFF;
                    rgba[idxr + 1] = 0;
                    rgba[idxr + 2] = 0;
                }

                if render_heat {
                    let idxl = 4 * (x + y * w * 2);
                    let t = ((self.t.at(x, y) - self.t_amb).abs() / HEAT_RAMP_RANGE)
                        .clamp(0.0, 1.0);

                    let r = 1.0 + volume * ((t * 4.0).min(1.0) - 1.0);
                    let g = 1.0 + volume * ((t * 2.0).min(1.0) - 1.0);
                    let b = 1.0 + volume * ((t * 4.0 - 3.0).clamp(0.0, 1.0) - 1.0);

                    rgba[idxl] = (r * 255.0) as u8;
                    rgba[idxl + 1] = (g * 255.0) as u8;
                    rgba[idxl + 2] = (b * 255.0) as u8;
                    rgba[idxl + 3] = 0xFF;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::FluidSolver;

    #[test]
    fn test_density_panel_of_fresh_solver_is_white() {
        // d = 0 and full fluid volume everywhere: shade = 1.
        let solver = FluidSolver::new(4, 4, 0.1, 0.25, 0.0, Vec::new());
        let mut rgba = vec![0u8; 4 * 4 * 4];
        solver.to_image(&mut rgba, false);

        for px in rgba.chunks(4) {
            assert_eq!(px, &[255u8, 255, 255, 255][..]);
        }
    }

    #[test]
    fn test_heat_panel_at_ambient_is_dark() {
        // At ambient temperature the ramp sits at zero: heat pixels black,
        // density pixels white, both opaque.
        let solver = FluidSolver::new(4, 4, 0.1, 0.25, 0.0, Vec::new());
        let mut rgba = vec![0u8; 2 * 4 * 4 * 4];
        solver.to_image(&mut rgba, true);

        for y in 0..4 {
            for x in 0..4 {
                let heat = 4 * (x + y * 8);
                let dens = 4 * (x + y * 8 + 4);
                assert_eq!(&rgba[heat..heat + 4], &[0u8, 0, 0, 255][..]);
                assert_eq!(&rgba[dens..dens + 4], &[255u8, 255, 255, 255][..]);
            }
        }
    }
}

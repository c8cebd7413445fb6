//! One scalar field on the staggered MAC grid.
//!
//! Each quantity (density, temperature, u, v) lives at its own offset and
//! dimensions and owns everything the solver needs per sample: current and
//! snapshot values, cut-cell geometry against the solid bodies, and the
//! cell classification driving the pressure solve and extrapolation.

mod extrapolation;

use glam::DVec2;
use rayon::prelude::*;

use crate::body::SolidBody;
use crate::constants::MIN_CELL_VOLUME;
use crate::kernels::{cubic_pulse, hat_weight, occupancy};

/// Cell classification.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CellType {
    /// Carries fluid and participates in the pressure solve.
    Fluid,
    /// Fully inside a solid body (zero fluid volume).
    Solid,
    /// Received no particles this step; filled by extrapolation.
    Empty,
}

/// A scalar field at a staggered offset, with cut-cell geometry.
pub struct FluidQuantity {
    /// Current values.
    src: Vec<f64>,
    /// Snapshot taken at the start of the step (FLIP delta base).
    old: Vec<f64>,

    /// Corner-sampled signed distance to the nearest solid,
    /// (w+1) x (h+1).
    phi: Vec<f64>,
    /// Fluid-area fraction per cell in [0, 1]; values below
    /// `MIN_CELL_VOLUME` clamp to zero.
    volume: Vec<f64>,
    /// Outward normal of the nearest body at the cell sample.
    normal_x: Vec<f64>,
    normal_y: Vec<f64>,
    /// Cell classification.
    cell: Vec<CellType>,
    /// Index of the nearest body per cell.
    body: Vec<u8>,
    /// Scratch used by extrapolation.
    mask: Vec<u8>,

    w: usize,
    h: usize,
    ox: f64,
    oy: f64,
    hx: f64,
}

impl FluidQuantity {
    pub fn new(w: usize, h: usize, ox: f64, oy: f64, hx: f64) -> Self {
        let cells = w * h;
        Self {
            src: vec![0.0; cells],
            old: vec![0.0; cells],
            phi: vec![0.0; (w + 1) * (h + 1)],
            volume: vec![1.0; cells],
            normal_x: vec![0.0; cells],
            normal_y: vec![0.0; cells],
            cell: vec![CellType::Fluid; cells],
            body: vec![0; cells],
            mask: vec![0; cells],
            w,
            h,
            ox,
            oy,
            hx,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.w
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.h
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        x + y * self.w
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.src[x + y * self.w]
    }

    #[inline]
    pub fn at_mut(&mut self, x: usize, y: usize) -> &mut f64 {
        &mut self.src[x + y * self.w]
    }

    #[inline]
    pub fn volume(&self, x: usize, y: usize) -> f64 {
        self.volume[x + y * self.w]
    }

    #[inline]
    pub fn cell_at(&self, x: usize, y: usize) -> CellType {
        self.cell[x + y * self.w]
    }

    pub fn src(&self) -> &[f64] {
        &self.src
    }

    pub fn src_mut(&mut self) -> &mut [f64] {
        &mut self.src
    }

    pub fn cells(&self) -> &[CellType] {
        &self.cell
    }

    pub fn bodies(&self) -> &[u8] {
        &self.body
    }

    pub fn fill(&mut self, value: f64) {
        self.src.fill(value);
    }

    /// Snapshot current values as the step-start baseline.
    pub fn copy(&mut self) {
        self.old.copy_from_slice(&self.src);
    }

    /// Turn `src` into the blended per-step delta:
    /// `src -= (1 - alpha) * old`.
    pub fn diff(&mut self, alpha: f64) {
        for (s, o) in self.src.iter_mut().zip(self.old.iter()) {
            *s -= (1.0 - alpha) * o;
        }
    }

    /// Reverse `diff`, restoring the post-update values.
    pub fn undiff(&mut self, alpha: f64) {
        for (s, o) in self.src.iter_mut().zip(self.old.iter()) {
            *s += (1.0 - alpha) * o;
        }
    }

    /// Bilinear sample at grid-unit position (`x`, `y`). Coordinates are
    /// clamped so the four-cell stencil always stays in bounds.
    pub fn lerp(&self, x: f64, y: f64) -> f64 {
        let x = (x - self.ox).clamp(0.0, self.w as f64 - 1.001);
        let y = (y - self.oy).clamp(0.0, self.h as f64 - 1.001);
        let ix = x as usize;
        let iy = y as usize;
        let fx = x - ix as f64;
        let fy = y - iy as f64;

        let x00 = self.at(ix, iy);
        let x10 = self.at(ix + 1, iy);
        let x01 = self.at(ix, iy + 1);
        let x11 = self.at(ix + 1, iy + 1);

        let bottom = x00 * (1.0 - fx) + x10 * fx;
        let top = x01 * (1.0 - fx) + x11 * fx;
        bottom * (1.0 - fy) + top * fy
    }

    /// Stamp `value` into the world-space rectangle [`x0`, `x1`] x
    /// [`y0`, `y1`], feathered by a cubic pulse from the rectangle center.
    /// Overwrites only where the new magnitude exceeds the current one, so
    /// repeated stamping does not accumulate.
    pub fn add_inflow(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, value: f64) {
        let ix0 = (x0 / self.hx - self.ox) as isize;
        let iy0 = (y0 / self.hx - self.oy) as isize;
        let ix1 = (x1 / self.hx - self.ox) as isize;
        let iy1 = (y1 / self.hx - self.oy) as isize;

        for y in ix_range(iy0, iy1, self.h) {
            for x in ix_range(ix0, ix1, self.w) {
                let l = DVec2::new(
                    (2.0 * (x as f64 + 0.5) * self.hx - (x0 + x1)) / (x1 - x0),
                    (2.0 * (y as f64 + 0.5) * self.hx - (y0 + y1)) / (y1 - y0),
                )
                .length();
                let vi = cubic_pulse(l) * value;
                let idx = self.idx(x, y);
                if self.src[idx].abs() < vi.abs() {
                    self.src[idx] = vi;
                }
            }
        }
    }

    /// Deposit particle `property` values onto the grid with a hat filter,
    /// then normalize by the accumulated weights. Cells that received no
    /// particles and were Fluid are reclassified Empty for extrapolation.
    ///
    /// `weight` is caller-provided scratch of at least `w * h` entries.
    pub fn from_particles(
        &mut self,
        weight: &mut [f64],
        count: usize,
        pos_x: &[f64],
        pos_y: &[f64],
        property: &[f64],
    ) {
        self.src.fill(0.0);
        weight[..self.w * self.h].fill(0.0);

        for i in 0..count {
            let x = (pos_x[i] - self.ox).clamp(0.5, self.w as f64 - 1.5);
            let y = (pos_y[i] - self.oy).clamp(0.5, self.h as f64 - 1.5);
            let ix = x as usize;
            let iy = y as usize;

            self.add_sample(weight, property[i], x, y, ix, iy);
            self.add_sample(weight, property[i], x, y, ix + 1, iy);
            self.add_sample(weight, property[i], x, y, ix, iy + 1);
            self.add_sample(weight, property[i], x, y, ix + 1, iy + 1);
        }

        for i in 0..self.w * self.h {
            if weight[i] != 0.0 {
                self.src[i] /= weight[i];
            } else if self.cell[i] == CellType::Fluid {
                self.cell[i] = CellType::Empty;
            }
        }
    }

    #[inline]
    fn add_sample(&mut self, weight: &mut [f64], value: f64, x: f64, y: f64, ix: usize, iy: usize) {
        if ix >= self.w || iy >= self.h {
            return;
        }
        let k = hat_weight(x, y, ix, iy);
        weight[ix + iy * self.w] += k;
        self.src[ix + iy * self.w] += k * value;
    }

    /// Recompute the cut-cell geometry against the current body poses:
    /// corner signed distances, nearest-body index, fluid-area fraction,
    /// surface normal and the Fluid/Solid classification.
    pub fn fill_solid_fields(&mut self, bodies: &[Box<dyn SolidBody>]) {
        if bodies.is_empty() {
            return;
        }

        let (w, h) = (self.w, self.h);
        let (ox, oy, hx) = (self.ox, self.oy, self.hx);

        // Corner distances are independent per corner; this is the hot
        // loop over every body's distance function.
        self.phi.par_iter_mut().enumerate().for_each(|(idx, phi)| {
            let ix = idx % (w + 1);
            let iy = idx / (w + 1);
            let p = DVec2::new((ix as f64 + ox - 0.5) * hx, (iy as f64 + oy - 0.5) * hx);

            let mut d = bodies[0].distance(p);
            for body in &bodies[1..] {
                d = d.min(body.distance(p));
            }
            *phi = d;
        });

        for iy in 0..h {
            for ix in 0..w {
                let idx = ix + iy * w;
                let p = DVec2::new((ix as f64 + ox) * hx, (iy as f64 + oy) * hx);

                self.body[idx] = 0;
                let mut d = bodies[0].distance(p);
                for (i, body) in bodies.iter().enumerate().skip(1) {
                    let id = body.distance(p);
                    if id < d {
                        self.body[idx] = i as u8;
                        d = id;
                    }
                }

                let idxp = ix + iy * (w + 1);
                let mut volume = 1.0
                    - occupancy(
                        self.phi[idxp],
                        self.phi[idxp + 1],
                        self.phi[idxp + w + 1],
                        self.phi[idxp + w + 2],
                    );
                if volume < MIN_CELL_VOLUME {
                    volume = 0.0;
                }
                self.volume[idx] = volume;

                let n = bodies[self.body[idx] as usize].distance_normal(p);
                self.normal_x[idx] = n.x;
                self.normal_y[idx] = n.y;

                self.cell[idx] = if volume == 0.0 {
                    CellType::Solid
                } else {
                    CellType::Fluid
                };
            }
        }
    }

    pub(crate) fn normal_x(&self) -> &[f64] {
        &self.normal_x
    }

    pub(crate) fn normal_y(&self) -> &[f64] {
        &self.normal_y
    }
}

/// Clip an inclusive-exclusive index range against [0, bound).
#[inline]
fn ix_range(lo: isize, hi: isize, bound: usize) -> std::ops::Range<usize> {
    let lo = lo.max(0) as usize;
    let hi = (hi.max(0) as usize).min(bound);
    lo..hi.max(lo)
}

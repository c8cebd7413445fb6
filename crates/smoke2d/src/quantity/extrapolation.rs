//! Extrapolation of fluid values into Solid and Empty cells.
//!
//! After the particle deposition pass, Solid cells hold stale data and
//! Empty cells hold nothing. Both get filled here so that every bilinear
//! gather during advection and reseeding samples meaningful values:
//!
//! - Solid cells take a normal-weighted blend of the two neighbors the
//!   surface normal points at, once those neighbors are themselves valid.
//! - Empty cells take the average of their Fluid 4-neighbors as soon as at
//!   least one exists, then count as Fluid for cells further in.
//!
//! Readiness propagates over a LIFO worklist; domain-border cells are
//! excluded from the sweep and patched from their inward neighbors at the
//! end.

use super::{CellType, FluidQuantity};
use crate::kernels::sgn;

/// Border sentinel: never processed by the worklist sweep.
const MASK_LOCKED: u8 = 0xFF;

impl FluidQuantity {
    /// Build the readiness mask. For interior Solid cells, bits 1 and 2
    /// track whether the neighbor along the normal's x / y component is
    /// still missing. For interior Empty cells the mask is 1 while no
    /// Fluid 4-neighbor exists.
    fn fill_solid_mask(&mut self) {
        let (w, h) = (self.w, self.h);

        for x in 0..w {
            self.mask[x] = MASK_LOCKED;
            self.mask[x + (h - 1) * w] = MASK_LOCKED;
        }
        for y in 0..h {
            self.mask[y * w] = MASK_LOCKED;
            self.mask[y * w + w - 1] = MASK_LOCKED;
        }

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let idx = x + y * w;

                self.mask[idx] = 0;
                match self.cell[idx] {
                    CellType::Solid => {
                        let nx = self.normal_x[idx];
                        let ny = self.normal_y[idx];

                        if nx != 0.0 && self.cell_off(idx, sgn(nx)) != CellType::Fluid {
                            self.mask[idx] |= 1;
                        }
                        if ny != 0.0 && self.cell_off(idx, sgn(ny) * w as isize) != CellType::Fluid
                        {
                            self.mask[idx] |= 2;
                        }
                    }
                    CellType::Empty => {
                        let no_fluid_neighbor = self.cell[idx - 1] != CellType::Fluid
                            && self.cell[idx + 1] != CellType::Fluid
                            && self.cell[idx - w] != CellType::Fluid
                            && self.cell[idx + w] != CellType::Fluid;
                        self.mask[idx] = no_fluid_neighbor as u8;
                    }
                    CellType::Fluid => {}
                }
            }
        }
    }

    #[inline]
    fn cell_off(&self, idx: usize, off: isize) -> CellType {
        self.cell[(idx as isize + off) as usize]
    }

    /// Normal-weighted blend of the two cells the surface normal points at.
    fn extrapolate_normal(&self, idx: usize) -> f64 {
        let nx = self.normal_x[idx];
        let ny = self.normal_y[idx];

        let src_x = self.src[(idx as isize + sgn(nx)) as usize];
        let src_y = self.src[(idx as isize + sgn(ny) * self.w as isize) as usize];

        (nx.abs() * src_x + ny.abs() * src_y) / (nx.abs() + ny.abs())
    }

    /// Average of the Fluid 4-neighbors. Callers guarantee at least one
    /// exists (the worklist only admits Empty cells once it does).
    fn extrapolate_average(&self, idx: usize) -> f64 {
        let w = self.w;
        let mut value = 0.0;
        let mut count = 0;

        for off in [-1, 1, -(w as isize), w as isize] {
            let nidx = (idx as isize + off) as usize;
            if self.cell[nidx] == CellType::Fluid {
                value += self.src[nidx];
                count += 1;
            }
        }
        value / count as f64
    }

    fn free_solid_neighbour(&mut self, idx: usize, border: &mut Vec<usize>, bit: u8) {
        if self.cell[idx] == CellType::Solid {
            self.mask[idx] &= !bit;
            if self.mask[idx] == 0 {
                border.push(idx);
            }
        }
    }

    /// One valid neighbor is enough for an Empty cell to become ready.
    fn free_empty_neighbour(&mut self, idx: usize, border: &mut Vec<usize>) {
        if self.cell[idx] == CellType::Empty && self.mask[idx] == 1 {
            self.mask[idx] = 0;
            border.push(idx);
        }
    }

    /// Empty cells on the domain border copy their inward neighbor; the
    /// four corners average their two border neighbors. Everything still
    /// tagged Empty afterwards counts as Fluid again.
    fn extrapolate_empty_borders(&mut self) {
        let (w, h) = (self.w, self.h);

        for x in 1..w - 1 {
            let idx_t = x;
            let idx_b = x + (h - 1) * w;

            if self.cell[idx_t] == CellType::Empty {
                self.src[idx_t] = self.src[idx_t + w];
            }
            if self.cell[idx_b] == CellType::Empty {
                self.src[idx_b] = self.src[idx_b - w];
            }
        }

        for y in 1..h - 1 {
            let idx_l = y * w;
            let idx_r = y * w + w - 1;

            if self.cell[idx_l] == CellType::Empty {
                self.src[idx_l] = self.src[idx_l + 1];
            }
            if self.cell[idx_r] == CellType::Empty {
                self.src[idx_r] = self.src[idx_r - 1];
            }
        }

        let idx_tl = 0;
        let idx_tr = w - 1;
        let idx_bl = (h - 1) * w;
        let idx_br = h * w - 1;

        if self.cell[idx_tl] == CellType::Empty {
            self.src[idx_tl] = 0.5 * (self.src[idx_tl + 1] + self.src[idx_tl + w]);
        }
        if self.cell[idx_tr] == CellType::Empty {
            self.src[idx_tr] = 0.5 * (self.src[idx_tr - 1] + self.src[idx_tr + w]);
        }
        if self.cell[idx_bl] == CellType::Empty {
            self.src[idx_bl] = 0.5 * (self.src[idx_bl + 1] + self.src[idx_bl - w]);
        }
        if self.cell[idx_br] == CellType::Empty {
            self.src[idx_br] = 0.5 * (self.src[idx_br - 1] + self.src[idx_br - w]);
        }

        for cell in self.cell.iter_mut() {
            if *cell == CellType::Empty {
                *cell = CellType::Fluid;
            }
        }
    }

    /// Fill every non-Fluid cell from its valid neighbors. Afterwards no
    /// cell is tagged Empty and no Solid cell holds stale values adjacent
    /// to fluid.
    pub fn extrapolate(&mut self) {
        self.fill_solid_mask();

        let w = self.w;
        let mut border: Vec<usize> = Vec::new();
        for y in 1..self.h - 1 {
            for x in 1..w - 1 {
                let idx = x + y * w;
                if self.cell[idx] != CellType::Fluid && self.mask[idx] == 0 {
                    border.push(idx);
                }
            }
        }

        while let Some(idx) = border.pop() {
            if self.cell[idx] == CellType::Empty {
                self.src[idx] = self.extrapolate_average(idx);
                self.cell[idx] = CellType::Fluid;
            } else {
                self.src[idx] = self.extrapolate_normal(idx);
            }

            // A solid neighbor becomes less blocked when its normal points
            // at the value just produced.
            if self.normal_x[idx - 1] > 0.0 {
                self.free_solid_neighbour(idx - 1, &mut border, 1);
            }
            if self.normal_x[idx + 1] < 0.0 {
                self.free_solid_neighbour(idx + 1, &mut border, 1);
            }
            if self.normal_y[idx - w] > 0.0 {
                self.free_solid_neighbour(idx - w, &mut border, 2);
            }
            if self.normal_y[idx + w] < 0.0 {
                self.free_solid_neighbour(idx + w, &mut border, 2);
            }

            self.free_empty_neighbour(idx - 1, &mut border);
            self.free_empty_neighbour(idx + 1, &mut border);
            self.free_empty_neighbour(idx - w, &mut border);
            self.free_empty_neighbour(idx + w, &mut border);
        }

        self.extrapolate_empty_borders();
    }
}

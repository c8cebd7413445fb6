//! Small pure kernels shared across the solver: the cut-cell occupancy
//! table, the inflow falloff pulse, and the particle deposition filter.

/// Sign of `v` as an index offset: -1, 0 or +1.
#[inline]
pub fn sgn(v: f64) -> isize {
    (v > 0.0) as isize - (v < 0.0) as isize
}

/// Smooth bump on [-1, 1]: value 1 at the center, zero value and zero
/// derivative at the edges. Used to feather inflow rectangles.
#[inline]
pub fn cubic_pulse(x: f64) -> f64 {
    let x = x.abs().min(1.0);
    1.0 - x * x * (3.0 - 2.0 * x)
}

/// Linear hat filter weight for a sample at fractional offset
/// (`x` - `ix`, `y` - `iy`). Support is one cell in each direction.
#[inline]
pub fn hat_weight(x: f64, y: f64, ix: usize, iy: usize) -> f64 {
    (1.0 - (ix as f64 - x).abs()) * (1.0 - (iy as f64 - y).abs())
}

/// Area fraction of the triangle cut off at a corner whose signed distance
/// `inside` is negative while the two edge-adjacent distances are positive.
#[inline]
fn triangle_occupancy(out1: f64, inside: f64, out2: f64) -> f64 {
    0.5 * inside * inside / ((out1 - inside) * (out2 - inside))
}

/// Area fraction of the trapezoid cut off along one edge whose two corner
/// distances `in1`, `in2` are negative, opposite corners positive.
#[inline]
fn trapezoid_occupancy(out1: f64, out2: f64, in1: f64, in2: f64) -> f64 {
    0.5 * (-in1 / (out1 - in1) - in2 / (out2 - in2))
}

/// Fraction of a cell's area on the negative side of a signed-distance
/// field, given the four corner distances.
///
/// Corners are (x, y), (x+1, y), (x, y+1), (x+1, y+1) of the cell; the
/// sixteen sign patterns are classified over the cyclic corner order
/// d11, d12, d22, d21. Diagonal patterns (0x5, 0xA) are the sum of two
/// triangles, not the complement of a trapezoid.
pub fn occupancy(d11: f64, d12: f64, d21: f64, d22: f64) -> f64 {
    let ds = [d11, d12, d22, d21];

    let mut b = 0u8;
    for i in (0..4).rev() {
        b = (b << 1) | (ds[i] < 0.0) as u8;
    }

    match b {
        0x0 => 0.0,

        0x1 => triangle_occupancy(d21, d11, d12),
        0x2 => triangle_occupancy(d11, d12, d22),
        0x4 => triangle_occupancy(d12, d22, d21),
        0x8 => triangle_occupancy(d22, d21, d11),

        0xE => 1.0 - triangle_occupancy(-d21, -d11, -d12),
        0xD => 1.0 - triangle_occupancy(-d11, -d12, -d22),
        0xB => 1.0 - triangle_occupancy(-d12, -d22, -d21),
        0x7 => 1.0 - triangle_occupancy(-d22, -d21, -d11),

        0x3 => trapezoid_occupancy(d21, d22, d11, d12),
        0x6 => trapezoid_occupancy(d11, d21, d12, d22),
        0x9 => trapezoid_occupancy(d12, d22, d11, d21),
        0xC => trapezoid_occupancy(d11, d12, d21, d22),

        0x5 => triangle_occupancy(d11, d12, d22) + triangle_occupancy(d22, d21, d11),
        0xA => triangle_occupancy(d21, d11, d12) + triangle_occupancy(d12, d22, d21),

        _ => 1.0,
    }
}

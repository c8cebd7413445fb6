//! Rigid solid obstacles.
//!
//! Bodies expose a signed-distance view of themselves (negative inside)
//! plus the closest surface point and outward normal, and carry a rigid
//! pose that the host advances between solver steps. The solver only ever
//! borrows bodies read-only during a step.

use glam::DVec2;

/// Rotate `p` by `phi` in the solver's y-down frame.
#[inline]
fn rotate(p: DVec2, phi: f64) -> DVec2 {
    let (s, c) = phi.sin_cos();
    DVec2::new(c * p.x + s * p.y, -s * p.x + c * p.y)
}

/// Sign of `v`, mapping zero to +1. Used to pick a surface side for points
/// exactly on a box axis.
#[inline]
fn nsgn(v: f64) -> f64 {
    if v < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Pose and rigid motion shared by all solid shapes.
#[derive(Clone, Copy, Debug)]
pub struct RigidState {
    pub pos: DVec2,
    pub scale: DVec2,
    pub theta: f64,
    pub vel: DVec2,
    pub omega: f64,
}

impl RigidState {
    pub fn new(pos: DVec2, scale: DVec2, theta: f64, vel: DVec2, omega: f64) -> Self {
        Self {
            pos,
            scale,
            theta,
            vel,
            omega,
        }
    }

    /// World point into the body's unit-local frame.
    #[inline]
    fn global_to_local(&self, p: DVec2) -> DVec2 {
        rotate(p - self.pos, -self.theta) / self.scale
    }

    /// Unit-local point back into world space.
    #[inline]
    fn local_to_global(&self, p: DVec2) -> DVec2 {
        rotate(p * self.scale, self.theta) + self.pos
    }

    /// Velocity of the rigid body at world point `p`.
    #[inline]
    pub fn velocity_at(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            (self.pos.y - p.y) * self.omega + self.vel.x,
            (p.x - self.pos.x) * self.omega + self.vel.y,
        )
    }

    /// Advance the pose by one time step.
    pub fn advance(&mut self, dt: f64) {
        self.pos += self.vel * dt;
        self.theta += self.omega * dt;
    }
}

/// Capability set of a solid obstacle. Distance is negative inside the
/// body. Implementations must be `Send + Sync`: solver passes sample bodies
/// from parallel loops.
pub trait SolidBody: Send + Sync {
    fn state(&self) -> &RigidState;
    fn state_mut(&mut self) -> &mut RigidState;

    /// Signed distance from world point `p` to the body surface.
    fn distance(&self, p: DVec2) -> f64;

    /// Closest point on the body surface to world point `p`.
    fn closest_surface_point(&self, p: DVec2) -> DVec2;

    /// Outward surface normal of the body region nearest to `p`.
    fn distance_normal(&self, p: DVec2) -> DVec2;

    /// Rigid-body velocity at world point `p`.
    fn velocity_at(&self, p: DVec2) -> DVec2 {
        self.state().velocity_at(p)
    }

    /// Integrate the pose. Called by the host once per step, never by the
    /// solver.
    fn update(&mut self, dt: f64) {
        self.state_mut().advance(dt);
    }
}

/// Oriented rectangle. `scale` is the full side length per axis.
#[derive(Clone, Copy, Debug)]
pub struct SolidBox {
    state: RigidState,
}

impl SolidBox {
    pub fn new(pos: DVec2, scale: DVec2, theta: f64, vel: DVec2, omega: f64) -> Self {
        Self {
            state: RigidState::new(pos, scale, theta, vel, omega),
        }
    }
}

impl SolidBody for SolidBox {
    fn state(&self) -> &RigidState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RigidState {
        &mut self.state
    }

    fn distance(&self, p: DVec2) -> f64 {
        let q = rotate(p - self.state.pos, -self.state.theta);
        let dx = q.x.abs() - self.state.scale.x * 0.5;
        let dy = q.y.abs() - self.state.scale.y * 0.5;

        if dx >= 0.0 || dy >= 0.0 {
            DVec2::new(dx.max(0.0), dy.max(0.0)).length()
        } else {
            dx.max(dy)
        }
    }

    fn closest_surface_point(&self, p: DVec2) -> DVec2 {
        let mut q = rotate(p - self.state.pos, -self.state.theta);
        let dx = q.x.abs() - self.state.scale.x * 0.5;
        let dy = q.y.abs() - self.state.scale.y * 0.5;

        // Project onto the face of the axis with the larger overshoot; the
        // other coordinate is kept.
        if dx > dy {
            q.x = nsgn(q.x) * 0.5 * self.state.scale.x;
        } else {
            q.y = nsgn(q.y) * 0.5 * self.state.scale.y;
        }

        rotate(q, self.state.theta) + self.state.pos
    }

    fn distance_normal(&self, p: DVec2) -> DVec2 {
        let q = rotate(p - self.state.pos, -self.state.theta);
        let n = if q.x.abs() - self.state.scale.x * 0.5 > q.y.abs() - self.state.scale.y * 0.5 {
            DVec2::new(nsgn(q.x), 0.0)
        } else {
            DVec2::new(0.0, nsgn(q.y))
        };
        rotate(n, self.state.theta)
    }
}

/// Circle. `diameter` is the full extent, matching the box convention.
#[derive(Clone, Copy, Debug)]
pub struct SolidSphere {
    state: RigidState,
}

impl SolidSphere {
    pub fn new(pos: DVec2, diameter: f64, theta: f64, vel: DVec2, omega: f64) -> Self {
        Self {
            state: RigidState::new(pos, DVec2::splat(diameter), theta, vel, omega),
        }
    }
}

impl SolidSphere {
    /// Degenerate-radius guard: below this, surface point and normal fall
    /// back to a fixed direction.
    const MIN_RADIUS: f64 = 1e-4;
}

impl SolidBody for SolidSphere {
    fn state(&self) -> &RigidState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RigidState {
        &mut self.state
    }

    fn distance(&self, p: DVec2) -> f64 {
        (p - self.state.pos).length() - self.state.scale.x * 0.5
    }

    fn closest_surface_point(&self, p: DVec2) -> DVec2 {
        let q = self.state.global_to_local(p);
        let r = q.length();
        let on_surface = if r < Self::MIN_RADIUS {
            DVec2::new(0.5, 0.0)
        } else {
            q / (2.0 * r)
        };
        self.state.local_to_global(on_surface)
    }

    fn distance_normal(&self, p: DVec2) -> DVec2 {
        let d = p - self.state.pos;
        let r = d.length();
        if r < Self::MIN_RADIUS {
            DVec2::new(1.0, 0.0)
        } else {
            d / r
        }
    }
}

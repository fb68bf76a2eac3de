//! Vectors, rotations, transforms, sweeps and AABBs.
//!
//! Grounded on `box2d-lite-rs`'s `math` module for the operator-overloaded
//! `Vec2` style, generalized with the `Rot`/`Transform`/`Sweep` types
//! `spec.md` §4.1 calls for (unit-vector rotation rather than a bare angle,
//! so rotating many points per step never re-evaluates `sin`/`cos`).

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

pub const EPSILON: f32 = 1.1920929e-7;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// 2D "cross product": z-component of the 3D cross of two planar vectors.
    #[inline]
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Cross of a vector and a scalar: `v x s = (s*v.y, -s*v.x)`.
    #[inline]
    pub fn cross_scalar(self, s: f32) -> Vec2 {
        Vec2::new(s * self.y, -s * self.x)
    }

    /// Cross of a scalar and a vector: `s x v = (-s*v.y, s*v.x)`.
    #[inline]
    pub fn scalar_cross(s: f32, v: Vec2) -> Vec2 {
        Vec2::new(-s * v.y, s * v.x)
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns a unit vector and the original length. If the vector is too
    /// short to normalize, returns `(Vec2::ZERO, 0.0)` rather than NaN.
    #[inline]
    pub fn normalized(self) -> (Vec2, f32) {
        let len = self.length();
        if len < EPSILON {
            (Vec2::ZERO, 0.0)
        } else {
            (self * (1.0 / len), len)
        }
    }

    #[inline]
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    #[inline]
    pub fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }

    #[inline]
    pub fn abs(self) -> Vec2 {
        Vec2::new(self.x.abs(), self.y.abs())
    }

    #[inline]
    pub fn min(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.min(other.x), self.y.min(other.y))
    }

    #[inline]
    pub fn max(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x.max(other.x), self.y.max(other.y))
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        self + (other - self) * t
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: Vec2) -> Vec2 {
        rhs * self
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

/// A unit-length rotation stored as (cos, sin) rather than a bare angle so
/// that transforming many points doesn't re-evaluate trig functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub cos: f32,
    pub sin: f32,
}

impl Rot {
    pub const IDENTITY: Rot = Rot { cos: 1.0, sin: 0.0 };

    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self { cos: angle.cos(), sin: angle.sin() }
    }

    /// Builds a rotation from a direction vector, falling back to identity
    /// when the vector is too short to determine a direction.
    #[inline]
    pub fn from_vector(v: Vec2, fallback: Rot) -> Self {
        let (n, len) = v.normalized();
        if len < EPSILON {
            fallback
        } else {
            Self { cos: n.x, sin: n.y }
        }
    }

    #[inline]
    pub fn angle(self) -> f32 {
        self.sin.atan2(self.cos)
    }

    #[inline]
    pub fn mul_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x - self.sin * v.y, self.sin * v.x + self.cos * v.y)
    }

    #[inline]
    pub fn inv_mul_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x + self.sin * v.y, -self.sin * v.x + self.cos * v.y)
    }

    /// Composition `self * other` (rotate by `other`, then by `self`).
    #[inline]
    pub fn mul(self, other: Rot) -> Rot {
        Rot {
            cos: self.cos * other.cos - self.sin * other.sin,
            sin: self.sin * other.cos + self.cos * other.sin,
        }
    }

    /// `self^-1 * other`.
    #[inline]
    pub fn inv_mul(self, other: Rot) -> Rot {
        Rot {
            cos: self.cos * other.cos + self.sin * other.sin,
            sin: self.cos * other.sin - self.sin * other.cos,
        }
    }
}

impl Default for Rot {
    fn default() -> Self {
        Rot::IDENTITY
    }
}

/// A rigid transform: rotate then translate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform { p: Vec2::ZERO, q: Rot::IDENTITY };

    #[inline]
    pub fn new(p: Vec2, q: Rot) -> Self {
        Self { p, q }
    }

    #[inline]
    pub fn transform_point(self, v: Vec2) -> Vec2 {
        self.q.mul_vec(v) + self.p
    }

    #[inline]
    pub fn inv_transform_point(self, v: Vec2) -> Vec2 {
        self.q.inv_mul_vec(v - self.p)
    }

    /// `self^-1 * other` — composes two transforms (used to express B's
    /// pose in A's local frame during manifold construction).
    #[inline]
    pub fn inv_mul(self, other: Transform) -> Transform {
        Transform {
            q: self.q.inv_mul(other.q),
            p: self.q.inv_mul_vec(other.p - self.p),
        }
    }
}

/// Row-major 2x2 matrix with a Cramer's-rule solve, used for the block
/// contact solver and 2-DOF joints (wheel, weld point constraint, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    #[inline]
    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    #[inline]
    pub fn from_cols(a11: f32, a12: f32, a21: f32, a22: f32) -> Self {
        Self { ex: Vec2::new(a11, a21), ey: Vec2::new(a12, a22) }
    }

    #[inline]
    pub fn mul_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(self.ex.x * v.x + self.ey.x * v.y, self.ex.y * v.x + self.ey.y * v.y)
    }

    #[inline]
    pub fn determinant(self) -> f32 {
        self.ex.x * self.ey.y - self.ey.x * self.ex.y
    }

    /// Solves `self * x = b`, degrading to a zero row when singular (spec
    /// §4.11: singular joint mass matrices degrade to zero effective mass).
    #[inline]
    pub fn solve(self, b: Vec2) -> Vec2 {
        let det = self.determinant();
        if det.abs() < EPSILON {
            return Vec2::ZERO;
        }
        let inv_det = 1.0 / det;
        Vec2::new(
            inv_det * (self.ey.y * b.x - self.ey.x * b.y),
            inv_det * (self.ex.x * b.y - self.ex.y * b.x),
        )
    }

    #[inline]
    pub fn inverse(self) -> Mat22 {
        let det = self.determinant();
        if det.abs() < EPSILON {
            return Mat22::default();
        }
        let inv_det = 1.0 / det;
        Mat22::from_cols(
            inv_det * self.ey.y,
            -inv_det * self.ey.x,
            -inv_det * self.ex.y,
            inv_det * self.ex.x,
        )
    }
}

/// Column-major 3x3 matrix, used for the weld/friction joint's combined
/// point+angle mass matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mat33 {
    pub ex: [f32; 3],
    pub ey: [f32; 3],
    pub ez: [f32; 3],
}

impl Mat33 {
    #[inline]
    pub fn new(ex: [f32; 3], ey: [f32; 3], ez: [f32; 3]) -> Self {
        Self { ex, ey, ez }
    }

    fn cross3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
    }

    fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Solves `self * x = b` via Cramer's rule, degrading to zero when
    /// singular.
    pub fn solve33(self, b: [f32; 3]) -> [f32; 3] {
        let mut det = Self::dot3(self.ex, Self::cross3(self.ey, self.ez));
        if det.abs() < EPSILON {
            return [0.0; 3];
        }
        det = 1.0 / det;
        let x = det * Self::dot3(b, Self::cross3(self.ey, self.ez));
        let y = det * Self::dot3(self.ex, Self::cross3(b, self.ez));
        let z = det * Self::dot3(self.ex, Self::cross3(self.ey, b));
        [x, y, z]
    }

    /// Solves the top-left 2x2 block only (used by joints that drop the
    /// angular row when it is inactive).
    pub fn solve22(self, b: Vec2) -> Vec2 {
        let a11 = self.ex[0];
        let a12 = self.ey[0];
        let a21 = self.ex[1];
        let a22 = self.ey[1];
        let mut det = a11 * a22 - a12 * a21;
        if det.abs() < EPSILON {
            return Vec2::ZERO;
        }
        det = 1.0 / det;
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    #[inline]
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// An AABB that contains nothing; unioning it with anything yields the
    /// other operand unchanged.
    pub fn empty() -> Self {
        Self { lower: Vec2::new(f32::MAX, f32::MAX), upper: Vec2::new(f32::MIN, f32::MIN) }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && self.lower.is_finite() && self.upper.is_finite()
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { lower: self.lower.min(other.lower), upper: self.upper.max(other.upper) }
    }

    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
    }

    #[inline]
    pub fn perimeter(&self) -> f32 {
        let d = self.upper - self.lower;
        2.0 * (d.x + d.y)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    #[inline]
    pub fn extend(&self, margin: f32) -> Aabb {
        let m = Vec2::new(margin, margin);
        Aabb { lower: self.lower - m, upper: self.upper + m }
    }
}

/// Interpolated motion between two poses, used by the TOI sub-stepper.
///
/// `pos0` is the pose at the start of the current sub-stepping window
/// (normalized time `alpha0`), `pos1` is the pose at the end of the full
/// step (normalized time 1). `local_center` is the body's center of mass
/// in its own local frame, since sweeps interpolate about the center of
/// mass rather than the origin.
#[derive(Debug, Clone, Copy)]
pub struct Sweep {
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c1: Vec2,
    pub a0: f32,
    pub a1: f32,
    pub alpha0: f32,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c1: Vec2::ZERO,
            a0: 0.0,
            a1: 0.0,
            alpha0: 0.0,
        }
    }
}

impl Sweep {
    /// Moves `pos0` forward to the pose at normalized time `alpha` and
    /// resets `alpha0` to it. Used when a contact has been advanced partway
    /// through a TOI sub-step and the remaining motion must restart from
    /// there.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 = self.c0.lerp(self.c1, beta);
        self.a0 += beta * (self.a1 - self.a0);
        self.alpha0 = alpha;
    }

    /// World transform at normalized time `beta` in `[0, 1]`.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let c = self.c0.lerp(self.c1, beta);
        let angle = self.a0 + beta * (self.a1 - self.a0);
        let q = Rot::from_angle(angle);
        // The sweep tracks the center of mass; shift back to the body origin.
        let p = c - q.mul_vec(self.local_center);
        Transform::new(p, q)
    }

    pub fn normalize(&mut self) {
        let two_pi = std::f32::consts::TAU;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a1 -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_round_trip() {
        let r = Rot::from_angle(0.7);
        let v = Vec2::new(3.0, -2.0);
        let rotated = r.mul_vec(v);
        let back = r.inv_mul_vec(rotated);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-5);
    }

    #[test]
    fn transform_round_trip() {
        let t = Transform::new(Vec2::new(5.0, -1.0), Rot::from_angle(1.2));
        let v = Vec2::new(-3.0, 4.0);
        let w = t.transform_point(v);
        let back = t.inv_transform_point(w);
        assert_relative_eq!(back.x, v.x, epsilon = 1e-4);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-4);
    }

    #[test]
    fn aabb_union_contains_both() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 0.5));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn mat22_solve_matches_cramer() {
        let m = Mat22::from_cols(2.0, 0.0, 0.0, 4.0);
        let x = m.solve(Vec2::new(4.0, 8.0));
        assert_relative_eq!(x.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(x.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn mat22_solve_singular_degrades_to_zero() {
        let m = Mat22::from_cols(1.0, 2.0, 2.0, 4.0);
        let x = m.solve(Vec2::new(1.0, 1.0));
        assert_eq!(x, Vec2::ZERO);
    }

    #[test]
    fn sweep_advance_moves_pos0() {
        let mut s = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(0.0, 0.0),
            c1: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a1: 0.0,
            alpha0: 0.0,
        };
        s.advance(0.5);
        assert_relative_eq!(s.c0.x, 5.0, epsilon = 1e-5);
        assert_eq!(s.alpha0, 0.5);
    }
}

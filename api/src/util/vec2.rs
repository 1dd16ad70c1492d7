use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// 2D vector in arena world units (origin = arena center)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians, 0 = +x)
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub fn dot(&self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn distance_to(&self, other: Vec2) -> f32 {
        (*self - other).length()
    }

    #[inline]
    pub fn distance_sq_to(&self, other: Vec2) -> f32 {
        (*self - other).length_sq()
    }

    pub fn clamp_length(&self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            *self * (max / len)
        } else {
            *self
        }
    }

    pub fn lerp(&self, other: Vec2, t: f32) -> Self {
        *self + (other - *self) * t
    }

    /// Perpendicular vector (rotated 90 degrees counter-clockwise)
    pub fn perpendicular(&self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Angle of this vector in radians
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Bearing from `self` toward `other` in radians
    pub fn bearing_to(&self, other: Vec2) -> f32 {
        (other - *self).angle()
    }

    /// Clamp both components into `[-half_extent, half_extent]`
    pub fn clamp_to_square(&self, half_extent: f32) -> Self {
        Self {
            x: self.x.clamp(-half_extent, half_extent),
            y: self.y.clamp(-half_extent, half_extent),
        }
    }

    /// Shortest distance from `self` to the segment `a`-`b`
    pub fn distance_to_segment(&self, a: Vec2, b: Vec2) -> f32 {
        let ab = b - a;
        let len_sq = ab.length_sq();
        if len_sq <= f32::EPSILON {
            return self.distance_to(a);
        }
        let t = ((*self - a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.distance_to(a + ab * t)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Signed smallest difference `b - a`, wrapped into `(-PI, PI]`
pub fn angle_diff(a: f32, b: f32) -> f32 {
    let mut d = (b - a) % TAU;
    if d > PI {
        d -= TAU;
    } else if d <= -PI {
        d += TAU;
    }
    d
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_normalize_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_bearing_to() {
        let a = Vec2::new(0.0, 0.0);
        assert!(approx_eq(a.bearing_to(Vec2::new(0.0, 10.0)), PI / 2.0));
        assert!(approx_eq(a.bearing_to(Vec2::new(-5.0, 0.0)), PI));
    }

    #[test]
    fn test_angle_diff_wraps() {
        assert!(approx_eq(angle_diff(3.0, -3.0), TAU - 6.0));
        assert!(approx_eq(angle_diff(-3.0, 3.0), 6.0 - TAU));
        assert!(approx_eq(angle_diff(0.5, 1.0), 0.5));
    }

    #[test]
    fn test_distance_to_segment() {
        let p = Vec2::new(5.0, 3.0);
        assert!(approx_eq(p.distance_to_segment(Vec2::ZERO, Vec2::new(10.0, 0.0)), 3.0));
        // Beyond the end cap, distance is to the endpoint
        let q = Vec2::new(13.0, 4.0);
        assert!(approx_eq(q.distance_to_segment(Vec2::ZERO, Vec2::new(10.0, 0.0)), 5.0));
        // Degenerate segment
        assert!(approx_eq(q.distance_to_segment(Vec2::ZERO, Vec2::ZERO), q.length()));
    }

    #[test]
    fn test_clamp_to_square() {
        let v = Vec2::new(250.0, -900.0).clamp_to_square(500.0);
        assert_eq!(v, Vec2::new(250.0, -500.0));
    }

    #[test]
    fn test_clamp_length() {
        let v = Vec2::new(3.0, 4.0).clamp_length(1.0);
        assert!(approx_eq(v.length(), 1.0));
        let small = Vec2::new(0.3, 0.4).clamp_length(1.0);
        assert_eq!(small, Vec2::new(0.3, 0.4));
    }

    #[test]
    fn test_serde() {
        let v = Vec2::new(1.5, -2.0);
        let json = serde_json::to_string(&v).unwrap();
        let back: Vec2 = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}

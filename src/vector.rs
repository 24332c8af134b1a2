use std::ops::{ Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign };

use serde::{ Deserialize, Serialize };

use crate::feq;

/// A three component vector.
///
/// Used for points, directions and normals alike; which one a value is only
/// matters when it is pushed through a transform (see `Xform`).
///
/// Serialized as a `[x, y, z]` array.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Vec3 {
    fn eq(&self, other: &Vec3) -> bool {
        feq(self.x, other.x) &&
            feq(self.y, other.y) &&
            feq(self.z, other.z)
    }
}

impl From<&Vec<f64>> for Vec3 {
    fn from(v: &Vec<f64>) -> Vec3 {
        match v.len() {
            0 => Default::default(),
            1 => Vec3 { x: v[0], ..Default::default() },
            2 => Vec3 { x: v[0], y: v[1], ..Default::default() },
            _ => Vec3 { x: v[0], y: v[1], z: v[2] }
        }
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Vec3 {
        Vec3 { x: v[0], y: v[1], z: v[2] }
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> [f64; 3] {
        [v.x, v.y, v.z]
    }
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3 { x, y, z }
    }

    pub const fn zero() -> Vec3 {
        Vec3 { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// A vector with all three components set to `v`.
    pub const fn splat(v: f64) -> Vec3 {
        Vec3 { x: v, y: v, z: v }
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    /// Returns a unit length copy of the vector.
    ///
    /// A zero vector is returned unchanged instead of turning into NaNs.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag > 0.0 {
            *self * (1.0 / mag)
        } else {
            *self
        }
    }

    /// Component-wise product.
    pub fn hadamard(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.x * other.x,
            y: self.y * other.y,
            z: self.z * other.z,
        }
    }

    pub fn min(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    pub fn max(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }

    /// Linear interpolation, `self` at `t == 0` and `other` at `t == 1`.
    pub fn lerp(&self, other: &Vec3, t: f64) -> Vec3 {
        *self + (*other - *self) * t
    }

    /// Reflects a direction about a normal.
    pub fn reflect(&self, normal: &Vec3) -> Vec3 {
        *self - *normal * (2.0 * self.dot(normal))
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Index<usize> for Vec3 {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

impl IndexMut<usize> for Vec3 {
    fn index_mut(&mut self, axis: usize) -> &mut f64 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z
        }
    }
}

impl SubAssign for Vec3 {
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z }
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, other: f64) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
            z: self.z * other
        }
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;

    fn mul(self, other: Vec3) -> Vec3 {
        other * self
    }
}

impl MulAssign<f64> for Vec3 {
    fn mul_assign(&mut self, other: f64) {
        self.x *= other;
        self.y *= other;
        self.z *= other;
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;

    fn div(self, other: f64) -> Self {
        Self {
            x: self.x / other,
            y: self.y / other,
            z: self.z / other
        }
    }
}

/* Tests */

#[test]
fn add_vectors() {
    let a = Vec3::new(3.0, -2.0, 5.0);
    let b = Vec3::new(-2.0, 3.0, 1.0);

    assert_eq!(a + b, Vec3::new(1.0, 1.0, 6.0));
}

#[test]
fn cross_product() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(2.0, 3.0, 4.0);

    assert_eq!(a.cross(&b), Vec3::new(-1.0, 2.0, -1.0));
    assert_eq!(b.cross(&a), Vec3::new(1.0, -2.0, 1.0));
}

#[test]
fn normalize_zero_vector() {
    assert_eq!(Vec3::zero().normalize(), Vec3::zero());
    assert_eq!(Vec3::new(4.0, 0.0, 0.0).normalize(), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn reflect_at_45_degrees() {
    let v = Vec3::new(1.0, -1.0, 0.0);
    let n = Vec3::new(0.0, 1.0, 0.0);

    assert_eq!(v.reflect(&n), Vec3::new(1.0, 1.0, 0.0));
}

#[test]
fn axis_indexing() {
    let mut v = Vec3::new(1.0, 2.0, 3.0);
    v[2] = 7.0;

    assert_eq!(v[0], 1.0);
    assert_eq!(v[1], 2.0);
    assert_eq!(v.z, 7.0);
}

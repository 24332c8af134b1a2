use std::fmt;
use std::ops::{ Index, IndexMut, Mul };

use crate::feq;
use crate::vector::Vec3;

/// A 3x3 matrix, only used to evaluate 4x4 minors.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Matrix3D {
    data: [f64; 9],
}

impl Index<(usize, usize)> for Matrix3D {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[(index.0 * 3) + index.1]
    }
}

impl Matrix3D {
    /// Determinant by expansion along the first row.
    fn determinant(&self) -> f64 {
        self[(0, 0)] * (self[(1, 1)] * self[(2, 2)] - self[(1, 2)] * self[(2, 1)])
            - self[(0, 1)] * (self[(1, 0)] * self[(2, 2)] - self[(1, 2)] * self[(2, 0)])
            + self[(0, 2)] * (self[(1, 0)] * self[(2, 1)] - self[(1, 1)] * self[(2, 0)])
    }
}

/// A 4x4 affine matrix.
///
/// Matrices act on column vectors: a point `p` maps to `M * p`. Composing
/// `A * B` therefore applies `B` first and `A` second.
///
/// Rotation and shear builders follow the engine's scene conventions rather
/// than textbook right-handed rotations. See the individual constructors.
#[derive(Copy, Clone, Debug, Default)]
pub struct Matrix4D {
    data: [f64; 16],
}

/// Matrices are compared element-wise with a small tolerance.
impl PartialEq for Matrix4D {
    fn eq(&self, other: &Matrix4D) -> bool {
        self.data.iter().zip(other.data.iter()).all(|(x, y)| feq(*x, *y))
    }
}

impl Matrix4D {
    /// Creates a new `Matrix4D`. All elements are initialized to `0.0`.
    pub fn new() -> Matrix4D {
        Matrix4D { data: [0.0; 16] }
    }

    /// Instantiates a 4x4 identity matrix.
    pub fn identity() -> Matrix4D {
        let mut buf = [0.0; 16];
        buf[0] = 1.0; buf[5] = 1.0; buf[10] = 1.0; buf[15] = 1.0;

        Matrix4D { data: buf }
    }

    /// Offsets a point by `v`.
    pub fn translation(v: Vec3) -> Matrix4D {
        let mut trans = Self::identity();
        trans[(0, 3)] = v.x;
        trans[(1, 3)] = v.y;
        trans[(2, 3)] = v.z;

        trans
    }

    /// Scales points along each axis by the components of `v`.
    pub fn scaling(v: Vec3) -> Matrix4D {
        let mut scale = Self::identity();
        scale[(0, 0)] = v.x;
        scale[(1, 1)] = v.y;
        scale[(2, 2)] = v.z;

        scale
    }

    /// Rotation about the X axis by `r` radians.
    ///
    /// Maps `(y, z)` to `(y cos r + z sin r, -y sin r + z cos r)`, so a
    /// positive angle turns +Y towards -Z.
    pub fn rotation_x(r: f64) -> Matrix4D {
        let (s, c) = r.sin_cos();
        let mut rotate = Self::identity();
        rotate[(1, 1)] = c;
        rotate[(1, 2)] = s;
        rotate[(2, 1)] = -s;
        rotate[(2, 2)] = c;

        rotate
    }

    /// Rotation about the Y axis by `r` radians.
    ///
    /// Maps `(x, z)` to `(x cos r - z sin r, x sin r + z cos r)`.
    pub fn rotation_y(r: f64) -> Matrix4D {
        let (s, c) = r.sin_cos();
        let mut rotate = Self::identity();
        rotate[(0, 0)] = c;
        rotate[(0, 2)] = -s;
        rotate[(2, 0)] = s;
        rotate[(2, 2)] = c;

        rotate
    }

    /// Rotation about the Z axis by `r` radians.
    ///
    /// Maps `(x, y)` to `(x cos r + y sin r, -x sin r + y cos r)`.
    pub fn rotation_z(r: f64) -> Matrix4D {
        let (s, c) = r.sin_cos();
        let mut rotate = Self::identity();
        rotate[(0, 0)] = c;
        rotate[(0, 1)] = s;
        rotate[(1, 0)] = -s;
        rotate[(1, 1)] = c;

        rotate
    }

    /// A shear driven by one axis.
    ///
    /// The driving `axis` (0, 1 or 2) adds `u` and `v` times its coordinate
    /// to the two remaining axes, in x, y, z order. For example, with
    /// `axis == 0` a point gets `y += x * u` and `z += x * v`.
    pub fn shearing(axis: usize, u: f64, v: f64) -> Matrix4D {
        let mut shear = Self::identity();
        let (a, b) = match axis {
            0 => (1, 2),
            1 => (0, 2),
            _ => (0, 1),
        };
        let axis = axis.min(2);
        shear[(a, axis)] = u;
        shear[(b, axis)] = v;

        shear
    }

    /// Produces the transpose of a matrix, returning a new matrix as a result.
    pub fn transposition(&self) -> Matrix4D {
        let mut buf = *self;

        for r in 0..4 {
            for c in (r+1)..4 {
                buf.data.swap(r * 4 + c, c * 4 + r);
            }
        }

        buf
    }

    /// Returns the 3x3 matrix left after removing `row` and `col`.
    fn submatrix(&self, row: usize, col: usize) -> Matrix3D {
        let mut buf: [f64; 9] = [0.0; 9];
        let mut count = 0;

        for r in (0..4).filter(|r| *r != row) {
            for c in (0..4).filter(|c| *c != col) {
                buf[count] = self[(r, c)];
                count += 1;
            }
        }

        Matrix3D { data: buf }
    }

    /// The signed minor at `row` and `col`.
    pub fn cofactor(&self, row: usize, col: usize) -> f64 {
        let m = self.submatrix(row, col).determinant();
        if (row + col) % 2 == 0 { m } else { -m }
    }

    pub fn determinant(&self) -> f64 {
        (0..4).map(|c| self[(0, c)] * self.cofactor(0, c)).sum()
    }

    /// Calculates the inverse of a `Matrix4D`, if it exists.
    ///
    /// Returns `None` for singular matrices.
    pub fn inverse(&self) -> Option<Matrix4D> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let mut inv = Matrix4D::new();
        for r in 0..4 {
            for c in 0..4 {
                inv[(c, r)] = self.cofactor(r, c) / det;
            }
        }

        Some(inv)
    }

    /// Applies the full affine transform to a point.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3 {
            x: self[(0, 0)] * p.x + self[(0, 1)] * p.y + self[(0, 2)] * p.z + self[(0, 3)],
            y: self[(1, 0)] * p.x + self[(1, 1)] * p.y + self[(1, 2)] * p.z + self[(1, 3)],
            z: self[(2, 0)] * p.x + self[(2, 1)] * p.y + self[(2, 2)] * p.z + self[(2, 3)],
        }
    }

    /// Applies only the linear part, ignoring translation.
    pub fn transform_dir(&self, d: Vec3) -> Vec3 {
        Vec3 {
            x: self[(0, 0)] * d.x + self[(0, 1)] * d.y + self[(0, 2)] * d.z,
            y: self[(1, 0)] * d.x + self[(1, 1)] * d.y + self[(1, 2)] * d.z,
            z: self[(2, 0)] * d.x + self[(2, 1)] * d.y + self[(2, 2)] * d.z,
        }
    }

    /// Multiplies by the transpose of the linear part, then renormalizes.
    ///
    /// Pass the inverse of a transform to carry normals through it.
    pub fn transform_normal(&self, n: Vec3) -> Vec3 {
        Vec3 {
            x: self[(0, 0)] * n.x + self[(1, 0)] * n.y + self[(2, 0)] * n.z,
            y: self[(0, 1)] * n.x + self[(1, 1)] * n.y + self[(2, 1)] * n.z,
            z: self[(0, 2)] * n.x + self[(1, 2)] * n.y + self[(2, 2)] * n.z,
        }.normalize()
    }
}

impl From<[f64; 16]> for Matrix4D {
    fn from(data: [f64; 16]) -> Matrix4D {
        Matrix4D { data }
    }
}

impl Index<(usize, usize)> for Matrix4D {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.data[(index.0 * 4) + index.1]
    }
}

impl IndexMut<(usize, usize)> for Matrix4D {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut f64 {
        &mut self.data[(index.0 * 4) + index.1]
    }
}

impl Mul<Matrix4D> for Matrix4D {
    type Output = Matrix4D;

    fn mul(self, other: Matrix4D) -> Matrix4D {
        let mut res = Matrix4D::new();

        for r in 0..4 {
            for c in 0..4 {
                res[(r, c)] = self[(r, 0)] * other[(0, c)]
                    + self[(r, 1)] * other[(1, c)]
                    + self[(r, 2)] * other[(2, c)]
                    + self[(r, 3)] * other[(3, c)]
            }
        }

        res
    }
}

impl fmt::Display for Matrix4D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            write!(f, "|")?;
            for c in 0..4 {
                write!(f, " {} |", self[(r, c)])?;
            }

            if r != 3 {
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

/* Tests */

#[test]
fn identity() {
    let m = Matrix4D::from([
        1.0, 2.0, 3.0, 4.0,
        5.0, 6.0, 7.0, 8.0,
        9.0, 8.0, 7.0, 6.0,
        5.0, 4.0, 3.0, 2.0,
    ]);

    assert_eq!(m * Matrix4D::identity(), m);
    assert_eq!(Matrix4D::identity() * m, m);
}

#[test]
fn transpose() {
    let m = Matrix4D::from([
        0.0, 9.0, 3.0, 0.0,
        9.0, 8.0, 0.0, 8.0,
        1.0, 8.0, 5.0, 3.0,
        0.0, 0.0, 5.0, 8.0,
    ]);
    let t = Matrix4D::from([
        0.0, 9.0, 1.0, 0.0,
        9.0, 8.0, 8.0, 0.0,
        3.0, 0.0, 5.0, 5.0,
        0.0, 8.0, 3.0, 8.0,
    ]);

    assert_eq!(m.transposition(), t);
}

#[test]
fn determinant() {
    let m = Matrix4D::from([
        -2.0, -8.0,  3.0,  5.0,
        -3.0,  1.0,  7.0,  3.0,
         1.0,  2.0, -9.0,  6.0,
        -6.0,  7.0,  7.0, -9.0,
    ]);

    assert_eq!(m.cofactor(0, 0), 690.0);
    assert_eq!(m.cofactor(0, 3), 51.0);
    assert_eq!(m.determinant(), -4071.0);
}

#[test]
fn inverse_multiplies_to_identity() {
    let m = Matrix4D::from([
        3.0, -9.0,  7.0,  3.0,
        3.0, -8.0,  2.0, -9.0,
       -4.0,  4.0,  4.0,  1.0,
       -6.0,  5.0, -1.0,  1.0,
    ]);
    let inv = m.inverse().unwrap();

    assert_eq!(m * inv, Matrix4D::identity());
}

#[test]
fn singular_has_no_inverse() {
    assert!(Matrix4D::scaling(Vec3::new(1.0, 0.0, 1.0)).inverse().is_none());
}

#[test]
fn translate_point_not_direction() {
    let m = Matrix4D::translation(Vec3::new(5.0, -3.0, 2.0));
    let p = Vec3::new(-3.0, 4.0, 5.0);

    assert_eq!(m.transform_point(p), Vec3::new(2.0, 1.0, 7.0));
    assert_eq!(m.transform_dir(p), p);
}

#[test]
fn rotation_conventions() {
    let quarter = std::f64::consts::FRAC_PI_2;

    assert_eq!(Matrix4D::rotation_x(quarter).transform_point(Vec3::new(0.0, 1.0, 0.0)),
        Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(Matrix4D::rotation_y(quarter).transform_point(Vec3::new(1.0, 0.0, 0.0)),
        Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(Matrix4D::rotation_z(quarter).transform_point(Vec3::new(1.0, 0.0, 0.0)),
        Vec3::new(0.0, -1.0, 0.0));
}

#[test]
fn shear_by_axis() {
    let p = Vec3::new(1.0, 2.0, 3.0);

    assert_eq!(Matrix4D::shearing(0, 2.0, 3.0).transform_point(p), Vec3::new(1.0, 4.0, 6.0));
    assert_eq!(Matrix4D::shearing(1, 2.0, 3.0).transform_point(p), Vec3::new(5.0, 2.0, 9.0));
    assert_eq!(Matrix4D::shearing(2, 2.0, 3.0).transform_point(p), Vec3::new(7.0, 11.0, 3.0));
}

#[test]
fn normal_through_inverse_scale() {
    let m = Matrix4D::scaling(Vec3::new(1.0, 0.5, 1.0));
    let inv = m.inverse().unwrap();
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let n = inv.transform_normal(Vec3::new(0.0, s, -s));

    assert_eq!(n, Vec3::new(0.0, 0.89443, -0.44721));
}

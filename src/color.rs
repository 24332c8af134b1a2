use std::ops::{ Add, AddAssign, Mul, MulAssign, Sub };

use serde::{ Deserialize, Serialize };

use crate::feq;

/// A linear RGB color.
///
/// Also used for per-channel coefficients (ambient, diffuse, reflection and
/// so on) and for the weights that ride along recursive rays, so components
/// are not limited to `[0, 1]` while tracing. Clamping happens only when a
/// color is written out.
///
/// # Examples
///
/// ```
/// # use ray_engine::color::Color;
/// let tint = Color::rgb(1.0, 0.5, 0.0);
/// assert_eq!(tint * Color::white(), tint);
/// assert_eq!(Color::black().lerp(&Color::white(), 0.25), Color::rgb(0.25, 0.25, 0.25));
/// ```
#[derive(Copy, Clone, Debug, Default, PartialOrd, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Colors are compared component-wise with a small tolerance.
impl PartialEq for Color {
    fn eq(&self, other: &Color) -> bool {
        feq(self.r, other.r) &&
            feq(self.g, other.g) &&
            feq(self.b, other.b)
    }
}

/// Takes up to three leading values of a vector as `r`, `g` and `b`.
///
/// Missing components default to zero.
impl From<&Vec<f64>> for Color {
    fn from(v: &Vec<f64>) -> Color {
        match v.len() {
            0 => Default::default(),
            1 => Color { r: v[0], ..Default::default() },
            2 => Color { r: v[0], g: v[1], ..Default::default() },
            _ => Color { r: v[0], g: v[1], b: v[2] }
        }
    }
}

impl From<[f64; 3]> for Color {
    fn from(v: [f64; 3]) -> Color {
        Color { r: v[0], g: v[1], b: v[2] }
    }
}

impl From<Color> for [f64; 3] {
    fn from(c: Color) -> [f64; 3] {
        [c.r, c.g, c.b]
    }
}

impl Color {
    pub const fn rgb(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    /// All three channels set to `v`.
    pub const fn splat(v: f64) -> Color {
        Color { r: v, g: v, b: v }
    }

    pub const fn black() -> Color {
        Color::splat(0.0)
    }

    pub const fn white() -> Color {
        Color::splat(1.0)
    }

    pub const fn red() -> Color {
        Color::rgb(1.0, 0.0, 0.0)
    }

    pub const fn green() -> Color {
        Color::rgb(0.0, 1.0, 0.0)
    }

    pub const fn blue() -> Color {
        Color::rgb(0.0, 0.0, 1.0)
    }

    /// Channel-wise product.
    pub fn hadamard(c1: &Color, c2: &Color) -> Color {
        Color {
            r: c1.r * c2.r,
            g: c1.g * c2.g,
            b: c1.b * c2.b,
        }
    }

    /// Blend from `self` at `t == 0` to `other` at `t == 1`.
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        *self + (*other - *self) * t
    }

    /// Length of the color seen as a 3-vector.
    ///
    /// Recursive rays compare their accumulated weight against a cutoff with
    /// this.
    pub fn magnitude(&self) -> f64 {
        (self.r * self.r + self.g * self.g + self.b * self.b).sqrt()
    }

    /// Perceptual gray level.
    pub fn gray(&self) -> f64 {
        0.33 * self.r + 0.56 * self.g + 0.11 * self.b
    }

    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    /// Limits each channel to `[0, 0.999999]` for output.
    pub fn clamped(&self) -> Color {
        let c = |v: f64| v.max(0.0).min(0.999999);
        Color::rgb(c(self.r), c(self.g), c(self.b))
    }
}

impl Add<Color> for Color {
    type Output = Color;

    fn add(self, other: Color) -> Self::Output {
        Color {
            r: self.r + other.r,
            g: self.g + other.g,
            b: self.b + other.b,
        }
    }
}

impl AddAssign<Color> for Color {
    fn add_assign(&mut self, other: Color) {
        self.r += other.r;
        self.g += other.g;
        self.b += other.b;
    }
}

impl Sub<Color> for Color {
    type Output = Color;

    fn sub(self, other: Color) -> Self::Output {
        Color {
            r: self.r - other.r,
            g: self.g - other.g,
            b: self.b - other.b,
        }
    }
}

impl Mul<f64> for Color {
    type Output = Color;

    fn mul(self, other: f64) -> Self::Output {
        Color {
            r: self.r * other,
            g: self.g * other,
            b: self.b * other,
        }
    }
}

impl Mul<Color> for f64 {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        other * self
    }
}

/// `c1 * c2` is shorthand for `Color::hadamard(&c1, &c2)`.
impl Mul<Color> for Color {
    type Output = Color;

    fn mul(self, other: Color) -> Self::Output {
        Color::hadamard(&self, &other)
    }
}

impl MulAssign<Color> for Color {
    fn mul_assign(&mut self, other: Color) {
        *self = *self * other;
    }
}

impl MulAssign<f64> for Color {
    fn mul_assign(&mut self, other: f64) {
        *self = *self * other;
    }
}

/* Tests */

#[test]
fn add_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 + c2, Color::rgb(1.6, 0.7, 1.0));
}

#[test]
fn subtract_colors() {
    let c1 = Color::rgb(0.9, 0.6, 0.75);
    let c2 = Color::rgb(0.7, 0.1, 0.25);

    assert_eq!(c1 - c2, Color::rgb(0.2, 0.5, 0.5));
}

#[test]
fn multiply_colors() {
    let c1 = Color::rgb(1.0, 0.2, 0.4);
    let c2 = Color::rgb(0.9, 1.0, 0.1);

    assert_eq!(c1 * c2, Color::rgb(0.9, 0.2, 0.04));
    assert_eq!(c1 * 2.0, Color::rgb(2.0, 0.4, 0.8));
}

#[test]
fn clamp_for_output() {
    let c = Color::rgb(-0.5, 0.5, 1.5);

    assert_eq!(c.clamped(), Color::rgb(0.0, 0.5, 0.999999));
}

#[test]
fn gray_of_white_is_one() {
    assert!((Color::white().gray() - 1.0).abs() < 1e-12);
}

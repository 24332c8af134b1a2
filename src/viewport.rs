use serde::{ Deserialize, Serialize };

use crate::color::Color;
use crate::consts::DTOR;
use crate::vector::Vec3;

/// How screen samples become rays.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    Perspective,

    /// A red/blue stereo pair: the left eye's gray level goes to blue and
    /// the right eye's to red.
    Anaglyph,
}

impl Default for Projection {
    fn default() -> Projection {
        Projection::Perspective
    }
}

/// A pinhole camera.
///
/// `n`, `u` and `v` are derived by `setup`: `n` points from the eye at the
/// target and is scaled so that `u` and `v` in `[-1, 1]` span the view
/// angle, `v` is the up vector made perpendicular to `n`, and `u = n × v`.
///
/// Deserialized viewports carry no basis until `setup` is called.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub look_up: Vec3,

    /// Full view angle in degrees.
    pub view_angle: f64,

    #[serde(skip)]
    pub n: Vec3,
    #[serde(skip)]
    pub u: Vec3,
    #[serde(skip)]
    pub v: Vec3,
}

impl Default for Viewport {
    fn default() -> Viewport {
        Viewport::new(Vec3::new(0.0, -10.0, 10.0), Vec3::zero(), Some(Vec3::new(0.0, 0.0, 1.0)), 30.0)
    }
}

impl Viewport {
    /// A viewport at `from` looking at `at`. Without an up vector the world
    /// Z axis is up.
    pub fn new(from: Vec3, at: Vec3, up: Option<Vec3>, view_angle: f64) -> Viewport {
        let mut vp = Viewport {
            look_from: from,
            look_at: at,
            look_up: up.unwrap_or(Vec3::new(0.0, 0.0, 0.1)),
            view_angle,
            n: Vec3::zero(),
            u: Vec3::zero(),
            v: Vec3::zero(),
        };
        vp.setup();
        vp
    }

    /// Recomputes the basis from the look parameters.
    pub fn setup(&mut self) {
        let n = (self.look_at - self.look_from).normalize();
        let v = (self.look_up - n * self.look_up.dot(&n)).normalize();
        let u = n.cross(&v);

        let half = self.view_angle * DTOR / 2.0;
        self.n = n * (half.cos() / half.sin());
        self.u = u;
        self.v = v;
    }

    /// The eye position and unit direction for screen point `(u, v)`.
    pub fn ray_dir(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        (self.look_from, (self.n + self.u * u + self.v * v).normalize())    }

    /// Same basis as `self` but looking from `from`.
    pub fn from_eye(&self, from: Vec3) -> Viewport {
        Viewport::new(from, self.look_at, Some(self.look_up), self.view_angle)
    }
}

/// Screen coordinates of the center of pixel `(x, y)`, row 0 at the top.
///
/// The longer image side spans `[-1, 1]` and the shorter one a symmetric
/// range in proportion, so pixels stay square.
pub fn screen_uv(x: usize, y: usize, width: usize, height: usize) -> (f64, f64) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let scale = 2.0 / w.max(h);

    let u = (x as f64 + 0.5 - w / 2.0) * scale;
    let v = (h / 2.0 - y as f64 - 0.5) * scale;
    (u, v)
}

/// Folds a left and right eye color into one anaglyph pixel.
pub fn anaglyph(left: Color, right: Color) -> Color {
    Color::rgb(right.gray(), 0.0, left.gray())
}

/* Tests */

#[test]
fn default_viewport_basis() {
    let vp = Viewport::default();
    let s = std::f64::consts::FRAC_1_SQRT_2;

    assert_eq!(vp.u, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(vp.v, Vec3::new(0.0, s, s));

    let cot = 1.0 / (15.0 * DTOR).tan();
    assert!((vp.n.magnitude() - cot).abs() < 1e-9);
    assert_eq!(vp.n.normalize(), Vec3::new(0.0, s, -s));
}

#[test]
fn center_ray_looks_at_the_target() {
    let vp = Viewport::new(Vec3::new(0.0, -5.0, 0.0), Vec3::zero(), None, 90.0);
    let (origin, dir) = vp.ray_dir(0.0, 0.0);

    assert_eq!(origin, Vec3::new(0.0, -5.0, 0.0));
    assert_eq!(dir, Vec3::new(0.0, 1.0, 0.0));

    // At 90 degrees the screen edge is 45 degrees off the axis
    let (_, dir) = vp.ray_dir(1.0, 0.0);
    let s = std::f64::consts::FRAC_1_SQRT_2;
    assert_eq!(dir, Vec3::new(s, s, 0.0));

    let (_, dir) = vp.ray_dir(0.0, 1.0);
    assert_eq!(dir, Vec3::new(0.0, s, s));
}

#[test]
fn second_eye_keeps_the_target() {
    let vp = Viewport::new(Vec3::new(0.0, -5.0, 0.0), Vec3::zero(), None, 60.0);
    let right = vp.from_eye(Vec3::new(1.0, -5.0, 0.0));

    assert_eq!(right.look_at, vp.look_at);
    let (_, dir) = right.ray_dir(0.0, 0.0);
    assert_eq!(dir, Vec3::new(-1.0, 5.0, 0.0).normalize());
}

#[test]
fn screen_uv_keeps_pixels_square() {
    let (u, v) = screen_uv(0, 0, 4, 2);
    assert!((u + 0.75).abs() < 1e-12);
    assert!((v - 0.25).abs() < 1e-12);

    let (u, v) = screen_uv(3, 1, 4, 2);
    assert!((u - 0.75).abs() < 1e-12);
    assert!((v + 0.25).abs() < 1e-12);

    let (u, v) = screen_uv(0, 0, 2, 4);
    assert!((u + 0.25).abs() < 1e-12);
    assert!((v - 0.75).abs() < 1e-12);
}

#[test]
fn anaglyph_channels() {
    let c = anaglyph(Color::rgb(1.0, 0.0, 0.0), Color::rgb(0.0, 1.0, 0.0));
    assert_eq!(c, Color::rgb(0.56, 0.0, 0.33));
}

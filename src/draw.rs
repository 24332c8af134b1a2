//! Wireframe output.

use crate::vector::Vec3;

/// Receives wireframe strokes in world space.
///
/// A stroke starts with `move_to` and continues with any number of
/// `line_to` calls.
pub trait LineSink {
    fn move_to(&mut self, p: Vec3);
    fn line_to(&mut self, p: Vec3);
}

/// A sink that records every segment it is given.
#[derive(Clone, Debug, Default)]
pub struct LineList {
    pub segments: Vec<(Vec3, Vec3)>,
    pen: Option<Vec3>,
}

impl LineList {
    pub fn new() -> LineList {
        Default::default()
    }
}

impl LineSink for LineList {
    fn move_to(&mut self, p: Vec3) {
        self.pen = Some(p);
    }

    fn line_to(&mut self, p: Vec3) {
        if let Some(from) = self.pen {
            self.segments.push((from, p));
        }
        self.pen = Some(p);
    }
}

/// Strokes through `points`, returning to the first one when `closed`.
pub fn polyline(sink: &mut dyn LineSink, points: &[Vec3], closed: bool) {
    let first = match points.first() {
        Some(p) => *p,
        None => return,
    };

    sink.move_to(first);
    for p in points[1..].iter() {
        sink.line_to(*p);
    }
    if closed {
        sink.line_to(first);
    }
}

/// The twelve edges of an axis aligned box, each corner passed through
/// `to_world` first.
pub fn box_edges<F>(sink: &mut dyn LineSink, bmin: Vec3, bmax: Vec3, to_world: F)
    where F: Fn(Vec3) -> Vec3 {
    let corner = |i: usize| to_world(Vec3::new(
        if i & 1 != 0 { bmax.x } else { bmin.x },
        if i & 2 != 0 { bmax.y } else { bmin.y },
        if i & 4 != 0 { bmax.z } else { bmin.z },
    ));

    // Bottom and top faces, then the uprights
    polyline(sink, &[corner(0), corner(1), corner(3), corner(2)], true);
    polyline(sink, &[corner(4), corner(5), corner(7), corner(6)], true);
    for i in 0..4 {
        sink.move_to(corner(i));
        sink.line_to(corner(i + 4));
    }
}

/// A ring of `steps` points around `center`, in the plane spanned by the
/// unit vectors `a` and `b`.
pub fn ring(center: Vec3, a: Vec3, b: Vec3, radius: f64, steps: usize) -> Vec<Vec3> {
    (0..steps)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::PI * 2.0 / steps as f64;
            center + (a * angle.cos() + b * angle.sin()) * radius
        })
        .collect()
}

/// Any unit vector perpendicular to `n`.
pub fn perpendicular(n: Vec3) -> Vec3 {
    let p = Vec3::new(1.0, 0.0, 0.0).cross(&n);
    if p.is_zero() {
        Vec3::new(0.0, 1.0, 0.0).cross(&n).normalize()
    } else {
        p.normalize()
    }
}

/* Tests */

#[test]
fn box_has_twelve_edges() {
    let mut lines = LineList::new();
    box_edges(&mut lines, Vec3::zero(), Vec3::splat(1.0), |p| p);

    assert_eq!(lines.segments.len(), 12);
    for (a, b) in lines.segments.iter() {
        assert!(((*a - *b).magnitude() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn closed_polyline() {
    let mut lines = LineList::new();
    let pts = [Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
    polyline(&mut lines, &pts, true);

    assert_eq!(lines.segments.len(), 3);
    assert_eq!(lines.segments[2].1, Vec3::zero());
}

#[test]
fn ring_lies_on_circle() {
    let n = Vec3::new(0.0, 0.0, 1.0);
    let a = perpendicular(n);
    let b = n.cross(&a);

    for p in ring(Vec3::splat(1.0), a, b, 2.0, 12) {
        assert!(((p - Vec3::splat(1.0)).magnitude() - 2.0).abs() < 1e-12);
        assert!((p.z - 1.0).abs() < 1e-12);
    }
}

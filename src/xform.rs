use std::rc::Rc;

use serde::{ Deserialize, Serialize };

use crate::consts::{ DTOR, EPSILON, HUGE };
use crate::error::{ RayError, Result };
use crate::matrix::Matrix4D;
use crate::vector::Vec3;

/// An elementary transform step.
///
/// The meaning of the accompanying parameter vector depends on the action:
///
/// * `Translate`: offset along each axis.
/// * `Scale`: factor along each axis.
/// * `Rotate`: angles in degrees about X, then Y, then Z.
/// * `Shear`: `(u, v, axis)`, where `axis` (taken modulo 3) is the driving
///   axis and `u`, `v` are the slopes applied to the other two axes in
///   x, y, z order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Translate,
    Scale,
    Rotate,
    Shear,
}

/// A transform pair.
///
/// `m` maps object space to world space and `i` maps world space back to
/// object space. Both are updated together by every operation so that `i`
/// stays the exact inverse of `m` without ever re-inverting.
///
/// Objects and surfaces hold transforms through `Rc<Xform>`. Sharing is an
/// `Rc::clone`, and a holder that wants to specialize a shared transform goes
/// through `Rc::make_mut`, which copies it first if anyone else still holds
/// it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Xform {
    pub m: Matrix4D,
    pub i: Matrix4D,
}

impl Default for Xform {
    fn default() -> Xform {
        Xform::new()
    }
}

impl Xform {
    /// An identity transform.
    pub fn new() -> Xform {
        Xform { m: Matrix4D::identity(), i: Matrix4D::identity() }
    }

    /// Builds a transform from an explicit object to world matrix.
    pub fn from_matrix(m: Matrix4D) -> Result<Xform> {
        let i = m.inverse().ok_or(RayError::SingularTransform)?;
        Ok(Xform { m, i })
    }

    /// Returns another handle to the same transform.
    pub fn share(this: &Rc<Xform>) -> Rc<Xform> {
        Rc::clone(this)
    }

    /// Returns an independent copy with a single holder.
    pub fn clone_shared(this: &Rc<Xform>) -> Rc<Xform> {
        Rc::new(**this)
    }

    /// Composes an elementary step after the current transform.
    pub fn apply(&mut self, action: Action, params: Vec3) {
        match action {
            Action::Translate => {
                self.compose(
                    Matrix4D::translation(params),
                    Matrix4D::translation(-params),
                );
            }
            Action::Scale => {
                // A zero factor cannot be undone, leave that axis alone
                let inv = |p: f64| if p != 0.0 { 1.0 / p } else { 1.0 };
                self.compose(
                    Matrix4D::scaling(params),
                    Matrix4D::scaling(Vec3::new(inv(params.x), inv(params.y), inv(params.z))),
                );
            }
            Action::Rotate => {
                if params.x != 0.0 {
                    let r = params.x * DTOR;
                    self.compose(Matrix4D::rotation_x(r), Matrix4D::rotation_x(-r));
                }
                if params.y != 0.0 {
                    let r = params.y * DTOR;
                    self.compose(Matrix4D::rotation_y(r), Matrix4D::rotation_y(-r));
                }
                if params.z != 0.0 {
                    let r = params.z * DTOR;
                    self.compose(Matrix4D::rotation_z(r), Matrix4D::rotation_z(-r));
                }
            }
            Action::Shear => {
                let axis = shear_axis(params);
                self.compose(
                    Matrix4D::shearing(axis, params.x, params.y),
                    Matrix4D::shearing(axis, -params.x, -params.y),
                );
            }
        }
    }

    fn compose(&mut self, step: Matrix4D, step_inverse: Matrix4D) {
        self.m = step * self.m;
        self.i = self.i * step_inverse;
    }

    /// Appends `other` after this transform.
    pub fn concat(&mut self, other: &Xform) {
        self.compose(other.m, other.i);
    }

    pub fn point_to_world(&self, p: Vec3) -> Vec3 {
        self.m.transform_point(p)
    }

    pub fn point_to_object(&self, p: Vec3) -> Vec3 {
        self.i.transform_point(p)
    }

    pub fn dir_to_world(&self, d: Vec3) -> Vec3 {
        self.m.transform_dir(d)
    }

    pub fn dir_to_object(&self, d: Vec3) -> Vec3 {
        self.i.transform_dir(d)
    }

    /// Carries an object space normal to world space, renormalized.
    pub fn norm_to_world(&self, n: Vec3) -> Vec3 {
        self.i.transform_normal(n)
    }

    /// Carries a world space normal to object space, renormalized.
    pub fn norm_to_object(&self, n: Vec3) -> Vec3 {
        self.m.transform_normal(n)
    }

    /// World space box enclosing an object space box.
    pub fn bbox_to_world(&self, bmin: Vec3, bmax: Vec3) -> (Vec3, Vec3) {
        corners_through(bmin, bmax, |v| self.point_to_world(v))
    }
}

fn shear_axis(params: Vec3) -> usize {
    (params.z as u32 % 3) as usize
}

fn corners_through<F>(bmin: Vec3, bmax: Vec3, f: F) -> (Vec3, Vec3)
    where F: Fn(Vec3) -> Vec3 {
    let mut tmin = Vec3::splat(HUGE);
    let mut tmax = Vec3::splat(-HUGE);

    for i in 0..8 {
        let v = Vec3::new(
            if i & 1 != 0 { bmin.x } else { bmax.x },
            if i & 2 != 0 { bmin.y } else { bmax.y },
            if i & 4 != 0 { bmin.z } else { bmax.z },
        );
        let v = f(v);
        tmin = tmin.min(&v);
        tmax = tmax.max(&v);
    }

    (tmin, tmax)
}

/// Applies an elementary step directly to a point.
///
/// Used by primitives that bake transforms into their vertices instead of
/// carrying an `Xform`.
pub fn xform_vector(v: Vec3, params: Vec3, action: Action) -> Vec3 {
    match action {
        Action::Scale => v.hadamard(&params),
        Action::Translate => v + params,
        Action::Shear => Matrix4D::shearing(shear_axis(params), params.x, params.y)
            .transform_dir(v),
        Action::Rotate => rotate_xyz(v, params),
    }
}

/// Applies an elementary step directly to a normal, then renormalizes.
///
/// Scaling divides by the factor (an effectively infinite component for a
/// zero factor) and shearing applies the inverse transpose of the shear.
pub fn xform_normal(n: Vec3, params: Vec3, action: Action) -> Vec3 {
    let divide = |n: f64, p: f64| {
        if p > 0.0 {
            if p > EPSILON { n / p } else { HUGE }
        } else if p < -EPSILON {
            n / p
        } else {
            -HUGE
        }
    };

    match action {
        Action::Scale => Vec3::new(
            divide(n.x, params.x),
            divide(n.y, params.y),
            divide(n.z, params.z),
        ).normalize(),
        Action::Translate => n,
        Action::Shear => Matrix4D::shearing(shear_axis(params), -params.x, -params.y)
            .transposition()
            .transform_dir(n)
            .normalize(),
        Action::Rotate => rotate_xyz(n, params),
    }
}

fn rotate_xyz(v: Vec3, angles: Vec3) -> Vec3 {
    let m = Matrix4D::rotation_z(angles.z * DTOR)
        * Matrix4D::rotation_y(angles.y * DTOR)
        * Matrix4D::rotation_x(angles.x * DTOR);

    m.transform_dir(v)
}

/// A rotation basis carrying +Y onto `dir`.
///
/// Returns the rows `(rx, ry, rz)`. Projecting a world offset onto them
/// (`v.dot(&rx)` and so on) expresses it in the frame whose Y axis runs
/// along `dir`. A `dir` of +Y yields the identity.
pub fn dir_to_matrix(dir: Vec3) -> (Vec3, Vec3, Vec3) {
    let mut rx = Vec3::new(1.0, 0.0, 0.0);
    let mut ry = Vec3::new(0.0, 1.0, 0.0);
    let mut rz = Vec3::new(0.0, 0.0, 1.0);

    let v = dir.normalize();
    let ang = v.y.max(-1.0).min(1.0).acos();
    if ang < EPSILON {
        return (rx, ry, rz);
    }

    // Rotate about x
    let (s, c) = (ang.sin(), v.y);
    for r in [&mut ry, &mut rz].iter_mut() {
        let (y, z) = (r.y, r.z);
        r.y = y * c - z * s;
        r.z = y * s + z * c;
    }

    if (ang.abs() - std::f64::consts::PI).abs() < EPSILON {
        return (rx, ry, rz);
    }

    // Rotate about y
    let v = Vec3::new(dir.x, 0.0, dir.z).normalize();
    let mut ang = v.z.max(-1.0).min(1.0).acos();
    if ang < EPSILON {
        return (rx, ry, rz);
    }
    if v.x < 0.0 {
        ang = -ang;
    }

    let (s, c) = (ang.sin(), v.z);
    for r in [&mut rx, &mut ry, &mut rz].iter_mut() {
        let (x, z) = (r.x, r.z);
        r.x = x * c + z * s;
        r.z = -x * s + z * c;
    }

    (rx, ry, rz)
}

/* Tests */

#[cfg(test)]
fn sample_xform() -> Xform {
    let mut t = Xform::new();
    t.apply(Action::Scale, Vec3::new(2.0, 0.5, 3.0));
    t.apply(Action::Rotate, Vec3::new(30.0, 45.0, -60.0));
    t.apply(Action::Shear, Vec3::new(0.25, -0.5, 1.0));
    t.apply(Action::Translate, Vec3::new(1.0, -2.0, 5.0));

    t
}

#[test]
fn point_round_trip() {
    let t = sample_xform();

    for p in [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.5, -7.0, 2.25), Vec3::new(-3.0, 4.0, 9.0)].iter() {
        let back = t.point_to_object(t.point_to_world(*p));
        assert!((back - *p).magnitude() < 1e-9);
    }
}

#[test]
fn inverse_stays_exact() {
    let t = sample_xform();

    assert_eq!(t.m * t.i, Matrix4D::identity());
    assert_eq!(t.i, t.m.inverse().unwrap());
}

#[test]
fn steps_apply_in_order() {
    let mut t = Xform::new();
    t.apply(Action::Scale, Vec3::new(2.0, 2.0, 2.0));
    t.apply(Action::Translate, Vec3::new(1.0, 0.0, 0.0));

    // scaled first, then moved
    assert_eq!(t.point_to_world(Vec3::new(1.0, 1.0, 1.0)), Vec3::new(3.0, 2.0, 2.0));
}

#[test]
fn concat_appends() {
    let mut a = Xform::new();
    a.apply(Action::Translate, Vec3::new(0.0, 0.0, 1.0));
    let mut b = Xform::new();
    b.apply(Action::Rotate, Vec3::new(0.0, 0.0, 90.0));

    a.concat(&b);
    assert_eq!(a.point_to_world(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, -1.0, 1.0));
    assert_eq!(a.m * a.i, Matrix4D::identity());
}

#[test]
fn zero_scale_keeps_inverse_finite() {
    let mut t = Xform::new();
    t.apply(Action::Scale, Vec3::new(0.0, 2.0, 2.0));

    assert_eq!(t.i[(0, 0)], 1.0);
    assert_eq!(t.i[(1, 1)], 0.5);
}

#[test]
fn normal_stays_perpendicular() {
    let t = sample_xform();
    let tangent = Vec3::new(1.0, 1.0, 0.0);
    let normal = Vec3::new(1.0, -1.0, 0.0).normalize();

    let wt = t.dir_to_world(tangent);
    let wn = t.norm_to_world(normal);
    assert!(wt.dot(&wn).abs() < 1e-9);
    assert!((wn.magnitude() - 1.0).abs() < 1e-9);
}

#[test]
fn bbox_after_rotation() {
    let mut t = Xform::new();
    t.apply(Action::Rotate, Vec3::new(0.0, 0.0, 45.0));
    let (bmin, bmax) = t.bbox_to_world(Vec3::splat(-1.0), Vec3::splat(1.0));
    let r = 2.0_f64.sqrt();

    assert_eq!(bmin, Vec3::new(-r, -r, -1.0));
    assert_eq!(bmax, Vec3::new(r, r, 1.0));
}

#[test]
fn direct_vertex_transform_matches_matrix() {
    let p = Vec3::new(1.0, 2.0, 3.0);
    for (action, params) in [
        (Action::Rotate, Vec3::new(10.0, 20.0, 30.0)),
        (Action::Shear, Vec3::new(0.5, 0.25, 2.0)),
        (Action::Scale, Vec3::new(2.0, 3.0, 4.0)),
    ].iter() {
        let mut t = Xform::new();
        t.apply(*action, *params);
        assert_eq!(xform_vector(p, *params, *action), t.point_to_world(p));
        assert_eq!(xform_normal(p.normalize(), *params, *action).normalize(),
            t.norm_to_world(p));
    }
}

#[test]
fn rc_sharing_counts() {
    let t = Rc::new(Xform::new());
    let before = Rc::strong_count(&t);

    let shares: Vec<_> = (0..3).map(|_| Xform::share(&t)).collect();
    assert_eq!(Rc::strong_count(&t), before + 3);
    drop(shares);
    assert_eq!(Rc::strong_count(&t), before);

    let copy = Xform::clone_shared(&t);
    assert_eq!(Rc::strong_count(&copy), 1);
    assert!(!Rc::ptr_eq(&t, &copy));
}

#[test]
fn copy_on_write() {
    let mut a = Rc::new(Xform::new());
    let b = Xform::share(&a);

    Rc::make_mut(&mut a).apply(Action::Translate, Vec3::new(1.0, 0.0, 0.0));
    assert!(!Rc::ptr_eq(&a, &b));
    assert_eq!(b.point_to_world(Vec3::zero()), Vec3::zero());
}

#[test]
fn dir_to_matrix_frames() {
    let (rx, ry, rz) = dir_to_matrix(Vec3::new(0.0, 1.0, 0.0));
    assert_eq!((rx, ry, rz), (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0)));

    for d in [Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 2.0, -3.0), Vec3::new(-1.0, 0.0, 0.0)].iter() {
        let (rx, ry, rz) = dir_to_matrix(*d);
        let d = d.normalize();
        // the direction projects onto the local Y axis
        assert_eq!(Vec3::new(d.dot(&rx), d.dot(&ry), d.dot(&rz)), Vec3::new(0.0, 1.0, 0.0));
        assert!(rx.dot(&ry).abs() < 1e-9 && ry.dot(&rz).abs() < 1e-9);
    }
}

#[test]
fn explicit_matrix_needs_an_inverse() {
    let m = Matrix4D::translation(Vec3::new(1.0, 2.0, 3.0));
    let x = Xform::from_matrix(m).unwrap();
    assert_eq!(x.point_to_object(Vec3::new(1.0, 2.0, 3.0)), Vec3::new(0.0, 0.0, 0.0));

    let flat = Matrix4D::scaling(Vec3::new(1.0, 0.0, 1.0));
    assert!(matches!(Xform::from_matrix(flat), Err(RayError::SingularTransform)));
}

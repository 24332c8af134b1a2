use crate::consts::HUGE;
use crate::vector::Vec3;
use crate::xform::Xform;

/// A ray with the parametric window it is allowed to hit in.
///
/// World rays keep `dir` at unit length. Rays carried into object space do
/// not renormalize, so a `t` found in object space is the same `t` in world
/// space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub tmin: f64,
    pub tmax: f64,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Ray {
        Ray { origin, dir, tmin: 0.0, tmax: HUGE }
    }

    /// Same ray restricted to `[tmin, tmax]`.
    pub fn with_range(mut self, tmin: f64, tmax: f64) -> Ray {
        self.tmin = tmin;
        self.tmax = tmax;
        self
    }

    pub fn position(&self, t: f64) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Carries the ray into the object space of `t`.
    pub fn to_object(&self, t: &Xform) -> Ray {
        Ray {
            origin: t.point_to_object(self.origin),
            dir: t.dir_to_object(self.dir),
            ..*self
        }
    }

    /// Unit length copy of the direction and the factor it was divided by.
    ///
    /// Roots found along the unit direction divide by the factor to give
    /// `t` along the original direction. A zero direction gives a zero
    /// factor.
    pub fn unit_dir(&self) -> (Vec3, f64) {
        let scale = self.dir.magnitude();
        if scale > 0.0 {
            (self.dir / scale, scale)
        } else {
            (self.dir, 0.0)
        }
    }
}

/* Tests */

#[test]
fn ray_position() {
    let r = Ray::new(Vec3::new(2.0, 3.0, 4.0), Vec3::new(1.0, 0.0, 0.0));

    assert_eq!(r.position(0.0), Vec3::new(2.0, 3.0, 4.0));
    assert_eq!(r.position(1.0), Vec3::new(3.0, 3.0, 4.0));
    assert_eq!(r.position(-1.0), Vec3::new(1.0, 3.0, 4.0));
    assert_eq!(r.position(2.5), Vec3::new(4.5, 3.0, 4.0));
}

#[test]
fn object_space_keeps_t() {
    use crate::xform::Action;

    let mut t = Xform::new();
    t.apply(Action::Scale, Vec3::new(2.0, 3.0, 4.0));
    t.apply(Action::Translate, Vec3::new(3.0, 4.0, 5.0));

    let r = Ray::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 0.0))
        .with_range(0.5, 10.0);
    let local = r.to_object(&t);

    assert_eq!(local.tmin, 0.5);
    assert_eq!(local.tmax, 10.0);
    assert_eq!(t.point_to_world(local.position(2.0)), r.position(2.0));
}

#[test]
fn unit_direction() {
    let r = Ray::new(Vec3::zero(), Vec3::new(0.0, 3.0, 4.0));
    let (d, scale) = r.unit_dir();

    assert_eq!(d, Vec3::new(0.0, 0.6, 0.8));
    assert_eq!(scale, 5.0);
}

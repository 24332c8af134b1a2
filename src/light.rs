use std::fmt;
use std::ops::BitOr;

use serde::{ Deserialize, Serialize };

use crate::color::Color;
use crate::consts::{ DTOR, EPSILON, MIN_LIGHT_SCALE };
use crate::rand::Frand;
use crate::vector::Vec3;

/// Per-light behavior switches.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct LightFlags(u32);

impl LightFlags {
    /// Lights without shadow rays: everything facing the light is lit.
    pub const NO_SHADOW: LightFlags = LightFlags(0x01);

    pub const NO_SPECULAR: LightFlags = LightFlags(0x02);

    /// Moves the light source by a random offset within `jitter` for every
    /// sample, for soft shadow edges.
    pub const JITTER: LightFlags = LightFlags(0x04);

    /// All lights with this flag share a total intensity of one.
    pub const AUTO_INTENSITY: LightFlags = LightFlags(0x08);

    pub const fn empty() -> LightFlags {
        LightFlags(0)
    }

    pub fn contains(&self, other: LightFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: LightFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: LightFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for LightFlags {
    type Output = LightFlags;

    fn bitor(self, rhs: LightFlags) -> LightFlags {
        LightFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for LightFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(LightFlags, &str); 4] = [
            (LightFlags::NO_SHADOW, "NO_SHADOW"),
            (LightFlags::NO_SPECULAR, "NO_SPECULAR"),
            (LightFlags::JITTER, "JITTER"),
            (LightFlags::AUTO_INTENSITY, "AUTO_INTENSITY"),
        ];

        let set: Vec<&str> = NAMES.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "LightFlags({})", set.join(" | "))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    /// Shines in every direction from `loc`.
    Point,

    /// Parallel light arriving from `dir`, with no position or falloff.
    Infinite,

    /// A spot at `loc` aimed at `at`.
    Directional,
}

/// A light source.
///
/// `dir` always points from the scene towards the light: for infinite
/// lights it is the given direction, for the others `normalize(loc - at)`
/// once the light is added to a scene.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub loc: Vec3,
    pub at: Vec3,
    pub dir: Vec3,
    pub color: Color,

    /// Size of the box the source moves around in when jittered.
    pub jitter: Vec3,

    /// Distance attenuation `1 / (1 + falloff·d²)`. Zero turns it off.
    pub falloff: f64,

    /// Exponent on the cosine off the spot axis.
    pub focus: f64,

    /// Cosine of the outer cone angle. Zero means no cone.
    pub angle_min: f64,

    /// Cosine of the inner cone angle, inside which the spot is at full
    /// strength.
    pub angle_max: f64,
    pub angle_diff: f64,

    pub flags: LightFlags,
}

impl Default for Light {
    fn default() -> Light {
        Light {
            kind: LightKind::Point,
            loc: Vec3::zero(),
            at: Vec3::new(0.0, 0.0, -1.0),
            dir: Vec3::new(0.0, 0.0, 1.0),
            color: Color::white(),
            jitter: Vec3::zero(),
            falloff: 0.0,
            focus: 1.0,
            angle_min: 0.0,
            angle_max: 0.0,
            angle_diff: 0.0,
            flags: LightFlags::empty(),
        }
    }
}

pub fn make_point_light(loc: Vec3, color: Color, falloff: f64) -> Light {
    Light { kind: LightKind::Point, loc, color, falloff, ..Default::default() }
}

pub fn make_infinite_light(dir: Vec3, color: Color) -> Light {
    Light { kind: LightKind::Infinite, dir: dir.normalize(), color, ..Default::default() }
}

/// A spot light at `loc` aimed at `at`.
///
/// Full strength inside `inner_deg` of the axis, fading linearly to nothing
/// at `outer_deg`. With both angles at zero the spot has no hard cone and
/// only `focus` narrows it.
pub fn make_directional_light(loc: Vec3, at: Vec3, color: Color,
    inner_deg: f64, outer_deg: f64, focus: f64) -> Light {
    let (inner, outer) = if inner_deg > outer_deg {
        (outer_deg, inner_deg)
    } else {
        (inner_deg, outer_deg)
    };

    let mut light = Light { kind: LightKind::Directional, loc, at, color, focus, ..Default::default() };
    if outer > 0.0 {
        light.angle_max = (inner * DTOR).cos();
        light.angle_min = (outer * DTOR).cos();
        light.angle_diff = light.angle_max - light.angle_min;
    }
    light.aim();
    light
}

/// How one light reaches one surface point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Illumination {
    /// Unit direction from the point to the light.
    pub dir: Vec3,

    /// Distance to the light; zero for infinite lights.
    pub dist: f64,

    /// Cosine between the surface normal and `dir`.
    pub n_dot_l: f64,

    /// Falloff and spot attenuation combined.
    pub scale: f64,
}

impl Light {
    /// Points `dir` from `at` towards `loc`. Infinite lights keep theirs.
    pub fn aim(&mut self) {
        if self.kind != LightKind::Infinite {
            self.dir = (self.loc - self.at).normalize();
        }
    }

    /// Light position for one sample, moved within the jitter box when the
    /// light is jittered.
    pub fn sample_loc(&self, rng: &mut Frand) -> Vec3 {
        if !self.flags.contains(LightFlags::JITTER) {
            return self.loc;
        }

        let mut loc = self.loc;
        for axis in 0..3 {
            loc[axis] += self.jitter[axis] * (rng.next_f64() - 0.5);
        }
        loc
    }

    /// Direction, distance and strength of the light at point `p` with
    /// normal `n`, or `None` when it cannot contribute: the surface faces
    /// away, the light has faded below notice or `p` is outside the spot.
    pub fn illuminate(&self, p: Vec3, n: Vec3, rng: &mut Frand) -> Option<Illumination> {
        let (dir, dist) = match self.kind {
            LightKind::Infinite => (self.dir, 0.0),
            _ => {
                let to = self.sample_loc(rng) - p;
                let dist = to.magnitude();
                if dist > EPSILON { (to / dist, dist) } else { (to, dist) }
            },
        };

        let n_dot_l = n.dot(&dir);
        if n_dot_l < 0.0 {
            return None;
        }

        let mut scale = 1.0;
        if self.falloff > 0.0 {
            scale /= 1.0 + self.falloff * dist * dist;
            if scale < MIN_LIGHT_SCALE {
                return None;
            }
        }

        if self.kind == LightKind::Directional {
            let cosa = self.dir.dot(&dir);
            if cosa < EPSILON {
                return None;
            }
            if self.angle_min > 0.0 {
                if cosa < self.angle_min {
                    return None;
                }
                if cosa < self.angle_max {
                    scale *= (cosa - self.angle_min) / self.angle_diff;
                }
            }
            scale *= cosa.powf(self.focus);
            if scale < MIN_LIGHT_SCALE {
                return None;
            }
        }

        Some(Illumination { dir, dist, n_dot_l, scale })
    }
}

/// Divides the colors of all auto intensity lights by their count.
pub fn share_auto_intensity(lights: &mut [Light]) {
    let n = lights.iter()
        .filter(|l| l.flags.contains(LightFlags::AUTO_INTENSITY))
        .count();
    if n == 0 {
        return;
    }

    for light in lights.iter_mut().filter(|l| l.flags.contains(LightFlags::AUTO_INTENSITY)) {
        light.color = light.color * (1.0 / n as f64);
    }
}

/* Tests */

#[test]
fn constructors_set_kinds_and_defaults() {
    let p = make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0);
    assert_eq!(p.kind, LightKind::Point);
    assert_eq!(p.focus, 1.0);

    let i = make_infinite_light(Vec3::new(0.0, 0.0, 5.0), Color::red());
    assert_eq!(i.dir, Vec3::new(0.0, 0.0, 1.0));

    let d = make_directional_light(Vec3::new(0.0, 0.0, 10.0), Vec3::zero(), Color::white(), 20.0, 10.0, 1.0);
    assert_eq!(d.dir, Vec3::new(0.0, 0.0, 1.0));
    assert!((d.angle_max - (10.0 * DTOR).cos()).abs() < 1e-12);
    assert!((d.angle_min - (20.0 * DTOR).cos()).abs() < 1e-12);
}

#[test]
fn facing_away_gets_nothing() {
    let light = make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0);
    let mut rng = Frand::default();

    let lit = light.illuminate(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), &mut rng).unwrap();
    assert_eq!(lit.dir, Vec3::new(0.0, 0.0, 1.0));
    assert!((lit.dist - 10.0).abs() < 1e-12);
    assert_eq!(lit.scale, 1.0);

    assert!(light.illuminate(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0), &mut rng).is_none());
}

#[test]
fn falloff_attenuates_and_cuts_off() {
    let mut rng = Frand::default();
    let n = Vec3::new(0.0, 0.0, 1.0);

    let near = make_point_light(Vec3::new(0.0, 0.0, 2.0), Color::white(), 0.25);
    let lit = near.illuminate(Vec3::zero(), n, &mut rng).unwrap();
    assert!((lit.scale - 0.5).abs() < 1e-12);

    let far = make_point_light(Vec3::new(0.0, 0.0, 100.0), Color::white(), 1.0);
    assert!(far.illuminate(Vec3::zero(), n, &mut rng).is_none());
}

#[test]
fn spot_cone_edges() {
    let mut rng = Frand::default();
    let spot = make_directional_light(Vec3::new(0.0, 0.0, 10.0), Vec3::zero(), Color::white(), 10.0, 20.0, 0.0);
    let n = Vec3::new(0.0, 0.0, 1.0);

    // On the axis
    let lit = spot.illuminate(Vec3::zero(), n, &mut rng).unwrap();
    assert!((lit.scale - 1.0).abs() < 1e-12);

    // 15 degrees off the axis, half way through the soft edge
    let p = Vec3::new(10.0 * (15.0 * DTOR).tan(), 0.0, 0.0);
    let lit = spot.illuminate(p, n, &mut rng).unwrap();
    let want = ((15.0 * DTOR).cos() - spot.angle_min) / spot.angle_diff;
    assert!((lit.scale - want).abs() < 1e-12);

    // Outside the cone
    let p = Vec3::new(10.0, 0.0, 0.0);
    assert!(spot.illuminate(p, n, &mut rng).is_none());
}

#[test]
fn jitter_stays_in_the_box() {
    let mut rng = Frand::default();
    let mut light = make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0);
    light.jitter = Vec3::new(1.0, 2.0, 0.0);
    light.flags.insert(LightFlags::JITTER);

    for _ in 0..100 {
        let loc = light.sample_loc(&mut rng);
        assert!(loc.x.abs() <= 0.5 && loc.y.abs() <= 1.0);
        assert_eq!(loc.z, 10.0);
    }
}

#[test]
fn auto_intensity_is_shared() {
    let mut a = make_point_light(Vec3::zero(), Color::white(), 0.0);
    a.flags.insert(LightFlags::AUTO_INTENSITY);
    let b = a;
    let c = make_point_light(Vec3::zero(), Color::white(), 0.0);

    let mut lights = vec![a, b, c];
    share_auto_intensity(&mut lights);

    assert_eq!(lights[0].color, Color::splat(0.5));
    assert_eq!(lights[1].color, Color::splat(0.5));
    assert_eq!(lights[2].color, Color::white());
    assert_eq!(format!("{:?}", lights[0].flags), "LightFlags(AUTO_INTENSITY)");
}

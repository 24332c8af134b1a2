use std::fmt;
use std::rc::Rc;

use serde::{ Deserialize, Serialize };

use crate::color::Color;
use crate::consts::VACUUM_RI;
use crate::vector::Vec3;
use crate::xform::{ Action, Xform };

/// The lighting coefficients of a surface.
///
/// This is the part of a surface that shaders may rewrite per sample. The
/// tracer copies it into a working slot before running shaders, so the
/// shared `Surface` itself is never written during a render.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Finish {
    pub color: Color,
    pub ka: Color,
    pub kd: Color,
    pub ks: Color,
    pub kr: Color,
    pub kt: Color,
    pub spec_power: f64,

    /// Refraction index inside the surface.
    pub ior: f64,

    /// Refraction index on the outside of the surface.
    pub outior: f64,
}

impl Default for Finish {
    fn default() -> Finish {
        Finish {
            color: Color::white(),
            ka: Color::black(),
            kd: Color::white(),
            ks: Color::black(),
            kr: Color::black(),
            kt: Color::black(),
            spec_power: 1.0,
            ior: VACUUM_RI,
            outior: VACUUM_RI,
        }
    }
}

/// Per-sample values handed to shaders.
///
/// `finish` starts as a copy of the surface's coefficients and whatever a
/// shader leaves in it is what gets lit. A shader may also bend `object_normal`
/// (bump mapping); the tracer carries it back to world space afterwards.
#[derive(Copy, Clone, Debug)]
pub struct ShadeContext {
    /// Hit point in world space.
    pub world_point: Vec3,

    /// Hit point in texture space (object and surface transforms undone).
    pub object_point: Vec3,

    pub world_normal: Vec3,
    pub object_normal: Vec3,

    /// Direction of the incoming ray.
    pub dir: Vec3,

    pub u: f64,
    pub v: f64,

    pub finish: Finish,
}

impl ShadeContext {
    /// A context for a background sample: no hit point, only a direction
    /// and the background color in `finish.color`.
    pub fn background(dir: Vec3, color: Color) -> ShadeContext {
        ShadeContext {
            world_point: Vec3::zero(),
            object_point: Vec3::zero(),
            world_normal: -dir,
            object_normal: -dir,
            dir,
            u: 0.0,
            v: 0.0,
            finish: Finish { color, ..Default::default() },
        }
    }
}

/// Procedural surface code run at shading time.
///
/// Shaders run synchronously, in list order, and communicate only through
/// the context they are given.
pub trait Shader: fmt::Debug {
    fn run(&self, ctx: &mut ShadeContext);
}

/// Alternates two colors on a 3D grid in texture space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Checker {
    pub color1: Color,
    pub color2: Color,
    pub size: f64,
}

impl Shader for Checker {
    fn run(&self, ctx: &mut ShadeContext) {
        let p = ctx.object_point / self.size.max(f64::MIN_POSITIVE);
        let sum = p.x.floor() + p.y.floor() + p.z.floor();

        ctx.finish.color = if sum.rem_euclid(2.0) < 1.0 { self.color1 } else { self.color2 };
    }
}

/// Alternates two colors on a grid in `(u, v)` space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvChecker {
    pub color1: Color,
    pub color2: Color,
    pub tiles: f64,
}

impl Shader for UvChecker {
    fn run(&self, ctx: &mut ShadeContext) {
        let sum = (ctx.u * self.tiles).floor() + (ctx.v * self.tiles).floor();

        ctx.finish.color = if sum.rem_euclid(2.0) < 1.0 { self.color1 } else { self.color2 };
    }
}

/// Overwrites the coefficients wholesale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Constant(pub Finish);

impl Shader for Constant {
    fn run(&self, ctx: &mut ShadeContext) {
        ctx.finish = self.0;
    }
}

/// Shading parameters shared between objects.
///
/// Held as `Rc<Surface>`. Objects that do not override a surface share one
/// instance; specializing a shared surface goes through `Rc::make_mut`, which
/// clones it first when other holders exist. A clone shares the shader
/// programs themselves and owns its own copy of the transform.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    pub finish: Finish,

    /// Texture space transform, applied on top of the object's.
    pub transform: Option<Rc<Xform>>,

    pub shaders: Vec<Rc<dyn Shader>>,
}

impl Surface {
    /// A surface with default coefficients and the given outside index.
    pub fn new(global_ior: f64) -> Surface {
        Surface {
            finish: Finish { outior: global_ior, ..Default::default() },
            ..Default::default()
        }
    }

    pub fn share(this: &Rc<Surface>) -> Rc<Surface> {
        Rc::clone(this)
    }

    /// An independent copy with a single holder.
    pub fn clone_shared(this: &Rc<Surface>) -> Rc<Surface> {
        let mut copy = (**this).clone();
        copy.transform = this.transform.as_ref().map(Xform::clone_shared);
        Rc::new(copy)
    }

    /// Composes a step onto the texture transform, creating it on first use.
    pub fn transform(&mut self, action: Action, params: Vec3) {
        let t = self.transform.get_or_insert_with(|| Rc::new(Xform::new()));
        Rc::make_mut(t).apply(action, params);
    }

    pub fn add_shader(&mut self, shader: Rc<dyn Shader>) {
        self.shaders.push(shader);
    }

    /// Whether light may pass through this surface at some sample.
    ///
    /// Surfaces with shaders count as possibly transmissive since a shader
    /// can raise `kt` at any point.
    pub fn may_transmit(&self) -> bool {
        !self.finish.kt.is_black() || !self.shaders.is_empty()
    }

    /// Runs the shader chain over `ctx`.
    pub fn run_shaders(&self, ctx: &mut ShadeContext) {
        for shader in self.shaders.iter() {
            shader.run(ctx);
        }
    }
}

/* Tests */

#[test]
fn surface_defaults() {
    let s = Surface::new(1.33);

    assert_eq!(s.finish.color, Color::white());
    assert_eq!(s.finish.kd, Color::white());
    assert_eq!(s.finish.ka, Color::black());
    assert_eq!(s.finish.kt, Color::black());
    assert_eq!(s.finish.ior, 1.0);
    assert_eq!(s.finish.outior, 1.33);
    assert!(!s.may_transmit());
}

#[test]
fn share_then_drop_restores_count() {
    let s = Rc::new(Surface::default());
    let before = Rc::strong_count(&s);

    let a = Surface::share(&s);
    let b = Surface::share(&a);
    assert_eq!(Rc::strong_count(&s), before + 2);

    drop(a);
    drop(b);
    assert_eq!(Rc::strong_count(&s), before);
}

#[test]
fn copy_on_write_leaves_original() {
    let original = Rc::new(Surface::default());
    let mut specialized = Surface::share(&original);

    Rc::make_mut(&mut specialized).finish.kr = Color::white();
    assert_eq!(original.finish.kr, Color::black());
    assert_eq!(specialized.finish.kr, Color::white());
}

#[test]
fn clone_copies_transform_and_shares_shaders() {
    let mut s = Surface::default();
    s.transform(Action::Scale, Vec3::new(2.0, 2.0, 2.0));
    let checker: Rc<dyn Shader> = Rc::new(Checker {
        color1: Color::white(), color2: Color::black(), size: 1.0
    });
    s.add_shader(Rc::clone(&checker));
    let s = Rc::new(s);

    let copy = Surface::clone_shared(&s);
    assert!(!Rc::ptr_eq(s.transform.as_ref().unwrap(), copy.transform.as_ref().unwrap()));
    assert!(Rc::ptr_eq(&s.shaders[0], &copy.shaders[0]));
    assert!(copy.may_transmit());
}

#[test]
fn checker_alternates() {
    let shader = Checker { color1: Color::white(), color2: Color::black(), size: 1.0 };
    let mut ctx = ShadeContext::background(Vec3::new(0.0, 0.0, 1.0), Color::red());

    ctx.object_point = Vec3::new(0.5, 0.5, 0.5);
    shader.run(&mut ctx);
    assert_eq!(ctx.finish.color, Color::white());

    ctx.object_point = Vec3::new(1.5, 0.5, 0.5);
    shader.run(&mut ctx);
    assert_eq!(ctx.finish.color, Color::black());

    ctx.object_point = Vec3::new(-0.5, 0.5, 0.5);
    shader.run(&mut ctx);
    assert_eq!(ctx.finish.color, Color::black());
}

//! The recursive shading pipeline.
//!
//! A `Tracer` carries the working state of a run of samples: the hit pool
//! and the last object that blocked each light. Everything else it reads
//! from the scene, which stays untouched while tracing. Between samples the
//! state is parked in a `TraceState` so that neither the pool nor the
//! blocker cache starts over.

use std::cell::RefCell;
use std::ptr;

use crate::color::Color;
use crate::consts::EPSILON;
use crate::intersect::{ find_closest, Hit, Scan };
use crate::light::{ Illumination, Light, LightFlags, LightKind };
use crate::rand::Frand;
use crate::ray::Ray;
use crate::shape::{ find_object, Object };
use crate::stats::Stats;
use crate::surface::{ Finish, ShadeContext };
use crate::vector::Vec3;
use crate::world::Scene;

/// Where a ray goes after meeting a transmissive surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Refraction {
    /// Bent into the other medium.
    Through(Vec3),

    /// Total internal reflection.
    Internal(Vec3),
}

/// Bends unit direction `dir` through a surface whose unit normal `n`
/// faces against it. `ratio` is the index on the incoming side over the
/// index on the far side.
pub fn refract(dir: Vec3, n: Vec3, ratio: f64) -> Refraction {
    if (ratio - 1.0).abs() < EPSILON {
        return Refraction::Through(dir);
    }

    let cos1 = -dir.dot(&n);
    let cos2 = 1.0 - ratio * ratio * (1.0 - cos1 * cos1);
    if cos2 > 0.0 {
        Refraction::Through((dir * ratio + n * (ratio * cos1 - cos2.sqrt())).normalize())
    } else {
        Refraction::Internal((dir + n * (2.0 * cos1)).normalize())
    }
}

/// Ratio of refraction indices for a ray crossing a surface.
fn index_ratio(finish: &Finish, entering: bool) -> f64 {
    if entering {
        finish.outior / finish.ior
    } else {
        finish.ior / finish.outior
    }
}

/// State of one shadow ray as it passes through transmissive objects.
struct ShadowPass {
    slot: usize,
    light_dir: Vec3,

    /// Sampled light position; `None` for infinite lights.
    target: Option<Vec3>,

    /// Set once the ray has been refracted.
    bent: bool,
    caustics: f64,
}

/// Tracing state kept between samples.
#[derive(Debug, Default)]
pub struct TraceState {
    /// Empty between samples; only its capacity carries over.
    hits: Vec<Hit<'static>>,

    /// Id of the last object to fully block each light.
    blockers: Vec<Option<usize>>,
}

impl TraceState {
    pub fn new(lights: usize) -> TraceState {
        TraceState { hits: Vec::new(), blockers: vec![None; lights] }
    }
}

/// Hands an emptied hit pool from one borrow of the scene to the next,
/// keeping its allocation.
fn recycle<'a, 'b>(mut hits: Vec<Hit<'a>>) -> Vec<Hit<'b>> {
    hits.clear();
    hits.into_iter().map(|_| unreachable!()).collect()
}

pub struct Tracer<'r> {
    scene: &'r Scene,
    stats: &'r Stats,
    rng: &'r RefCell<Frand>,
    default_finish: Finish,
    hits: Vec<Hit<'r>>,

    /// Last object to fully block each light, tried before a full search.
    blockers: Vec<Option<usize>>,
}

impl<'r> Tracer<'r> {
    pub fn new(scene: &'r Scene, stats: &'r Stats, rng: &'r RefCell<Frand>) -> Tracer<'r> {
        Tracer::resume(scene, stats, rng, TraceState::new(scene.lights.len()))
    }

    /// Picks up tracing where `state` was parked. A state sized for a
    /// different light list starts with an empty cache.
    pub fn resume(
        scene: &'r Scene,
        stats: &'r Stats,
        rng: &'r RefCell<Frand>,
        state: TraceState
    ) -> Tracer<'r> {
        let mut blockers = state.blockers;
        if blockers.len() != scene.lights.len() {
            blockers = vec![None; scene.lights.len()];
        }

        Tracer {
            scene,
            stats,
            rng,
            default_finish: scene.setup.default_finish(),
            hits: state.hits,
            blockers,
        }
    }

    /// Parks the pool and the blocker cache for the next run.
    pub fn suspend(self) -> TraceState {
        TraceState { hits: recycle(self.hits), blockers: self.blockers }
    }

    /// The color seen along an eye ray and whether it hit anything.
    pub fn trace_eye(&mut self, origin: Vec3, dir: Vec3) -> (Color, bool) {
        let setup = &self.scene.setup;
        let ray = Ray::new(origin, dir.normalize())
            .with_range(setup.min_trace_dist, setup.max_trace_dist);

        self.stats.eye_ray();
        self.trace(&ray, Color::white(), 0)
    }

    fn trace(&mut self, ray: &Ray, weight: Color, depth: usize) -> (Color, bool) {
        let scene = self.scene;
        let scan = Scan::new(self.stats);

        match find_closest(&scene.objects, ray, &scan, &mut self.hits) {
            Some(hit) => {
                let color = self.shade_hit(ray, &hit, weight, depth);
                (self.visibility(color, hit.t), true)
            },
            None => {
                let color = self.background(ray.dir);
                (self.visibility(color, scene.setup.max_trace_dist), false)
            },
        }
    }

    /// A secondary ray leaving a surface point.
    fn continued(&self, origin: Vec3, dir: Vec3) -> Ray {
        let setup = &self.scene.setup;
        Ray::new(origin, dir).with_range(setup.min_trace_dist, setup.max_trace_dist)
    }

    /// Local lighting plus reflected and transmitted light at a hit.
    ///
    /// `weight` is the product of the coefficients down the recursion; a
    /// branch is followed only while its weight stays above the minimum.
    fn shade_hit(&mut self, ray: &Ray, hit: &Hit<'r>, weight: Color, depth: usize) -> Color {
        let scene = self.scene;
        let setup = &scene.setup;
        let p = ray.position(hit.t);
        let ctx = self.shade_surface(hit, p, ray.dir);
        let finish = ctx.finish;
        let n = ctx.world_normal;

        let mut color = self.lighting(&ctx, hit, depth);
        if depth >= setup.max_trace_depth {
            return color;
        }

        let w = weight * finish.kr;
        if !finish.kr.is_black() && w.magnitude() > setup.min_color_weight {
            self.stats.reflected_ray();
            let r = self.continued(p, ray.dir.reflect(&n).normalize());
            let (c, _) = self.trace(&r, w, depth + 1);
            color += c * finish.kr;
        }

        let w = weight * finish.kt;
        if !finish.kt.is_black() && w.magnitude() > setup.min_color_weight {
            match refract(ray.dir, n, index_ratio(&finish, hit.entering)) {
                Refraction::Through(d) => {
                    self.stats.transmitted_ray();
                    let r = self.continued(p, d);
                    let (c, _) = self.trace(&r, w, depth + 1);
                    color += c * finish.kt;
                },
                Refraction::Internal(d) => {
                    self.stats.reflected_ray();
                    let r = self.continued(p, d);
                    let (c, _) = self.trace(&r, w, depth + 1);
                    if hit.entering {
                        color += c * finish.kt;
                    } else {
                        color = c;
                    }
                },
            }
        }

        color
    }

    /// Builds the shading context for a hit and runs the leaf's shaders.
    ///
    /// The normal is turned to face the incoming ray. Shaders see the hit
    /// in texture space: the surface's transform undone, then the leaf's.
    fn shade_surface(&self, hit: &Hit<'r>, p: Vec3, dir: Vec3) -> ShadeContext {
        let mut n = hit.leaf.normal(p, &hit.local);
        if n.dot(&dir) > 0.0 {
            n = -n;
        }

        let (surface, xform) = hit.leaf.texture_info();
        let mut ctx = ShadeContext {
            world_point: p,
            object_point: p,
            world_normal: n,
            object_normal: n,
            dir,
            u: 0.0,
            v: 0.0,
            finish: surface.map_or(self.default_finish, |s| s.finish),
        };

        let surface = match surface {
            Some(s) if !s.shaders.is_empty() => s,
            _ => return ctx,
        };

        let (mut op, mut on) = (p, n);
        if let Some(t) = &surface.transform {
            op = t.point_to_object(op);
            on = t.norm_to_object(on);
        }
        if let Some(t) = xform {
            op = t.point_to_object(op);
            on = t.norm_to_object(on);
        }

        let (u, v) = hit.leaf.uv(op, &hit.local);
        ctx.object_point = op;
        ctx.object_normal = on;
        ctx.u = u;
        ctx.v = v;
        surface.run_shaders(&mut ctx);

        let mut wn = ctx.object_normal;
        if let Some(t) = xform {
            wn = t.norm_to_world(wn);
        }
        if let Some(t) = &surface.transform {
            wn = t.norm_to_world(wn);
        }
        ctx.world_normal = wn.normalize();
        ctx
    }

    /// Ambient, diffuse and specular light at a shaded point.
    fn lighting(&mut self, ctx: &ShadeContext, hit: &Hit<'r>, depth: usize) -> Color {
        let f = &ctx.finish;
        let mut color = f.ka * f.color;
        if f.kd.is_black() && f.ks.is_black() {
            return color;
        }

        let base = match hit.leaf.vertex_color(ctx.world_point, &hit.local) {
            Some(vc) => f.color * vc,
            None => f.color,
        };

        let scene = self.scene;
        for (slot, light) in scene.lights.iter().enumerate() {
            let illum = match light.illuminate(ctx.world_point, ctx.world_normal, &mut *self.rng.borrow_mut()) {
                Some(i) => i,
                None => continue,
            };

            let shadow = if light.flags.contains(LightFlags::NO_SHADOW) {
                Color::white()
            } else {
                match self.shadow(slot, light, ctx.world_point, &illum, hit.object, depth) {
                    Some(c) => c,
                    None => continue,
                }
            };
            let shadow = shadow * illum.scale;

            color += light.color * f.kd * shadow * base * illum.n_dot_l;

            if !f.ks.is_black() && !light.flags.contains(LightFlags::NO_SPECULAR) {
                let r = illum.dir - ctx.world_normal * (2.0 * illum.n_dot_l);
                let r_dot_v = r.dot(&ctx.dir);
                if r_dot_v > 0.0 {
                    let spec = r_dot_v.powf(f.spec_power) * illum.scale;
                    color += light.color * f.ks * shadow * spec;
                }
            }
        }

        color
    }

    fn shadow_ray(&self, origin: Vec3, dir: Vec3, target: Option<Vec3>) -> Ray {
        let setup = &self.scene.setup;
        let tmax = target.map_or(setup.max_trace_dist, |t| (t - origin).magnitude());
        Ray::new(origin, dir).with_range(setup.min_shadow_dist, tmax)
    }

    /// The share of `light` that reaches `p`, or `None` when it is blocked.
    fn shadow(
        &mut self,
        slot: usize,
        light: &Light,
        p: Vec3,
        illum: &Illumination,
        base: &'r Object,
        depth: usize
    ) -> Option<Color> {
        let scene = self.scene;
        let setup = &scene.setup;
        if depth >= setup.max_trace_depth {
            return None;
        }
        self.stats.shadow_ray();

        let target = match light.kind {
            LightKind::Infinite => None,
            _ => Some(p + illum.dir * illum.dist),
        };

        if !setup.use_fake_caustics {
            if let Some(obj) = self.blockers[slot].and_then(|id| find_object(&scene.objects, id)) {
                let ray = self.shadow_ray(p, illum.dir, target);
                let scan = Scan { shadow: true, base: Some(base), ..Scan::new(self.stats) };

                let mark = self.hits.len();
                let blocked = !scan.skips(obj) && obj.intersect(&ray, &scan, &mut self.hits) > 0;
                self.hits.truncate(mark);

                if blocked {
                    self.stats.shadow_cache_hit();
                    return None;
                }
                self.blockers[slot] = None;
            }
        }

        let mut pass = ShadowPass { slot, light_dir: light.dir, target, bent: false, caustics: 1.0 };
        let total = self.shadow_pass(&mut pass, p, illum.dir, base, depth + 1);

        if pass.caustics > 0.0 {
            Some(total * pass.caustics)
        } else {
            None
        }
    }

    /// Follows a shadow ray through transmissive objects, returning the
    /// product of their transmission coefficients.
    fn shadow_pass(
        &mut self,
        pass: &mut ShadowPass,
        origin: Vec3,
        dir: Vec3,
        base: &'r Object,
        depth: usize
    ) -> Color {
        let scene = self.scene;
        let setup = &scene.setup;
        let ray = self.shadow_ray(origin, dir, pass.target);
        let scan = Scan { shadow: true, base: Some(base), ..Scan::new(self.stats) };

        let hit = match find_closest(&scene.objects, &ray, &scan, &mut self.hits) {
            Some(h) => h,
            None => return Color::white(),
        };

        let q = ray.position(hit.t);
        let ctx = self.shade_surface(&hit, q, dir);
        let kt = ctx.finish.kt;

        if kt.magnitude() <= setup.min_color_weight || depth >= setup.max_trace_depth {
            let transmissive = hit.leaf.texture_info().0.map_or(false, |s| s.may_transmit());
            if !pass.bent && ptr::eq(hit.object, hit.leaf) && !transmissive {
                self.blockers[pass.slot] = Some(hit.object.id);
            }
            pass.caustics = 0.0;
            return Color::black();
        }

        if !setup.use_fake_caustics {
            self.stats.shadow_transmitted_ray();
            return kt * self.shadow_pass(pass, q, dir, hit.object, depth + 1);
        }

        pass.bent = true;
        match refract(dir, ctx.world_normal, index_ratio(&ctx.finish, hit.entering)) {
            Refraction::Through(d) => {
                let to_light = pass.target.map_or(pass.light_dir, |t| (t - q).normalize());
                pass.caustics = to_light.dot(&d);
                self.stats.shadow_transmitted_ray();
                kt * self.shadow_pass(pass, q, d, hit.object, depth + 1)
            },
            Refraction::Internal(_) => {
                pass.caustics = 0.0;
                kt
            },
        }
    }

    /// Gradient between the two background colors by how steeply `dir`
    /// points along the up vector, then the background shaders.
    fn background(&self, dir: Vec3) -> Color {
        let setup = &self.scene.setup;
        let color = setup.background_color1
            .lerp(&setup.background_color2, dir.dot(&setup.up_vector).abs());

        if self.scene.background.is_empty() {
            return color;
        }

        let mut ctx = ShadeContext::background(dir, color);
        for shader in self.scene.background.iter() {
            shader.run(&mut ctx);
        }
        ctx.finish.color
    }

    /// Fades `color` towards the visibility color over distance `t`.
    fn visibility(&self, color: Color, t: f64) -> Color {
        let setup = &self.scene.setup;
        if setup.visibility_distance > EPSILON {
            setup.visibility_color.lerp(&color, (-t / setup.visibility_distance).exp())
        } else {
            color
        }
    }
}

/* Tests */

#[cfg(test)]
use std::rc::Rc;
#[cfg(test)]
use crate::light::make_point_light;
#[cfg(test)]
use crate::shape::make_sphere;
#[cfg(test)]
use crate::surface::{ Constant, Shader, Surface };
#[cfg(test)]
use crate::xform::Action;
#[cfg(test)]
use crate::world::RaySetup;

#[cfg(test)]
fn finished(finish: Finish) -> Rc<Surface> {
    Rc::new(Surface { finish, ..Default::default() })
}

#[cfg(test)]
fn trace_once(scene: &Scene, stats: &Stats, origin: Vec3, dir: Vec3) -> (Color, bool) {
    let rng = RefCell::new(Frand::default());
    let mut tracer = Tracer::new(scene, stats, &rng);
    tracer.trace_eye(origin, dir)
}

#[test]
fn refraction_bends_towards_the_normal() {
    let n = Vec3::new(0.0, 1.0, 0.0);

    assert_eq!(refract(Vec3::new(0.0, -1.0, 0.0), n, 1.0 / 1.5),
        Refraction::Through(Vec3::new(0.0, -1.0, 0.0)));

    let d = Vec3::new(1.0, -1.0, 0.0).normalize();
    match refract(d, n, 1.0 / 1.5) {
        Refraction::Through(t) => {
            // Snell: sin of the bent angle is the ratio times the incoming sine
            assert!((t.x - d.x / 1.5).abs() < 1e-9);
            assert!(t.y < 0.0);
        },
        Refraction::Internal(_) => panic!("glass entry cannot reflect internally"),
    }
}

#[test]
fn grazing_exit_reflects_internally() {
    let n = Vec3::new(0.0, 1.0, 0.0);
    let d = Vec3::new(1.0, -1.0, 0.0).normalize();

    assert_eq!(refract(d, n, 1.5), Refraction::Internal(Vec3::new(1.0, 1.0, 0.0).normalize()));
}

#[test]
fn empty_scene_shows_the_background_gradient() {
    let setup = RaySetup {
        background_color1: Color::red(),
        background_color2: Color::blue(),
        ..Default::default()
    };
    let scene = Scene::new(setup);
    let stats = Stats::new();

    let (c, hit) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
    assert!(!hit);
    assert_eq!(c, Color::red());

    let (c, _) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(c, Color::blue());

    let s = std::f64::consts::FRAC_1_SQRT_2;
    let (c, _) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 1.0));
    assert_eq!(c, Color::rgb(1.0 - s, 0.0, s));
}

#[test]
fn mirrored_spheres_stop_at_max_depth() {
    let mirror = finished(Finish {
        ka: Color::splat(0.1),
        kd: Color::black(),
        kr: Color::white(),
        ..Default::default()
    });

    let mut scene = Scene::new(RaySetup { max_trace_depth: 5, ..Default::default() });
    scene.add_object(make_sphere(Vec3::new(3.0, 0.0, 0.0), 1.0).with_surface(Rc::clone(&mirror)));
    scene.add_object(make_sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0).with_surface(mirror));
    let stats = Stats::new();

    let (c, hit) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));

    // One ambient term per level and nothing past the last one
    assert!(hit);
    assert_eq!(c, Color::splat(0.6));
    assert_eq!(stats.eye_rays.get(), 1);
    assert_eq!(stats.reflected_rays.get(), 5);
}

#[test]
fn single_level_trace_is_still_lit() {
    let lit = finished(Finish { ka: Color::splat(0.2), kr: Color::white(), ..Default::default() });

    let mut scene = Scene::new(RaySetup { max_trace_depth: 1, ..Default::default() });
    scene.add_light(make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0));
    scene.add_object(make_sphere(Vec3::zero(), 1.0).with_surface(lit));
    let stats = Stats::new();

    let (c, _) = trace_once(&scene, &stats, Vec3::new(0.0, -3.0, 4.0), Vec3::new(0.0, 3.0, -3.0));

    // The hit is lit and its reflection, into a black sky, is the last level
    assert_eq!(c, Color::splat(1.2));
    assert_eq!(stats.shadow_rays.get(), 1);
    assert_eq!(stats.reflected_rays.get(), 1);
}

#[test]
fn shadowed_point_light() {
    let lit = finished(Finish { ka: Color::splat(0.2), ..Default::default() });
    let origin = Vec3::new(0.0, -3.0, 4.0);
    let dir = Vec3::new(0.0, 3.0, -3.0);

    let mut scene = Scene::default();
    scene.add_light(make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0));
    scene.add_object(make_sphere(Vec3::zero(), 1.0).with_surface(Rc::clone(&lit)));

    let stats = Stats::new();
    let (c, _) = trace_once(&scene, &stats, origin, dir);
    assert_eq!(c, Color::splat(1.2));

    scene.add_object(make_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0).with_surface(lit));
    scene.number_objects();
    let stats = Stats::new();
    let rng = RefCell::new(Frand::default());
    let mut tracer = Tracer::new(&scene, &stats, &rng);

    let (c, _) = tracer.trace_eye(origin, dir);
    assert_eq!(c, Color::splat(0.2));
    assert_eq!(stats.shadow_rays.get(), 1);

    let (c, _) = tracer.trace_eye(origin, dir);
    assert_eq!(c, Color::splat(0.2));
    assert_eq!(stats.shadow_cache_hits.get(), 1);

    // The cache survives being parked between samples
    let state = tracer.suspend();
    let mut tracer = Tracer::resume(&scene, &stats, &rng, state);
    tracer.trace_eye(origin, dir);
    assert_eq!(stats.shadow_cache_hits.get(), 2);
}

#[test]
fn shadows_pass_through_transmissive_blockers() {
    let lit = finished(Finish { ka: Color::splat(0.2), ..Default::default() });
    let glass = finished(Finish { kt: Color::splat(0.5), ..Default::default() });

    let mut scene = Scene::default();
    scene.add_light(make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0));
    scene.add_object(make_sphere(Vec3::zero(), 1.0).with_surface(lit));
    scene.add_object(make_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0).with_surface(glass));
    let stats = Stats::new();

    let (c, _) = trace_once(&scene, &stats, Vec3::new(0.0, -3.0, 4.0), Vec3::new(0.0, 3.0, -3.0));

    // Both walls of the glass sphere halve the light
    assert_eq!(c, Color::splat(0.45));
    assert_eq!(stats.shadow_transmitted_rays.get(), 2);
    assert_eq!(stats.shadow_cache_hits.get(), 0);
}

#[test]
fn clear_sphere_shows_what_is_behind() {
    let clear = finished(Finish { kd: Color::black(), kt: Color::white(), ..Default::default() });
    let setup = RaySetup {
        background_color1: Color::green(),
        background_color2: Color::green(),
        ..Default::default()
    };

    let mut scene = Scene::new(setup);
    scene.add_object(make_sphere(Vec3::new(0.0, 5.0, 0.0), 1.0).with_surface(clear));
    let stats = Stats::new();

    let (c, hit) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
    assert!(hit);
    assert_eq!(c, Color::green());
    assert_eq!(stats.transmitted_rays.get(), 2);
}

#[test]
fn visibility_fades_with_distance() {
    let flat = finished(Finish { ka: Color::white(), kd: Color::black(), color: Color::red(), ..Default::default() });
    let setup = RaySetup { visibility_distance: 10.0, ..Default::default() };

    let mut scene = Scene::new(setup);
    scene.add_object(make_sphere(Vec3::new(0.0, 11.0, 0.0), 1.0).with_surface(flat));
    let stats = Stats::new();

    let (c, _) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
    let w = (-1.0f64).exp();
    assert_eq!(c, Color::rgb(1.0, 1.0 - w, 1.0 - w));

    let (c, _) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(c, Color::white());
}

#[test]
fn shaders_rewrite_the_finish() {
    let mut surface = Surface::default();
    surface.add_shader(Rc::new(Constant(Finish {
        color: Color::blue(),
        ka: Color::white(),
        kd: Color::black(),
        ..Default::default()
    })));

    let mut scene = Scene::default();
    scene.add_object(make_sphere(Vec3::new(0.0, 5.0, 0.0), 1.0).with_surface(Rc::new(surface)));
    let stats = Stats::new();

    let (c, _) = trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(c, Color::blue());
}

#[cfg(test)]
#[derive(Debug, Default)]
struct SeenPoints(RefCell<Vec<(Vec3, Vec3)>>);

#[cfg(test)]
impl Shader for SeenPoints {
    fn run(&self, ctx: &mut ShadeContext) {
        self.0.borrow_mut().push((ctx.object_point, ctx.object_normal));
    }
}

#[test]
fn texture_space_undoes_the_surface_then_the_object() {
    let seen = Rc::new(SeenPoints::default());
    let mut surface = Surface::default();
    surface.transform(Action::Scale, Vec3::new(2.0, 2.0, 2.0));
    surface.add_shader(seen.clone());

    let mut ball = make_sphere(Vec3::zero(), 1.0).with_surface(Rc::new(surface));
    ball.transform(Action::Translate, Vec3::new(0.0, 5.0, 0.0));
    let mut scene = Scene::default();
    scene.add_object(ball);
    let stats = Stats::new();

    trace_once(&scene, &stats, Vec3::zero(), Vec3::new(0.0, 1.0, 0.0));

    let seen = seen.0.borrow();
    assert_eq!(seen.len(), 1);
    let (p, n) = seen[0];
    assert!((p - Vec3::new(0.0, -3.0, 0.0)).magnitude() < 1.0e-9);
    assert!((n.normalize() - Vec3::new(0.0, -1.0, 0.0)).magnitude() < 1.0e-9);
}

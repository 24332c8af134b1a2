//! The entry point a sampling driver talks to.
//!
//! A `Renderer` is initialized once, bound to a scene with `setup`, asked
//! for colors one sample at a time and finally closed. Binding a new scene
//! replaces the old one.

use std::cell::RefCell;
use std::mem;

use log::{ debug, info, warn };

use crate::bound::Bounding;
use crate::canvas::Canvas;
use crate::color::Color;
use crate::consts::EPSILON;
use crate::draw::LineSink;
use crate::error::{ RayError, Result };
use crate::light::share_auto_intensity;
use crate::rand::Frand;
use crate::shape::{ post_process, Object };
use crate::stats::Stats;
use crate::trace::{ TraceState, Tracer };
use crate::vector::Vec3;
use crate::viewport::{ anaglyph, screen_uv, Projection, Viewport };
use crate::world::{ RaySetup, Scene };

#[derive(Debug, Default)]
pub struct Renderer {
    scene: Option<Scene>,
    right_eye: Viewport,
    stats: Stats,
    rng: RefCell<Frand>,

    /// Hit pool and shadow cache carried from one sample to the next.
    trace: RefCell<TraceState>,
    error: Option<String>,
}

impl Renderer {
    pub fn new() -> Renderer {
        Default::default()
    }

    /// Drops any bound scene and zeroes the counters.
    pub fn initialize(&mut self) {
        self.scene = None;
        self.trace = RefCell::default();
        self.error = None;
        self.stats.reset();
        self.rng.borrow_mut().reseed(-1);
    }

    /// Binds `scene` for rendering.
    ///
    /// Composite objects get their transforms and surfaces pushed down to
    /// their leaves, long lists are gathered into bounding trees and auto
    /// intensity lights share their strength. On error the renderer is left
    /// without a scene and `error` reports what went wrong.
    pub fn setup(&mut self, mut scene: Scene) -> Result<()> {
        self.scene = None;
        if let Err(e) = validate(&scene.setup) {
            self.error = Some(e.to_string());
            return Err(e);
        }
        self.error = None;

        let setup = &mut scene.setup;
        setup.up_vector = setup.up_vector.normalize();
        setup.viewport.setup();
        self.right_eye = setup.viewport.from_eye(setup.right_eye_lookfrom);

        let bounding = Bounding::new(setup.bound_threshold, setup.max_cluster_size);
        for obj in scene.objects.iter_mut() {
            post_process(obj, &bounding, &self.stats);
        }
        let objects = mem::take(&mut scene.objects);
        scene.objects = bounding.build(objects, &self.stats);
        scene.number_objects();
        self.trace = RefCell::new(TraceState::new(scene.lights.len()));

        for (i, light) in scene.lights.iter().enumerate() {
            if light.color.is_black() {
                warn!("light {} has no color", i);
            }
        }
        share_auto_intensity(&mut scene.lights);

        let mem: usize = scene.objects.iter().map(Object::mem_size).sum();
        self.stats.mem_used.set(mem as u64);

        info!(
            "scene ready: {} top level objects, {} lights, {} bounding boxes, {} bytes",
            scene.objects.len(),
            scene.lights.len(),
            self.stats.num_bounds.get(),
            mem
        );

        self.scene = Some(scene);
        Ok(())
    }

    pub fn is_setup(&self) -> bool {
        self.scene.is_some()
    }

    fn bound(&self) -> Result<&Scene> {
        self.scene.as_ref().ok_or(RayError::NotSetup)
    }

    /// Unclamped color seen through screen point `(u, v)`.
    pub fn trace_ray_from_viewport(&self, u: f64, v: f64) -> Result<Color> {
        self.trace_ray_from_viewport_hit(u, v).map(|(c, _)| c)
    }

    /// Like `trace_ray_from_viewport`, also telling whether the eye ray hit
    /// an object. For anaglyph views either eye counts.
    pub fn trace_ray_from_viewport_hit(&self, u: f64, v: f64) -> Result<(Color, bool)> {
        let scene = self.bound()?;
        let mut tracer = self.tracer(scene);
        let result = self.sample(&mut tracer, &scene.setup, u, v);

        self.trace.replace(tracer.suspend());
        Ok(result)
    }

    /// A tracer resuming from the parked state.
    fn tracer<'r>(&'r self, scene: &'r Scene) -> Tracer<'r> {
        let state = self.trace.replace(TraceState::default());
        Tracer::resume(scene, &self.stats, &self.rng, state)
    }

    fn sample(&self, tracer: &mut Tracer, setup: &RaySetup, u: f64, v: f64) -> (Color, bool) {
        let (origin, dir) = setup.viewport.ray_dir(u, v);
        let (left, left_hit) = tracer.trace_eye(origin, dir);

        match setup.projection {
            Projection::Perspective => (left, left_hit),
            Projection::Anaglyph => {
                let (origin, dir) = self.right_eye.ray_dir(u, v);
                let (right, right_hit) = tracer.trace_eye(origin, dir);
                (anaglyph(left, right), left_hit || right_hit)
            },
        }
    }

    /// Traces one sample through the center of every pixel.
    pub fn render(&self, width: usize, height: usize) -> Result<Canvas> {
        let scene = self.bound()?;
        let mut tracer = self.tracer(scene);
        let mut image = Canvas::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let (u, v) = screen_uv(x, y, width, height);
                let (color, _) = self.sample(&mut tracer, &scene.setup, u, v);
                image.write_pixel(x, y, &color);
            }
        }
        self.trace.replace(tracer.suspend());

        debug!("rendered {}x{}, {} eye rays", width, height, self.stats.eye_rays.get());
        Ok(image)
    }

    pub fn get_setup(&self) -> Option<&RaySetup> {
        self.scene.as_ref().map(|s| &s.setup)
    }

    /// World bounding box of the bound scene; a zero box when there is
    /// nothing to bound.
    pub fn get_bounds(&self) -> (Vec3, Vec3) {
        let objects = match &self.scene {
            Some(s) if !s.objects.is_empty() => &s.objects,
            _ => return (Vec3::zero(), Vec3::zero()),
        };

        objects.iter()
            .map(Object::extents)
            .fold((Vec3::splat(f64::INFINITY), Vec3::splat(f64::NEG_INFINITY)),
                |(lo, hi), (bmin, bmax)| (lo.min(&bmin), hi.max(&bmax)))
    }

    /// Strokes a wireframe of every object.
    pub fn draw_scene(&self, sink: &mut dyn LineSink) {
        if let Some(scene) = &self.scene {
            for obj in scene.objects.iter() {
                obj.draw(sink);
            }
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The last setup failure, if the last setup failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Releases the bound scene.
    pub fn close(&mut self) {
        self.trace = RefCell::default();
        if self.scene.take().is_some() {
            debug!("closing renderer\n{}", self.stats);
        }
    }
}

/// Rejects parameters no render can work with.
fn validate(setup: &RaySetup) -> Result<()> {
    let vp = &setup.viewport;

    if setup.max_trace_depth == 0 {
        return Err(RayError::Scene("max trace depth must be at least 1".into()));
    }
    if setup.min_trace_dist < 0.0 || setup.min_shadow_dist < 0.0 {
        return Err(RayError::Scene("minimum trace distances must not be negative".into()));
    }
    if setup.max_trace_dist <= setup.min_trace_dist {
        return Err(RayError::Scene("max trace distance must exceed the minimum".into()));
    }
    if setup.global_ior <= 0.0 {
        return Err(RayError::Scene(format!("bad global refraction index {}", setup.global_ior)));
    }
    if setup.up_vector.magnitude() < EPSILON {
        return Err(RayError::Scene("up vector is zero".into()));
    }
    if !(vp.view_angle > 0.0 && vp.view_angle < 180.0) {
        return Err(RayError::Scene(format!("view angle {} is outside (0, 180)", vp.view_angle)));
    }
    if (vp.look_at - vp.look_from).magnitude() < EPSILON {
        return Err(RayError::Scene("viewport looks from its own target".into()));
    }

    Ok(())
}

/* Tests */

#[cfg(test)]
use std::rc::Rc;
#[cfg(test)]
use crate::draw::LineList;
#[cfg(test)]
use crate::light::{ make_point_light, LightFlags };
#[cfg(test)]
use crate::shape::make_sphere;
#[cfg(test)]
use crate::surface::{ Finish, Surface };

#[test]
fn tracing_needs_a_scene() {
    let r = Renderer::new();

    assert!(matches!(r.trace_ray_from_viewport(0.0, 0.0), Err(RayError::NotSetup)));
    assert!(matches!(r.render(2, 2), Err(RayError::NotSetup)));
    assert!(r.get_setup().is_none());
}

#[test]
fn bad_parameters_fail_setup() {
    let mut r = Renderer::new();
    let setup = RaySetup { max_trace_depth: 0, ..Default::default() };

    assert!(r.setup(Scene::new(setup)).is_err());
    assert!(!r.is_setup());
    assert!(r.error().is_some());

    r.setup(Scene::default()).unwrap();
    assert!(r.error().is_none());
}

#[test]
fn center_sample_hits_the_target() {
    let mut scene = Scene::default();
    scene.add_object(make_sphere(Vec3::zero(), 1.0));

    let mut r = Renderer::new();
    r.setup(scene).unwrap();

    let (_, hit) = r.trace_ray_from_viewport_hit(0.0, 0.0).unwrap();
    assert!(hit);
    let (_, hit) = r.trace_ray_from_viewport_hit(1.0, 1.0).unwrap();
    assert!(!hit);
    assert_eq!(r.stats().eye_rays.get(), 2);
}

#[test]
fn anaglyph_samples_both_eyes() {
    let flat = Rc::new(Surface {
        finish: Finish { ka: Color::white(), kd: Color::black(), ..Default::default() },
        ..Default::default()
    });
    let mut setup = RaySetup { projection: Projection::Anaglyph, ..Default::default() };
    setup.right_eye_lookfrom = Vec3::new(1.0, -10.0, 10.0);

    let mut scene = Scene::new(setup);
    scene.add_object(make_sphere(Vec3::zero(), 1.0).with_surface(flat));

    let mut r = Renderer::new();
    r.setup(scene).unwrap();

    let c = r.trace_ray_from_viewport(0.0, 0.0).unwrap();
    assert_eq!(c, Color::rgb(1.0, 0.0, 1.0));
    assert_eq!(r.stats().eye_rays.get(), 2);
}

#[test]
fn bounds_cover_every_object() {
    let mut r = Renderer::new();
    r.setup(Scene::default()).unwrap();
    assert_eq!(r.get_bounds(), (Vec3::zero(), Vec3::zero()));

    let mut scene = Scene::default();
    scene.add_object(make_sphere(Vec3::new(-2.0, 0.0, 0.0), 1.0));
    scene.add_object(make_sphere(Vec3::new(0.0, 3.0, 0.0), 0.5));
    r.setup(scene).unwrap();

    let (bmin, bmax) = r.get_bounds();
    assert_eq!(bmin, Vec3::new(-3.0, -1.0, -1.0));
    assert_eq!(bmax, Vec3::new(0.5, 3.5, 1.0));
}

#[test]
fn setup_bounds_long_lists_and_shares_auto_lights() {
    let mut scene = Scene::default();
    for i in 0..20 {
        scene.add_object(make_sphere(Vec3::new(3.0 * i as f64, 0.0, 0.0), 1.0));
    }
    for _ in 0..2 {
        let mut light = make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0);
        light.flags.insert(LightFlags::AUTO_INTENSITY);
        scene.add_light(light);
    }

    let mut r = Renderer::new();
    r.setup(scene).unwrap();

    assert!(r.stats().num_bounds.get() > 0);
    assert!(r.stats().mem_used.get() > 0);

    let mut lines = LineList::new();
    r.draw_scene(&mut lines);
    assert!(!lines.segments.is_empty());

    let scene = r.scene.as_ref().unwrap();
    assert!(scene.objects.len() <= 8);
    assert_eq!(scene.lights[0].color, Color::splat(0.5));
}

#[test]
fn render_fills_the_canvas() {
    let setup = RaySetup {
        background_color1: Color::red(),
        background_color2: Color::red(),
        ..Default::default()
    };
    let mut r = Renderer::new();
    r.setup(Scene::new(setup)).unwrap();

    let image = r.render(4, 3).unwrap();
    assert_eq!(image.read_pixel(3, 2), Some(Color::red()));
    assert_eq!(r.stats().eye_rays.get(), 12);

    r.close();
    assert!(!r.is_setup());
    r.initialize();
    assert_eq!(r.stats().eye_rays.get(), 0);
}

#[test]
fn shadow_cache_carries_across_samples() {
    let lit = Rc::new(Surface {
        finish: Finish { ka: Color::splat(0.2), ..Default::default() },
        ..Default::default()
    });
    let mut setup = RaySetup::default();
    setup.viewport = Viewport::new(Vec3::new(0.0, -3.0, 4.0), Vec3::new(0.0, 0.0, 1.0), None, 30.0);

    let mut scene = Scene::new(setup);
    scene.add_light(make_point_light(Vec3::new(0.0, 0.0, 10.0), Color::white(), 0.0));
    scene.add_object(make_sphere(Vec3::zero(), 1.0).with_surface(Rc::clone(&lit)));
    scene.add_object(make_sphere(Vec3::new(0.0, 0.0, 5.0), 1.0).with_surface(lit));

    let mut r = Renderer::new();
    r.setup(scene).unwrap();

    for _ in 0..5 {
        assert_eq!(r.trace_ray_from_viewport(0.0, 0.0).unwrap(), Color::splat(0.2));
    }
    assert_eq!(r.stats().shadow_rays.get(), 5);
    assert_eq!(r.stats().shadow_cache_hits.get(), 4);

    // A new scene starts with an empty cache
    let mut scene = Scene::default();
    scene.add_object(make_sphere(Vec3::zero(), 1.0));
    r.setup(scene).unwrap();
    r.trace_ray_from_viewport(0.0, 0.0).unwrap();
    assert_eq!(r.stats().shadow_cache_hits.get(), 4);
}

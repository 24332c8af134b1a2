use std::rc::Rc;

use serde::{ Deserialize, Serialize };

use crate::color::Color;
use crate::consts::{ BOUND_THRESHOLD, HUGE, MAX_CLUSTER_SIZE, MAX_TRACE_DEPTH,
    MIN_COLOR_WEIGHT, MIN_SHADOW_DIST, MIN_TRACE_DIST, VACUUM_RI };
use crate::light::Light;
use crate::shape::{ number_objects, Object };
use crate::surface::{ Finish, Shader, Surface };
use crate::vector::Vec3;
use crate::viewport::{ Projection, Viewport };

/// Global render parameters.
///
/// Defaults give a black background, no visibility falloff, a Z-up world
/// and the default viewport.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaySetup {
    /// Background color towards the horizon.
    pub background_color1: Color,

    /// Background color towards the zenith and nadir.
    pub background_color2: Color,

    /// Distance over which colors fade into `visibility_color`. Off when
    /// not positive.
    pub visibility_distance: f64,
    pub visibility_color: Color,

    pub up_vector: Vec3,

    pub max_trace_depth: usize,
    pub min_trace_dist: f64,
    pub min_shadow_dist: f64,

    /// Rays whose accumulated weight drops to this are not traced.
    pub min_color_weight: f64,
    pub max_trace_dist: f64,

    pub bound_threshold: usize,
    pub max_cluster_size: usize,

    /// Refraction index of the space between objects.
    pub global_ior: f64,

    /// Bend shadow rays through transmissive objects.
    pub use_fake_caustics: bool,

    pub viewport: Viewport,
    pub right_eye_lookfrom: Vec3,
    pub projection: Projection,
}

impl Default for RaySetup {
    fn default() -> RaySetup {
        let viewport = Viewport::default();

        RaySetup {
            background_color1: Color::black(),
            background_color2: Color::black(),
            visibility_distance: -1.0,
            visibility_color: Color::white(),
            up_vector: Vec3::new(0.0, 0.0, 1.0),
            max_trace_depth: MAX_TRACE_DEPTH,
            min_trace_dist: MIN_TRACE_DIST,
            min_shadow_dist: MIN_SHADOW_DIST,
            min_color_weight: MIN_COLOR_WEIGHT,
            max_trace_dist: HUGE,
            bound_threshold: BOUND_THRESHOLD,
            max_cluster_size: MAX_CLUSTER_SIZE,
            global_ior: VACUUM_RI,
            use_fake_caustics: false,
            right_eye_lookfrom: viewport.look_from,
            viewport,
            projection: Projection::Perspective,
        }
    }
}

impl RaySetup {
    /// Coefficients for leaves that carry no surface.
    pub fn default_finish(&self) -> Finish {
        Surface::new(self.global_ior).finish
    }
}

/// Everything a render needs: parameters, objects, lights and the shaders
/// run on background samples.
#[derive(Debug, Default)]
pub struct Scene {
    pub setup: RaySetup,
    pub objects: Vec<Object>,
    pub lights: Vec<Light>,
    pub background: Vec<Rc<dyn Shader>>,
}

impl Scene {
    pub fn new(setup: RaySetup) -> Scene {
        Scene { setup, ..Default::default() }
    }

    pub fn add_object(&mut self, obj: Object) {
        self.objects.push(obj);
    }

    /// Gives every object in the tree its id. Setup does this once the
    /// bounding tree is built; ids are how the shadow cache names objects.
    pub fn number_objects(&mut self) {
        number_objects(&mut self.objects);
    }

    /// Adds a light, aiming it from its target.
    pub fn add_light(&mut self, mut light: Light) {
        light.aim();
        self.lights.push(light);
    }

    pub fn add_background_shader(&mut self, shader: Rc<dyn Shader>) {
        self.background.push(shader);
    }

    /// A fresh surface with this scene's outside refraction index.
    pub fn default_surface(&self) -> Surface {
        Surface::new(self.setup.global_ior)
    }
}

/* Tests */

#[cfg(test)]
use crate::light::{ make_directional_light, make_infinite_light };
#[cfg(test)]
use crate::feq;

#[test]
fn setup_defaults() {
    let s = RaySetup::default();

    assert_eq!(s.background_color1, Color::black());
    assert_eq!(s.visibility_color, Color::white());
    assert!(s.visibility_distance < 0.0);
    assert_eq!(s.max_trace_depth, 20);
    assert!(feq(s.min_trace_dist, 0.001));
    assert!(feq(s.min_color_weight, 0.002));
    assert_eq!(s.bound_threshold, 8);
    assert_eq!(s.max_cluster_size, 8);
    assert_eq!(s.viewport.look_from, Vec3::new(0.0, -10.0, 10.0));
    assert_eq!(s.right_eye_lookfrom, s.viewport.look_from);
    assert_eq!(s.projection, Projection::Perspective);
}

#[test]
fn default_surface_uses_global_ior() {
    let scene = Scene::new(RaySetup { global_ior: 1.33, ..Default::default() });

    assert!(feq(scene.default_surface().finish.outior, 1.33));
    assert!(feq(scene.setup.default_finish().ior, 1.0));
}

#[test]
fn added_lights_are_aimed() {
    let mut scene = Scene::default();
    let mut spot = make_directional_light(Vec3::new(0.0, 0.0, 5.0), Vec3::zero(), Color::white(), 10.0, 20.0, 1.0);
    spot.at = Vec3::new(5.0, 0.0, 5.0);
    scene.add_light(spot);
    scene.add_light(make_infinite_light(Vec3::new(0.0, 0.0, 2.0), Color::white()));

    assert_eq!(scene.lights[0].dir, Vec3::new(-1.0, 0.0, 0.0));
    assert_eq!(scene.lights[1].dir, Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn setup_reads_partial_json() {
    let s: RaySetup = serde_json::from_str(r#"{ "max_trace_depth": 3, "use_fake_caustics": true }"#).unwrap();

    assert_eq!(s.max_trace_depth, 3);
    assert!(s.use_fake_caustics);
    assert_eq!(s.up_vector, Vec3::new(0.0, 0.0, 1.0));
}

//! JSON scene descriptions.
//!
//! A scene file holds the render parameters, named surfaces, lights,
//! background shaders and an object tree. Vectors and colors are written
//! as three element arrays. Objects and lights pick their kind with a `ty`
//! string and read only the fields that kind uses; anything left out takes
//! a default.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::{ debug, warn };
use serde::{ Deserialize, Serialize };

use crate::color::Color;
use crate::error::{ RayError, Result };
use crate::light::{ make_directional_light, make_infinite_light, make_point_light, Light, LightFlags };
use crate::shape::{ make_box, make_color_triangle, make_cone, make_csg, make_disc, make_function,
    make_height_field, make_npolygon, make_polygon, make_sphere, make_torus, make_triangle,
    BlobBuilder, CsgOp, HeightMap, MeshBuilder, MeshVertex, Object, ObjectFlags, PolyField, PolyTerm };
use crate::surface::{ Checker, Constant, Finish, Shader, Surface, UvChecker };
use crate::vector::Vec3;
use crate::world::{ RaySetup, Scene };
use crate::xform::Action;

/// Reads and builds a scene file.
pub fn load_scene(path: &Path) -> Result<Scene> {
    let text = fs::read_to_string(path)?;
    debug!("loading scene from {}", path.display());
    parse_scene(&text)
}

/// Builds a scene from JSON text.
pub fn parse_scene(text: &str) -> Result<Scene> {
    let json: SceneJson = serde_json::from_str(text)?;
    Scene::try_from(json)
}

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneJson {
    setup: RaySetup,
    surfaces: BTreeMap<String, SurfaceJson>,
    background: Vec<ShaderJson>,
    lights: Vec<LightJson>,
    objects: Vec<ObjectJson>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SurfaceJson {
    finish: Finish,
    transform: Vec<StepJson>,
    shaders: Vec<ShaderJson>,
}

#[derive(Copy, Clone, Serialize, Deserialize)]
struct StepJson {
    action: Action,
    params: Vec3,
}

#[derive(Clone, Serialize, Deserialize)]
struct ShaderJson {
    ty: String,
    color1: Option<Color>,
    color2: Option<Color>,
    size: Option<f64>,
    tiles: Option<f64>,
    finish: Option<Finish>,
}

#[derive(Clone, Serialize, Deserialize)]
struct LightJson {
    ty: String,
    loc: Option<Vec3>,
    at: Option<Vec3>,
    dir: Option<Vec3>,
    color: Option<Color>,
    falloff: Option<f64>,
    inner: Option<f64>,
    outer: Option<f64>,
    focus: Option<f64>,
    jitter: Option<Vec3>,
    #[serde(default)]
    flags: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
struct ElementJson {
    ty: String,
    field: f64,
    center: Option<Vec3>,
    radius: Option<f64>,
    p1: Option<Vec3>,
    p2: Option<Vec3>,
    point: Option<Vec3>,
    dir: Option<Vec3>,
    dist: Option<f64>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ObjectJson {
    ty: String,
    surface: Option<String>,
    finish: Option<Finish>,
    transform: Vec<StepJson>,
    flags: Vec<String>,

    center: Option<Vec3>,
    radius: Option<f64>,
    corner1: Option<Vec3>,
    corner2: Option<Vec3>,
    base: Option<Vec3>,
    end: Option<Vec3>,
    base_radius: Option<f64>,
    end_radius: Option<f64>,
    closed: bool,
    normal: Option<Vec3>,
    inner_radius: Option<f64>,
    outer_radius: Option<f64>,
    major: Option<f64>,
    minor: Option<f64>,

    // Triangles, polygons and meshes
    points: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Color>,
    uv: Vec<[f64; 2]>,
    sides: Option<usize>,
    triangles: Vec<[usize; 3]>,

    // Height fields
    width: usize,
    depth: usize,
    samples: Vec<u16>,

    threshold: Option<f64>,
    elements: Vec<ElementJson>,

    terms: Vec<PolyTerm>,
    bmin: Option<Vec3>,
    bmax: Option<Vec3>,
    steps: Option<Vec3>,

    children: Vec<ObjectJson>,
    bounds: Vec<ObjectJson>,
}

impl TryFrom<SceneJson> for Scene {
    type Error = RayError;

    fn try_from(scene_json: SceneJson) -> Result<Scene> {
        let mut scene = Scene::new(scene_json.setup);

        let mut surfaces = BTreeMap::new();
        for (name, surface_json) in scene_json.surfaces.iter() {
            let surface = build_surface(surface_json, scene.default_surface())?;
            surfaces.insert(name.clone(), Rc::new(surface));
        }

        for shader_json in scene_json.background.iter() {
            scene.add_background_shader(build_shader(shader_json)?);
        }

        for light_json in scene_json.lights.iter() {
            scene.add_light(build_light(light_json)?);
        }

        let builder = ObjectBuilder { surfaces: &surfaces, global_ior: scene.setup.global_ior };
        for object_json in scene_json.objects.iter() {
            let obj = builder.build(object_json)?;
            scene.add_object(obj);
        }

        if scene.lights.is_empty() {
            warn!("scene has no lights");
        }
        Ok(scene)
    }
}

fn bad(msg: String) -> RayError {
    RayError::Scene(msg)
}

fn build_surface(json: &SurfaceJson, mut surface: Surface) -> Result<Surface> {
    let outior = surface.finish.outior;
    surface.finish = json.finish;
    if json.finish.outior == Finish::default().outior {
        surface.finish.outior = outior;
    }

    for step in json.transform.iter() {
        surface.transform(step.action, step.params);
    }
    for shader_json in json.shaders.iter() {
        surface.add_shader(build_shader(shader_json)?);
    }

    Ok(surface)
}

fn build_shader(json: &ShaderJson) -> Result<Rc<dyn Shader>> {
    let color1 = json.color1.unwrap_or_else(Color::white);
    let color2 = json.color2.unwrap_or_else(Color::black);

    let shader: Rc<dyn Shader> = match json.ty.as_str() {
        "checker" => Rc::new(Checker { color1, color2, size: json.size.unwrap_or(1.0) }),
        "uv_checker" => Rc::new(UvChecker { color1, color2, tiles: json.tiles.unwrap_or(8.0) }),
        "constant" => Rc::new(Constant(json.finish.unwrap_or_default())),
        other => return Err(bad(format!("unknown shader type '{}'", other))),
    };

    Ok(shader)
}

fn build_light(json: &LightJson) -> Result<Light> {
    let color = json.color.unwrap_or_else(Color::white);
    let loc = json.loc.unwrap_or_else(Vec3::zero);

    let mut light = match json.ty.as_str() {
        "point" => make_point_light(loc, color, json.falloff.unwrap_or(0.0)),
        "infinite" => {
            let dir = json.dir.ok_or_else(|| bad("infinite light needs a dir".into()))?;
            make_infinite_light(dir, color)
        },
        "directional" | "spot" => {
            let mut light = make_directional_light(
                loc,
                json.at.unwrap_or_else(Vec3::zero),
                color,
                json.inner.unwrap_or(0.0),
                json.outer.unwrap_or(0.0),
                json.focus.unwrap_or(1.0),
            );
            light.falloff = json.falloff.unwrap_or(0.0);
            light
        },
        other => return Err(bad(format!("unknown light type '{}'", other))),
    };

    if let Some(jitter) = json.jitter {
        light.jitter = jitter;
        light.flags.insert(LightFlags::JITTER);
    }

    for flag in json.flags.iter() {
        light.flags.insert(match flag.as_str() {
            "no_shadow" => LightFlags::NO_SHADOW,
            "no_specular" => LightFlags::NO_SPECULAR,
            "auto_intensity" => LightFlags::AUTO_INTENSITY,
            other => return Err(bad(format!("unknown light flag '{}'", other))),
        });
    }

    Ok(light)
}

fn object_flag(name: &str) -> Result<ObjectFlags> {
    Ok(match name {
        "no_shadow" => ObjectFlags::NO_SHADOW,
        "no_self_intersect" => ObjectFlags::NO_SELF_INTERSECT,
        "inverse" => ObjectFlags::INVERSE,
        "uv" => ObjectFlags::UV,
        "smooth" => ObjectFlags::SMOOTH,
        // Every surface is lit from whichever side the ray arrives on
        "two_sides" => ObjectFlags::empty(),
        other => return Err(bad(format!("unknown object flag '{}'", other))),
    })
}

fn three<T: Copy>(items: &[T], ty: &'static str) -> Result<[T; 3]> {
    match items {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(RayError::TooFewVertices(ty, items.len())),
    }
}

struct ObjectBuilder<'s> {
    surfaces: &'s BTreeMap<String, Rc<Surface>>,
    global_ior: f64,
}

impl<'s> ObjectBuilder<'s> {
    fn build(&self, json: &ObjectJson) -> Result<Object> {
        let mut obj = self.shape(json)?;

        for name in json.flags.iter() {
            obj.flags.insert(object_flag(name)?);
        }
        for step in json.transform.iter() {
            obj.transform(step.action, step.params);
        }

        obj.surface = self.surface(json)?;
        Ok(obj)
    }

    /// The named surface, specialized by an inline finish when both are
    /// given.
    fn surface(&self, json: &ObjectJson) -> Result<Option<Rc<Surface>>> {
        let named = match &json.surface {
            Some(name) => match self.surfaces.get(name) {
                Some(s) => Some(Surface::share(s)),
                None => return Err(bad(format!("unknown surface '{}'", name))),
            },
            None => None,
        };

        Ok(match (named, json.finish) {
            (Some(mut s), Some(finish)) => {
                Rc::make_mut(&mut s).finish = finish;
                Some(s)
            },
            (None, Some(finish)) => {
                let mut s = Surface::new(self.global_ior);
                s.finish = finish;
                Some(Rc::new(s))
            },
            (named, None) => named,
        })
    }

    fn shape(&self, json: &ObjectJson) -> Result<Object> {
        let center = json.center.unwrap_or_else(Vec3::zero);

        let obj = match json.ty.as_str() {
            "sphere" => make_sphere(center, json.radius.unwrap_or(1.0)),
            "box" => make_box(
                json.corner1.unwrap_or_else(|| Vec3::splat(-1.0)),
                json.corner2.unwrap_or_else(|| Vec3::splat(1.0)),
            ),
            "cone" | "cylinder" => {
                let base_radius = json.base_radius.or(json.radius).unwrap_or(1.0);
                let end_radius = if json.ty == "cylinder" {
                    base_radius
                } else {
                    json.end_radius.unwrap_or(0.0)
                };
                make_cone(
                    json.base.unwrap_or_else(Vec3::zero),
                    json.end.unwrap_or_else(|| Vec3::new(0.0, 0.0, 1.0)),
                    base_radius,
                    end_radius,
                    json.closed,
                )
            },
            "disc" => make_disc(
                center,
                json.normal.unwrap_or_else(|| Vec3::new(0.0, 0.0, 1.0)),
                json.inner_radius.unwrap_or(0.0),
                json.outer_radius.or(json.radius).unwrap_or(1.0),
            ),
            "torus" => make_torus(center, json.major.unwrap_or(1.0), json.minor.unwrap_or(0.25)),
            "triangle" => {
                let points = three(&json.points, "triangle")?;
                let normals = if json.normals.is_empty() { None } else { Some(three(&json.normals, "triangle")?) };
                let uv = if json.uv.is_empty() {
                    None
                } else {
                    let [a, b, c] = three(&json.uv, "triangle")?;
                    Some([(a[0], a[1]), (b[0], b[1]), (c[0], c[1])])
                };
                make_triangle(points, normals, uv)
            },
            "color_triangle" => {
                let points = three(&json.points, "triangle")?;
                let normals = if json.normals.is_empty() { None } else { Some(three(&json.normals, "triangle")?) };
                make_color_triangle(points, normals, three(&json.colors, "triangle")?)
            },
            "polygon" => make_polygon(&json.points)?,
            "npolygon" => make_npolygon(json.sides.unwrap_or(0))?,
            "mesh" => self.mesh(json)?,
            "height_field" => {
                let map = HeightMap::new(json.width, json.depth, json.samples.clone())?;
                make_height_field(map)
            },
            "blob" => self.blob(json)?,
            "function" => {
                let field = PolyField::new(json.terms.clone());
                let bounds = match (json.bmin, json.bmax) {
                    (Some(a), Some(b)) => Some((a, b)),
                    _ => None,
                };
                make_function(Box::new(field), bounds, json.steps)
            },
            "union" | "difference" | "intersection" | "clip" | "group" => self.csg(json)?,
            other => return Err(bad(format!("unknown object type '{}'", other))),
        };

        Ok(obj)
    }

    fn mesh(&self, json: &ObjectJson) -> Result<Object> {
        let mut mesh = MeshBuilder::new();

        for (i, p) in json.points.iter().enumerate() {
            let mut v = MeshVertex::new(*p);
            v.normal = json.normals.get(i).copied();
            v.color = json.colors.get(i).copied();
            v.uv = json.uv.get(i).map(|t| (t[0], t[1]));
            mesh.add_vertex(v);
        }
        for t in json.triangles.iter() {
            mesh.add_triangle(t[0], t[1], t[2])?;
        }

        mesh.finish()
    }

    fn blob(&self, json: &ObjectJson) -> Result<Object> {
        let mut blob = BlobBuilder::new(json.threshold.unwrap_or(0.5));

        for e in json.elements.iter() {
            let missing = |field: &str| bad(format!("blob {} element needs {}", e.ty, field));
            match e.ty.as_str() {
                "sphere" => {
                    blob.add_sphere(
                        e.center.unwrap_or_else(Vec3::zero),
                        e.radius.ok_or_else(|| missing("radius"))?,
                        e.field,
                    );
                },
                "cylinder" => {
                    blob.add_cylinder(
                        e.p1.ok_or_else(|| missing("p1"))?,
                        e.p2.ok_or_else(|| missing("p2"))?,
                        e.radius.ok_or_else(|| missing("radius"))?,
                        e.field,
                    );
                },
                "plane" => {
                    blob.add_plane(
                        e.point.unwrap_or_else(Vec3::zero),
                        e.dir.ok_or_else(|| missing("dir"))?,
                        e.dist.ok_or_else(|| missing("dist"))?,
                        e.field,
                    );
                },
                other => return Err(bad(format!("unknown blob element '{}'", other))),
            }
        }
        for bound in json.bounds.iter() {
            blob.add_bound(self.build(bound)?);
        }

        blob.finish()
    }

    fn csg(&self, json: &ObjectJson) -> Result<Object> {
        let op = match json.ty.as_str() {
            "union" => CsgOp::Union,
            "difference" => CsgOp::Difference,
            "intersection" => CsgOp::Intersection,
            "clip" => CsgOp::Clip,
            _ => CsgOp::Group,
        };

        let mut csg = make_csg(op);
        for child in json.children.iter() {
            csg.add_child(self.build(child)?);
        }
        for bound in json.bounds.iter() {
            csg.add_bound(self.build(bound)?);
        }

        csg.finish()
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::ObjectKind;
#[cfg(test)]
use crate::light::LightKind;
#[cfg(test)]
use crate::viewport::Projection;

#[test]
fn empty_document_is_a_default_scene() {
    let scene = parse_scene("{}").unwrap();

    assert!(scene.objects.is_empty());
    assert!(scene.lights.is_empty());
    assert_eq!(scene.setup, RaySetup::default());
}

#[test]
fn setup_and_viewport_fields() {
    let scene = parse_scene(r#"{
        "setup": {
            "background_color1": [0.0, 0.0, 1.0],
            "max_trace_depth": 4,
            "projection": "anaglyph",
            "viewport": { "look_from": [0.0, -5.0, 0.0], "view_angle": 45.0 }
        }
    }"#).unwrap();

    assert_eq!(scene.setup.background_color1, Color::blue());
    assert_eq!(scene.setup.max_trace_depth, 4);
    assert_eq!(scene.setup.projection, Projection::Anaglyph);
    assert_eq!(scene.setup.viewport.look_from, Vec3::new(0.0, -5.0, 0.0));
    assert_eq!(scene.setup.viewport.look_at, Vec3::zero());
}

#[test]
fn named_surfaces_are_shared() {
    let scene = parse_scene(r#"{
        "surfaces": { "red": { "finish": { "color": [1.0, 0.0, 0.0], "ka": [0.1, 0.1, 0.1] } } },
        "objects": [
            { "ty": "sphere", "surface": "red" },
            { "ty": "sphere", "center": [3.0, 0.0, 0.0], "surface": "red" },
            { "ty": "sphere", "surface": "red", "finish": { "color": [0.0, 1.0, 0.0] } }
        ]
    }"#).unwrap();

    let a = scene.objects[0].surface.as_ref().unwrap();
    let b = scene.objects[1].surface.as_ref().unwrap();
    let c = scene.objects[2].surface.as_ref().unwrap();

    assert!(Rc::ptr_eq(a, b));
    assert!(!Rc::ptr_eq(a, c));
    assert_eq!(a.finish.color, Color::red());
    assert_eq!(c.finish.color, Color::green());
}

#[test]
fn every_object_kind_builds() {
    let scene = parse_scene(r#"{
        "objects": [
            { "ty": "sphere", "radius": 2.0, "flags": ["no_shadow"] },
            { "ty": "box", "transform": [{ "action": "translate", "params": [0.0, 0.0, 5.0] }] },
            { "ty": "cone", "closed": true },
            { "ty": "cylinder", "radius": 0.5 },
            { "ty": "disc", "inner_radius": 0.5 },
            { "ty": "torus", "major": 2.0, "minor": 0.5 },
            { "ty": "triangle", "points": [[0,0,0], [1,0,0], [0,1,0]] },
            { "ty": "color_triangle", "points": [[0,0,0], [1,0,0], [0,1,0]],
              "colors": [[1,0,0], [0,1,0], [0,0,1]] },
            { "ty": "polygon", "points": [[0,0,0], [1,0,0], [1,1,0], [0,1,0]] },
            { "ty": "npolygon", "sides": 6 },
            { "ty": "mesh", "points": [[0,0,0], [1,0,0], [0,1,0], [1,1,0]],
              "triangles": [[0, 1, 2], [1, 3, 2]] },
            { "ty": "height_field", "width": 2, "depth": 2, "samples": [0, 100, 200, 300] },
            { "ty": "blob", "threshold": 0.5, "elements": [
                { "ty": "sphere", "radius": 1.0, "field": 1.0 },
                { "ty": "cylinder", "p1": [0,0,0], "p2": [0,0,2], "radius": 0.5, "field": 1.0 }
            ] },
            { "ty": "function", "terms": [
                { "coef": 1.0, "x": 2 }, { "coef": 1.0, "y": 2 }, { "coef": 1.0, "z": 2 }, { "coef": -1.0 }
            ] },
            { "ty": "difference", "children": [
                { "ty": "sphere" }, { "ty": "sphere", "center": [1.0, 0.0, 0.0] }
            ] }
        ]
    }"#).unwrap();

    assert_eq!(scene.objects.len(), 15);
    assert!(scene.objects[0].flags.contains(ObjectFlags::NO_SHADOW));
    assert!(scene.objects[14].is_csg());
    assert!(matches!(scene.objects[11].kind, ObjectKind::HeightField(_)));
}

#[test]
fn two_sides_is_accepted_and_changes_nothing() {
    let scene = parse_scene(r#"{
        "objects": [{ "ty": "disc", "flags": ["two_sides", "uv"] }]
    }"#).unwrap();

    assert_eq!(scene.objects[0].flags, ObjectFlags::UV);
    assert!(matches!(
        parse_scene(r#"{ "objects": [{ "ty": "disc", "flags": ["one_side"] }] }"#),
        Err(RayError::Scene(_))
    ));
}

#[test]
fn lights_read_kind_and_flags() {
    let scene = parse_scene(r#"{
        "lights": [
            { "ty": "point", "loc": [0.0, 0.0, 10.0], "falloff": 0.1, "jitter": [1.0, 1.0, 1.0] },
            { "ty": "infinite", "dir": [0.0, 0.0, 2.0], "flags": ["no_shadow", "no_specular"] },
            { "ty": "spot", "loc": [0.0, 0.0, 5.0], "inner": 10.0, "outer": 20.0 }
        ]
    }"#).unwrap();

    let l = &scene.lights;
    assert_eq!(l[0].kind, LightKind::Point);
    assert!(l[0].flags.contains(LightFlags::JITTER));
    assert_eq!(l[1].dir, Vec3::new(0.0, 0.0, 1.0));
    assert!(l[1].flags.contains(LightFlags::NO_SPECULAR));
    assert_eq!(l[2].kind, LightKind::Directional);
    assert_eq!(l[2].dir, Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn bad_documents_are_errors() {
    assert!(matches!(parse_scene("{ not json"), Err(RayError::Json(_))));
    assert!(matches!(parse_scene(r#"{ "objects": [{ "ty": "teapot" }] }"#), Err(RayError::Scene(_))));
    assert!(matches!(parse_scene(r#"{ "objects": [{ "ty": "union" }] }"#), Err(RayError::EmptyCsg)));
    assert!(matches!(
        parse_scene(r#"{ "objects": [{ "ty": "triangle", "points": [[0,0,0]] }] }"#),
        Err(RayError::TooFewVertices(_, 1))
    ));
    assert!(matches!(
        parse_scene(r#"{ "objects": [{ "ty": "sphere", "surface": "missing" }] }"#),
        Err(RayError::Scene(_))
    ));
    assert!(matches!(load_scene(Path::new("/no/such/scene.json")), Err(RayError::Io(_))));
}

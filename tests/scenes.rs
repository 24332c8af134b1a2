use ray_engine::color::Color;
use ray_engine::intersect::{ find_all, Scan };
use ray_engine::ray::Ray;
use ray_engine::renderer::Renderer;
use ray_engine::scene::parse_scene;
use ray_engine::stats::Stats;
use ray_engine::vector::Vec3;

fn renderer_for(json: &str) -> Renderer {
    let scene = parse_scene(json).unwrap();
    let mut r = Renderer::new();
    r.initialize();
    r.setup(scene).unwrap();
    r
}

#[test]
fn background_gradient_along_the_horizon() {
    let r = renderer_for(r#"{
        "setup": {
            "background_color1": [1.0, 0.0, 0.0],
            "background_color2": [0.0, 0.0, 1.0],
            "viewport": { "look_from": [0.0, 0.0, 0.0], "look_at": [0.0, 1.0, 0.0] }
        }
    }"#);

    let (c, hit) = r.trace_ray_from_viewport_hit(0.0, 0.0).unwrap();
    assert!(!hit);
    assert_eq!(c, Color::red());
}

const SHADOW_SCENE: &str = r#"{
    "setup": {
        "viewport": { "look_from": [0.0, -3.0, 4.0], "look_at": [0.0, 0.0, 1.0], "look_up": [0.0, 1.0, 1.0] }
    },
    "surfaces": { "lit": { "finish": { "ka": [0.2, 0.2, 0.2] } } },
    "lights": [{ "ty": "point", "loc": [0.0, 0.0, 10.0] }],
    "objects": [
        { "ty": "sphere", "surface": "lit" },
        { "ty": "sphere", "center": [0.0, 0.0, 5.0], "surface": "lit" BLOCKER }
    ]
}"#;

#[test]
fn shadowed_point_light_leaves_only_ambient() {
    let shadowed = SHADOW_SCENE.replace("BLOCKER", "");
    let r = renderer_for(&shadowed);
    assert_eq!(r.trace_ray_from_viewport(0.0, 0.0).unwrap(), Color::splat(0.2));

    // Same layout with the blocker ignored by shadow rays
    let open = SHADOW_SCENE.replace("BLOCKER", r#", "flags": ["no_shadow"]"#);
    let r = renderer_for(&open);
    assert_eq!(r.trace_ray_from_viewport(0.0, 0.0).unwrap(), Color::splat(1.2));
}

#[test]
fn mirrored_pair_terminates_at_max_depth() {
    let r = renderer_for(r#"{
        "setup": {
            "max_trace_depth": 6,
            "viewport": { "look_from": [0.0, 0.0, 0.0], "look_at": [1.0, 0.0, 0.0] }
        },
        "surfaces": { "mirror": { "finish": { "ka": [0.1, 0.1, 0.1], "kd": [0.0, 0.0, 0.0], "kr": [1.0, 1.0, 1.0] } } },
        "objects": [
            { "ty": "sphere", "center": [3.0, 0.0, 0.0], "surface": "mirror" },
            { "ty": "sphere", "center": [-3.0, 0.0, 0.0], "surface": "mirror" }
        ]
    }"#);

    let c = r.trace_ray_from_viewport(0.0, 0.0).unwrap();
    assert_eq!(c, Color::splat(0.7));
    assert_eq!(r.stats().reflected_rays.get(), 6);
}

#[test]
fn csg_boolean_laws() {
    let scene = parse_scene(r#"{
        "objects": [
            { "ty": "union", "children": [
                { "ty": "sphere", "center": [-3.0, 0.0, 0.0] },
                { "ty": "sphere", "center": [3.0, 0.0, 0.0] }
            ] },
            { "ty": "intersection", "children": [
                { "ty": "sphere", "center": [-3.0, 0.0, 0.0] },
                { "ty": "sphere", "center": [-3.0, 5.0, 0.0] }
            ] },
            { "ty": "difference", "children": [
                { "ty": "sphere", "center": [3.0, 0.0, 0.0] },
                { "ty": "sphere", "center": [3.0, 0.0, 0.0], "radius": 2.0 }
            ] }
        ]
    }"#).unwrap();

    let stats = Stats::new();
    let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let count = |i: usize| {
        let mut hits = Vec::new();
        find_all(&scene.objects[i..i + 1], &ray, &Scan::new(&stats), &mut hits)
    };

    assert_eq!(count(0), 4);
    assert_eq!(count(1), 0);
    assert_eq!(count(2), 0);
}

#[test]
fn csg_leaves_inherit_the_node_surface() {
    let r = renderer_for(r#"{
        "setup": {
            "viewport": { "look_from": [0.0, -10.0, 0.0], "look_at": [0.0, 0.0, 0.0] }
        },
        "objects": [
            { "ty": "union", "finish": { "color": [0.0, 1.0, 0.0], "ka": [1.0, 1.0, 1.0], "kd": [0.0, 0.0, 0.0] },
              "transform": [{ "action": "translate", "params": [0.0, 0.0, 0.5] }],
              "children": [
                { "ty": "sphere", "center": [0.0, 0.0, -0.5] },
                { "ty": "sphere", "center": [5.0, 0.0, 0.0] }
            ] }
        ]
    }"#);

    let (c, hit) = r.trace_ray_from_viewport_hit(0.0, 0.0).unwrap();
    assert!(hit);
    assert_eq!(c, Color::green());
}

#[test]
fn rendered_image_writes_as_ppm() {
    let r = renderer_for(r#"{
        "setup": { "background_color1": [1.0, 0.0, 0.0], "background_color2": [1.0, 0.0, 0.0] }
    }"#);

    let image = r.render(4, 3).unwrap();
    let mut out = Vec::new();
    image.write_ppm(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("P3"));
    assert_eq!(lines.next(), Some("4 3"));
    assert_eq!(lines.next(), Some("255"));
    assert_eq!(lines.next(), Some("255 0 0 255 0 0 255 0 0 255 0 0"));
}

const EVERY_KIND: &str = r#"{
    "objects": [
        { "ty": "sphere", "radius": 1.5 },
        { "ty": "box" },
        { "ty": "cone", "closed": true },
        { "ty": "cylinder", "radius": 0.5 },
        { "ty": "disc", "inner_radius": 0.5 },
        { "ty": "torus", "major": 2.0, "minor": 0.5 },
        { "ty": "triangle", "points": [[0,0,0], [1,0,0], [0,1,0]] },
        { "ty": "polygon", "points": [[0,0,0], [2,0,0], [2,2,0], [1,0.5,0], [0,2,0]] },
        { "ty": "mesh",
          "points": [[1,0,0], [-1,0,0], [0,1,0], [0,-1,0], [0,0,1], [0,0,-1]],
          "triangles": [[0,2,4], [2,1,4], [1,3,4], [3,0,4], [2,0,5], [1,2,5], [3,1,5], [0,3,5]] },
        { "ty": "height_field", "width": 4, "depth": 4,
          "samples": [0, 9000, 3000, 60000, 20000, 100, 45000, 7000,
                      65535, 30000, 500, 12000, 4000, 50000, 25000, 0] },
        { "ty": "blob", "threshold": 0.5, "elements": [
            { "ty": "sphere", "center": [-0.6, 0.0, 0.0], "radius": 1.0, "field": 1.0 },
            { "ty": "sphere", "center": [0.6, 0.0, 0.0], "radius": 1.0, "field": 1.0 }
        ] },
        { "ty": "function", "terms": [
            { "coef": 1.0, "x": 2 }, { "coef": 1.0, "y": 2 }, { "coef": 1.0, "z": 2 }, { "coef": -0.64 }
        ] },
        { "ty": "difference", "children": [
            { "ty": "sphere" }, { "ty": "sphere", "center": [0.5, 0.0, 0.0], "radius": 0.6 }
        ] },
        { "ty": "union", "children": [
            { "ty": "sphere" }, { "ty": "box", "transform": [{ "action": "translate", "params": [0.8, 0.0, 0.0] }] }
        ] }
    ]
}"#;

#[test]
fn every_kind_reports_hits_in_distance_order() {
    let scene = parse_scene(EVERY_KIND).unwrap();
    let stats = Stats::new();
    let scan = Scan::new(&stats).with_all(true);
    let axes = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];

    for obj in scene.objects.iter() {
        let (lo, hi) = obj.extents();
        let center = (lo + hi) * 0.5;
        let reach = (hi - lo).magnitude() * 0.5 + 0.1;
        let mut crossed = 0;

        for k in 0..3 {
            let (a, b, c) = (axes[k], axes[(k + 1) % 3], axes[(k + 2) % 3]);
            for &sign in &[-1.0, 1.0] {
                let origin = center + a * (sign * (reach + 5.0));
                for i in 0..9 {
                    for j in 0..9 {
                        let s = reach * (i as f64 / 4.0 - 1.0) + 0.013;
                        let r = reach * (j as f64 / 4.0 - 1.0) - 0.007;
                        let target = center + b * s + c * r + a * (0.1 * s);
                        let ray = Ray::new(origin, (target - origin).normalize());

                        let mut hits = Vec::new();
                        obj.intersect(&ray, &scan, &mut hits);
                        crossed += hits.len();
                        for pair in hits.windows(2) {
                            assert!(pair[0].t <= pair[1].t, "{:?} out of order: {} then {}", obj.kind, pair[0].t, pair[1].t);
                        }
                    }
                }
            }
        }

        assert!(crossed > 0, "{:?} was never hit", obj.kind);
    }
}

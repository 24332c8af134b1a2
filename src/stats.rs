use std::cell::Cell;
use std::fmt;

/// A test and hit counter pair for one primitive kind.
#[derive(Debug, Default)]
pub struct Counter {
    pub tests: Cell<u64>,
    pub hits: Cell<u64>,
}

impl Counter {
    pub fn test(&self) {
        self.tests.set(self.tests.get() + 1);
    }

    pub fn hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    /// Records a test, and a hit when `hit` is true. Returns `hit`.
    pub fn record(&self, hit: bool) -> bool {
        self.test();
        if hit {
            self.hit();
        }
        hit
    }

    fn reset(&self) {
        self.tests.set(0);
        self.hits.set(0);
    }
}

fn bump(c: &Cell<u64>) {
    c.set(c.get() + 1);
}

/// Diagnostic counters for one renderer.
///
/// Counters only observe; nothing reads them back while tracing. They live
/// in `Cell`s so the read-only trace path can update them through a shared
/// reference.
#[derive(Debug, Default)]
pub struct Stats {
    pub sphere: Counter,
    pub cube: Counter,
    pub cone: Counter,
    pub disc: Counter,
    pub torus: Counter,
    pub triangle: Counter,
    pub polygon: Counter,
    pub mesh: Counter,
    pub hfield: Counter,
    pub blob: Counter,
    pub fnxyz: Counter,
    pub bbox: Counter,
    pub csg: Counter,

    /// Bounding box nodes built by the last setup.
    pub num_bounds: Cell<u64>,

    pub eye_rays: Cell<u64>,
    pub reflected_rays: Cell<u64>,
    pub transmitted_rays: Cell<u64>,
    pub shadow_rays: Cell<u64>,
    pub shadow_transmitted_rays: Cell<u64>,
    pub shadow_cache_hits: Cell<u64>,

    /// Approximate bytes of object payloads in the bound scene.
    pub mem_used: Cell<u64>,
}

impl Stats {
    pub fn new() -> Stats {
        Default::default()
    }

    pub fn reset(&self) {
        for c in self.counters().iter() {
            c.1.reset();
        }
        for c in [
            &self.num_bounds, &self.eye_rays, &self.reflected_rays,
            &self.transmitted_rays, &self.shadow_rays,
            &self.shadow_transmitted_rays, &self.shadow_cache_hits,
            &self.mem_used,
        ].iter() {
            c.set(0);
        }
    }

    fn counters(&self) -> [(&'static str, &Counter); 13] {
        [
            ("sphere", &self.sphere),
            ("box", &self.cube),
            ("cone", &self.cone),
            ("disc", &self.disc),
            ("torus", &self.torus),
            ("triangle", &self.triangle),
            ("polygon", &self.polygon),
            ("mesh", &self.mesh),
            ("hfield", &self.hfield),
            ("blob", &self.blob),
            ("fnxyz", &self.fnxyz),
            ("bbox", &self.bbox),
            ("csg", &self.csg),
        ]
    }

    pub fn eye_ray(&self) { bump(&self.eye_rays); }
    pub fn reflected_ray(&self) { bump(&self.reflected_rays); }
    pub fn transmitted_ray(&self) { bump(&self.transmitted_rays); }
    pub fn shadow_ray(&self) { bump(&self.shadow_rays); }
    pub fn shadow_transmitted_ray(&self) { bump(&self.shadow_transmitted_rays); }
    pub fn shadow_cache_hit(&self) { bump(&self.shadow_cache_hits); }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<10} {:>12} {:>12}", "object", "tests", "hits")?;
        for (name, c) in self.counters().iter().filter(|c| c.1.tests.get() > 0) {
            writeln!(f, "{:<10} {:>12} {:>12}", name, c.tests.get(), c.hits.get())?;
        }
        writeln!(f, "bounds built: {}", self.num_bounds.get())?;
        writeln!(f, "rays: eye {}, reflected {}, transmitted {}",
            self.eye_rays.get(), self.reflected_rays.get(), self.transmitted_rays.get())?;
        writeln!(f, "shadow rays: {} ({} transmitted, {} cache hits)",
            self.shadow_rays.get(), self.shadow_transmitted_rays.get(),
            self.shadow_cache_hits.get())?;
        write!(f, "object memory: {} bytes", self.mem_used.get())
    }
}

/* Tests */

#[test]
fn record_and_reset() {
    let stats = Stats::new();
    stats.sphere.record(true);
    stats.sphere.record(false);
    stats.eye_ray();

    assert_eq!(stats.sphere.tests.get(), 2);
    assert_eq!(stats.sphere.hits.get(), 1);
    assert_eq!(stats.eye_rays.get(), 1);

    stats.reset();
    assert_eq!(stats.sphere.tests.get(), 0);
    assert_eq!(stats.eye_rays.get(), 0);
}

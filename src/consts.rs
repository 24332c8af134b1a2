// Numeric limits
pub const HUGE: f64 = 1.0e10;
pub const EPSILON: f64 = 1.0e-10;

// Floating point comparisons
pub const FEQ_EPSILON: f64 = 0.0001;

// Degrees to radians
pub const DTOR: f64 = std::f64::consts::PI / 180.0;

// Render defaults
pub const MAX_TRACE_DEPTH: usize = 20;
pub const MIN_TRACE_DIST: f64 = 0.001;
pub const MIN_SHADOW_DIST: f64 = 0.001;
pub const MIN_COLOR_WEIGHT: f64 = 0.002;
pub const BOUND_THRESHOLD: usize = 8;
pub const MAX_CLUSTER_SIZE: usize = 8;

// Objects whose extents pass this limit are never placed in a bounding box
pub const UNBOUNDED_LIMIT: f64 = 1.0e6;

// Lights contributing less than this are skipped
pub const MIN_LIGHT_SCALE: f64 = 0.003;

// Refraction index of empty space
pub const VACUUM_RI: f64 = 1.0;

// Command line defaults
pub const CANVAS_WIDTH: usize = 320;
pub const CANVAS_HEIGHT: usize = 240;
pub const OUT_FILE: &str = "./out.ppm";

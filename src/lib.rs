pub mod consts;
pub mod error;

pub mod vector;
pub mod matrix;
pub mod solve;
pub mod rand;
pub mod xform;
pub mod ray;

pub mod color;
pub mod canvas;
pub mod stats;

pub mod uvmap;
pub mod surface;
pub mod draw;
pub mod intersect;
pub mod bound;
pub mod shape;
pub mod light;

pub mod trace;
pub mod viewport;
pub mod world;
pub mod renderer;
pub mod scene;

use crate::consts::FEQ_EPSILON;

pub fn feq(left: f64, right: f64) -> bool {
    (left - right).abs() < FEQ_EPSILON
}

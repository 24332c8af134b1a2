//! Error types for scene construction and setup.

use thiserror::Error;

/// Errors raised while building or binding a scene.
///
/// Tracing itself never fails: degenerate geometry simply produces no hits.
#[derive(Error, Debug)]
pub enum RayError {
    /// Storage for scene data could not be reserved.
    #[error("out of memory while building {0}")]
    Alloc(&'static str),

    /// A CSG or group node was finished without children.
    #[error("csg node has no children")]
    EmptyCsg,

    /// A polygon or triangle list has fewer than three points.
    #[error("{0} needs at least three vertices, got {1}")]
    TooFewVertices(&'static str, usize),

    /// A blob was finished without elements.
    #[error("blob has no elements")]
    EmptyBlob,

    /// A mesh was finished without triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A mesh triangle refers to a vertex that does not exist.
    #[error("mesh index {0} out of range for {1} vertices")]
    BadMeshIndex(usize, usize),

    /// A height map is too small or its sample count does not match.
    #[error("height map must be at least 2x2 with width*height samples, got {0}x{1}")]
    BadHeightMap(usize, usize),

    /// An explicit transform matrix has no inverse.
    #[error("transform matrix is singular")]
    SingularTransform,

    /// A trace was requested before a scene was bound.
    #[error("renderer has no scene; call setup first")]
    NotSetup,

    /// Invalid scene description.
    #[error("scene error: {0}")]
    Scene(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for scene construction.
pub type Result<T> = std::result::Result<T, RayError>;

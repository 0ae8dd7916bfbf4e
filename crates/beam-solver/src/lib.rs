pub mod conflict;
pub mod interact;
pub mod scene;
pub mod trace;
pub mod tree;

pub use conflict::*;
pub use interact::*;
pub use scene::*;
pub use trace::*;
pub use tree::*;

/// Geometric epsilon for strictly-ahead tests, parallelism, and
/// zero-length checks.
pub const GEOM_EPS: f64 = 1e-9;

/// Slack for aperture-boundary and acceptance-angle comparisons.
/// A hit exactly on the aperture edge is inside.
pub const APERTURE_EPS: f64 = 1e-5;

/// Length assigned to a branch that finds no further interaction,
/// unless the scene's bounding extent clips it first.
pub const DEFAULT_TERMINAL_LEN: f64 = 50.0;

/// Hard recursion cap. Geometry that would legitimately recurse deeper
/// is considered malformed input; the branch is truncated with a
/// diagnostic, never an error.
pub const MAX_DEPTH: u32 = 200;

/// Conflict rollbacks allowed per solve before degrading to a
/// best-effort pass with a warning.
pub const MAX_CONFLICT_RETRIES: u32 = 8;

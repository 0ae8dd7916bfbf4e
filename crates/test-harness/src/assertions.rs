//! Assertion helpers with diagnostic output.
//!
//! Every failure reports expected vs actual plus the caller's context
//! string, so scenario tests fail with a readable message.

use std::collections::BTreeSet;

use beam_solver::{BeamSegment, BeamTree};
use bench_types::Pose;

use crate::helpers::HarnessError;

/// Assert a pose's in-plane position within tolerance.
pub fn assert_position_near(
    pose: &Pose,
    expected: [f64; 2],
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let dx = pose.position[0] - expected[0];
    let dy = pose.position[1] - expected[1];
    if dx.abs() <= tol && dy.abs() <= tol {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] expected position ({:.6}, {:.6}), got ({:.6}, {:.6}) (tol={})",
                ctx, expected[0], expected[1], pose.position[0], pose.position[1], tol,
            ),
        })
    }
}

/// Assert a segment's propagation direction within an angular tolerance
/// (radians).
pub fn assert_direction_near(
    seg: &BeamSegment,
    expected: [f64; 3],
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let norm = (expected[0].powi(2) + expected[1].powi(2) + expected[2].powi(2)).sqrt();
    let dot = (seg.direction[0] * expected[0]
        + seg.direction[1] * expected[1]
        + seg.direction[2] * expected[2])
        / norm;
    let angle = dot.clamp(-1.0, 1.0).acos();
    if angle <= tol {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] direction off by {:.2e} rad (tol={:.2e}): expected {:?}, got {:?}",
                ctx, angle, tol, expected, seg.direction,
            ),
        })
    }
}

/// Assert a segment ends at the expected point.
pub fn assert_endpoint_near(
    seg: &BeamSegment,
    expected: [f64; 3],
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let end = seg.endpoint();
    for (axis, (&a, &e)) in end.iter().zip(expected.iter()).enumerate() {
        if (a - e).abs() > tol {
            return Err(HarnessError::AssertionFailed {
                detail: format!(
                    "[{}] endpoint[{}]: expected {:.6}, got {:.6} (tol={})",
                    ctx, axis, e, a, tol,
                ),
            });
        }
    }
    Ok(())
}

/// Assert the exact set of beam indices present in a tree, as raw bit
/// paths.
pub fn assert_index_set(
    tree: &BeamTree,
    expected: &[u64],
    ctx: &str,
) -> Result<(), HarnessError> {
    let actual: BTreeSet<u64> = tree.segments().map(|s| s.index.raw()).collect();
    let expected: BTreeSet<u64> = expected.iter().copied().collect();
    if actual == expected {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] expected indices {:?}, got {:?}",
                ctx,
                expected.iter().map(|i| format!("{:#b}", i)).collect::<Vec<_>>(),
                actual.iter().map(|i| format!("{:#b}", i)).collect::<Vec<_>>(),
            ),
        })
    }
}

/// Assert total power of a tree's terminal segments within tolerance.
/// With no absorbing interfaces in the scene this should equal the
/// source power.
pub fn assert_terminal_power(
    tree: &BeamTree,
    expected: f64,
    tol: f64,
    ctx: &str,
) -> Result<(), HarnessError> {
    let total: f64 = tree.terminals().iter().map(|s| s.attrs.power).sum();
    if (total - expected).abs() <= tol {
        Ok(())
    } else {
        Err(HarnessError::AssertionFailed {
            detail: format!(
                "[{}] expected terminal power {:.6}, got {:.6} (tol={})",
                ctx, expected, total, tol,
            ),
        })
    }
}

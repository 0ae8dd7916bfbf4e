use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::beam::BeamIndex;

/// Constraint pinning an inline component to a point along its beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlongBeamConstraint {
    /// Distance along the beam from the last prior interaction point.
    Distance { value: f64 },
    /// Place where the beam crosses this world X coordinate.
    X { value: f64 },
    /// Place where the beam crosses this world Y coordinate.
    Y { value: f64 },
    /// Place where the beam crosses this world Z coordinate.
    Z { value: f64 },
}

/// How a component's transform is determined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Placement {
    /// Caller-supplied coordinates; known before any solve.
    Fixed { position: [f64; 3], angle: f64 },
    /// Somewhere along a beam: the transform is an output of the solver.
    /// `angle` is the face angle relative to the reversed beam direction
    /// (0 = facing the incoming beam head-on). `pre_refs` interactions
    /// must occur on this beam index before the constraint may bind.
    AlongBeam {
        beam: Uuid,
        beam_index: BeamIndex,
        constraint: AlongBeamConstraint,
        angle: f64,
        pre_refs: u32,
    },
    /// Offset from another component, resolved once the parent has a pose.
    /// `offset` is expressed in the parent's frame.
    RelativeTo {
        parent: Uuid,
        offset: [f64; 3],
        angle_offset: f64,
    },
}

impl Placement {
    pub fn is_inline(&self) -> bool {
        matches!(self, Placement::AlongBeam { .. })
    }
}

/// Lifecycle of an inline component's placement within a recompute.
///
/// `Unresolved -> Tentative -> { Confirmed | Rejected }`; a `Confirmed`
/// placement may revert to `Unresolved` through rollback, and a
/// `Rejected` one re-enters `Tentative` on a later segment once its
/// pre-ref requirement is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlacementState {
    /// No position yet.
    Unresolved,
    /// Speculative transform, not yet confirmed to intersect its beam.
    Tentative,
    /// Intersection verified; persists until a rollback invalidates it.
    Confirmed,
    /// Tentative transform rejected this segment; counted as a skip.
    Rejected,
}

impl PlacementState {
    pub fn is_posed(self) -> bool {
        matches!(self, PlacementState::Tentative | PlacementState::Confirmed)
    }
}

use bench_types::{InterfaceDescriptor, Placement, PlacementState};
use beam_solver::{SceneComponent, SolveError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::body::BodyError;

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("component not found: {id}")]
    ComponentNotFound { id: Uuid },

    #[error("placement references unknown beam: {id}")]
    UnknownBeam { id: Uuid },

    #[error("placement references unknown parent component: {id}")]
    UnknownParent { id: Uuid },

    #[error("component {id} is the parent of other placements")]
    ComponentInUse { id: Uuid },

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Body(#[from] BodyError),
}

/// The persistent declaration of a component: everything the user
/// stated, none of the solver's bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub id: Uuid,
    pub label: String,
    pub descriptor: InterfaceDescriptor,
    pub placement: Placement,
    #[serde(default)]
    pub suppressed: bool,
}

impl ComponentDecl {
    pub fn from_component(comp: &SceneComponent) -> Self {
        Self {
            id: comp.id,
            label: comp.label.clone(),
            descriptor: comp.descriptor.clone(),
            placement: comp.placement,
            suppressed: comp.suppressed,
        }
    }

    pub fn into_component(self) -> SceneComponent {
        SceneComponent {
            id: self.id,
            label: self.label,
            descriptor: self.descriptor,
            placement: self.placement,
            suppressed: self.suppressed,
            state: PlacementState::Unresolved,
            pose: None,
            refs_seen: 0,
            consumed: 0.0,
            confirmed_under: None,
        }
    }
}

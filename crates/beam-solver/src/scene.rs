use bench_types::{
    BeamAttrs, InterfaceDescriptor, Placement, PlacementState, Pose,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::GEOM_EPS;

/// A declared beam source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamSource {
    pub id: Uuid,
    pub label: String,
    pub origin: [f64; 3],
    /// Direction of travel; normalized by the solver.
    pub direction: [f64; 3],
    pub attrs: BeamAttrs,
}

/// A component registered in the scene, with its runtime placement state.
///
/// `state`, `refs_seen`, `consumed` and `confirmed_under` are solver
/// bookkeeping; they are reset at the start of every recompute.
#[derive(Debug, Clone)]
pub struct SceneComponent {
    pub id: Uuid,
    pub label: String,
    pub descriptor: InterfaceDescriptor,
    pub placement: Placement,
    pub suppressed: bool,
    pub state: PlacementState,
    pub pose: Option<Pose>,
    /// Interactions seen on the owning beam index while this component
    /// was the front of its constraint queue.
    pub refs_seen: u32,
    /// Path distance consumed by skips, subtracted from an eventual
    /// `Distance` placement.
    pub consumed: f64,
    /// Which (beam, beam index) confirmed this inline placement.
    pub confirmed_under: Option<(Uuid, bench_types::BeamIndex)>,
}

impl SceneComponent {
    fn new(label: String, descriptor: InterfaceDescriptor, placement: Placement) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            descriptor,
            placement,
            suppressed: false,
            state: PlacementState::Unresolved,
            pose: None,
            refs_seen: 0,
            consumed: 0.0,
            confirmed_under: None,
        }
    }

    /// Clear all solver bookkeeping back to the unresolved state.
    pub fn reset_runtime(&mut self) {
        self.state = PlacementState::Unresolved;
        self.pose = None;
        self.refs_seen = 0;
        self.consumed = 0.0;
        self.confirmed_under = None;
    }
}

/// Axis-aligned extent of the baseplate; terminal segments are clipped
/// to it when set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// The set of all registered beams and components, in registration
/// order. Registration order is the deterministic tie-break for
/// equal-distance interactions and for constraint queues.
///
/// The solver is the only writer; all writes during one solve are one
/// transaction (see `conflict::PlacementSnapshot`).
#[derive(Debug, Clone, Default)]
pub struct SceneRegistry {
    pub components: Vec<SceneComponent>,
    pub beams: Vec<BeamSource>,
    pub bounds: Option<Bounds>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_beam(
        &mut self,
        label: impl Into<String>,
        origin: [f64; 3],
        direction: [f64; 3],
        attrs: BeamAttrs,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.beams.push(BeamSource {
            id,
            label: label.into(),
            origin,
            direction,
            attrs,
        });
        id
    }

    pub fn add_component(
        &mut self,
        label: impl Into<String>,
        descriptor: InterfaceDescriptor,
        placement: Placement,
    ) -> Uuid {
        let comp = SceneComponent::new(label.into(), descriptor, placement);
        let id = comp.id;
        self.components.push(comp);
        id
    }

    pub fn beam(&self, id: Uuid) -> Option<&BeamSource> {
        self.beams.iter().find(|b| b.id == id)
    }

    pub fn component(&self, id: Uuid) -> Option<&SceneComponent> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn component_mut(&mut self, id: Uuid) -> Option<&mut SceneComponent> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    pub fn component_index(&self, id: Uuid) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }

    /// Reset every placement to its pre-solve state: fixed components get
    /// their declared pose, everything else is unresolved.
    pub fn reset_placements(&mut self) {
        for comp in &mut self.components {
            comp.reset_runtime();
            if let Placement::Fixed { position, angle } = comp.placement {
                comp.pose = Some(Pose::new(position, angle));
                comp.state = PlacementState::Confirmed;
            }
        }
    }

    /// Resolve `RelativeTo` poses whose parents have confirmed poses.
    /// Loops so chains of relative placements settle in one call.
    pub fn refresh_relative(&mut self) {
        loop {
            let mut resolved: Option<(usize, Pose)> = None;
            for (i, comp) in self.components.iter().enumerate() {
                if comp.pose.is_some() {
                    continue;
                }
                let Placement::RelativeTo {
                    parent,
                    offset,
                    angle_offset,
                } = comp.placement
                else {
                    continue;
                };
                let Some(parent_comp) = self.component(parent) else {
                    continue;
                };
                if parent_comp.state != PlacementState::Confirmed {
                    continue;
                }
                let Some(parent_pose) = parent_comp.pose else {
                    continue;
                };
                // Offset is expressed in the parent's frame.
                let (sin, cos) = parent_pose.angle.sin_cos();
                let pose = Pose::new(
                    [
                        parent_pose.position[0] + cos * offset[0] - sin * offset[1],
                        parent_pose.position[1] + sin * offset[0] + cos * offset[1],
                        parent_pose.position[2] + offset[2],
                    ],
                    parent_pose.angle + angle_offset,
                );
                resolved = Some((i, pose));
                break;
            }
            match resolved {
                Some((i, pose)) => {
                    debug!(component = %self.components[i].label, "resolved relative placement");
                    self.components[i].pose = Some(pose);
                    self.components[i].state = PlacementState::Confirmed;
                }
                None => break,
            }
        }
    }

    /// Front of the constraint queue for `(beam, index)`: the first
    /// registered, unsuppressed inline component on that key that has
    /// not yet been confirmed.
    pub fn pending_inline(
        &self,
        beam: Uuid,
        index: bench_types::BeamIndex,
    ) -> Option<usize> {
        self.components.iter().position(|c| {
            !c.suppressed
                && c.state != PlacementState::Confirmed
                && matches!(
                    c.placement,
                    Placement::AlongBeam {
                        beam: b,
                        beam_index: i,
                        ..
                    } if b == beam && i == index
                )
        })
    }

    /// Reset pass counters for every unconfirmed inline component of a
    /// beam before a (re)trace.
    pub fn reset_pass_counters(&mut self, beam: Uuid) {
        for comp in &mut self.components {
            if comp.state == PlacementState::Confirmed {
                continue;
            }
            if matches!(comp.placement, Placement::AlongBeam { beam: b, .. } if b == beam) {
                comp.reset_runtime();
            }
        }
    }

    /// Unconfirm everything a beam's solve placed, ahead of a re-solve.
    pub fn reset_beam_confirmations(&mut self, beam: Uuid) {
        for comp in &mut self.components {
            if matches!(comp.confirmed_under, Some((b, _)) if b == beam) {
                comp.reset_runtime();
            }
        }
    }

    /// Distance at which a ray leaves the bounding extent, if one is set
    /// and the ray starts inside it. A ray originating outside the
    /// extent is not clipped at all.
    pub fn exit_distance(&self, origin: [f64; 3], direction: [f64; 3]) -> Option<f64> {
        let bounds = self.bounds?;
        let inside = (0..3).all(|axis| {
            origin[axis] >= bounds.min[axis] - GEOM_EPS
                && origin[axis] <= bounds.max[axis] + GEOM_EPS
        });
        if !inside {
            return None;
        }
        let mut t_exit = f64::INFINITY;
        for axis in 0..3 {
            let d = direction[axis];
            if d.abs() < GEOM_EPS {
                continue;
            }
            let far = if d > 0.0 {
                bounds.max[axis]
            } else {
                bounds.min[axis]
            };
            let t = (far - origin[axis]) / d;
            if t >= 0.0 {
                t_exit = t_exit.min(t);
            }
        }
        if t_exit.is_finite() {
            Some(t_exit)
        } else {
            None
        }
    }
}

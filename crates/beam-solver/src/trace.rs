//! The beam propagation and constraint-placement solver.
//!
//! `solve_beam` walks one beam source through the scene: at each step it
//! tentatively places the front of the inline constraint queue, tests
//! ray-interface intersection against every posed component, takes the
//! nearest interaction, and recurses into the 0-2 outgoing rays. A
//! confirmed placement that retroactively interrupts an already-recorded
//! segment triggers a rollback (see `conflict`) and a bounded retrace.

use bench_types::{
    AlongBeamConstraint, Aperture, BeamAttrs, BeamIndex, Placement, PlacementState, Pose,
};
use nalgebra::Vector3;
use std::f64::consts::PI;
use thiserror::Error;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::conflict::{find_conflict, rollback, Conflict, PlacementSnapshot};
use crate::interact::{interface_outputs, BranchKind};
use crate::scene::{SceneComponent, SceneRegistry};
use crate::tree::{BeamSegment, BeamTree};
use crate::{APERTURE_EPS, DEFAULT_TERMINAL_LEN, GEOM_EPS, MAX_CONFLICT_RETRIES, MAX_DEPTH};

/// Result of solving one beam.
#[derive(Debug)]
pub struct SolveOutcome {
    pub tree: BeamTree,
    pub warnings: Vec<SolveWarning>,
}

/// Non-fatal diagnostics from a solve or recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveWarning {
    /// A branch was truncated at the recursion or split-depth cap.
    DepthCutoff { beam: Uuid, index: BeamIndex },
    /// Conflict rollbacks exhausted; the last pass ran best-effort.
    ConflictRetriesExhausted { beam: Uuid },
    /// Cross-beam revalidation sweeps ran out before every tree settled;
    /// the named beams keep their last solved trees.
    RevalidationExhausted { beams: Vec<Uuid> },
    /// An inline component never intersected its declared beam.
    UnresolvedPlacement { component: Uuid, label: String },
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("beam not found: {id}")]
    BeamNotFound { id: Uuid },

    #[error("beam {id} has a near-zero direction vector")]
    DegenerateDirection { id: Uuid },
}

/// A candidate ray-interface interaction.
#[derive(Debug, Clone)]
pub struct Hit {
    /// Registration index of the component in the scene.
    pub component: usize,
    pub t: f64,
    pub point: Vector3<f64>,
    /// Pose of the component at the time of the hit.
    pub pose: Pose,
    /// Hit landed in the blocking region: the beam stops, no outputs.
    pub blocked: bool,
}

/// Test one component's interface against a ray.
///
/// Intersection requires the hit to be strictly ahead of the origin,
/// within the aperture bounds, and within the acceptance half-angle --
/// unless it lands in the blocking region, which stops the beam
/// regardless of angle. Degenerate cases (parallel ray, hit behind the
/// origin) return `None`.
pub fn test_interface(
    comp: &SceneComponent,
    pose: &Pose,
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
) -> Option<(f64, Vector3<f64>, bool)> {
    let normal = Vector3::from(pose.normal());
    let denom = direction.dot(&normal);
    if denom.abs() < GEOM_EPS {
        return None;
    }
    let center = Vector3::from(pose.position);
    let t = (center - origin).dot(&normal) / denom;
    if t <= GEOM_EPS {
        return None;
    }
    let point = origin + direction * t;
    let offset = point - center;
    let u = offset.dot(&Vector3::from(pose.tangent()));
    let w = offset.z;

    let in_aperture = match comp.descriptor.aperture {
        Aperture::Circular { diameter } => {
            let r = diameter / 2.0 + APERTURE_EPS;
            u * u + w * w <= r * r
        }
        Aperture::Rect { dx, dy } => {
            u.abs() <= dx / 2.0 + APERTURE_EPS && w.abs() <= dy / 2.0 + APERTURE_EPS
        }
    };
    let incidence = denom.abs().clamp(0.0, 1.0).acos();
    let angle_ok = incidence <= comp.descriptor.acceptance + APERTURE_EPS;

    if in_aperture && angle_ok {
        return Some((t, point, false));
    }
    if let Some(block) = comp.descriptor.blocking_diameter {
        let r = block / 2.0 + APERTURE_EPS;
        if u * u + w * w <= r * r {
            return Some((t, point, true));
        }
    }
    None
}

/// Nearest interaction along a ray, over every posed, unsuppressed
/// component. Equal distances break toward the first-registered
/// component (candidates are scanned in registration order and only a
/// strictly nearer hit displaces the current winner).
pub fn nearest_interaction(
    scene: &SceneRegistry,
    origin: &Vector3<f64>,
    direction: &Vector3<f64>,
    exclude: Option<Uuid>,
) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for (i, comp) in scene.components.iter().enumerate() {
        if comp.suppressed || Some(comp.id) == exclude {
            continue;
        }
        let Some(pose) = comp.pose else {
            continue;
        };
        let Some((t, point, blocked)) = test_interface(comp, &pose, origin, direction) else {
            continue;
        };
        let nearer = match &best {
            Some(b) => t < b.t - GEOM_EPS,
            None => true,
        };
        if nearer {
            best = Some(Hit {
                component: i,
                t,
                point,
                pose,
                blocked,
            });
        }
    }
    best
}

/// Solve one beam source to its full segment tree.
///
/// Mutates the scene's inline placement state as a side effect; all
/// writes are one transaction. Conflict rollbacks retry up to
/// `MAX_CONFLICT_RETRIES` times; after that the pre-solve snapshot is
/// restored and one best-effort pass runs with detection disabled.
pub fn solve_beam(scene: &mut SceneRegistry, beam_id: Uuid) -> Result<SolveOutcome, SolveError> {
    let source = scene
        .beam(beam_id)
        .cloned()
        .ok_or(SolveError::BeamNotFound { id: beam_id })?;
    let direction = Vector3::from(source.direction);
    let norm = direction.norm();
    if norm < GEOM_EPS {
        return Err(SolveError::DegenerateDirection { id: beam_id });
    }
    let direction = direction / norm;
    let origin = Vector3::from(source.origin);

    let snapshot = PlacementSnapshot::capture(scene);
    let mut warnings = Vec::new();
    let mut retries = 0u32;

    loop {
        scene.reset_pass_counters(beam_id);
        let mut tracer = Tracer {
            scene: &mut *scene,
            tree: BeamTree::new(beam_id),
            warnings: Vec::new(),
            beam: beam_id,
            detect_conflicts: retries < MAX_CONFLICT_RETRIES,
        };
        match tracer.step(origin, direction, BeamIndex::ROOT, source.attrs, None, None, 0) {
            Ok(()) => {
                warnings.extend(tracer.warnings);
                return Ok(SolveOutcome {
                    tree: tracer.tree,
                    warnings,
                });
            }
            Err(conflict) => {
                let mut tree = tracer.tree;
                rollback(scene, &mut tree, &conflict);
                retries += 1;
                if retries >= MAX_CONFLICT_RETRIES {
                    warn!(beam = %beam_id, retries, "conflict retries exhausted");
                    warnings.push(SolveWarning::ConflictRetriesExhausted { beam: beam_id });
                    // Start the best-effort pass from a clean slate.
                    snapshot.restore(scene);
                }
            }
        }
    }
}

struct Tracer<'a> {
    scene: &'a mut SceneRegistry,
    tree: BeamTree,
    warnings: Vec<SolveWarning>,
    beam: Uuid,
    detect_conflicts: bool,
}

impl Tracer<'_> {
    /// One solver step: place, intersect, pick, branch, recurse.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        index: BeamIndex,
        attrs: BeamAttrs,
        parent: Option<usize>,
        source: Option<Uuid>,
        depth: u32,
    ) -> Result<(), Conflict> {
        if depth >= MAX_DEPTH {
            warn!(beam = %self.beam, %index, depth, "recursion cap reached, truncating branch");
            self.warnings.push(SolveWarning::DepthCutoff {
                beam: self.beam,
                index,
            });
            self.push_terminal(origin, direction, index, attrs, parent, source);
            return Ok(());
        }

        let tentative = self.place_tentative(&origin, &direction, index);
        let winner = nearest_interaction(self.scene, &origin, &direction, source);
        self.settle_pending(index, tentative, &winner)?;

        let Some(hit) = winner else {
            self.push_terminal(origin, direction, index, attrs, parent, source);
            return Ok(());
        };

        let comp = &self.scene.components[hit.component];
        let hit_id = comp.id;
        let pose = hit.pose;
        trace!(
            beam = %self.beam,
            %index,
            component = %comp.label,
            t = hit.t,
            blocked = hit.blocked,
            "interaction"
        );

        let node = self.tree.push(
            parent,
            BeamSegment {
                index,
                origin: origin.into(),
                direction: direction.into(),
                length: hit.t,
                attrs,
                hit: Some(hit_id),
                source,
                blocked: hit.blocked,
            },
        );
        if hit.blocked {
            return Ok(());
        }

        let normal = Vector3::from(pose.normal());
        let hit_offset = hit.point - Vector3::from(pose.position);
        let behavior = self.scene.components[hit.component].descriptor.behavior.clone();
        let outputs = interface_outputs(&behavior, &direction, &normal, &hit_offset, &attrs);

        if outputs.len() == 2 {
            if index.split_depth() + 1 > BeamIndex::MAX_SPLIT_DEPTH {
                warn!(beam = %self.beam, %index, "split-depth cap reached, truncating branch");
                self.warnings.push(SolveWarning::DepthCutoff {
                    beam: self.beam,
                    index,
                });
                return Ok(());
            }
            for ray in outputs {
                let child_index = match ray.branch {
                    BranchKind::Transmitted => index.transmitted(),
                    BranchKind::Reflected => index.reflected(),
                };
                self.step(
                    hit.point,
                    ray.direction,
                    child_index,
                    ray.attrs,
                    Some(node),
                    Some(hit_id),
                    depth + 1,
                )?;
            }
        } else {
            // Single-output interactions continue under the parent index.
            for ray in outputs {
                self.step(
                    hit.point,
                    ray.direction,
                    index,
                    ray.attrs,
                    Some(node),
                    Some(hit_id),
                    depth + 1,
                )?;
            }
        }
        Ok(())
    }

    /// Step 2: tentatively place the front of the constraint queue for
    /// this beam index, if its pre-ref requirement is met and the
    /// constraint yields a point ahead on this segment.
    fn place_tentative(
        &mut self,
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
        index: BeamIndex,
    ) -> Option<usize> {
        let idx = self.scene.pending_inline(self.beam, index)?;
        let comp = &self.scene.components[idx];
        let Placement::AlongBeam {
            constraint,
            angle,
            pre_refs,
            ..
        } = comp.placement
        else {
            return None;
        };
        if comp.refs_seen < pre_refs {
            return None;
        }

        let t = match constraint {
            AlongBeamConstraint::Distance { value } => value - comp.consumed,
            AlongBeamConstraint::X { value } => axis_crossing(origin.x, direction.x, value)?,
            AlongBeamConstraint::Y { value } => axis_crossing(origin.y, direction.y, value)?,
            AlongBeamConstraint::Z { value } => axis_crossing(origin.z, direction.z, value)?,
        };
        if t <= GEOM_EPS {
            return None;
        }

        let position = origin + direction * t;
        let heading = direction.y.atan2(direction.x);
        let pose = Pose::new(position.into(), heading + PI + angle);
        let comp = &mut self.scene.components[idx];
        comp.pose = Some(pose);
        comp.state = PlacementState::Tentative;
        debug!(
            component = %comp.label,
            %index,
            t,
            "tentative inline placement"
        );
        Some(idx)
    }

    /// Step 4 bookkeeping: confirm, skip, or withdraw the pending inline
    /// component for this index, given the winning interaction.
    fn settle_pending(
        &mut self,
        index: BeamIndex,
        tentative: Option<usize>,
        winner: &Option<Hit>,
    ) -> Result<(), Conflict> {
        let Some(hit) = winner else {
            // No interaction at all: withdraw the speculative pose
            // without counting a skip.
            if let Some(t_idx) = tentative {
                let comp = &mut self.scene.components[t_idx];
                comp.state = PlacementState::Unresolved;
                comp.pose = None;
            }
            return Ok(());
        };

        let pending = self.scene.pending_inline(self.beam, index);
        let Some(p_idx) = pending else {
            return Ok(());
        };

        if p_idx == hit.component {
            // The tentative candidate won: confirm it.
            let beam = self.beam;
            let comp = &mut self.scene.components[p_idx];
            comp.state = PlacementState::Confirmed;
            comp.confirmed_under = Some((beam, index));
            debug!(component = %comp.label, %index, t = hit.t, "confirmed inline placement");
            if self.detect_conflicts {
                if let Some(conflict) = find_conflict(self.scene, &self.tree, p_idx) {
                    debug!(
                        component = %self.scene.components[p_idx].label,
                        victim = conflict.victim_node,
                        "confirmation invalidates an earlier segment"
                    );
                    return Err(conflict);
                }
            }
            return Ok(());
        }

        // A different component won first: one more prior interaction
        // for the pending candidate. A rejected tentative transform also
        // accumulates the skipped distance.
        let comp = &mut self.scene.components[p_idx];
        comp.refs_seen += 1;
        if tentative == Some(p_idx) {
            comp.consumed += hit.t;
            comp.state = PlacementState::Rejected;
            comp.pose = None;
            debug!(
                component = %comp.label,
                %index,
                refs_seen = comp.refs_seen,
                consumed = comp.consumed,
                "inline candidate skipped"
            );
        }
        Ok(())
    }

    /// Step 5: no interaction found. Terminate with the default length,
    /// or clip to the bounding extent when one is set.
    fn push_terminal(
        &mut self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        index: BeamIndex,
        attrs: BeamAttrs,
        parent: Option<usize>,
        source: Option<Uuid>,
    ) {
        let length = self
            .scene
            .exit_distance(origin.into(), direction.into())
            .unwrap_or(DEFAULT_TERMINAL_LEN);
        self.tree.push(
            parent,
            BeamSegment {
                index,
                origin: origin.into(),
                direction: direction.into(),
                length,
                attrs,
                hit: None,
                source,
                blocked: false,
            },
        );
    }
}

fn axis_crossing(origin: f64, slope: f64, target: f64) -> Option<f64> {
    if slope.abs() < GEOM_EPS {
        return None;
    }
    let t = (target - origin) / slope;
    if t > GEOM_EPS {
        Some(t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_types::{Aperture, Behavior, InterfaceDescriptor};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn mirror() -> InterfaceDescriptor {
        InterfaceDescriptor::new(
            Aperture::Circular { diameter: 25.4 },
            FRAC_PI_2,
            Behavior::Mirror,
        )
    }

    fn waveplate() -> InterfaceDescriptor {
        InterfaceDescriptor::new(
            Aperture::Circular { diameter: 25.4 },
            FRAC_PI_2,
            Behavior::Transmissive,
        )
    }

    /// Mirror at (50, 0) facing 135 degrees turns a +x beam to +y.
    fn scene_with_turn() -> (SceneRegistry, Uuid) {
        let mut scene = SceneRegistry::new();
        let beam = scene.add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default());
        scene.add_component(
            "m1",
            mirror(),
            Placement::Fixed {
                position: [50.0, 0.0, 0.0],
                angle: 3.0 * FRAC_PI_4, // 135 degrees: reflects +x into +y
            },
        );
        scene.reset_placements();
        (scene, beam)
    }

    #[test]
    fn test_single_mirror_two_segments() {
        let (mut scene, beam) = scene_with_turn();
        let outcome = solve_beam(&mut scene, beam).unwrap();
        let segs: Vec<_> = outcome.tree.segments().collect();
        assert_eq!(segs.len(), 2);
        assert!((segs[0].length - 50.0).abs() < 1e-9);
        assert_eq!(segs[0].index, BeamIndex::ROOT);
        // Continuation keeps the parent index.
        assert_eq!(segs[1].index, BeamIndex::ROOT);
        let end = segs[1].endpoint();
        assert!((end[0] - 50.0).abs() < 1e-6, "x = {}", end[0]);
        assert!((end[1] - 50.0).abs() < 1e-6, "y = {}", end[1]);
    }

    #[test]
    fn test_preref_offset_past_mirror() {
        // Inline waveplate, distance 20 with one pre-ref: binds 20 units
        // past the mirror interaction, at (50, 20).
        let (mut scene, beam) = scene_with_turn();
        let wp = scene.add_component(
            "wp",
            waveplate(),
            Placement::AlongBeam {
                beam,
                beam_index: BeamIndex::ROOT,
                constraint: AlongBeamConstraint::Distance { value: 20.0 },
                angle: 0.0,
                pre_refs: 1,
            },
        );
        let outcome = solve_beam(&mut scene, beam).unwrap();
        let comp = scene.component(wp).unwrap();
        assert_eq!(comp.state, PlacementState::Confirmed);
        let pose = comp.pose.unwrap();
        assert!((pose.position[0] - 50.0).abs() < 1e-6, "x = {}", pose.position[0]);
        assert!((pose.position[1] - 20.0).abs() < 1e-6, "y = {}", pose.position[1]);
        // origin->mirror, mirror->waveplate, waveplate->terminal
        assert_eq!(outcome.tree.len(), 3);
    }

    #[test]
    fn test_skip_accumulates_distance() {
        // Waveplate declared at distance 60 with no pre-refs: the mirror
        // at 50 wins first; the remainder (10) lands past the mirror.
        let (mut scene, beam) = scene_with_turn();
        let wp = scene.add_component(
            "wp",
            waveplate(),
            Placement::AlongBeam {
                beam,
                beam_index: BeamIndex::ROOT,
                constraint: AlongBeamConstraint::Distance { value: 60.0 },
                angle: 0.0,
                pre_refs: 0,
            },
        );
        solve_beam(&mut scene, beam).unwrap();
        let comp = scene.component(wp).unwrap();
        assert_eq!(comp.state, PlacementState::Confirmed);
        let pose = comp.pose.unwrap();
        assert!((pose.position[0] - 50.0).abs() < 1e-6);
        assert!((pose.position[1] - 10.0).abs() < 1e-6, "y = {}", pose.position[1]);
    }

    #[test]
    fn test_unreachable_inline_left_unresolved() {
        let mut scene = SceneRegistry::new();
        let beam = scene.add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default());
        let wp = scene.add_component(
            "wp",
            waveplate(),
            Placement::AlongBeam {
                beam,
                beam_index: BeamIndex::ROOT,
                constraint: AlongBeamConstraint::Distance { value: 20.0 },
                angle: 0.0,
                pre_refs: 3, // never satisfied: nothing else in the scene
            },
        );
        scene.reset_placements();
        let outcome = solve_beam(&mut scene, beam).unwrap();
        assert_eq!(scene.component(wp).unwrap().state, PlacementState::Unresolved);
        assert_eq!(outcome.tree.len(), 1);
        let seg = outcome.tree.segments().next().unwrap();
        assert!((seg.length - DEFAULT_TERMINAL_LEN).abs() < 1e-12);
    }

    #[test]
    fn test_coordinate_constraint_binds_at_crossing() {
        let (mut scene, beam) = scene_with_turn();
        // Bind where the reflected (+y) leg crosses y = 30; on the first
        // (+x) leg the ray never advances in y, so the constraint is
        // degenerate there and the mirror interaction is the pre-ref.
        let wp = scene.add_component(
            "pickoff",
            waveplate(),
            Placement::AlongBeam {
                beam,
                beam_index: BeamIndex::ROOT,
                constraint: AlongBeamConstraint::Y { value: 30.0 },
                angle: 0.0,
                pre_refs: 0,
            },
        );
        solve_beam(&mut scene, beam).unwrap();
        let pose = scene.component(wp).unwrap().pose.unwrap();
        assert!((pose.position[0] - 50.0).abs() < 1e-6);
        assert!((pose.position[1] - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_blocking_region_stops_beam() {
        let mut scene = SceneRegistry::new();
        let beam = scene.add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default());
        // Tiny acceptance angle, large blocking area: the beam arrives
        // at grazing incidence and is stopped, not reflected.
        let desc = InterfaceDescriptor::new(
            Aperture::Circular { diameter: 10.0 },
            0.01,
            Behavior::Mirror,
        )
        .with_blocking(30.0);
        scene.add_component(
            "m1",
            desc,
            Placement::Fixed {
                position: [40.0, 0.0, 0.0],
                angle: 3.0 * FRAC_PI_4, // 135 degrees: 45-degree incidence
            },
        );
        scene.reset_placements();
        let outcome = solve_beam(&mut scene, beam).unwrap();
        let segs: Vec<_> = outcome.tree.segments().collect();
        assert_eq!(segs.len(), 1);
        assert!(segs[0].blocked);
        assert!((segs[0].length - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_break_first_registered() {
        let mut scene = SceneRegistry::new();
        let beam = scene.add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default());
        let first = scene.add_component(
            "a",
            waveplate(),
            Placement::Fixed {
                position: [30.0, 0.0, 0.0],
                angle: PI,
            },
        );
        scene.add_component(
            "b",
            waveplate(),
            Placement::Fixed {
                position: [30.0, 0.0, 0.0],
                angle: PI,
            },
        );
        scene.reset_placements();
        let outcome = solve_beam(&mut scene, beam).unwrap();
        let segs: Vec<_> = outcome.tree.segments().collect();
        assert_eq!(segs[0].hit, Some(first));
    }

    #[test]
    fn test_idempotent_resolve() {
        let (mut scene, beam) = scene_with_turn();
        scene.add_component(
            "wp",
            waveplate(),
            Placement::AlongBeam {
                beam,
                beam_index: BeamIndex::ROOT,
                constraint: AlongBeamConstraint::Distance { value: 20.0 },
                angle: 0.0,
                pre_refs: 1,
            },
        );
        let first = solve_beam(&mut scene, beam).unwrap();
        let poses_first: Vec<_> = scene.components.iter().map(|c| c.pose).collect();

        scene.reset_placements();
        let second = solve_beam(&mut scene, beam).unwrap();
        let poses_second: Vec<_> = scene.components.iter().map(|c| c.pose).collect();

        assert_eq!(poses_first, poses_second);
        let a: Vec<_> = first.tree.segments().collect();
        let b: Vec<_> = second.tree.segments().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_mirrors_hit_depth_cap() {
        let mut scene = SceneRegistry::new();
        let beam = scene.add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default());
        scene.add_component(
            "m1",
            mirror(),
            Placement::Fixed {
                position: [10.0, 0.0, 0.0],
                angle: PI,
            },
        );
        scene.add_component(
            "m2",
            mirror(),
            Placement::Fixed {
                position: [-10.0, 0.0, 0.0],
                angle: 0.0,
            },
        );
        scene.reset_placements();
        let outcome = solve_beam(&mut scene, beam).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| matches!(w, SolveWarning::DepthCutoff { .. })));
        // One segment per bounce plus the truncating terminal.
        assert_eq!(outcome.tree.len() as u32, MAX_DEPTH + 1);
    }
}

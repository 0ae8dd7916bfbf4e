//! Rollback machinery for retroactive placement conflicts.
//!
//! Confirming an inline placement can invalidate segments that were
//! recorded before the component had a pose: the new interface sits in
//! the middle of an earlier straight run. Detection happens at
//! confirmation time; recovery removes the invalidated subtree, resets
//! every confirmation that depended on it, and retraces the beam.

use std::collections::HashSet;

use bench_types::{BeamIndex, PlacementState, Pose};
use nalgebra::Vector3;
use tracing::debug;
use uuid::Uuid;

use crate::scene::SceneRegistry;
use crate::trace::{nearest_interaction, test_interface};
use crate::tree::BeamTree;
use crate::GEOM_EPS;

/// A confirmed placement retroactively interrupted an earlier segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// Tree node whose segment the new interface cuts short.
    pub victim_node: usize,
    /// Component whose confirmation raised the conflict. Its placement
    /// survives the rollback.
    pub trigger: Uuid,
}

/// Saved inline-placement state of every component, taken before a
/// solve so the whole pass can be undone as one transaction.
#[derive(Debug, Clone)]
pub struct PlacementSnapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    id: Uuid,
    state: PlacementState,
    pose: Option<Pose>,
    refs_seen: u32,
    consumed: f64,
    confirmed_under: Option<(Uuid, BeamIndex)>,
}

impl PlacementSnapshot {
    pub fn capture(scene: &SceneRegistry) -> Self {
        Self {
            entries: scene
                .components
                .iter()
                .map(|c| SnapshotEntry {
                    id: c.id,
                    state: c.state,
                    pose: c.pose,
                    refs_seen: c.refs_seen,
                    consumed: c.consumed,
                    confirmed_under: c.confirmed_under,
                })
                .collect(),
        }
    }

    pub fn restore(&self, scene: &mut SceneRegistry) {
        for entry in &self.entries {
            if let Some(comp) = scene.component_mut(entry.id) {
                comp.state = entry.state;
                comp.pose = entry.pose;
                comp.refs_seen = entry.refs_seen;
                comp.consumed = entry.consumed;
                comp.confirmed_under = entry.confirmed_under;
            }
        }
    }
}

/// Scan recorded segments for one the newly confirmed component's
/// interface interrupts. A segment that ends on an interface is cut
/// when the new hit lands strictly before its endpoint; a terminal
/// segment is cut by a hit anywhere ahead on its ray, since its drawn
/// length is a rendering default, not a search horizon. Returns the
/// earliest such segment.
pub fn find_conflict(
    scene: &SceneRegistry,
    tree: &BeamTree,
    trigger_idx: usize,
) -> Option<Conflict> {
    let comp = &scene.components[trigger_idx];
    let pose = comp.pose?;
    for (node_idx, node) in tree.nodes() {
        let seg = &node.segment;
        let origin = Vector3::from(seg.origin);
        let direction = Vector3::from(seg.direction);
        let Some((t, _, _)) = test_interface(comp, &pose, &origin, &direction) else {
            continue;
        };
        if seg.hit.is_none() || t < seg.length - GEOM_EPS {
            return Some(Conflict {
                victim_node: node_idx,
                trigger: comp.id,
            });
        }
    }
    None
}

/// Undo the consequences of an invalidated subtree: remove it from the
/// tree and unconfirm every placement that was confirmed under one of
/// the removed segments' indices. The trigger's own placement stands.
pub fn rollback(scene: &mut SceneRegistry, tree: &mut BeamTree, conflict: &Conflict) {
    let removed = tree.remove_subtree(conflict.victim_node);
    let dead_indices: HashSet<BeamIndex> = removed.iter().map(|s| s.index).collect();
    debug!(
        victim = conflict.victim_node,
        removed = removed.len(),
        "rolling back invalidated subtree"
    );
    for comp in &mut scene.components {
        if comp.id == conflict.trigger {
            continue;
        }
        let under = match comp.confirmed_under {
            Some((beam, index)) if beam == tree.source => index,
            _ => continue,
        };
        if dead_indices.contains(&under) {
            debug!(component = %comp.label, "unconfirming placement from removed subtree");
            comp.reset_runtime();
        }
    }
}

/// Check a previously solved tree against the current scene: every
/// recorded segment must still meet the same interface at the same
/// distance, and terminal segments must still meet nothing. Used to
/// decide whether edits elsewhere require a beam to be re-solved.
pub fn validate_tree(scene: &SceneRegistry, tree: &BeamTree) -> bool {
    for (_, node) in tree.nodes() {
        let seg = &node.segment;
        let origin = Vector3::from(seg.origin);
        let direction = Vector3::from(seg.direction);
        let hit = nearest_interaction(scene, &origin, &direction, seg.source);
        match (seg.hit, hit) {
            (None, None) => {}
            (Some(id), Some(h)) => {
                let same = scene.components[h.component].id == id
                    && (h.t - seg.length).abs() <= GEOM_EPS
                    && h.blocked == seg.blocked;
                if !same {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

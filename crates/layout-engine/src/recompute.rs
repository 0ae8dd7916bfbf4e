//! Full-document recompute: solve every beam, then settle cross-beam
//! dependencies until every recorded tree is consistent with the scene.

use std::collections::HashMap;

use bench_types::PlacementState;
use beam_solver::{solve_beam, validate_tree, BeamTree, SceneRegistry, SolveError, SolveWarning};
use tracing::{debug, warn};
use uuid::Uuid;

/// Revalidation sweeps allowed before giving up on a fixpoint. Mutually
/// dependent beams that still disagree after this many sweeps keep their
/// last solved trees.
pub const MAX_REVALIDATION_PASSES: u32 = 4;

/// Result of one recompute over the whole scene.
#[derive(Debug)]
pub struct RecomputeState {
    pub trees: HashMap<Uuid, BeamTree>,
    pub warnings: Vec<SolveWarning>,
}

/// Solve all beams in registration order, then re-solve any beam whose
/// tree a later placement invalidated. Inline placements confirmed by
/// one beam are interfaces for every other, so the sweep repeats until
/// no tree is stale.
pub fn recompute(scene: &mut SceneRegistry) -> Result<RecomputeState, SolveError> {
    scene.reset_placements();
    scene.refresh_relative();

    let beam_ids: Vec<Uuid> = scene.beams.iter().map(|b| b.id).collect();
    let mut trees: HashMap<Uuid, BeamTree> = HashMap::new();
    let mut beam_warnings: HashMap<Uuid, Vec<SolveWarning>> = HashMap::new();

    for &id in &beam_ids {
        let outcome = solve_beam(scene, id)?;
        trees.insert(id, outcome.tree);
        beam_warnings.insert(id, outcome.warnings);
        // Placements confirmed by this solve can resolve relative children.
        scene.refresh_relative();
    }

    let mut pass = 0;
    let mut unsettled: Vec<Uuid> = Vec::new();
    loop {
        let stale: Vec<Uuid> = beam_ids
            .iter()
            .copied()
            .filter(|id| !validate_tree(scene, &trees[id]))
            .collect();
        if stale.is_empty() {
            break;
        }
        pass += 1;
        if pass > MAX_REVALIDATION_PASSES {
            warn!(
                stale = stale.len(),
                "cross-beam revalidation did not settle, keeping last trees"
            );
            unsettled = stale;
            break;
        }
        debug!(pass, stale = stale.len(), "re-solving stale beams");
        for id in stale {
            scene.reset_beam_confirmations(id);
            let outcome = solve_beam(scene, id)?;
            trees.insert(id, outcome.tree);
            beam_warnings.insert(id, outcome.warnings);
            scene.refresh_relative();
        }
    }

    let mut warnings: Vec<SolveWarning> = beam_ids
        .iter()
        .filter_map(|id| beam_warnings.remove(id))
        .flatten()
        .collect();
    if !unsettled.is_empty() {
        warnings.push(SolveWarning::RevalidationExhausted { beams: unsettled });
    }
    for comp in &scene.components {
        if !comp.suppressed
            && comp.placement.is_inline()
            && comp.state != PlacementState::Confirmed
        {
            warnings.push(SolveWarning::UnresolvedPlacement {
                component: comp.id,
                label: comp.label.clone(),
            });
        }
    }
    Ok(RecomputeState { trees, warnings })
}

//! Integration tests for the layout engine: edits, recomputes, undo
//! history and document round-trips.

use bench_types::{
    AlongBeamConstraint, Aperture, BeamAttrs, BeamIndex, Behavior, InterfaceDescriptor, Placement,
};
use beam_solver::SolveWarning;
use layout_engine::body::MockBodyGenerator;
use layout_engine::document::{load_document, save_document};
use layout_engine::types::EngineError;
use layout_engine::LayoutEngine;
use std::f64::consts::{FRAC_PI_2, PI};
use uuid::Uuid;

fn mirror() -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Mirror,
    )
}

fn window() -> InterfaceDescriptor {
    InterfaceDescriptor::new(
        Aperture::Circular { diameter: 25.4 },
        FRAC_PI_2,
        Behavior::Transmissive,
    )
}

fn inline(beam: Uuid, distance: f64, pre_refs: u32) -> Placement {
    Placement::AlongBeam {
        beam,
        beam_index: BeamIndex::ROOT,
        constraint: AlongBeamConstraint::Distance { value: distance },
        angle: 0.0,
        pre_refs,
    }
}

#[test]
fn test_add_and_solve_produces_tree_and_bodies() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    let m = engine
        .add_component(
            "m1",
            mirror(),
            Placement::Fixed {
                position: [50.0, 0.0, 0.0],
                angle: 3.0 * PI / 4.0,
            },
            &mut gen,
        )
        .unwrap();
    let w = engine
        .add_component("wp", window(), inline(beam, 20.0, 1), &mut gen)
        .unwrap();

    assert!(engine.warnings.is_empty(), "{:?}", engine.warnings);
    let tree = engine.tree(beam).unwrap();
    assert_eq!(tree.len(), 3);

    let pose = engine.pose(w).unwrap();
    assert!((pose.position[0] - 50.0).abs() < 1e-6);
    assert!((pose.position[1] - 20.0).abs() < 1e-6);

    assert!(engine.bodies.contains_key(&m));
    assert!(engine.bodies.contains_key(&w));
}

#[test]
fn test_suppressed_component_is_inert() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    let m = engine
        .add_component(
            "retro",
            mirror(),
            Placement::Fixed {
                position: [50.0, 0.0, 0.0],
                angle: PI,
            },
            &mut gen,
        )
        .unwrap();
    assert_eq!(engine.tree(beam).unwrap().len(), 2);

    engine.set_suppressed(m, true, &mut gen).unwrap();
    assert_eq!(engine.tree(beam).unwrap().len(), 1);
    assert!(!engine.bodies.contains_key(&m));

    engine.set_suppressed(m, false, &mut gen).unwrap();
    assert_eq!(engine.tree(beam).unwrap().len(), 2);
    assert!(engine.bodies.contains_key(&m));
}

#[test]
fn test_undo_redo_component_add() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    engine
        .add_component(
            "retro",
            mirror(),
            Placement::Fixed {
                position: [50.0, 0.0, 0.0],
                angle: PI,
            },
            &mut gen,
        )
        .unwrap();
    assert_eq!(engine.tree(beam).unwrap().len(), 2);
    assert!(engine.can_undo());

    assert!(engine.undo(&mut gen).unwrap());
    assert_eq!(engine.tree(beam).unwrap().len(), 1);
    assert!(engine.scene.components.is_empty());
    assert!(engine.can_redo());

    assert!(engine.redo(&mut gen).unwrap());
    assert_eq!(engine.tree(beam).unwrap().len(), 2);
    assert_eq!(engine.scene.components.len(), 1);
}

#[test]
fn test_undo_edit_placement_restores_pose() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    let w = engine
        .add_component("wp", window(), inline(beam, 10.0, 0), &mut gen)
        .unwrap();
    assert!((engine.pose(w).unwrap().position[0] - 10.0).abs() < 1e-9);

    engine
        .edit_placement(w, inline(beam, 25.0, 0), &mut gen)
        .unwrap();
    assert!((engine.pose(w).unwrap().position[0] - 25.0).abs() < 1e-9);

    engine.undo(&mut gen).unwrap();
    assert!((engine.pose(w).unwrap().position[0] - 10.0).abs() < 1e-9);
}

#[test]
fn test_remove_parent_of_relative_placement_fails() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let parent = engine
        .add_component(
            "base",
            window(),
            Placement::Fixed {
                position: [5.0, 5.0, 0.0],
                angle: 0.0,
            },
            &mut gen,
        )
        .unwrap();
    let child = engine
        .add_component(
            "mount",
            window(),
            Placement::RelativeTo {
                parent,
                offset: [1.0, 0.0, 0.0],
                angle_offset: 0.0,
            },
            &mut gen,
        )
        .unwrap();

    assert!(matches!(
        engine.remove_component(parent, &mut gen),
        Err(EngineError::ComponentInUse { .. })
    ));
    engine.remove_component(child, &mut gen).unwrap();
    engine.remove_component(parent, &mut gen).unwrap();
    assert!(engine.scene.components.is_empty());
}

#[test]
fn test_placement_reference_validation() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let ghost = Uuid::new_v4();
    assert!(matches!(
        engine.add_component("wp", window(), inline(ghost, 10.0, 0), &mut gen),
        Err(EngineError::UnknownBeam { .. })
    ));
    assert!(matches!(
        engine.add_component(
            "mount",
            window(),
            Placement::RelativeTo {
                parent: ghost,
                offset: [0.0; 3],
                angle_offset: 0.0,
            },
            &mut gen,
        ),
        Err(EngineError::UnknownParent { .. })
    ));
}

#[test]
fn test_cross_beam_placement_revalidates_earlier_tree() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    // Registered first, so it is solved before the window exists.
    let crossing = engine
        .add_beam(
            "crossing",
            [-50.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            BeamAttrs::default(),
            &mut gen,
        )
        .unwrap();
    let owner = engine
        .add_beam("owner", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    let w = engine
        .add_component("wp", window(), inline(owner, 30.0, 0), &mut gen)
        .unwrap();

    // The window confirmed by the owner beam must show up in the
    // crossing beam's re-solved tree.
    let pose = engine.pose(w).unwrap();
    assert!((pose.position[0] - 30.0).abs() < 1e-9);
    let tree = engine.tree(crossing).unwrap();
    let segs: Vec<_> = tree.segments().collect();
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[0].hit, Some(w));
    assert!((segs[0].length - 80.0).abs() < 1e-9);
}

/// Facing mirrors bounce the beam past the recursion cap. The truncated
/// tree can never match a fresh intersection scan, so the revalidation
/// sweep runs out of passes and must say so in the warnings instead of
/// only logging.
#[test]
fn test_unsettled_revalidation_is_reported() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    engine
        .add_component(
            "m1",
            mirror(),
            Placement::Fixed {
                position: [10.0, 0.0, 0.0],
                angle: PI,
            },
            &mut gen,
        )
        .unwrap();
    engine
        .add_component(
            "m2",
            mirror(),
            Placement::Fixed {
                position: [-10.0, 0.0, 0.0],
                angle: 0.0,
            },
            &mut gen,
        )
        .unwrap();

    assert!(engine
        .warnings
        .iter()
        .any(|w| matches!(w, SolveWarning::DepthCutoff { .. })));
    assert!(engine
        .warnings
        .iter()
        .any(|w| matches!(w, SolveWarning::RevalidationExhausted { beams } if beams.contains(&beam))));
}

#[test]
fn test_unresolved_inline_placement_warns() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    // Requires three prior interactions that never happen.
    let w = engine
        .add_component("wp", window(), inline(beam, 10.0, 3), &mut gen)
        .unwrap();

    assert!(engine.pose(w).is_none());
    assert!(!engine.bodies.contains_key(&w));
    assert!(engine
        .warnings
        .iter()
        .any(|warning| matches!(warning, SolveWarning::UnresolvedPlacement { component, .. } if *component == w)));
}

#[test]
fn test_document_roundtrip_recomputes_same_poses() {
    let mut gen = MockBodyGenerator::new();
    let mut engine = LayoutEngine::new();
    let beam = engine
        .add_beam("src", [0.0; 3], [1.0, 0.0, 0.0], BeamAttrs::default(), &mut gen)
        .unwrap();
    engine
        .add_component(
            "m1",
            mirror(),
            Placement::Fixed {
                position: [50.0, 0.0, 0.0],
                angle: 3.0 * PI / 4.0,
            },
            &mut gen,
        )
        .unwrap();
    let w = engine
        .add_component("wp", window(), inline(beam, 20.0, 1), &mut gen)
        .unwrap();

    let json = save_document(&engine);
    let mut loaded = load_document(&json).unwrap();
    loaded.recompute(&mut gen).unwrap();

    assert_eq!(loaded.pose(w), engine.pose(w));
    let a: Vec<_> = engine.tree(beam).unwrap().segments().collect();
    let b: Vec<_> = loaded.tree(beam).unwrap().segments().collect();
    assert_eq!(a, b);
}

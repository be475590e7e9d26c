//! End-to-end solves against the in-memory scene.

use matchmove_core::scene::{CameraModel, InMemoryScene};
use matchmove_core::synthetic::single_point_rig;
use matchmove_core::{
    AttrRef, Frame, MarkerRef, NullProgress, Pt3, SceneEvaluator, SharedInterrupt, UndoJournal,
    Vec3,
};
use matchmove_solver::{
    solve, BackendKind, SolveError, SolveRequest, SolverOptions, StopReason,
};

fn frames(n: i32) -> Vec<Frame> {
    (1..=n).map(Frame).collect()
}

/// One static camera, one bundle at `truth`, marker samples pinned at the
/// truth over the frames; the bundle's x is then knocked away to `start_x`.
fn displaced_rig(
    truth: Pt3,
    start_x: f64,
    animated: bool,
    frame_list: &[Frame],
) -> (InMemoryScene, SolveRequest) {
    let mut scene = InMemoryScene::new();
    let rig = single_point_rig(&mut scene, truth, animated, frame_list);
    if animated {
        for &f in frame_list {
            scene.overwrite_attr(rig.bundle_attrs.tx, Some(f), start_x);
        }
    } else {
        scene.overwrite_attr(rig.bundle_attrs.tx, None, start_x);
    }

    let request = SolveRequest {
        cameras: vec![rig.camera],
        markers: vec![MarkerRef {
            marker: rig.marker,
            camera: rig.camera,
            bundle: rig.bundle,
        }],
        attributes: vec![AttrRef {
            attr: rig.bundle_attrs.tx,
            animated,
        }],
        frames: frame_list.to_vec(),
        options: SolverOptions::default(),
        ..Default::default()
    };
    (scene, request)
}

#[test]
fn static_unknown_converges_to_truth() {
    let frame_list = frames(3);
    let (mut scene, request) = displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    let tx = request.attributes[0].attr;

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap();

    assert!(outcome.success);
    assert!(
        matches!(
            outcome.report.stop_reason,
            StopReason::SmallError | StopReason::SmallStep
        ),
        "unexpected stop reason: {:?}",
        outcome.report.stop_reason
    );
    let fitted = scene.attr_value(tx, Frame(1)).unwrap();
    assert!(
        (fitted - 5.0).abs() < 1e-6,
        "expected bundle x near 5.0, got {fitted}"
    );
    assert!(outcome.report.final_error < outcome.report.initial_error);
    assert!(outcome.report.iterations > 0);
    assert!(outcome.report.function_evaluations > 0);
    assert!(outcome.report.jacobian_evaluations > 0);
}

#[test]
fn sparse_backend_solves_animated_unknowns_per_frame() {
    let frame_list = frames(10);
    let (mut scene, mut request) =
        displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, true, &frame_list);
    request.options.backend = BackendKind::Sparse;
    let tx = request.attributes[0].attr;

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap();

    assert!(outcome.success);
    for &f in &frame_list {
        let fitted = scene.attr_value(tx, f).unwrap();
        assert!(
            (fitted - 5.0).abs() < 1e-6,
            "frame {f}: expected 5.0, got {fitted}"
        );
    }
}

#[test]
fn dense_and_sparse_agree_on_the_same_problem() {
    let frame_list = frames(3);
    let truth = Pt3::new(5.0, 0.0, -10.0);

    let (mut dense_scene, request) = displaced_rig(truth, 1.0, false, &frame_list);
    let tx = request.attributes[0].attr;
    let mut journal = UndoJournal::new();
    solve(&mut dense_scene, &mut NullProgress, &mut journal, &request).unwrap();
    let dense_fit = dense_scene.attr_value(tx, Frame(1)).unwrap();

    let (mut sparse_scene, mut request) = displaced_rig(truth, 1.0, false, &frame_list);
    request.options.backend = BackendKind::Sparse;
    let mut journal = UndoJournal::new();
    solve(&mut sparse_scene, &mut NullProgress, &mut journal, &request).unwrap();
    let sparse_fit = sparse_scene.attr_value(tx, Frame(1)).unwrap();

    assert!(
        (dense_fit - sparse_fit).abs() < 1e-8,
        "dense {dense_fit} vs sparse {sparse_fit}"
    );
}

#[test]
fn underdetermined_problem_is_rejected_before_any_write() {
    let mut scene = InMemoryScene::new();
    let rig = single_point_rig(
        &mut scene,
        Pt3::new(1.0, 2.0, -8.0),
        false,
        &[Frame(1)],
    );
    let cam_attrs = scene.camera_attrs(rig.camera).unwrap();

    // Five unknowns against one valid observation (three error measurements).
    let request = SolveRequest {
        cameras: vec![rig.camera],
        markers: vec![MarkerRef {
            marker: rig.marker,
            camera: rig.camera,
            bundle: rig.bundle,
        }],
        attributes: vec![
            AttrRef::fixed(rig.bundle_attrs.tx),
            AttrRef::fixed(rig.bundle_attrs.ty),
            AttrRef::fixed(rig.bundle_attrs.tz),
            AttrRef::fixed(cam_attrs.tx),
            AttrRef::fixed(cam_attrs.ty),
        ],
        frames: vec![Frame(1)],
        options: SolverOptions::default(),
        ..Default::default()
    };

    let mut journal = UndoJournal::new();
    let err = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap_err();
    assert!(
        matches!(
            err,
            SolveError::Underdetermined {
                params: 5,
                residuals: 3
            }
        ),
        "unexpected error: {err}"
    );
    assert_eq!(scene.set_value_call_count(), 0);
    assert!(journal.is_empty());
}

#[test]
fn empty_problem_is_rejected_before_any_write() {
    let frame_list = frames(3);
    let (mut scene, mut request) =
        displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    request.attributes.clear();

    let mut journal = UndoJournal::new();
    let err = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap_err();
    assert!(matches!(err, SolveError::EmptyProblem { params: 0, .. }));
    assert_eq!(scene.set_value_call_count(), 0);
}

#[test]
fn iteration_cap_is_reported_as_the_stop_reason() {
    let frame_list = frames(3);
    let (mut scene, mut request) =
        displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    request.options.max_iterations = 1;
    request.options.eps1 = 1e-300;
    request.options.eps2 = 1e-300;
    request.options.eps3 = 1e-300;

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap();
    assert_eq!(outcome.report.stop_reason, StopReason::MaxIterations);
    assert_eq!(outcome.report.iterations, 1);
}

#[test]
fn pre_set_cancellation_stops_without_touching_the_scene() {
    let frame_list = frames(3);
    let (mut scene, request) = displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    let tx = request.attributes[0].attr;

    let mut progress = SharedInterrupt::new();
    progress.request_cancel();

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut progress, &mut journal, &request).unwrap();

    assert_eq!(outcome.report.stop_reason, StopReason::Canceled);
    assert_eq!(scene.set_value_call_count(), 0);
    assert!(journal.is_empty());
    // The unknown keeps its pre-solve value.
    assert_eq!(scene.attr_value(tx, Frame(1)).unwrap(), 0.0);
}

#[test]
fn journal_rewind_restores_the_pre_solve_scene() {
    let frame_list = frames(3);
    let (mut scene, request) = displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    let tx = request.attributes[0].attr;

    let mut journal = UndoJournal::new();
    solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap();
    assert!(!journal.is_empty());
    assert!(journal.commit_count() > 0);

    for entry in journal.rewind() {
        scene.overwrite_attr(entry.attr, entry.frame, entry.previous);
    }
    assert_eq!(scene.attr_value(tx, Frame(1)).unwrap(), 0.0);
}

#[test]
fn scene_query_failures_abort_the_solve() {
    let mut scene = InMemoryScene::new();
    // A camera with a zero focal length cannot produce a projection.
    let camera = scene.add_camera(
        "cam",
        Pt3::new(0.0, 0.0, 0.0),
        Vec3::zeros(),
        CameraModel {
            focal_length_mm: 0.0,
            ..CameraModel::default()
        },
    );
    let truth = Pt3::new(5.0, 0.0, -10.0);
    let bundle = scene.add_bundle("pt", truth, false);
    let marker = scene.add_marker(
        camera,
        bundle,
        matchmove_core::synthetic::marker_track(truth, &frames(3)),
    );
    let attrs = scene.bundle_attrs(bundle).unwrap();

    let request = SolveRequest {
        cameras: vec![camera],
        markers: vec![MarkerRef {
            marker,
            camera,
            bundle,
        }],
        attributes: vec![AttrRef::fixed(attrs.tx)],
        frames: frames(3),
        options: SolverOptions::default(),
        ..Default::default()
    };

    let mut journal = UndoJournal::new();
    let err = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap_err();
    assert!(matches!(err, SolveError::Scene(_)), "unexpected error: {err}");
}

#[test]
fn progress_is_reported_during_the_solve() {
    let frame_list = frames(3);
    let (mut scene, request) = displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);

    let mut progress = SharedInterrupt::new();
    let mut journal = UndoJournal::new();
    solve(&mut scene, &mut progress, &mut journal, &request).unwrap();
    assert!(progress.progress() > 0);
}

#[test]
fn central_differences_also_converge() {
    let frame_list = frames(3);
    let (mut scene, mut request) =
        displaced_rig(Pt3::new(5.0, 0.0, -10.0), 0.0, false, &frame_list);
    request.options.delta = -1e-6;
    let tx = request.attributes[0].attr;

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request).unwrap();
    assert!(outcome.success);
    let fitted = scene.attr_value(tx, Frame(1)).unwrap();
    assert!((fitted - 5.0).abs() < 1e-6, "got {fitted}");
}

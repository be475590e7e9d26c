//! Solve a one-unknown scene: a static bundle knocked off its tracked
//! position, fitted back by minimizing the reprojection deviation.

use matchmove::core::synthetic::single_point_rig;
use matchmove::prelude::*;

fn main() -> Result<(), matchmove::solver::SolveError> {
    env_logger::init();

    let frames: Vec<Frame> = (1..=3).map(Frame).collect();
    let truth = Pt3::new(5.0, 0.0, -10.0);

    let mut scene = InMemoryScene::new();
    let rig = single_point_rig(&mut scene, truth, false, &frames);
    // Start the bundle away from where the tracks say it should be.
    scene.overwrite_attr(rig.bundle_attrs.tx, None, 0.0);

    let request = SolveRequest {
        cameras: vec![rig.camera],
        markers: vec![MarkerRef {
            marker: rig.marker,
            camera: rig.camera,
            bundle: rig.bundle,
        }],
        attributes: vec![AttrRef::fixed(rig.bundle_attrs.tx)],
        frames,
        options: SolverOptions::default(),
        ..Default::default()
    };

    let mut journal = UndoJournal::new();
    let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request)?;

    let fitted = scene.attr_value(rig.bundle_attrs.tx, Frame(1))?;
    println!("fitted bundle x: {fitted:.9}");
    println!("stop reason:     {}", outcome.report.stop_reason);
    println!("final error:     {:.3e}", outcome.final_error);
    println!("iterations:      {}", outcome.report.iterations);
    Ok(())
}

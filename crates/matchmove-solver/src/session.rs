//! Top-level solve entry point.
//!
//! Builds the index maps, validates the configuration, seeds the parameter
//! vector from the scene, runs the selected backend, and surfaces the
//! termination report.

use nalgebra::DVector;

use matchmove_core::{
    AttrRef, CameraId, Frame, MarkerRef, ProgressSink, Real, SceneEvaluator, UndoJournal,
    WorldProjector,
};

use crate::backend::{backend_for, resolve_backend};
use crate::error::SolveError;
use crate::error_map::ErrorMap;
use crate::instrument::{Instrument, NoInstrument, SolvePhase};
use crate::options::SolverOptions;
use crate::param_map::ParameterMap;
use crate::report::{SolveOutcome, SolveReport, StopReason};
use crate::residual::{ResidualEvaluator, SolveInputs};

/// Everything one solve operates on.
///
/// The attribute, marker and frame lists fix the parameter and residual
/// ordering for the whole solve. Stiffness and smoothness attribute lists are
/// accepted for forward compatibility; their residual contribution is not
/// implemented yet and they are ignored with a warning.
#[derive(Debug, Clone, Default)]
pub struct SolveRequest {
    pub cameras: Vec<CameraId>,
    pub markers: Vec<MarkerRef>,
    pub attributes: Vec<AttrRef>,
    pub frames: Vec<Frame>,
    pub options: SolverOptions,
    pub stiffness_attrs: Vec<AttrRef>,
    pub smoothness_attrs: Vec<AttrRef>,
}

/// Run a solve without instrumentation.
pub fn solve<S, P>(
    scene: &mut S,
    progress: &mut P,
    journal: &mut UndoJournal,
    request: &SolveRequest,
) -> Result<SolveOutcome, SolveError>
where
    S: SceneEvaluator + WorldProjector,
    P: ProgressSink,
{
    solve_with_instrument(scene, progress, journal, request, &mut NoInstrument)
}

/// Run a solve, reporting phase timings to `instrument`.
///
/// The scene must not be mutated externally while this runs; the solver is
/// the single writer for the duration of the call.
pub fn solve_with_instrument<S, P, I>(
    scene: &mut S,
    progress: &mut P,
    journal: &mut UndoJournal,
    request: &SolveRequest,
    instrument: &mut I,
) -> Result<SolveOutcome, SolveError>
where
    S: SceneEvaluator + WorldProjector,
    P: ProgressSink,
    I: Instrument,
{
    if !request.stiffness_attrs.is_empty() || !request.smoothness_attrs.is_empty() {
        log::warn!(
            "stiffness/smoothness attributes are not supported yet and will be ignored \
             ({} stiffness, {} smoothness)",
            request.stiffness_attrs.len(),
            request.smoothness_attrs.len()
        );
    }

    // Index maps are built once and stay fixed for the whole solve. Both
    // validations below run before any scene mutation.
    let param_map = ParameterMap::build(&request.attributes, &request.frames);
    let error_map = ErrorMap::build(scene, &request.markers, &request.frames)?;
    let m = param_map.len();
    let n = error_map.residual_len();
    log::debug!("solve: {m} unknowns, {n} error measurements");

    if m == 0 || n == 0 {
        return Err(SolveError::EmptyProblem {
            params: m,
            residuals: n,
        });
    }
    if m > n {
        return Err(SolveError::Underdetermined {
            params: m,
            residuals: n,
        });
    }

    // Seed the parameter vector from the current scene state.
    let current = scene.current_frame();
    let mut initial = DVector::<Real>::zeros(m);
    for i in 0..m {
        let entry = param_map.entry(i);
        let attr = request.attributes[entry.attr].attr;
        let frame = param_map.resolve_frame(i, &request.frames, current);
        initial[i] = scene.attr_value(attr, frame)?;
    }

    let backend_kind = resolve_backend(request.options.backend);
    let backend = backend_for(backend_kind);
    log::info!(
        "solving with the {backend_kind:?} backend: max_iterations={}, tau={:e}, \
         eps1={:e}, eps2={:e}, eps3={:e}, delta={:e}",
        request.options.max_iterations,
        request.options.tau,
        request.options.eps1,
        request.options.eps2,
        request.options.eps3,
        request.options.delta,
    );

    progress.begin(request.options.max_iterations);
    instrument.phase_begin(SolvePhase::Solve);

    let inputs = SolveInputs {
        cameras: &request.cameras,
        markers: &request.markers,
        attributes: &request.attributes,
        frames: &request.frames,
    };
    let outcome = {
        let mut evaluator = ResidualEvaluator::new(
            scene, progress, journal, instrument, &param_map, &error_map, inputs,
        );
        backend
            .minimize(&mut evaluator, initial, &request.options)
            .and_then(|minimized| {
                // Push the fitted parameters back through the scene so the
                // caller reads the solved values. A pending cancellation
                // poisons this evaluation and leaves the scene at its
                // best-so-far state, which is exactly what we want.
                let mut fitted = DVector::<Real>::zeros(n);
                evaluator.evaluate(&minimized.params, &mut fitted)?;
                Ok((
                    minimized,
                    evaluator.mean_diagnostic_error(),
                    evaluator.evaluations(),
                    evaluator.jacobian_evaluations(),
                ))
            })
    };

    instrument.phase_end(SolvePhase::Solve);
    progress.end();
    let (minimized, mean_error, function_evaluations, jacobian_evaluations) = outcome?;

    let report = SolveReport {
        stop_reason: minimized.stop_reason,
        initial_error: minimized.initial_error,
        final_error: minimized.final_error,
        mean_error,
        gradient_norm: minimized.gradient_norm,
        step_norm: minimized.step_norm,
        iterations: minimized.iterations,
        function_evaluations,
        jacobian_evaluations,
        linear_solves: minimized.linear_solves,
    };
    log::info!(
        "solve finished in {} iterations ({} evaluations, {} for the jacobian): \
         initial error {:.6e}, final error {:.6e}, mean error {:.6e}",
        report.iterations,
        report.function_evaluations,
        report.jacobian_evaluations,
        report.initial_error,
        report.final_error,
        report.mean_error,
    );
    log::info!("termination: {}", report.stop_reason);

    Ok(SolveOutcome {
        success: report.stop_reason != StopReason::Unknown,
        final_error: report.final_error,
        report,
    })
}

//! Residual evaluation: push a trial parameter vector into the scene, pull
//! projected deviations back out.
//!
//! This is deliberately not a pure function: evaluating a candidate point
//! means mutating the live scene and re-projecting through it. Repeated calls
//! with the same vector and an otherwise untouched scene produce identical
//! residuals; every write is recorded in the undo journal so the caller can
//! restore the pre-solve state afterwards.

use nalgebra::DVector;

use matchmove_core::{
    project_point, AttrRef, CameraId, Frame, MarkerRef, ProgressSink, Real, SceneEvaluator,
    UndoJournal, WorldProjector,
};

use crate::backend::ResidualFn;
use crate::error::SolveError;
use crate::error_map::{ErrorMap, COMPONENTS_PER_OBSERVATION};
use crate::instrument::{Instrument, SolvePhase};
use crate::param_map::ParameterMap;

/// Scene references shared by every evaluation of one solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveInputs<'a> {
    pub cameras: &'a [CameraId],
    pub markers: &'a [MarkerRef],
    pub attributes: &'a [AttrRef],
    pub frames: &'a [Frame],
}

/// Turns trial parameter vectors into residual vectors against the live
/// scene. Holds exclusive access to the scene for the duration of the solve.
pub struct ResidualEvaluator<'a, S, P, I> {
    scene: &'a mut S,
    progress: &'a mut P,
    journal: &'a mut UndoJournal,
    instrument: &'a mut I,
    param_map: &'a ParameterMap,
    error_map: &'a ErrorMap,
    inputs: SolveInputs<'a>,
    /// Per-component magnitudes of the most recent evaluation, kept for
    /// post-solve reporting.
    diagnostics: Vec<Real>,
    evaluations: usize,
    jacobian_evaluations: usize,
    jacobian_pass: bool,
}

impl<'a, S, P, I> ResidualEvaluator<'a, S, P, I>
where
    S: SceneEvaluator + WorldProjector,
    P: ProgressSink,
    I: Instrument,
{
    pub fn new(
        scene: &'a mut S,
        progress: &'a mut P,
        journal: &'a mut UndoJournal,
        instrument: &'a mut I,
        param_map: &'a ParameterMap,
        error_map: &'a ErrorMap,
        inputs: SolveInputs<'a>,
    ) -> Self {
        let diagnostics = vec![0.0; error_map.residual_len()];
        Self {
            scene,
            progress,
            journal,
            instrument,
            param_map,
            error_map,
            inputs,
            diagnostics,
            evaluations: 0,
            jacobian_evaluations: 0,
            jacobian_pass: false,
        }
    }

    /// Number of plain residual evaluations performed.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Number of evaluations performed on behalf of Jacobian estimation.
    pub fn jacobian_evaluations(&self) -> usize {
        self.jacobian_evaluations
    }

    /// Per-component magnitudes of the last evaluation.
    pub fn diagnostics(&self) -> &[Real] {
        &self.diagnostics
    }

    /// Mean of the diagnostic magnitudes across all residual slots.
    pub fn mean_diagnostic_error(&self) -> Real {
        if self.diagnostics.is_empty() {
            return 0.0;
        }
        self.diagnostics.iter().sum::<Real>() / self.diagnostics.len() as Real
    }

    /// Mark subsequent evaluations as Jacobian perturbations (affects the
    /// evaluation counters and log labels only).
    pub fn set_jacobian_pass(&mut self, enabled: bool) {
        self.jacobian_pass = enabled;
    }

    /// Evaluate the residual vector for a trial parameter vector.
    ///
    /// Cancellation is polled first: when requested, `out` is filled with a
    /// not-a-number sentinel and the scene is left untouched, so the
    /// optimization loop observes the stop as a bad numeric result.
    pub fn evaluate(
        &mut self,
        p: &DVector<Real>,
        out: &mut DVector<Real>,
    ) -> Result<(), SolveError> {
        self.instrument.phase_begin(SolvePhase::Residual);
        let result = self.evaluate_inner(p, out);
        self.instrument.phase_end(SolvePhase::Residual);
        result
    }

    fn evaluate_inner(
        &mut self,
        p: &DVector<Real>,
        out: &mut DVector<Real>,
    ) -> Result<(), SolveError> {
        self.progress.set_progress(self.evaluations);
        if self.jacobian_pass {
            self.jacobian_evaluations += 1;
            log::debug!("evaluate jacobian {}", self.jacobian_evaluations);
        } else {
            self.evaluations += 1;
            log::debug!("evaluate {}", self.evaluations);
        }

        if self.progress.is_cancel_requested() {
            log::warn!("cancel requested, stopping the solve");
            out.fill(Real::NAN);
            return Ok(());
        }

        self.instrument.phase_begin(SolvePhase::ParamWrite);
        let pushed = self.push_parameters(p);
        self.instrument.phase_end(SolvePhase::ParamWrite);
        pushed?;

        self.instrument.phase_begin(SolvePhase::ErrorMeasure);
        let measured = self.measure_errors(out);
        self.instrument.phase_end(SolvePhase::ErrorMeasure);
        measured
    }

    /// Stage every parameter write, commit once, and drop cached camera
    /// transforms so nothing downstream projects through stale state.
    fn push_parameters(&mut self, p: &DVector<Real>) -> Result<(), SolveError> {
        let current = self.scene.current_frame();
        for i in 0..self.param_map.len() {
            let entry = self.param_map.entry(i);
            let attr = self.inputs.attributes[entry.attr].attr;
            let frame = self.param_map.resolve_frame(i, self.inputs.frames, current);
            self.scene.set_attr_value(attr, frame, p[i], self.journal)?;
        }
        self.scene.commit(self.journal)?;

        for &camera in self.inputs.cameras {
            self.scene.invalidate_projection_cache(camera);
        }
        Ok(())
    }

    fn measure_errors(&mut self, out: &mut DVector<Real>) -> Result<(), SolveError> {
        for (block, entry) in self.error_map.entries().iter().enumerate() {
            let marker = self.inputs.markers[entry.marker];
            let frame = self.inputs.frames[entry.frame];

            let world_to_screen = self.scene.world_projection(marker.camera, frame)?;
            let marker_pos = self.scene.marker_position(marker.marker, frame)?;
            let bundle_pos = self.scene.bundle_position(marker.bundle, frame)?;

            let mkr = project_point(&world_to_screen, &marker_pos);
            let bnd = project_point(&world_to_screen, &bundle_pos);

            // Fitting on x, y and the Euclidean distance together converges
            // noticeably faster than x and y alone on typical shots.
            // TODO: express the deviations in image pixels instead of
            // normalized film coordinates.
            let dx = (mkr.x - bnd.x).abs();
            let dy = (mkr.y - bnd.y).abs();
            let d = (mkr - bnd).norm();

            let base = block * COMPONENTS_PER_OBSERVATION;
            out[base] = dx;
            out[base + 1] = dy;
            out[base + 2] = d;

            // Diagnostic copy used for the post-solve mean; the distance slot
            // intentionally repeats dy to keep reported averages consistent
            // with earlier releases of the solver.
            self.diagnostics[base] = dx;
            self.diagnostics[base + 1] = dy;
            self.diagnostics[base + 2] = dy;
        }
        Ok(())
    }
}

impl<S, P, I> ResidualFn for ResidualEvaluator<'_, S, P, I>
where
    S: SceneEvaluator + WorldProjector,
    P: ProgressSink,
    I: Instrument,
{
    fn num_params(&self) -> usize {
        self.param_map.len()
    }

    fn num_residuals(&self) -> usize {
        self.error_map.residual_len()
    }

    fn evaluate(
        &mut self,
        p: &DVector<Real>,
        out: &mut DVector<Real>,
    ) -> Result<(), SolveError> {
        ResidualEvaluator::evaluate(self, p, out)
    }

    fn set_jacobian_pass(&mut self, enabled: bool) {
        ResidualEvaluator::set_jacobian_pass(self, enabled)
    }
}

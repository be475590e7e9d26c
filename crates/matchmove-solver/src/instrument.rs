//! Optional wall-clock instrumentation of solve phases.

use std::time::{Duration, Instant};

/// Phases a solve spends its time in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePhase {
    /// Whole optimization loop.
    Solve,
    /// One residual evaluation round-trip.
    Residual,
    /// Writing trial parameters into the scene.
    ParamWrite,
    /// Projecting observations and measuring deviations.
    ErrorMeasure,
    /// Jacobian estimation.
    Jacobian,
}

const PHASE_COUNT: usize = 5;

fn phase_index(phase: SolvePhase) -> usize {
    match phase {
        SolvePhase::Solve => 0,
        SolvePhase::Residual => 1,
        SolvePhase::ParamWrite => 2,
        SolvePhase::ErrorMeasure => 3,
        SolvePhase::Jacobian => 4,
    }
}

/// Hook notified when solve phases start and finish. No-op by default.
pub trait Instrument {
    fn phase_begin(&mut self, _phase: SolvePhase) {}
    fn phase_end(&mut self, _phase: SolvePhase) {}
}

/// Instrumentation that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInstrument;

impl Instrument for NoInstrument {}

/// Accumulates wall-clock time per phase.
#[derive(Debug, Default)]
pub struct PhaseTimers {
    started: [Option<Instant>; PHASE_COUNT],
    elapsed: [Duration; PHASE_COUNT],
    samples: [usize; PHASE_COUNT],
}

impl PhaseTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total time spent in a phase.
    pub fn elapsed(&self, phase: SolvePhase) -> Duration {
        self.elapsed[phase_index(phase)]
    }

    /// Number of completed begin/end spans for a phase.
    pub fn samples(&self, phase: SolvePhase) -> usize {
        self.samples[phase_index(phase)]
    }

    /// Log accumulated totals at debug level.
    pub fn log_totals(&self) {
        for (phase, label) in [
            (SolvePhase::Solve, "solve"),
            (SolvePhase::Residual, "residual"),
            (SolvePhase::ParamWrite, "param write"),
            (SolvePhase::ErrorMeasure, "error measure"),
            (SolvePhase::Jacobian, "jacobian"),
        ] {
            let i = phase_index(phase);
            if self.samples[i] > 0 {
                log::debug!(
                    "{label}: {:?} over {} spans",
                    self.elapsed[i],
                    self.samples[i]
                );
            }
        }
    }
}

impl Instrument for PhaseTimers {
    fn phase_begin(&mut self, phase: SolvePhase) {
        self.started[phase_index(phase)] = Some(Instant::now());
    }

    fn phase_end(&mut self, phase: SolvePhase) {
        let i = phase_index(phase);
        if let Some(start) = self.started[i].take() {
            self.elapsed[i] += start.elapsed();
            self.samples[i] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_accumulate_spans() {
        let mut timers = PhaseTimers::new();
        timers.phase_begin(SolvePhase::Residual);
        timers.phase_end(SolvePhase::Residual);
        timers.phase_begin(SolvePhase::Residual);
        timers.phase_end(SolvePhase::Residual);
        assert_eq!(timers.samples(SolvePhase::Residual), 2);
        assert_eq!(timers.samples(SolvePhase::Jacobian), 0);
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut timers = PhaseTimers::new();
        timers.phase_end(SolvePhase::Solve);
        assert_eq!(timers.samples(SolvePhase::Solve), 0);
    }
}

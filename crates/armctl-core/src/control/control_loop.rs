//! Fixed-rate control loop
//!
//! Runs a callback once per period on the current thread, sleeping out the
//! remainder of each period and recording timing statistics. The robot
//! framework normally calls the arm at 50 Hz; this loop stands in for it in
//! simulation and bench runs.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::arm::{ArmCommand, ArmStateMachine, TickOutcome};
use crate::telemetry::TelemetrySink;
use crate::{Error, Result};

/// Configuration for a control loop
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Target loop rate in Hz
    pub rate_hz: f64,
    /// Name used in log lines
    pub name: Arc<str>,
    /// Whether to warn when an iteration exceeds the period
    pub warn_on_overrun: bool,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            rate_hz: 50.0,
            name: "arm_loop".into(),
            warn_on_overrun: true,
        }
    }
}

impl ControlLoopConfig {
    /// Create a new config with the given rate
    pub fn new(rate_hz: f64) -> Self {
        Self {
            rate_hz,
            ..Default::default()
        }
    }

    /// Set the loop name
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Target period
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    /// Check the rate is usable
    pub fn validate(&self) -> Result<()> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(Error::Validation(format!(
                "rate_hz must be positive, got {}",
                self.rate_hz
            )));
        }
        Ok(())
    }
}

/// Timing statistics for a control loop
///
/// Execution time variance is tracked with Welford's online algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlLoopStats {
    /// Completed iterations
    pub iterations: u64,
    /// Iterations that took longer than the period
    pub overruns: u64,
    /// Iterations whose tick reported a fault
    pub faults: u64,
    /// Longest iteration
    pub max_iteration_time: Duration,
    /// Most recent iteration
    pub last_iteration_time: Duration,
    welford_mean: f64,
    welford_m2: f64,
}

impl ControlLoopStats {
    /// Record one iteration
    pub fn update(&mut self, execution_time: Duration, target_period: Duration) {
        self.iterations += 1;
        self.last_iteration_time = execution_time;
        self.max_iteration_time = self.max_iteration_time.max(execution_time);

        let secs = execution_time.as_secs_f64();
        let delta = secs - self.welford_mean;
        self.welford_mean += delta / self.iterations as f64;
        self.welford_m2 += delta * (secs - self.welford_mean);

        if execution_time > target_period {
            self.overruns += 1;
        }
    }

    /// Mean iteration time
    pub fn mean_iteration_time(&self) -> Duration {
        Duration::from_secs_f64(self.welford_mean.max(0.0))
    }

    /// Standard deviation of the iteration time in seconds
    ///
    /// Zero until two iterations have completed.
    pub fn jitter_std_dev(&self) -> f64 {
        if self.iterations < 2 {
            0.0
        } else {
            (self.welford_m2 / (self.iterations - 1) as f64).sqrt()
        }
    }

    /// Fraction of iterations that overran, `0.0..=1.0`
    pub fn overrun_ratio(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.overruns as f64 / self.iterations as f64
        }
    }
}

/// A fixed-rate control loop
///
/// # Example
/// ```ignore
/// use armctl_core::control::{ControlLoop, ControlLoopConfig};
/// use std::ops::ControlFlow;
///
/// let config = ControlLoopConfig::new(50.0).with_name("arm");
/// let stats = ControlLoop::run(config, |iteration, _dt| {
///     if iteration < 500 {
///         ControlFlow::Continue(())
///     } else {
///         ControlFlow::Break(())
///     }
/// })?;
/// ```
pub struct ControlLoop;

impl ControlLoop {
    /// Run on the current thread until the callback breaks
    ///
    /// The callback receives the iteration count and the seconds since the
    /// previous iteration started.
    pub fn run<F>(config: ControlLoopConfig, mut callback: F) -> Result<ControlLoopStats>
    where
        F: FnMut(u64, f64) -> ControlFlow<()>,
    {
        config.validate()?;
        let period = config.period();
        let mut stats = ControlLoopStats::default();
        let mut iteration = 0u64;
        let mut last_start = Instant::now();

        tracing::debug!(name = %config.name, rate_hz = config.rate_hz, "control loop started");
        loop {
            let start = Instant::now();
            let dt = start.duration_since(last_start).as_secs_f64();
            last_start = start;

            if callback(iteration, dt).is_break() {
                break;
            }

            let execution_time = start.elapsed();
            stats.update(execution_time, period);

            match period.checked_sub(execution_time) {
                Some(remaining) => thread::sleep(remaining),
                None if config.warn_on_overrun => {
                    tracing::warn!(
                        name = %config.name,
                        overrun = ?(execution_time - period),
                        "control loop overrun"
                    );
                }
                None => {}
            }
            iteration += 1;
        }
        tracing::debug!(
            name = %config.name,
            iterations = stats.iterations,
            overruns = stats.overruns,
            "control loop stopped"
        );
        Ok(stats)
    }

    /// Run for at most `duration` of wall time
    pub fn run_for<F>(
        config: ControlLoopConfig,
        duration: Duration,
        mut callback: F,
    ) -> Result<ControlLoopStats>
    where
        F: FnMut(u64, f64) -> ControlFlow<()>,
    {
        let start = Instant::now();
        Self::run(config, |iteration, dt| {
            if start.elapsed() >= duration {
                return ControlFlow::Break(());
            }
            callback(iteration, dt)
        })
    }

    /// Tick an arm every period and publish its state
    ///
    /// `input` supplies the operator command for each iteration; returning
    /// `None` ends the loop. Faults are counted and logged, never fatal,
    /// and the arm motor is stopped when the loop exits.
    pub fn drive_arm<F>(
        config: ControlLoopConfig,
        arm: &mut ArmStateMachine,
        sink: &mut dyn TelemetrySink,
        mut input: F,
    ) -> Result<ControlLoopStats>
    where
        F: FnMut(u64, f64) -> Option<ArmCommand>,
    {
        let mut faults = 0u64;
        let mut stats = Self::run(config, |iteration, dt| {
            let Some(command) = input(iteration, dt) else {
                return ControlFlow::Break(());
            };
            if let TickOutcome::Fault(fault) = arm.tick(command) {
                faults += 1;
                tracing::warn!(iteration, error = %fault, "arm tick faulted");
            }
            arm.publish(sink);
            ControlFlow::Continue(())
        })?;
        stats.faults = faults;

        if let TickOutcome::Fault(fault) = arm.disable() {
            tracing::error!(error = %fault, "failed to stop arm after loop");
        }
        Ok(stats)
    }
}

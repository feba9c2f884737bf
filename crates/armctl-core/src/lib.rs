//! armctl-core: closed-loop controller for a single-axis robot arm
//!
//! Drives an arm motor between two setpoints (extended and retracted) using
//! encoder feedback, a limit switch for zero calibration and position
//! dependent speed profiles.
//!
//! # Modules
//!
//! - [`config`] - Arm configuration and range validation
//! - [`control`] - Edge detection, position feedback, speed profiles, the arm
//!   state machine, rollers and the fixed-rate control loop
//! - [`hardware`] - Capability traits for motors, encoders and digital inputs
//! - [`sim`] - Simulation doubles and a simulated arm plant
//! - [`telemetry`] - Key/value telemetry sink
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ArmCommand   ┌─────────────────┐  set/stop  ┌──────────┐
//! │ control loop │──────────────►│ ArmStateMachine │───────────►│  motor   │
//! └──────────────┘   (per tick)  └─────────────────┘            └──────────┘
//!                                   ▲           ▲
//!                         PositionSource   EdgeDetector
//!                            (encoder)    (limit switch)
//! ```
//!
//! Everything inside a tick is non-blocking. Hardware failures during a tick
//! are reported as a [`control::TickOutcome`], never as an `Err`.

#![warn(unused_must_use)]

pub mod config;
pub mod control;
pub mod hardware;
pub mod sim;
pub mod telemetry;

// Re-exports for convenience
pub use config::{ArmConfig, RetractionLimit};
pub use control::{
    ArmCommand, ArmFault, ArmHardware, ArmPhase, ArmState, ArmStateMachine, ControlLoop,
    ControlLoopConfig, ControlLoopStats, Cutoff, Edge, EdgeDetector, ManualDirection,
    PositionSource, ProfileStep, RollerActuator, SpeedProfile, TickOutcome,
};
pub use hardware::{DigitalInput, Encoder, EncoderKind, MotorOutput, MotorSpec, MotorType};
pub use telemetry::{TelemetrySink, TelemetryTable, TelemetryValue};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for armctl-core
///
/// Construction-time problems (bad configuration, missing mandatory
/// hardware) are returned as `Err`. Failures inside a control tick are
/// converted into [`control::TickOutcome::Fault`] by the state machine.
///
/// # Example
/// ```ignore
/// match ArmStateMachine::new(config, hardware) {
///     Ok(arm) => { /* run it */ },
///     Err(Error::Validation(msg)) => eprintln!("bad arm config: {}", msg),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// Configuration value outside its contractual range.
    /// Handle by: fixing the configuration before bring-up.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A device is absent or failed to initialize.
    /// Handle by: falling back to manual-only control.
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// A single read or write on a hardware primitive failed.
    /// Handle by: stopping the actuator and trying again next period.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Operation attempted in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for armctl-core operations
pub type Result<T> = std::result::Result<T, Error>;

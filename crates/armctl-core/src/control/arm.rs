//! Arm position state machine
//!
//! Owns the arm motor, its position feedback and the retraction limit
//! switch. The control loop calls [`ArmStateMachine::tick`] once per period
//! with the operator's command; the machine observes the arm, decides the
//! phase and writes one motor command.
//!
//! Sign convention: extension runs toward negative angles and negative duty
//! cycles, retraction toward zero with positive duty cycles. The limit
//! switch sits at the retracted end and defines zero.
//!
//! ```text
//!            seek power            rising edge
//!   Idle ───────────────► Calibrating ─────────► Idle
//!    │  ▲
//!    │  └──── reached / fault / calibrate ◄──┐
//!    └─ toggle / extend / retract ──► Extending | Retracting
//! ```

use serde::{Deserialize, Serialize};

use super::edge::{Edge, EdgeDetector};
use super::position::{Cutoff, PositionSource};
use super::profile::{ProfileStep, SpeedProfile};
use crate::config::{ArmConfig, RetractionLimit};
use crate::hardware::{DigitalInput, Encoder, MotorOutput};
use crate::telemetry::TelemetrySink;
use crate::{Error, Result};

/// Absolute angle at or beyond which the arm counts as fully extended
pub const EXTEND_LIMIT_DEG: f64 = -120.0;

/// Readings at least this far from zero mean the arm left its calibration point
pub const DRIFT_TOLERANCE_DEG: f64 = 1.0;

const EXTEND_SIGN: f64 = -1.0;
const RETRACT_SIGN: f64 = 1.0;

/// What the arm is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPhase {
    /// No automatic move; manual commands or stopped
    #[default]
    Idle,
    /// Automatic move toward the extension setpoint
    Extending,
    /// Automatic move toward the retracted end
    Retracting,
    /// Start-up creep toward the limit switch
    Calibrating,
}

impl ArmPhase {
    /// Short lowercase name, used for telemetry
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extending => "extending",
            Self::Retracting => "retracting",
            Self::Calibrating => "calibrating",
        }
    }
}

impl std::fmt::Display for ArmPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manual jog direction from the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManualDirection {
    #[default]
    None,
    Extend,
    Retract,
}

impl ManualDirection {
    /// Map a D-pad (POV hat) reading: 90° extends, 270° retracts
    pub fn from_pov(pov: i32) -> Self {
        match pov {
            90 => Self::Extend,
            270 => Self::Retract,
            _ => Self::None,
        }
    }
}

/// Operator input for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmCommand {
    /// Toggle request (button state); only acted on when no move is running
    pub toggle: bool,
    /// Manual jog; overrides automatic moves
    pub manual: ManualDirection,
}

impl ArmCommand {
    /// No operator input
    pub const NONE: Self = Self {
        toggle: false,
        manual: ManualDirection::None,
    };

    /// Request a toggle between extended and retracted
    pub fn toggle() -> Self {
        Self {
            toggle: true,
            ..Self::NONE
        }
    }

    /// Manual jog in `direction`
    pub fn manual(direction: ManualDirection) -> Self {
        Self {
            manual: direction,
            ..Self::NONE
        }
    }

    /// Whether the operator asked for anything
    pub fn is_none(&self) -> bool {
        !self.toggle && self.manual == ManualDirection::None
    }
}

/// A fault raised inside a tick
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArmFault {
    /// Automatic move refused: no position feedback
    #[error("position feedback unavailable: {0}")]
    HardwareUnavailable(String),

    /// A motor, encoder or switch access failed
    #[error("hardware I/O failed: {0}")]
    Io(#[from] Error),

    /// An automatic move exceeded the configured timeout
    #[error("{phase} did not finish within {ticks} ticks")]
    Stalled { phase: ArmPhase, ticks: u32 },
}

/// Result of a tick
#[derive(Debug, Clone, PartialEq)]
#[must_use = "tick outcomes report faults that should be logged or shown"]
pub enum TickOutcome {
    Ok,
    Fault(ArmFault),
}

impl TickOutcome {
    /// Whether the tick completed without a fault
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The fault, if any
    pub fn fault(&self) -> Option<&ArmFault> {
        match self {
            Self::Ok => None,
            Self::Fault(fault) => Some(fault),
        }
    }
}

/// Observable state of the arm
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmState {
    /// Zero reference was set at the limit switch and the arm has not left it
    pub calibrated: bool,
    /// Arm is at or past the absolute extension limit
    pub is_extended: bool,
    /// Arm is at the retracted end
    pub is_retracted: bool,
    /// An automatic move toward a setpoint is running
    pub switching_in_progress: bool,
    /// Direction of the last automatic move (true = extend)
    pub commanded_extended: bool,
    /// Current phase
    pub phase: ArmPhase,
    /// Relative angle seen by the last observation, degrees
    pub angle_deg: f64,
}

/// Hardware handles the arm is built from
pub struct ArmHardware {
    /// Arm motor
    pub motor: Box<dyn MotorOutput>,
    /// Position encoder, if the motor has one
    pub encoder: Option<Box<dyn Encoder>>,
    /// Retraction limit switch
    pub limit_switch: Box<dyn DigitalInput>,
}

impl ArmHardware {
    /// Hardware without position feedback
    pub fn new(motor: Box<dyn MotorOutput>, limit_switch: Box<dyn DigitalInput>) -> Self {
        Self {
            motor,
            encoder: None,
            limit_switch,
        }
    }

    /// Attach a position encoder
    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }
}

/// Closed-loop arm controller
///
/// # Example
/// ```ignore
/// let mut arm = ArmStateMachine::new(ArmConfig::default(), hardware)?;
///
/// // Every 20 ms
/// let command = ArmCommand {
///     toggle: gamepad.a_pressed(),
///     manual: ManualDirection::from_pov(gamepad.pov()),
/// };
/// if let TickOutcome::Fault(fault) = arm.tick(command) {
///     dashboard.show_fault(&fault);
/// }
/// ```
pub struct ArmStateMachine {
    config: ArmConfig,
    profile: SpeedProfile,
    motor: Box<dyn MotorOutput>,
    position: PositionSource,
    limit_switch: EdgeDetector,
    state: ArmState,
    /// Start-up seek finished or abandoned
    initialized: bool,
    /// Ticks spent in the current automatic move
    move_ticks: u32,
}

impl ArmStateMachine {
    /// Validate the configuration and take ownership of the hardware
    pub fn new(config: ArmConfig, hardware: ArmHardware) -> Result<Self> {
        config.validate()?;

        let position = match hardware.encoder {
            Some(encoder) => PositionSource::new(encoder, config.gear_ratio)?,
            None => {
                tracing::warn!(
                    can_id = config.arm_motor.can_id,
                    integrated = config.arm_motor.motor_type.has_integrated_encoder(),
                    "arm encoder not available, manual control only"
                );
                PositionSource::unavailable(config.gear_ratio)?
            }
        };
        let limit_switch = EdgeDetector::new(
            hardware.limit_switch,
            config.limit_switch_dio,
            config.limit_switch_normally_open,
        )?;

        tracing::info!(
            can_id = config.arm_motor.can_id,
            motor_type = %config.arm_motor.motor_type,
            retraction_limit = %config.retraction_limit,
            "arm initialized"
        );

        Ok(Self {
            profile: SpeedProfile::from_config(&config),
            config,
            motor: hardware.motor,
            position,
            limit_switch,
            state: ArmState::default(),
            initialized: false,
            move_ticks: 0,
        })
    }

    /// Current state snapshot
    pub fn state(&self) -> ArmState {
        self.state
    }

    /// Current phase
    pub fn phase(&self) -> ArmPhase {
        self.state.phase
    }

    pub fn is_extended(&self) -> bool {
        self.state.is_extended
    }

    pub fn is_retracted(&self) -> bool {
        self.state.is_retracted
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.calibrated
    }

    /// Whether the start-up seek is over
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether automatic moves are possible
    pub fn has_feedback(&self) -> bool {
        self.position.has_feedback()
    }

    /// Relative angle from the last observation, degrees
    pub fn angle(&self) -> f64 {
        self.state.angle_deg
    }

    /// The configuration this arm runs with
    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    /// Run one control period
    pub fn tick(&mut self, command: ArmCommand) -> TickOutcome {
        let result = self.step(command);
        self.conclude(result)
    }

    /// Toggle between extended and retracted
    ///
    /// A request while a move is running is ignored and the move continues.
    /// `false` just continues whatever is in progress.
    pub fn toggle_arm(&mut self, request: bool) -> TickOutcome {
        self.tick(ArmCommand {
            toggle: request,
            ..ArmCommand::NONE
        })
    }

    /// Start (or continue) an automatic move to the extension setpoint
    pub fn extend(&mut self) -> TickOutcome {
        let result = self.command_move(true);
        self.conclude(result)
    }

    /// Start (or continue) an automatic move to the retracted end
    pub fn retract(&mut self) -> TickOutcome {
        let result = self.command_move(false);
        self.conclude(result)
    }

    /// Declare the current position as retracted zero and stop
    pub fn calibrate(&mut self) -> TickOutcome {
        let result = self.apply_calibration();
        if result.is_ok() {
            tracing::info!("arm calibrated");
        }
        self.conclude(result)
    }

    /// Refresh the position observations without commanding the motor
    ///
    /// [`tick`](Self::tick) already does this every period.
    pub fn check_position(&mut self) -> TickOutcome {
        match self.observe() {
            Ok(_) => TickOutcome::Ok,
            Err(fault) => {
                tracing::error!(error = %fault, "error checking arm position");
                TickOutcome::Fault(fault)
            }
        }
    }

    /// Stop unconditionally and drop any automatic move
    pub fn disable(&mut self) -> TickOutcome {
        tracing::info!(phase = %self.state.phase, "arm disabled");
        self.state.switching_in_progress = false;
        self.state.phase = ArmPhase::Idle;
        self.move_ticks = 0;
        match self.motor.stop() {
            Ok(()) => TickOutcome::Ok,
            Err(e) => {
                tracing::error!(error = %e, "failed to stop arm motor");
                TickOutcome::Fault(ArmFault::Io(e))
            }
        }
    }

    /// Push the current state to a telemetry sink
    pub fn publish(&self, sink: &mut dyn TelemetrySink) {
        sink.put_boolean("arm/extended", self.state.is_extended);
        sink.put_boolean("arm/retracted", self.state.is_retracted);
        sink.put_boolean("arm/calibrated", self.state.calibrated);
        sink.put_boolean("arm/switching", self.state.switching_in_progress);
        sink.put_number("arm/angle_deg", self.state.angle_deg);
        sink.put_string("arm/phase", self.state.phase.as_str());
    }

    fn step(&mut self, command: ArmCommand) -> std::result::Result<(), ArmFault> {
        let edge = self.observe()?;

        if command.manual != ManualDirection::None {
            self.initialized = true;
            if self.state.phase != ArmPhase::Idle {
                tracing::info!(phase = %self.state.phase, "manual override");
                self.state.phase = ArmPhase::Idle;
                self.state.switching_in_progress = false;
            }
            return self.drive_manual(command.manual);
        }

        if command.toggle {
            self.initialized = true;
            if self.state.switching_in_progress {
                tracing::trace!(phase = %self.state.phase, "toggle ignored, move in progress");
            } else {
                self.begin_move(!self.state.commanded_extended)?;
            }
        }

        self.run_phase(edge)
    }

    fn command_move(&mut self, extend: bool) -> std::result::Result<(), ArmFault> {
        let edge = self.observe()?;
        let running = self.state.switching_in_progress && self.state.commanded_extended == extend;
        if !running {
            self.initialized = true;
            self.begin_move(extend)?;
        }
        self.run_phase(edge)
    }

    /// Turn a tick result into an outcome, stopping the motor on failure
    fn conclude(&mut self, result: std::result::Result<(), ArmFault>) -> TickOutcome {
        match result {
            Ok(()) => TickOutcome::Ok,
            // Refused before anything moved; nothing to stop
            Err(fault @ ArmFault::HardwareUnavailable(_)) => TickOutcome::Fault(fault),
            Err(fault) => {
                tracing::error!(phase = %self.state.phase, error = %fault, "arm fault, stopping");
                if let Err(e) = self.motor.stop() {
                    tracing::error!(error = %e, "failed to stop arm motor");
                }
                self.state.switching_in_progress = false;
                self.state.phase = ArmPhase::Idle;
                self.move_ticks = 0;
                // A failed seek is not retried
                self.initialized = true;
                TickOutcome::Fault(fault)
            }
        }
    }

    /// Sample the switch and encoder once and update the observations
    fn observe(&mut self) -> std::result::Result<Option<Edge>, ArmFault> {
        let edge = self.limit_switch.poll();
        let angle = self.position.relative_angle_degrees(None)?;
        self.state.angle_deg = angle;

        self.state.is_extended = self.position.has_feedback()
            && !self.config.override_extend_limit
            && angle <= EXTEND_LIMIT_DEG;

        if self.limit_switch.last_state() && !self.state.calibrated {
            self.position.set_zero()?;
            self.state.angle_deg = 0.0;
            self.state.calibrated = true;
            self.state.is_retracted = true;
            self.initialized = true;
            tracing::info!(was = angle, "arm calibrated at retracted position");
        } else if angle.abs() >= DRIFT_TOLERANCE_DEG {
            self.state.is_retracted = false;
            self.state.calibrated = false;
        }
        Ok(edge)
    }

    fn begin_move(&mut self, extend: bool) -> std::result::Result<(), ArmFault> {
        let phase = if extend {
            ArmPhase::Extending
        } else {
            ArmPhase::Retracting
        };
        if !self.position.has_feedback() {
            tracing::error!(%phase, "cannot move arm automatically: encoder not available");
            if self.state.phase == ArmPhase::Calibrating {
                // The operator took over; the seek does not resume
                self.state.phase = ArmPhase::Idle;
                self.move_ticks = 0;
                if let Err(e) = self.motor.stop() {
                    tracing::error!(error = %e, "failed to stop arm motor");
                }
            }
            return Err(ArmFault::HardwareUnavailable(format!(
                "no arm encoder on CAN {}",
                self.config.arm_motor.can_id
            )));
        }
        self.state.commanded_extended = extend;
        self.state.switching_in_progress = true;
        self.state.phase = phase;
        self.move_ticks = 0;
        tracing::debug!(%phase, angle = self.state.angle_deg, "arm move started");
        Ok(())
    }

    fn run_phase(&mut self, edge: Option<Edge>) -> std::result::Result<(), ArmFault> {
        match self.state.phase {
            ArmPhase::Idle => {
                if !self.initialized && !self.state.calibrated {
                    tracing::debug!("seeking limit switch");
                    self.state.phase = ArmPhase::Calibrating;
                    self.move_ticks = 0;
                    return self.seek(edge);
                }
                self.motor.stop()?;
                Ok(())
            }
            ArmPhase::Calibrating => self.seek(edge),
            ArmPhase::Extending => self.extend_step(),
            ArmPhase::Retracting => self.retract_step(edge),
        }
    }

    fn seek(&mut self, edge: Option<Edge>) -> std::result::Result<(), ArmFault> {
        if edge == Some(Edge::Pressed) || self.limit_switch.is_pressed() {
            self.apply_calibration()?;
            tracing::info!("arm initialized and calibrated");
            return Ok(());
        }
        self.count_move_tick()?;
        self.drive(RETRACT_SIGN * self.config.seek_power)
    }

    fn extend_step(&mut self) -> std::result::Result<(), ArmFault> {
        // Travel from home as a positive number; overshoot past home reads 0
        let progress = Cutoff::Negative.apply(-self.state.angle_deg);
        match self.profile.extend(progress) {
            ProfileStep::Reached => {
                self.drive(0.0)?;
                self.state.switching_in_progress = false;
                self.state.phase = ArmPhase::Idle;
                tracing::info!(angle = self.state.angle_deg, "arm extended");
                Ok(())
            }
            ProfileStep::Drive(speed) => {
                self.count_move_tick()?;
                self.drive(EXTEND_SIGN * speed)
            }
        }
    }

    fn retract_step(&mut self, edge: Option<Edge>) -> std::result::Result<(), ArmFault> {
        let remaining = -Cutoff::Positive.apply(self.state.angle_deg);
        let done = match self.config.retraction_limit {
            // A switch already held when the move started also ends it
            RetractionLimit::Switch => edge == Some(Edge::Pressed) || self.limit_switch.is_pressed(),
            RetractionLimit::Encoder => remaining <= 0.0,
        };
        if done {
            self.apply_calibration()?;
            tracing::info!(limit = %self.config.retraction_limit, "arm retracted");
            return Ok(());
        }
        self.count_move_tick()?;
        self.drive(RETRACT_SIGN * self.profile.retract(remaining))
    }

    fn drive_manual(&mut self, direction: ManualDirection) -> std::result::Result<(), ArmFault> {
        let power = self.config.manual_power;
        match direction {
            ManualDirection::Extend if !self.state.is_extended => self.drive(EXTEND_SIGN * power),
            ManualDirection::Retract if !self.state.is_retracted => self.drive(RETRACT_SIGN * power),
            _ => {
                self.motor.stop()?;
                Ok(())
            }
        }
    }

    fn apply_calibration(&mut self) -> std::result::Result<(), ArmFault> {
        self.state.switching_in_progress = false;
        self.state.phase = ArmPhase::Idle;
        self.move_ticks = 0;
        self.motor.stop()?;
        self.position.set_zero()?;
        self.state.angle_deg = 0.0;
        self.state.calibrated = true;
        self.state.is_retracted = true;
        self.initialized = true;
        Ok(())
    }

    fn count_move_tick(&mut self) -> std::result::Result<(), ArmFault> {
        self.move_ticks = self.move_ticks.saturating_add(1);
        match self.config.move_timeout_ticks {
            Some(limit) if self.move_ticks > limit => Err(ArmFault::Stalled {
                phase: self.state.phase,
                ticks: self.move_ticks,
            }),
            _ => Ok(()),
        }
    }

    #[inline]
    fn drive(&mut self, speed: f64) -> std::result::Result<(), ArmFault> {
        self.motor.set(speed.clamp(-1.0, 1.0))?;
        Ok(())
    }
}

impl std::fmt::Debug for ArmStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmStateMachine")
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .field("position", &self.position)
            .field("limit_switch", &self.limit_switch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{MotorSpec, MotorType};
    use crate::sim::{MockEncoder, MockMotor, MockSwitch, PlantConfig, SimulatedArm};
    use crate::telemetry::TelemetryTable;
    use approx::assert_relative_eq;

    const GEAR: f64 = 64.0;

    struct Rig {
        motor: MockMotor,
        encoder: MockEncoder,
        switch: MockSwitch,
        arm: ArmStateMachine,
    }

    impl Rig {
        fn new(config: ArmConfig) -> Self {
            let motor = MockMotor::new("arm");
            let encoder = MockEncoder::settable();
            let switch = MockSwitch::new();
            let hardware = ArmHardware::new(Box::new(motor.clone()), Box::new(switch.clone()))
                .with_encoder(Box::new(encoder.clone()));
            let arm = ArmStateMachine::new(config, hardware).unwrap();
            Self {
                motor,
                encoder,
                switch,
                arm,
            }
        }

        fn without_encoder(config: ArmConfig) -> Self {
            let motor = MockMotor::new("arm");
            let switch = MockSwitch::new();
            let hardware = ArmHardware::new(Box::new(motor.clone()), Box::new(switch.clone()));
            let arm = ArmStateMachine::new(config, hardware).unwrap();
            Self {
                motor,
                encoder: MockEncoder::settable(),
                switch,
                arm,
            }
        }

        /// Arm calibrated at home with the switch released again
        fn calibrated(config: ArmConfig) -> Self {
            let mut rig = Self::new(config);
            assert!(rig.arm.calibrate().is_ok());
            rig
        }

        fn set_angle(&self, degrees: f64) {
            self.encoder.set_arm_degrees(degrees, GEAR);
        }
    }

    #[test]
    fn test_new_arm_is_idle_and_uncalibrated() {
        let rig = Rig::new(ArmConfig::default());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(!state.calibrated);
        assert!(!state.switching_in_progress);
        assert!(!rig.arm.is_initialized());
        assert!(rig.arm.has_feedback());
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let motor = MockMotor::new("arm");
        let hardware = ArmHardware::new(Box::new(motor), Box::new(MockSwitch::new()));
        let result = ArmStateMachine::new(ArmConfig::default().with_powers(1.5, 0.25), hardware);
        assert!(matches!(result, Err(Error::Validation(_))));

        let hardware = ArmHardware::new(Box::new(MockMotor::new("arm")), Box::new(MockSwitch::new()));
        let config = ArmConfig::new(MotorSpec::new(70, MotorType::SparkMaxBrushless));
        assert!(ArmStateMachine::new(config, hardware).is_err());
    }

    #[test]
    fn test_startup_seek_calibrates_on_switch() {
        let mut rig = Rig::new(ArmConfig::default());

        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Calibrating);
        assert_relative_eq!(rig.motor.last_speed(), 0.05);

        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Calibrating);

        rig.switch.set_level(true);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert_eq!(rig.motor.last_speed(), 0.0);
        assert!(rig.arm.is_initialized());

        // Seek does not restart once initialized
        rig.switch.set_level(false);
        rig.set_angle(-20.0);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_switch_press_calibrates_within_one_tick() {
        let mut rig = Rig::new(ArmConfig::default());
        rig.set_angle(3.5);
        rig.switch.set_level(true);

        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        let state = rig.arm.state();
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert_eq!(state.angle_deg, 0.0);
        assert_eq!(rig.encoder.rotations(), 0.0);
    }

    #[test]
    fn test_manual_command_preempts_seek() {
        let mut rig = Rig::new(ArmConfig::default());
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Extend))
            .is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_relative_eq!(rig.motor.last_speed(), -0.15);

        // Releasing the D-pad stops instead of seeking
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_extend_speed_profile_and_completion() {
        let mut rig = Rig::calibrated(ArmConfig::default());

        assert!(rig.arm.extend().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Extending);
        assert!(rig.arm.state().switching_in_progress);
        assert!(rig.arm.state().commanded_extended);
        assert_relative_eq!(rig.motor.last_speed(), -0.15);

        rig.set_angle(-20.0);
        assert!(rig.arm.extend().is_ok());
        assert_relative_eq!(rig.motor.last_speed(), -0.15);

        rig.set_angle(-40.0);
        assert!(rig.arm.extend().is_ok());
        assert_relative_eq!(rig.motor.last_speed(), -(1.0 - 40.0 / 45.0) * 0.25, epsilon = 1e-9);
        assert!(!rig.arm.is_calibrated());
        assert!(!rig.arm.is_retracted());

        rig.set_angle(-45.0);
        assert!(rig.arm.extend().is_ok());
        assert_eq!(rig.motor.last_speed(), 0.0);
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert!(!rig.arm.state().switching_in_progress);
    }

    #[test]
    fn test_extend_continues_on_plain_ticks() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());

        rig.set_angle(-40.0);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Extending);
        assert!(rig.motor.last_speed() < 0.0);

        rig.set_angle(-46.0);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
    }

    #[test]
    fn test_toggle_is_edge_triggered() {
        let mut rig = Rig::calibrated(ArmConfig::default());

        assert!(rig.arm.toggle_arm(true).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Extending);
        assert!(rig.arm.state().commanded_extended);

        // Held button does not flip the in-flight move
        rig.set_angle(-10.0);
        for _ in 0..5 {
            assert!(rig.arm.toggle_arm(true).is_ok());
            assert_eq!(rig.arm.phase(), ArmPhase::Extending);
            assert!(rig.arm.state().commanded_extended);
        }

        rig.set_angle(-45.0);
        assert!(rig.arm.toggle_arm(false).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);

        assert!(rig.arm.toggle_arm(true).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);
        assert!(!rig.arm.state().commanded_extended);
        assert!(rig.motor.last_speed() > 0.0);
    }

    #[test]
    fn test_retract_to_switch() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        rig.set_angle(-45.0);

        assert!(rig.arm.retract().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);
        assert_relative_eq!(rig.motor.last_speed(), 0.25);

        rig.set_angle(-30.0);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_relative_eq!(rig.motor.last_speed(), 30.0 / 45.0 * 0.25, epsilon = 1e-9);

        rig.set_angle(-10.0);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_relative_eq!(rig.motor.last_speed(), 0.15);

        // Encoder says home but the switch is still open: keep creeping in
        rig.set_angle(0.5);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);
        assert_relative_eq!(rig.motor.last_speed(), 0.15);

        rig.switch.set_level(true);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert!(!state.switching_in_progress);
        assert_eq!(rig.motor.last_speed(), 0.0);
        assert_eq!(rig.encoder.rotations(), 0.0);
    }

    #[test]
    fn test_retract_with_switch_already_held_ends_at_once() {
        let mut rig = Rig::new(ArmConfig::default());
        rig.switch.set_level(true);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert!(rig.arm.is_calibrated());
        let sets_before = rig.motor.set_calls();

        // The press edge was used by the tick above; the held level ends the move
        assert!(rig.arm.retract().is_ok());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert!(!state.switching_in_progress);
        assert_eq!(rig.motor.set_calls(), sets_before);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_press_during_failed_read_still_ends_retraction() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        rig.set_angle(-30.0);
        assert!(rig.arm.retract().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);

        // The switch closes on a tick whose encoder read fails
        rig.encoder.set_failing(true);
        rig.switch.set_level(true);
        let outcome = rig.arm.tick(ArmCommand::NONE);
        assert!(matches!(outcome, TickOutcome::Fault(ArmFault::Io(_))));
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);

        rig.encoder.set_failing(false);
        let sets_before = rig.motor.set_calls();
        assert!(rig.arm.retract().is_ok());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert_eq!(rig.motor.set_calls(), sets_before);
        assert_eq!(rig.encoder.rotations(), 0.0);
    }

    #[test]
    fn test_retract_to_encoder_zero() {
        let config = ArmConfig::default().with_retraction_limit(RetractionLimit::Encoder);
        let mut rig = Rig::calibrated(config);
        rig.set_angle(-30.0);

        assert!(rig.arm.retract().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);

        rig.set_angle(-0.5);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Retracting);

        rig.set_angle(0.25);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        let state = rig.arm.state();
        assert_eq!(state.phase, ArmPhase::Idle);
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_no_encoder_refuses_automatic_moves() {
        let mut rig = Rig::without_encoder(ArmConfig::default());
        assert!(!rig.arm.has_feedback());

        let outcome = rig.arm.extend();
        assert!(matches!(
            outcome.fault(),
            Some(ArmFault::HardwareUnavailable(_))
        ));
        assert_eq!(rig.motor.set_calls(), 0);
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert!(!rig.arm.state().switching_in_progress);

        let outcome = rig.arm.toggle_arm(true);
        assert!(matches!(
            outcome,
            TickOutcome::Fault(ArmFault::HardwareUnavailable(_))
        ));
        assert!(!rig.arm.state().commanded_extended);
        assert_eq!(rig.motor.set_calls(), 0);
    }

    #[test]
    fn test_refused_move_ends_seek() {
        let commands: [fn(&mut ArmStateMachine) -> TickOutcome; 3] = [
            |arm| arm.extend(),
            |arm| arm.retract(),
            |arm| arm.tick(ArmCommand::toggle()),
        ];
        for command in commands {
            let mut rig = Rig::without_encoder(ArmConfig::default());
            assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
            assert_eq!(rig.arm.phase(), ArmPhase::Calibrating);
            assert_relative_eq!(rig.motor.last_speed(), 0.05);

            let outcome = command(&mut rig.arm);
            assert!(matches!(
                outcome.fault(),
                Some(ArmFault::HardwareUnavailable(_))
            ));
            assert_eq!(rig.arm.phase(), ArmPhase::Idle);
            assert_eq!(rig.motor.last_speed(), 0.0);

            assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
            assert_eq!(rig.arm.phase(), ArmPhase::Idle);
            assert_eq!(rig.motor.last_speed(), 0.0);
        }
    }

    #[test]
    fn test_no_encoder_manual_still_works() {
        let mut rig = Rig::without_encoder(ArmConfig::default());
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Extend))
            .is_ok());
        assert_relative_eq!(rig.motor.last_speed(), -0.15);
        assert_eq!(rig.arm.angle(), 0.0);
    }

    #[test]
    fn test_motor_failure_stops_in_same_tick() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());
        rig.set_angle(-10.0);

        rig.motor.set_failing(true);
        let stops_before = rig.motor.stop_calls();
        let outcome = rig.arm.tick(ArmCommand::NONE);

        assert!(matches!(outcome, TickOutcome::Fault(ArmFault::Io(_))));
        assert_eq!(rig.motor.stop_calls(), stops_before + 1);
        assert!(!rig.arm.state().switching_in_progress);
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);

        // Next tick runs normally and does not resume the move
        rig.motor.set_failing(false);
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_encoder_failure_stops_motor() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());

        rig.encoder.set_failing(true);
        let stops_before = rig.motor.stop_calls();
        let outcome = rig.arm.tick(ArmCommand::NONE);
        assert!(matches!(outcome.fault(), Some(ArmFault::Io(Error::Hardware(_)))));
        assert_eq!(rig.motor.stop_calls(), stops_before + 1);
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
    }

    #[test]
    fn test_calibrate_is_idempotent() {
        let mut once = Rig::new(ArmConfig::default());
        once.set_angle(-12.0);
        assert!(once.arm.calibrate().is_ok());

        let mut twice = Rig::new(ArmConfig::default());
        twice.set_angle(-12.0);
        assert!(twice.arm.calibrate().is_ok());
        assert!(twice.arm.calibrate().is_ok());

        assert_eq!(once.arm.state(), twice.arm.state());
        let state = twice.arm.state();
        assert!(state.calibrated);
        assert!(state.is_retracted);
        assert_eq!(state.phase, ArmPhase::Idle);
        assert_eq!(twice.encoder.rotations(), 0.0);
    }

    #[test]
    fn test_calibrate_stops_move() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());
        rig.set_angle(-20.0);
        assert!(rig.arm.calibrate().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert!(!rig.arm.state().switching_in_progress);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_drift_clears_calibration() {
        let mut rig = Rig::calibrated(ArmConfig::default());

        rig.set_angle(0.6);
        assert!(rig.arm.check_position().is_ok());
        assert!(rig.arm.is_calibrated());

        rig.set_angle(-5.0);
        assert!(rig.arm.check_position().is_ok());
        assert!(!rig.arm.is_calibrated());
        assert!(!rig.arm.is_retracted());

        // Coming back near zero is not enough, the switch must confirm it
        rig.set_angle(0.2);
        assert!(rig.arm.check_position().is_ok());
        assert!(!rig.arm.is_calibrated());

        rig.switch.set_level(true);
        assert!(rig.arm.check_position().is_ok());
        assert!(rig.arm.is_calibrated());
    }

    #[test]
    fn test_check_position_never_drives() {
        let mut rig = Rig::new(ArmConfig::default());
        rig.set_angle(-130.0);
        rig.switch.set_level(true);
        assert!(rig.arm.check_position().is_ok());
        assert_eq!(rig.motor.set_calls(), 0);
        assert_eq!(rig.motor.stop_calls(), 0);
    }

    #[test]
    fn test_extension_limit_blocks_manual_extend() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        rig.set_angle(-120.0);
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Extend))
            .is_ok());
        assert!(rig.arm.is_extended());
        assert_eq!(rig.motor.last_speed(), 0.0);

        // Retracting away from the limit is still allowed
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Retract))
            .is_ok());
        assert_relative_eq!(rig.motor.last_speed(), 0.15);
    }

    #[test]
    fn test_override_disables_extension_limit() {
        let config = ArmConfig::default().with_override_extend_limit(true);
        let mut rig = Rig::calibrated(config);
        rig.set_angle(-130.0);
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Extend))
            .is_ok());
        assert!(!rig.arm.is_extended());
        assert_relative_eq!(rig.motor.last_speed(), -0.15);
    }

    #[test]
    fn test_manual_retract_blocked_when_retracted() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Retract))
            .is_ok());
        assert_eq!(rig.motor.last_speed(), 0.0);
        assert_eq!(rig.motor.set_calls(), 0);
    }

    #[test]
    fn test_manual_overrides_automatic_move() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());
        rig.set_angle(-20.0);

        assert!(rig
            .arm
            .tick(ArmCommand::manual(ManualDirection::Retract))
            .is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert!(!rig.arm.state().switching_in_progress);
        assert_relative_eq!(rig.motor.last_speed(), 0.15);
    }

    #[test]
    fn test_move_timeout_faults() {
        let config = ArmConfig::default().with_move_timeout(Some(3));
        let mut rig = Rig::calibrated(config);

        assert!(rig.arm.extend().is_ok());
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        let outcome = rig.arm.tick(ArmCommand::NONE);
        assert_eq!(
            outcome,
            TickOutcome::Fault(ArmFault::Stalled {
                phase: ArmPhase::Extending,
                ticks: 4,
            })
        );
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_stalled_seek_is_not_retried() {
        let config = ArmConfig::default().with_move_timeout(Some(2));
        let mut rig = Rig::new(config);

        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert!(!rig.arm.tick(ArmCommand::NONE).is_ok());
        assert!(rig.arm.tick(ArmCommand::NONE).is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_disable_stops_move() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        assert!(rig.arm.extend().is_ok());
        assert!(rig.arm.disable().is_ok());
        assert_eq!(rig.arm.phase(), ArmPhase::Idle);
        assert!(!rig.arm.state().switching_in_progress);
        assert_eq!(rig.motor.last_speed(), 0.0);
    }

    #[test]
    fn test_pov_mapping() {
        assert_eq!(ManualDirection::from_pov(90), ManualDirection::Extend);
        assert_eq!(ManualDirection::from_pov(270), ManualDirection::Retract);
        assert_eq!(ManualDirection::from_pov(-1), ManualDirection::None);
        assert_eq!(ManualDirection::from_pov(0), ManualDirection::None);
        assert_eq!(ManualDirection::from_pov(180), ManualDirection::None);
    }

    #[test]
    fn test_publish_telemetry() {
        let mut rig = Rig::calibrated(ArmConfig::default());
        rig.set_angle(-30.0);
        assert!(rig.arm.extend().is_ok());

        let mut table = TelemetryTable::new("arm");
        rig.arm.publish(&mut table);

        assert_relative_eq!(table.get_number("arm/angle_deg", 0.0), -30.0, epsilon = 1e-9);
        assert!(!table.get_boolean("arm/calibrated", true));
        assert!(!table.get_boolean("arm/extended", true));
        assert!(table.get_boolean("arm/switching", false));
        assert_eq!(table.get_string("arm/phase", ""), "extending");
    }

    #[test]
    fn test_full_cycle_against_simulated_arm() {
        let plant = SimulatedArm::new(PlantConfig::default());
        let hardware = ArmHardware::new(Box::new(plant.motor()), Box::new(plant.limit_switch()))
            .with_encoder(Box::new(plant.encoder()));
        let mut arm = ArmStateMachine::new(ArmConfig::default(), hardware).unwrap();
        let dt = 0.02;

        let run = |arm: &mut ArmStateMachine, command: ArmCommand, max_ticks: usize| {
            assert!(arm.tick(command).is_ok());
            plant.step(dt);
            for _ in 0..max_ticks {
                if arm.phase() == ArmPhase::Idle {
                    break;
                }
                assert!(arm.tick(ArmCommand::NONE).is_ok());
                plant.step(dt);
            }
        };

        // Start-up seek finds home
        run(&mut arm, ArmCommand::NONE, 500);
        assert!(arm.is_calibrated());
        assert!(arm.is_retracted());

        // Settle at the hard stop
        for _ in 0..50 {
            assert!(arm.tick(ArmCommand::NONE).is_ok());
            plant.step(dt);
        }

        run(&mut arm, ArmCommand::toggle(), 1000);
        assert_eq!(arm.phase(), ArmPhase::Idle);
        assert!(arm.state().commanded_extended);
        assert!(arm.angle() <= -45.0);
        assert!(arm.angle() > -55.0, "overshot to {}", arm.angle());

        run(&mut arm, ArmCommand::toggle(), 1000);
        assert_eq!(arm.phase(), ArmPhase::Idle);
        assert!(!arm.state().commanded_extended);
        assert!(arm.is_calibrated());
        assert!(plant.at_home());
    }
}

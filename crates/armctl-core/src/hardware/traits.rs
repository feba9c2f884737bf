//! Hardware capability traits
//!
//! Defines the primitives the arm controller talks to. Capabilities that
//! vary between devices (whether a motor controller carries an encoder,
//! whether an encoder accepts position writes) are explicit values decided
//! when the device is constructed.

use serde::{Deserialize, Serialize};

use super::channels;
use crate::{Error, Result};

/// Supported motor controller families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorType {
    TalonSrx,
    VictorSpx,
    SparkMax,
    SparkMaxBrushless,
    SparkMaxBrushed,
}

impl MotorType {
    /// Whether the controller exposes an integrated relative encoder
    pub fn has_integrated_encoder(&self) -> bool {
        matches!(
            self,
            Self::SparkMax | Self::SparkMaxBrushless | Self::SparkMaxBrushed
        )
    }
}

impl std::fmt::Display for MotorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TalonSrx => write!(f, "talon_srx"),
            Self::VictorSpx => write!(f, "victor_spx"),
            Self::SparkMax => write!(f, "spark_max"),
            Self::SparkMaxBrushless => write!(f, "spark_max_brushless"),
            Self::SparkMaxBrushed => write!(f, "spark_max_brushed"),
        }
    }
}

/// Identifies one motor controller on the CAN bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorSpec {
    /// CAN bus identifier (0-62)
    pub can_id: u8,
    /// Controller family
    pub motor_type: MotorType,
}

impl MotorSpec {
    /// Create a motor spec
    pub fn new(can_id: u8, motor_type: MotorType) -> Self {
        Self { can_id, motor_type }
    }

    /// Check the CAN identifier against the bus range
    pub fn validate(&self) -> Result<()> {
        if self.can_id > channels::CAN_ID_MAX {
            return Err(Error::Validation(format!(
                "CAN ID must be between 0 and {}, got {}",
                channels::CAN_ID_MAX,
                self.can_id
            )));
        }
        Ok(())
    }
}

/// Whether an encoder accepts absolute position writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderKind {
    /// Position can be overwritten on the device (motor-integrated encoders)
    Settable,
    /// Position can only be read; zeroing is done in software
    ReadOnly,
}

/// Motor output primitive
///
/// `set` expects a duty cycle in `[-1, 1]`. Callers clamp before writing.
/// Implementations must return immediately; they are called from inside a
/// control tick.
pub trait MotorOutput: Send {
    /// Command a duty cycle in `[-1, 1]`
    fn set(&mut self, speed: f64) -> Result<()>;

    /// Stop the motor (neutral output)
    fn stop(&mut self) -> Result<()> {
        self.set(0.0)
    }

    /// Human readable name for logs
    fn name(&self) -> &str;
}

/// Position feedback primitive
///
/// Positions are in motor rotations, before any gear ratio is applied.
pub trait Encoder: Send {
    /// Current position in motor rotations
    fn position(&mut self) -> Result<f64>;

    /// Overwrite the device position. Only meaningful for
    /// [`EncoderKind::Settable`] encoders.
    fn set_position(&mut self, _position: f64) -> Result<()> {
        Err(Error::InvalidState(
            "encoder does not support position writes".into(),
        ))
    }

    /// Write capability of this encoder
    fn kind(&self) -> EncoderKind;
}

/// Raw digital input primitive (already debounced by the device layer)
pub trait DigitalInput: Send {
    /// Raw electrical level
    fn get(&mut self) -> Result<bool>;
}

//! Arm configuration
//!
//! An [`ArmConfig`] is built once at bring-up, validated, and then handed to
//! the components that need it. Nothing mutates it afterwards.

use serde::{Deserialize, Serialize};

use crate::hardware::{channels, MotorSpec, MotorType};
use crate::{Error, Result};

/// How the end of a retraction is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetractionLimit {
    /// Stop on the limit switch rising edge and recalibrate there
    #[default]
    Switch,
    /// Stop when the encoder reads zero
    Encoder,
}

impl std::fmt::Display for RetractionLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Switch => write!(f, "switch"),
            Self::Encoder => write!(f, "encoder"),
        }
    }
}

/// Configuration for the arm subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    /// Arm motor controller
    pub arm_motor: MotorSpec,
    /// Roller motor controller, if the arm carries one
    pub roller_motor: Option<MotorSpec>,
    /// DIO port of the retraction limit switch (0-9)
    pub limit_switch_dio: u8,
    /// Whether the limit switch reads high when pressed
    pub limit_switch_normally_open: bool,
    /// Motor rotations per arm rotation
    pub gear_ratio: f64,
    /// Duty cycle for manual moves and the flat part of automatic moves
    pub manual_power: f64,
    /// Peak duty cycle of the proportional slow-down zone
    pub auto_power: f64,
    /// Roller duty cycle at full command
    pub roller_power: f64,
    /// Extension setpoint in degrees from the retracted position
    pub extension_angle: f64,
    /// How the end of a retraction is detected
    pub retraction_limit: RetractionLimit,
    /// Ignore the absolute extension limit
    pub override_extend_limit: bool,
    /// Duty cycle used while seeking the limit switch at start-up
    pub seek_power: f64,
    /// Abort an automatic move after this many ticks (None = never)
    pub move_timeout_ticks: Option<u32>,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            arm_motor: MotorSpec::new(5, MotorType::SparkMaxBrushless),
            roller_motor: Some(MotorSpec::new(7, MotorType::TalonSrx)),
            limit_switch_dio: 0,
            limit_switch_normally_open: true,
            gear_ratio: 64.0,
            manual_power: 0.15,
            auto_power: 0.25,
            roller_power: 0.3,
            extension_angle: 45.0,
            retraction_limit: RetractionLimit::Switch,
            override_extend_limit: false,
            seek_power: 0.05,
            move_timeout_ticks: None,
        }
    }
}

impl ArmConfig {
    /// Create a config for the given arm motor with default tuning
    pub fn new(arm_motor: MotorSpec) -> Self {
        Self {
            arm_motor,
            ..Default::default()
        }
    }

    /// Set the gear ratio
    pub fn with_gear_ratio(mut self, gear_ratio: f64) -> Self {
        self.gear_ratio = gear_ratio;
        self
    }

    /// Set manual and automatic power
    pub fn with_powers(mut self, manual_power: f64, auto_power: f64) -> Self {
        self.manual_power = manual_power;
        self.auto_power = auto_power;
        self
    }

    /// Set the roller motor and its power
    pub fn with_roller(mut self, roller_motor: Option<MotorSpec>, roller_power: f64) -> Self {
        self.roller_motor = roller_motor;
        self.roller_power = roller_power;
        self
    }

    /// Set the extension setpoint in degrees
    pub fn with_extension_angle(mut self, degrees: f64) -> Self {
        self.extension_angle = degrees;
        self
    }

    /// Set the retraction limit strategy
    pub fn with_retraction_limit(mut self, limit: RetractionLimit) -> Self {
        self.retraction_limit = limit;
        self
    }

    /// Set the limit switch port and polarity
    pub fn with_limit_switch(mut self, dio: u8, normally_open: bool) -> Self {
        self.limit_switch_dio = dio;
        self.limit_switch_normally_open = normally_open;
        self
    }

    /// Disable the absolute extension limit
    pub fn with_override_extend_limit(mut self, enable: bool) -> Self {
        self.override_extend_limit = enable;
        self
    }

    /// Set the start-up seek power
    pub fn with_seek_power(mut self, power: f64) -> Self {
        self.seek_power = power;
        self
    }

    /// Abort automatic moves that take longer than `ticks`
    pub fn with_move_timeout(mut self, ticks: Option<u32>) -> Self {
        self.move_timeout_ticks = ticks;
        self
    }

    /// Check every field against its allowed range
    ///
    /// Values are never clamped: an out-of-range value is a bring-up error.
    pub fn validate(&self) -> Result<()> {
        validate_power("manual_power", self.manual_power)?;
        validate_power("auto_power", self.auto_power)?;
        validate_power("roller_power", self.roller_power)?;
        validate_power("seek_power", self.seek_power)?;

        if !self.gear_ratio.is_finite() || self.gear_ratio <= 0.0 {
            return Err(Error::Validation(format!(
                "gear_ratio must be positive, got {}",
                self.gear_ratio
            )));
        }
        if !self.extension_angle.is_finite() || self.extension_angle <= 0.0 {
            return Err(Error::Validation(format!(
                "extension_angle must be positive, got {}",
                self.extension_angle
            )));
        }

        self.arm_motor.validate()?;
        if let Some(roller) = &self.roller_motor {
            roller.validate()?;
        }
        validate_dio(self.limit_switch_dio)?;

        if self.move_timeout_ticks == Some(0) {
            return Err(Error::Validation(
                "move_timeout_ticks must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Check a power fraction is within `[0, 1]`
pub fn validate_power(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Validation(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Check a DIO port is on the controller
pub fn validate_dio(dio: u8) -> Result<()> {
    if dio > channels::DIO_MAX {
        return Err(Error::Validation(format!(
            "DIO port must be between 0 and {}, got {}",
            channels::DIO_MAX,
            dio
        )));
    }
    Ok(())
}

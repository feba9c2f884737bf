//! Intake roller on the end of the arm

use crate::config::{validate_power, ArmConfig};
use crate::hardware::MotorOutput;
use crate::{Error, Result};

/// Directional roller output scaled by a fixed power
pub struct RollerActuator {
    motor: Option<Box<dyn MotorOutput>>,
    power: f64,
}

impl RollerActuator {
    /// Create a roller; `motor` is `None` when the arm has no roller
    pub fn new(motor: Option<Box<dyn MotorOutput>>, power: f64) -> Result<Self> {
        validate_power("roller_power", power)?;
        if motor.is_none() {
            tracing::info!("no roller motor configured");
        }
        Ok(Self { motor, power })
    }

    /// Create a roller with the configured power
    pub fn from_config(config: &ArmConfig, motor: Option<Box<dyn MotorOutput>>) -> Result<Self> {
        Self::new(motor, config.roller_power)
    }

    /// Whether a roller motor is attached
    pub fn is_available(&self) -> bool {
        self.motor.is_some()
    }

    /// Run the roller: 1.0 intake, -1.0 outtake, 0.0 stop
    ///
    /// Missing hardware is a warned no-op whatever the direction. Otherwise
    /// a direction outside `[-1, 1]` is rejected and a failed motor write is
    /// logged and returned.
    pub fn activate(&mut self, direction: f64) -> Result<()> {
        let Some(motor) = self.motor.as_mut() else {
            tracing::warn!("roller motor not configured");
            return Ok(());
        };
        if !(-1.0..=1.0).contains(&direction) {
            return Err(Error::Validation(format!(
                "direction must be between -1.0 and 1.0, got {}",
                direction
            )));
        }
        if let Err(e) = motor.set(direction * self.power) {
            tracing::error!(motor = motor.name(), error = %e, "failed to activate rollers");
            return Err(e);
        }
        Ok(())
    }

    /// Stop the roller
    pub fn stop(&mut self) -> Result<()> {
        match self.motor.as_mut() {
            Some(motor) => motor.stop(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RollerActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollerActuator")
            .field("available", &self.is_available())
            .field("power", &self.power)
            .finish()
    }
}

//! Simulated single-axis arm
//!
//! The arm's angular velocity lags the commanded duty cycle with a first
//! order response, so the arm coasts a little after the motor stops.
//! Positive duty retracts (towards 0°), negative duty extends (towards
//! negative angles). The limit switch closes at the home position and a
//! hard stop sits just past it.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::hardware::{DigitalInput, Encoder, EncoderKind, MotorOutput};
use crate::Result;

/// Physical parameters of the simulated arm
#[derive(Debug, Clone, Copy)]
pub struct PlantConfig {
    /// Motor rotations per arm rotation
    pub gear_ratio: f64,
    /// Arm angular rate at full duty, degrees per second
    pub max_rate_deg_s: f64,
    /// How fast velocity follows the command, 1/s; infinite means instantly
    pub response_rate: f64,
    /// Arm angle at power-on, degrees (0 = home)
    pub start_angle: f64,
    /// Hard stop past the home switch, degrees
    pub hard_stop: f64,
    /// Mechanical end of travel on the extension side, degrees
    pub max_extension: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            gear_ratio: 64.0,
            max_rate_deg_s: 360.0,
            response_rate: 4.0,
            start_angle: -10.0,
            hard_stop: 1.0,
            max_extension: -150.0,
        }
    }
}

#[derive(Debug)]
struct PlantState {
    angle: f64,
    /// Degrees per second
    velocity: f64,
    duty: f64,
    /// Arm angle at which the encoder was last written to zero
    encoder_zero: f64,
    sim_time: f64,
}

/// Shared simulated arm; hand out its motor, encoder and switch handles
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    config: PlantConfig,
    state: Arc<Mutex<PlantState>>,
}

impl SimulatedArm {
    /// Create a new plant
    pub fn new(config: PlantConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlantState {
                angle: config.start_angle,
                velocity: 0.0,
                duty: 0.0,
                // The encoder powers up reading zero wherever the arm is
                encoder_zero: config.start_angle,
                sim_time: 0.0,
            })),
            config,
        }
    }

    /// Advance the plant by `dt` seconds under the current duty cycle
    pub fn step(&self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let mut state = self.state.lock();
        let commanded = state.duty * self.config.max_rate_deg_s;
        let blend = (self.config.response_rate * dt).min(1.0);
        state.velocity += (commanded - state.velocity) * blend;

        let angle = state.angle + state.velocity * dt;
        state.angle = angle.clamp(self.config.max_extension, self.config.hard_stop);
        if state.angle != angle {
            // Hit a mechanical stop
            state.velocity = 0.0;
        }
        state.sim_time += dt;
    }

    /// True arm angle in degrees (0 = home)
    pub fn angle(&self) -> f64 {
        self.state.lock().angle
    }

    /// Angular velocity in degrees per second
    pub fn velocity(&self) -> f64 {
        self.state.lock().velocity
    }

    /// Duty cycle currently applied
    pub fn duty(&self) -> f64 {
        self.state.lock().duty
    }

    /// Seconds simulated so far
    pub fn sim_time(&self) -> f64 {
        self.state.lock().sim_time
    }

    /// Whether the home switch is closed
    pub fn at_home(&self) -> bool {
        self.state.lock().angle >= 0.0
    }

    /// Motor handle driving this plant
    pub fn motor(&self) -> PlantMotor {
        PlantMotor {
            state: self.state.clone(),
        }
    }

    /// Integrated encoder handle (settable)
    pub fn encoder(&self) -> PlantEncoder {
        PlantEncoder {
            gear_ratio: self.config.gear_ratio,
            state: self.state.clone(),
        }
    }

    /// Normally-open home switch handle
    pub fn limit_switch(&self) -> PlantSwitch {
        PlantSwitch {
            state: self.state.clone(),
        }
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new(PlantConfig::default())
    }
}

/// Motor output of a [`SimulatedArm`]
#[derive(Debug, Clone)]
pub struct PlantMotor {
    state: Arc<Mutex<PlantState>>,
}

impl MotorOutput for PlantMotor {
    fn set(&mut self, speed: f64) -> Result<()> {
        self.state.lock().duty = speed.clamp(-1.0, 1.0);
        Ok(())
    }

    fn name(&self) -> &str {
        "sim_arm"
    }
}

/// Encoder of a [`SimulatedArm`]
#[derive(Debug, Clone)]
pub struct PlantEncoder {
    gear_ratio: f64,
    state: Arc<Mutex<PlantState>>,
}

impl Encoder for PlantEncoder {
    fn position(&mut self) -> Result<f64> {
        let state = self.state.lock();
        Ok((state.angle - state.encoder_zero) / 360.0 * self.gear_ratio)
    }

    fn set_position(&mut self, position: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.encoder_zero = state.angle - position / self.gear_ratio * 360.0;
        Ok(())
    }

    fn kind(&self) -> EncoderKind {
        EncoderKind::Settable
    }
}

/// Home switch of a [`SimulatedArm`]
#[derive(Debug, Clone)]
pub struct PlantSwitch {
    state: Arc<Mutex<PlantState>>,
}

impl DigitalInput for PlantSwitch {
    fn get(&mut self) -> Result<bool> {
        Ok(self.state.lock().angle >= 0.0)
    }
}

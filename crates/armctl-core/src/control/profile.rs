//! Position dependent speed profiles
//!
//! Automatic moves run at the manual power until they enter a slow-down
//! zone, where the speed scales linearly with position. Extension only
//! brakes in its final third; retraction starts braking as soon as it is
//! more than a third of the travel away from home, because overshooting
//! the retracted end drives the arm into a hard stop.

use crate::config::ArmConfig;

/// Output of the extension profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileStep {
    /// Drive at this magnitude in `[0, 1]`
    Drive(f64),
    /// Setpoint reached, output zero
    Reached,
}

impl ProfileStep {
    /// Commanded magnitude; zero once reached
    pub fn speed(&self) -> f64 {
        match self {
            Self::Drive(speed) => *speed,
            Self::Reached => 0.0,
        }
    }
}

/// Speed shaping parameters for one arm
///
/// Holds no state; every call is a pure function of its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedProfile {
    /// Travel between retracted and extended, in degrees
    pub target: f64,
    /// Flat-zone speed
    pub manual_power: f64,
    /// Peak speed of the proportional zone
    pub auto_power: f64,
}

impl SpeedProfile {
    /// Create a profile
    pub fn new(target: f64, manual_power: f64, auto_power: f64) -> Self {
        Self {
            target,
            manual_power,
            auto_power,
        }
    }

    /// Profile for a validated arm configuration
    pub fn from_config(config: &ArmConfig) -> Self {
        Self::new(config.extension_angle, config.manual_power, config.auto_power)
    }

    #[inline]
    fn limit(&self, speed: f64) -> f64 {
        speed
            .clamp(0.0, self.manual_power.max(self.auto_power))
            .clamp(0.0, 1.0)
    }

    /// Extension speed after travelling `progress` degrees from home
    pub fn extend(&self, progress: f64) -> ProfileStep {
        if progress >= self.target {
            return ProfileStep::Reached;
        }
        // Past two thirds of the travel
        let speed = if 3.0 * progress > 2.0 * self.target {
            (1.0 - progress / self.target) * self.auto_power
        } else {
            self.manual_power
        };
        ProfileStep::Drive(self.limit(speed))
    }

    /// Retraction speed with `remaining` degrees left to home
    ///
    /// Never reports completion: the end of a retraction is decided by the
    /// limit switch or the encoder, not by the profile.
    pub fn retract(&self, remaining: f64) -> f64 {
        let speed = if 3.0 * remaining > self.target {
            (remaining / self.target).min(1.0) * self.auto_power
        } else {
            self.manual_power
        };
        self.limit(speed)
    }
}

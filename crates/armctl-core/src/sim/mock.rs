//! Test doubles for the hardware primitives
//!
//! Each double is a cheap handle over shared state: clone it, hand one copy
//! to the controller and keep the other to inspect commands or inject
//! failures.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::hardware::{DigitalInput, Encoder, EncoderKind, MotorOutput};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MotorLog {
    last_speed: f64,
    history: Vec<f64>,
    set_calls: usize,
    stop_calls: usize,
    failing: bool,
}

/// A motor output that records every command
#[derive(Debug, Clone)]
pub struct MockMotor {
    name: Arc<str>,
    log: Arc<Mutex<MotorLog>>,
}

impl MockMotor {
    /// Create a new mock motor
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(Mutex::new(MotorLog::default())),
        }
    }

    /// Make `set` fail; `stop` keeps working so safe-stop can be observed
    pub fn set_failing(&self, failing: bool) {
        self.log.lock().failing = failing;
    }

    /// Last duty cycle written by `set` or `stop`
    pub fn last_speed(&self) -> f64 {
        self.log.lock().last_speed
    }

    /// Every successful `set` value, in order
    pub fn history(&self) -> Vec<f64> {
        self.log.lock().history.clone()
    }

    /// Number of `set` calls, including failed ones
    pub fn set_calls(&self) -> usize {
        self.log.lock().set_calls
    }

    /// Number of `stop` calls
    pub fn stop_calls(&self) -> usize {
        self.log.lock().stop_calls
    }

    /// Forget recorded commands
    pub fn clear(&self) {
        let mut log = self.log.lock();
        log.history.clear();
        log.set_calls = 0;
        log.stop_calls = 0;
    }
}

impl MotorOutput for MockMotor {
    fn set(&mut self, speed: f64) -> Result<()> {
        let mut log = self.log.lock();
        log.set_calls += 1;
        if log.failing {
            return Err(Error::Hardware(format!("{}: CAN write timed out", self.name)));
        }
        log.last_speed = speed;
        log.history.push(speed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.stop_calls += 1;
        log.last_speed = 0.0;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Default)]
struct EncoderInner {
    rotations: f64,
    failing: bool,
}

/// An encoder whose position is set by the test
#[derive(Debug, Clone)]
pub struct MockEncoder {
    kind: EncoderKind,
    inner: Arc<Mutex<EncoderInner>>,
}

impl MockEncoder {
    /// Encoder that accepts position writes
    pub fn settable() -> Self {
        Self::with_kind(EncoderKind::Settable)
    }

    /// Encoder that can only be read
    pub fn read_only() -> Self {
        Self::with_kind(EncoderKind::ReadOnly)
    }

    fn with_kind(kind: EncoderKind) -> Self {
        Self {
            kind,
            inner: Arc::new(Mutex::new(EncoderInner::default())),
        }
    }

    /// Set the raw position in motor rotations
    pub fn set_rotations(&self, rotations: f64) {
        self.inner.lock().rotations = rotations;
    }

    /// Set the raw position from an arm angle through `gear_ratio`
    pub fn set_arm_degrees(&self, degrees: f64, gear_ratio: f64) {
        self.set_rotations(degrees / 360.0 * gear_ratio);
    }

    /// Raw position in motor rotations
    pub fn rotations(&self) -> f64 {
        self.inner.lock().rotations
    }

    /// Make every read and write fail
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }
}

impl Encoder for MockEncoder {
    fn position(&mut self) -> Result<f64> {
        let inner = self.inner.lock();
        if inner.failing {
            return Err(Error::Hardware("encoder read failed".into()));
        }
        Ok(inner.rotations)
    }

    fn set_position(&mut self, position: f64) -> Result<()> {
        if self.kind == EncoderKind::ReadOnly {
            return Err(Error::InvalidState(
                "encoder does not support position writes".into(),
            ));
        }
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(Error::Hardware("encoder write failed".into()));
        }
        inner.rotations = position;
        Ok(())
    }

    fn kind(&self) -> EncoderKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct SwitchInner {
    level: bool,
    failing: bool,
}

/// A digital input whose level is set by the test
#[derive(Debug, Clone, Default)]
pub struct MockSwitch {
    inner: Arc<Mutex<SwitchInner>>,
}

impl MockSwitch {
    /// Create a switch reading low
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw electrical level
    pub fn set_level(&self, level: bool) {
        self.inner.lock().level = level;
    }

    /// Make reads fail
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }
}

impl DigitalInput for MockSwitch {
    fn get(&mut self) -> Result<bool> {
        let inner = self.inner.lock();
        if inner.failing {
            return Err(Error::Hardware("DIO read failed".into()));
        }
        Ok(inner.level)
    }
}

//! Encoder position feedback in arm degrees
//!
//! Converts motor rotations into the arm's relative angle through the gear
//! ratio, and degrades to a constant zero reading when no encoder exists.

use crate::hardware::{Encoder, EncoderKind};
use crate::{Error, Result};

/// Directional clamp applied to a signed angle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Positive readings become zero
    Positive,
    /// Negative readings become zero
    Negative,
}

impl Cutoff {
    /// Clamp `angle` to zero when it has the excluded sign
    #[inline]
    pub fn apply(self, angle: f64) -> f64 {
        match self {
            Self::Positive => angle.min(0.0),
            Self::Negative => angle.max(0.0),
        }
    }
}

/// Relative arm angle source
///
/// Zero is wherever the last [`set_zero`](Self::set_zero) happened.
/// Readings are continuous and never wrapped.
pub struct PositionSource {
    encoder: Option<Box<dyn Encoder>>,
    gear_ratio: f64,
    /// Software zero in motor rotations, used for read-only encoders
    zero_offset: f64,
}

impl PositionSource {
    /// Create a source over an encoder and zero it at the current position
    ///
    /// If the encoder cannot be zeroed the source degrades to
    /// [`unavailable`](Self::unavailable) rather than failing bring-up.
    pub fn new(encoder: Box<dyn Encoder>, gear_ratio: f64) -> Result<Self> {
        let mut source = Self::unavailable(gear_ratio)?;
        source.encoder = Some(encoder);
        if let Err(e) = source.set_zero() {
            tracing::warn!(error = %e, "arm encoder not available");
            source.encoder = None;
        } else {
            tracing::info!(gear_ratio, "arm encoder initialized");
        }
        Ok(source)
    }

    /// Create a source with no feedback; every reading is `0.0`
    pub fn unavailable(gear_ratio: f64) -> Result<Self> {
        if !gear_ratio.is_finite() || gear_ratio <= 0.0 {
            return Err(Error::Validation(format!(
                "gear_ratio must be positive, got {}",
                gear_ratio
            )));
        }
        Ok(Self {
            encoder: None,
            gear_ratio,
            zero_offset: 0.0,
        })
    }

    /// Whether a real encoder backs this source
    pub fn has_feedback(&self) -> bool {
        self.encoder.is_some()
    }

    /// Gear ratio used for conversion
    pub fn gear_ratio(&self) -> f64 {
        self.gear_ratio
    }

    /// Motor rotations since the last zero
    pub fn relative_rotations(&mut self) -> Result<f64> {
        match self.encoder.as_mut() {
            Some(encoder) => Ok(encoder.position()? - self.zero_offset),
            None => Ok(0.0),
        }
    }

    /// Arm angle in degrees since the last zero, optionally clamped
    pub fn relative_angle_degrees(&mut self, cutoff: Option<Cutoff>) -> Result<f64> {
        let angle = self.relative_rotations()? / self.gear_ratio * 360.0;
        Ok(match cutoff {
            Some(cutoff) => cutoff.apply(angle),
            None => angle,
        })
    }

    /// Make the current position the new zero
    ///
    /// Settable encoders are written directly; read-only encoders keep a
    /// software offset. Without an encoder this is a no-op.
    pub fn set_zero(&mut self) -> Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        match encoder.kind() {
            EncoderKind::Settable => {
                encoder.set_position(0.0)?;
                self.zero_offset = 0.0;
            }
            EncoderKind::ReadOnly => {
                self.zero_offset = encoder.position()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSource")
            .field("has_feedback", &self.has_feedback())
            .field("gear_ratio", &self.gear_ratio)
            .field("zero_offset", &self.zero_offset)
            .finish()
    }
}

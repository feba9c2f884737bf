//! Hardware abstraction for the arm
//!
//! The arm only needs three primitives: a motor output, an (optional)
//! position encoder and a digital input for the limit switch. Each is a
//! small trait so the same controller runs on real hardware, on the
//! simulated plant in [`crate::sim`], or against test doubles.

mod traits;

pub use traits::{DigitalInput, Encoder, EncoderKind, MotorOutput, MotorSpec, MotorType};

/// Channel ranges accepted by the robot controller
pub mod channels {
    /// Highest valid CAN bus identifier
    pub const CAN_ID_MAX: u8 = 62;
    /// Highest valid on-board DIO port
    pub const DIO_MAX: u8 = 9;
}

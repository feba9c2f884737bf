//! Control systems for the arm
//!
//! Provides the limit switch edge detector, encoder position source, speed
//! profiles, the arm state machine, the roller actuator and a fixed-rate
//! control loop to drive them.

mod arm;
mod control_loop;
mod edge;
mod position;
mod profile;
mod roller;

pub use arm::{
    ArmCommand, ArmFault, ArmHardware, ArmPhase, ArmState, ArmStateMachine, ManualDirection,
    TickOutcome,
};
pub use control_loop::{ControlLoop, ControlLoopConfig, ControlLoopStats};
pub use edge::{Edge, EdgeDetector};
pub use position::{Cutoff, PositionSource};
pub use profile::{ProfileStep, SpeedProfile};
pub use roller::RollerActuator;

//! Simulation support
//!
//! The same controller code runs on the robot or in simulation by swapping
//! the hardware handles it is built with.
//!
//! - [`MockMotor`], [`MockEncoder`], [`MockSwitch`]: scripted doubles for
//!   unit tests, with failure injection
//! - [`SimulatedArm`]: a closed-loop plant whose motor moves its own
//!   encoder and home switch
//!
//! # Example
//!
//! ```ignore
//! use armctl_core::sim::SimulatedArm;
//!
//! let plant = SimulatedArm::default();
//! let hardware = ArmHardware::new(Box::new(plant.motor()), Box::new(plant.limit_switch()))
//!     .with_encoder(Box::new(plant.encoder()));
//! ```

mod mock;
mod plant;

pub use mock::{MockEncoder, MockMotor, MockSwitch};
pub use plant::{PlantConfig, PlantEncoder, PlantMotor, PlantSwitch, SimulatedArm};

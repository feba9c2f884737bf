//! Runs the arm controller against a simulated arm.
//!
//! The script powers up with the arm slightly out, lets the start-up seek
//! find the limit switch, toggles the arm out, runs the intake roller while
//! it is out, then toggles it back in.

use anyhow::Context;
use armctl_core::sim::{MockMotor, PlantConfig, SimulatedArm};
use armctl_core::{
    ArmCommand, ArmConfig, ArmHardware, ArmStateMachine, ControlLoop, ControlLoopConfig,
    RetractionLimit, RollerActuator, TelemetryTable,
};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Limit {
    /// Stop retracting on the limit switch
    Switch,
    /// Stop retracting when the encoder reads zero
    Encoder,
}

impl From<Limit> for RetractionLimit {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Switch => RetractionLimit::Switch,
            Limit::Encoder => RetractionLimit::Encoder,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Control loop rate
    #[arg(long, default_value_t = 50.0)]
    rate_hz: f64,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 8.0)]
    seconds: f64,

    /// How a retraction decides it is home
    #[arg(long, value_enum, default_value_t = Limit::Switch)]
    retraction_limit: Limit,

    /// Extension setpoint in degrees from home
    #[arg(long, default_value_t = 45.0)]
    extension_angle: f64,

    /// Second at which the toggle button is pressed to extend
    #[arg(long, default_value_t = 2.0)]
    extend_at: f64,

    /// Second at which the toggle button is pressed to retract
    #[arg(long, default_value_t = 5.0)]
    retract_at: f64,

    /// Leave the encoder disconnected
    #[arg(long)]
    no_encoder: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ArmConfig::default()
        .with_extension_angle(args.extension_angle)
        .with_retraction_limit(args.retraction_limit.into());
    config.validate().context("invalid arm configuration")?;

    let plant = SimulatedArm::new(PlantConfig {
        gear_ratio: config.gear_ratio,
        ..PlantConfig::default()
    });
    let mut hardware = ArmHardware::new(Box::new(plant.motor()), Box::new(plant.limit_switch()));
    if !args.no_encoder {
        hardware = hardware.with_encoder(Box::new(plant.encoder()));
    }
    let mut arm = ArmStateMachine::new(config.clone(), hardware).context("failed to build arm")?;

    let roller_motor = MockMotor::new("roller");
    let mut roller = RollerActuator::from_config(&config, Some(Box::new(roller_motor.clone())))
        .context("failed to build roller")?;

    let mut table = TelemetryTable::new("arm");
    let reader = table.clone();

    let loop_config = ControlLoopConfig::new(args.rate_hz).with_name("arm_sim");
    loop_config.validate()?;
    let dt = loop_config.period().as_secs_f64();
    let total_ticks = (args.seconds * args.rate_hz).ceil() as u64;
    let ticks_per_second = args.rate_hz.round().max(1.0) as u64;
    let extend_tick = (args.extend_at * args.rate_hz) as u64;
    let retract_tick = (args.retract_at * args.rate_hz) as u64;

    let stats = ControlLoop::drive_arm(loop_config, &mut arm, &mut table, |iteration, _| {
        if iteration >= total_ticks {
            return None;
        }
        plant.step(dt);

        if iteration % ticks_per_second == 0 {
            tracing::info!(
                t = format_args!("{:.2}", plant.sim_time()),
                angle = format_args!("{:.1}", plant.angle()),
                phase = %reader.get_string("arm/phase", "-"),
                calibrated = reader.get_boolean("arm/calibrated", false),
                "arm"
            );
        }

        let command = if iteration == extend_tick {
            if let Err(e) = roller.activate(1.0) {
                tracing::warn!(error = %e, "roller did not start");
            }
            ArmCommand::toggle()
        } else if iteration == retract_tick {
            if let Err(e) = roller.stop() {
                tracing::warn!(error = %e, "roller did not stop");
            }
            ArmCommand::toggle()
        } else {
            ArmCommand::NONE
        };
        Some(command)
    })?;

    let state = arm.state();
    tracing::info!(
        iterations = stats.iterations,
        faults = stats.faults,
        overruns = stats.overruns,
        jitter_us = format_args!("{:.1}", stats.jitter_std_dev() * 1e6),
        "loop finished"
    );
    tracing::info!(
        angle = format_args!("{:.2}", plant.angle()),
        phase = %state.phase,
        calibrated = state.calibrated,
        retracted = state.is_retracted,
        roller_commands = roller_motor.set_calls(),
        "final arm state"
    );
    Ok(())
}

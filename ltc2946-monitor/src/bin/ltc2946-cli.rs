//! Command-line interface for an LTC2946 power monitor.
//!
//! The device location and conversion settings come from the `LTC2946_*`
//! environment variables (see `config::MonitorConfig`).

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use ltc2946_monitor::{
    config::MonitorConfig,
    peripheral::ltc2946::{protocol, AcquisitionMode, Ltc2946, Quantity},
    tracing::{self, prelude::*},
    transport::LinuxI2c,
};

#[derive(Parser)]
#[command(name = "ltc2946-cli", about = "Read an LTC2946 power monitor over I2C")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read measurements
    Read {
        /// Quantity to read
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,

        /// Number of samples (0 = until interrupted)
        #[arg(short = 'n', long, default_value_t = 1)]
        samples: u64,

        /// Delay between samples
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Show the control and status registers
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Voltage,
    Current,
    Power,
    All,
}

impl Target {
    fn quantities(self) -> &'static [Quantity] {
        match self {
            Target::Voltage => &[Quantity::Voltage],
            Target::Current => &[Quantity::Current],
            Target::Power => &[Quantity::Power],
            Target::All => &[Quantity::Voltage, Quantity::Current, Quantity::Power],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stderr();
    let cli = Cli::parse();

    let config = MonitorConfig::from_env().context("invalid LTC2946_* configuration")?;
    let bus = LinuxI2c::open(config.handle.channel())
        .with_context(|| format!("cannot open bus for {}", config.handle))?;

    let mut monitor = Ltc2946::new(bus, config.handle, config.device.clone());
    monitor.setup().await;
    if config.device.acquisition_mode == AcquisitionMode::Continuous {
        monitor.set_acquisition_mode(AcquisitionMode::Continuous).await;
    }

    match cli.command {
        Command::Read {
            target,
            samples,
            interval_ms,
        } => read(&mut monitor, target, samples, Duration::from_millis(interval_ms)).await,
        Command::Status => status(&mut monitor).await,
    }
}

async fn read(
    monitor: &mut Ltc2946<LinuxI2c>,
    target: Target,
    samples: u64,
    interval: Duration,
) -> Result<()> {
    let policy = monitor.conversion_policy();
    let mut taken = 0;

    loop {
        let mut fields = Vec::new();
        for &quantity in target.quantities() {
            let value = monitor.read(quantity).await;
            fields.push(format!("{}={}", quantity, value));
        }

        if monitor.check_and_clear_error() {
            warn!(device = %monitor.handle(), "Bus error during sample; values are not valid");
            println!("{} (bus error)", fields.join(" "));
        } else {
            println!("{}", fields.join(" "));
        }

        taken += 1;
        if samples != 0 && taken >= samples {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    debug!(samples = taken, ?policy, "Sampling finished");
    Ok(())
}

async fn status(monitor: &mut Ltc2946<LinuxI2c>) -> Result<()> {
    let regs = monitor.registers();
    let ctrla = regs
        .read_u8(protocol::regs::CTRLA)
        .await
        .context("reading CTRLA")?;
    let status2 = regs
        .read_u8(protocol::regs::STATUS2)
        .await
        .context("reading STATUS2")?;

    println!("CTRLA   {}", protocol::decode_ctrla(ctrla));
    println!("STATUS2 {}", protocol::decode_status2(status2));
    Ok(())
}

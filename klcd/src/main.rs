mod command;
mod config;

use crate::command::{Action, run_session};
use crate::config::{Backend, Config};
use dotenv::dotenv;
use klcd_gpio::GpioDriver;
use klcd_gpio::delay::SleepDelay;
use klcd_gpio::gpiod::GpiodDriver;
use klcd_gpio::lcd::hd44780::device::Klcd;
use klcd_gpio::lcd::hd44780::driver::GpioHD44780Driver;
use klcd_gpio::sysfs::SysfsGpioDriver;
use log::{debug, info, warn};
use std::env::args;
use std::io::stdin;
use sysinfo::System;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!("klcd v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Host {} kernel ver {} architecture {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::cpu_arch(),
    );

    let args: Vec<String> = args().skip(1).collect();
    // Parse before touching the hardware, bad arguments shouldn't reset the display
    let action = if args.is_empty() {
        None
    } else {
        Some(Action::from_args(&args)?)
    };

    let pins = config::pin_map_from_env()?;
    info!("LCD @ RS: {}, E: {}, Data: {:?}", pins.rs, pins.e, pins.data);

    let config = Config::try_load()?.unwrap_or_else(|| {
        info!("Config not found. Using default timing");
        Config::default()
    });
    debug!("{:?}", config);

    debug!("Initializing GPIO driver...");
    let gpio: Box<dyn GpioDriver> = match config::backend_from_env()? {
        Backend::Gpiod => Box::new(GpiodDriver::open(&config::gpio_chip_from_env())?),
        Backend::Sysfs => Box::new(SysfsGpioDriver::new(SysfsGpioDriver::DEFAULT_COUNT)?),
    };
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let driver = GpioHD44780Driver::open(&*gpio, &pins, SleepDelay)?.with_timing(config.timing());
    let klcd = Klcd::open(driver)?;
    debug!("{:?} initialized.", klcd);

    if let Some(action) = action {
        // One-shot: leave the text on the display
        action.run(&klcd)?;
        return Ok(());
    }

    info!("Reading commands from stdin...");
    let failures = run_session(&klcd, stdin().lock())?;
    if failures > 0 {
        warn!("{} commands failed", failures);
    }

    drop(klcd.shutdown()?);
    info!("klcd exited.");

    Ok(())
}

// Device list example
//
// Prints every instrument the SDK can see, including network instruments,
// together with its serial number, the ways it can be opened and the
// server it is reached through.

use clap::Parser;
use libtiepie::{loader, DeviceKey, DeviceListError, Sdk, Settings, TiePie};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "list_devices")]
#[command(about = "List all instruments known to LibTiePie")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,

    /// Use built-in simulated instruments instead of the native library
    #[cfg(feature = "fake")]
    #[arg(long)]
    simulate: bool,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    #[cfg(feature = "fake")]
    if args.simulate {
        return run(&TiePie::new(libtiepie::fake::FakeSdk::demo()));
    }

    let tiepie = loader::load(&settings.loader)?;
    println!("LibTiePie {}", tiepie.version()?);
    run(&tiepie)
}

fn run<S: Sdk>(tiepie: &TiePie<S>) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tiepie.set_network_auto_detect(true)?;
    tiepie.update_list()?;

    let count = tiepie.device_count()?;
    if count == 0 {
        println!("No devices found!");
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!("Available devices:");

    // A failing entry is reported and the rest are still listed.
    let mut status = ExitCode::SUCCESS;
    for index in 0..count {
        if let Err(e) = print_entry(tiepie, DeviceKey::Index(index)) {
            eprintln!("{}", e);
            status = ExitCode::FAILURE;
        }
    }
    Ok(status)
}

fn print_entry<S: Sdk>(tiepie: &TiePie<S>, key: DeviceKey) -> Result<(), DeviceListError> {
    println!("  Name: {}", tiepie.device_name(key)?);
    println!("    Serial number  : {}", tiepie.device_serial_number(key)?);
    println!("    Available types: {}", tiepie.device_types(key)?.names().join(", "));

    if tiepie.device_has_server(key)? {
        let server = tiepie.server(key)?;
        println!("    Server         : {} ({})", server.url()?, server.name()?);
    }
    Ok(())
}

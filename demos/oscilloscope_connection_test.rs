// Connection test example
//
// Opens the first oscilloscope that supports connection testing, tests all
// channels that can be tested and prints per channel whether a probe or
// cable is connected.

use clap::Parser;
use libtiepie::{loader, DeviceListError, Poller, ScopeError, Sdk, Settings, TiePie};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "oscilloscope_connection_test")]
#[command(about = "Check which oscilloscope inputs have something connected")]
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
        return run(&TiePie::new(libtiepie::fake::FakeSdk::demo()), &settings);
    }

    let tiepie = loader::load(&settings.loader)?;
    run(&tiepie, &settings)
}

fn run<S: Sdk>(tiepie: &TiePie<S>, settings: &Settings) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tiepie.set_network_auto_detect(true)?;
    tiepie.update_list()?;

    let mut scope = match tiepie.find_connection_test_oscilloscope() {
        Ok(scope) => scope,
        Err(DeviceListError::NoCapableDevice) => {
            eprintln!("No oscilloscope available with connection test support!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let channels = scope.enable_connection_test_channels()?;
    log::debug!("Testing channels {:?}", channels);

    let running = scope.start_connection_test().map_err(|(_, e)| e)?;
    let result = match running.wait(&Poller::from_settings(&settings.poll)) {
        Ok((_scope, result)) => result,
        Err(ScopeError::DeviceRemoved) => {
            eprintln!("Device gone!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    println!("Connection test result:");
    for (ch, state) in result.iter() {
        println!("Ch{} = {}", ch + 1, state);
    }

    Ok(ExitCode::SUCCESS)
}

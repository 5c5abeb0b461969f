// Generator example
//
// Opens the first generator, outputs a sine for a while and stops it again.

use clap::Parser;
use libtiepie::{loader, DeviceListError, Generator, Sdk, Settings, SignalType, TiePie, Waveform};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "generator_sine")]
#[command(about = "Output a sine on the first generator for a few seconds")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frequency in Hz
    #[arg(short, long, default_value_t = 100e3)]
    frequency: f64,

    /// Amplitude in V
    #[arg(short, long, default_value_t = 2.0)]
    amplitude: f64,

    /// Offset in V
    #[arg(long, default_value_t = 0.0)]
    offset: f64,

    /// Seconds to keep the output running
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

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
        return run(&TiePie::new(libtiepie::fake::FakeSdk::demo()), &args);
    }

    let tiepie = loader::load(&settings.loader)?;
    run(&tiepie, &args)
}

fn run<S: Sdk>(tiepie: &TiePie<S>, args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tiepie.set_network_auto_detect(true)?;
    tiepie.update_list()?;

    let mut generator = match tiepie.find_generator() {
        Ok(generator) => generator,
        Err(DeviceListError::NoCapableDevice) => {
            eprintln!("No generator available!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let granted = generator.configure(&Waveform {
        signal_type: SignalType::Sine,
        frequency: args.frequency,
        amplitude: args.amplitude,
        offset: args.offset,
    })?;
    print_info(&generator)?;
    println!("  Frequency        : {} Hz", granted.frequency);
    println!("  Amplitude        : {} V", granted.amplitude);
    println!("  Offset           : {} V", granted.offset);

    generator.set_output_on(true)?;
    let running = generator.start().map_err(|(_, e)| e)?;
    println!("Generating for {} s...", args.duration);
    thread::sleep(Duration::from_secs(args.duration));

    let mut generator = running.stop()?;
    generator.set_output_on(false)?;
    println!("Stopped.");

    Ok(ExitCode::SUCCESS)
}

fn print_info<S: Sdk>(generator: &Generator<'_, S>) -> Result<(), libtiepie::SdkError> {
    println!("Generator:");
    println!("  Name             : {}", generator.name()?);
    println!("  Serial number    : {}", generator.serial_number()?);
    Ok(())
}

// Block measurement example
//
// Opens the first oscilloscope with block mode support, measures all its
// channels once on a rising edge of channel 1 and writes the record to a
// semicolon separated CSV file.

use clap::Parser;
use libtiepie::{
    export, loader, DeviceListError, LineEnding, Oscilloscope, Poller, ScopeError, Sdk, Settings, TiePie,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "oscilloscope_block")]
#[command(about = "Measure one block on every channel and save it as CSV")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file
    #[arg(short, long, default_value = "OscilloscopeBlock.csv")]
    output: PathBuf,

    /// Samples per channel, overrides the settings file
    #[arg(short, long)]
    record_length: Option<u64>,

    /// Sample frequency in Hz, overrides the settings file
    #[arg(short, long)]
    sample_frequency: Option<f64>,

    /// Print min, max and mean of every channel
    #[arg(long)]
    summary: bool,

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

    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(length) = args.record_length {
        settings.block.record_length = length;
    }
    if let Some(frequency) = args.sample_frequency {
        settings.block.sample_frequency = frequency;
    }

    #[cfg(feature = "fake")]
    if args.simulate {
        return run(&TiePie::new(libtiepie::fake::FakeSdk::demo()), &settings, &args);
    }

    let tiepie = loader::load(&settings.loader)?;
    run(&tiepie, &settings, &args)
}

fn run<S: Sdk>(tiepie: &TiePie<S>, settings: &Settings, args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tiepie.set_network_auto_detect(true)?;
    tiepie.update_list()?;

    let mut scope = match tiepie.find_block_oscilloscope() {
        Ok(scope) => scope,
        Err(DeviceListError::NoCapableDevice) => {
            eprintln!("No oscilloscope available with block measurement support!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    let granted = scope.configure_block(&settings.block)?;
    print_info(&scope)?;
    println!("  Sample frequency : {} Hz", granted.sample_frequency);
    println!("  Record length    : {}", granted.record_length);
    println!("  Trigger          : {:?} on Ch{}", granted.trigger_kind, granted.trigger_channel + 1);

    let running = scope.start().map_err(|(_, e)| e)?;
    let data = match running.wait(&Poller::from_settings(&settings.poll)) {
        Ok((_scope, data)) => data,
        Err(ScopeError::DeviceRemoved) => {
            eprintln!("Device gone!");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    export::write_csv_file(&args.output, &data, LineEnding::native())?;
    println!("Data written to: {}", args.output.display());

    if args.summary {
        for channel in data.summarize()? {
            println!(
                "  Ch{}: min {:.4} V, max {:.4} V, mean {:.4} V",
                channel.channel + 1,
                channel.min,
                channel.max,
                channel.mean
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_info<S: Sdk>(scope: &Oscilloscope<'_, S>) -> Result<(), ScopeError> {
    println!("Oscilloscope:");
    println!("  Name             : {}", scope.name()?);
    println!("  Serial number    : {}", scope.serial_number()?);
    println!("  Channels         : {}", scope.channel_count());
    Ok(())
}

//! # LibTiePie RS
//!
//! Safe Rust bindings for the LibTiePie SDK, the native library behind
//! TiePie engineering USB and network oscilloscopes, generators and I2C hosts.
//!
//! The SDK does all of the real work. This crate loads it, checks the
//! status of every call, and puts a typed API on top of the flat C
//! interface: device list queries, oscilloscope configuration, block
//! measurements, connection tests and generator output.
//!
//! ## Features
//!
//! - **Platform aware loading**: bundled DLL on Windows, system library elsewhere, via `libloading`
//! - **Scoped handles**: every opened device or server is closed exactly once, also on early returns
//! - **Typed measurement flow**: an oscilloscope is idle, running or holding ready data; a generator is stopped or running
//! - **Testable without hardware**: all SDK access goes through the [`Sdk`] trait; the `fake` feature ships an in-memory instrument
//! - **DataFrame output**: block data converts to a `polars` frame, or to the classic semicolon CSV
//! - **TOML configuration**: loader, polling and block setup from a file via `serde`
//!
//! ## Examples
//!
//! ### Listing devices
//!
//! ```rust,no_run
//! use libtiepie::{loader, DeviceKey, Settings};
//!
//! let tiepie = loader::load(&Settings::default().loader)?;
//! tiepie.set_network_auto_detect(true)?;
//! tiepie.update_list()?;
//!
//! for info in tiepie.devices()? {
//!     println!("{} ({}): {}", info.name, info.serial_number, info.types.names().join(", "));
//! }
//! let first = tiepie.device_name(DeviceKey::Index(0))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Block measurement
//!
//! ```rust,no_run
//! use libtiepie::{export, loader, BlockConfig, LineEnding, Poller, Settings};
//! use std::path::Path;
//!
//! let settings = Settings::default();
//! let tiepie = loader::load(&settings.loader)?;
//! tiepie.update_list()?;
//!
//! let mut scope = tiepie.find_block_oscilloscope()?;
//! let granted = scope.configure_block(&BlockConfig::default())?;
//! println!("Sampling at {} Hz", granted.sample_frequency);
//!
//! let running = scope.start().map_err(|(_, e)| e)?;
//! let (_scope, data) = running.wait(&Poller::from_settings(&settings.poll))?;
//! export::write_csv_file(Path::new("OscilloscopeBlock.csv"), &data, LineEnding::native())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Connection test
//!
//! ```rust,no_run
//! use libtiepie::{loader, Poller, Settings};
//!
//! let tiepie = loader::load(&Settings::default().loader)?;
//! tiepie.update_list()?;
//!
//! let mut scope = tiepie.find_connection_test_oscilloscope()?;
//! scope.enable_connection_test_channels()?;
//! let running = scope.start_connection_test().map_err(|(_, e)| e)?;
//! let (_scope, result) = running.wait(&Poller::default())?;
//! for (ch, state) in result.iter() {
//!     println!("Ch{}: {}", ch + 1, state);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod device_list;
pub mod export;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod generator;
pub mod handle;
pub mod loader;
pub mod native;
pub mod poll;
pub mod record;
pub mod scope;
pub mod sdk;

// Re-export the main types for convenience
pub use config::{BlockConfig, ChannelConfig, ConfigError, LoaderSettings, PollSettings, Settings, TriggerConfig};

pub use constants::{
    Coupling, DeviceTypes, IdKind, MeasureMode, MeasureModes, SignalType, SignalTypes, Status, TriState,
    TriggerKind,
};

pub use context::TiePie;

pub use device_list::{DeviceInfo, DeviceKey, DeviceListError, Server};

pub use export::{ChannelSummary, ExportError, LineEnding};

pub use generator::{Generator, GeneratorError, GrantedWaveform, RunningGenerator, Waveform};

pub use handle::Handle;

pub use loader::{LibraryLocation, LibraryLocator, LoaderError, LocatorRule};

pub use native::NativeSdk;

pub use poll::{Clock, PollError, Poller, SystemClock};

pub use record::{BlockData, ConnectionTestResult};

pub use scope::{
    CompletedConnectionTest, GrantedBlockConfig, GrantedChannel, MeasurementStatus, Oscilloscope,
    ReadyBlock, RunningBlock, RunningConnectionTest, ScopeError,
};

pub use sdk::{RawHandle, Sdk, SdkError, SdkResult};

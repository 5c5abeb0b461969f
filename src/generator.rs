//! Arbitrary waveform generator sessions.
//!
//! A [`Generator`] is set up while stopped; [`Generator::start`] consumes it
//! into a [`RunningGenerator`] that can only be stopped again.

use crate::constants::{SignalType, SignalTypes};
use crate::handle::Handle;
use crate::scope::note_coerced;
use crate::sdk::{RawHandle, Sdk, SdkError, SdkResult};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("Generator does not support {signal_type:?} signals")]
    UnsupportedSignalType { signal_type: SignalType },

    #[error("Instrument reported unknown signal type {raw:#x}")]
    UnexpectedSignalType { raw: u32 },
}

/// Values the instrument applied for a [`Waveform`].
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedWaveform {
    pub signal_type: SignalType,
    pub frequency: f64,
    pub amplitude: f64,
    pub offset: f64,
}

/// Requested generator output. The SDK may coerce the numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub signal_type: SignalType,
    /// Hz
    pub frequency: f64,
    /// Volts
    pub amplitude: f64,
    /// Volts
    pub offset: f64,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            signal_type: SignalType::Sine,
            frequency: 1e3,
            amplitude: 2.0,
            offset: 0.0,
        }
    }
}

/// An open generator that is not generating.
#[derive(Debug)]
pub struct Generator<'a, S: Sdk> {
    handle: Handle<'a, S>,
}

impl<'a, S: Sdk> Generator<'a, S> {
    pub fn from_handle(handle: Handle<'a, S>) -> Self {
        Self { handle }
    }

    fn sdk(&self) -> &'a S {
        self.handle.sdk()
    }

    fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    pub fn handle(&self) -> &Handle<'a, S> {
        &self.handle
    }

    pub fn name(&self) -> SdkResult<String> {
        self.sdk().dev_get_name(self.raw())
    }

    pub fn serial_number(&self) -> SdkResult<u32> {
        self.sdk().dev_get_serial_number(self.raw())
    }

    pub fn is_removed(&self) -> SdkResult<bool> {
        self.handle.is_removed()
    }

    pub fn signal_types(&self) -> SdkResult<SignalTypes> {
        self.sdk().gen_get_signal_types(self.raw())
    }

    /// Rejects signal types the generator does not list before asking the SDK.
    pub fn set_signal_type(&mut self, signal_type: SignalType) -> Result<SignalType, GeneratorError> {
        if !self.signal_types()?.contains(signal_type.flag()) {
            return Err(GeneratorError::UnsupportedSignalType { signal_type });
        }
        let raw = self.sdk().gen_set_signal_type(self.raw(), signal_type.to_raw())?;
        SignalType::from_raw(raw).ok_or(GeneratorError::UnexpectedSignalType { raw })
    }

    pub fn set_frequency(&mut self, frequency: f64) -> SdkResult<f64> {
        let granted = self.sdk().gen_set_frequency(self.raw(), frequency)?;
        note_coerced("frequency", frequency, granted);
        Ok(granted)
    }

    pub fn set_amplitude(&mut self, amplitude: f64) -> SdkResult<f64> {
        let granted = self.sdk().gen_set_amplitude(self.raw(), amplitude)?;
        note_coerced("amplitude", amplitude, granted);
        Ok(granted)
    }

    pub fn set_offset(&mut self, offset: f64) -> SdkResult<f64> {
        let granted = self.sdk().gen_set_offset(self.raw(), offset)?;
        note_coerced("offset", offset, granted);
        Ok(granted)
    }

    pub fn set_output_on(&mut self, on: bool) -> SdkResult<bool> {
        self.sdk().gen_set_output_on(self.raw(), on)
    }

    /// Applies the signal type before the numeric settings.
    pub fn configure(&mut self, waveform: &Waveform) -> Result<GrantedWaveform, GeneratorError> {
        let signal_type = self.set_signal_type(waveform.signal_type)?;
        let frequency = self.set_frequency(waveform.frequency)?;
        let amplitude = self.set_amplitude(waveform.amplitude)?;
        let offset = self.set_offset(waveform.offset)?;
        log::debug!(
            "Generator configured: {:?} at {} Hz, {} V",
            signal_type,
            frequency,
            amplitude
        );
        Ok(GrantedWaveform {
            signal_type,
            frequency,
            amplitude,
            offset,
        })
    }

    /// Starts generating. On failure the stopped generator is handed back.
    pub fn start(self) -> Result<RunningGenerator<'a, S>, (Self, GeneratorError)> {
        match self.sdk().gen_start(self.raw()) {
            Ok(()) => {
                log::debug!("Generator started on handle {}", self.raw());
                Ok(RunningGenerator { generator: self })
            }
            Err(e) => Err((self, e.into())),
        }
    }

    pub fn close(self) -> SdkResult<()> {
        self.handle.close()
    }
}

/// A generator that is producing its signal.
#[derive(Debug)]
pub struct RunningGenerator<'a, S: Sdk> {
    generator: Generator<'a, S>,
}

impl<'a, S: Sdk> RunningGenerator<'a, S> {
    pub fn generator(&self) -> &Generator<'a, S> {
        &self.generator
    }

    pub fn stop(self) -> Result<Generator<'a, S>, GeneratorError> {
        self.generator.sdk().gen_stop(self.generator.raw())?;
        log::debug!("Generator stopped on handle {}", self.generator.raw());
        Ok(self.generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TiePie;
    use crate::device_list::DeviceKey;
    use crate::fake::{FakeDevice, FakeSdk};

    fn listed(device: FakeDevice) -> TiePie<FakeSdk> {
        let tiepie = TiePie::new(FakeSdk::new().with_device(device));
        tiepie.update_list().unwrap();
        tiepie
    }

    #[test]
    fn test_configure_reports_granted_values() {
        let tiepie = listed(FakeDevice::generator("Handyscope HS3", 7).max_amplitude(5.0));
        let mut generator = tiepie.open_generator(DeviceKey::Index(0)).unwrap();

        let granted = generator
            .configure(&Waveform {
                signal_type: SignalType::Square,
                frequency: 250e3,
                amplitude: 8.0,
                offset: 0.5,
            })
            .unwrap();
        assert_eq!(granted.signal_type, SignalType::Square);
        assert!((granted.frequency - 250e3).abs() < f64::EPSILON);
        assert!((granted.amplitude - 5.0).abs() < f64::EPSILON);
        assert!((granted.offset - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unsupported_signal_type_is_rejected() {
        let tiepie = listed(
            FakeDevice::generator("AG", 7).signal_types(SignalTypes::SINE | SignalTypes::DC),
        );
        let mut generator = tiepie.open_generator(DeviceKey::Index(0)).unwrap();

        assert!(matches!(
            generator.set_signal_type(SignalType::Pulse),
            Err(GeneratorError::UnsupportedSignalType { signal_type: SignalType::Pulse })
        ));
        assert_eq!(tiepie.sdk().setter_calls(), 0);
        assert_eq!(generator.set_signal_type(SignalType::Dc).unwrap(), SignalType::Dc);
    }

    #[test]
    fn test_start_output_and_stop() {
        let tiepie = listed(FakeDevice::generator("AG", 7));
        let mut generator = tiepie.open_generator(DeviceKey::Index(0)).unwrap();
        let raw = generator.handle().raw();

        assert!(generator.set_output_on(true).unwrap());
        let running = generator.start().map_err(|(_, e)| e).unwrap();
        assert!(tiepie.sdk().generator_running(raw));
        assert!(tiepie.sdk().generator_output_on(raw));

        let mut generator = running.stop().unwrap();
        assert!(!tiepie.sdk().generator_running(raw));
        assert!(!generator.set_output_on(false).unwrap());
        drop(generator);
        assert!(tiepie.sdk().leaked_handles().is_empty());
    }

    #[test]
    fn test_removed_generator_is_reported() {
        let tiepie = listed(FakeDevice::generator("AG", 7).removed_after(1));
        let generator = tiepie.open_generator(DeviceKey::Index(0)).unwrap();

        assert!(!generator.is_removed().unwrap());
        assert!(generator.is_removed().unwrap());
        assert_eq!(generator.serial_number().unwrap(), 7);
    }
}

use std::time::Duration;

use crate::config::BlockConfig;
use crate::constants::{Coupling, MeasureMode, MeasureModes, TriggerKind};
use crate::handle::Handle;
use crate::poll::{Clock, PollError, Poller};
use crate::record::{BlockData, ConnectionTestResult};
use crate::sdk::{RawHandle, Sdk, SdkError, SdkResult};

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("Device gone")]
    DeviceRemoved,

    #[error("Channel {channel} out of range, the oscilloscope has {count} channels")]
    ChannelOutOfRange { channel: u16, count: u16 },

    #[error("Oscilloscope does not support connection tests")]
    NoConnectionTest,

    #[error("Channel {channel} does not support connection tests")]
    ConnectionTestUnsupported { channel: u16 },

    #[error("Instrument reported unknown {what} value {raw:#x}")]
    UnexpectedValue { what: &'static str, raw: u64 },

    #[error("Measurement not completed after {attempts} polls ({elapsed:?})")]
    Timeout { elapsed: Duration, attempts: u32 },
}

impl From<PollError<Self>> for ScopeError {
    fn from(error: PollError<Self>) -> Self {
        match error {
            PollError::Timeout { elapsed, attempts } => Self::Timeout { elapsed, attempts },
            PollError::Check(e) => e,
        }
    }
}

/// Result of a single non-blocking completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStatus {
    Pending,
    Ready,
    Removed,
}

/// Values the instrument actually applied for a [`BlockConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct GrantedBlockConfig {
    pub measure_mode: MeasureMode,
    pub sample_frequency: f64,
    pub record_length: u64,
    pub pre_sample_ratio: f64,
    pub trigger_timeout: f64,
    pub channels: Vec<GrantedChannel>,
    pub trigger_channel: u16,
    pub trigger_kind: TriggerKind,
    pub trigger_level: f64,
    pub trigger_hysteresis: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrantedChannel {
    pub enabled: bool,
    pub range: f64,
    pub coupling: Coupling,
}

pub(crate) fn note_coerced(what: &str, requested: f64, granted: f64) {
    if (requested - granted).abs() > f64::EPSILON * requested.abs().max(1.0) {
        log::warn!("Requested {} {} was coerced to {}", what, requested, granted);
    }
}

/// An open oscilloscope that is not measuring.
///
/// Configuration is only possible in this state; starting a measurement
/// consumes the scope and hands it back once the measurement is over.
#[derive(Debug)]
pub struct Oscilloscope<'a, S: Sdk> {
    handle: Handle<'a, S>,
    channel_count: u16,
    record_length: u64,
}

impl<'a, S: Sdk> Oscilloscope<'a, S> {
    pub fn from_handle(handle: Handle<'a, S>) -> SdkResult<Self> {
        let channel_count = handle.sdk().scp_get_channel_count(handle.raw())?;
        let record_length = handle.sdk().scp_get_record_length(handle.raw())?;
        Ok(Self {
            handle,
            channel_count,
            record_length,
        })
    }

    fn sdk(&self) -> &'a S {
        self.handle.sdk()
    }

    fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    fn check_channel(&self, channel: u16) -> Result<(), ScopeError> {
        if channel >= self.channel_count {
            return Err(ScopeError::ChannelOutOfRange {
                channel,
                count: self.channel_count,
            });
        }
        Ok(())
    }

    pub fn handle(&self) -> &Handle<'a, S> {
        &self.handle
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Record length last granted by the instrument.
    pub fn record_length(&self) -> u64 {
        self.record_length
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

    pub fn measure_modes(&self) -> SdkResult<MeasureModes> {
        self.sdk().scp_get_measure_modes(self.raw())
    }

    pub fn measure_mode(&self) -> Result<MeasureMode, ScopeError> {
        let raw = self.sdk().scp_get_measure_mode(self.raw())?;
        MeasureMode::from_raw(raw).ok_or(ScopeError::UnexpectedValue {
            what: "measure mode",
            raw: raw.into(),
        })
    }

    pub fn set_measure_mode(&mut self, mode: MeasureMode) -> Result<MeasureMode, ScopeError> {
        let raw = self.sdk().scp_set_measure_mode(self.raw(), mode.to_raw())?;
        MeasureMode::from_raw(raw).ok_or(ScopeError::UnexpectedValue {
            what: "measure mode",
            raw: raw.into(),
        })
    }

    pub fn sample_frequency(&self) -> SdkResult<f64> {
        self.sdk().scp_get_sample_frequency(self.raw())
    }

    pub fn set_sample_frequency(&mut self, frequency: f64) -> SdkResult<f64> {
        let granted = self.sdk().scp_set_sample_frequency(self.raw(), frequency)?;
        note_coerced("sample frequency", frequency, granted);
        Ok(granted)
    }

    /// Re-reads the record length from the instrument.
    pub fn read_record_length(&mut self) -> SdkResult<u64> {
        self.record_length = self.sdk().scp_get_record_length(self.raw())?;
        Ok(self.record_length)
    }

    pub fn set_record_length(&mut self, length: u64) -> SdkResult<u64> {
        let granted = self.sdk().scp_set_record_length(self.raw(), length)?;
        if granted != length {
            log::warn!("Requested record length {} was coerced to {}", length, granted);
        }
        self.record_length = granted;
        Ok(granted)
    }

    pub fn set_pre_sample_ratio(&mut self, ratio: f64) -> SdkResult<f64> {
        let granted = self.sdk().scp_set_pre_sample_ratio(self.raw(), ratio)?;
        note_coerced("pre sample ratio", ratio, granted);
        Ok(granted)
    }

    /// Seconds to wait for a trigger before measuring anyway.
    pub fn set_trigger_timeout(&mut self, seconds: f64) -> SdkResult<f64> {
        let granted = self.sdk().scp_set_trigger_time_out(self.raw(), seconds)?;
        note_coerced("trigger timeout", seconds, granted);
        Ok(granted)
    }

    pub fn channel_enabled(&self, ch: u16) -> Result<bool, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_get_enabled(self.raw(), ch)?)
    }

    pub fn set_channel_enabled(&mut self, ch: u16, enable: bool) -> Result<bool, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_set_enabled(self.raw(), ch, enable)?)
    }

    pub fn set_channel_range(&mut self, ch: u16, range: f64) -> Result<f64, ScopeError> {
        self.check_channel(ch)?;
        let granted = self.sdk().scp_ch_set_range(self.raw(), ch, range)?;
        note_coerced("range", range, granted);
        Ok(granted)
    }

    pub fn set_channel_coupling(&mut self, ch: u16, coupling: Coupling) -> Result<Coupling, ScopeError> {
        self.check_channel(ch)?;
        let raw = self.sdk().scp_ch_set_coupling(self.raw(), ch, coupling.to_raw())?;
        Coupling::from_raw(raw).ok_or(ScopeError::UnexpectedValue {
            what: "coupling",
            raw,
        })
    }

    pub fn set_trigger_enabled(&mut self, ch: u16, enable: bool) -> Result<bool, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_tr_set_enabled(self.raw(), ch, enable)?)
    }

    pub fn set_trigger_kind(&mut self, ch: u16, kind: TriggerKind) -> Result<TriggerKind, ScopeError> {
        self.check_channel(ch)?;
        let raw = self.sdk().scp_ch_tr_set_kind(self.raw(), ch, kind.to_raw())?;
        TriggerKind::from_raw(raw).ok_or(ScopeError::UnexpectedValue {
            what: "trigger kind",
            raw,
        })
    }

    /// Level as a fraction of the channel range.
    pub fn set_trigger_level(&mut self, ch: u16, level: f64) -> Result<f64, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_tr_set_level(self.raw(), ch, 0, level)?)
    }

    /// Hysteresis as a fraction of the channel range.
    pub fn set_trigger_hysteresis(&mut self, ch: u16, hysteresis: f64) -> Result<f64, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_tr_set_hysteresis(self.raw(), ch, 0, hysteresis)?)
    }

    /// Applies `config` and reports what the instrument granted.
    ///
    /// Every channel gets the same channel settings. Only the configured
    /// trigger channel is left with its trigger enabled.
    pub fn configure_block(&mut self, config: &BlockConfig) -> Result<GrantedBlockConfig, ScopeError> {
        let trigger = &config.trigger;
        self.check_channel(trigger.channel)?;

        let measure_mode = self.set_measure_mode(config.measure_mode)?;
        let sample_frequency = self.set_sample_frequency(config.sample_frequency)?;
        let record_length = self.set_record_length(config.record_length)?;
        let pre_sample_ratio = self.set_pre_sample_ratio(config.pre_sample_ratio)?;

        let mut channels = Vec::with_capacity(usize::from(self.channel_count));
        for ch in 0..self.channel_count {
            channels.push(GrantedChannel {
                enabled: self.set_channel_enabled(ch, config.channel.enabled)?,
                range: self.set_channel_range(ch, config.channel.range)?,
                coupling: self.set_channel_coupling(ch, config.channel.coupling)?,
            });
        }

        let trigger_timeout = self.set_trigger_timeout(config.trigger_timeout)?;

        for ch in 0..self.channel_count {
            self.set_trigger_enabled(ch, false)?;
        }
        self.set_trigger_enabled(trigger.channel, true)?;
        let trigger_kind = self.set_trigger_kind(trigger.channel, trigger.kind)?;
        let trigger_level = self.set_trigger_level(trigger.channel, trigger.level)?;
        let trigger_hysteresis = self.set_trigger_hysteresis(trigger.channel, trigger.hysteresis)?;

        log::debug!(
            "Block configured: {} Hz, {} samples, trigger on channel {}",
            sample_frequency,
            record_length,
            trigger.channel
        );

        Ok(GrantedBlockConfig {
            measure_mode,
            sample_frequency,
            record_length,
            pre_sample_ratio,
            trigger_timeout,
            channels,
            trigger_channel: trigger.channel,
            trigger_kind,
            trigger_level,
            trigger_hysteresis,
        })
    }

    /// Arms the oscilloscope. On failure the idle scope is handed back.
    pub fn start(self) -> Result<RunningBlock<'a, S>, (Self, ScopeError)> {
        match self.sdk().scp_start(self.raw()) {
            Ok(()) => {
                log::debug!("Measurement started on handle {}", self.raw());
                Ok(RunningBlock { scope: self })
            }
            Err(e) => Err((self, e.into())),
        }
    }

    pub fn has_connection_test(&self) -> SdkResult<bool> {
        self.sdk().scp_has_connection_test(self.raw())
    }

    pub fn channel_has_connection_test(&self, ch: u16) -> Result<bool, ScopeError> {
        self.check_channel(ch)?;
        Ok(self.sdk().scp_ch_has_connection_test(self.raw(), ch)?)
    }

    /// Enables exactly the channels that support connection testing.
    pub fn enable_connection_test_channels(&mut self) -> Result<Vec<u16>, ScopeError> {
        let mut enabled = Vec::new();
        for ch in 0..self.channel_count {
            let supported = self.channel_has_connection_test(ch)?;
            self.set_channel_enabled(ch, supported)?;
            if supported {
                enabled.push(ch);
            }
        }
        Ok(enabled)
    }

    /// Enables only `channels` for the next connection test.
    ///
    /// Fails without touching any channel if one of them cannot be tested.
    pub fn set_connection_test_channels(&mut self, channels: &[u16]) -> Result<(), ScopeError> {
        for &ch in channels {
            if !self.channel_has_connection_test(ch)? {
                return Err(ScopeError::ConnectionTestUnsupported { channel: ch });
            }
        }
        for ch in 0..self.channel_count {
            self.set_channel_enabled(ch, channels.contains(&ch))?;
        }
        Ok(())
    }

    pub fn start_connection_test(self) -> Result<RunningConnectionTest<'a, S>, (Self, ScopeError)> {
        match self.has_connection_test() {
            Ok(true) => {}
            Ok(false) => return Err((self, ScopeError::NoConnectionTest)),
            Err(e) => return Err((self, e.into())),
        }
        match self.sdk().scp_start_connection_test(self.raw()) {
            Ok(()) => {
                log::debug!("Connection test started on handle {}", self.raw());
                Ok(RunningConnectionTest { scope: self })
            }
            Err(e) => Err((self, e.into())),
        }
    }

    pub fn close(self) -> SdkResult<()> {
        self.handle.close()
    }
}

/// An armed block measurement.
///
/// Data can only be read once [`RunningBlock::wait_ready`] has seen the
/// instrument report it ready.
#[derive(Debug)]
pub struct RunningBlock<'a, S: Sdk> {
    scope: Oscilloscope<'a, S>,
}

impl<'a, S: Sdk> RunningBlock<'a, S> {
    pub fn scope(&self) -> &Oscilloscope<'a, S> {
        &self.scope
    }

    /// One poll. Removal wins over readiness.
    pub fn status(&self) -> Result<MeasurementStatus, ScopeError> {
        if self.scope.is_removed()? {
            return Ok(MeasurementStatus::Removed);
        }
        if self.scope.sdk().scp_is_data_ready(self.scope.raw())? {
            return Ok(MeasurementStatus::Ready);
        }
        Ok(MeasurementStatus::Pending)
    }

    /// Polls until the instrument has data.
    pub fn wait_ready<C: Clock>(self, poller: &Poller<C>) -> Result<ReadyBlock<'a, S>, ScopeError> {
        if !poll_completion(poller, || self.status())? {
            log::warn!("Device gone during measurement on handle {}", self.scope.raw());
            return Err(ScopeError::DeviceRemoved);
        }
        Ok(ReadyBlock { scope: self.scope })
    }

    /// Polls until the data is ready and retrieves the full record.
    pub fn wait<C: Clock>(self, poller: &Poller<C>) -> Result<(Oscilloscope<'a, S>, BlockData), ScopeError> {
        self.wait_ready(poller)?.data()
    }

    /// Abandons the measurement.
    pub fn stop(self) -> Result<Oscilloscope<'a, S>, ScopeError> {
        self.scope.sdk().scp_stop(self.scope.raw())?;
        Ok(self.scope)
    }
}

fn poll_completion<C: Clock>(
    poller: &Poller<C>,
    mut status: impl FnMut() -> Result<MeasurementStatus, ScopeError>,
) -> Result<bool, ScopeError> {
    Ok(poller.poll(|| {
        Ok::<_, ScopeError>(match status()? {
            MeasurementStatus::Pending => None,
            MeasurementStatus::Ready => Some(true),
            MeasurementStatus::Removed => Some(false),
        })
    })?)
}

/// A block measurement whose data is ready to be read.
#[derive(Debug)]
pub struct ReadyBlock<'a, S: Sdk> {
    scope: Oscilloscope<'a, S>,
}

impl<'a, S: Sdk> ReadyBlock<'a, S> {
    pub fn scope(&self) -> &Oscilloscope<'a, S> {
        &self.scope
    }

    /// Retrieves the whole record of every channel.
    pub fn data(self) -> Result<(Oscilloscope<'a, S>, BlockData), ScopeError> {
        let length = self.scope.record_length;
        self.data_range(0, length)
    }

    /// Retrieves up to `count` samples from `start` of every channel.
    ///
    /// The range is cut off at the end of the record.
    pub fn data_range(self, start: u64, count: u64) -> Result<(Oscilloscope<'a, S>, BlockData), ScopeError> {
        let count = count.min(self.scope.record_length.saturating_sub(start));
        let sdk = self.scope.sdk();
        let raw = self.scope.raw();
        let channels = sdk.scp_get_data(raw, self.scope.channel_count, start, count)?;
        let sample_frequency = sdk.scp_get_sample_frequency(raw)?;

        if let Some(received) = channels.iter().map(Vec::len).min() {
            if (received as u64) < count {
                log::debug!("Requested {} samples, received {}", count, received);
            }
        }

        Ok((self.scope, BlockData::new(sample_frequency, start, channels)))
    }
}

/// A running connection test.
#[derive(Debug)]
pub struct RunningConnectionTest<'a, S: Sdk> {
    scope: Oscilloscope<'a, S>,
}

impl<'a, S: Sdk> RunningConnectionTest<'a, S> {
    pub fn scope(&self) -> &Oscilloscope<'a, S> {
        &self.scope
    }

    pub fn status(&self) -> Result<MeasurementStatus, ScopeError> {
        if self.scope.is_removed()? {
            return Ok(MeasurementStatus::Removed);
        }
        if self.scope.sdk().scp_is_connection_test_completed(self.scope.raw())? {
            return Ok(MeasurementStatus::Ready);
        }
        Ok(MeasurementStatus::Pending)
    }

    pub fn wait_completed<C: Clock>(
        self,
        poller: &Poller<C>,
    ) -> Result<CompletedConnectionTest<'a, S>, ScopeError> {
        if !poll_completion(poller, || self.status())? {
            log::warn!("Device gone during connection test on handle {}", self.scope.raw());
            return Err(ScopeError::DeviceRemoved);
        }
        Ok(CompletedConnectionTest { scope: self.scope })
    }

    pub fn wait<C: Clock>(
        self,
        poller: &Poller<C>,
    ) -> Result<(Oscilloscope<'a, S>, ConnectionTestResult), ScopeError> {
        self.wait_completed(poller)?.result()
    }
}

/// A finished connection test.
#[derive(Debug)]
pub struct CompletedConnectionTest<'a, S: Sdk> {
    scope: Oscilloscope<'a, S>,
}

impl<'a, S: Sdk> CompletedConnectionTest<'a, S> {
    pub fn result(self) -> Result<(Oscilloscope<'a, S>, ConnectionTestResult), ScopeError> {
        let states = self
            .scope
            .sdk()
            .scp_get_connection_test_data(self.scope.raw(), self.scope.channel_count)?;
        Ok((self.scope, ConnectionTestResult::new(states)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TriState;
    use crate::context::TiePie;
    use crate::device_list::DeviceKey;
    use crate::fake::{FakeClock, FakeDevice, FakeSdk};

    fn listed(device: FakeDevice) -> TiePie<FakeSdk> {
        let tiepie = TiePie::new(FakeSdk::new().with_device(device));
        tiepie.update_list().unwrap();
        tiepie
    }

    fn fake_poller() -> Poller<FakeClock> {
        Poller::with_clock(FakeClock::new(), Duration::from_millis(10))
    }

    #[test]
    fn test_record_length_is_idempotent() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).max_record_length(5000));
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();

        for requested in [1, 3, 4999, 5000, 5001, 1_000_000] {
            let granted = scope.set_record_length(requested).unwrap();
            assert_eq!(scope.set_record_length(granted).unwrap(), granted);
            assert_eq!(scope.record_length(), granted);
            assert_eq!(scope.read_record_length().unwrap(), granted);
        }
        assert_eq!(scope.set_record_length(10_000).unwrap(), 5000);
    }

    #[test]
    fn test_configure_block_reports_granted_values() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .channels(2)
                .max_record_length(4000)
                .max_sample_frequency(500e3),
        );
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();

        let granted = scope.configure_block(&BlockConfig::default()).unwrap();
        assert_eq!(granted.record_length, 4000);
        assert!((granted.sample_frequency - 500e3).abs() < f64::EPSILON);
        assert_eq!(granted.channels.len(), 2);
        assert!(granted.channels.iter().all(|ch| ch.enabled && ch.coupling == Coupling::Dcv));
        assert_eq!(granted.trigger_kind, TriggerKind::RisingEdge);
        assert_eq!(scope.record_length(), 4000);

        let sdk = tiepie.sdk();
        assert_eq!(sdk.trigger_enabled(scope.handle().raw()), vec![true, false]);
    }

    #[test]
    fn test_configure_rejects_missing_trigger_channel() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).channels(2));
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let mut config = BlockConfig::default();
        config.trigger.channel = 2;

        assert!(matches!(
            scope.configure_block(&config),
            Err(ScopeError::ChannelOutOfRange { channel: 2, count: 2 })
        ));
        assert_eq!(tiepie.sdk().setter_calls(), 0);
    }

    #[test]
    fn test_wait_polls_until_ready_then_reads_once() {
        for not_ready in [0u32, 1, 5] {
            let tiepie = listed(
                FakeDevice::oscilloscope("HS5", 1)
                    .channels(2)
                    .data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
                    .ready_after(not_ready),
            );
            let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
            scope.set_record_length(3).unwrap();

            let poller = fake_poller();
            let running = scope.start().map_err(|(_, e)| e).unwrap();
            let (scope, data) = running.wait(&poller).unwrap();

            let sdk = tiepie.sdk();
            assert!(sdk.data_ready_checks() > not_ready);
            assert_eq!(sdk.get_data_calls(), 1);
            assert_eq!(poller.clock().sleeps().len(), not_ready as usize);
            assert_eq!(data.channels(), &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
            drop(scope);
            assert!(sdk.leaked_handles().is_empty());
        }
    }

    #[test]
    fn test_removed_device_still_closes() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .ready_after(100)
                .removed_after(3),
        );
        let scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let running = scope.start().map_err(|(_, e)| e).unwrap();

        assert!(matches!(running.wait(&fake_poller()), Err(ScopeError::DeviceRemoved)));
        let sdk = tiepie.sdk();
        assert_eq!(sdk.get_data_calls(), 0);
        assert!(sdk.leaked_handles().is_empty());
        assert_eq!(sdk.closed_count(), 1);
    }

    #[test]
    fn test_wait_timeout() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).ready_after(1000));
        let scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let running = scope.start().map_err(|(_, e)| e).unwrap();
        let poller = fake_poller().timeout(Duration::from_millis(100));

        assert!(matches!(running.wait(&poller), Err(ScopeError::Timeout { .. })));
        assert!(tiepie.sdk().leaked_handles().is_empty());
    }

    #[test]
    fn test_data_range_and_short_read() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .channels(1)
                .data(vec![vec![0.0, 0.5, 1.0, 1.5]]),
        );
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        scope.set_record_length(4).unwrap();

        let ready = scope.start().map_err(|(_, e)| e).unwrap().wait_ready(&fake_poller()).unwrap();
        let (scope, data) = ready.data_range(1, 2).unwrap();
        assert_eq!(data.start_index(), 1);
        assert_eq!(data.channel(0), Some(&[0.5, 1.0][..]));

        let ready = scope.start().map_err(|(_, e)| e).unwrap().wait_ready(&fake_poller()).unwrap();
        let (_scope, data) = ready.data_range(3, 10).unwrap();
        assert_eq!(data.sample_count(), 1);
    }

    #[test]
    fn test_data_range_is_cut_at_record_end() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).channels(2));
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        scope.set_record_length(8).unwrap();

        let ready = scope.start().map_err(|(_, e)| e).unwrap().wait_ready(&fake_poller()).unwrap();
        let (scope, data) = ready.data_range(0, u64::MAX).unwrap();
        assert_eq!(data.sample_count(), 8);

        let ready = scope.start().map_err(|(_, e)| e).unwrap().wait_ready(&fake_poller()).unwrap();
        let (_scope, data) = ready.data_range(u64::MAX, u64::MAX).unwrap();
        assert_eq!(data.sample_count(), 0);
        assert_eq!(data.channel_count(), 2);
    }

    #[test]
    fn test_data_is_not_read_before_ready() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .data(vec![vec![1.0, 2.0]])
                .ready_after(1000),
        );
        let scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let running = scope.start().map_err(|(_, e)| e).unwrap();
        assert_eq!(running.status().unwrap(), MeasurementStatus::Pending);

        let poller = fake_poller().timeout(Duration::from_millis(30));
        assert!(matches!(running.wait_ready(&poller), Err(ScopeError::Timeout { .. })));
        assert_eq!(tiepie.sdk().get_data_calls(), 0);
        assert!(tiepie.sdk().leaked_handles().is_empty());
    }

    #[test]
    fn test_stop_returns_idle_scope() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).ready_after(1000));
        let scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let running = scope.start().map_err(|(_, e)| e).unwrap();
        let scope = running.stop().unwrap();
        assert_eq!(scope.channel_count(), 4);
        assert!(!tiepie.sdk().is_measuring(scope.handle().raw()));
    }

    #[test]
    fn test_connection_test_enables_only_supported_channels() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .channels(4)
                .connection_test(vec![true, false, true, false])
                .connection_test_data(vec![TriState::True, TriState::True, TriState::False, TriState::True])
                .ready_after(2),
        );
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();

        assert_eq!(scope.enable_connection_test_channels().unwrap(), vec![0, 2]);
        let raw = scope.handle().raw();
        assert_eq!(tiepie.sdk().channel_enabled(raw), vec![true, false, true, false]);

        let running = scope.start_connection_test().map_err(|(_, e)| e).unwrap();
        let (_scope, result) = running.wait(&fake_poller()).unwrap();
        assert_eq!(
            result.channels(),
            &[TriState::True, TriState::Undefined, TriState::False, TriState::Undefined]
        );
    }

    #[test]
    fn test_removed_during_connection_test() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .channels(2)
                .connection_test(vec![true, true])
                .ready_after(100)
                .removed_after(2),
        );
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        scope.enable_connection_test_channels().unwrap();
        let running = scope.start_connection_test().map_err(|(_, e)| e).unwrap();

        assert!(matches!(running.wait(&fake_poller()), Err(ScopeError::DeviceRemoved)));
        let sdk = tiepie.sdk();
        assert_eq!(sdk.connection_test_data_calls(), 0);
        assert!(sdk.leaked_handles().is_empty());
        assert_eq!(sdk.closed_count(), 1);
    }

    #[test]
    fn test_unsupported_connection_test_channel_is_rejected() {
        let tiepie = listed(
            FakeDevice::oscilloscope("HS5", 1)
                .channels(2)
                .connection_test(vec![true, false]),
        );
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        let raw = scope.handle().raw();
        let before = tiepie.sdk().channel_enabled(raw);

        assert!(matches!(
            scope.set_connection_test_channels(&[0, 1]),
            Err(ScopeError::ConnectionTestUnsupported { channel: 1 })
        ));
        assert_eq!(tiepie.sdk().channel_enabled(raw), before);

        scope.set_connection_test_channels(&[0]).unwrap();
        assert_eq!(tiepie.sdk().channel_enabled(raw), vec![true, false]);
    }

    #[test]
    fn test_connection_test_needs_support() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1));
        let scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        match scope.start_connection_test() {
            Err((scope, ScopeError::NoConnectionTest)) => scope.close().unwrap(),
            other => unreachable!("expected NoConnectionTest, got {:?}", other.map(|_| ())),
        }
        assert!(tiepie.sdk().leaked_handles().is_empty());
    }

    #[test]
    fn test_channel_out_of_range() {
        let tiepie = listed(FakeDevice::oscilloscope("HS5", 1).channels(2));
        let mut scope = tiepie.open_oscilloscope(DeviceKey::Index(0)).unwrap();
        assert!(matches!(
            scope.set_channel_range(2, 8.0),
            Err(ScopeError::ChannelOutOfRange { channel: 2, count: 2 })
        ));
    }
}

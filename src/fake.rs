//! In-memory stand-in for the instrument SDK.
//!
//! [`FakeSdk`] keeps a scripted set of devices and tracks every object it
//! hands out, so tests can check that each handle is closed exactly once.
//! Only compiled for tests or with the `fake` feature.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::{
    DeviceTypes, IdKind, MeasureModes, SignalTypes, Status, TriState, CK_ACV, CK_DCV, CK_OHM,
    LIBTIEPIESTATUS_INVALID_CHANNEL, LIBTIEPIESTATUS_INVALID_DEVICE_INDEX,
    LIBTIEPIESTATUS_INVALID_DEVICE_SERIALNUMBER, LIBTIEPIESTATUS_INVALID_HANDLE,
    LIBTIEPIESTATUS_INVALID_PRODUCT_ID, LIBTIEPIESTATUS_INVALID_VALUE,
    LIBTIEPIESTATUS_MEASUREMENT_RUNNING, LIBTIEPIESTATUS_NOT_AVAILABLE,
    LIBTIEPIESTATUS_NOT_SUPPORTED, LIBTIEPIE_HANDLE_INVALID, MM_BLOCK, MM_STREAM, ST_SINE,
    TK_RISINGEDGE,
};
use crate::poll::Clock;
use crate::sdk::{RawHandle, Sdk, SdkError, SdkResult};

const RANGES: [f64; 9] = [0.2, 0.4, 0.8, 2.0, 4.0, 8.0, 20.0, 40.0, 80.0];
const GENERATOR_FREQUENCIES: (f64, f64) = (1e-3, 40e6);

fn fail(call: &'static str, code: i32) -> SdkError {
    let status = Status(code);
    SdkError::Status {
        call,
        status,
        message: status.name().to_lowercase().replace('_', " "),
    }
}

/// A scripted instrument in the fake device list.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    name: String,
    serial_number: u32,
    product_id: u32,
    types: DeviceTypes,
    server: Option<(String, String)>,
    measure_modes: MeasureModes,
    channel_count: u16,
    data: Option<Vec<Vec<f32>>>,
    ready_after: u32,
    removed_after: Option<u32>,
    connection_test: Vec<bool>,
    connection_test_data: Vec<TriState>,
    max_record_length: u64,
    max_sample_frequency: f64,
    signal_types: SignalTypes,
    max_amplitude: f64,
}

impl FakeDevice {
    pub fn new(name: &str, serial_number: u32, types: DeviceTypes) -> Self {
        Self {
            name: name.to_string(),
            serial_number,
            product_id: 0,
            types,
            server: None,
            measure_modes: MeasureModes::STREAM | MeasureModes::BLOCK,
            channel_count: 4,
            data: None,
            ready_after: 0,
            removed_after: None,
            connection_test: Vec::new(),
            connection_test_data: Vec::new(),
            max_record_length: 64 << 20,
            max_sample_frequency: 1e9,
            signal_types: SignalTypes::all().difference(SignalTypes::PULSE),
            max_amplitude: 12.0,
        }
    }

    pub fn oscilloscope(name: &str, serial_number: u32) -> Self {
        Self::new(name, serial_number, DeviceTypes::OSCILLOSCOPE)
    }

    pub fn generator(name: &str, serial_number: u32) -> Self {
        Self::new(name, serial_number, DeviceTypes::GENERATOR)
    }

    /// Only listed while network auto-detect is enabled.
    pub fn on_network(mut self, url: &str, server_name: &str) -> Self {
        self.server = Some((url.to_string(), server_name.to_string()));
        self
    }

    pub fn product_id(mut self, product_id: u32) -> Self {
        self.product_id = product_id;
        self
    }

    pub fn measure_modes(mut self, modes: MeasureModes) -> Self {
        self.measure_modes = modes;
        self
    }

    pub fn channels(mut self, count: u16) -> Self {
        self.channel_count = count;
        self
    }

    /// Samples returned by data retrieval, one vector per channel.
    pub fn data(mut self, data: Vec<Vec<f32>>) -> Self {
        self.data = Some(data);
        self
    }

    /// Number of completion polls that report "not yet" after a start.
    pub fn ready_after(mut self, polls: u32) -> Self {
        self.ready_after = polls;
        self
    }

    /// Number of removal checks that pass before the device is gone.
    pub fn removed_after(mut self, checks: u32) -> Self {
        self.removed_after = Some(checks);
        self
    }

    /// Per channel connection test support.
    pub fn connection_test(mut self, supported: Vec<bool>) -> Self {
        self.connection_test = supported;
        self
    }

    pub fn connection_test_data(mut self, data: Vec<TriState>) -> Self {
        self.connection_test_data = data;
        self
    }

    pub fn max_record_length(mut self, length: u64) -> Self {
        self.max_record_length = length;
        self
    }

    pub fn max_sample_frequency(mut self, frequency: f64) -> Self {
        self.max_sample_frequency = frequency;
        self
    }

    pub fn signal_types(mut self, types: SignalTypes) -> Self {
        self.signal_types = types;
        self
    }

    /// Volts; offsets are limited to the same magnitude.
    pub fn max_amplitude(mut self, amplitude: f64) -> Self {
        self.max_amplitude = amplitude;
        self
    }

    fn has_connection_test(&self, ch: u16) -> bool {
        self.connection_test.get(usize::from(ch)).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    Idle,
    Block,
    ConnectionTest,
}

#[derive(Debug)]
struct ScopeState {
    device: usize,
    measure_mode: u32,
    sample_frequency: f64,
    record_length: u64,
    enabled: Vec<bool>,
    trigger_enabled: Vec<bool>,
    activity: Activity,
    polls: u32,
    removal_checks: u32,
}

#[derive(Debug)]
struct GeneratorState {
    device: usize,
    signal_type: u32,
    frequency: f64,
    amplitude: f64,
    offset: f64,
    output_on: bool,
    running: bool,
    removal_checks: u32,
}

#[derive(Debug)]
enum Object {
    Scope(ScopeState),
    Generator(GeneratorState),
    Server(usize),
}

#[derive(Debug, Default)]
struct State {
    devices: Vec<FakeDevice>,
    listed: Vec<usize>,
    auto_detect: bool,
    next_handle: RawHandle,
    objects: BTreeMap<RawHandle, Object>,
}

#[derive(Debug, Default)]
struct Counters {
    opened: usize,
    closed: usize,
    invalid_closes: usize,
    server_lookups: usize,
    data_ready_checks: u32,
    get_data_calls: usize,
    connection_test_data_calls: usize,
    setter_calls: usize,
}

#[derive(Debug, Default)]
pub struct FakeSdk {
    state: RefCell<State>,
    counters: RefCell<Counters>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: FakeDevice) -> Self {
        self.state.borrow_mut().devices.push(device);
        self
    }

    /// Two USB oscilloscopes with a sine and a square on every channel.
    pub fn demo() -> Self {
        let length = 10_000usize;
        let sine: Vec<f32> = (0..length)
            .map(|i| (i as f32 * std::f32::consts::TAU / 1000.0).sin() * 2.0)
            .collect();
        let square: Vec<f32> = (0..length)
            .map(|i| if (i / 500) % 2 == 0 { 1.0 } else { -1.0 })
            .collect();

        Self::new()
            .with_device(
                FakeDevice::oscilloscope("Handyscope HS5-540XMS", 29_000)
                    .product_id(15)
                    .channels(2)
                    .data(vec![sine, square])
                    .ready_after(3),
            )
            .with_device(
                FakeDevice::oscilloscope("Handyscope HS6 DIFF-1000XMS", 29_001)
                    .product_id(20)
                    .channels(4)
                    .connection_test(vec![true; 4])
                    .connection_test_data(vec![TriState::True, TriState::False, TriState::True, TriState::True])
                    .ready_after(2),
            )
            .with_device(FakeDevice::generator("Handyscope HS3", 29_002).product_id(13))
    }

    pub fn opened_count(&self) -> usize {
        self.counters.borrow().opened
    }

    pub fn closed_count(&self) -> usize {
        self.counters.borrow().closed
    }

    /// Close calls on handles that were never opened or already closed.
    pub fn invalid_close_count(&self) -> usize {
        self.counters.borrow().invalid_closes
    }

    /// Handles opened but not yet closed.
    pub fn leaked_handles(&self) -> Vec<RawHandle> {
        self.state.borrow().objects.keys().copied().collect()
    }

    pub fn server_lookups(&self) -> usize {
        self.counters.borrow().server_lookups
    }

    pub fn data_ready_checks(&self) -> u32 {
        self.counters.borrow().data_ready_checks
    }

    pub fn get_data_calls(&self) -> usize {
        self.counters.borrow().get_data_calls
    }

    pub fn connection_test_data_calls(&self) -> usize {
        self.counters.borrow().connection_test_data_calls
    }

    pub fn setter_calls(&self) -> usize {
        self.counters.borrow().setter_calls
    }

    pub fn channel_enabled(&self, scope: RawHandle) -> Vec<bool> {
        match self.state.borrow().objects.get(&scope) {
            Some(Object::Scope(s)) => s.enabled.clone(),
            _ => Vec::new(),
        }
    }

    pub fn trigger_enabled(&self, scope: RawHandle) -> Vec<bool> {
        match self.state.borrow().objects.get(&scope) {
            Some(Object::Scope(s)) => s.trigger_enabled.clone(),
            _ => Vec::new(),
        }
    }

    pub fn generator_running(&self, generator: RawHandle) -> bool {
        matches!(
            self.state.borrow().objects.get(&generator),
            Some(Object::Generator(g)) if g.running
        )
    }

    pub fn generator_output_on(&self, generator: RawHandle) -> bool {
        matches!(
            self.state.borrow().objects.get(&generator),
            Some(Object::Generator(g)) if g.output_on
        )
    }

    pub fn is_measuring(&self, scope: RawHandle) -> bool {
        matches!(
            self.state.borrow().objects.get(&scope),
            Some(Object::Scope(s)) if s.activity != Activity::Idle
        )
    }

    fn lookup(&self, call: &'static str, kind: IdKind, id: u32) -> SdkResult<usize> {
        let state = self.state.borrow();
        let found = match kind {
            IdKind::Index => state.listed.get(id as usize).copied(),
            IdKind::SerialNumber => state
                .listed
                .iter()
                .copied()
                .find(|&d| state.devices[d].serial_number == id),
            IdKind::ProductId => state
                .listed
                .iter()
                .copied()
                .find(|&d| state.devices[d].product_id == id),
        };
        found.ok_or_else(|| {
            fail(
                call,
                match kind {
                    IdKind::Index => LIBTIEPIESTATUS_INVALID_DEVICE_INDEX,
                    IdKind::SerialNumber => LIBTIEPIESTATUS_INVALID_DEVICE_SERIALNUMBER,
                    IdKind::ProductId => LIBTIEPIESTATUS_INVALID_PRODUCT_ID,
                },
            )
        })
    }

    fn device<T>(&self, call: &'static str, kind: IdKind, id: u32, f: impl FnOnce(&FakeDevice) -> T) -> SdkResult<T> {
        let index = self.lookup(call, kind, id)?;
        Ok(f(&self.state.borrow().devices[index]))
    }

    fn open(&self, object: Object) -> RawHandle {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let raw = state.next_handle;
        state.objects.insert(raw, object);
        self.counters.borrow_mut().opened += 1;
        raw
    }

    fn object_device(&self, call: &'static str, handle: RawHandle) -> SdkResult<FakeDevice> {
        let state = self.state.borrow();
        match state.objects.get(&handle) {
            Some(Object::Scope(s)) => Ok(state.devices[s.device].clone()),
            Some(Object::Generator(g)) => Ok(state.devices[g.device].clone()),
            Some(Object::Server(d)) => Ok(state.devices[*d].clone()),
            None => Err(fail(call, LIBTIEPIESTATUS_INVALID_HANDLE)),
        }
    }

    fn scope<T>(
        &self,
        call: &'static str,
        handle: RawHandle,
        f: impl FnOnce(&mut ScopeState, &FakeDevice) -> SdkResult<T>,
    ) -> SdkResult<T> {
        let mut state = self.state.borrow_mut();
        let State { devices, objects, .. } = &mut *state;
        match objects.get_mut(&handle) {
            Some(Object::Scope(scope)) => {
                let device = &devices[scope.device];
                f(scope, device)
            }
            _ => Err(fail(call, LIBTIEPIESTATUS_INVALID_HANDLE)),
        }
    }

    fn scope_setter<T>(
        &self,
        call: &'static str,
        handle: RawHandle,
        f: impl FnOnce(&mut ScopeState, &FakeDevice) -> SdkResult<T>,
    ) -> SdkResult<T> {
        self.counters.borrow_mut().setter_calls += 1;
        self.scope(call, handle, f)
    }

    fn channel<T>(
        &self,
        call: &'static str,
        handle: RawHandle,
        ch: u16,
        f: impl FnOnce(&mut ScopeState, &FakeDevice, usize) -> SdkResult<T>,
    ) -> SdkResult<T> {
        self.scope_setter(call, handle, |scope, device| {
            if ch >= device.channel_count {
                return Err(fail(call, LIBTIEPIESTATUS_INVALID_CHANNEL));
            }
            f(scope, device, usize::from(ch))
        })
    }

    fn generator<T>(
        &self,
        call: &'static str,
        handle: RawHandle,
        f: impl FnOnce(&mut GeneratorState, &FakeDevice) -> SdkResult<T>,
    ) -> SdkResult<T> {
        let mut state = self.state.borrow_mut();
        let State { devices, objects, .. } = &mut *state;
        match objects.get_mut(&handle) {
            Some(Object::Generator(generator)) => {
                let device = &devices[generator.device];
                f(generator, device)
            }
            _ => Err(fail(call, LIBTIEPIESTATUS_INVALID_HANDLE)),
        }
    }

    fn generator_setter<T>(
        &self,
        call: &'static str,
        handle: RawHandle,
        f: impl FnOnce(&mut GeneratorState, &FakeDevice) -> SdkResult<T>,
    ) -> SdkResult<T> {
        self.counters.borrow_mut().setter_calls += 1;
        self.generator(call, handle, f)
    }

    fn server(&self, call: &'static str, handle: RawHandle) -> SdkResult<(String, String)> {
        let state = self.state.borrow();
        match state.objects.get(&handle) {
            Some(Object::Server(d)) => state.devices[*d]
                .server
                .clone()
                .ok_or_else(|| fail(call, LIBTIEPIESTATUS_NOT_AVAILABLE)),
            _ => Err(fail(call, LIBTIEPIESTATUS_INVALID_HANDLE)),
        }
    }
}

impl Sdk for FakeSdk {
    fn lib_get_version(&self) -> SdkResult<String> {
        Ok("0.9.16.0".to_string())
    }

    fn net_get_auto_detect_enabled(&self) -> SdkResult<bool> {
        Ok(self.state.borrow().auto_detect)
    }

    fn net_set_auto_detect_enabled(&self, enable: bool) -> SdkResult<bool> {
        self.state.borrow_mut().auto_detect = enable;
        Ok(enable)
    }

    fn lst_update(&self) -> SdkResult<()> {
        let mut state = self.state.borrow_mut();
        let auto_detect = state.auto_detect;
        state.listed = state
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.server.is_none() || auto_detect)
            .map(|(i, _)| i)
            .collect();
        Ok(())
    }

    fn lst_get_count(&self) -> SdkResult<u32> {
        Ok(self.state.borrow().listed.len() as u32)
    }

    fn lst_dev_can_open(&self, kind: IdKind, id: u32, types: DeviceTypes) -> SdkResult<bool> {
        self.device("LstDevCanOpen", kind, id, |d| d.types.intersects(types))
    }

    fn lst_dev_get_name(&self, kind: IdKind, id: u32) -> SdkResult<String> {
        self.device("LstDevGetName", kind, id, |d| d.name.clone())
    }

    fn lst_dev_get_name_short(&self, kind: IdKind, id: u32) -> SdkResult<String> {
        self.device("LstDevGetNameShort", kind, id, |d| {
            d.name.rsplit(' ').next().unwrap_or_default().to_string()
        })
    }

    fn lst_dev_get_serial_number(&self, kind: IdKind, id: u32) -> SdkResult<u32> {
        self.device("LstDevGetSerialNumber", kind, id, |d| d.serial_number)
    }

    fn lst_dev_get_product_id(&self, kind: IdKind, id: u32) -> SdkResult<u32> {
        self.device("LstDevGetProductId", kind, id, |d| d.product_id)
    }

    fn lst_dev_get_types(&self, kind: IdKind, id: u32) -> SdkResult<DeviceTypes> {
        self.device("LstDevGetTypes", kind, id, |d| d.types)
    }

    fn lst_dev_has_server(&self, kind: IdKind, id: u32) -> SdkResult<bool> {
        self.device("LstDevHasServer", kind, id, |d| d.server.is_some())
    }

    fn lst_dev_get_server(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        self.counters.borrow_mut().server_lookups += 1;
        let index = self.lookup("LstDevGetServer", kind, id)?;
        if self.state.borrow().devices[index].server.is_none() {
            return Err(fail("LstDevGetServer", LIBTIEPIESTATUS_NOT_AVAILABLE));
        }
        Ok(self.open(Object::Server(index)))
    }

    fn lst_open_oscilloscope(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        let index = self.lookup("LstOpenOscilloscope", kind, id)?;
        let (types, modes, channels, record_length) = {
            let state = self.state.borrow();
            let d = &state.devices[index];
            (d.types, d.measure_modes, d.channel_count, d.max_record_length.min(5000))
        };
        if !types.contains(DeviceTypes::OSCILLOSCOPE) {
            return Ok(LIBTIEPIE_HANDLE_INVALID);
        }
        let channels = usize::from(channels);
        Ok(self.open(Object::Scope(ScopeState {
            device: index,
            measure_mode: if modes.contains(MeasureModes::BLOCK) { MM_BLOCK } else { MM_STREAM },
            sample_frequency: 1e6,
            record_length,
            enabled: vec![true; channels],
            trigger_enabled: vec![false; channels],
            activity: Activity::Idle,
            polls: 0,
            removal_checks: 0,
        })))
    }

    fn lst_open_generator(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        let index = self.lookup("LstOpenGenerator", kind, id)?;
        if !self.state.borrow().devices[index].types.contains(DeviceTypes::GENERATOR) {
            return Ok(LIBTIEPIE_HANDLE_INVALID);
        }
        Ok(self.open(Object::Generator(GeneratorState {
            device: index,
            signal_type: ST_SINE,
            frequency: 1e3,
            amplitude: 1.0,
            offset: 0.0,
            output_on: false,
            running: false,
            removal_checks: 0,
        })))
    }

    fn srv_get_url(&self, server: RawHandle) -> SdkResult<String> {
        Ok(self.server("SrvGetURL", server)?.0)
    }

    fn srv_get_name(&self, server: RawHandle) -> SdkResult<String> {
        Ok(self.server("SrvGetName", server)?.1)
    }

    fn obj_close(&self, handle: RawHandle) -> SdkResult<()> {
        if self.state.borrow_mut().objects.remove(&handle).is_none() {
            self.counters.borrow_mut().invalid_closes += 1;
            return Err(fail("ObjClose", LIBTIEPIESTATUS_INVALID_HANDLE));
        }
        self.counters.borrow_mut().closed += 1;
        Ok(())
    }

    fn obj_is_removed(&self, handle: RawHandle) -> SdkResult<bool> {
        let mut state = self.state.borrow_mut();
        let State { devices, objects, .. } = &mut *state;
        match objects.get_mut(&handle) {
            Some(Object::Scope(scope)) => {
                scope.removal_checks += 1;
                Ok(devices[scope.device]
                    .removed_after
                    .is_some_and(|after| scope.removal_checks > after))
            }
            Some(Object::Generator(generator)) => {
                generator.removal_checks += 1;
                Ok(devices[generator.device]
                    .removed_after
                    .is_some_and(|after| generator.removal_checks > after))
            }
            Some(Object::Server(_)) => Ok(false),
            None => Err(fail("ObjIsRemoved", LIBTIEPIESTATUS_INVALID_HANDLE)),
        }
    }

    fn dev_get_name(&self, device: RawHandle) -> SdkResult<String> {
        Ok(self.object_device("DevGetName", device)?.name)
    }

    fn dev_get_serial_number(&self, device: RawHandle) -> SdkResult<u32> {
        Ok(self.object_device("DevGetSerialNumber", device)?.serial_number)
    }

    fn scp_get_channel_count(&self, scope: RawHandle) -> SdkResult<u16> {
        self.scope("ScpGetChannelCount", scope, |_, d| Ok(d.channel_count))
    }

    fn scp_get_measure_modes(&self, scope: RawHandle) -> SdkResult<MeasureModes> {
        self.scope("ScpGetMeasureModes", scope, |_, d| Ok(d.measure_modes))
    }

    fn scp_get_measure_mode(&self, scope: RawHandle) -> SdkResult<u32> {
        self.scope("ScpGetMeasureMode", scope, |s, _| Ok(s.measure_mode))
    }

    fn scp_set_measure_mode(&self, scope: RawHandle, mode: u32) -> SdkResult<u32> {
        self.scope_setter("ScpSetMeasureMode", scope, |s, d| {
            if !d.measure_modes.contains(MeasureModes::from_bits_retain(mode)) || mode == 0 {
                return Err(fail("ScpSetMeasureMode", LIBTIEPIESTATUS_INVALID_VALUE));
            }
            s.measure_mode = mode;
            Ok(mode)
        })
    }

    fn scp_get_sample_frequency(&self, scope: RawHandle) -> SdkResult<f64> {
        self.scope("ScpGetSampleFrequency", scope, |s, _| Ok(s.sample_frequency))
    }

    fn scp_set_sample_frequency(&self, scope: RawHandle, frequency: f64) -> SdkResult<f64> {
        self.scope_setter("ScpSetSampleFrequency", scope, |s, d| {
            s.sample_frequency = frequency.clamp(1.0, d.max_sample_frequency);
            Ok(s.sample_frequency)
        })
    }

    fn scp_get_record_length(&self, scope: RawHandle) -> SdkResult<u64> {
        self.scope("ScpGetRecordLength", scope, |s, _| Ok(s.record_length))
    }

    fn scp_set_record_length(&self, scope: RawHandle, length: u64) -> SdkResult<u64> {
        self.scope_setter("ScpSetRecordLength", scope, |s, d| {
            s.record_length = length.clamp(1, d.max_record_length);
            Ok(s.record_length)
        })
    }

    fn scp_set_pre_sample_ratio(&self, scope: RawHandle, ratio: f64) -> SdkResult<f64> {
        self.scope_setter("ScpSetPreSampleRatio", scope, |_, _| Ok(ratio.clamp(0.0, 1.0)))
    }

    fn scp_set_trigger_time_out(&self, scope: RawHandle, seconds: f64) -> SdkResult<f64> {
        self.scope_setter("ScpSetTriggerTimeOut", scope, |_, _| Ok(seconds.max(0.0)))
    }

    fn scp_ch_get_enabled(&self, scope: RawHandle, ch: u16) -> SdkResult<bool> {
        self.scope("ScpChGetEnabled", scope, |s, _| {
            s.enabled
                .get(usize::from(ch))
                .copied()
                .ok_or_else(|| fail("ScpChGetEnabled", LIBTIEPIESTATUS_INVALID_CHANNEL))
        })
    }

    fn scp_ch_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool> {
        self.channel("ScpChSetEnabled", scope, ch, |s, _, ch| {
            s.enabled[ch] = enable;
            Ok(enable)
        })
    }

    fn scp_ch_set_range(&self, scope: RawHandle, ch: u16, range: f64) -> SdkResult<f64> {
        self.channel("ScpChSetRange", scope, ch, |_, _, _| {
            Ok(RANGES
                .iter()
                .copied()
                .find(|&r| r >= range)
                .unwrap_or(RANGES[RANGES.len() - 1]))
        })
    }

    fn scp_ch_set_coupling(&self, scope: RawHandle, ch: u16, coupling: u64) -> SdkResult<u64> {
        self.channel("ScpChSetCoupling", scope, ch, |_, _, _| {
            if matches!(coupling, CK_DCV | CK_ACV | CK_OHM) {
                Ok(coupling)
            } else {
                Err(fail("ScpChSetCoupling", LIBTIEPIESTATUS_INVALID_VALUE))
            }
        })
    }

    fn scp_ch_tr_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool> {
        self.channel("ScpChTrSetEnabled", scope, ch, |s, _, ch| {
            s.trigger_enabled[ch] = enable;
            Ok(enable)
        })
    }

    fn scp_ch_tr_set_kind(&self, scope: RawHandle, ch: u16, kind: u64) -> SdkResult<u64> {
        self.channel("ScpChTrSetKind", scope, ch, |_, _, _| {
            if kind == 0 || kind > TK_RISINGEDGE << 12 || !kind.is_power_of_two() {
                return Err(fail("ScpChTrSetKind", LIBTIEPIESTATUS_INVALID_VALUE));
            }
            Ok(kind)
        })
    }

    fn scp_ch_tr_set_level(&self, scope: RawHandle, ch: u16, index: u32, level: f64) -> SdkResult<f64> {
        self.channel("ScpChTrSetLevel", scope, ch, |_, _, _| {
            if index > 1 {
                return Err(fail("ScpChTrSetLevel", LIBTIEPIESTATUS_INVALID_VALUE));
            }
            Ok(level.clamp(0.0, 1.0))
        })
    }

    fn scp_ch_tr_set_hysteresis(
        &self,
        scope: RawHandle,
        ch: u16,
        index: u32,
        hysteresis: f64,
    ) -> SdkResult<f64> {
        self.channel("ScpChTrSetHysteresis", scope, ch, |_, _, _| {
            if index > 1 {
                return Err(fail("ScpChTrSetHysteresis", LIBTIEPIESTATUS_INVALID_VALUE));
            }
            Ok(hysteresis.clamp(0.0, 1.0))
        })
    }

    fn scp_start(&self, scope: RawHandle) -> SdkResult<()> {
        self.scope("ScpStart", scope, |s, _| {
            if s.activity != Activity::Idle {
                return Err(fail("ScpStart", LIBTIEPIESTATUS_MEASUREMENT_RUNNING));
            }
            s.activity = Activity::Block;
            s.polls = 0;
            Ok(())
        })
    }

    fn scp_stop(&self, scope: RawHandle) -> SdkResult<()> {
        self.scope("ScpStop", scope, |s, _| {
            s.activity = Activity::Idle;
            Ok(())
        })
    }

    fn scp_is_data_ready(&self, scope: RawHandle) -> SdkResult<bool> {
        self.counters.borrow_mut().data_ready_checks += 1;
        self.scope("ScpIsDataReady", scope, |s, d| {
            if s.activity != Activity::Block {
                return Ok(false);
            }
            s.polls += 1;
            Ok(s.polls > d.ready_after)
        })
    }

    fn scp_get_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
        start: u64,
        count: u64,
    ) -> SdkResult<Vec<Vec<f32>>> {
        self.counters.borrow_mut().get_data_calls += 1;
        self.scope("ScpGetData", scope, |s, d| {
            s.activity = Activity::Idle;
            let channels = usize::from(channel_count.min(d.channel_count));
            let zeros;
            let source = match &d.data {
                Some(data) => data,
                None => {
                    zeros = vec![vec![0.0; s.record_length as usize]; channels];
                    &zeros
                }
            };
            Ok(source
                .iter()
                .take(channels)
                .map(|samples| {
                    let len = samples.len() as u64;
                    let from = start.min(len) as usize;
                    let to = start.saturating_add(count).min(len) as usize;
                    samples[from..to].to_vec()
                })
                .collect())
        })
    }

    fn scp_has_connection_test(&self, scope: RawHandle) -> SdkResult<bool> {
        self.scope("ScpHasConnectionTest", scope, |_, d| {
            Ok((0..d.channel_count).any(|ch| d.has_connection_test(ch)))
        })
    }

    fn scp_ch_has_connection_test(&self, scope: RawHandle, ch: u16) -> SdkResult<bool> {
        self.scope("ScpChHasConnectionTest", scope, |_, d| {
            if ch >= d.channel_count {
                return Err(fail("ScpChHasConnectionTest", LIBTIEPIESTATUS_INVALID_CHANNEL));
            }
            Ok(d.has_connection_test(ch))
        })
    }

    fn scp_start_connection_test(&self, scope: RawHandle) -> SdkResult<()> {
        self.scope("ScpStartConnectionTest", scope, |s, d| {
            if !(0..d.channel_count).any(|ch| d.has_connection_test(ch)) {
                return Err(fail("ScpStartConnectionTest", LIBTIEPIESTATUS_NOT_SUPPORTED));
            }
            if s.activity != Activity::Idle {
                return Err(fail("ScpStartConnectionTest", LIBTIEPIESTATUS_MEASUREMENT_RUNNING));
            }
            s.activity = Activity::ConnectionTest;
            s.polls = 0;
            Ok(())
        })
    }

    fn scp_is_connection_test_completed(&self, scope: RawHandle) -> SdkResult<bool> {
        self.scope("ScpIsConnectionTestCompleted", scope, |s, d| {
            if s.activity != Activity::ConnectionTest {
                return Ok(false);
            }
            s.polls += 1;
            Ok(s.polls > d.ready_after)
        })
    }

    fn scp_get_connection_test_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
    ) -> SdkResult<Vec<TriState>> {
        self.counters.borrow_mut().connection_test_data_calls += 1;
        self.scope("ScpGetConnectionTestData", scope, |s, d| {
            s.activity = Activity::Idle;
            Ok((0..channel_count.min(d.channel_count))
                .map(|ch| {
                    let i = usize::from(ch);
                    if s.enabled[i] && d.has_connection_test(ch) {
                        d.connection_test_data.get(i).copied().unwrap_or_default()
                    } else {
                        TriState::Undefined
                    }
                })
                .collect())
        })
    }

    fn gen_get_signal_types(&self, generator: RawHandle) -> SdkResult<SignalTypes> {
        self.generator("GenGetSignalTypes", generator, |_, d| Ok(d.signal_types))
    }

    fn gen_set_signal_type(&self, generator: RawHandle, signal_type: u32) -> SdkResult<u32> {
        self.generator_setter("GenSetSignalType", generator, |g, d| {
            let requested = SignalTypes::from_bits_retain(signal_type);
            if signal_type.count_ones() != 1 || !d.signal_types.contains(requested) {
                return Err(fail("GenSetSignalType", LIBTIEPIESTATUS_INVALID_VALUE));
            }
            g.signal_type = signal_type;
            Ok(g.signal_type)
        })
    }

    fn gen_set_frequency(&self, generator: RawHandle, frequency: f64) -> SdkResult<f64> {
        self.generator_setter("GenSetFrequency", generator, |g, _| {
            let (min, max) = GENERATOR_FREQUENCIES;
            g.frequency = frequency.clamp(min, max);
            Ok(g.frequency)
        })
    }

    fn gen_set_amplitude(&self, generator: RawHandle, amplitude: f64) -> SdkResult<f64> {
        self.generator_setter("GenSetAmplitude", generator, |g, d| {
            g.amplitude = amplitude.clamp(0.0, d.max_amplitude);
            Ok(g.amplitude)
        })
    }

    fn gen_set_offset(&self, generator: RawHandle, offset: f64) -> SdkResult<f64> {
        self.generator_setter("GenSetOffset", generator, |g, d| {
            g.offset = offset.clamp(-d.max_amplitude, d.max_amplitude);
            Ok(g.offset)
        })
    }

    fn gen_set_output_on(&self, generator: RawHandle, on: bool) -> SdkResult<bool> {
        self.generator_setter("GenSetOutputOn", generator, |g, _| {
            g.output_on = on;
            Ok(on)
        })
    }

    fn gen_start(&self, generator: RawHandle) -> SdkResult<()> {
        self.generator("GenStart", generator, |g, _| {
            if g.running {
                return Err(fail("GenStart", LIBTIEPIESTATUS_MEASUREMENT_RUNNING));
            }
            g.running = true;
            Ok(())
        })
    }

    fn gen_stop(&self, generator: RawHandle) -> SdkResult<()> {
        self.generator("GenStop", generator, |g, _| {
            g.running = false;
            Ok(())
        })
    }
}

/// Clock whose sleeps only advance a counter.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.borrow_mut().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_twice_is_counted() {
        let sdk = FakeSdk::new().with_device(FakeDevice::oscilloscope("HS5", 1));
        sdk.lst_update().unwrap();
        let raw = sdk.lst_open_oscilloscope(IdKind::Index, 0).unwrap();

        sdk.obj_close(raw).unwrap();
        assert!(sdk.obj_close(raw).is_err());
        assert_eq!(sdk.closed_count(), 1);
        assert_eq!(sdk.invalid_close_count(), 1);
    }

    #[test]
    fn test_demo_devices() {
        let sdk = FakeSdk::demo();
        sdk.lst_update().unwrap();
        assert_eq!(sdk.lst_get_count().unwrap(), 3);
        assert_eq!(sdk.lst_dev_get_name_short(IdKind::ProductId, 20).unwrap(), "DIFF-1000XMS");
    }
}

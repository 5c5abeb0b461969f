//! [`Sdk`] on top of the real shared library.
//!
//! Every entry point is resolved once when the library is opened. After
//! each call the library's last status is read; negative statuses become
//! [`SdkError`]s carrying the library's own status text.

#![allow(unsafe_code)]

use std::ffi::{c_char, CStr, OsStr};
use std::ptr;

use libloading::Library;

use crate::constants::{DeviceTypes, IdKind, MeasureModes, SignalTypes, Status, TriState};
use crate::loader::LoaderError;
use crate::sdk::{RawHandle, Sdk, SdkError, SdkResult};

type Bool8 = u8;

macro_rules! entry_points {
    ($($name:ident: fn($($arg:ty),*) -> $ret:ty;)*) => {
        #[allow(non_snake_case)]
        struct EntryPoints {
            $($name: unsafe extern "C" fn($($arg),*) -> $ret,)*
        }

        impl EntryPoints {
            fn resolve(library: &Library) -> Result<Self, LoaderError> {
                Ok(Self {
                    $($name: unsafe {
                        *library
                            .get::<unsafe extern "C" fn($($arg),*) -> $ret>(
                                concat!(stringify!($name), "\0").as_bytes(),
                            )
                            .map_err(|source| LoaderError::Symbol {
                                symbol: stringify!($name),
                                source,
                            })?
                    },)*
                })
            }
        }
    };
}

entry_points! {
    LibInit: fn() -> ();
    LibExit: fn() -> ();
    LibGetVersion: fn() -> u64;
    LibGetLastStatus: fn() -> i32;
    LibGetLastStatusStr: fn() -> *const c_char;

    NetGetAutoDetectEnabled: fn() -> Bool8;
    NetSetAutoDetectEnabled: fn(Bool8) -> Bool8;

    LstUpdate: fn() -> ();
    LstGetCount: fn() -> u32;
    LstDevCanOpen: fn(u32, u32, u32) -> Bool8;
    LstDevGetName: fn(u32, u32, *mut c_char, u32) -> u32;
    LstDevGetNameShort: fn(u32, u32, *mut c_char, u32) -> u32;
    LstDevGetSerialNumber: fn(u32, u32) -> u32;
    LstDevGetProductId: fn(u32, u32) -> u32;
    LstDevGetTypes: fn(u32, u32) -> u32;
    LstDevHasServer: fn(u32, u32) -> Bool8;
    LstDevGetServer: fn(u32, u32) -> u32;
    LstOpenOscilloscope: fn(u32, u32) -> u32;
    LstOpenGenerator: fn(u32, u32) -> u32;

    SrvGetURL: fn(u32, *mut c_char, u32) -> u32;
    SrvGetName: fn(u32, *mut c_char, u32) -> u32;

    ObjClose: fn(u32) -> Bool8;
    ObjIsRemoved: fn(u32) -> Bool8;

    DevGetName: fn(u32, *mut c_char, u32) -> u32;
    DevGetSerialNumber: fn(u32) -> u32;

    ScpGetChannelCount: fn(u32) -> u16;
    ScpGetMeasureModes: fn(u32) -> u32;
    ScpGetMeasureMode: fn(u32) -> u32;
    ScpSetMeasureMode: fn(u32, u32) -> u32;
    ScpGetSampleFrequency: fn(u32) -> f64;
    ScpSetSampleFrequency: fn(u32, f64) -> f64;
    ScpGetRecordLength: fn(u32) -> u64;
    ScpSetRecordLength: fn(u32, u64) -> u64;
    ScpSetPreSampleRatio: fn(u32, f64) -> f64;
    ScpSetTriggerTimeOut: fn(u32, f64) -> f64;

    ScpChGetEnabled: fn(u32, u16) -> Bool8;
    ScpChSetEnabled: fn(u32, u16, Bool8) -> Bool8;
    ScpChSetRange: fn(u32, u16, f64) -> f64;
    ScpChSetCoupling: fn(u32, u16, u64) -> u64;

    ScpChTrSetEnabled: fn(u32, u16, Bool8) -> Bool8;
    ScpChTrSetKind: fn(u32, u16, u64) -> u64;
    ScpChTrSetLevel: fn(u32, u16, u32, f64) -> f64;
    ScpChTrSetHysteresis: fn(u32, u16, u32, f64) -> f64;

    ScpStart: fn(u32) -> Bool8;
    ScpStop: fn(u32) -> Bool8;
    ScpIsDataReady: fn(u32) -> Bool8;
    ScpGetData: fn(u32, *mut *mut f32, u16, u64, u64) -> u64;

    ScpHasConnectionTest: fn(u32) -> Bool8;
    ScpChHasConnectionTest: fn(u32, u16) -> Bool8;
    ScpStartConnectionTest: fn(u32) -> Bool8;
    ScpIsConnectionTestCompleted: fn(u32) -> Bool8;
    ScpGetConnectionTestData: fn(u32, *mut u8, u16) -> u16;

    GenGetSignalTypes: fn(u32) -> u32;
    GenSetSignalType: fn(u32, u32) -> u32;
    GenSetFrequency: fn(u32, f64) -> f64;
    GenSetAmplitude: fn(u32, f64) -> f64;
    GenSetOffset: fn(u32, f64) -> f64;
    GenSetOutputOn: fn(u32, Bool8) -> Bool8;
    GenStart: fn(u32) -> Bool8;
    GenStop: fn(u32) -> Bool8;
}

/// Calls an entry point and checks the library status afterwards.
macro_rules! call {
    ($sdk:expr, $name:ident($($arg:expr),*)) => {{
        let value = unsafe { ($sdk.api.$name)($($arg),*) };
        $sdk.check(stringify!($name)).map(|()| value)
    }};
}

fn bool8(value: bool) -> Bool8 {
    u8::from(value)
}

/// Decodes the first `written` entries; the rest stay undefined.
fn connection_test_states(buffer: &[u8], written: u16) -> Vec<TriState> {
    buffer
        .iter()
        .enumerate()
        .map(|(i, &raw)| {
            if i < usize::from(written) {
                TriState::from_raw(raw)
            } else {
                TriState::Undefined
            }
        })
        .collect()
}

/// Zeroed buffer of `count` samples, or an error if it cannot be allocated.
fn sample_buffer(call: &'static str, count: u64) -> SdkResult<Vec<f32>> {
    let too_large = || SdkError::BufferTooLarge { call, requested: count };
    let len = usize::try_from(count).map_err(|_| too_large())?;
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| too_large())?;
    buffer.resize(len, 0.0);
    Ok(buffer)
}

/// The loaded library. Initialized on open, de-initialized on drop.
pub struct NativeSdk {
    api: EntryPoints,
    _library: Library,
}

impl std::fmt::Debug for NativeSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSdk").finish_non_exhaustive()
    }
}

impl NativeSdk {
    /// Loads `target`, resolves all entry points and initializes the library.
    pub fn open(target: &OsStr) -> Result<Self, LoaderError> {
        let library = unsafe { Library::new(target) }.map_err(|source| LoaderError::Open {
            target: target.to_os_string(),
            source,
        })?;
        let api = EntryPoints::resolve(&library)?;

        unsafe { (api.LibInit)() };
        let status = Status(unsafe { (api.LibGetLastStatus)() });
        if status.is_error() {
            return Err(LoaderError::InitializationFailed { status });
        }

        Ok(Self {
            api,
            _library: library,
        })
    }

    fn check(&self, call: &'static str) -> SdkResult<()> {
        let status = Status(unsafe { (self.api.LibGetLastStatus)() });
        if status.is_error() {
            let text = unsafe { (self.api.LibGetLastStatusStr)() };
            let message = if text.is_null() {
                status.name().to_string()
            } else {
                unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
            };
            return Err(SdkError::Status { call, status, message });
        }
        if status.is_warning() {
            log::debug!("{} returned {}", call, status);
        }
        Ok(())
    }

    /// Length query with a null buffer, then the real read.
    fn read_string(
        &self,
        call: &'static str,
        get: impl Fn(*mut c_char, u32) -> u32,
    ) -> SdkResult<String> {
        let length = get(ptr::null_mut(), 0);
        self.check(call)?;

        let mut buffer = vec![0u8; length as usize + 1];
        get(buffer.as_mut_ptr().cast(), buffer.len() as u32);
        self.check(call)?;

        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        buffer.truncate(end);
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Drop for NativeSdk {
    fn drop(&mut self) {
        log::debug!("De-initializing LibTiePie");
        unsafe { (self.api.LibExit)() };
    }
}

impl Sdk for NativeSdk {
    fn lib_get_version(&self) -> SdkResult<String> {
        let version = call!(self, LibGetVersion())?;
        Ok(format!(
            "{}.{}.{}.{}",
            (version >> 48) & 0xffff,
            (version >> 32) & 0xffff,
            (version >> 16) & 0xffff,
            version & 0xffff
        ))
    }

    fn net_get_auto_detect_enabled(&self) -> SdkResult<bool> {
        Ok(call!(self, NetGetAutoDetectEnabled())? != 0)
    }

    fn net_set_auto_detect_enabled(&self, enable: bool) -> SdkResult<bool> {
        Ok(call!(self, NetSetAutoDetectEnabled(bool8(enable)))? != 0)
    }

    fn lst_update(&self) -> SdkResult<()> {
        call!(self, LstUpdate())
    }

    fn lst_get_count(&self) -> SdkResult<u32> {
        call!(self, LstGetCount())
    }

    fn lst_dev_can_open(&self, kind: IdKind, id: u32, types: DeviceTypes) -> SdkResult<bool> {
        Ok(call!(self, LstDevCanOpen(kind.to_raw(), id, types.bits()))? != 0)
    }

    fn lst_dev_get_name(&self, kind: IdKind, id: u32) -> SdkResult<String> {
        self.read_string("LstDevGetName", |buffer, length| unsafe {
            (self.api.LstDevGetName)(kind.to_raw(), id, buffer, length)
        })
    }

    fn lst_dev_get_name_short(&self, kind: IdKind, id: u32) -> SdkResult<String> {
        self.read_string("LstDevGetNameShort", |buffer, length| unsafe {
            (self.api.LstDevGetNameShort)(kind.to_raw(), id, buffer, length)
        })
    }

    fn lst_dev_get_serial_number(&self, kind: IdKind, id: u32) -> SdkResult<u32> {
        call!(self, LstDevGetSerialNumber(kind.to_raw(), id))
    }

    fn lst_dev_get_product_id(&self, kind: IdKind, id: u32) -> SdkResult<u32> {
        call!(self, LstDevGetProductId(kind.to_raw(), id))
    }

    fn lst_dev_get_types(&self, kind: IdKind, id: u32) -> SdkResult<DeviceTypes> {
        Ok(DeviceTypes::from_bits_truncate(call!(self, LstDevGetTypes(kind.to_raw(), id))?))
    }

    fn lst_dev_has_server(&self, kind: IdKind, id: u32) -> SdkResult<bool> {
        Ok(call!(self, LstDevHasServer(kind.to_raw(), id))? != 0)
    }

    fn lst_dev_get_server(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        call!(self, LstDevGetServer(kind.to_raw(), id))
    }

    fn lst_open_oscilloscope(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        call!(self, LstOpenOscilloscope(kind.to_raw(), id))
    }

    fn lst_open_generator(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle> {
        call!(self, LstOpenGenerator(kind.to_raw(), id))
    }

    fn srv_get_url(&self, server: RawHandle) -> SdkResult<String> {
        self.read_string("SrvGetURL", |buffer, length| unsafe {
            (self.api.SrvGetURL)(server, buffer, length)
        })
    }

    fn srv_get_name(&self, server: RawHandle) -> SdkResult<String> {
        self.read_string("SrvGetName", |buffer, length| unsafe {
            (self.api.SrvGetName)(server, buffer, length)
        })
    }

    fn obj_close(&self, handle: RawHandle) -> SdkResult<()> {
        call!(self, ObjClose(handle)).map(drop)
    }

    fn obj_is_removed(&self, handle: RawHandle) -> SdkResult<bool> {
        Ok(call!(self, ObjIsRemoved(handle))? != 0)
    }

    fn dev_get_name(&self, device: RawHandle) -> SdkResult<String> {
        self.read_string("DevGetName", |buffer, length| unsafe {
            (self.api.DevGetName)(device, buffer, length)
        })
    }

    fn dev_get_serial_number(&self, device: RawHandle) -> SdkResult<u32> {
        call!(self, DevGetSerialNumber(device))
    }

    fn scp_get_channel_count(&self, scope: RawHandle) -> SdkResult<u16> {
        call!(self, ScpGetChannelCount(scope))
    }

    fn scp_get_measure_modes(&self, scope: RawHandle) -> SdkResult<MeasureModes> {
        Ok(MeasureModes::from_bits_truncate(call!(self, ScpGetMeasureModes(scope))?))
    }

    fn scp_get_measure_mode(&self, scope: RawHandle) -> SdkResult<u32> {
        call!(self, ScpGetMeasureMode(scope))
    }

    fn scp_set_measure_mode(&self, scope: RawHandle, mode: u32) -> SdkResult<u32> {
        call!(self, ScpSetMeasureMode(scope, mode))
    }

    fn scp_get_sample_frequency(&self, scope: RawHandle) -> SdkResult<f64> {
        call!(self, ScpGetSampleFrequency(scope))
    }

    fn scp_set_sample_frequency(&self, scope: RawHandle, frequency: f64) -> SdkResult<f64> {
        call!(self, ScpSetSampleFrequency(scope, frequency))
    }

    fn scp_get_record_length(&self, scope: RawHandle) -> SdkResult<u64> {
        call!(self, ScpGetRecordLength(scope))
    }

    fn scp_set_record_length(&self, scope: RawHandle, length: u64) -> SdkResult<u64> {
        call!(self, ScpSetRecordLength(scope, length))
    }

    fn scp_set_pre_sample_ratio(&self, scope: RawHandle, ratio: f64) -> SdkResult<f64> {
        call!(self, ScpSetPreSampleRatio(scope, ratio))
    }

    fn scp_set_trigger_time_out(&self, scope: RawHandle, seconds: f64) -> SdkResult<f64> {
        call!(self, ScpSetTriggerTimeOut(scope, seconds))
    }

    fn scp_ch_get_enabled(&self, scope: RawHandle, ch: u16) -> SdkResult<bool> {
        Ok(call!(self, ScpChGetEnabled(scope, ch))? != 0)
    }

    fn scp_ch_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool> {
        Ok(call!(self, ScpChSetEnabled(scope, ch, bool8(enable)))? != 0)
    }

    fn scp_ch_set_range(&self, scope: RawHandle, ch: u16, range: f64) -> SdkResult<f64> {
        call!(self, ScpChSetRange(scope, ch, range))
    }

    fn scp_ch_set_coupling(&self, scope: RawHandle, ch: u16, coupling: u64) -> SdkResult<u64> {
        call!(self, ScpChSetCoupling(scope, ch, coupling))
    }

    fn scp_ch_tr_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool> {
        Ok(call!(self, ScpChTrSetEnabled(scope, ch, bool8(enable)))? != 0)
    }

    fn scp_ch_tr_set_kind(&self, scope: RawHandle, ch: u16, kind: u64) -> SdkResult<u64> {
        call!(self, ScpChTrSetKind(scope, ch, kind))
    }

    fn scp_ch_tr_set_level(&self, scope: RawHandle, ch: u16, index: u32, level: f64) -> SdkResult<f64> {
        call!(self, ScpChTrSetLevel(scope, ch, index, level))
    }

    fn scp_ch_tr_set_hysteresis(
        &self,
        scope: RawHandle,
        ch: u16,
        index: u32,
        hysteresis: f64,
    ) -> SdkResult<f64> {
        call!(self, ScpChTrSetHysteresis(scope, ch, index, hysteresis))
    }

    fn scp_start(&self, scope: RawHandle) -> SdkResult<()> {
        call!(self, ScpStart(scope)).map(drop)
    }

    fn scp_stop(&self, scope: RawHandle) -> SdkResult<()> {
        call!(self, ScpStop(scope)).map(drop)
    }

    fn scp_is_data_ready(&self, scope: RawHandle) -> SdkResult<bool> {
        Ok(call!(self, ScpIsDataReady(scope))? != 0)
    }

    fn scp_get_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
        start: u64,
        count: u64,
    ) -> SdkResult<Vec<Vec<f32>>> {
        let mut buffers = (0..channel_count)
            .map(|_| sample_buffer("ScpGetData", count))
            .collect::<SdkResult<Vec<_>>>()?;
        let mut pointers: Vec<*mut f32> = buffers.iter_mut().map(|b| b.as_mut_ptr()).collect();

        let received = call!(
            self,
            ScpGetData(scope, pointers.as_mut_ptr(), channel_count, start, count)
        )?;

        let received = received.min(count) as usize;
        for buffer in &mut buffers {
            buffer.truncate(received);
        }
        Ok(buffers)
    }

    fn scp_has_connection_test(&self, scope: RawHandle) -> SdkResult<bool> {
        Ok(call!(self, ScpHasConnectionTest(scope))? != 0)
    }

    fn scp_ch_has_connection_test(&self, scope: RawHandle, ch: u16) -> SdkResult<bool> {
        Ok(call!(self, ScpChHasConnectionTest(scope, ch))? != 0)
    }

    fn scp_start_connection_test(&self, scope: RawHandle) -> SdkResult<()> {
        call!(self, ScpStartConnectionTest(scope)).map(drop)
    }

    fn scp_is_connection_test_completed(&self, scope: RawHandle) -> SdkResult<bool> {
        Ok(call!(self, ScpIsConnectionTestCompleted(scope))? != 0)
    }

    /// Entries the library leaves undefined, or does not write at all, stay
    /// [`TriState::Undefined`] rather than being folded into `false`.
    fn scp_get_connection_test_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
    ) -> SdkResult<Vec<TriState>> {
        let mut buffer = vec![0u8; usize::from(channel_count)];
        let written = call!(
            self,
            ScpGetConnectionTestData(scope, buffer.as_mut_ptr(), channel_count)
        )?;

        Ok(connection_test_states(&buffer, written))
    }

    fn gen_get_signal_types(&self, generator: RawHandle) -> SdkResult<SignalTypes> {
        Ok(SignalTypes::from_bits_truncate(call!(self, GenGetSignalTypes(generator))?))
    }

    fn gen_set_signal_type(&self, generator: RawHandle, signal_type: u32) -> SdkResult<u32> {
        call!(self, GenSetSignalType(generator, signal_type))
    }

    fn gen_set_frequency(&self, generator: RawHandle, frequency: f64) -> SdkResult<f64> {
        call!(self, GenSetFrequency(generator, frequency))
    }

    fn gen_set_amplitude(&self, generator: RawHandle, amplitude: f64) -> SdkResult<f64> {
        call!(self, GenSetAmplitude(generator, amplitude))
    }

    fn gen_set_offset(&self, generator: RawHandle, offset: f64) -> SdkResult<f64> {
        call!(self, GenSetOffset(generator, offset))
    }

    fn gen_set_output_on(&self, generator: RawHandle, on: bool) -> SdkResult<bool> {
        Ok(call!(self, GenSetOutputOn(generator, bool8(on)))? != 0)
    }

    fn gen_start(&self, generator: RawHandle) -> SdkResult<()> {
        call!(self, GenStart(generator)).map(drop)
    }

    fn gen_stop(&self, generator: RawHandle) -> SdkResult<()> {
        call!(self, GenStop(generator)).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_buffer_is_zeroed() {
        assert_eq!(sample_buffer("ScpGetData", 3).unwrap(), vec![0.0; 3]);
        assert!(sample_buffer("ScpGetData", 0).unwrap().is_empty());
    }

    #[test]
    fn test_connection_test_states_keep_undefined() {
        use crate::constants::{
            LIBTIEPIE_TRISTATE_FALSE, LIBTIEPIE_TRISTATE_TRUE, LIBTIEPIE_TRISTATE_UNDEFINED,
        };

        let buffer = [
            LIBTIEPIE_TRISTATE_TRUE,
            LIBTIEPIE_TRISTATE_UNDEFINED,
            LIBTIEPIE_TRISTATE_FALSE,
            LIBTIEPIE_TRISTATE_TRUE,
        ];
        assert_eq!(
            connection_test_states(&buffer, 3),
            vec![TriState::True, TriState::Undefined, TriState::False, TriState::Undefined]
        );
    }

    #[test]
    fn test_oversized_sample_buffer_is_an_error() {
        assert!(matches!(
            sample_buffer("ScpGetData", u64::MAX),
            Err(SdkError::BufferTooLarge { call: "ScpGetData", requested: u64::MAX })
        ));
    }
}

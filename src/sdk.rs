use crate::constants::{DeviceTypes, IdKind, MeasureModes, SignalTypes, Status, TriState};

/// Opaque object handle as handed out by the SDK.
pub type RawHandle = u32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    #[error("{call} failed with {status}: {message}")]
    Status {
        call: &'static str,
        status: Status,
        message: String,
    },

    #[error("{call} cannot buffer {requested} samples per channel")]
    BufferTooLarge { call: &'static str, requested: u64 },
}

impl SdkError {
    /// Library status behind the error, if the library reported one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::BufferTooLarge { .. } => None,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// The flat call surface of the instrument SDK.
///
/// One method per C entry point. Every method reports a negative
/// status of the underlying call as [`SdkError`]; nothing is validated
/// on this side of the boundary. Implementations hold all process-wide
/// SDK state (device list, network auto-detect flag, open objects).
pub trait Sdk {
    /// Library version as `major.minor.release.build`.
    fn lib_get_version(&self) -> SdkResult<String>;

    fn net_get_auto_detect_enabled(&self) -> SdkResult<bool>;
    fn net_set_auto_detect_enabled(&self, enable: bool) -> SdkResult<bool>;

    fn lst_update(&self) -> SdkResult<()>;
    fn lst_get_count(&self) -> SdkResult<u32>;
    fn lst_dev_can_open(&self, kind: IdKind, id: u32, types: DeviceTypes) -> SdkResult<bool>;
    fn lst_dev_get_name(&self, kind: IdKind, id: u32) -> SdkResult<String>;
    fn lst_dev_get_name_short(&self, kind: IdKind, id: u32) -> SdkResult<String>;
    fn lst_dev_get_serial_number(&self, kind: IdKind, id: u32) -> SdkResult<u32>;
    fn lst_dev_get_product_id(&self, kind: IdKind, id: u32) -> SdkResult<u32>;
    fn lst_dev_get_types(&self, kind: IdKind, id: u32) -> SdkResult<DeviceTypes>;
    fn lst_dev_has_server(&self, kind: IdKind, id: u32) -> SdkResult<bool>;
    fn lst_dev_get_server(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle>;
    fn lst_open_oscilloscope(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle>;
    fn lst_open_generator(&self, kind: IdKind, id: u32) -> SdkResult<RawHandle>;

    fn srv_get_url(&self, server: RawHandle) -> SdkResult<String>;
    fn srv_get_name(&self, server: RawHandle) -> SdkResult<String>;

    fn obj_close(&self, handle: RawHandle) -> SdkResult<()>;
    fn obj_is_removed(&self, handle: RawHandle) -> SdkResult<bool>;

    fn dev_get_name(&self, device: RawHandle) -> SdkResult<String>;
    fn dev_get_serial_number(&self, device: RawHandle) -> SdkResult<u32>;

    fn scp_get_channel_count(&self, scope: RawHandle) -> SdkResult<u16>;
    fn scp_get_measure_modes(&self, scope: RawHandle) -> SdkResult<MeasureModes>;
    fn scp_get_measure_mode(&self, scope: RawHandle) -> SdkResult<u32>;
    fn scp_set_measure_mode(&self, scope: RawHandle, mode: u32) -> SdkResult<u32>;
    fn scp_get_sample_frequency(&self, scope: RawHandle) -> SdkResult<f64>;
    fn scp_set_sample_frequency(&self, scope: RawHandle, frequency: f64) -> SdkResult<f64>;
    fn scp_get_record_length(&self, scope: RawHandle) -> SdkResult<u64>;
    fn scp_set_record_length(&self, scope: RawHandle, length: u64) -> SdkResult<u64>;
    fn scp_set_pre_sample_ratio(&self, scope: RawHandle, ratio: f64) -> SdkResult<f64>;
    fn scp_set_trigger_time_out(&self, scope: RawHandle, seconds: f64) -> SdkResult<f64>;

    fn scp_ch_get_enabled(&self, scope: RawHandle, ch: u16) -> SdkResult<bool>;
    fn scp_ch_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool>;
    fn scp_ch_set_range(&self, scope: RawHandle, ch: u16, range: f64) -> SdkResult<f64>;
    fn scp_ch_set_coupling(&self, scope: RawHandle, ch: u16, coupling: u64) -> SdkResult<u64>;

    fn scp_ch_tr_set_enabled(&self, scope: RawHandle, ch: u16, enable: bool) -> SdkResult<bool>;
    fn scp_ch_tr_set_kind(&self, scope: RawHandle, ch: u16, kind: u64) -> SdkResult<u64>;
    fn scp_ch_tr_set_level(&self, scope: RawHandle, ch: u16, index: u32, level: f64) -> SdkResult<f64>;
    fn scp_ch_tr_set_hysteresis(
        &self,
        scope: RawHandle,
        ch: u16,
        index: u32,
        hysteresis: f64,
    ) -> SdkResult<f64>;

    fn scp_start(&self, scope: RawHandle) -> SdkResult<()>;
    fn scp_stop(&self, scope: RawHandle) -> SdkResult<()>;
    fn scp_is_data_ready(&self, scope: RawHandle) -> SdkResult<bool>;

    /// Copies `count` samples starting at `start` for the first
    /// `channel_count` channels. Channels may come back shorter than
    /// `count` when the SDK has fewer samples available.
    fn scp_get_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
        start: u64,
        count: u64,
    ) -> SdkResult<Vec<Vec<f32>>>;

    fn scp_has_connection_test(&self, scope: RawHandle) -> SdkResult<bool>;
    fn scp_ch_has_connection_test(&self, scope: RawHandle, ch: u16) -> SdkResult<bool>;
    fn scp_start_connection_test(&self, scope: RawHandle) -> SdkResult<()>;
    fn scp_is_connection_test_completed(&self, scope: RawHandle) -> SdkResult<bool>;
    fn scp_get_connection_test_data(
        &self,
        scope: RawHandle,
        channel_count: u16,
    ) -> SdkResult<Vec<TriState>>;

    fn gen_get_signal_types(&self, generator: RawHandle) -> SdkResult<SignalTypes>;
    fn gen_set_signal_type(&self, generator: RawHandle, signal_type: u32) -> SdkResult<u32>;
    fn gen_set_frequency(&self, generator: RawHandle, frequency: f64) -> SdkResult<f64>;
    fn gen_set_amplitude(&self, generator: RawHandle, amplitude: f64) -> SdkResult<f64>;
    fn gen_set_offset(&self, generator: RawHandle, offset: f64) -> SdkResult<f64>;
    fn gen_set_output_on(&self, generator: RawHandle, on: bool) -> SdkResult<bool>;
    fn gen_start(&self, generator: RawHandle) -> SdkResult<()>;
    fn gen_stop(&self, generator: RawHandle) -> SdkResult<()>;
}

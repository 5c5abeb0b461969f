//! Integer constants of the LibTiePie C API and typed views on top of them.
//!
//! The raw values are passed across the FFI boundary as-is, so they must
//! stay identical to the ones in `libtiepie.h`.

use bitflags::bitflags;
use serde::Deserialize;

/// Value returned by the open calls when nothing could be opened.
pub const LIBTIEPIE_HANDLE_INVALID: u32 = 0;
/// Older name of [`LIBTIEPIE_HANDLE_INVALID`].
pub const TPDEVICEHANDLE_INVALID: u32 = LIBTIEPIE_HANDLE_INVALID;

pub const LIBTIEPIE_INTERFACE_DEVICE: u64 = 1 << 0;
pub const LIBTIEPIE_INTERFACE_OSCILLOSCOPE: u64 = 1 << 1;
pub const LIBTIEPIE_INTERFACE_GENERATOR: u64 = 1 << 2;
pub const LIBTIEPIE_INTERFACE_I2CHOST: u64 = 1 << 3;

pub const DEVICETYPE_OSCILLOSCOPE: u32 = 0x0000_0001;
pub const DEVICETYPE_GENERATOR: u32 = 0x0000_0002;
pub const DEVICETYPE_I2CHOST: u32 = 0x0000_0004;
pub const DEVICETYPE_COUNT: u32 = 3;

pub const IDKIND_PRODUCTID: u32 = 0x0000_0001;
pub const IDKIND_INDEX: u32 = 0x0000_0002;
pub const IDKIND_SERIALNUMBER: u32 = 0x0000_0004;
pub const IDKIND_COUNT: u32 = 3;

pub const MMN_COUNT: u32 = 2;
pub const MMB_STREAM: u32 = 0;
pub const MMB_BLOCK: u32 = 1;
pub const MM_UNKNOWN: u32 = 0;
pub const MM_STREAM: u32 = 1 << MMB_STREAM;
pub const MM_BLOCK: u32 = 1 << MMB_BLOCK;

pub const CKN_COUNT: u32 = 5;
pub const CKB_DCV: u32 = 0;
pub const CKB_ACV: u32 = 1;
pub const CKB_DCA: u32 = 2;
pub const CKB_ACA: u32 = 3;
pub const CKB_OHM: u32 = 4;
pub const CK_UNKNOWN: u64 = 0;
pub const CK_DCV: u64 = 1 << CKB_DCV;
pub const CK_ACV: u64 = 1 << CKB_ACV;
pub const CK_DCA: u64 = 1 << CKB_DCA;
pub const CK_ACA: u64 = 1 << CKB_ACA;
pub const CK_OHM: u64 = 1 << CKB_OHM;

pub const TKN_COUNT: u32 = 13;
pub const TKB_RISINGEDGE: u32 = 0;
pub const TKB_FALLINGEDGE: u32 = 1;
pub const TKB_INWINDOW: u32 = 2;
pub const TKB_OUTWINDOW: u32 = 3;
pub const TKB_ANYEDGE: u32 = 4;
pub const TKB_ENTERWINDOW: u32 = 5;
pub const TKB_EXITWINDOW: u32 = 6;
pub const TKB_PULSEWIDTHPOSITIVE: u32 = 7;
pub const TKB_PULSEWIDTHNEGATIVE: u32 = 8;
pub const TKB_PULSEWIDTHEITHER: u32 = 9;
pub const TKB_RUNTPULSEPOSITIVE: u32 = 10;
pub const TKB_RUNTPULSENEGATIVE: u32 = 11;
pub const TKB_RUNTPULSEEITHER: u32 = 12;
pub const TK_UNKNOWN: u64 = 0;
pub const TK_RISINGEDGE: u64 = 1 << TKB_RISINGEDGE;
pub const TK_FALLINGEDGE: u64 = 1 << TKB_FALLINGEDGE;
pub const TK_INWINDOW: u64 = 1 << TKB_INWINDOW;
pub const TK_OUTWINDOW: u64 = 1 << TKB_OUTWINDOW;
pub const TK_ANYEDGE: u64 = 1 << TKB_ANYEDGE;
pub const TK_ENTERWINDOW: u64 = 1 << TKB_ENTERWINDOW;
pub const TK_EXITWINDOW: u64 = 1 << TKB_EXITWINDOW;
pub const TK_PULSEWIDTHPOSITIVE: u64 = 1 << TKB_PULSEWIDTHPOSITIVE;
pub const TK_PULSEWIDTHNEGATIVE: u64 = 1 << TKB_PULSEWIDTHNEGATIVE;
pub const TK_PULSEWIDTHEITHER: u64 = 1 << TKB_PULSEWIDTHEITHER;
pub const TK_RUNTPULSEPOSITIVE: u64 = 1 << TKB_RUNTPULSEPOSITIVE;
pub const TK_RUNTPULSENEGATIVE: u64 = 1 << TKB_RUNTPULSENEGATIVE;
pub const TK_RUNTPULSEEITHER: u64 = 1 << TKB_RUNTPULSEEITHER;

pub const STN_COUNT: u32 = 7;
pub const STB_SINE: u32 = 0;
pub const STB_TRIANGLE: u32 = 1;
pub const STB_SQUARE: u32 = 2;
pub const STB_DC: u32 = 3;
pub const STB_NOISE: u32 = 4;
pub const STB_ARBITRARY: u32 = 5;
pub const STB_PULSE: u32 = 6;
pub const ST_UNKNOWN: u32 = 0;
pub const ST_SINE: u32 = 1 << STB_SINE;
pub const ST_TRIANGLE: u32 = 1 << STB_TRIANGLE;
pub const ST_SQUARE: u32 = 1 << STB_SQUARE;
pub const ST_DC: u32 = 1 << STB_DC;
pub const ST_NOISE: u32 = 1 << STB_NOISE;
pub const ST_ARBITRARY: u32 = 1 << STB_ARBITRARY;
pub const ST_PULSE: u32 = 1 << STB_PULSE;

pub const LIBTIEPIE_TRISTATE_UNDEFINED: u8 = 0;
pub const LIBTIEPIE_TRISTATE_FALSE: u8 = 1;
pub const LIBTIEPIE_TRISTATE_TRUE: u8 = 2;

pub const LIBTIEPIESTATUS_SUCCESS: i32 = 0;
pub const LIBTIEPIESTATUS_VALUE_CLIPPED: i32 = 1;
pub const LIBTIEPIESTATUS_VALUE_MODIFIED: i32 = 2;
pub const LIBTIEPIESTATUS_UNSUCCESSFUL: i32 = -1;
pub const LIBTIEPIESTATUS_NOT_SUPPORTED: i32 = -2;
pub const LIBTIEPIESTATUS_INVALID_HANDLE: i32 = -3;
pub const LIBTIEPIESTATUS_INVALID_VALUE: i32 = -4;
pub const LIBTIEPIESTATUS_INVALID_CHANNEL: i32 = -5;
pub const LIBTIEPIESTATUS_INVALID_TRIGGER_SOURCE: i32 = -6;
pub const LIBTIEPIESTATUS_INVALID_DEVICE_TYPE: i32 = -7;
pub const LIBTIEPIESTATUS_INVALID_DEVICE_INDEX: i32 = -8;
pub const LIBTIEPIESTATUS_INVALID_PRODUCT_ID: i32 = -9;
pub const LIBTIEPIESTATUS_INVALID_DEVICE_SERIALNUMBER: i32 = -10;
pub const LIBTIEPIESTATUS_OBJECT_GONE: i32 = -11;
pub const LIBTIEPIESTATUS_INTERNAL_ADDRESS: i32 = -12;
pub const LIBTIEPIESTATUS_NOT_CONTROLLABLE: i32 = -13;
pub const LIBTIEPIESTATUS_BIT_ERROR: i32 = -14;
pub const LIBTIEPIESTATUS_NO_ACKNOWLEDGE: i32 = -15;
pub const LIBTIEPIESTATUS_INVALID_CONTAINED_DEVICE_SERIALNUMBER: i32 = -16;
pub const LIBTIEPIESTATUS_INVALID_INPUT: i32 = -17;
pub const LIBTIEPIESTATUS_INVALID_OUTPUT: i32 = -18;
pub const LIBTIEPIESTATUS_INVALID_DRIVER: i32 = -19;
pub const LIBTIEPIESTATUS_NOT_AVAILABLE: i32 = -20;
pub const LIBTIEPIESTATUS_INVALID_FIRMWARE: i32 = -21;
pub const LIBTIEPIESTATUS_INVALID_INDEX: i32 = -22;
pub const LIBTIEPIESTATUS_INVALID_EEPROM: i32 = -23;
pub const LIBTIEPIESTATUS_INITIALIZATION_FAILED: i32 = -24;
pub const LIBTIEPIESTATUS_LIBRARY_NOT_INITIALIZED: i32 = -25;
pub const LIBTIEPIESTATUS_NO_TRIGGER_ENABLED: i32 = -26;
pub const LIBTIEPIESTATUS_SYNCHRONIZATION_FAILED: i32 = -29;
pub const LIBTIEPIESTATUS_INVALID_HS56_COMBINED_DEVICE: i32 = -30;
pub const LIBTIEPIESTATUS_MEASUREMENT_RUNNING: i32 = -31;

bitflags! {
    /// Instrument kinds a list entry can be opened as.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceTypes: u32 {
        const OSCILLOSCOPE = DEVICETYPE_OSCILLOSCOPE;
        const GENERATOR = DEVICETYPE_GENERATOR;
        const I2C_HOST = DEVICETYPE_I2CHOST;
    }
}

impl DeviceTypes {
    /// Human readable names of the contained types, in header order.
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::OSCILLOSCOPE, "Oscilloscope"),
            (Self::GENERATOR, "Generator"),
            (Self::I2C_HOST, "I2C Host"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

bitflags! {
    /// Set of measure modes an oscilloscope supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MeasureModes: u32 {
        const STREAM = MM_STREAM;
        const BLOCK = MM_BLOCK;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureMode {
    Stream,
    #[default]
    Block,
}

impl MeasureMode {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Stream => MM_STREAM,
            Self::Block => MM_BLOCK,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            MM_STREAM => Some(Self::Stream),
            MM_BLOCK => Some(Self::Block),
            _ => None,
        }
    }
}

bitflags! {
    /// Set of signal types a generator supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignalTypes: u32 {
        const SINE = ST_SINE;
        const TRIANGLE = ST_TRIANGLE;
        const SQUARE = ST_SQUARE;
        const DC = ST_DC;
        const NOISE = ST_NOISE;
        const ARBITRARY = ST_ARBITRARY;
        const PULSE = ST_PULSE;
    }
}

/// Waveform a generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    #[default]
    Sine,
    Triangle,
    Square,
    Dc,
    Noise,
    Arbitrary,
    Pulse,
}

impl SignalType {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Sine => ST_SINE,
            Self::Triangle => ST_TRIANGLE,
            Self::Square => ST_SQUARE,
            Self::Dc => ST_DC,
            Self::Noise => ST_NOISE,
            Self::Arbitrary => ST_ARBITRARY,
            Self::Pulse => ST_PULSE,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            ST_SINE => Self::Sine,
            ST_TRIANGLE => Self::Triangle,
            ST_SQUARE => Self::Square,
            ST_DC => Self::Dc,
            ST_NOISE => Self::Noise,
            ST_ARBITRARY => Self::Arbitrary,
            ST_PULSE => Self::Pulse,
            _ => return None,
        })
    }

    pub fn flag(self) -> SignalTypes {
        SignalTypes::from_bits_retain(self.to_raw())
    }
}

/// Input coupling of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    #[default]
    Dcv,
    Acv,
    Dca,
    Aca,
    Ohm,
}

impl Coupling {
    pub fn to_raw(self) -> u64 {
        match self {
            Self::Dcv => CK_DCV,
            Self::Acv => CK_ACV,
            Self::Dca => CK_DCA,
            Self::Aca => CK_ACA,
            Self::Ohm => CK_OHM,
        }
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            CK_DCV => Some(Self::Dcv),
            CK_ACV => Some(Self::Acv),
            CK_DCA => Some(Self::Dca),
            CK_ACA => Some(Self::Aca),
            CK_OHM => Some(Self::Ohm),
            _ => None,
        }
    }
}

/// Trigger condition of a channel trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    RisingEdge,
    FallingEdge,
    InWindow,
    OutWindow,
    AnyEdge,
    EnterWindow,
    ExitWindow,
    PulseWidthPositive,
    PulseWidthNegative,
    PulseWidthEither,
    RuntPulsePositive,
    RuntPulseNegative,
    RuntPulseEither,
}

impl TriggerKind {
    pub fn to_raw(self) -> u64 {
        match self {
            Self::RisingEdge => TK_RISINGEDGE,
            Self::FallingEdge => TK_FALLINGEDGE,
            Self::InWindow => TK_INWINDOW,
            Self::OutWindow => TK_OUTWINDOW,
            Self::AnyEdge => TK_ANYEDGE,
            Self::EnterWindow => TK_ENTERWINDOW,
            Self::ExitWindow => TK_EXITWINDOW,
            Self::PulseWidthPositive => TK_PULSEWIDTHPOSITIVE,
            Self::PulseWidthNegative => TK_PULSEWIDTHNEGATIVE,
            Self::PulseWidthEither => TK_PULSEWIDTHEITHER,
            Self::RuntPulsePositive => TK_RUNTPULSEPOSITIVE,
            Self::RuntPulseNegative => TK_RUNTPULSENEGATIVE,
            Self::RuntPulseEither => TK_RUNTPULSEEITHER,
        }
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        Some(match raw {
            TK_RISINGEDGE => Self::RisingEdge,
            TK_FALLINGEDGE => Self::FallingEdge,
            TK_INWINDOW => Self::InWindow,
            TK_OUTWINDOW => Self::OutWindow,
            TK_ANYEDGE => Self::AnyEdge,
            TK_ENTERWINDOW => Self::EnterWindow,
            TK_EXITWINDOW => Self::ExitWindow,
            TK_PULSEWIDTHPOSITIVE => Self::PulseWidthPositive,
            TK_PULSEWIDTHNEGATIVE => Self::PulseWidthNegative,
            TK_PULSEWIDTHEITHER => Self::PulseWidthEither,
            TK_RUNTPULSEPOSITIVE => Self::RuntPulsePositive,
            TK_RUNTPULSENEGATIVE => Self::RuntPulseNegative,
            TK_RUNTPULSEEITHER => Self::RuntPulseEither,
            _ => return None,
        })
    }
}

/// How a list entry is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    ProductId,
    Index,
    SerialNumber,
}

impl IdKind {
    pub fn to_raw(self) -> u32 {
        match self {
            Self::ProductId => IDKIND_PRODUCTID,
            Self::Index => IDKIND_INDEX,
            Self::SerialNumber => IDKIND_SERIALNUMBER,
        }
    }
}

/// Per-channel outcome of a connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriState {
    #[default]
    Undefined,
    False,
    True,
}

impl TriState {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            LIBTIEPIE_TRISTATE_FALSE => Self::False,
            LIBTIEPIE_TRISTATE_TRUE => Self::True,
            _ => Self::Undefined,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Undefined => None,
            Self::False => Some(false),
            Self::True => Some(true),
        }
    }
}

impl std::fmt::Display for TriState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::False => write!(f, "false"),
            Self::True => write!(f, "true"),
        }
    }
}

/// Result code of the most recent SDK call.
///
/// Negative values are errors, positive values are warnings about a
/// value that was clipped or modified to fit the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Self = Self(LIBTIEPIESTATUS_SUCCESS);

    pub fn is_error(self) -> bool {
        self.0 < LIBTIEPIESTATUS_SUCCESS
    }

    pub fn is_warning(self) -> bool {
        self.0 > LIBTIEPIESTATUS_SUCCESS
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            LIBTIEPIESTATUS_SUCCESS => "SUCCESS",
            LIBTIEPIESTATUS_VALUE_CLIPPED => "VALUE_CLIPPED",
            LIBTIEPIESTATUS_VALUE_MODIFIED => "VALUE_MODIFIED",
            LIBTIEPIESTATUS_UNSUCCESSFUL => "UNSUCCESSFUL",
            LIBTIEPIESTATUS_NOT_SUPPORTED => "NOT_SUPPORTED",
            LIBTIEPIESTATUS_INVALID_HANDLE => "INVALID_HANDLE",
            LIBTIEPIESTATUS_INVALID_VALUE => "INVALID_VALUE",
            LIBTIEPIESTATUS_INVALID_CHANNEL => "INVALID_CHANNEL",
            LIBTIEPIESTATUS_INVALID_TRIGGER_SOURCE => "INVALID_TRIGGER_SOURCE",
            LIBTIEPIESTATUS_INVALID_DEVICE_TYPE => "INVALID_DEVICE_TYPE",
            LIBTIEPIESTATUS_INVALID_DEVICE_INDEX => "INVALID_DEVICE_INDEX",
            LIBTIEPIESTATUS_INVALID_PRODUCT_ID => "INVALID_PRODUCT_ID",
            LIBTIEPIESTATUS_INVALID_DEVICE_SERIALNUMBER => "INVALID_DEVICE_SERIALNUMBER",
            LIBTIEPIESTATUS_OBJECT_GONE => "OBJECT_GONE",
            LIBTIEPIESTATUS_INTERNAL_ADDRESS => "INTERNAL_ADDRESS",
            LIBTIEPIESTATUS_NOT_CONTROLLABLE => "NOT_CONTROLLABLE",
            LIBTIEPIESTATUS_BIT_ERROR => "BIT_ERROR",
            LIBTIEPIESTATUS_NO_ACKNOWLEDGE => "NO_ACKNOWLEDGE",
            LIBTIEPIESTATUS_INVALID_CONTAINED_DEVICE_SERIALNUMBER => {
                "INVALID_CONTAINED_DEVICE_SERIALNUMBER"
            }
            LIBTIEPIESTATUS_INVALID_INPUT => "INVALID_INPUT",
            LIBTIEPIESTATUS_INVALID_OUTPUT => "INVALID_OUTPUT",
            LIBTIEPIESTATUS_INVALID_DRIVER => "INVALID_DRIVER",
            LIBTIEPIESTATUS_NOT_AVAILABLE => "NOT_AVAILABLE",
            LIBTIEPIESTATUS_INVALID_FIRMWARE => "INVALID_FIRMWARE",
            LIBTIEPIESTATUS_INVALID_INDEX => "INVALID_INDEX",
            LIBTIEPIESTATUS_INVALID_EEPROM => "INVALID_EEPROM",
            LIBTIEPIESTATUS_INITIALIZATION_FAILED => "INITIALIZATION_FAILED",
            LIBTIEPIESTATUS_LIBRARY_NOT_INITIALIZED => "LIBRARY_NOT_INITIALIZED",
            LIBTIEPIESTATUS_NO_TRIGGER_ENABLED => "NO_TRIGGER_ENABLED",
            LIBTIEPIESTATUS_SYNCHRONIZATION_FAILED => "SYNCHRONIZATION_FAILED",
            LIBTIEPIESTATUS_INVALID_HS56_COMBINED_DEVICE => "INVALID_HS56_COMBINED_DEVICE",
            LIBTIEPIESTATUS_MEASUREMENT_RUNNING => "MEASUREMENT_RUNNING",
            _ => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_values() {
        assert_eq!(TPDEVICEHANDLE_INVALID, 0);
        assert_eq!(IDKIND_INDEX, 2);
        assert_eq!(IDKIND_SERIALNUMBER, 4);
        assert_eq!(MM_BLOCK, 2);
        assert_eq!(CK_DCV, 1);
        assert_eq!(TK_RISINGEDGE, 1);
        assert_eq!(TK_RUNTPULSEEITHER, 0x1000);
        assert_eq!(ST_SINE, 1);
        assert_eq!(ST_PULSE, 0x40);
    }

    #[test]
    fn test_device_type_names() {
        let types = DeviceTypes::OSCILLOSCOPE | DeviceTypes::I2C_HOST;
        assert_eq!(types.names(), vec!["Oscilloscope", "I2C Host"]);
        assert!(DeviceTypes::from_bits_truncate(0).names().is_empty());
    }

    #[test]
    fn test_enum_raw_values() {
        for kind in [TriggerKind::RisingEdge, TriggerKind::ExitWindow, TriggerKind::RuntPulseEither] {
            assert_eq!(TriggerKind::from_raw(kind.to_raw()), Some(kind));
        }
        assert_eq!(Coupling::from_raw(CK_OHM), Some(Coupling::Ohm));
        assert_eq!(Coupling::from_raw(CK_UNKNOWN), None);
        assert_eq!(MeasureMode::from_raw(MM_UNKNOWN), None);
        assert_eq!(SignalType::from_raw(ST_PULSE), Some(SignalType::Pulse));
        assert_eq!(SignalType::from_raw(ST_UNKNOWN), None);
        assert!(SignalTypes::all().contains(SignalType::Dc.flag()));
    }

    #[test]
    fn test_status() {
        assert!(Status(LIBTIEPIESTATUS_INVALID_VALUE).is_error());
        assert!(Status(LIBTIEPIESTATUS_VALUE_CLIPPED).is_warning());
        assert!(!Status::SUCCESS.is_error());
        assert_eq!(Status(LIBTIEPIESTATUS_OBJECT_GONE).to_string(), "OBJECT_GONE (-11)");
        assert_eq!(TriState::from_raw(LIBTIEPIE_TRISTATE_TRUE).as_bool(), Some(true));
        assert_eq!(TriState::from_raw(7), TriState::Undefined);
    }
}

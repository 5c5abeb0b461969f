use crate::constants::{DeviceTypes, IdKind, MeasureModes};
use crate::context::TiePie;
use crate::generator::Generator;
use crate::handle::Handle;
use crate::scope::Oscilloscope;
use crate::sdk::{Sdk, SdkError, SdkResult};

/// Addresses one entry of the device list.
///
/// Index and serial number keys are interchangeable ways to reach the
/// same entry. Indices are only valid until the next list update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKey {
    Index(u32),
    SerialNumber(u32),
    ProductId(u32),
}

impl DeviceKey {
    pub fn id_kind(self) -> (IdKind, u32) {
        match self {
            Self::Index(index) => (IdKind::Index, index),
            Self::SerialNumber(serial) => (IdKind::SerialNumber, serial),
            Self::ProductId(product) => (IdKind::ProductId, product),
        }
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index {}", index),
            Self::SerialNumber(serial) => write!(f, "serial number {}", serial),
            Self::ProductId(product) => write!(f, "product id {}", product),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceListError {
    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("Device index {index} out of range, the list has {count} entries")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("Device at {key} has no server")]
    NoServer { key: DeviceKey },

    #[error("Device at {key} could not be opened as {types:?}")]
    OpenFailed { key: DeviceKey, types: DeviceTypes },

    #[error("No device matched the requested capabilities")]
    NoCapableDevice,
}

/// Snapshot of one list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub name_short: String,
    pub serial_number: u32,
    pub product_id: u32,
    pub types: DeviceTypes,
    pub has_server: bool,
}

/// A network server object an instrument is reached through.
#[derive(Debug)]
pub struct Server<'a, S: Sdk> {
    handle: Handle<'a, S>,
}

impl<S: Sdk> Server<'_, S> {
    pub fn url(&self) -> SdkResult<String> {
        self.handle.sdk().srv_get_url(self.handle.raw())
    }

    pub fn name(&self) -> SdkResult<String> {
        self.handle.sdk().srv_get_name(self.handle.raw())
    }

    pub fn close(self) -> SdkResult<()> {
        self.handle.close()
    }
}

impl<S: Sdk> TiePie<S> {
    /// Rejects index keys beyond the current list before they reach the SDK.
    fn check_key(&self, key: DeviceKey) -> Result<(IdKind, u32), DeviceListError> {
        if let DeviceKey::Index(index) = key {
            let count = self.device_count()?;
            if index >= count {
                return Err(DeviceListError::IndexOutOfRange { index, count });
            }
        }
        Ok(key.id_kind())
    }

    pub fn can_open(&self, key: DeviceKey, types: DeviceTypes) -> Result<bool, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        Ok(self.sdk().lst_dev_can_open(kind, id, types)?)
    }

    pub fn device_name(&self, key: DeviceKey) -> Result<String, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        Ok(self.sdk().lst_dev_get_name(kind, id)?)
    }

    pub fn device_serial_number(&self, key: DeviceKey) -> Result<u32, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        Ok(self.sdk().lst_dev_get_serial_number(kind, id)?)
    }

    pub fn device_types(&self, key: DeviceKey) -> Result<DeviceTypes, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        Ok(self.sdk().lst_dev_get_types(kind, id)?)
    }

    pub fn device_has_server(&self, key: DeviceKey) -> Result<bool, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        Ok(self.sdk().lst_dev_has_server(kind, id)?)
    }

    pub fn device_info(&self, key: DeviceKey) -> Result<DeviceInfo, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        let sdk = self.sdk();
        Ok(DeviceInfo {
            name: sdk.lst_dev_get_name(kind, id)?,
            name_short: sdk.lst_dev_get_name_short(kind, id)?,
            serial_number: sdk.lst_dev_get_serial_number(kind, id)?,
            product_id: sdk.lst_dev_get_product_id(kind, id)?,
            types: sdk.lst_dev_get_types(kind, id)?,
            has_server: sdk.lst_dev_has_server(kind, id)?,
        })
    }

    /// Info for every entry currently in the list.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>, DeviceListError> {
        (0..self.device_count()?)
            .map(|index| self.device_info(DeviceKey::Index(index)))
            .collect()
    }

    /// Opens the server an entry is reached through.
    pub fn server(&self, key: DeviceKey) -> Result<Server<'_, S>, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        if !self.sdk().lst_dev_has_server(kind, id)? {
            return Err(DeviceListError::NoServer { key });
        }
        let raw = self.sdk().lst_dev_get_server(kind, id)?;
        let handle = Handle::new(self.sdk(), raw).ok_or(DeviceListError::NoServer { key })?;
        Ok(Server { handle })
    }

    pub fn open_oscilloscope(&self, key: DeviceKey) -> Result<Oscilloscope<'_, S>, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        let raw = self.sdk().lst_open_oscilloscope(kind, id)?;
        let handle = Handle::new(self.sdk(), raw).ok_or(DeviceListError::OpenFailed {
            key,
            types: DeviceTypes::OSCILLOSCOPE,
        })?;
        log::debug!("Opened oscilloscope at {} as handle {}", key, handle.raw());
        Ok(Oscilloscope::from_handle(handle)?)
    }

    pub fn open_generator(&self, key: DeviceKey) -> Result<Generator<'_, S>, DeviceListError> {
        let (kind, id) = self.check_key(key)?;
        let raw = self.sdk().lst_open_generator(kind, id)?;
        let handle = Handle::new(self.sdk(), raw).ok_or(DeviceListError::OpenFailed {
            key,
            types: DeviceTypes::GENERATOR,
        })?;
        log::debug!("Opened generator at {} as handle {}", key, handle.raw());
        Ok(Generator::from_handle(handle))
    }

    /// Opens the first listed entry that can act as a generator.
    pub fn find_generator(&self) -> Result<Generator<'_, S>, DeviceListError> {
        for index in 0..self.device_count()? {
            let key = DeviceKey::Index(index);
            if !self.can_open(key, DeviceTypes::GENERATOR)? {
                continue;
            }
            match self.open_generator(key) {
                Ok(generator) => return Ok(generator),
                Err(DeviceListError::OpenFailed { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DeviceListError::NoCapableDevice)
    }

    /// Opens the first listed oscilloscope `accept` agrees to.
    ///
    /// Entries that cannot be opened as an oscilloscope are skipped;
    /// opened scopes that are not accepted are closed again.
    pub fn find_oscilloscope<'t, F>(&'t self, mut accept: F) -> Result<Oscilloscope<'t, S>, DeviceListError>
    where
        F: FnMut(&Oscilloscope<'t, S>) -> SdkResult<bool>,
    {
        for index in 0..self.device_count()? {
            let key = DeviceKey::Index(index);
            if !self.can_open(key, DeviceTypes::OSCILLOSCOPE)? {
                continue;
            }
            let scope = match self.open_oscilloscope(key) {
                Ok(scope) => scope,
                Err(DeviceListError::OpenFailed { .. }) => continue,
                Err(e) => return Err(e),
            };
            if accept(&scope)? {
                return Ok(scope);
            }
            log::debug!("Oscilloscope at {} rejected, closing", key);
        }
        Err(DeviceListError::NoCapableDevice)
    }

    pub fn find_block_oscilloscope(&self) -> Result<Oscilloscope<'_, S>, DeviceListError> {
        self.find_oscilloscope(|scope| Ok(scope.measure_modes()?.contains(MeasureModes::BLOCK)))
    }

    pub fn find_connection_test_oscilloscope(&self) -> Result<Oscilloscope<'_, S>, DeviceListError> {
        self.find_oscilloscope(|scope| scope.has_connection_test())
    }
}

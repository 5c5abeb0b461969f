use crate::sdk::{Sdk, SdkResult};

/// Entry point to an instrument SDK.
///
/// Owns the SDK implementation and with it the process-wide device list
/// and network auto-detect flag. Everything opened through the context
/// borrows it, so no handle can outlive the library it came from.
#[derive(Debug)]
pub struct TiePie<S: Sdk> {
    sdk: S,
}

impl<S: Sdk> TiePie<S> {
    pub fn new(sdk: S) -> Self {
        Self { sdk }
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn into_inner(self) -> S {
        self.sdk
    }

    pub fn version(&self) -> SdkResult<String> {
        self.sdk.lib_get_version()
    }

    pub fn network_auto_detect(&self) -> SdkResult<bool> {
        self.sdk.net_get_auto_detect_enabled()
    }

    /// Include network instruments in the following list updates.
    pub fn set_network_auto_detect(&self, enable: bool) -> SdkResult<bool> {
        log::debug!("Network auto detect: {}", enable);
        self.sdk.net_set_auto_detect_enabled(enable)
    }

    pub fn update_list(&self) -> SdkResult<()> {
        self.sdk.lst_update()?;
        log::debug!("Device list updated, {} entries", self.sdk.lst_get_count()?);
        Ok(())
    }

    pub fn device_count(&self) -> SdkResult<u32> {
        self.sdk.lst_get_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDevice, FakeSdk};

    #[test]
    fn test_count_follows_update() {
        for n in 0..4u32 {
            let mut sdk = FakeSdk::new();
            for i in 0..n {
                sdk = sdk.with_device(FakeDevice::oscilloscope("HS5", 100 + i));
            }
            let tiepie = TiePie::new(sdk);
            assert_eq!(tiepie.device_count().unwrap(), 0);
            tiepie.update_list().unwrap();
            assert_eq!(tiepie.device_count().unwrap(), n);
        }
    }

    #[test]
    fn test_network_auto_detect_flag() {
        let tiepie = TiePie::new(FakeSdk::new());
        assert!(!tiepie.network_auto_detect().unwrap());
        assert!(tiepie.set_network_auto_detect(true).unwrap());
        assert!(tiepie.network_auto_detect().unwrap());
    }

    #[test]
    fn test_network_devices_need_auto_detect() {
        let sdk = FakeSdk::new()
            .with_device(FakeDevice::oscilloscope("HS5", 1))
            .with_device(FakeDevice::oscilloscope("WS6", 2).on_network("network://10.0.0.2/", "Lab"));
        let tiepie = TiePie::new(sdk);

        tiepie.update_list().unwrap();
        assert_eq!(tiepie.device_count().unwrap(), 1);

        tiepie.set_network_auto_detect(true).unwrap();
        tiepie.update_list().unwrap();
        assert_eq!(tiepie.device_count().unwrap(), 2);
    }

    #[test]
    fn test_version() {
        let tiepie = TiePie::new(FakeSdk::new());
        assert_eq!(tiepie.version().unwrap(), "0.9.16.0");
    }
}

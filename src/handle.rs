use crate::constants::LIBTIEPIE_HANDLE_INVALID;
use crate::sdk::{RawHandle, Sdk, SdkResult};

/// An open SDK object that is closed exactly once.
///
/// The handle borrows the SDK it came from, so it cannot outlive the
/// context. Dropping it closes the object; use [`Handle::close`] to see
/// the outcome of the close call.
#[derive(Debug)]
pub struct Handle<'a, S: Sdk> {
    sdk: &'a S,
    raw: RawHandle,
    closed: bool,
}

impl<'a, S: Sdk> Handle<'a, S> {
    /// Takes ownership of `raw`, or `None` for the invalid-handle sentinel.
    pub fn new(sdk: &'a S, raw: RawHandle) -> Option<Self> {
        if raw == LIBTIEPIE_HANDLE_INVALID {
            return None;
        }
        Some(Self {
            sdk,
            raw,
            closed: false,
        })
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn sdk(&self) -> &'a S {
        self.sdk
    }

    pub fn is_removed(&self) -> SdkResult<bool> {
        self.sdk.obj_is_removed(self.raw)
    }

    pub fn close(mut self) -> SdkResult<()> {
        self.closed = true;
        log::debug!("Closing handle {}", self.raw);
        self.sdk.obj_close(self.raw)
    }
}

impl<S: Sdk> Drop for Handle<'_, S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::debug!("Closing handle {} on drop", self.raw);
        if let Err(e) = self.sdk.obj_close(self.raw) {
            log::warn!("Failed to close handle {}: {}", self.raw, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeDevice, FakeSdk};
    use crate::constants::IdKind;

    fn sdk_with_scope() -> FakeSdk {
        let sdk = FakeSdk::new().with_device(FakeDevice::oscilloscope("HS5", 1001));
        sdk.lst_update().unwrap();
        sdk
    }

    #[test]
    fn test_sentinel_is_rejected() {
        let sdk = sdk_with_scope();
        assert!(Handle::new(&sdk, LIBTIEPIE_HANDLE_INVALID).is_none());
        assert_eq!(sdk.opened_count(), 0);
    }

    #[test]
    fn test_drop_closes_once() {
        let sdk = sdk_with_scope();
        {
            let raw = sdk.lst_open_oscilloscope(IdKind::Index, 0).unwrap();
            let _handle = Handle::new(&sdk, raw).unwrap();
            assert_eq!(sdk.leaked_handles(), vec![raw]);
        }
        assert!(sdk.leaked_handles().is_empty());
        assert_eq!(sdk.closed_count(), 1);
        assert_eq!(sdk.invalid_close_count(), 0);
    }

    #[test]
    fn test_explicit_close_skips_drop() {
        let sdk = sdk_with_scope();
        let raw = sdk.lst_open_oscilloscope(IdKind::Index, 0).unwrap();
        let handle = Handle::new(&sdk, raw).unwrap();
        handle.close().unwrap();
        assert_eq!(sdk.closed_count(), 1);
        assert_eq!(sdk.invalid_close_count(), 0);
    }

    #[test]
    fn test_unreleased_handle_is_flagged() {
        let sdk = sdk_with_scope();
        let raw = sdk.lst_open_oscilloscope(IdKind::Index, 0).unwrap();
        let handle = Handle::new(&sdk, raw).unwrap();
        std::mem::forget(handle);
        assert_eq!(sdk.leaked_handles(), vec![raw]);
    }
}

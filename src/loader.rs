//! Finding and loading the native library.
//!
//! On Windows the library ships next to the application under
//! `deps/libtiepie/win/<arch>/`; everywhere else it is installed system
//! wide and found through the regular loader search path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::LoaderSettings;
use crate::constants::Status;
use crate::context::TiePie;
use crate::native::NativeSdk;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Library not found at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("No library location known for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Failed to load {}: {source}", .target.to_string_lossy())]
    Open {
        target: OsString,
        source: libloading::Error,
    },

    #[error("Library lacks symbol {symbol}: {source}")]
    Symbol {
        symbol: &'static str,
        source: libloading::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library initialization failed with {status}")]
    InitializationFailed { status: Status },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryLocation {
    /// Path relative to the base directory.
    Bundled(PathBuf),
    /// File name handed to the system loader.
    System(OsString),
}

/// Maps an `os`/`arch` pair to a location. `None` matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorRule {
    pub os: Option<&'static str>,
    pub arch: Option<&'static str>,
    pub location: LibraryLocation,
}

impl LocatorRule {
    fn matches(&self, os: &str, arch: &str) -> bool {
        self.os.is_none_or(|o| o == os) && self.arch.is_none_or(|a| a == arch)
    }
}

/// Ordered rule table; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLocator {
    rules: Vec<LocatorRule>,
}

impl Default for LibraryLocator {
    fn default() -> Self {
        Self::new(vec![
            LocatorRule {
                os: Some("windows"),
                arch: Some("x86_64"),
                location: LibraryLocation::Bundled(PathBuf::from("deps/libtiepie/win/x86-64/libtiepie.dll")),
            },
            LocatorRule {
                os: Some("windows"),
                arch: Some("x86"),
                location: LibraryLocation::Bundled(PathBuf::from("deps/libtiepie/win/x86/libtiepie.dll")),
            },
            LocatorRule {
                os: None,
                arch: None,
                location: LibraryLocation::System(libloading::library_filename("tiepie")),
            },
        ])
    }
}

impl LibraryLocator {
    pub fn new(rules: Vec<LocatorRule>) -> Self {
        Self { rules }
    }

    pub fn select(&self, os: &str, arch: &str) -> Option<&LibraryLocation> {
        self.rules
            .iter()
            .find(|rule| rule.matches(os, arch))
            .map(|rule| &rule.location)
    }

    pub fn current(&self) -> Option<&LibraryLocation> {
        self.select(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// What to hand to the system loader for this host.
    pub fn resolve(&self, settings: &LoaderSettings) -> Result<OsString, LoaderError> {
        if let Some(path) = &settings.library_path {
            return Ok(path.clone().into_os_string());
        }

        let location = self.current().ok_or_else(|| LoaderError::UnsupportedPlatform {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })?;

        match location {
            LibraryLocation::System(name) => Ok(name.clone()),
            LibraryLocation::Bundled(relative) => {
                let base = match &settings.base_dir {
                    Some(dir) => dir.clone(),
                    None => executable_dir()?,
                };
                let path = base.join(relative);
                if !path.is_file() {
                    return Err(LoaderError::NotFound { path });
                }
                Ok(path.into_os_string())
            }
        }
    }
}

fn executable_dir() -> Result<PathBuf, LoaderError> {
    let exe = std::env::current_exe()?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Loads and initializes the library for this host.
///
/// The library is de-initialized again when the returned context is dropped.
pub fn load(settings: &LoaderSettings) -> Result<TiePie<NativeSdk>, LoaderError> {
    load_with(&LibraryLocator::default(), settings)
}

/// [`load`] with a caller supplied rule table.
pub fn load_with(locator: &LibraryLocator, settings: &LoaderSettings) -> Result<TiePie<NativeSdk>, LoaderError> {
    let target = locator.resolve(settings)?;
    log::info!("Loading LibTiePie from {}", target.to_string_lossy());
    let sdk = NativeSdk::open(&target)?;
    Ok(TiePie::new(sdk))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let locator = LibraryLocator::default();
        assert_eq!(
            locator.select("windows", "x86_64"),
            Some(&LibraryLocation::Bundled(PathBuf::from(
                "deps/libtiepie/win/x86-64/libtiepie.dll"
            )))
        );
        assert_eq!(
            locator.select("windows", "x86"),
            Some(&LibraryLocation::Bundled(PathBuf::from("deps/libtiepie/win/x86/libtiepie.dll")))
        );
        assert!(matches!(
            locator.select("linux", "aarch64"),
            Some(LibraryLocation::System(_))
        ));
    }

    #[test]
    fn test_empty_table_is_unsupported() {
        let locator = LibraryLocator::new(Vec::new());
        assert_eq!(locator.select("linux", "x86_64"), None);
        assert!(matches!(
            locator.resolve(&LoaderSettings::default()),
            Err(LoaderError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let settings = LoaderSettings {
            base_dir: None,
            library_path: Some(PathBuf::from("/opt/tiepie/libtiepie.so.0")),
        };
        assert_eq!(
            LibraryLocator::new(Vec::new()).resolve(&settings).unwrap(),
            OsString::from("/opt/tiepie/libtiepie.so.0")
        );
    }

    #[test]
    fn test_load_uses_given_table() {
        let dir = tempfile::tempdir().unwrap();
        let locator = LibraryLocator::new(vec![LocatorRule {
            os: None,
            arch: None,
            location: LibraryLocation::Bundled(PathBuf::from("missing/libtiepie.dll")),
        }]);
        let settings = LoaderSettings {
            base_dir: Some(dir.path().to_path_buf()),
            library_path: None,
        };

        match load_with(&locator, &settings) {
            Err(LoaderError::NotFound { path }) => assert_eq!(path, dir.path().join("missing/libtiepie.dll")),
            other => unreachable!("expected NotFound, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            load_with(&LibraryLocator::new(Vec::new()), &LoaderSettings::default()),
            Err(LoaderError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_bundled_path_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let locator = LibraryLocator::new(vec![LocatorRule {
            os: None,
            arch: None,
            location: LibraryLocation::Bundled(PathBuf::from("deps/libtiepie.dll")),
        }]);
        let settings = LoaderSettings {
            base_dir: Some(dir.path().to_path_buf()),
            library_path: None,
        };

        assert!(matches!(locator.resolve(&settings), Err(LoaderError::NotFound { .. })));

        std::fs::create_dir(dir.path().join("deps")).unwrap();
        std::fs::write(dir.path().join("deps/libtiepie.dll"), b"").unwrap();
        assert_eq!(
            locator.resolve(&settings).unwrap(),
            dir.path().join("deps/libtiepie.dll").into_os_string()
        );
    }
}

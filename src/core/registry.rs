//! Purpose: External key-value lookup used to find the application's install directory.
//! Exports: `ConfigLookup`, `Registry`, `NoRegistry`, `system_lookup`.
//! Role: Injected into `Locator` so resolution never touches the OS in tests.
//! Invariants: Lookups never fail loudly; any OS error reads as "not configured".
//! Invariants: Windows reads HKEY_CURRENT_USER through the 64-bit view, REG_SZ only.
use std::ffi::OsString;

pub trait ConfigLookup {
    fn string_value(&self, key: &str, value: &str) -> Option<OsString>;
}

/// Per-user Windows registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Registry;

/// Lookup for platforms without a configuration registry.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRegistry;

impl ConfigLookup for NoRegistry {
    fn string_value(&self, _key: &str, _value: &str) -> Option<OsString> {
        None
    }
}

#[cfg(windows)]
pub fn system_lookup() -> Registry {
    Registry
}

#[cfg(not(windows))]
pub fn system_lookup() -> NoRegistry {
    NoRegistry
}

#[cfg(windows)]
impl ConfigLookup for Registry {
    fn string_value(&self, key: &str, value: &str) -> Option<OsString> {
        use crate::core::wide::to_wide_nul;
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStringExt;
        use windows_sys::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SUCCESS};
        use windows_sys::Win32::System::Registry::{
            HKEY_CURRENT_USER, REG_SZ, RRF_RT_REG_SZ, RRF_SUBKEY_WOW6464KEY, RRF_ZEROONFAILURE,
            RegGetValueW,
        };

        let key_w = to_wide_nul(OsStr::new(key));
        let value_w = to_wide_nul(OsStr::new(value));
        let mut buf = vec![0u16; 260];

        loop {
            let mut reg_type = REG_SZ;
            let mut byte_count = (buf.len() * size_of::<u16>()) as u32;
            let status = unsafe {
                RegGetValueW(
                    HKEY_CURRENT_USER,
                    key_w.as_ptr(),
                    value_w.as_ptr(),
                    RRF_RT_REG_SZ | RRF_SUBKEY_WOW6464KEY | RRF_ZEROONFAILURE,
                    &mut reg_type,
                    buf.as_mut_ptr().cast(),
                    &mut byte_count,
                )
            };
            if status == ERROR_MORE_DATA {
                buf.resize((byte_count as usize).div_ceil(size_of::<u16>()), 0);
                continue;
            }
            if status != ERROR_SUCCESS || reg_type != REG_SZ || byte_count == 0 {
                return None;
            }

            let units = (byte_count as usize / size_of::<u16>()).min(buf.len());
            let mut text = &buf[..units];
            while let [rest @ .., 0] = text {
                text = rest;
            }
            if text.is_empty() {
                return None;
            }
            return Some(OsString::from_wide(text));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{ConfigLookup, NoRegistry};
    use std::collections::HashMap;
    use std::ffi::OsString;

    /// In-memory lookup keyed by `(key, value)`.
    #[derive(Default)]
    pub(crate) struct MapLookup(pub HashMap<(String, String), OsString>);

    impl MapLookup {
        pub(crate) fn with(mut self, key: &str, value: &str, data: impl Into<OsString>) -> Self {
            self.0
                .insert((key.to_string(), value.to_string()), data.into());
            self
        }
    }

    impl ConfigLookup for MapLookup {
        fn string_value(&self, key: &str, value: &str) -> Option<OsString> {
            self.0.get(&(key.to_string(), value.to_string())).cloned()
        }
    }

    #[test]
    fn no_registry_is_always_empty() {
        assert!(NoRegistry.string_value("Software", "Anything").is_none());
    }

    #[test]
    fn map_lookup_matches_key_and_value() {
        let lookup = MapLookup::default().with("Software\\Vendor", "Path", "C:\\bin");
        assert_eq!(
            lookup.string_value("Software\\Vendor", "Path"),
            Some(OsString::from("C:\\bin"))
        );
        assert!(lookup.string_value("Software\\Vendor", "Other").is_none());
    }
}

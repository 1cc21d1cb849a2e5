//! Purpose: Encode Rust strings as the platform's `wchar_t` sequences.
//! Exports: `WideChar`, `to_wide`.
//! Invariants: Output is not NUL-terminated; callers pass the length explicitly.
//! Invariants: Windows uses UTF-16 code units; other platforms use one unit per scalar.

#[cfg(windows)]
pub type WideChar = u16;

#[cfg(not(windows))]
pub type WideChar = libc::wchar_t;

#[cfg(windows)]
pub fn to_wide(value: &str) -> Vec<WideChar> {
    value.encode_utf16().collect()
}

#[cfg(not(windows))]
pub fn to_wide(value: &str) -> Vec<WideChar> {
    value.chars().map(|ch| ch as WideChar).collect()
}

/// NUL-terminated variant for Win32 calls that take `PCWSTR`.
#[cfg(windows)]
pub(crate) fn to_wide_nul(value: &std::ffi::OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    value.encode_wide().chain(std::iter::once(0)).collect()
}

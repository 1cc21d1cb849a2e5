//! Purpose: Load a native shared library from an explicit path and look up exports.
//! Exports: `NativeLibrary`.
//! Role: Thin owner of an OS library handle; `Client` binds typed functions on top.
//! Invariants: A handle is released exactly once, on drop.
//! Invariants: Load failures map to `ErrorKind::Load`, missing exports to `ErrorKind::Symbol`.
use std::ffi::{CStr, c_void};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};

pub struct NativeLibrary {
    handle: sys::Handle,
    path: PathBuf,
}

impl NativeLibrary {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let handle = sys::open(path).map_err(|detail| {
            Error::new(ErrorKind::Load)
                .with_message(format!("failed to load library '{}'", path.display()))
                .with_path(path)
                .with_source(detail)
        })?;
        debug!(path = %path.display(), "loaded library");
        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw address of an exported symbol. Callers cast it to the matching
    /// function type and must not use it after the library is dropped.
    pub fn symbol(&self, name: &CStr) -> Result<*const c_void, Error> {
        sys::symbol(&self.handle, name).map_err(|detail| {
            Error::new(ErrorKind::Symbol)
                .with_message(format!(
                    "failed to find '{}' in library",
                    name.to_string_lossy()
                ))
                .with_path(&self.path)
                .with_source(detail)
        })
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        sys::close(&self.handle);
        debug!(path = %self.path.display(), "unloaded library");
    }
}

#[cfg(unix)]
mod sys {
    use std::ffi::{CStr, CString, c_void};
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub(super) struct Handle(*mut c_void);

    fn last_error(fallback: &str) -> io::Error {
        let detail = unsafe { libc::dlerror() };
        let message = if detail.is_null() {
            fallback.to_string()
        } else {
            unsafe { CStr::from_ptr(detail) }
                .to_string_lossy()
                .into_owned()
        };
        io::Error::other(message)
    }

    pub(super) fn open(path: &Path) -> Result<Handle, io::Error> {
        let path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
        let handle = unsafe { libc::dlopen(path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(last_error("dlopen failed"));
        }
        Ok(Handle(handle))
    }

    pub(super) fn symbol(handle: &Handle, name: &CStr) -> Result<*const c_void, io::Error> {
        // Clear any stale error so a NULL result can be told apart from a failure.
        unsafe { libc::dlerror() };
        let address = unsafe { libc::dlsym(handle.0, name.as_ptr()) };
        if address.is_null() {
            return Err(last_error("symbol not found"));
        }
        Ok(address.cast_const())
    }

    pub(super) fn close(handle: &Handle) {
        unsafe {
            libc::dlclose(handle.0);
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::{CStr, c_void};
    use std::io;
    use std::path::Path;

    use windows_sys::Win32::Foundation::{FreeLibrary, HMODULE};
    use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

    use crate::core::wide::to_wide_nul;

    pub(super) struct Handle(HMODULE);

    pub(super) fn open(path: &Path) -> Result<Handle, io::Error> {
        let wide = to_wide_nul(path.as_os_str());
        let module = unsafe { LoadLibraryW(wide.as_ptr()) };
        if module.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Handle(module))
    }

    pub(super) fn symbol(handle: &Handle, name: &CStr) -> Result<*const c_void, io::Error> {
        let address = unsafe { GetProcAddress(handle.0, name.as_ptr().cast()) };
        match address {
            Some(function) => Ok(function as *const c_void),
            None => Err(io::Error::last_os_error()),
        }
    }

    pub(super) fn close(handle: &Handle) {
        unsafe {
            FreeLibrary(handle.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NativeLibrary;
    use crate::core::error::ErrorKind;
    use std::error::Error as _;

    #[test]
    fn missing_file_is_load_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.so");
        let err = NativeLibrary::open(&path).err().expect("load fails");
        assert_eq!(err.kind(), ErrorKind::Load);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn garbage_file_is_load_error_with_os_detail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("garbage.dll");
        std::fs::write(&path, b"definitely not an executable image").expect("write");

        let err = NativeLibrary::open(&path).err().expect("load fails");
        assert_eq!(err.kind(), ErrorKind::Load);
        assert!(err.source().is_some());
    }
}

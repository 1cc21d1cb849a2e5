//! Purpose: Bind the C API send function from a loaded library and invoke it.
//! Exports: `Client`, `Encoding`.
//! Role: Stable boundary used by the CLI; owns the library for as long as the binding lives.
//! Invariants: Each `send` performs exactly one foreign call with both strings and lengths.
//! Invariants: Lengths are element counts of the encoded buffers, not byte counts for wide.
use std::ffi::{CStr, c_char, c_void};
use std::fmt;
use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

use super::event::Event;
use crate::core::error::Error;
use crate::core::library::NativeLibrary;
use crate::core::wide::{WideChar, to_wide};

pub type ApiResult<T> = Result<T, Error>;

type SendWideFn = unsafe extern "C" fn(*const WideChar, usize, *const WideChar, usize);
type SendUtf8Fn = unsafe extern "C" fn(*const c_char, usize, *const c_char, usize);

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// `wchar_t` strings via `OpenKneeboard_send_wchar_ptr`
    #[default]
    Wide,
    /// UTF-8 bytes via `OpenKneeboard_send_utf8`
    Utf8,
}

impl Encoding {
    pub fn symbol_name(self) -> &'static CStr {
        match self {
            Encoding::Wide => c"OpenKneeboard_send_wchar_ptr",
            Encoding::Utf8 => c"OpenKneeboard_send_utf8",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Wide => "wide",
            Encoding::Utf8 => "utf8",
        })
    }
}

enum SendFn {
    Wide(SendWideFn),
    Utf8(SendUtf8Fn),
}

pub struct Client {
    send: SendFn,
    library: NativeLibrary,
}

impl Client {
    pub fn open(path: &Path, encoding: Encoding) -> ApiResult<Self> {
        let library = NativeLibrary::open(path)?;
        Self::bind(library, encoding)
    }

    pub fn bind(library: NativeLibrary, encoding: Encoding) -> ApiResult<Self> {
        let address = library.symbol(encoding.symbol_name())?;
        debug!(symbol = %encoding.symbol_name().to_string_lossy(), "bound export");
        let send = unsafe {
            match encoding {
                Encoding::Wide => {
                    SendFn::Wide(std::mem::transmute::<*const c_void, SendWideFn>(address))
                }
                Encoding::Utf8 => {
                    SendFn::Utf8(std::mem::transmute::<*const c_void, SendUtf8Fn>(address))
                }
            }
        };
        Ok(Self { send, library })
    }

    pub fn library_path(&self) -> &Path {
        self.library.path()
    }

    pub fn send(&self, event: &Event) {
        debug!(name = %event.name, value = %event.value, "sending event");
        match self.send {
            SendFn::Wide(send) => {
                let name = to_wide(&event.name);
                let value = to_wide(&event.value);
                unsafe { send(name.as_ptr(), name.len(), value.as_ptr(), value.len()) }
            }
            SendFn::Utf8(send) => unsafe {
                send(
                    event.name.as_ptr().cast(),
                    event.name.len(),
                    event.value.as_ptr().cast(),
                    event.value.len(),
                )
            },
        }
    }
}

//! Purpose: Define the public Rust API boundary for okb-send.
//! Exports: Event payload, the bound C API client, and path resolution types.
//! Role: Public, additive-only surface used by the CLI and tests.
//! Invariants: Platform handles and FFI details stay inside `core`.

mod client;
mod event;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::locate::{
    ENV_OVERRIDE, Environment, LibrarySource, Locator, ProcessEnv, ResolvedLibrary,
    library_file_name,
};
pub use crate::core::registry::{ConfigLookup, NoRegistry, Registry, system_lookup};
pub use client::{ApiResult, Client, Encoding};
pub use event::{EXAMPLE_NAME, EXAMPLE_VALUE, Event};

//! Purpose: Library crate backing the `okb-send` CLI and its tests.
//! Exports: `api` (event payload, C API client, library resolution), `core` (internals).
//! Role: Locate the OpenKneeboard C API library, load it, and call one export.
//! Invariants: Core modules take the environment and registry as explicit inputs.
pub mod api;
pub mod core;

//! Purpose: The `(name, value)` payload delivered through the C API.
//! Exports: `Event`, `EXAMPLE_NAME`, `EXAMPLE_VALUE`.
//! Invariants: A missing value is sent as the empty string, never omitted.
use serde::Serialize;

/// Built-in pair used when no arguments are given: advance to the next tab.
pub const EXAMPLE_NAME: &str = "RemoteUserAction";
pub const EXAMPLE_VALUE: &str = "NEXT_TAB";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub value: String,
}

impl Event {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn example() -> Self {
        Self::new(EXAMPLE_NAME, EXAMPLE_VALUE)
    }

    /// Zero args → example, name only → empty value, both → as given.
    pub fn from_args(name: Option<String>, value: Option<String>) -> Self {
        match name {
            None => Self::example(),
            Some(name) => Self::new(name, value.unwrap_or_default()),
        }
    }
}

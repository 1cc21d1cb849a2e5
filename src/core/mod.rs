// Core modules implementing path resolution, library loading, and errors.
pub mod error;
pub mod library;
pub mod locate;
pub mod registry;
pub mod wide;

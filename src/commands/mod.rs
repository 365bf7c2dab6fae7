//! Command implementations for the ncc CLI
//!
//! Each command takes the loaded [`Context`](crate::context::Context) and its
//! parsed arguments, and returns the process exit code on success.

pub mod build;
pub mod credential;
pub mod package;
pub mod repository;
pub mod version;

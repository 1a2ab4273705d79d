//! Process-level runtime support for the session manager.
//!
//! The coordination engine treats process launch and liveness as an
//! external concern; this crate supplies the OS-backed implementation
//! used outside of tests.

pub mod process;

pub use process::{pid_is_alive, spawn_detached};

//! Data types for the session-management protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! session coordination engine, its transport collaborator, and the
//! presentation layer. These types represent the "protocol layer" - the
//! shapes of data as they cross the engine's boundaries.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and
//!   trivial derived accessors
//! * Transport-agnostic: the wire encoding is owned by the transport
//!   collaborator, never by these types
//! * Stable: Changes only when the protocol changes
//!
//! The coordination engine built on top of these types is `sessiond-core`.

pub mod properties;
pub mod reply;
pub mod request;
pub mod snapshot;
pub mod state;
pub mod types;

pub use properties::*;
pub use reply::*;
pub use request::*;
pub use snapshot::*;
pub use state::*;
pub use types::*;

//! Session coordination engine.
//!
//! Tracks client applications participating in the checkpoint/shutdown
//! protocol, drives each through its per-client state machine, and
//! orchestrates priority-ordered save and shutdown cycles with bounded
//! waiting: a slow, unresponsive, or crashing client degrades the
//! operation, it never hangs it.
//!
//! The engine is deliberately narrow. Presentation, wire encoding, and
//! process launch are collaborators behind seams ([`Transport`],
//! [`Launcher`], [`SessionNotification`] subscribers); the engine owns
//! only the coordination logic.

/// Client records owned by the registry.
pub mod client;
/// Coordinator configuration inputs (timeout policy, defaults).
pub mod config;
/// The coordinator actor, its event loop, and the public handle.
pub mod coordinator;
/// Error taxonomy and result alias.
pub mod error;
/// Process-launch seam plus OS-backed and in-memory launchers.
pub mod launch;
/// Typed notifications broadcast to the presentation layer.
pub mod notify;
/// The client registry: lookup, insertion, removal.
pub mod registry;
/// Priority-bucket scheduling of save requests.
pub mod schedule;
/// The per-client protocol state machine.
pub mod state;
/// Transport seam plus the in-memory fake used by tests.
pub mod transport;

// Per-cycle bookkeeping and deadline supervision stay private; their
// observable surface is CycleStatus via CoordinatorHandle::cycle_status.
mod cycle;
mod timeout;

pub use client::Client;
pub use config::SessionConfig;
pub use coordinator::{CoordinatorHandle, SessionCoordinator};
pub use error::{Result, SessionError};
pub use launch::{FakeLauncher, Launcher, ProcessLauncher};
pub use notify::{AbandonReason, Notifier, SessionNotification, SpawnPurpose};
pub use registry::ClientRegistry;
pub use schedule::{PriorityBucket, priority_buckets};
pub use transport::{FakeTransport, SentMessage, Transport};

pub use sessiond_protocol as protocol;

//! Identifiers and protocol enums shared across the engine boundary.

use serde::{Deserialize, Serialize};

/// Stable, opaque identifier held by a client for the lifetime of its
/// registration. Assigned once; never reused while the client is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
	/// Wraps a raw identifier string.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for ClientId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ClientId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for ClientId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

/// What a save cycle is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
	/// Persist the full session; clients keep running afterwards.
	Save,
	/// Lightweight checkpoint of local client state.
	Checkpoint,
	/// Persist the full session, then disconnect every client.
	Shutdown,
}

impl SaveKind {
	/// Save scope issued to clients for this cycle kind. Checkpoints only
	/// ask clients to persist local state; full saves and shutdowns
	/// request a global save.
	pub fn scope(self) -> SaveScope {
		match self {
			SaveKind::Checkpoint => SaveScope::Local,
			SaveKind::Save | SaveKind::Shutdown => SaveScope::Global,
		}
	}

	/// Whether the cycle ends with clients being disconnected.
	pub fn is_shutdown(self) -> bool {
		matches!(self, SaveKind::Shutdown)
	}
}

impl std::fmt::Display for SaveKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SaveKind::Save => f.write_str("save"),
			SaveKind::Checkpoint => f.write_str("checkpoint"),
			SaveKind::Shutdown => f.write_str("shutdown"),
		}
	}
}

/// Whether a save-yourself request covers global or local client state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveScope {
	Global,
	Local,
}

/// Global phase of a save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
	/// Priority-ordered bucket processing.
	Phase1,
	/// Second save pass for clients that requested it; no buckets.
	Phase2,
	Done,
	Aborted,
}

impl CyclePhase {
	/// Whether the cycle has ended, successfully or not.
	pub fn is_finished(self) -> bool {
		matches!(self, CyclePhase::Done | CyclePhase::Aborted)
	}
}

/// How a client wants to be treated across session restarts and
/// unexpected exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestartHint {
	/// Restart with the session only if running when it was saved.
	#[default]
	IfRunning,
	/// Restart with the session even if not running at save time.
	Anyway,
	/// Respawn immediately whenever the client disconnects outside a
	/// shutdown.
	Immediately,
	/// Never restart automatically.
	Never,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn checkpoint_requests_local_scope() {
		assert_eq!(SaveKind::Checkpoint.scope(), SaveScope::Local);
		assert_eq!(SaveKind::Save.scope(), SaveScope::Global);
		assert_eq!(SaveKind::Shutdown.scope(), SaveScope::Global);
	}

	#[test]
	fn only_shutdown_disconnects() {
		assert!(SaveKind::Shutdown.is_shutdown());
		assert!(!SaveKind::Save.is_shutdown());
		assert!(!SaveKind::Checkpoint.is_shutdown());
	}

	#[test]
	fn finished_phases() {
		assert!(CyclePhase::Done.is_finished());
		assert!(CyclePhase::Aborted.is_finished());
		assert!(!CyclePhase::Phase1.is_finished());
		assert!(!CyclePhase::Phase2.is_finished());
	}
}

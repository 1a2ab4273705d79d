//! Outbound save-yourself requests.

use serde::{Deserialize, Serialize};

use crate::types::{SaveKind, SaveScope};

/// A save-yourself request issued to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
	/// Cycle kind this request belongs to.
	pub kind: SaveKind,
	/// Save scope the client should apply.
	pub scope: SaveScope,
	/// Second-stage save, issued only after every phase-1 save settled.
	pub phase2: bool,
}

impl SaveRequest {
	/// Builds the phase-1 request for a cycle kind.
	pub fn phase1(kind: SaveKind) -> Self {
		Self { kind, scope: kind.scope(), phase2: false }
	}

	/// Builds the phase-2 request for a cycle kind.
	pub fn phase2(kind: SaveKind) -> Self {
		Self { kind, scope: kind.scope(), phase2: true }
	}

	/// Whether the client should expect to be disconnected afterwards.
	pub fn shutdown(&self) -> bool {
		self.kind.is_shutdown()
	}
}

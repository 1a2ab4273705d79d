//! Presentation snapshots of engine state.
//!
//! These are the read-only views handed to the presentation layer for
//! rendering live client lists and cycle progress. They carry no
//! references into the engine; every snapshot is a point-in-time copy.

use serde::{Deserialize, Serialize};

use crate::state::ClientState;
use crate::types::{ClientId, CyclePhase, SaveKind};

/// Snapshot of one registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
	pub id: ClientId,
	pub program: Option<String>,
	pub user_id: Option<String>,
	pub priority: u8,
	pub state: ClientState,
	pub restart_command: Vec<String>,
	/// Whether the client declared a clone command.
	pub clonable: bool,
}

impl ClientInfo {
	/// Program name for list rendering. Falls back to the joined restart
	/// command line, then to "Unknown".
	pub fn display_program(&self) -> String {
		if let Some(program) = &self.program {
			return program.clone();
		}
		if !self.restart_command.is_empty() {
			return self.restart_command.join(" ");
		}
		"Unknown".to_string()
	}

	/// User identifier for list rendering, or "Unknown".
	pub fn display_user(&self) -> &str {
		self.user_id.as_deref().unwrap_or("Unknown")
	}
}

/// Per-client completion status within the active cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientProgress {
	/// Not yet finished the current phase (or not yet dispatched).
	Pending,
	/// Finished every save the cycle has asked of it so far.
	Done,
	/// Dropped from the cycle by timeout or failure; the cycle proceeds
	/// without it.
	Abandoned,
}

/// One client's standing in the active cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCycleStatus {
	pub id: ClientId,
	pub progress: ClientProgress,
}

/// Snapshot of the active save cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStatus {
	pub kind: SaveKind,
	pub phase: CyclePhase,
	/// Frozen cycle membership in dispatch order.
	pub clients: Vec<ClientCycleStatus>,
}

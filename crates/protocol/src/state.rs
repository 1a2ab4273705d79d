//! Per-client protocol states.

use serde::{Deserialize, Serialize};

/// Protocol state of a registered client. A client is in exactly one
/// state at any time; transitions are owned by the coordination engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientState {
	Idle,
	Interacting,
	SaveDone,
	SavingGlobal,
	SavingLocal,
	WaitingToInteract,
	WaitingPhase2,
	SavingPhase2,
	Disconnecting,
}

impl ClientState {
	/// Presentation label for list views. Both saving scopes render as
	/// plain "Saving"; the scope distinction is internal to the protocol.
	pub fn label(self) -> &'static str {
		match self {
			ClientState::Idle => "Idle",
			ClientState::Interacting => "Interacting",
			ClientState::SaveDone => "Save completed",
			ClientState::SavingGlobal => "Saving",
			ClientState::SavingLocal => "Saving",
			ClientState::WaitingToInteract => "Waiting to interact",
			ClientState::WaitingPhase2 => "Waiting to enter Phase2",
			ClientState::SavingPhase2 => "Saving (Phase2)",
			ClientState::Disconnecting => "Disconnecting",
		}
	}

	/// Whether the client currently owes the coordinator a save result.
	pub fn is_saving(self) -> bool {
		matches!(self, ClientState::SavingGlobal | ClientState::SavingLocal | ClientState::SavingPhase2)
	}

	/// Disconnecting is terminal; a disconnecting client never re-enters
	/// any other state.
	pub fn is_terminal(self) -> bool {
		matches!(self, ClientState::Disconnecting)
	}
}

impl std::fmt::Display for ClientState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.label())
	}
}

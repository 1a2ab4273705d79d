//! Client-declared properties.

use serde::{Deserialize, Serialize};

use crate::types::RestartHint;

/// Attributes a client declares about itself, first at registration and
/// later through property-update messages. Absent fields leave the
/// current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientProperties {
	/// Display program name.
	pub program: Option<String>,
	/// Owning user identifier.
	pub user_id: Option<String>,
	/// Save priority; lower values save earlier.
	pub priority: Option<u8>,
	/// Command used to restart the client in a future session.
	pub restart_command: Option<Vec<String>>,
	/// Command used to start an independent copy; absent means the
	/// client is not clonable.
	pub clone_command: Option<Vec<String>>,
	/// Restart treatment on disconnect.
	pub restart_hint: Option<RestartHint>,
}

impl ClientProperties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the display program name.
	pub fn with_program(mut self, program: impl Into<String>) -> Self {
		self.program = Some(program.into());
		self
	}

	/// Sets the owning user identifier.
	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	/// Sets the save priority.
	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = Some(priority);
		self
	}

	/// Sets the restart command.
	pub fn with_restart_command(mut self, argv: Vec<String>) -> Self {
		self.restart_command = Some(argv);
		self
	}

	/// Sets the clone command.
	pub fn with_clone_command(mut self, argv: Vec<String>) -> Self {
		self.clone_command = Some(argv);
		self
	}

	/// Sets the restart hint.
	pub fn with_restart_hint(mut self, hint: RestartHint) -> Self {
		self.restart_hint = Some(hint);
		self
	}
}

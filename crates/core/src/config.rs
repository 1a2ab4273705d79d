//! Coordinator configuration inputs.
//!
//! The coordinator consumes these values but does not define where they
//! come from; loading and persistence belong to the embedding program.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_INTERACT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_DIE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRIORITY: u8 = 50;

/// Timeout policy and registration defaults for one coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
	/// Per-client deadline for answering a save-yourself request.
	#[serde(default = "default_save_timeout_secs")]
	pub save_timeout_secs: u64,
	/// Per-client deadline while holding the interaction grant.
	#[serde(default = "default_interact_timeout_secs")]
	pub interact_timeout_secs: u64,
	/// Deadline for a client to disconnect after being told to die.
	#[serde(default = "default_die_timeout_secs")]
	pub die_timeout_secs: u64,
	/// Priority assigned to clients that do not declare one.
	#[serde(default = "default_priority")]
	pub default_priority: u8,
}

impl SessionConfig {
	pub fn save_timeout(&self) -> Duration {
		Duration::from_secs(self.save_timeout_secs)
	}

	pub fn interact_timeout(&self) -> Duration {
		Duration::from_secs(self.interact_timeout_secs)
	}

	pub fn die_timeout(&self) -> Duration {
		Duration::from_secs(self.die_timeout_secs)
	}
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			save_timeout_secs: DEFAULT_SAVE_TIMEOUT_SECS,
			interact_timeout_secs: DEFAULT_INTERACT_TIMEOUT_SECS,
			die_timeout_secs: DEFAULT_DIE_TIMEOUT_SECS,
			default_priority: DEFAULT_PRIORITY,
		}
	}
}

fn default_save_timeout_secs() -> u64 {
	DEFAULT_SAVE_TIMEOUT_SECS
}

fn default_interact_timeout_secs() -> u64 {
	DEFAULT_INTERACT_TIMEOUT_SECS
}

fn default_die_timeout_secs() -> u64 {
	DEFAULT_DIE_TIMEOUT_SECS
}

fn default_priority() -> u8 {
	DEFAULT_PRIORITY
}

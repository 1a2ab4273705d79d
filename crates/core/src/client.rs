//! Client records owned by the registry.

use sessiond_protocol::{ClientId, ClientInfo, ClientProperties, ClientState, RestartHint};

use crate::error::Result;
use crate::state;

/// One participant process in the session protocol.
///
/// Owned exclusively by the [`ClientRegistry`]; every other component
/// refers to a client by [`ClientId`]. The registration sequence number
/// is the tie-break for priority scheduling and never changes.
///
/// [`ClientRegistry`]: crate::registry::ClientRegistry
#[derive(Debug)]
pub struct Client {
	id: ClientId,
	seq: u64,
	program: Option<String>,
	user_id: Option<String>,
	priority: u8,
	restart_command: Vec<String>,
	clone_command: Option<Vec<String>>,
	restart_hint: RestartHint,
	state: ClientState,
	/// State to resume once an interaction detour ends.
	resume_state: Option<ClientState>,
	/// Set when the manager told the client to die; suppresses the
	/// restart-hint respawn on disconnect.
	killed: bool,
}

impl Client {
	pub(crate) fn new(id: ClientId, seq: u64, properties: ClientProperties, default_priority: u8) -> Self {
		let mut client = Self {
			id,
			seq,
			program: None,
			user_id: None,
			priority: default_priority,
			restart_command: Vec::new(),
			clone_command: None,
			restart_hint: RestartHint::default(),
			state: ClientState::Idle,
			resume_state: None,
			killed: false,
		};
		client.apply_properties(properties, true);
		client
	}

	pub fn id(&self) -> &ClientId {
		&self.id
	}

	pub fn seq(&self) -> u64 {
		self.seq
	}

	pub fn program(&self) -> Option<&str> {
		self.program.as_deref()
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	pub fn priority(&self) -> u8 {
		self.priority
	}

	pub fn restart_command(&self) -> &[String] {
		&self.restart_command
	}

	pub fn clone_command(&self) -> Option<&[String]> {
		self.clone_command.as_deref()
	}

	pub fn restart_hint(&self) -> RestartHint {
		self.restart_hint
	}

	pub fn state(&self) -> ClientState {
		self.state
	}

	pub fn killed(&self) -> bool {
		self.killed
	}

	pub(crate) fn mark_killed(&mut self) {
		self.killed = true;
	}

	/// Applies a property update. Priority is only written when
	/// `allow_priority` is set; it is frozen while the client is part of
	/// a running cycle.
	pub(crate) fn apply_properties(&mut self, properties: ClientProperties, allow_priority: bool) {
		if properties.program.is_some() {
			self.program = properties.program;
		}
		if properties.user_id.is_some() {
			self.user_id = properties.user_id;
		}
		if let Some(priority) = properties.priority {
			if allow_priority {
				self.priority = priority;
			}
		}
		if let Some(argv) = properties.restart_command {
			self.restart_command = argv;
		}
		if properties.clone_command.is_some() {
			self.clone_command = properties.clone_command;
		}
		if let Some(hint) = properties.restart_hint {
			self.restart_hint = hint;
		}
	}

	/// Moves the client to `to` after validating the transition; returns
	/// the previous state. Illegal requests leave the state unchanged.
	pub(crate) fn transition(&mut self, to: ClientState) -> Result<ClientState> {
		state::validate(self.state, to)?;
		let from = self.state;
		self.state = to;
		Ok(from)
	}

	/// Records the state an interaction detour should return to.
	pub(crate) fn set_resume_state(&mut self, state: ClientState) {
		self.resume_state = Some(state);
	}

	pub(crate) fn take_resume_state(&mut self) -> Option<ClientState> {
		self.resume_state.take()
	}

	/// Point-in-time snapshot for the presentation layer.
	pub fn info(&self) -> ClientInfo {
		ClientInfo {
			id: self.id.clone(),
			program: self.program.clone(),
			user_id: self.user_id.clone(),
			priority: self.priority,
			state: self.state,
			restart_command: self.restart_command.clone(),
			clonable: self.clone_command.is_some(),
		}
	}
}

//! The transport seam between the engine and client processes.
//!
//! The engine never touches a wire format; it asks the transport to
//! deliver typed requests and receives typed replies through its event
//! queue. [`FakeTransport`] is the in-memory implementation used by the
//! protocol-level tests: it records outbound requests and can be told
//! to fail delivery for specific clients.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sessiond_protocol::{ClientId, SaveRequest};

use crate::error::{Result, SessionError};

/// Outbound message delivery to client processes.
///
/// A delivery failure is reported per client and is treated by the
/// coordinator exactly like a timeout for that client: abandoned for
/// the cycle, never fatal to the cycle itself.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Delivers a save-yourself request.
	async fn send_save_request(&self, id: &ClientId, request: SaveRequest) -> Result<()>;

	/// Grants the client permission to interact with the user.
	async fn send_interact(&self, id: &ClientId) -> Result<()>;

	/// Tells the client its in-progress save was canceled (cycle abort).
	async fn send_cancel(&self, id: &ClientId) -> Result<()>;

	/// Tells the client to exit.
	async fn send_die(&self, id: &ClientId) -> Result<()>;
}

/// One outbound message captured by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
	SaveRequest { id: ClientId, request: SaveRequest },
	Interact { id: ClientId },
	Cancel { id: ClientId },
	Die { id: ClientId },
}

impl SentMessage {
	/// The client the message was addressed to.
	pub fn client(&self) -> &ClientId {
		match self {
			SentMessage::SaveRequest { id, .. } | SentMessage::Interact { id } | SentMessage::Cancel { id } | SentMessage::Die { id } => id,
		}
	}
}

/// In-memory transport for unit and protocol tests.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
	sent: Arc<Mutex<Vec<SentMessage>>>,
	failing: Arc<Mutex<HashSet<ClientId>>>,
}

impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every future delivery to `id` fail.
	pub fn fail_deliveries_to(&self, id: &ClientId) {
		self.failing.lock().insert(id.clone());
	}

	/// Takes all captured messages, clearing the buffer.
	pub fn take_sent(&self) -> Vec<SentMessage> {
		std::mem::take(&mut *self.sent.lock())
	}

	/// Captured save requests addressed to `id`, in send order.
	pub fn save_requests_for(&self, id: &ClientId) -> Vec<SaveRequest> {
		self.sent
			.lock()
			.iter()
			.filter_map(|message| match message {
				SentMessage::SaveRequest { id: target, request } if target == id => Some(*request),
				_ => None,
			})
			.collect()
	}

	fn deliver(&self, id: &ClientId, message: SentMessage) -> Result<()> {
		if self.failing.lock().contains(id) {
			return Err(SessionError::Transport(format!("delivery to {id} failed")));
		}
		self.sent.lock().push(message);
		Ok(())
	}
}

#[async_trait]
impl Transport for FakeTransport {
	async fn send_save_request(&self, id: &ClientId, request: SaveRequest) -> Result<()> {
		self.deliver(id, SentMessage::SaveRequest { id: id.clone(), request })
	}

	async fn send_interact(&self, id: &ClientId) -> Result<()> {
		self.deliver(id, SentMessage::Interact { id: id.clone() })
	}

	async fn send_cancel(&self, id: &ClientId) -> Result<()> {
		self.deliver(id, SentMessage::Cancel { id: id.clone() })
	}

	async fn send_die(&self, id: &ClientId) -> Result<()> {
		self.deliver(id, SentMessage::Die { id: id.clone() })
	}
}

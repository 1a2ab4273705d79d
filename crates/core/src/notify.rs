//! Typed notifications for the presentation layer.
//!
//! The engine publishes every observable change on a broadcast channel;
//! the presentation layer (or anything else) subscribes and renders.
//! Publishing never depends on a subscriber existing - sends into an
//! empty channel are discarded.

use sessiond_protocol::{ClientId, ClientInfo, ClientState, CyclePhase, SaveKind};
use tokio::sync::broadcast;

/// Why a client was dropped from a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
	/// The deadline expired with no reply.
	Timeout,
	/// The client reported it could not save.
	SaveFailed,
	/// The client sent a reply its state does not allow.
	ProtocolViolation,
	/// The transport could not deliver a request to the client.
	Transport,
}

/// What a launcher spawn was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPurpose {
	/// Re-execution of a client's clone command.
	Clone,
	/// Restart-hint respawn after an unexpected disconnect.
	Restart,
}

/// One observable engine event.
#[derive(Debug, Clone)]
pub enum SessionNotification {
	ClientRegistered(ClientInfo),
	/// Properties changed without a state transition.
	ClientUpdated(ClientInfo),
	ClientRemoved { id: ClientId },
	ClientStateChanged { id: ClientId, from: ClientState, to: ClientState },
	ClientAbandoned { id: ClientId, reason: AbandonReason },
	CyclePhaseChanged { kind: SaveKind, phase: CyclePhase },
	/// The cycle ended; `phase` is `Done` or `Aborted`.
	CycleFinished { kind: SaveKind, phase: CyclePhase },
	/// A clone or restart spawn finished.
	ProcessSpawned { source: ClientId, purpose: SpawnPurpose, pid: Option<u32>, error: Option<String> },
}

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast fan-out for [`SessionNotification`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
	tx: broadcast::Sender<SessionNotification>,
}

impl Notifier {
	pub fn new() -> Self {
		let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
		self.tx.subscribe()
	}

	/// Publishes an event. A missing audience is not an error.
	pub fn emit(&self, notification: SessionNotification) {
		let _ = self.tx.send(notification);
	}
}

impl Default for Notifier {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn emit_without_subscribers_is_fine() {
		let notifier = Notifier::new();
		notifier.emit(SessionNotification::ClientRemoved { id: ClientId::new("c1") });
	}

	#[tokio::test]
	async fn subscribers_see_events_in_order() {
		let notifier = Notifier::new();
		let mut rx = notifier.subscribe();

		notifier.emit(SessionNotification::ClientRemoved { id: ClientId::new("first") });
		notifier.emit(SessionNotification::ClientRemoved { id: ClientId::new("second") });

		match rx.recv().await.expect("first event") {
			SessionNotification::ClientRemoved { id } => assert_eq!(id.as_str(), "first"),
			other => panic!("unexpected notification: {other:?}"),
		}
		match rx.recv().await.expect("second event") {
			SessionNotification::ClientRemoved { id } => assert_eq!(id.as_str(), "second"),
			other => panic!("unexpected notification: {other:?}"),
		}
	}
}

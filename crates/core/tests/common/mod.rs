#![allow(dead_code)]

//! Shared harness for protocol-level coordinator tests: a coordinator
//! wired to the in-memory transport and launcher, plus helpers for
//! registering scripted clients and injecting their replies.

use std::sync::Arc;
use std::time::Duration;

use sessiond::protocol::{ClientId, ClientProperties, ClientReply, ClientState, SaveKind};
use sessiond::{CoordinatorHandle, FakeLauncher, FakeTransport, SessionConfig, SessionCoordinator, SessionNotification};
use tokio::sync::broadcast;

pub struct Harness {
	pub handle: CoordinatorHandle,
	pub transport: FakeTransport,
	pub launcher: FakeLauncher,
}

pub fn harness() -> Harness {
	harness_with(SessionConfig::default())
}

pub fn harness_with(config: SessionConfig) -> Harness {
	init_tracing();
	let transport = FakeTransport::new();
	let launcher = FakeLauncher::new();
	let handle = SessionCoordinator::spawn(config, Arc::new(transport.clone()), Arc::new(launcher.clone()));
	Harness { handle, transport, launcher }
}

/// Engine logs land in the captured test output when a test fails.
fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

impl Harness {
	pub async fn register(&self, id: &str, priority: u8) -> ClientId {
		self.register_with(id, ClientProperties::new().with_priority(priority).with_program(id)).await
	}

	pub async fn register_with(&self, id: &str, properties: ClientProperties) -> ClientId {
		self.handle.register(ClientId::new(id), properties).await.expect("registration should succeed")
	}

	/// Injects one client reply and waits until it was processed.
	pub async fn reply(&self, id: &str, reply: ClientReply) {
		self.handle.client_reply(ClientId::new(id), reply).expect("coordinator should be running");
		self.sync().await;
	}

	pub async fn save_done(&self, id: &str) {
		self.reply(id, ClientReply::SaveYourselfDone { success: true }).await;
	}

	pub async fn start_save(&self, kind: SaveKind) {
		self.handle.request_save(kind).await.expect("cycle should start");
	}

	/// Barrier: a query command queues behind every event sent before
	/// it, so awaiting one guarantees those events were processed.
	pub async fn sync(&self) {
		let _ = self.handle.clients().await.expect("coordinator should be running");
	}

	pub async fn state_of(&self, id: &str) -> ClientState {
		self.handle
			.clients()
			.await
			.expect("coordinator should be running")
			.into_iter()
			.find(|client| client.id.as_str() == id)
			.unwrap_or_else(|| panic!("client {id} should be listed"))
			.state
	}

	pub async fn is_registered(&self, id: &str) -> bool {
		self.handle
			.clients()
			.await
			.expect("coordinator should be running")
			.iter()
			.any(|client| client.id.as_str() == id)
	}

	/// Ids of all clients currently in `Interacting`.
	pub async fn interacting(&self) -> Vec<String> {
		self.handle
			.clients()
			.await
			.expect("coordinator should be running")
			.into_iter()
			.filter(|client| client.state == ClientState::Interacting)
			.map(|client| client.id.as_str().to_string())
			.collect()
	}
}

/// Waits for the next notification matching `matches`, discarding
/// everything else; panics after five seconds.
pub async fn await_notification(
	rx: &mut broadcast::Receiver<SessionNotification>,
	matches: impl Fn(&SessionNotification) -> bool,
) -> SessionNotification {
	tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			let notification = rx.recv().await.expect("notification channel should stay open");
			if matches(&notification) {
				return notification;
			}
		}
	})
	.await
	.expect("expected notification within five seconds")
}

/// Drains everything currently buffered on the subscription.
pub fn drain_notifications(rx: &mut broadcast::Receiver<SessionNotification>) -> Vec<SessionNotification> {
	let mut seen = Vec::new();
	while let Ok(notification) = rx.try_recv() {
		seen.push(notification);
	}
	seen
}

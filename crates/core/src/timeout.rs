//! Per-client deadline supervision.
//!
//! Each armed deadline is a spawned sleep that feeds an expiry event
//! back into the coordinator's serialized queue. Re-arming replaces the
//! previous deadline (no stacking), and every expiry carries a
//! generation number so a reply racing its own timeout can never be
//! double-counted: the coordinator validates the generation through
//! [`TimeoutSupervisor::expire`] before acting on it.

use std::collections::HashMap;
use std::time::Duration;

use sessiond_protocol::ClientId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::coordinator::SessionEvent;

#[derive(Debug)]
struct ArmedDeadline {
	generation: u64,
	task: JoinHandle<()>,
}

#[derive(Debug)]
pub(crate) struct TimeoutSupervisor {
	events: mpsc::UnboundedSender<SessionEvent>,
	armed: HashMap<ClientId, ArmedDeadline>,
	next_generation: u64,
}

impl TimeoutSupervisor {
	pub(crate) fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
		Self { events, armed: HashMap::new(), next_generation: 0 }
	}

	/// Arms (or replaces) the deadline for `id`.
	pub(crate) fn arm(&mut self, id: &ClientId, deadline: Duration) {
		self.cancel(id);

		self.next_generation += 1;
		let generation = self.next_generation;

		let events = self.events.clone();
		let client = id.clone();
		let task = tokio::spawn(async move {
			tokio::time::sleep(deadline).await;
			let _ = events.send(SessionEvent::DeadlineExpired { id: client, generation });
		});

		debug!(target = "sessiond.timeout", client = %id, generation, ?deadline, "armed deadline");
		self.armed.insert(id.clone(), ArmedDeadline { generation, task });
	}

	/// Cancels the deadline for `id`, if any.
	pub(crate) fn cancel(&mut self, id: &ClientId) {
		if let Some(armed) = self.armed.remove(id) {
			armed.task.abort();
			debug!(target = "sessiond.timeout", client = %id, generation = armed.generation, "canceled deadline");
		}
	}

	/// Cancels every outstanding deadline (cycle abort/finish).
	pub(crate) fn cancel_all(&mut self) {
		for (_, armed) in self.armed.drain() {
			armed.task.abort();
		}
	}

	/// Validates and consumes an expiry notification. Returns `false`
	/// for stale generations - a deadline that was canceled or replaced
	/// after its task already fired.
	pub(crate) fn expire(&mut self, id: &ClientId, generation: u64) -> bool {
		match self.armed.get(id) {
			Some(armed) if armed.generation == generation => {
				self.armed.remove(id);
				true
			}
			_ => false,
		}
	}
}

impl Drop for TimeoutSupervisor {
	fn drop(&mut self) {
		self.cancel_all();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn supervisor() -> (TimeoutSupervisor, mpsc::UnboundedReceiver<SessionEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(TimeoutSupervisor::new(tx), rx)
	}

	fn expiry(event: SessionEvent) -> (ClientId, u64) {
		match event {
			SessionEvent::DeadlineExpired { id, generation } => (id, generation),
			other => panic!("unexpected event: {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_fires_exactly_once() {
		let (mut supervisor, mut rx) = supervisor();
		let id = ClientId::new("c1");
		supervisor.arm(&id, Duration::from_secs(5));

		tokio::time::sleep(Duration::from_secs(6)).await;
		let (fired, generation) = expiry(rx.try_recv().expect("deadline should have fired"));
		assert_eq!(fired, id);
		assert!(supervisor.expire(&id, generation));
		assert!(!supervisor.expire(&id, generation), "second expiry must be stale");
		assert!(rx.try_recv().is_err());
	}

	#[tokio::test(start_paused = true)]
	async fn rearm_replaces_the_previous_deadline() {
		let (mut supervisor, mut rx) = supervisor();
		let id = ClientId::new("c1");
		supervisor.arm(&id, Duration::from_secs(5));
		supervisor.arm(&id, Duration::from_secs(10));

		tokio::time::sleep(Duration::from_secs(7)).await;
		assert!(rx.try_recv().is_err(), "replaced deadline must not fire");

		tokio::time::sleep(Duration::from_secs(4)).await;
		let (_, generation) = expiry(rx.try_recv().expect("replacement should fire"));
		assert!(supervisor.expire(&id, generation));
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_suppresses_expiry() {
		let (mut supervisor, mut rx) = supervisor();
		let id = ClientId::new("c1");
		supervisor.arm(&id, Duration::from_secs(5));
		supervisor.cancel(&id);

		tokio::time::sleep(Duration::from_secs(10)).await;
		assert!(rx.try_recv().is_err());
		assert!(!supervisor.expire(&id, 1), "canceled deadline must be stale");
	}
}

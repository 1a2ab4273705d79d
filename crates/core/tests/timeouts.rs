//! Deadline handling: abandonment, late replies, slot hand-off on an
//! expired interaction, and die-request cleanup. All tests run on
//! paused time.

mod common;

use std::time::Duration;

use common::{await_notification, harness_with};
use sessiond::protocol::{ClientId, ClientReply, ClientState, SaveKind};
use sessiond::{AbandonReason, SessionConfig, SessionNotification};

fn fast_config() -> SessionConfig {
	SessionConfig { save_timeout_secs: 5, interact_timeout_secs: 20, die_timeout_secs: 10, ..SessionConfig::default() }
}

#[tokio::test(start_paused = true)]
async fn unresponsive_client_is_abandoned_and_late_reply_is_a_noop() {
	let h = harness_with(fast_config());
	let mut rx = h.handle.subscribe();
	h.register("a", 50).await;
	h.register("d", 50).await;

	h.start_save(SaveKind::Save).await;
	h.save_done("a").await;

	tokio::time::sleep(Duration::from_secs(6)).await;
	h.sync().await;

	let abandoned = await_notification(&mut rx, |n| matches!(n, SessionNotification::ClientAbandoned { .. })).await;
	match abandoned {
		SessionNotification::ClientAbandoned { id, reason } => {
			assert_eq!(id.as_str(), "d");
			assert_eq!(reason, AbandonReason::Timeout);
		}
		other => panic!("unexpected notification: {other:?}"),
	}

	// The bucket completed without d; the cycle is already over.
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
	assert_eq!(h.state_of("d").await, ClientState::Idle);

	// d's reply arrives after its deadline; nothing changes.
	h.save_done("d").await;
	assert_eq!(h.state_of("d").await, ClientState::Idle);
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
}

#[tokio::test(start_paused = true)]
async fn reply_inside_the_deadline_cancels_the_timer() {
	let h = harness_with(fast_config());
	let mut rx = h.handle.subscribe();
	h.register("a", 50).await;

	h.start_save(SaveKind::Save).await;
	tokio::time::sleep(Duration::from_secs(4)).await;
	h.save_done("a").await;

	tokio::time::sleep(Duration::from_secs(10)).await;
	h.sync().await;

	let seen = common::drain_notifications(&mut rx);
	assert!(
		!seen.iter().any(|n| matches!(n, SessionNotification::ClientAbandoned { .. })),
		"a timely reply must not be double-counted as a timeout"
	);
	assert_eq!(h.state_of("a").await, ClientState::Idle);
}

#[tokio::test(start_paused = true)]
async fn expired_interaction_hands_the_slot_off() {
	let h = harness_with(fast_config());
	let mut rx = h.handle.subscribe();
	h.register("a", 50).await;
	h.register("b", 50).await;

	h.start_save(SaveKind::Save).await;
	h.reply("a", ClientReply::RequestInteraction).await;
	h.reply("b", ClientReply::RequestInteraction).await;
	assert_eq!(h.interacting().await, vec!["a".to_string()]);

	// a sits on the grant past the interaction deadline.
	tokio::time::sleep(Duration::from_secs(21)).await;
	h.sync().await;

	let abandoned = await_notification(&mut rx, |n| matches!(n, SessionNotification::ClientAbandoned { .. })).await;
	match abandoned {
		SessionNotification::ClientAbandoned { id, reason } => {
			assert_eq!(id.as_str(), "a");
			assert_eq!(reason, AbandonReason::Timeout);
		}
		other => panic!("unexpected notification: {other:?}"),
	}

	assert_eq!(h.interacting().await, vec!["b".to_string()]);

	h.reply("b", ClientReply::InteractDone).await;
	h.save_done("b").await;
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
	// The abandoned client is reverted with everyone else at cycle end.
	assert_eq!(h.state_of("a").await, ClientState::Idle);
}

#[tokio::test(start_paused = true)]
async fn client_ignoring_die_is_dropped_after_the_deadline() {
	let h = harness_with(fast_config());
	let mut rx = h.handle.subscribe();
	h.register("a", 50).await;

	h.handle.kill(ClientId::new("a")).await.expect("kill should succeed");
	assert_eq!(h.state_of("a").await, ClientState::Disconnecting);

	tokio::time::sleep(Duration::from_secs(11)).await;
	h.sync().await;

	await_notification(&mut rx, |n| matches!(n, SessionNotification::ClientRemoved { .. })).await;
	assert!(!h.is_registered("a").await);
}

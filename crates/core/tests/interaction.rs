//! The system-wide interaction grant: mutual exclusion, FIFO hand-off,
//! and resuming the interrupted save.

mod common;

use common::harness;
use sessiond::SentMessage;
use sessiond::protocol::{ClientId, ClientReply, ClientState, SaveKind};

fn interact_grants(sent: &[SentMessage]) -> Vec<String> {
	sent.iter()
		.filter_map(|message| match message {
			SentMessage::Interact { id } => Some(id.as_str().to_string()),
			_ => None,
		})
		.collect()
}

#[tokio::test]
async fn at_most_one_client_interacts_and_handoff_is_fifo() {
	let h = harness();
	h.register("a", 50).await;
	h.register("b", 50).await;
	h.register("c", 50).await;

	h.start_save(SaveKind::Save).await;

	h.reply("a", ClientReply::RequestInteraction).await;
	h.reply("b", ClientReply::RequestInteraction).await;
	h.reply("c", ClientReply::RequestInteraction).await;

	assert_eq!(h.interacting().await, vec!["a".to_string()]);
	assert_eq!(h.state_of("b").await, ClientState::WaitingToInteract);
	assert_eq!(h.state_of("c").await, ClientState::WaitingToInteract);
	assert_eq!(interact_grants(&h.transport.take_sent()), vec!["a".to_string()]);

	h.reply("a", ClientReply::InteractDone).await;

	// a resumed its save; b got the slot next, strictly in request order.
	assert_eq!(h.state_of("a").await, ClientState::SavingGlobal);
	assert_eq!(h.interacting().await, vec!["b".to_string()]);
	assert_eq!(interact_grants(&h.transport.take_sent()), vec!["b".to_string()]);

	h.reply("b", ClientReply::InteractDone).await;
	assert_eq!(h.interacting().await, vec!["c".to_string()]);

	h.reply("c", ClientReply::InteractDone).await;
	assert!(h.interacting().await.is_empty());

	h.save_done("a").await;
	h.save_done("b").await;
	h.save_done("c").await;
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
}

#[tokio::test]
async fn interacting_client_blocks_its_bucket_only() {
	let h = harness();
	h.register("first", 5).await;
	h.register("second", 10).await;

	h.start_save(SaveKind::Save).await;
	h.reply("first", ClientReply::RequestInteraction).await;

	// The interacting client is not done, so its bucket has not
	// settled and the next bucket stays closed.
	assert_eq!(h.state_of("first").await, ClientState::Interacting);
	assert_eq!(h.state_of("second").await, ClientState::Idle);

	h.reply("first", ClientReply::InteractDone).await;
	h.save_done("first").await;

	assert_eq!(h.state_of("second").await, ClientState::SavingGlobal);
	h.save_done("second").await;
}

#[tokio::test]
async fn save_completion_while_interacting_releases_the_slot() {
	let h = harness();
	h.register("a", 50).await;
	h.register("b", 50).await;

	h.start_save(SaveKind::Save).await;
	h.reply("a", ClientReply::RequestInteraction).await;
	h.reply("b", ClientReply::RequestInteraction).await;

	// a finishes its save without ever sending interact-done; the slot
	// must still hand off.
	h.save_done("a").await;
	assert_eq!(h.state_of("a").await, ClientState::SaveDone);
	assert_eq!(h.interacting().await, vec!["b".to_string()]);

	h.reply("b", ClientReply::InteractDone).await;
	h.save_done("b").await;
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
}

#[tokio::test]
async fn save_completion_while_queued_withdraws_the_request() {
	let h = harness();
	h.register("a", 50).await;
	h.register("b", 50).await;

	h.start_save(SaveKind::Save).await;
	h.reply("a", ClientReply::RequestInteraction).await;
	h.reply("b", ClientReply::RequestInteraction).await;
	assert_eq!(h.state_of("b").await, ClientState::WaitingToInteract);

	h.save_done("b").await;
	assert_eq!(h.state_of("b").await, ClientState::SaveDone);

	h.transport.take_sent();
	h.reply("a", ClientReply::InteractDone).await;

	// The withdrawn request must not resurface as a grant.
	assert!(interact_grants(&h.transport.take_sent()).is_empty());
	assert!(h.interacting().await.is_empty());

	h.save_done("a").await;
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
}

#[tokio::test]
async fn interaction_request_outside_a_cycle_is_ignored() {
	let h = harness();
	h.register("a", 50).await;

	h.reply("a", ClientReply::RequestInteraction).await;
	assert_eq!(h.state_of("a").await, ClientState::Idle);
	assert!(interact_grants(&h.transport.take_sent()).is_empty());
}

#[tokio::test]
async fn phase2_intent_declared_during_interaction_is_kept() {
	let h = harness();
	h.register("wm", 50).await;
	h.register("app", 50).await;

	h.start_save(SaveKind::Save).await;
	h.reply("wm", ClientReply::RequestInteraction).await;
	h.reply("wm", ClientReply::RequestPhase2).await;

	// Still interacting; phase-1 settles only once the detour ends.
	assert_eq!(h.state_of("wm").await, ClientState::Interacting);
	h.save_done("app").await;
	let status = h.handle.cycle_status().await.expect("status query").expect("cycle should be active");
	assert_eq!(status.phase, sessiond::protocol::CyclePhase::Phase1);

	h.reply("wm", ClientReply::InteractDone).await;
	assert_eq!(h.state_of("wm").await, ClientState::SavingPhase2);
	let requests = h.transport.save_requests_for(&ClientId::new("wm"));
	assert!(requests.last().expect("phase-2 request").phase2);

	h.save_done("wm").await;
	assert!(h.handle.cycle_status().await.expect("status query").is_none());
}

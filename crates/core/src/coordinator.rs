//! The session coordinator: a single-task actor that drives save and
//! shutdown cycles across every registered client.
//!
//! # Event model
//!
//! All external stimulus - presentation commands, client replies from
//! the transport, timer expiries, spawn completions - enters one
//! unbounded queue and is processed strictly one event at a time, so no
//! two state transitions for the same client can ever race. Waiting for
//! a bucket to settle is not a blocked task: the coordinator re-enters
//! on every event and re-evaluates bucket completion as a predicate
//! over current state.
//!
//! Commands carry a oneshot responder, the same correlation shape the
//! transport layer uses for request/response matching; queries are just
//! commands whose result is a snapshot.

use std::sync::Arc;

use sessiond_protocol::{
	ClientId, ClientInfo, ClientProperties, ClientReply, ClientState, CyclePhase, CycleStatus, RestartHint, SaveKind, SaveRequest, SaveScope,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::cycle::{InteractDecision, SaveCycle};
use crate::error::{Result, SessionError};
use crate::launch::Launcher;
use crate::notify::{AbandonReason, Notifier, SessionNotification, SpawnPurpose};
use crate::registry::ClientRegistry;
use crate::schedule;
use crate::timeout::TimeoutSupervisor;
use crate::transport::Transport;

/// One unit of work for the coordinator loop.
#[derive(Debug)]
pub(crate) enum SessionEvent {
	Command(Command),
	Reply { id: ClientId, reply: ClientReply },
	DeadlineExpired { id: ClientId, generation: u64 },
	SpawnFinished { source: ClientId, purpose: SpawnPurpose, outcome: std::result::Result<u32, String> },
}

/// A presentation-layer command with its oneshot responder.
#[derive(Debug)]
pub(crate) enum Command {
	Register { id: ClientId, properties: ClientProperties, respond: oneshot::Sender<Result<ClientId>> },
	RequestSave { kind: SaveKind, respond: oneshot::Sender<Result<()>> },
	AbortCycle { respond: oneshot::Sender<Result<()>> },
	Kill { id: ClientId, respond: oneshot::Sender<Result<()>> },
	Clone { id: ClientId, respond: oneshot::Sender<Result<()>> },
	Clients { respond: oneshot::Sender<Result<Vec<ClientInfo>>> },
	CycleStatus { respond: oneshot::Sender<Result<Option<CycleStatus>>> },
}

/// What the advance loop decided to do next.
enum CycleStep {
	/// Current phase has unsettled clients; wait for events.
	Wait,
	/// Dispatch the next priority bucket.
	Bucket(u8, Vec<ClientId>, SaveKind),
	/// All buckets settled; open phase 2 for these waiters.
	OpenPhase2(Vec<ClientId>, SaveKind),
	/// Nothing left to do; the cycle is complete.
	Finish,
}

/// Cloneable handle to a running [`SessionCoordinator`].
///
/// Commands are correlated through oneshot responders; replies from the
/// transport's inbound event stream are folded in fire-and-forget via
/// [`CoordinatorHandle::client_reply`].
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
	events: mpsc::UnboundedSender<SessionEvent>,
	notifier: Notifier,
}

impl CoordinatorHandle {
	async fn command<T>(&self, build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
		let (tx, rx) = oneshot::channel();
		self.events.send(SessionEvent::Command(build(tx))).map_err(|_| SessionError::CoordinatorClosed)?;
		rx.await.map_err(|_| SessionError::CoordinatorClosed)?
	}

	/// Registers a client under `id` with its declared properties.
	pub async fn register(&self, id: ClientId, properties: ClientProperties) -> Result<ClientId> {
		self.command(|respond| Command::Register { id, properties, respond }).await
	}

	/// Starts a save cycle of the given kind.
	pub async fn request_save(&self, kind: SaveKind) -> Result<()> {
		self.command(|respond| Command::RequestSave { kind, respond }).await
	}

	/// Starts a shutdown cycle: save everything, then disconnect
	/// every client.
	pub async fn request_shutdown(&self) -> Result<()> {
		self.request_save(SaveKind::Shutdown).await
	}

	/// Aborts the running cycle, reverting mid-save clients to idle.
	pub async fn abort_cycle(&self) -> Result<()> {
		self.command(|respond| Command::AbortCycle { respond }).await
	}

	/// Forces a client straight to disconnecting, regardless of cycle.
	pub async fn kill(&self, id: ClientId) -> Result<()> {
		self.command(|respond| Command::Kill { id, respond }).await
	}

	/// Re-executes a client's clone command as a new, independent
	/// process. Has no effect on the source client's state.
	pub async fn clone_client(&self, id: ClientId) -> Result<()> {
		self.command(|respond| Command::Clone { id, respond }).await
	}

	/// Live client list in registration order.
	pub async fn clients(&self) -> Result<Vec<ClientInfo>> {
		self.command(|respond| Command::Clients { respond }).await
	}

	/// Phase and per-client standing of the active cycle, if any.
	pub async fn cycle_status(&self) -> Result<Option<CycleStatus>> {
		self.command(|respond| Command::CycleStatus { respond }).await
	}

	/// Folds one inbound client reply into the serialized event queue.
	pub fn client_reply(&self, id: ClientId, reply: ClientReply) -> Result<()> {
		self.events.send(SessionEvent::Reply { id, reply }).map_err(|_| SessionError::CoordinatorClosed)
	}

	/// Subscribes to engine notifications.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionNotification> {
		self.notifier.subscribe()
	}
}

/// Drives the save/shutdown protocol over all registered clients.
pub struct SessionCoordinator {
	config: SessionConfig,
	registry: ClientRegistry,
	cycle: Option<SaveCycle>,
	timeouts: TimeoutSupervisor,
	transport: Arc<dyn Transport>,
	launcher: Arc<dyn Launcher>,
	notifier: Notifier,
	events: mpsc::UnboundedReceiver<SessionEvent>,
	/// Sender used to fold async spawn completions back into the queue.
	self_events: mpsc::UnboundedSender<SessionEvent>,
	/// Latched once a shutdown cycle completes; suppresses restart-hint
	/// respawns while the session is coming down.
	shutting_down: bool,
}

impl SessionCoordinator {
	/// Builds a coordinator, spawns its event loop, and returns the
	/// handle used to talk to it.
	pub fn spawn(config: SessionConfig, transport: Arc<dyn Transport>, launcher: Arc<dyn Launcher>) -> CoordinatorHandle {
		let (tx, rx) = mpsc::unbounded_channel();
		let notifier = Notifier::new();
		let handle = CoordinatorHandle { events: tx.clone(), notifier: notifier.clone() };

		let coordinator = Self {
			config,
			registry: ClientRegistry::new(),
			cycle: None,
			timeouts: TimeoutSupervisor::new(tx.clone()),
			transport,
			launcher,
			notifier,
			events: rx,
			self_events: tx,
			shutting_down: false,
		};
		tokio::spawn(coordinator.run());
		handle
	}

	async fn run(mut self) {
		while let Some(event) = self.events.recv().await {
			self.handle_event(event).await;
		}
	}

	async fn handle_event(&mut self, event: SessionEvent) {
		match event {
			SessionEvent::Command(command) => self.handle_command(command).await,
			SessionEvent::Reply { id, reply } => self.handle_reply(id, reply).await,
			SessionEvent::DeadlineExpired { id, generation } => self.handle_deadline(id, generation).await,
			SessionEvent::SpawnFinished { source, purpose, outcome } => self.handle_spawn_finished(source, purpose, outcome),
		}
	}

	async fn handle_command(&mut self, command: Command) {
		match command {
			Command::Register { id, properties, respond } => {
				let _ = respond.send(self.register(id, properties));
			}
			Command::RequestSave { kind, respond } => {
				let _ = respond.send(self.start_cycle(kind).await);
			}
			Command::AbortCycle { respond } => {
				let _ = respond.send(self.abort_cycle().await);
			}
			Command::Kill { id, respond } => {
				let _ = respond.send(self.kill(id).await);
			}
			Command::Clone { id, respond } => {
				let _ = respond.send(self.clone_client(&id));
			}
			Command::Clients { respond } => {
				let _ = respond.send(Ok(self.registry.all().map(|client| client.info()).collect()));
			}
			Command::CycleStatus { respond } => {
				let _ = respond.send(Ok(self.cycle.as_ref().map(SaveCycle::status)));
			}
		}
	}

	async fn handle_reply(&mut self, id: ClientId, reply: ClientReply) {
		if self.registry.lookup(&id).is_none() {
			debug!(target = "sessiond.client", client = %id, "reply from unknown client ignored");
			return;
		}

		match reply {
			ClientReply::SaveYourselfDone { success } => self.handle_save_done(id, success).await,
			ClientReply::RequestInteraction => self.handle_request_interaction(id).await,
			ClientReply::InteractDone => self.handle_interact_done(id).await,
			ClientReply::RequestPhase2 => self.handle_request_phase2(id).await,
			ClientReply::SetProperties { properties } => self.handle_set_properties(id, properties),
			ClientReply::Disconnected => self.drop_client(&id).await,
			ClientReply::Error { message } => self.handle_client_error(id, message).await,
		}
	}

	// --- registration and administrative actions ---

	fn register(&mut self, id: ClientId, properties: ClientProperties) -> Result<ClientId> {
		let client = self.registry.register(id, properties, self.config.default_priority)?;
		let info = client.info();
		debug!(target = "sessiond.client", client = %info.id, program = ?info.program, priority = info.priority, "client registered");
		self.notifier.emit(SessionNotification::ClientRegistered(info.clone()));
		Ok(info.id)
	}

	async fn kill(&mut self, id: ClientId) -> Result<()> {
		let Some(client) = self.registry.lookup_mut(&id) else {
			return Err(SessionError::ClientNotFound(id));
		};
		if client.state() == ClientState::Disconnecting {
			return Ok(());
		}
		client.mark_killed();

		let _ = self.transition(&id, ClientState::Disconnecting);
		self.timeouts.cancel(&id);

		let next = self.cycle.as_mut().and_then(|cycle| cycle.remove(&id));
		if let Some(next) = next {
			self.grant_interaction(next).await;
		}

		if let Err(err) = self.transport.send_die(&id).await {
			warn!(target = "sessiond.client", client = %id, %err, "die delivery failed; dropping client");
			self.drop_client(&id).await;
			return Ok(());
		}

		self.timeouts.arm(&id, self.config.die_timeout());
		self.advance_cycle().await;
		Ok(())
	}

	fn clone_client(&mut self, id: &ClientId) -> Result<()> {
		let client = self.registry.lookup(id).ok_or_else(|| SessionError::ClientNotFound(id.clone()))?;
		let argv = client.clone_command().ok_or_else(|| SessionError::CloneUnavailable(id.clone()))?.to_vec();
		self.spawn_for(id.clone(), SpawnPurpose::Clone, argv);
		Ok(())
	}

	/// Submits a launcher task; its completion is folded back into the
	/// event queue rather than handled inline.
	fn spawn_for(&self, source: ClientId, purpose: SpawnPurpose, argv: Vec<String>) {
		let launcher = Arc::clone(&self.launcher);
		let events = self.self_events.clone();
		tokio::spawn(async move {
			let outcome = launcher.spawn(&argv).await.map_err(|err| err.to_string());
			let _ = events.send(SessionEvent::SpawnFinished { source, purpose, outcome });
		});
	}

	fn handle_spawn_finished(&mut self, source: ClientId, purpose: SpawnPurpose, outcome: std::result::Result<u32, String>) {
		let (pid, error) = match outcome {
			Ok(pid) => {
				info!(target = "sessiond.client", client = %source, ?purpose, pid, "spawn finished");
				(Some(pid), None)
			}
			Err(err) => {
				warn!(target = "sessiond.client", client = %source, ?purpose, error = %err, "spawn failed");
				(None, Some(err))
			}
		};
		self.notifier.emit(SessionNotification::ProcessSpawned { source, purpose, pid, error });
	}

	/// Removes a vanished client everywhere at once: registry, timers,
	/// and - atomically with the registry removal - the active cycle's
	/// pending set, so no stale wait survives it.
	async fn drop_client(&mut self, id: &ClientId) {
		self.timeouts.cancel(id);
		let Some(client) = self.registry.unregister(id) else {
			return;
		};
		debug!(target = "sessiond.client", client = %id, "client removed");

		let next = self.cycle.as_mut().and_then(|cycle| cycle.remove(id));
		if let Some(next) = next {
			self.grant_interaction(next).await;
		}
		self.notifier.emit(SessionNotification::ClientRemoved { id: id.clone() });

		if client.restart_hint() == RestartHint::Immediately && !client.killed() && !self.shutting_down {
			info!(target = "sessiond.client", client = %id, "respawning per restart hint");
			self.spawn_for(id.clone(), SpawnPurpose::Restart, client.restart_command().to_vec());
		}

		Box::pin(self.advance_cycle()).await;
	}

	fn handle_set_properties(&mut self, id: ClientId, properties: ClientProperties) {
		let frozen = self.cycle.as_ref().is_some_and(|cycle| cycle.is_member(&id));
		if frozen && properties.priority.is_some() {
			warn!(target = "sessiond.client", client = %id, "priority change ignored while the client is part of a running cycle");
		}

		let Some(client) = self.registry.lookup_mut(&id) else {
			return;
		};
		client.apply_properties(properties, !frozen);
		let info = client.info();
		debug!(target = "sessiond.client", client = %id, "client properties updated");
		self.notifier.emit(SessionNotification::ClientUpdated(info));
	}

	// --- cycle lifecycle ---

	async fn start_cycle(&mut self, kind: SaveKind) -> Result<()> {
		if self.cycle.is_some() {
			return Err(SessionError::CycleInProgress);
		}

		let buckets = schedule::priority_buckets(self.registry.all());
		info!(target = "sessiond.cycle", %kind, buckets = buckets.len(), clients = self.registry.len(), "starting save cycle");
		self.cycle = Some(SaveCycle::new(kind, buckets));
		self.notifier.emit(SessionNotification::CyclePhaseChanged { kind, phase: CyclePhase::Phase1 });

		self.advance_cycle().await;
		Ok(())
	}

	/// Drives the cycle as far as the barrier allows: dispatches the
	/// next bucket once the current one settled, opens phase 2 once
	/// every bucket settled, finishes once phase 2 settled. Safe to call
	/// after every event; does nothing while clients are still pending.
	async fn advance_cycle(&mut self) {
		loop {
			let step = {
				let Some(cycle) = self.cycle.as_mut() else { return };
				if !cycle.phase_settled() {
					CycleStep::Wait
				} else {
					match cycle.phase() {
						CyclePhase::Phase1 => {
							let kind = cycle.kind();
							if let Some(bucket) = cycle.pop_bucket() {
								CycleStep::Bucket(bucket.priority, bucket.members, kind)
							} else if cycle.has_phase2_waiters() {
								CycleStep::OpenPhase2(cycle.begin_phase2(), kind)
							} else {
								CycleStep::Finish
							}
						}
						CyclePhase::Phase2 => CycleStep::Finish,
						CyclePhase::Done | CyclePhase::Aborted => CycleStep::Wait,
					}
				}
			};

			match step {
				CycleStep::Wait => return,
				CycleStep::Bucket(priority, members, kind) => {
					debug!(target = "sessiond.cycle", priority, clients = members.len(), "dispatching bucket");
					for id in members {
						self.begin_save(id, SaveRequest::phase1(kind)).await;
					}
				}
				CycleStep::OpenPhase2(waiters, kind) => {
					info!(target = "sessiond.cycle", clients = waiters.len(), "entering phase 2");
					self.notifier.emit(SessionNotification::CyclePhaseChanged { kind, phase: CyclePhase::Phase2 });
					for id in waiters {
						self.begin_save(id, SaveRequest::phase2(kind)).await;
					}
				}
				CycleStep::Finish => {
					self.finish_cycle().await;
					return;
				}
			}
		}
	}

	/// Moves one client into its saving state and delivers the request.
	/// Failures abandon the client; the caller's advance loop re-checks
	/// the barrier afterwards.
	async fn begin_save(&mut self, id: ClientId, request: SaveRequest) {
		let Some(state) = self.registry.lookup(&id).map(|client| client.state()) else {
			return;
		};

		// A client can reach the phase-2 barrier mid-interaction; it
		// resumes into the save once the detour ends.
		let detoured = matches!(state, ClientState::Interacting | ClientState::WaitingToInteract);
		if !detoured {
			if let Err(err) = self.transition(&id, save_state_for(&request)) {
				warn!(target = "sessiond.cycle", client = %id, %err, "client cannot start saving");
				self.abandon(&id, AbandonReason::ProtocolViolation).await;
				return;
			}
		}

		if let Err(err) = self.transport.send_save_request(&id, request).await {
			warn!(target = "sessiond.cycle", client = %id, %err, "save request delivery failed");
			self.abandon(&id, AbandonReason::Transport).await;
			return;
		}

		if !detoured {
			self.timeouts.arm(&id, self.config.save_timeout());
		}
	}

	async fn finish_cycle(&mut self) {
		let Some(mut cycle) = self.cycle.take() else { return };
		let kind = cycle.kind();
		cycle.set_phase(CyclePhase::Done);
		info!(target = "sessiond.cycle", %kind, "cycle complete");
		self.notifier.emit(SessionNotification::CyclePhaseChanged { kind, phase: CyclePhase::Done });

		if kind.is_shutdown() {
			self.shutting_down = true;
			// The whole session ends: disconnect every registered
			// client, cycle member or not.
			for id in self.registry.ids() {
				let already_dying = self.registry.lookup(&id).is_some_and(|client| client.state() == ClientState::Disconnecting);
				if already_dying {
					continue;
				}
				let _ = self.transition(&id, ClientState::Disconnecting);
				if let Err(err) = self.transport.send_die(&id).await {
					warn!(target = "sessiond.client", client = %id, %err, "die delivery failed; dropping client");
					self.drop_client(&id).await;
					continue;
				}
				self.timeouts.arm(&id, self.config.die_timeout());
			}
		} else {
			for id in cycle.members() {
				let state = self.registry.lookup(id).map(|client| client.state());
				match state {
					Some(ClientState::Idle) | Some(ClientState::Disconnecting) | None => {}
					Some(_) => {
						let _ = self.transition(id, ClientState::Idle);
					}
				}
			}
		}

		self.notifier.emit(SessionNotification::CycleFinished { kind, phase: CyclePhase::Done });
	}

	async fn abort_cycle(&mut self) -> Result<()> {
		let Some(cycle) = self.cycle.take() else {
			return Err(SessionError::NoCycleActive);
		};
		let kind = cycle.kind();
		info!(target = "sessiond.cycle", %kind, "cycle aborted");

		for id in cycle.members() {
			self.timeouts.cancel(id);
			let state = self.registry.lookup(id).map(|client| client.state());
			match state {
				Some(ClientState::Idle) | Some(ClientState::Disconnecting) | None => continue,
				Some(_) => {}
			}

			// Everyone mid-save got a save request; tell them it is off.
			if let Err(err) = self.transport.send_cancel(id).await {
				debug!(target = "sessiond.cycle", client = %id, %err, "cancel delivery failed");
			}
			if let Some(client) = self.registry.lookup_mut(id) {
				client.take_resume_state();
			}
			let _ = self.transition(id, ClientState::Idle);
		}

		self.notifier.emit(SessionNotification::CyclePhaseChanged { kind, phase: CyclePhase::Aborted });
		self.notifier.emit(SessionNotification::CycleFinished { kind, phase: CyclePhase::Aborted });
		Ok(())
	}

	/// Drops a client from the current phase. Bookkeeping only: callers
	/// outside the advance loop must follow with [`Self::advance_cycle`].
	async fn abandon(&mut self, id: &ClientId, reason: AbandonReason) {
		let marked = self.cycle.as_mut().is_some_and(|cycle| cycle.mark_abandoned(id));
		if !marked {
			return;
		}
		self.timeouts.cancel(id);
		warn!(target = "sessiond.cycle", client = %id, ?reason, "client abandoned for this cycle");

		// Pull the client out of any interaction detour so the slot and
		// its state do not linger.
		let state = self.registry.lookup(id).map(|client| client.state());
		if matches!(state, Some(ClientState::Interacting) | Some(ClientState::WaitingToInteract)) {
			let resume = self.registry.lookup_mut(id).and_then(|client| client.take_resume_state());
			if let Some(resume) = resume {
				let _ = self.transition(id, resume);
			}
		}
		let next = self.cycle.as_mut().and_then(|cycle| cycle.interact_release(id));
		if let Some(next) = next {
			Box::pin(self.grant_interaction(next)).await;
		}

		self.notifier.emit(SessionNotification::ClientAbandoned { id: id.clone(), reason });
	}

	// --- client reply handling ---

	async fn handle_save_done(&mut self, id: ClientId, success: bool) {
		let pending = self.cycle.as_ref().is_some_and(|cycle| cycle.is_pending(&id));
		if !pending {
			// Late reply after abandonment, or chatter outside a cycle.
			debug!(target = "sessiond.cycle", client = %id, "ignoring save-done outside a pending save");
			return;
		}

		if !success {
			self.abandon(&id, AbandonReason::SaveFailed).await;
			self.advance_cycle().await;
			return;
		}

		if let Err(err) = self.transition(&id, ClientState::SaveDone) {
			warn!(target = "sessiond.cycle", client = %id, %err, "protocol violation on save completion");
			self.abandon(&id, AbandonReason::ProtocolViolation).await;
			self.advance_cycle().await;
			return;
		}

		self.timeouts.cancel(&id);
		if let Some(client) = self.registry.lookup_mut(&id) {
			client.take_resume_state();
		}

		let next = self.cycle.as_mut().and_then(|cycle| {
			cycle.mark_done(&id);
			cycle.interact_withdraw(&id)
		});
		debug!(target = "sessiond.cycle", client = %id, "client finished saving");
		if let Some(next) = next {
			self.grant_interaction(next).await;
		}

		self.advance_cycle().await;
	}

	async fn handle_request_phase2(&mut self, id: ClientId) {
		let in_phase1 = self
			.cycle
			.as_ref()
			.is_some_and(|cycle| cycle.phase() == CyclePhase::Phase1 && cycle.is_member(&id) && !cycle.is_abandoned(&id));
		if !in_phase1 {
			warn!(target = "sessiond.cycle", client = %id, "phase-2 request outside phase 1 ignored");
			return;
		}

		let Some(state) = self.registry.lookup(&id).map(|client| client.state()) else {
			return;
		};

		match state {
			ClientState::SavingGlobal | ClientState::SavingLocal | ClientState::WaitingToInteract => {
				// The request doubles as phase-1 completion.
				if state == ClientState::WaitingToInteract {
					let next = self.cycle.as_mut().and_then(|cycle| cycle.interact_withdraw(&id));
					if let Some(next) = next {
						self.grant_interaction(next).await;
					}
				}
				if self.transition(&id, ClientState::SaveDone).is_err() || self.transition(&id, ClientState::WaitingPhase2).is_err() {
					self.abandon(&id, AbandonReason::ProtocolViolation).await;
					self.advance_cycle().await;
					return;
				}
				self.timeouts.cancel(&id);
				if let Some(cycle) = self.cycle.as_mut() {
					cycle.request_phase2(&id);
					cycle.mark_done(&id);
				}
				debug!(target = "sessiond.cycle", client = %id, "queued for phase 2");
				self.advance_cycle().await;
			}
			ClientState::SaveDone => {
				if self.transition(&id, ClientState::WaitingPhase2).is_ok() {
					if let Some(cycle) = self.cycle.as_mut() {
						cycle.request_phase2(&id);
					}
					debug!(target = "sessiond.cycle", client = %id, "queued for phase 2");
				}
			}
			ClientState::Interacting => {
				// Finish the detour first; the resume path settles
				// phase-1 completion.
				if let Some(client) = self.registry.lookup_mut(&id) {
					client.set_resume_state(ClientState::WaitingPhase2);
				}
				if let Some(cycle) = self.cycle.as_mut() {
					cycle.request_phase2(&id);
				}
				debug!(target = "sessiond.cycle", client = %id, "queued for phase 2 after interaction");
			}
			other => {
				warn!(target = "sessiond.cycle", client = %id, state = %other, "phase-2 request in unexpected state ignored");
			}
		}
	}

	async fn handle_request_interaction(&mut self, id: ClientId) {
		let eligible = self.cycle.as_ref().is_some_and(|cycle| cycle.is_member(&id) && !cycle.is_abandoned(&id));
		if !eligible {
			warn!(target = "sessiond.cycle", client = %id, "interaction request outside an active save ignored");
			return;
		}

		let Some(state) = self.registry.lookup(&id).map(|client| client.state()) else {
			return;
		};
		if !matches!(
			state,
			ClientState::SavingGlobal | ClientState::SavingLocal | ClientState::SavingPhase2 | ClientState::SaveDone | ClientState::WaitingPhase2
		) {
			warn!(target = "sessiond.cycle", client = %id, state = %state, "interaction request in unexpected state ignored");
			return;
		}

		let decision = self.cycle.as_mut().map(|cycle| cycle.interact_request(&id));
		match decision {
			Some(InteractDecision::Granted) => self.grant_interaction(id).await,
			Some(InteractDecision::Queued) => {
				debug!(target = "sessiond.cycle", client = %id, "interaction request queued");
				if self.transition(&id, ClientState::WaitingToInteract).is_ok() {
					if let Some(client) = self.registry.lookup_mut(&id) {
						client.set_resume_state(state);
					}
					// The save deadline pauses while the client queues
					// behind the current holder.
					self.timeouts.cancel(&id);
				}
			}
			None => {}
		}
	}

	/// Grants the interaction slot to `id`, which must already be the
	/// recorded holder. Unusable holders pass the slot on.
	async fn grant_interaction(&mut self, id: ClientId) {
		let Some(state) = self.registry.lookup(&id).map(|client| client.state()) else {
			self.pass_interaction(&id).await;
			return;
		};

		match state {
			ClientState::SavingGlobal | ClientState::SavingLocal | ClientState::SavingPhase2 => {
				if let Some(client) = self.registry.lookup_mut(&id) {
					client.set_resume_state(state);
				}
			}
			ClientState::SaveDone | ClientState::WaitingPhase2 => {
				// No direct edge into Interacting; route through the
				// waiting state.
				if self.transition(&id, ClientState::WaitingToInteract).is_err() {
					self.pass_interaction(&id).await;
					return;
				}
				if let Some(client) = self.registry.lookup_mut(&id) {
					client.set_resume_state(state);
				}
			}
			ClientState::WaitingToInteract => {}
			other => {
				warn!(target = "sessiond.cycle", client = %id, state = %other, "cannot grant interaction in this state");
				self.pass_interaction(&id).await;
				return;
			}
		}

		if self.transition(&id, ClientState::Interacting).is_err() {
			self.pass_interaction(&id).await;
			return;
		}

		if let Err(err) = self.transport.send_interact(&id).await {
			warn!(target = "sessiond.cycle", client = %id, %err, "interact grant delivery failed");
			self.abandon(&id, AbandonReason::Transport).await;
			Box::pin(self.advance_cycle()).await;
			return;
		}

		self.timeouts.arm(&id, self.config.interact_timeout());
		debug!(target = "sessiond.cycle", client = %id, "interaction granted");
	}

	/// Hands the slot past a client that can no longer use it.
	async fn pass_interaction(&mut self, id: &ClientId) {
		let next = self.cycle.as_mut().and_then(|cycle| cycle.interact_release(id));
		if let Some(next) = next {
			Box::pin(self.grant_interaction(next)).await;
		}
	}

	async fn handle_interact_done(&mut self, id: ClientId) {
		let holds = self.cycle.as_ref().and_then(|cycle| cycle.interact_holder().cloned());
		if holds.as_ref() != Some(&id) {
			warn!(target = "sessiond.cycle", client = %id, "interact-done from a client that does not hold the grant");
			return;
		}

		self.timeouts.cancel(&id);

		let kind = self.cycle.as_ref().map(|cycle| cycle.kind());
		let resume = self
			.registry
			.lookup_mut(&id)
			.and_then(|client| client.take_resume_state())
			.or_else(|| kind.map(|kind| save_state_for(&SaveRequest::phase1(kind))));

		if let Some(resume) = resume {
			if let Err(err) = self.transition(&id, resume) {
				warn!(target = "sessiond.cycle", client = %id, %err, "cannot resume after interaction");
			} else {
				self.settle_after_resume(&id, resume).await;
			}
		}

		let next = self.cycle.as_mut().and_then(|cycle| cycle.interact_release(&id));
		if let Some(next) = next {
			self.grant_interaction(next).await;
		}

		self.advance_cycle().await;
	}

	/// Re-arms deadlines and settles deferred phase work for a client
	/// that just resumed from an interaction detour.
	async fn settle_after_resume(&mut self, id: &ClientId, resume: ClientState) {
		let phase = self.cycle.as_ref().map(|cycle| cycle.phase());
		let pending = self.cycle.as_ref().is_some_and(|cycle| cycle.is_pending(id));

		match resume {
			// The client declared phase-2 intent during the detour; that
			// settles its phase-1 participation now.
			ClientState::WaitingPhase2 if phase == Some(CyclePhase::Phase1) => {
				self.timeouts.cancel(id);
				if let Some(cycle) = self.cycle.as_mut() {
					cycle.mark_done(id);
				}
			}
			// Phase 2 opened while the client was interacting; start its
			// deferred save now.
			ClientState::WaitingPhase2 if phase == Some(CyclePhase::Phase2) && pending => {
				if self.transition(id, ClientState::SavingPhase2).is_ok() {
					self.timeouts.arm(id, self.config.save_timeout());
				}
			}
			state if state.is_saving() && pending => {
				self.timeouts.arm(id, self.config.save_timeout());
			}
			_ => {}
		}
	}

	async fn handle_client_error(&mut self, id: ClientId, message: String) {
		warn!(target = "sessiond.client", client = %id, error = %message, "client reported a protocol error");
		if self.cycle.as_ref().is_some_and(|cycle| cycle.is_pending(&id)) {
			self.abandon(&id, AbandonReason::ProtocolViolation).await;
			self.advance_cycle().await;
		}
	}

	async fn handle_deadline(&mut self, id: ClientId, generation: u64) {
		if !self.timeouts.expire(&id, generation) {
			// Raced a just-arrived reply or a re-arm; benign.
			return;
		}

		if self.cycle.as_ref().is_some_and(|cycle| cycle.is_pending(&id)) {
			warn!(target = "sessiond.cycle", client = %id, "deadline expired");
			self.abandon(&id, AbandonReason::Timeout).await;
			self.advance_cycle().await;
			return;
		}

		// Die deadline: the client was told to exit and never did.
		if self.registry.lookup(&id).is_some_and(|client| client.state() == ClientState::Disconnecting) {
			warn!(target = "sessiond.client", client = %id, "client ignored die request; dropping");
			self.drop_client(&id).await;
		}
	}

	// --- shared helpers ---

	/// Validates and applies one state transition, emitting the change.
	fn transition(&mut self, id: &ClientId, to: ClientState) -> Result<()> {
		let client = self.registry.lookup_mut(id).ok_or_else(|| SessionError::ClientNotFound(id.clone()))?;
		let from = client.transition(to)?;
		debug!(target = "sessiond.client", client = %id, %from, %to, "state changed");
		self.notifier.emit(SessionNotification::ClientStateChanged { id: id.clone(), from, to });
		Ok(())
	}
}

fn save_state_for(request: &SaveRequest) -> ClientState {
	if request.phase2 {
		ClientState::SavingPhase2
	} else {
		match request.scope {
			SaveScope::Global => ClientState::SavingGlobal,
			SaveScope::Local => ClientState::SavingLocal,
		}
	}
}

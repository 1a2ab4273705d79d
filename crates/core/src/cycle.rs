//! Bookkeeping for one in-progress save/shutdown cycle.
//!
//! A [`SaveCycle`] is pure accounting: which clients belong to the
//! cycle, which bucket is being processed, who still owes a save, who
//! was abandoned, and who is queued for the interaction grant. All
//! transport and timer side effects live in the coordinator; keeping
//! this struct passive makes the barrier and ordering rules directly
//! testable.

use std::collections::{HashSet, VecDeque};

use sessiond_protocol::{ClientCycleStatus, ClientId, ClientProgress, CyclePhase, CycleStatus, SaveKind};

use crate::schedule::PriorityBucket;

/// Outcome of an interaction request against the single system-wide slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InteractDecision {
	/// The slot was free; the client holds it now.
	Granted,
	/// Another client holds the slot; the requester was queued FIFO.
	Queued,
}

#[derive(Debug)]
pub(crate) struct SaveCycle {
	kind: SaveKind,
	phase: CyclePhase,
	/// Frozen membership in dispatch order; mid-cycle joiners are not
	/// added, mid-cycle leavers are purged.
	members: Vec<ClientId>,
	/// Buckets not yet dispatched, ascending priority.
	queue: VecDeque<PriorityBucket>,
	/// Dispatched clients that have not settled the current phase.
	pending: HashSet<ClientId>,
	completed: HashSet<ClientId>,
	abandoned: HashSet<ClientId>,
	/// Clients that asked for a second save pass, in request order.
	phase2_waiters: Vec<ClientId>,
	interact_holder: Option<ClientId>,
	interact_queue: VecDeque<ClientId>,
}

impl SaveCycle {
	pub(crate) fn new(kind: SaveKind, buckets: Vec<PriorityBucket>) -> Self {
		let members = buckets.iter().flat_map(|bucket| bucket.members.iter().cloned()).collect();
		Self {
			kind,
			phase: CyclePhase::Phase1,
			members,
			queue: buckets.into(),
			pending: HashSet::new(),
			completed: HashSet::new(),
			abandoned: HashSet::new(),
			phase2_waiters: Vec::new(),
			interact_holder: None,
			interact_queue: VecDeque::new(),
		}
	}

	pub(crate) fn kind(&self) -> SaveKind {
		self.kind
	}

	pub(crate) fn phase(&self) -> CyclePhase {
		self.phase
	}

	pub(crate) fn set_phase(&mut self, phase: CyclePhase) {
		self.phase = phase;
	}

	pub(crate) fn members(&self) -> &[ClientId] {
		&self.members
	}

	pub(crate) fn is_member(&self, id: &ClientId) -> bool {
		self.members.contains(id)
	}

	pub(crate) fn is_pending(&self, id: &ClientId) -> bool {
		self.pending.contains(id)
	}

	pub(crate) fn is_abandoned(&self, id: &ClientId) -> bool {
		self.abandoned.contains(id)
	}

	/// True once every dispatched client settled the current phase.
	pub(crate) fn phase_settled(&self) -> bool {
		self.pending.is_empty()
	}

	/// Dispatches the next bucket: its members become pending and the
	/// bucket is returned for the coordinator to act on.
	pub(crate) fn pop_bucket(&mut self) -> Option<PriorityBucket> {
		let bucket = self.queue.pop_front()?;
		self.pending.extend(bucket.members.iter().cloned());
		Some(bucket)
	}

	/// Marks a pending client as settled. Returns `false` for late or
	/// duplicate completions, which the caller must treat as no-ops.
	pub(crate) fn mark_done(&mut self, id: &ClientId) -> bool {
		if !self.pending.remove(id) {
			return false;
		}
		self.completed.insert(id.clone());
		true
	}

	/// Drops a client from the current phase by timeout or failure. The
	/// client stays a member (it is reported as abandoned) but no longer
	/// blocks the barrier.
	pub(crate) fn mark_abandoned(&mut self, id: &ClientId) -> bool {
		if !self.is_member(id) || self.abandoned.contains(id) {
			return false;
		}
		self.pending.remove(id);
		self.completed.remove(id);
		self.phase2_waiters.retain(|waiter| waiter != id);
		self.interact_queue.retain(|queued| queued != id);
		self.abandoned.insert(id.clone());
		true
	}

	/// Records a phase-2 request. Duplicates are collapsed; order is
	/// preserved for dispatch.
	pub(crate) fn request_phase2(&mut self, id: &ClientId) {
		if !self.phase2_waiters.contains(id) {
			self.phase2_waiters.push(id.clone());
		}
	}

	pub(crate) fn has_phase2_waiters(&self) -> bool {
		!self.phase2_waiters.is_empty()
	}

	/// Opens phase 2: every waiter owes a save again. Phase 2 has no
	/// buckets; all waiters are dispatched together.
	pub(crate) fn begin_phase2(&mut self) -> Vec<ClientId> {
		self.phase = CyclePhase::Phase2;
		let waiters = std::mem::take(&mut self.phase2_waiters);
		for id in &waiters {
			self.completed.remove(id);
			self.pending.insert(id.clone());
		}
		waiters
	}

	pub(crate) fn interact_holder(&self) -> Option<&ClientId> {
		self.interact_holder.as_ref()
	}

	/// Claims the interaction slot or joins the FIFO queue behind it.
	pub(crate) fn interact_request(&mut self, id: &ClientId) -> InteractDecision {
		if self.interact_holder.is_none() {
			self.interact_holder = Some(id.clone());
			return InteractDecision::Granted;
		}
		if self.interact_queue.iter().all(|queued| queued != id) {
			self.interact_queue.push_back(id.clone());
		}
		InteractDecision::Queued
	}

	/// Releases the slot if `id` holds it; the next queued client (if
	/// any) becomes the new holder and is returned.
	pub(crate) fn interact_release(&mut self, id: &ClientId) -> Option<ClientId> {
		if self.interact_holder.as_ref() != Some(id) {
			return None;
		}
		self.interact_holder = self.interact_queue.pop_front();
		self.interact_holder.clone()
	}

	/// Takes `id` out of interaction bookkeeping entirely, whether it
	/// holds the slot or sits in the queue. Used when a client's save
	/// completes with an interaction request still outstanding.
	pub(crate) fn interact_withdraw(&mut self, id: &ClientId) -> Option<ClientId> {
		self.interact_queue.retain(|queued| queued != id);
		self.interact_release(id)
	}

	/// Atomically purges a vanished client from every cycle structure so
	/// no stale wait survives it. Returns the next interaction holder
	/// when the removed client held the slot.
	pub(crate) fn remove(&mut self, id: &ClientId) -> Option<ClientId> {
		self.members.retain(|member| member != id);
		self.pending.remove(id);
		self.completed.remove(id);
		self.abandoned.remove(id);
		self.phase2_waiters.retain(|waiter| waiter != id);
		self.interact_queue.retain(|queued| queued != id);
		for bucket in &mut self.queue {
			bucket.members.retain(|member| member != id);
		}
		self.interact_release(id)
	}

	pub(crate) fn status(&self) -> CycleStatus {
		let clients = self
			.members
			.iter()
			.map(|id| {
				let progress = if self.abandoned.contains(id) {
					ClientProgress::Abandoned
				} else if self.completed.contains(id) {
					ClientProgress::Done
				} else {
					ClientProgress::Pending
				};
				ClientCycleStatus { id: id.clone(), progress }
			})
			.collect();

		CycleStatus { kind: self.kind, phase: self.phase, clients }
	}
}

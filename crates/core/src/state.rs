//! The per-client protocol state machine.
//!
//! Transitions are validated here and nowhere else; every state change
//! in the engine funnels through [`validate`] before it is applied. An
//! illegal request fails with [`SessionError::InvalidTransition`] and
//! leaves the client untouched - the coordinator logs it as a protocol
//! violation and abandons the client's cycle participation, but the
//! cycle itself carries on.

use sessiond_protocol::ClientState;

use crate::error::{Result, SessionError};

/// Checks whether `from -> to` is a legal protocol transition.
///
/// The table encodes, in order: Disconnecting is terminal; any live
/// state may begin disconnecting; reverting to Idle is always possible
/// (cycle completion and abort recovery); then the save/interact lattice.
pub fn validate(from: ClientState, to: ClientState) -> Result<()> {
	use ClientState::*;

	let legal = match (from, to) {
		(Disconnecting, _) => false,
		(_, Disconnecting) => true,
		_ if from == to => false,
		(_, Idle) => true,
		(Idle, SavingGlobal | SavingLocal) => true,
		(SavingGlobal | SavingLocal | SavingPhase2, Interacting | SaveDone | WaitingToInteract) => true,
		// A queued client may finish its save before the slot frees up.
		(WaitingToInteract, Interacting | SaveDone) => true,
		// Interaction resumes whatever state the client left behind.
		(Interacting, SavingGlobal | SavingLocal | SavingPhase2 | SaveDone | WaitingPhase2) => true,
		(SaveDone, WaitingPhase2 | WaitingToInteract) => true,
		(WaitingPhase2, SavingPhase2 | WaitingToInteract) => true,
		_ => false,
	};

	if legal {
		Ok(())
	} else {
		Err(SessionError::InvalidTransition { from, to })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ClientState::*;

	const ALL: [ClientState; 9] = [Idle, Interacting, SaveDone, SavingGlobal, SavingLocal, WaitingToInteract, WaitingPhase2, SavingPhase2, Disconnecting];

	#[test]
	fn save_cycle_happy_path() {
		assert!(validate(Idle, SavingGlobal).is_ok());
		assert!(validate(SavingGlobal, SaveDone).is_ok());
		assert!(validate(SaveDone, Idle).is_ok());
	}

	#[test]
	fn local_save_path() {
		assert!(validate(Idle, SavingLocal).is_ok());
		assert!(validate(SavingLocal, SaveDone).is_ok());
	}

	#[test]
	fn interaction_detour_and_resume() {
		assert!(validate(SavingGlobal, Interacting).is_ok());
		assert!(validate(Interacting, SavingGlobal).is_ok());
		assert!(validate(SavingLocal, WaitingToInteract).is_ok());
		assert!(validate(WaitingToInteract, Interacting).is_ok());
		assert!(validate(WaitingToInteract, SaveDone).is_ok());
		assert!(validate(Interacting, SaveDone).is_ok());
	}

	#[test]
	fn phase2_path() {
		assert!(validate(SaveDone, WaitingPhase2).is_ok());
		assert!(validate(WaitingPhase2, SavingPhase2).is_ok());
		assert!(validate(SavingPhase2, SaveDone).is_ok());
	}

	#[test]
	fn disconnecting_is_terminal() {
		for to in ALL {
			assert!(validate(Disconnecting, to).is_err(), "Disconnecting -> {to:?} must be illegal");
		}
	}

	#[test]
	fn every_live_state_may_disconnect() {
		for from in ALL {
			if from == Disconnecting {
				continue;
			}
			assert!(validate(from, Disconnecting).is_ok(), "{from:?} -> Disconnecting must be legal");
		}
	}

	#[test]
	fn abort_reverts_any_live_state_to_idle() {
		for from in ALL {
			if from == Disconnecting || from == Idle {
				continue;
			}
			assert!(validate(from, Idle).is_ok(), "{from:?} -> Idle must be legal");
		}
	}

	#[test]
	fn no_self_loops() {
		for state in ALL {
			assert!(validate(state, state).is_err(), "{state:?} self-loop must be illegal");
		}
	}

	#[test]
	fn skipping_the_save_is_illegal() {
		assert!(validate(Idle, SaveDone).is_err());
		assert!(validate(Idle, SavingPhase2).is_err());
		assert!(validate(SaveDone, SavingPhase2).is_err());
		assert!(validate(SavingGlobal, SavingPhase2).is_err());
	}

	#[test]
	fn invalid_transition_reports_both_states() {
		let err = validate(Idle, SaveDone).unwrap_err();
		match err {
			SessionError::InvalidTransition { from, to } => {
				assert_eq!(from, Idle);
				assert_eq!(to, SaveDone);
			}
			other => panic!("unexpected error: {other}"),
		}
	}
}

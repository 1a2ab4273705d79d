//! Error taxonomy for the session coordination engine.

use sessiond_protocol::{ClientId, ClientState};
use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Typed failures surfaced to command callers and collaborators.
///
/// Per-client failures (`Timeout`, `Transport`, `InvalidTransition`)
/// never abort a running cycle; the offending client is abandoned and
/// the cycle proceeds without it.
#[derive(Debug, Error)]
pub enum SessionError {
	/// Registration was attempted with an identity that is already known.
	#[error("client {0} is already registered")]
	DuplicateClient(ClientId),

	/// The addressed client is not registered.
	#[error("client {0} is not registered")]
	ClientNotFound(ClientId),

	/// A client (or caller) requested a transition the protocol state
	/// machine does not allow. State is left unchanged.
	#[error("illegal state transition {from} -> {to}")]
	InvalidTransition { from: ClientState, to: ClientState },

	/// A save or shutdown was requested while a cycle is running.
	#[error("a save cycle is already in progress")]
	CycleInProgress,

	/// Abort was requested with no cycle running.
	#[error("no save cycle is in progress")]
	NoCycleActive,

	/// A client did not respond within its deadline.
	#[error("client {0} did not respond within its deadline")]
	Timeout(ClientId),

	/// Clone was requested for a client that declared no clone command.
	#[error("client {0} has no clone command")]
	CloneUnavailable(ClientId),

	/// The transport collaborator could not deliver a request. During a
	/// cycle this is treated exactly like a timeout for that client.
	#[error("transport failure: {0}")]
	Transport(String),

	/// The process-launch collaborator failed to start a command.
	#[error("failed to spawn process: {0}")]
	Spawn(String),

	/// The coordinator event loop has shut down; no further commands can
	/// be processed.
	#[error("coordinator event loop is no longer running")]
	CoordinatorClosed,
}

//! Inbound protocol replies from clients.

use serde::{Deserialize, Serialize};

use crate::properties::ClientProperties;

/// A reply received from one client, as delivered by the transport
/// collaborator's event stream. The engine folds these into its
/// serialized event queue; ordering between clients is whatever the
/// transport observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientReply {
	/// The client finished its current save. `success = false` means the
	/// client could not save and its cycle participation is over.
	SaveYourselfDone { success: bool },
	/// The client asks for the exclusive interaction grant.
	RequestInteraction,
	/// The client released the interaction grant.
	InteractDone,
	/// The client wants a second save pass once all phase-1 saves settle.
	RequestPhase2,
	/// The client updated its declared properties.
	SetProperties { properties: ClientProperties },
	/// The client's connection is gone.
	Disconnected,
	/// The transport reported a client-side protocol error.
	Error { message: String },
}

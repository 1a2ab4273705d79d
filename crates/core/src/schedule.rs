//! Priority-bucket scheduling of save requests.
//!
//! Clients sharing a priority value form one bucket; buckets are
//! processed in ascending priority order so that low-priority-value
//! clients (window managers, panels - things other clients reference)
//! persist their state first. The scheduler is stateless: bucket order
//! is recomputed from live registry contents at the instant a cycle
//! starts, which is what freezes cycle membership - clients connecting
//! mid-cycle simply wait for the next one.

use std::collections::BTreeMap;

use sessiond_protocol::ClientId;

use crate::client::Client;

/// Clients sharing one priority value, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityBucket {
	pub priority: u8,
	pub members: Vec<ClientId>,
}

/// Groups `clients` into ascending-priority buckets. Iteration order of
/// the input decides intra-bucket order, so callers pass registry-order
/// iterators and determinism follows.
pub fn priority_buckets<'a>(clients: impl Iterator<Item = &'a Client>) -> Vec<PriorityBucket> {
	let mut grouped: BTreeMap<u8, Vec<ClientId>> = BTreeMap::new();
	for client in clients {
		grouped.entry(client.priority()).or_default().push(client.id().clone());
	}

	grouped
		.into_iter()
		.map(|(priority, members)| PriorityBucket { priority, members })
		.collect()
}

//! The process-launch seam used for clone and restart.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SessionError};

/// Starts a client command vector as a new, independent process. The
/// spawned process registers itself through the normal transport path;
/// the launcher only reports the pid.
#[async_trait]
pub trait Launcher: Send + Sync {
	async fn spawn(&self, argv: &[String]) -> Result<u32>;
}

/// OS-backed launcher used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
	async fn spawn(&self, argv: &[String]) -> Result<u32> {
		sessiond_runtime::spawn_detached(argv).map_err(|err| SessionError::Spawn(err.to_string()))
	}
}

/// In-memory launcher for tests: records command vectors and hands out
/// fake pids.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
	spawned: Arc<Mutex<Vec<Vec<String>>>>,
	fail: Arc<Mutex<bool>>,
}

impl FakeLauncher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every future spawn fail.
	pub fn fail_spawns(&self) {
		*self.fail.lock() = true;
	}

	/// Takes all recorded command vectors, clearing the buffer.
	pub fn take_spawned(&self) -> Vec<Vec<String>> {
		std::mem::take(&mut *self.spawned.lock())
	}
}

#[async_trait]
impl Launcher for FakeLauncher {
	async fn spawn(&self, argv: &[String]) -> Result<u32> {
		if *self.fail.lock() {
			return Err(SessionError::Spawn("spawn disabled by test".to_string()));
		}
		let mut spawned = self.spawned.lock();
		spawned.push(argv.to_vec());
		Ok(1000 + spawned.len() as u32)
	}
}

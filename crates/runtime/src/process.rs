//! Client process spawn and liveness helpers.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// Spawns a client command vector as a detached process and returns its
/// pid. Stdio is discarded; a background thread reaps the child so it
/// never lingers as a zombie.
pub fn spawn_detached(argv: &[String]) -> io::Result<u32> {
	let Some((program, args)) = argv.split_first() else {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command vector"));
	};

	let mut child = Command::new(program)
		.args(args)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()?;

	let pid = child.id();
	debug!(target = "sessiond.runtime", program = %program, pid, "spawned client process");

	std::thread::spawn(move || {
		let _ = child.wait();
	});

	Ok(pid)
}

/// Returns `true` when a process with `pid` appears alive on this platform.
pub fn pid_is_alive(pid: u32) -> bool {
	#[cfg(unix)]
	{
		if pid == 0 {
			return false;
		}

		if PathBuf::from("/proc").join(pid.to_string()).exists() {
			return true;
		}

		Command::new("kill")
			.arg("-0")
			.arg(pid.to_string())
			.status()
			.map(|status| status.success())
			.unwrap_or(pid == std::process::id())
	}

	#[cfg(windows)]
	{
		let filter = format!("PID eq {pid}");
		if let Ok(output) = Command::new("tasklist").args(["/FI", &filter, "/FO", "CSV", "/NH"]).output() {
			if output.status.success() {
				let stdout = String::from_utf8_lossy(&output.stdout);
				return tasklist_has_pid(stdout.as_ref(), pid);
			}
		}

		pid == std::process::id()
	}

	#[cfg(not(any(unix, windows)))]
	{
		pid == std::process::id()
	}
}

#[cfg(any(test, windows))]
fn tasklist_has_pid(output: &str, pid: u32) -> bool {
	let pid_str = pid.to_string();
	output.lines().any(|line| {
		let line = line.trim();
		if !line.starts_with('"') {
			return false;
		}

		line.trim_matches('"')
			.split("\",\"")
			.nth(1)
			.is_some_and(|field| field.trim() == pid_str.as_str())
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[cfg(any(test, windows))]
	#[test]
	fn tasklist_parser_matches_csv_line() {
		let output = "\"xterm.exe\",\"1234\",\"Console\",\"1\",\"250,000 K\"\r\n";
		assert!(tasklist_has_pid(output, 1234));
		assert!(!tasklist_has_pid(output, 9999));
	}

	#[cfg(any(test, windows))]
	#[test]
	fn tasklist_parser_ignores_non_csv_lines() {
		let output = "INFO: No tasks are running which match the specified criteria.\r\n";
		assert!(!tasklist_has_pid(output, 1234));
	}

	#[cfg(unix)]
	#[test]
	fn current_process_is_alive() {
		assert!(pid_is_alive(std::process::id()));
	}

	#[cfg(unix)]
	#[test]
	fn pid_zero_is_never_alive() {
		assert!(!pid_is_alive(0));
	}

	#[test]
	fn empty_command_vector_is_rejected() {
		let err = spawn_detached(&[]).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
	}

	#[cfg(unix)]
	#[test]
	fn spawn_detached_returns_a_pid() {
		let argv = vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()];
		let pid = spawn_detached(&argv).expect("sh should spawn");
		assert!(pid > 0);
	}
}

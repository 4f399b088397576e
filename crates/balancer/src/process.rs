//! Launching and stopping sibling worker processes.
//!
//! The [`ProcessHost`] trait is the seam between the fleet manager and the
//! operating system. [`OsProcessHost`] forks the configured executables and
//! supervises each child in its own task: stopping a process only signals
//! that task, and the kill-and-wait happens off the event loop. Every exit is
//! reported back as a [`ProcessEvent`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{LaunchMode, LaunchSpec};

/// OS process id of a launched sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of process the balancer launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessClass {
    Simulation,
    Bot,
}

impl std::fmt::Display for ProcessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => f.write_str("simulation"),
            Self::Bot => f.write_str("bot"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {class} process {program}: {source}")]
    Spawn {
        class: ProcessClass,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} process exited before reporting a pid")]
    NoPid(ProcessClass),

    #[error("no known process {0}")]
    UnknownProcess(ProcessId),
}

/// What a spawn request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A child process is running under this pid.
    Started(ProcessId),
    /// The request was logged for a developer to act on.
    Requested,
}

/// Completion of a supervised process, delivered to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Exited {
        pid: ProcessId,
        class: ProcessClass,
        code: Option<i32>,
        /// `true` when the exit followed a [`ProcessHost::stop`].
        requested: bool,
    },
    StopFailed {
        pid: ProcessId,
        class: ProcessClass,
        error: String,
    },
}

pub trait ProcessHost {
    /// Start a process of `class`. Must not block.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] if the process could not be started.
    fn spawn(&mut self, class: ProcessClass) -> Result<SpawnOutcome, ProcessError>;

    /// Ask a process to stop. Completion arrives later as a [`ProcessEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::UnknownProcess`] for pids this host never
    /// started or has already released.
    fn stop(&mut self, pid: ProcessId) -> Result<(), ProcessError>;

    /// Returns `true` if `pid` is a live child of this host.
    fn knows(&self, pid: ProcessId) -> bool;

    /// Drop bookkeeping for a process whose exit has been handled.
    fn release(&mut self, pid: ProcessId);

    /// Find the child behind a worker id of the form `<Role>_<pid>`.
    fn resolve(&self, worker_id: &str) -> Option<ProcessId> {
        pid_from_worker_id(worker_id).filter(|pid| self.knows(*pid))
    }
}

/// Parse the pid suffix of a worker id such as `Server_4242`.
#[must_use]
pub fn pid_from_worker_id(worker_id: &str) -> Option<ProcessId> {
    let (_, pid) = worker_id.rsplit_once('_')?;
    pid.parse().ok().map(ProcessId)
}

#[derive(Debug)]
struct Supervised {
    class: ProcessClass,
    stop: Option<oneshot::Sender<()>>,
}

/// [`ProcessHost`] backed by `tokio::process`.
#[derive(Debug)]
pub struct OsProcessHost {
    launch: LaunchSpec,
    children: HashMap<ProcessId, Supervised>,
    events: mpsc::UnboundedSender<ProcessEvent>,
}

impl OsProcessHost {
    /// Create a host reporting exits on `events`. Must be used from within a
    /// tokio runtime.
    #[must_use]
    pub fn new(launch: LaunchSpec, events: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            launch,
            children: HashMap::new(),
            events,
        }
    }

    fn program(&self, class: ProcessClass) -> &PathBuf {
        match class {
            ProcessClass::Simulation => &self.launch.worker_executable,
            ProcessClass::Bot => &self.launch.bot_executable,
        }
    }
}

impl ProcessHost for OsProcessHost {
    fn spawn(&mut self, class: ProcessClass) -> Result<SpawnOutcome, ProcessError> {
        let program = self.program(class).clone();
        if self.launch.mode == LaunchMode::External {
            info!(
                %class,
                program = %program.display(),
                host = %self.launch.host,
                port = self.launch.port,
                "development mode: start the process by hand"
            );
            return Ok(SpawnOutcome::Requested);
        }

        let child = Command::new(&program)
            .arg("--host")
            .arg(&self.launch.host)
            .arg("--port")
            .arg(self.launch.port.to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                class,
                program: program.clone(),
                source,
            })?;
        let pid = child.id().map(ProcessId).ok_or(ProcessError::NoPid(class))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(supervise(pid, class, child, stop_rx, self.events.clone()));
        self.children.insert(
            pid,
            Supervised {
                class,
                stop: Some(stop_tx),
            },
        );
        info!(%pid, %class, program = %program.display(), "started process");
        Ok(SpawnOutcome::Started(pid))
    }

    fn stop(&mut self, pid: ProcessId) -> Result<(), ProcessError> {
        let child = self
            .children
            .get_mut(&pid)
            .ok_or(ProcessError::UnknownProcess(pid))?;
        match child.stop.take() {
            Some(stop) => {
                info!(%pid, class = %child.class, "stopping process");
                if stop.send(()).is_err() {
                    debug!(%pid, "process already exited");
                }
            }
            None => debug!(%pid, "stop already requested"),
        }
        Ok(())
    }

    fn knows(&self, pid: ProcessId) -> bool {
        self.children.contains_key(&pid)
    }

    fn release(&mut self, pid: ProcessId) {
        self.children.remove(&pid);
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    StopRequested,
}

async fn supervise(
    pid: ProcessId,
    class: ProcessClass,
    mut child: Child,
    stop: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<ProcessEvent>,
) {
    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        Ok(()) = stop => Outcome::StopRequested,
    };

    let event = match outcome {
        Outcome::Exited(status) => {
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(%pid, error = %e, "failed to wait on process");
                    None
                }
            };
            ProcessEvent::Exited {
                pid,
                class,
                code,
                requested: false,
            }
        }
        Outcome::StopRequested => match child.kill().await {
            Ok(()) => ProcessEvent::Exited {
                pid,
                class,
                code: None,
                requested: true,
            },
            Err(e) => ProcessEvent::StopFailed {
                pid,
                class,
                error: e.to_string(),
            },
        },
    };

    if events.send(event).is_err() {
        debug!(%pid, "event loop gone; dropping process event");
    }
}

/// A [`ProcessHost`] that records requests instead of touching the OS.
#[cfg(test)]
pub mod testing {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingHost {
        next_pid: u32,
        pub spawned: Vec<(ProcessClass, ProcessId)>,
        pub stopped: Vec<ProcessId>,
        pub live: HashSet<ProcessId>,
        pub fail_spawns: bool,
    }

    impl RecordingHost {
        #[must_use]
        pub fn new() -> Self {
            Self {
                next_pid: 1000,
                ..Self::default()
            }
        }

        pub fn spawned_of(&self, class: ProcessClass) -> Vec<ProcessId> {
            self.spawned
                .iter()
                .filter(|(c, _)| *c == class)
                .map(|(_, pid)| *pid)
                .collect()
        }
    }

    impl ProcessHost for RecordingHost {
        fn spawn(&mut self, class: ProcessClass) -> Result<SpawnOutcome, ProcessError> {
            if self.fail_spawns {
                return Err(ProcessError::NoPid(class));
            }
            let pid = ProcessId(self.next_pid);
            self.next_pid += 1;
            self.spawned.push((class, pid));
            self.live.insert(pid);
            Ok(SpawnOutcome::Started(pid))
        }

        fn stop(&mut self, pid: ProcessId) -> Result<(), ProcessError> {
            if !self.live.contains(&pid) {
                return Err(ProcessError::UnknownProcess(pid));
            }
            self.stopped.push(pid);
            Ok(())
        }

        fn knows(&self, pid: ProcessId) -> bool {
            self.live.contains(&pid)
        }

        fn release(&mut self, pid: ProcessId) {
            self.live.remove(&pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;

    fn launch(mode: LaunchMode) -> LaunchSpec {
        LaunchSpec {
            mode,
            host: "127.0.0.1".to_string(),
            port: 7777,
            worker_executable: PathBuf::from("/nonexistent/server"),
            bot_executable: PathBuf::from("/nonexistent/bot"),
        }
    }

    #[test]
    fn test_pid_from_worker_id() {
        assert_eq!(pid_from_worker_id("Server_4242"), Some(ProcessId(4242)));
        assert_eq!(pid_from_worker_id("Server_a_17"), Some(ProcessId(17)));
        assert_eq!(pid_from_worker_id("Server"), None);
        assert_eq!(pid_from_worker_id("Server_x"), None);
    }

    #[test]
    fn test_resolve_requires_known_child() {
        let mut host = RecordingHost::new();
        let SpawnOutcome::Started(pid) = host.spawn(ProcessClass::Simulation).unwrap() else {
            panic!("expected a started process");
        };
        assert_eq!(host.resolve(&format!("Server_{pid}")), Some(pid));
        assert_eq!(host.resolve("Server_1"), None);
    }

    #[tokio::test]
    async fn test_external_mode_only_logs() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = OsProcessHost::new(launch(LaunchMode::External), tx);
        assert_eq!(host.spawn(ProcessClass::Simulation).unwrap(), SpawnOutcome::Requested);
        assert!(host.children.is_empty());
    }

    #[tokio::test]
    async fn test_fork_missing_executable_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = OsProcessHost::new(launch(LaunchMode::Fork), tx);
        assert!(matches!(
            host.spawn(ProcessClass::Bot),
            Err(ProcessError::Spawn { class: ProcessClass::Bot, .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_unknown_process() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut host = OsProcessHost::new(launch(LaunchMode::Fork), tx);
        assert!(matches!(
            host.stop(ProcessId(1)),
            Err(ProcessError::UnknownProcess(ProcessId(1)))
        ));
    }
}

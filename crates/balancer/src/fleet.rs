//! Sizing the simulation worker fleet and the bot population.

use std::collections::VecDeque;

use tracing::{debug, error, info, warn};

use crate::process::{ProcessClass, ProcessHost, ProcessId, SpawnOutcome};
use crate::roster::WorkerRoster;

/// Simulation workers wanted for `clients` connected clients. Always a
/// perfect square so the grid has no idle workers.
#[must_use]
pub fn required_workers(clients: usize) -> usize {
    match clients {
        0..4 => 1,
        4..8 => 4,
        8..32 => 9,
        _ => 16,
    }
}

/// Whether a simulation worker is on its way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetState {
    Idle,
    /// A process was requested and its worker has not registered yet.
    Adjusting,
}

#[derive(Debug)]
pub struct FleetManager {
    state: FleetState,
    target_workers: usize,
    bot_flag: String,
    /// Running bots, oldest first.
    bots: VecDeque<ProcessId>,
}

impl FleetManager {
    #[must_use]
    pub fn new(bot_flag: impl Into<String>) -> Self {
        Self {
            state: FleetState::Idle,
            target_workers: required_workers(0),
            bot_flag: bot_flag.into(),
            bots: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> FleetState {
        self.state
    }

    /// The worker count the fleet is converging on.
    #[must_use]
    pub fn target_workers(&self) -> usize {
        self.target_workers
    }

    #[must_use]
    pub fn bots(&self) -> &VecDeque<ProcessId> {
        &self.bots
    }

    /// A simulation worker registered; another adjustment may start.
    pub fn worker_registered(&mut self) {
        if self.state == FleetState::Adjusting {
            debug!("worker arrived; fleet adjustment complete");
        }
        self.state = FleetState::Idle;
    }

    /// Move the fleet one step towards the size `clients` needs: start one
    /// worker, or stop the oldest live one.
    pub fn update_worker_processes<H: ProcessHost>(
        &mut self,
        clients: usize,
        roster: &mut WorkerRoster,
        host: &mut H,
    ) {
        if self.state == FleetState::Adjusting {
            debug!(clients, "fleet adjustment in flight; skipping");
            return;
        }

        let required = required_workers(clients);
        let live = roster.live_count();
        self.target_workers = required;
        if required > live {
            info!(clients, live, required, "starting simulation worker");
            self.start_worker(host);
        } else if required < live {
            info!(clients, live, required, "stopping simulation worker");
            Self::stop_worker(roster, host);
        }
    }

    fn start_worker<H: ProcessHost>(&mut self, host: &mut H) {
        match host.spawn(ProcessClass::Simulation) {
            Ok(SpawnOutcome::Started(pid)) => debug!(%pid, "simulation worker launched"),
            Ok(SpawnOutcome::Requested) => debug!("simulation worker requested"),
            Err(e) => error!(error = %e, "failed to start simulation worker"),
        }
        // Held even after a failed spawn; only a registering worker clears it.
        self.state = FleetState::Adjusting;
    }

    fn stop_worker<H: ProcessHost>(roster: &mut WorkerRoster, host: &mut H) {
        let Some(worker) = roster.oldest_live_mut() else {
            warn!("no live worker to stop");
            return;
        };
        worker.being_shut_down = true;
        match worker.process {
            Some(pid) => {
                if let Err(e) = host.stop(pid) {
                    error!(
                        worker_id = %worker.worker_id,
                        %pid,
                        error = %e,
                        "failed to stop worker"
                    );
                }
            }
            None => warn!(worker_id = %worker.worker_id, "no process handle for worker"),
        }
    }

    /// React to a runtime flag. Only the bot count flag is understood.
    pub fn on_flag_update<H: ProcessHost>(&mut self, key: &str, value: Option<&str>, host: &mut H) {
        if key != self.bot_flag {
            debug!(key, "ignoring flag");
            return;
        }
        let target = match value.map(str::trim) {
            None => 0,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) => n,
                Err(e) => {
                    warn!(key, value = raw, error = %e, "malformed bot count");
                    return;
                }
            },
        };
        self.set_bot_count(target, host);
    }

    fn set_bot_count<H: ProcessHost>(&mut self, target: usize, host: &mut H) {
        let current = self.bots.len();
        info!(current, target, "adjusting bot count");

        for _ in current..target {
            match host.spawn(ProcessClass::Bot) {
                Ok(SpawnOutcome::Started(pid)) => self.bots.push_back(pid),
                Ok(SpawnOutcome::Requested) => {}
                Err(e) => error!(error = %e, "failed to start bot"),
            }
        }
        while self.bots.len() > target {
            let Some(pid) = self.bots.pop_front() else {
                break;
            };
            if let Err(e) = host.stop(pid) {
                error!(%pid, error = %e, "failed to stop bot");
            }
        }
    }

    /// Forget a bot whose process ended. Returns `false` if the pid was not
    /// one of ours.
    pub fn bot_exited(&mut self, pid: ProcessId) -> bool {
        let Some(index) = self.bots.iter().position(|p| *p == pid) else {
            return false;
        };
        self.bots.remove(index);
        true
    }
}

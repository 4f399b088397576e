//! The balancer's async event loop.
//!
//! One task multiplexes every input:
//!
//! 1. Ops from the transport on `spatial.op.<worker_id>`.
//! 2. Runtime flags on `spatial.flag.update`.
//! 3. Completions from supervised processes.
//! 4. A periodic sweep that re-reconciles every entity.
//! 5. Ctrl-C.
//!
//! After each input the coordinator's queued writes are published to
//! `spatial.cmd.<worker_id>`.

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use spatial_net::{FlagUpdate, NatsConnection, WorldOp, decode, subjects};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::coordinator::{Coordinator, Flow};
use crate::process::{ProcessEvent, ProcessHost};

/// Configuration for the event loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// The balancer's worker id on the transport.
    pub worker_id: String,
    /// Period of the full reconciliation sweep.
    pub sweep_interval: Duration,
}

pub struct EventLoop<H> {
    config: LoopConfig,
    coordinator: Coordinator<H>,
    process_events: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl<H: ProcessHost> EventLoop<H> {
    #[must_use]
    pub fn new(
        config: LoopConfig,
        coordinator: Coordinator<H>,
        process_events: mpsc::UnboundedReceiver<ProcessEvent>,
    ) -> Self {
        Self {
            config,
            coordinator,
            process_events,
        }
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator<H> {
        &self.coordinator
    }

    /// Decode and apply one op payload. Undecodable payloads are logged and
    /// skipped.
    pub fn dispatch_op(&mut self, payload: &[u8]) -> Flow {
        match decode::<WorldOp>(payload) {
            Ok(op) => self.coordinator.handle(op),
            Err(e) => {
                warn!(error = %e, "dropping undecodable op");
                Flow::Continue
            }
        }
    }

    /// Decode and apply one flag update payload.
    pub fn dispatch_flag(&mut self, payload: &[u8]) {
        match decode::<FlagUpdate>(payload) {
            Ok(flag) => {
                self.coordinator.handle(flag.into());
            }
            Err(e) => warn!(error = %e, "dropping undecodable flag update"),
        }
    }

    /// Publish every queued command. Send failures are logged; the command
    /// is not retried.
    async fn flush(&mut self, conn: &NatsConnection) {
        let commands = self.coordinator.drain_commands();
        if commands.is_empty() {
            return;
        }
        debug!(count = commands.len(), "publishing commands");
        for command in &commands {
            if let Err(e) = conn.send_command(&self.config.worker_id, command).await {
                error!(msg_type = command.msg_type(), error = %e, "failed to send command");
            }
        }
    }

    /// Run until the transport disconnects, a subscription closes, or Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if subscribing fails.
    pub async fn run(mut self, conn: &NatsConnection) -> Result<()> {
        let mut ops = conn.subscribe(&subjects::ops(&self.config.worker_id)).await?;
        let mut flags = conn.subscribe(subjects::FLAG_UPDATE).await?;
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            worker_id = %self.config.worker_id,
            sweep_ms = self.config.sweep_interval.as_millis() as u64,
            "event loop started"
        );
        self.coordinator.start();
        self.flush(conn).await;

        loop {
            tokio::select! {
                message = ops.next() => {
                    let Some(message) = message else {
                        warn!("op subscription closed");
                        break;
                    };
                    if self.dispatch_op(&message.payload) == Flow::Shutdown {
                        self.flush(conn).await;
                        break;
                    }
                }
                message = flags.next() => {
                    let Some(message) = message else {
                        warn!("flag subscription closed");
                        break;
                    };
                    self.dispatch_flag(&message.payload);
                }
                Some(event) = self.process_events.recv() => {
                    self.coordinator.handle_process_event(event);
                }
                _ = sweep.tick() => {
                    let moved = self.coordinator.reconcile_all();
                    if moved > 0 {
                        debug!(moved, "sweep reassigned entities");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
            }
            self.flush(conn).await;
        }

        if let Err(e) = conn.flush().await {
            warn!(error = %e, "failed to flush NATS connection");
        }
        info!("event loop stopped");
        Ok(())
    }
}

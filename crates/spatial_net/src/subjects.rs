//! NATS subject hierarchy.
//!
//! All balancer subjects are prefixed with `spatial.` to namespace within a
//! shared NATS cluster:
//!
//! ```text
//! spatial.op.<worker_id>    transport → worker   (WorldOp)
//! spatial.cmd.<worker_id>   worker → transport   (WorldCommand)
//! spatial.flag.update       operator → *         (FlagUpdate)
//! ```

/// Root prefix for all balancer NATS subjects.
pub const PREFIX: &str = "spatial";

/// Runtime flag updates. Operator → all workers.
pub const FLAG_UPDATE: &str = "spatial.flag.update";

/// Build the subject on which the transport delivers ops to a worker.
///
/// `spatial.op.<worker_id>`
#[must_use]
pub fn ops(worker_id: &str) -> String {
    format!("{PREFIX}.op.{worker_id}")
}

/// Build the subject on which a worker sends commands to the transport.
///
/// `spatial.cmd.<worker_id>`
#[must_use]
pub fn commands(worker_id: &str) -> String {
    format!("{PREFIX}.cmd.{worker_id}")
}

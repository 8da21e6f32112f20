//! Falcon reconfiguration daemon.
//!
//! Consumes `Reconfig` events emitted by the scheduler's permit gate,
//! waits for the cluster to quiesce, then moves idle devices across the
//! fabric until the gated pod's destination node can cover its demand.
//!
//! One logical reconfiguration runs at a time: the event consumer and the
//! reconfigurer are joined by a bounded(1) channel, so a busy
//! reconfigurer defers subsequent triggers and the oldest queued trigger
//! proceeds next.

pub mod config;
pub mod daemon;
pub mod reconfigure;

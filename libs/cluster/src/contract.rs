//! Names that cross process boundaries.
//!
//! These strings are contracts with the orchestrator, the container
//! runtime hooks, and between the scheduler and the reconfiguration
//! daemon. Changing any of them is a deployment-wide migration.

/// The scalar resource under which composable GPUs are requested and
/// advertised.
pub const GPU_RESOURCE_NAME: &str = "falcon.com/gpu";

/// Event reason emitted by the scheduler's permit gate and consumed by the
/// reconfiguration daemon.
pub const RECONFIG_EVENT_REASON: &str = "Reconfig";

/// Pod annotations forming the scheduler -> daemon side channel.
pub mod annotations {
    /// `"true"` when the pod requests any composable GPU, `"false"`
    /// otherwise. Set by the scheduler's pre-filter.
    pub const USE_FALCON: &str = "use_falcon";

    /// Destination node chosen for a pod that needs reconfiguration.
    /// Set by the permit gate.
    pub const DST_NODE: &str = "dst_node";

    /// Device shortfall at the destination node, decimal integer as
    /// string. Set by the permit gate.
    pub const GPU_DEMAND: &str = "gpu_demand";
}

/// Environment variables injected into containers on allocation.
pub mod container_env {
    /// Comma-joined DevIDs, the workload-visible logical device IDs.
    pub const DISAG_DEVICES: &str = "DISAG_DEVICES";

    /// Comma-joined UUIDs, consumed by the vendor runtime hook.
    pub const NVIDIA_VISIBLE_DEVICES: &str = "NVIDIA_VISIBLE_DEVICES";
}

//! The slice of the host scheduler framework's vocabulary the plugin
//! uses: status codes, the node score range contract, and the per-node
//! snapshot view.

/// Lower bound of the framework's node score range.
pub const MIN_NODE_SCORE: i64 = 0;

/// Upper bound of the framework's node score range.
pub const MAX_NODE_SCORE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Success,
    /// The pod cannot be scheduled this cycle; the framework requeues it.
    Unschedulable,
    /// Plugin-internal failure.
    Error,
}

/// Outcome of a plugin extension point.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: Code,
    pub reason: String,
}

impl Status {
    pub fn success() -> Self {
        Self {
            code: Code::Success,
            reason: String::new(),
        }
    }

    pub fn unschedulable(reason: impl Into<String>) -> Self {
        Self {
            code: Code::Unschedulable,
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            code: Code::Error,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Code::Success
    }
}

/// A node as seen in the scheduling cycle's snapshot.
///
/// Both quantities count the composable-GPU scalar resource. Snapshots
/// can lag fabric reconfiguration; anything that must not lag reads the
/// orchestrator API instead.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub allocatable: i64,
    pub requested: i64,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>, allocatable: i64, requested: i64) -> Self {
        Self {
            name: name.into(),
            allocatable,
            requested,
        }
    }

    /// Free supply: allocatable minus already-requested.
    pub fn free(&self) -> i64 {
        self.allocatable - self.requested
    }
}

/// A scored node, before or after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeScore {
    pub name: String,
    pub score: i64,
}

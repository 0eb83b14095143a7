//! Policy limits applied to a session.
//!
//! Use the builder methods to override individual limits:
//!
//! ```
//! use txvm::EngineLimits;
//!
//! let limits = EngineLimits::new().max_call_stack_depth(64).max_operand_stack(4096);
//! assert_eq!(limits.call_stack_depth(), 64);
//! ```

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// Method id of an application's entry point.
pub const DISPATCHER_ID: Identifier = Identifier::from_u64(0);

/// Initial operand stack capacity in bytes.
pub const DEFAULT_INITIAL_OPERAND_STACK: usize = 512;
/// Largest operand stack in bytes.
pub const DEFAULT_MAX_OPERAND_STACK: usize = 128 * 1024;
/// Length in bytes of a freshly created, zero-filled local frame.
pub const DEFAULT_INITIAL_LOCAL_FRAME: usize = 4 * 1024;
/// Largest local frame in bytes.
pub const DEFAULT_MAX_LOCAL_FRAME: usize = 256 * 1024;
/// Largest number of frames in one lane.
pub const DEFAULT_MAX_CALL_STACK_DEPTH: usize = 1024;
/// Largest number of lanes (the running one included) in the call-stack queue.
pub const DEFAULT_MAX_LANES: usize = 1024;

/// Sizes and depths a session may not exceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    initial_operand_stack: usize,
    max_operand_stack: usize,
    initial_local_frame: usize,
    max_local_frame: usize,
    max_call_stack_depth: usize,
    max_lanes: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            initial_operand_stack: DEFAULT_INITIAL_OPERAND_STACK,
            max_operand_stack: DEFAULT_MAX_OPERAND_STACK,
            initial_local_frame: DEFAULT_INITIAL_LOCAL_FRAME,
            max_local_frame: DEFAULT_MAX_LOCAL_FRAME,
            max_call_stack_depth: DEFAULT_MAX_CALL_STACK_DEPTH,
            max_lanes: DEFAULT_MAX_LANES,
        }
    }
}

impl EngineLimits {
    /// Creates limits with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial operand stack capacity.
    #[must_use]
    pub fn initial_operand_stack(mut self, bytes: usize) -> Self {
        self.initial_operand_stack = bytes;
        self
    }

    /// Sets the operand stack ceiling.
    #[must_use]
    pub fn max_operand_stack(mut self, bytes: usize) -> Self {
        self.max_operand_stack = bytes;
        self
    }

    /// Sets the length of a fresh local frame.
    #[must_use]
    pub fn initial_local_frame(mut self, bytes: usize) -> Self {
        self.initial_local_frame = bytes;
        self
    }

    /// Sets the local frame ceiling. Also bounds the session argument buffer.
    #[must_use]
    pub fn max_local_frame(mut self, bytes: usize) -> Self {
        self.max_local_frame = bytes;
        self
    }

    /// Sets the maximum number of frames per lane.
    #[must_use]
    pub fn max_call_stack_depth(mut self, depth: usize) -> Self {
        self.max_call_stack_depth = depth;
        self
    }

    /// Sets the maximum number of lanes, the running one included.
    #[must_use]
    pub fn max_lanes(mut self, lanes: usize) -> Self {
        self.max_lanes = lanes;
        self
    }

    /// Initial operand stack capacity in bytes.
    #[must_use]
    pub fn operand_stack_capacity(&self) -> usize {
        self.initial_operand_stack
    }

    /// Operand stack ceiling in bytes.
    #[must_use]
    pub fn operand_stack_limit(&self) -> usize {
        self.max_operand_stack
    }

    /// Length of a fresh local frame in bytes.
    #[must_use]
    pub fn local_frame_len(&self) -> usize {
        self.initial_local_frame
    }

    /// Local frame ceiling in bytes.
    #[must_use]
    pub fn local_frame_limit(&self) -> usize {
        self.max_local_frame
    }

    /// Maximum frames per lane.
    #[must_use]
    pub fn call_stack_depth(&self) -> usize {
        self.max_call_stack_depth
    }

    /// Maximum lanes in the call-stack queue.
    #[must_use]
    pub fn lanes(&self) -> usize {
        self.max_lanes
    }
}

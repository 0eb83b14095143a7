//! Engine status codes and the step-level fault type.
//!
//! [`ErrorCode`] is what a session reports to its host; it is data, not a Rust error. [`Fault`] is
//! what a failing instruction returns internally. The controller never lets a `Fault` escape: it
//! maps it to an `ErrorCode` with [`Fault::error_code`] and turns it into an engine throw.

use std::borrow::Cow;

use strum::{Display, FromRepr, IntoStaticStr};
use thiserror::Error;

use crate::{buffer::BufferError, identifier::IdentifierError, memory::MemoryError};

/// Status of an engine session or of the last completed return.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    FromRepr,
    IntoStaticStr,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ErrorCode {
    /// Success.
    #[default]
    NoError = 0,
    /// An instruction found too few bytes on the operand stack for what it had to move.
    InvalidOperands = 1,
    /// A dispatcher was spawned while an independent call is still active in the lane.
    InvalidSpawnState = 2,
    /// Raised by the `throw` instruction.
    SoftwareError = 3,
    /// An access outside a buffer or memory range.
    InvalidReference = 4,
    /// A buffer would have grown past its ceiling.
    MemoryLimitExceeded = 5,
    /// The call stack or the spawned lane queue is full.
    MaxCallStackDepthExceeded = 6,
    /// Reserved for arithmetic overflow checks.
    OverFlow = 7,
    /// Reserved for arithmetic underflow checks.
    UnderFlow = 8,
    /// Reserved for lossy numeric conversions.
    PrecisionLoss = 9,
    /// `enter` was executed on a context whose entrance lock is already held.
    Reentrancy = 10,
    /// Any other failure, including unassigned opcodes.
    RuntimeError = 11,
}

impl ErrorCode {
    /// Returns true for every code except [`ErrorCode::NoError`].
    #[inline]
    #[must_use]
    pub fn is_error(self) -> bool {
        self != Self::NoError
    }
}

/// Why an instruction could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// Operand stack or local frame failure.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// Method area or heap failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// Malformed identifier encoding.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// A failure that already carries its status code.
    #[error("{0}")]
    Signal(ErrorCode),
    /// The fetched byte is not an assigned opcode.
    #[error("invalid opcode byte: {0:#04x}")]
    InvalidOpcode(u8),
    /// The engine reached a state it should never be in.
    #[error("internal error: {0}")]
    Internal(Cow<'static, str>),
}

impl Fault {
    /// Maps the fault to the code reported to the host.
    ///
    /// Bounds faults become `InvalidReference`, an exhausted buffer becomes `MemoryLimitExceeded`,
    /// signals keep their own code and everything else is a `RuntimeError`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Buffer(BufferError::OutOfBounds { .. }) | Self::Memory(_) => ErrorCode::InvalidReference,
            Self::Buffer(BufferError::MemoryLimitExceeded { .. }) => ErrorCode::MemoryLimitExceeded,
            Self::Signal(code) => *code,
            Self::Identifier(_) | Self::InvalidOpcode(_) | Self::Internal(_) => ErrorCode::RuntimeError,
        }
    }

    pub(crate) fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<ErrorCode> for Fault {
    fn from(code: ErrorCode) -> Self {
        Self::Signal(code)
    }
}

/// Result of a single engine step.
pub type StepResult<T = ()> = Result<T, Fault>;

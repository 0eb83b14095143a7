//! Opcode definitions.
//!
//! Bytecode is a flat byte string per method. Each instruction is one opcode byte followed by its
//! immediate, if any; immediates are little-endian.
//!
//! # Immediate Encoding
//!
//! - None: calls, returns, `throw`, `enter`, `pop`, arithmetic
//! - `C16` suffix, 2 bytes (u16, or i16 for jumps): `argC16`, `lfLoadC16`, `lfStoreC16`, `jmpEqC16`
//! - `C64` suffix, 8 bytes: `pushC64`
//!
//! Bytes without an assigned opcode (0x06, 0x07, 0x0a, 0x0d to 0x0f, 0x18 and up) fail with a
//! runtime error when fetched.

use strum::{Display, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Opcode discriminant, one byte in the bytecode stream.
///
/// The string forms are the assembly mnemonics.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum Opcode {
    /// Does nothing.
    #[strum(serialize = "noOp")]
    NoOp = 0x00,

    // === Calls ===
    /// Pops an application id and calls its dispatcher in the callee's own context.
    #[strum(serialize = "invokeDispatcher")]
    InvokeDispatcher = 0x01,
    /// As `invokeDispatcher`, but the callee is independent: a throw below it stops at it, and the
    /// heap is checkpointed on entry.
    #[strum(serialize = "indInvokeDispatcher")]
    IndInvokeDispatcher = 0x02,
    /// Pops an application id and queues its dispatcher as a new lane. Only legal while no
    /// independent call is active in the running lane.
    #[strum(serialize = "spawnDispatcher")]
    SpawnDispatcher = 0x03,
    /// Pops a method id and calls it in the current application and context.
    #[strum(serialize = "invokeInternal")]
    InvokeInternal = 0x04,
    /// Independent variant of `invokeInternal`.
    #[strum(serialize = "indInvokeInternal")]
    IndInvokeInternal = 0x05,

    // === Returns ===
    /// Returns nothing.
    #[strum(serialize = "ret0")]
    Ret0 = 0x08,
    /// Returns the top 8 bytes.
    #[strum(serialize = "ret64")]
    Ret64 = 0x09,
    /// Throws `n + 2` bytes, where `n` is the u16 in the top two bytes of the stack.
    #[strum(serialize = "throw")]
    Throw = 0x0b,
    /// Takes the entrance lock of the current context.
    #[strum(serialize = "enter")]
    Enter = 0x0c,

    // === Stack ===
    /// Pushes an 8-byte immediate.
    #[strum(to_string = "pushC64", serialize = "pushConst64")]
    PushC64 = 0x10,
    /// Drops the top word.
    #[strum(serialize = "pop")]
    Pop = 0x11,
    /// `[a, b] -> [a + b]`, wrapping.
    #[strum(serialize = "iAdd")]
    IAdd = 0x12,
    /// `[a, b] -> [a - b]`, wrapping.
    #[strum(serialize = "iSub")]
    ISub = 0x13,

    // === Local frames ===
    /// Pops a word into the callee's pending local frame at a u16 offset.
    #[strum(serialize = "argC16")]
    ArgC16 = 0x14,
    /// Pushes the local frame word at a u16 offset.
    #[strum(serialize = "lfLoadC16")]
    LfLoadC16 = 0x15,
    /// Pops a word into the local frame at a u16 offset.
    #[strum(serialize = "lfStoreC16")]
    LfStoreC16 = 0x16,

    // === Control flow ===
    /// Jumps by a signed 16-bit offset if the top two words are equal. Leaves the stack unchanged.
    #[strum(serialize = "jmpEqC16")]
    JmpEqC16 = 0x17,
}

impl Opcode {
    /// Width in bytes of the immediate that follows the opcode.
    #[must_use]
    pub const fn immediate_len(self) -> usize {
        match self {
            Self::PushC64 => 8,
            Self::ArgC16 | Self::LfLoadC16 | Self::LfStoreC16 | Self::JmpEqC16 => 2,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_repr(byte).ok_or(InvalidOpcodeError(byte))
    }
}

/// Error returned when a byte has no assigned opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode byte: {0:#04x}")]
pub struct InvalidOpcodeError(pub u8);

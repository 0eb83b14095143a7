//! Bytecode representation.
//!
//! # Module Structure
//!
//! - `op` - Opcode enum definitions
//!
//! Execution lives in [`crate::processor`]; this module only describes the byte format.

mod op;

pub use op::{InvalidOpcodeError, Opcode};

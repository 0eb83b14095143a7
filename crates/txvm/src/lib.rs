#![doc = include_str!("../../../README.md")]
mod binary;
mod buffer;
mod bytecode;
mod controller;
mod error;
mod identifier;
mod limits;
mod memory;
mod processor;

pub use crate::{
    buffer::{BufferError, DynamicBuffer},
    bytecode::{InvalidOpcodeError, Opcode},
    controller::{Controller, Outcome},
    error::{ErrorCode, Fault, StepResult},
    identifier::{Identifier, IdentifierError, MAX_IDENTIFIER_LEN},
    limits::{
        DEFAULT_INITIAL_LOCAL_FRAME, DEFAULT_INITIAL_OPERAND_STACK, DEFAULT_MAX_CALL_STACK_DEPTH, DEFAULT_MAX_LANES,
        DEFAULT_MAX_LOCAL_FRAME, DEFAULT_MAX_OPERAND_STACK, DISPATCHER_ID, EngineLimits,
    },
    memory::{MemoryError, MemoryModule, Module},
    processor::{CallFrame, Processor},
};

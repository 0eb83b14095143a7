//! Session setup and the fetch/decode/execute loop.

use tracing::{error, trace, warn};

use crate::{
    buffer::DynamicBuffer,
    bytecode::Opcode,
    error::{ErrorCode, Fault, StepResult},
    identifier::Identifier,
    limits::{DISPATCHER_ID, EngineLimits},
    memory::Module,
    processor::Processor,
};

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Outcome {
    /// Bytes returned by the bottom frame of every completed lane, in lane order.
    pub output: Vec<u8>,
    /// Status of the last return or throw.
    pub error: ErrorCode,
}

/// Drives one session from setup to completion.
///
/// No fault raised by bytecode escapes the controller: each one is turned into a throw that
/// unwinds to the nearest independent caller, and the session always ends with an [`Outcome`].
#[derive(Debug)]
pub struct Controller<'a, M: Module, H: Module> {
    processor: Processor<'a, M, H>,
}

impl<'a, M: Module, H: Module> Controller<'a, M, H> {
    /// Prepares a session that runs the dispatcher of `called_app` with `arguments` as its local
    /// frame.
    ///
    /// The first frame runs in context `called_app`, is independent, and the heap is checkpointed
    /// once before anything executes.
    ///
    /// # Errors
    /// Fails if `arguments` is longer than the local frame limit.
    pub fn setup_session(
        limits: EngineLimits,
        called_app: Identifier,
        arguments: Vec<u8>,
        method_area: &'a mut M,
        heap: &'a mut H,
    ) -> Result<Self, Fault> {
        let arguments = DynamicBuffer::from_vec(arguments, limits.local_frame_limit())?;
        let mut processor = Processor::new(limits, arguments, method_area, heap);
        processor.call_method(called_app, called_app, DISPATCHER_ID, false)?;
        processor.mark_independent()?;
        Ok(Self { processor })
    }

    /// Runs the session to completion.
    pub fn emulate(mut self) -> Outcome {
        while !self.emulate_next_instruction() {}
        self.into_outcome()
    }

    /// Executes one instruction. Returns true once no frame is left to run.
    ///
    /// A faulting instruction counts as a step: the fault is thrown and `false` is returned, even
    /// if the throw ended the session.
    pub fn emulate_next_instruction(&mut self) -> bool {
        match self.step() {
            Ok(end_of_program) => end_of_program,
            Err(fault) => {
                let code = fault.error_code();
                warn!(%fault, %code, "instruction failed, throwing");
                if let Err(err) = self.processor.throw_bytes(0, code) {
                    error!(%err, "throw after failed instruction could not unwind, aborting");
                    self.processor.abort(code);
                }
                false
            }
        }
    }

    fn step(&mut self) -> StepResult<bool> {
        let Some(byte) = self.processor.next_opcode()? else {
            return Ok(true);
        };
        let opcode = Opcode::try_from(byte).map_err(|e| Fault::InvalidOpcode(e.0))?;
        trace!(
            %opcode,
            pc = self.processor.current().map_or(0, |f| f.pc() - 1),
            depth = self.processor.lane_depth(),
            "execute"
        );
        self.processor.execute(opcode)?;
        Ok(false)
    }

    /// Status left by the last return or throw.
    #[must_use]
    pub fn status(&self) -> ErrorCode {
        self.processor.error_status()
    }

    /// Read access to the engine state, for hosts that single-step.
    #[must_use]
    pub fn processor(&self) -> &Processor<'a, M, H> {
        &self.processor
    }

    /// Ends the session, returning what it produced so far.
    #[must_use]
    pub fn into_outcome(mut self) -> Outcome {
        Outcome {
            output: self.processor.take_return_data(),
            error: self.processor.error_status(),
        }
    }
}

//! One routine per opcode.
//!
//! Each routine validates its operands before it mutates anything it cannot undo, and reports
//! failure as a [`Fault`]; turning faults into throws is the controller's job.

use super::Processor;
use crate::{
    binary::{self, WORD},
    buffer::BufferError,
    bytecode::Opcode,
    error::{ErrorCode, Fault, StepResult},
    limits::DISPATCHER_ID,
    memory::Module,
};

impl<M: Module, H: Module> Processor<'_, M, H> {
    /// Executes one decoded instruction. The program counter already points past the opcode byte.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> StepResult {
        match opcode {
            Opcode::NoOp => Ok(()),
            Opcode::InvokeDispatcher => self.invoke_dispatcher(),
            Opcode::IndInvokeDispatcher => {
                self.invoke_dispatcher()?;
                self.mark_independent()
            }
            Opcode::SpawnDispatcher => self.spawn_dispatcher(),
            Opcode::InvokeInternal => self.invoke_internal(),
            Opcode::IndInvokeInternal => {
                self.invoke_internal()?;
                self.mark_independent()
            }
            Opcode::Ret0 => self.return_bytes(0, ErrorCode::NoError),
            Opcode::Ret64 => self.return_bytes(WORD, ErrorCode::NoError),
            Opcode::Throw => self.throw(),
            Opcode::Enter => self.enter(),
            Opcode::PushC64 => self.push_c64(),
            Opcode::Pop => self.pop(),
            Opcode::IAdd => self.binary_int(i64::wrapping_add),
            Opcode::ISub => self.binary_int(i64::wrapping_sub),
            Opcode::ArgC16 => self.arg_c16(),
            Opcode::LfLoadC16 => self.lf_load_c16(),
            Opcode::LfStoreC16 => self.lf_store_c16(),
            Opcode::JmpEqC16 => self.jmp_eq_c16(),
        }
    }

    /// `[..., app] -> [...]`, then calls the dispatcher of `app` in context `app`.
    fn invoke_dispatcher(&mut self) -> StepResult {
        let app = self.pop_identifier()?;
        self.call_method(app, app, DISPATCHER_ID, false)
    }

    fn spawn_dispatcher(&mut self) -> StepResult {
        let app = self.pop_identifier()?;
        self.call_method(app, app, DISPATCHER_ID, true)
    }

    /// `[..., method] -> [...]`, then calls `method` of the current application in the current
    /// context.
    fn invoke_internal(&mut self) -> StepResult {
        let method = self.pop_identifier()?;
        let frame = self.frame()?;
        let (context, app) = (frame.context, frame.app_id);
        self.call_method(context, app, method, false)
    }

    /// Throws the top `n + 2` bytes, where `n` is the little-endian u16 in the top two bytes.
    ///
    /// The u16 is part of the payload, so a handler can recover the payload length from it.
    fn throw(&mut self) -> StepResult {
        let stack = &self.frame()?.operand_stack;
        let len = stack.len();
        let n = stack
            .top(2)
            .ok()
            .and_then(|top| binary::read_u16(top, 0))
            .ok_or(BufferError::OutOfBounds { offset: 0, len: 2, size: len })?;
        let span = usize::from(n) + 2;
        if span > len {
            return Err(BufferError::OutOfBounds {
                offset: 0,
                len: span,
                size: len,
            }
            .into());
        }
        self.throw_bytes(span, ErrorCode::SoftwareError)
    }

    /// Takes the entrance lock of the current context for the lifetime of the current frame.
    fn enter(&mut self) -> StepResult {
        let frame = self.lane.last_mut().ok_or_else(super::no_active_frame)?;
        if !self.locks.insert(frame.context) {
            return Err(ErrorCode::Reentrancy.into());
        }
        frame.entrance_lock = Some(frame.context);
        Ok(())
    }

    fn push_c64(&mut self) -> StepResult {
        let word = self.read_const64()?;
        self.frame_mut()?.operand_stack.push64(word)?;
        Ok(())
    }

    fn pop(&mut self) -> StepResult {
        self.frame_mut()?.operand_stack.pop64()?;
        Ok(())
    }

    /// `[..., a, b] -> [..., f(a, b)]`.
    fn binary_int(&mut self, f: fn(i64, i64) -> i64) -> StepResult {
        let (b, a) = self.peek_int64()?;
        let stack = &mut self.frame_mut()?.operand_stack;
        let top = stack.len();
        stack.write64(top - 2 * WORD, f(a, b).to_le_bytes())?;
        stack.shrink_to(top - WORD);
        Ok(())
    }

    /// Pops the top word into the pending local frame at a 16-bit offset, growing the pending
    /// frame if needed.
    fn arg_c16(&mut self) -> StepResult {
        let offset = usize::from(self.read_const16()?);
        let stack = &mut self.lane.last_mut().ok_or_else(super::no_active_frame)?.operand_stack;
        let word = binary::read_word(stack.top(WORD)?, 0).ok_or_else(|| Fault::internal("short stack word"))?;
        self.next_local_frame.ensure_len(offset + WORD)?;
        self.next_local_frame.write64(offset, word)?;
        let top = stack.len();
        stack.shrink_to(top - WORD);
        Ok(())
    }

    /// Pushes the local frame word at a 16-bit offset.
    fn lf_load_c16(&mut self) -> StepResult {
        let index = usize::from(self.read_const16()?);
        let frame = self.frame_mut()?;
        let word = frame.local_frame.read64(index)?;
        frame.operand_stack.push64(word)?;
        Ok(())
    }

    /// Pops the top word into the local frame at a 16-bit offset, growing the frame if needed.
    fn lf_store_c16(&mut self) -> StepResult {
        let index = usize::from(self.read_const16()?);
        let frame = self.frame_mut()?;
        let word = binary::read_word(frame.operand_stack.top(WORD)?, 0).ok_or_else(|| Fault::internal("short stack word"))?;
        frame.local_frame.ensure_len(index + WORD)?;
        frame.local_frame.write64(index, word)?;
        let top = frame.operand_stack.len();
        frame.operand_stack.shrink_to(top - WORD);
        Ok(())
    }

    /// Jumps if the top two words are equal, leaving both on the stack.
    ///
    /// The signed offset is relative to the end of the immediate.
    fn jmp_eq_c16(&mut self) -> StepResult {
        let (a, b) = self.peek_int64()?;
        if a != b {
            self.frame_mut()?.pc += 2;
            return Ok(());
        }
        let offset = self.read_const16()?.cast_signed();
        let frame = self.frame_mut()?;
        frame.pc = frame
            .pc
            .checked_add_signed(isize::from(offset))
            .ok_or(Fault::Signal(ErrorCode::InvalidReference))?;
        Ok(())
    }
}

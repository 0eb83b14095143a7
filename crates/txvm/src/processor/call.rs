//! Call, return and throw protocol.
//!
//! Returns and throws share one unwind routine: a return unwinds to the current frame itself, a
//! throw unwinds to the nearest independent caller. Either way the unwind validates everything
//! that can fail before it touches any frame, so a failed unwind leaves the engine exactly as it
//! was and can be retried as a plain throw.

use tracing::debug;

use super::{CallFrame, Processor, no_active_frame};
use crate::{
    buffer::{BufferError, DynamicBuffer},
    error::{ErrorCode, Fault, StepResult},
    identifier::Identifier,
    memory::Module,
};

impl<M: Module, H: Module> Processor<'_, M, H> {
    /// Creates a frame for `method` of `app` running against `context`.
    ///
    /// The new frame receives the pending local frame. A plain call pushes it on the running lane,
    /// re-points both modules at it and clears the error status. A spawn queues it as a new lane
    /// and leaves the running frame and the modules untouched.
    pub(crate) fn call_method(
        &mut self,
        context: Identifier,
        app: Identifier,
        method: Identifier,
        spawn: bool,
    ) -> StepResult {
        if spawn {
            if self.nearest_independent_caller() != 0 {
                return Err(ErrorCode::InvalidSpawnState.into());
            }
            if self.pending.len() + 1 >= self.limits.lanes() {
                return Err(ErrorCode::MaxCallStackDepthExceeded.into());
            }
        } else if self.lane.len() >= self.limits.call_stack_depth() {
            return Err(ErrorCode::MaxCallStackDepthExceeded.into());
        }

        let local_frame = std::mem::replace(&mut self.next_local_frame, DynamicBuffer::new(0, 0));
        let frame = CallFrame::new(context, app, method, self.fresh_operand_stack(), local_frame);
        if spawn {
            debug!(%app, lanes = self.pending.len() + 2, "spawned dispatcher");
            self.pending.push_back(frame);
            self.next_local_frame = self.fresh_local_frame();
        } else {
            // update_current_call_context replaces the pending local frame
            debug!(%context, %app, %method, depth = self.lane.len() + 1, "call");
            self.lane.push(frame);
            self.update_current_call_context();
            self.error_status = ErrorCode::NoError;
        }
        Ok(())
    }

    /// Marks the top frame independent and checkpoints the heap.
    pub(crate) fn mark_independent(&mut self) -> StepResult {
        self.frame_mut()?.independent = true;
        self.heap.save();
        Ok(())
    }

    /// Returns the top `n` bytes of the current frame's operand stack to its caller.
    ///
    /// # Errors
    /// `InvalidOperands` if the stack holds fewer than `n` bytes; a buffer fault if the caller's
    /// stack cannot take them. Nothing changes on failure.
    pub(crate) fn return_bytes(&mut self, n: usize, status: ErrorCode) -> StepResult {
        let top = self.lane.len().checked_sub(1).ok_or_else(no_active_frame)?;
        self.unwind(top, n, status)
    }

    /// Unwinds to the nearest independent caller and returns the top `n` bytes of the throwing
    /// frame from it with status `code`.
    ///
    /// Frames above the independent caller are dropped; their entrance locks are released.
    pub(crate) fn throw_bytes(&mut self, n: usize, code: ErrorCode) -> StepResult {
        let target = self.nearest_independent_caller();
        self.unwind(target, n, code)
    }

    /// Index of the innermost independent frame of the running lane, or 0 if only the bottom frame
    /// (or none) is independent.
    pub(crate) fn nearest_independent_caller(&self) -> usize {
        (1..self.lane.len()).rev().find(|&i| self.lane[i].independent).unwrap_or(0)
    }

    /// Stops the engine with `code`, discarding every lane and rolling back the heap.
    ///
    /// Only used when even a plain throw cannot be carried out.
    pub(crate) fn abort(&mut self, code: ErrorCode) {
        self.lane.clear();
        self.pending.clear();
        self.locks.clear();
        self.heap.restore();
        self.error_status = code;
    }

    /// Pops every frame from `target` up, moving the top `n` bytes of the top frame to the frame
    /// below `target` (or to the return data if `target` is the lane bottom).
    fn unwind(&mut self, target: usize, n: usize, status: ErrorCode) -> StepResult {
        let source = self.lane.last().ok_or_else(no_active_frame)?;
        if target >= self.lane.len() {
            return Err(Fault::internal("unwind target above the top frame"));
        }
        let start = source
            .operand_stack
            .len()
            .checked_sub(n)
            .ok_or(Fault::Signal(ErrorCode::InvalidOperands))?;
        if let Some(caller) = target.checked_sub(1).map(|i| &self.lane[i]) {
            if !caller.operand_stack.can_grow_by(n) {
                return Err(BufferError::MemoryLimitExceeded {
                    requested: caller.operand_stack.len() + n,
                    max: caller.operand_stack.max_size(),
                }
                .into());
            }
        }

        let popped = self.lane.split_off(target);
        let returning_independent = popped.first().is_some_and(|frame| frame.independent);
        if let Some(source) = popped.last() {
            let payload = &source.operand_stack.as_slice()[start..];
            match self.lane.last_mut() {
                Some(caller) => caller.operand_stack.push_bytes(payload)?,
                None => self.return_data.extend_from_slice(payload),
            }
        }
        for context in popped.iter().filter_map(|frame| frame.entrance_lock) {
            self.locks.remove(&context);
        }

        let mut terminated = false;
        if self.lane.is_empty() {
            if status.is_error() || self.pending.is_empty() {
                debug!(%status, dropped_lanes = self.pending.len(), "engine complete");
                self.pending.clear();
                terminated = true;
            } else if let Some(next) = self.pending.pop_front() {
                debug!(app = %next.app_id, remaining = self.pending.len(), "lane finished, starting next lane");
                self.lane.push(next);
            }
        } else {
            debug!(%status, bytes = n, depth = self.lane.len(), "returned to caller");
        }

        if status.is_error() {
            debug!("heap checkpoint restored");
            self.heap.restore();
        } else if returning_independent || terminated {
            debug!("heap checkpoint discarded");
            self.heap.discard();
        }

        self.error_status = status;
        self.update_current_call_context();
        Ok(())
    }
}

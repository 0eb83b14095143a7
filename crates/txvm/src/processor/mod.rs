//! Call frames, lanes and the shared state every instruction works on.
//!
//! The processor owns the active lane (a stack of [`CallFrame`]s, innermost last) and a FIFO of
//! spawned lanes that run after it. Only the top frame of the active lane executes. Each frame
//! owns its program counter, so returning to a caller needs no bookkeeping beyond popping.

mod call;
mod instructions;

use std::collections::VecDeque;

use ahash::AHashSet;

use crate::{
    binary,
    buffer::DynamicBuffer,
    error::{ErrorCode, Fault, StepResult},
    identifier::Identifier,
    limits::EngineLimits,
    memory::Module,
};

/// A single method activation.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Offset of the next opcode in the method's bytecode.
    pc: usize,

    /// Heap root this frame runs against.
    context: Identifier,

    /// Application that owns the executing method.
    app_id: Identifier,

    /// Method id within the application.
    method_id: Identifier,

    /// Whether a throw from above stops at this frame.
    independent: bool,

    /// Context whose entrance lock this frame holds, released when the frame is popped.
    entrance_lock: Option<Identifier>,

    operand_stack: DynamicBuffer,
    local_frame: DynamicBuffer,
}

impl CallFrame {
    fn new(
        context: Identifier,
        app_id: Identifier,
        method_id: Identifier,
        operand_stack: DynamicBuffer,
        local_frame: DynamicBuffer,
    ) -> Self {
        Self {
            pc: 0,
            context,
            app_id,
            method_id,
            independent: false,
            entrance_lock: None,
            operand_stack,
            local_frame,
        }
    }

    /// Offset of the next opcode.
    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Heap root of the frame.
    #[must_use]
    pub fn context(&self) -> Identifier {
        self.context
    }

    /// Application owning the executing method.
    #[must_use]
    pub fn app_id(&self) -> Identifier {
        self.app_id
    }

    /// Executing method.
    #[must_use]
    pub fn method_id(&self) -> Identifier {
        self.method_id
    }

    /// Whether the frame was entered through an independent call.
    #[must_use]
    pub fn is_independent(&self) -> bool {
        self.independent
    }

    /// Whether the frame holds the entrance lock of its context.
    #[must_use]
    pub fn holds_entrance_lock(&self) -> bool {
        self.entrance_lock.is_some()
    }

    /// Operand stack contents, top last.
    #[must_use]
    pub fn operand_stack(&self) -> &[u8] {
        self.operand_stack.as_slice()
    }

    /// Local frame contents.
    #[must_use]
    pub fn local_frame(&self) -> &[u8] {
        self.local_frame.as_slice()
    }
}

/// Execution state of a session.
///
/// Borrows the method area and the heap for the whole session; the two may be distinct module
/// types.
#[derive(Debug)]
pub struct Processor<'a, M: Module, H: Module> {
    /// Running lane, innermost frame last. Empty once the engine is complete.
    lane: Vec<CallFrame>,

    /// Spawned lanes waiting to run, each holding its single bottom frame.
    pending: VecDeque<CallFrame>,

    /// Status left by the last return or throw; reset to `NoError` by every plain call.
    error_status: ErrorCode,

    /// Contexts whose entrance lock is held by some frame.
    locks: AHashSet<Identifier>,

    /// Local frame that the next call will receive, filled by `argC16`.
    next_local_frame: DynamicBuffer,

    /// Bytes returned by the bottom frame of every finished lane.
    return_data: Vec<u8>,

    method_area: &'a mut M,
    heap: &'a mut H,
    limits: EngineLimits,
}

impl<'a, M: Module, H: Module> Processor<'a, M, H> {
    pub(crate) fn new(
        limits: EngineLimits,
        arguments: DynamicBuffer,
        method_area: &'a mut M,
        heap: &'a mut H,
    ) -> Self {
        Self {
            lane: Vec::with_capacity(16),
            pending: VecDeque::new(),
            error_status: ErrorCode::NoError,
            locks: AHashSet::new(),
            next_local_frame: arguments,
            return_data: Vec::new(),
            method_area,
            heap,
            limits,
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// The executing frame, `None` once the engine is complete.
    #[must_use]
    pub fn current(&self) -> Option<&CallFrame> {
        self.lane.last()
    }

    /// Frames of the running lane, bottom first.
    #[must_use]
    pub fn frames(&self) -> &[CallFrame] {
        &self.lane
    }

    /// True once every lane has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.lane.is_empty()
    }

    /// Status left by the last return or throw.
    #[must_use]
    pub fn error_status(&self) -> ErrorCode {
        self.error_status
    }

    /// Number of frames in the running lane.
    #[must_use]
    pub fn lane_depth(&self) -> usize {
        self.lane.len()
    }

    /// Number of spawned lanes still waiting to run.
    #[must_use]
    pub fn pending_lanes(&self) -> usize {
        self.pending.len()
    }

    /// Whether some frame holds the entrance lock of `context`.
    #[must_use]
    pub fn is_locked(&self, context: Identifier) -> bool {
        self.locks.contains(&context)
    }

    /// Output accumulated so far.
    #[must_use]
    pub fn return_data(&self) -> &[u8] {
        &self.return_data
    }

    /// Limits this session runs under.
    #[must_use]
    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub(crate) fn take_return_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.return_data)
    }

    // ========================================================================
    // Frame Operations
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self) -> StepResult<&CallFrame> {
        self.lane.last().ok_or_else(no_active_frame)
    }

    #[inline]
    pub(crate) fn frame_mut(&mut self) -> StepResult<&mut CallFrame> {
        self.lane.last_mut().ok_or_else(no_active_frame)
    }

    /// Fetches the next opcode byte and advances the program counter past it.
    ///
    /// Returns `None` when no frame is left to execute.
    pub(crate) fn next_opcode(&mut self) -> StepResult<Option<u8>> {
        let Some(frame) = self.lane.last_mut() else {
            return Ok(None);
        };
        let byte = self.method_area.load_byte(frame.pc)?;
        frame.pc += 1;
        Ok(Some(byte))
    }

    /// Reads a 2-byte immediate and advances the program counter past it.
    pub(crate) fn read_const16(&mut self) -> StepResult<u16> {
        let frame = self.lane.last_mut().ok_or_else(no_active_frame)?;
        let value = self.method_area.load_u16(frame.pc)?;
        frame.pc += 2;
        Ok(value)
    }

    /// Reads an 8-byte immediate and advances the program counter past it.
    pub(crate) fn read_const64(&mut self) -> StepResult<[u8; binary::WORD]> {
        let frame = self.lane.last_mut().ok_or_else(no_active_frame)?;
        let mut word = [0; binary::WORD];
        self.method_area.load64(frame.pc, &mut word, 0)?;
        frame.pc += binary::WORD;
        Ok(word)
    }

    /// Pops a plain 8-byte little-endian identifier off the operand stack.
    pub(crate) fn pop_identifier(&mut self) -> StepResult<Identifier> {
        let word = self.frame_mut()?.operand_stack.pop64()?;
        Ok(Identifier::from_u64(u64::from_le_bytes(word)))
    }

    /// Returns the top two stack words as `(top, second)` without popping them.
    pub(crate) fn peek_int64(&self) -> StepResult<(i64, i64)> {
        let stack = self.frame()?.operand_stack.top(2 * binary::WORD)?;
        match (binary::read_i64(stack, binary::WORD), binary::read_i64(stack, 0)) {
            (Some(top), Some(second)) => Ok((top, second)),
            _ => Err(Fault::internal("operand stack top is shorter than two words")),
        }
    }

    fn fresh_operand_stack(&self) -> DynamicBuffer {
        DynamicBuffer::new(self.limits.operand_stack_capacity(), self.limits.operand_stack_limit())
    }

    fn fresh_local_frame(&self) -> DynamicBuffer {
        DynamicBuffer::zeroed(self.limits.local_frame_len(), self.limits.local_frame_limit())
    }

    /// Re-points the method area and the heap at the top frame and resets the pending local frame.
    ///
    /// Does nothing when the engine is complete.
    fn update_current_call_context(&mut self) {
        let Some(frame) = self.lane.last() else {
            return;
        };
        let (context, app_id, method_id) = (frame.context, frame.app_id, frame.method_id);
        self.next_local_frame = self.fresh_local_frame();
        self.heap.load_root(context);
        self.method_area.load_root(app_id).load_child(method_id);
    }
}

fn no_active_frame() -> Fault {
    Fault::internal("no active call frame")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{limits::DISPATCHER_ID, memory::MemoryModule};

    fn id(v: u64) -> Identifier {
        Identifier::from_u64(v)
    }

    fn processor<'a>(method_area: &'a mut MemoryModule, heap: &'a mut MemoryModule) -> Processor<'a, MemoryModule, MemoryModule> {
        let limits = EngineLimits::new();
        let args = DynamicBuffer::new(0, limits.local_frame_limit());
        let mut p = Processor::new(limits, args, method_area, heap);
        p.call_method(id(0x11), id(0x11), DISPATCHER_ID, false).unwrap();
        p
    }

    #[test]
    fn plain_call_repoints_modules_and_resets_status() {
        let mut method_area = MemoryModule::new();
        let mut heap = MemoryModule::new();
        let mut p = processor(&mut method_area, &mut heap);
        p.error_status = ErrorCode::SoftwareError;

        p.call_method(id(0x11), id(0x12), id(3), false).unwrap();
        assert_eq!(p.lane_depth(), 2);
        assert_eq!(p.error_status(), ErrorCode::NoError);
        assert_eq!(p.current().map(CallFrame::method_id), Some(id(3)));
        drop(p);
        assert_eq!(heap.access_log(), "root<-11   root<-11");
        assert_eq!(method_area.access_log(), "root<-11   child<-0   root<-12   child<-3");
    }

    #[test]
    fn nearest_independent_caller_ignores_the_bottom_frame() {
        let mut method_area = MemoryModule::new();
        let mut heap = MemoryModule::new();
        let mut p = processor(&mut method_area, &mut heap);
        p.lane[0].independent = true;
        assert_eq!(p.nearest_independent_caller(), 0);

        p.call_method(id(0x11), id(0x11), id(1), false).unwrap();
        p.call_method(id(0x11), id(0x11), id(2), false).unwrap();
        p.lane[1].independent = true;
        assert_eq!(p.nearest_independent_caller(), 1);
    }

    #[test]
    fn spawn_is_gated_by_independent_ancestors() {
        let mut method_area = MemoryModule::new();
        let mut heap = MemoryModule::new();
        let mut p = processor(&mut method_area, &mut heap);

        p.call_method(id(0x12), id(0x12), DISPATCHER_ID, true).unwrap();
        assert_eq!(p.pending_lanes(), 1);
        assert_eq!(p.lane_depth(), 1);

        p.call_method(id(0x11), id(0x11), id(1), false).unwrap();
        p.lane[1].independent = true;
        assert_eq!(
            p.call_method(id(0x13), id(0x13), DISPATCHER_ID, true),
            Err(Fault::Signal(ErrorCode::InvalidSpawnState))
        );
        assert_eq!(p.pending_lanes(), 1);
    }

    #[test]
    fn pending_local_frame_moves_into_the_callee() {
        let mut method_area = MemoryModule::new();
        let mut heap = MemoryModule::new();
        let mut p = processor(&mut method_area, &mut heap);
        assert_eq!(p.current().map(|f| f.local_frame().len()), Some(0));

        p.next_local_frame.write64(0, 9i64.to_le_bytes()).unwrap();
        p.call_method(id(0x11), id(0x11), id(1), false).unwrap();
        let frame = p.current().unwrap();
        assert_eq!(&frame.local_frame()[..8], &9i64.to_le_bytes());
        assert_eq!(p.next_local_frame.as_slice(), &[0; 4096][..]);
    }

    #[test]
    fn peek_needs_two_words() {
        let mut method_area = MemoryModule::new();
        let mut heap = MemoryModule::new();
        let mut p = processor(&mut method_area, &mut heap);
        let stack = &mut p.frame_mut().unwrap().operand_stack;
        stack.push64(3i64.to_le_bytes()).unwrap();
        assert!(p.peek_int64().is_err());

        p.frame_mut().unwrap().operand_stack.push64((-4i64).to_le_bytes()).unwrap();
        assert_eq!(p.peek_int64(), Ok((-4, 3)));
    }
}

/* Copyright (c) 2017-2021 Jeremy Davis (jeremydavis519@gmail.com)
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the "Software"), to deal in the Software without restriction,
 * including without limitation the rights to use, copy, modify, merge, publish, distribute,
 * sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all copies or
 * substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
 * NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 */

//! A uniform view of the register snapshot that an assembly trap stub leaves on the stack.

use crate::{
    category::TrapCategory,
    services::UserMemory,
};

/// Accessors for an architecture's trap frame.
///
/// Implementations are `#[repr(C)]` structs whose layout matches what the entry stubs push, so a
/// frame pointer received from assembly can be used directly.
pub trait TrapFrame {
    /// The address the trapped code will resume at.
    fn instruction_pointer(&self) -> usize;

    /// Changes where the trapped code will resume.
    fn set_instruction_pointer(&mut self, address: usize);

    /// The stack pointer of the trapped code's privilege level.
    fn stack_pointer(&self) -> usize;

    /// Changes the recorded stack pointer.
    fn set_stack_pointer(&mut self, address: usize);

    /// Returns `true` if the trap was taken from kernel mode.
    fn is_privileged(&self) -> bool;

    /// The architecture's error code (0 where the architecture doesn't push one).
    fn error_code(&self) -> usize;

    /// How far the recorded stack pointer has to move to point past the frame itself.
    fn frame_footprint(&self) -> usize;

    /// The call number and parameter-block address of a system call, read from the registers the
    /// calling convention uses.
    fn system_call_arguments(&self) -> (usize, usize);

    /// The service number and argument of a debug-service request.
    fn debug_service_arguments(&self) -> (usize, usize);

    /// Writes a system call's status into the register user mode reads it from.
    fn set_system_call_result(&mut self, result: isize);

    /// Moves the trapped code back so that it re-issues the system call `number` with the
    /// parameter block at `parameters` when it resumes.
    fn rewind_system_call(&mut self, number: usize, parameters: usize);

    /// Arms a hardware single step for the trapped code.
    ///
    /// # Returns
    /// `false` if the architecture has no hardware single step.
    fn set_single_step(&mut self) -> bool;

    /// Refines `TrapCategory::UndefinedInstruction` by looking at the instruction that trapped.
    /// Architectures where undefined instructions double as debug breaks or FPU access traps
    /// override this. A failure to read the instruction means it's just undefined.
    fn classify_undefined(&self, _memory: &dyn UserMemory, _fpu_access_enabled: bool) -> TrapCategory {
        TrapCategory::UndefinedInstruction
    }
}

/// The address of a frame, as passed to the crash bridge.
pub fn frame_address(frame: &dyn TrapFrame) -> usize {
    frame as *const dyn TrapFrame as *const u8 as usize
}

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

//! The end of the line for faults the kernel can't survive.

use {
    core::fmt,
    io::println,
    shared::ffi_enum,
    spin::Once,

    crate::services::{InterruptControl, SystemHalt},
};

ffi_enum! {
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Why the kernel crashed.
    pub enum CrashCode {
        /// A kernel-mode page fault.
        PageFault            = 1,
        /// A kernel-mode protection fault.
        ProtectionFault      = 2,
        /// A kernel-mode undefined instruction.
        IllegalInstruction   = 3,
        /// A kernel-mode arithmetic fault.
        MathFault            = 4,
        /// A double fault, most likely from overflowing the kernel stack.
        KernelStackException = 5,
        /// A vector that nothing should raise.
        UnexpectedTrap       = 6,
        /// The kernel needed an FPU context and couldn't get one.
        FpuUnavailable       = 7,
        /// A Rust panic.
        KernelPanic          = 8,
        /// A user-mode trap arrived with no thread to charge it to.
        NoCurrentThread      = 9,
    }
}

/// Everything recorded about a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashRecord {
    /// Why it happened.
    pub code: CrashCode,
    /// The trap frame's address, the faulting instruction pointer, and two code-specific values.
    pub parameters: [usize; 4],
}

impl fmt::Display for CrashRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "*** kernel crash: {:?} ({:#x}) frame {:#x} ip {:#x} [{:#x}, {:#x}]",
            self.code, u32::from(self.code),
            self.parameters[0], self.parameters[1], self.parameters[2], self.parameters[3])
    }
}

/// Records a crash and stops the system.
pub struct CrashBridge<'a> {
    interrupt_control: &'a dyn InterruptControl,
    halt: &'a dyn SystemHalt,
    record: Once<CrashRecord>,
}

impl<'a> CrashBridge<'a> {
    /// Makes a bridge that masks interrupts with `interrupt_control` and then hands off to `halt`.
    pub const fn new(interrupt_control: &'a dyn InterruptControl, halt: &'a dyn SystemHalt) -> CrashBridge<'a> {
        CrashBridge {
            interrupt_control,
            halt,
            record: Once::new(),
        }
    }

    /// Crashes the system. If two CPUs crash at once, the first record is the one that's kept and
    /// reported by both.
    pub fn crash(
            &self,
            code: CrashCode,
            frame_address: usize,
            instruction_pointer: usize,
            parameter1: usize,
            parameter2: usize,
    ) -> ! {
        self.interrupt_control.disable();
        let record = self.record.call_once(|| CrashRecord {
            code,
            parameters: [frame_address, instruction_pointer, parameter1, parameter2],
        });
        println!("{}", record);
        self.halt.halt(record)
    }

    /// The crash that has been recorded, if any.
    pub fn record(&self) -> Option<&CrashRecord> {
        self.record.get()
    }
}

impl<'a> fmt::Debug for CrashBridge<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CrashBridge")
            .field("record", &self.record.get())
            .finish()
    }
}

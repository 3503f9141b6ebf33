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

//! What a trap means, independent of the architecture that raised it.

use {
    bitflags::bitflags,

    crate::services::Signal,
};

bitflags! {
    /// Describes a memory access that faulted. The memory-fault resolver decides what to do based
    /// on these.
    pub struct FaultFlags: u32 {
        /// The page wasn't mapped at all.
        const PAGE_NOT_PRESENT = 0x0000_0001;
        /// The access was a write. Otherwise it was a read or an instruction fetch.
        const WRITE            = 0x0000_0002;
        /// The access broke a segmentation, alignment, or bus rule rather than a paging rule.
        const PROTECTION_FAULT = 0x0000_0004;
        /// The page was present, but its permissions didn't allow the access.
        const PERMISSION_ERROR = 0x0000_0008;
        /// The access went past the end of a bound (x86 `bound`).
        const OUT_OF_BOUNDS    = 0x0000_0010;
    }
}

impl FaultFlags {
    /// The signal a user-mode thread gets if the fault turns out to be the thread's own fault.
    pub fn violation_signal(self) -> Signal {
        if self.intersects(FaultFlags::PROTECTION_FAULT | FaultFlags::OUT_OF_BOUNDS) {
            Signal::Bus
        } else {
            Signal::AccessViolation
        }
    }
}

/// The flavors of arithmetic fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFaultKind {
    /// Integer division by zero.
    DivideByZero,
    /// Integer overflow (x86 `into`).
    Overflow,
    /// An unmasked x87 exception.
    X87,
    /// An unmasked SSE exception.
    Simd,
}

/// The flavors of debug trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// A breakpoint instruction.
    Break,
    /// A single-step trap.
    SingleStep,
    /// A request for the kernel debugger to do something, such as print a string.
    DebugService {
        /// Which service was requested.
        service: usize,
        /// The service's argument.
        parameter: usize,
    },
}

/// A trap, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCategory {
    /// A device interrupt.
    Interrupt {
        /// The interrupt vector.
        vector: u32,
    },
    /// An access to a page that wasn't mapped or didn't allow the access.
    PageFault {
        /// The faulting address.
        address: usize,
        /// What kind of access it was.
        flags: FaultFlags,
    },
    /// An access that broke a rule other than paging. The address is 0 when the hardware doesn't
    /// report one.
    ProtectionFault {
        /// The faulting address, if known.
        address: usize,
        /// What kind of access it was.
        flags: FaultFlags,
    },
    /// An instruction the CPU couldn't execute. On ARM this is refined further by the frame's
    /// `classify_undefined` before anything acts on it.
    UndefinedInstruction,
    /// An arithmetic fault.
    MathFault(MathFaultKind),
    /// A debug trap.
    Breakpoint(BreakKind),
    /// A floating-point instruction with hardware access disabled.
    FpuAccess,
    /// A system call.
    SystemCall {
        /// The call number.
        number: usize,
        /// The user-mode address of the parameter block.
        parameters: usize,
    },
}

impl TrapCategory {
    /// Returns `true` for device interrupts, which are time-charged to the interrupt period
    /// instead of the kernel period.
    pub fn is_interrupt(&self) -> bool {
        matches!(*self, TrapCategory::Interrupt { .. })
    }
}

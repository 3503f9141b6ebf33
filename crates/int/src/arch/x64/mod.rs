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

//! x64.

use {
    crate::frame::TrapFrame,
    super::ia32::{
        GateDescriptor, GateEncoding,
        EFLAG_TRAP, SYSTEM_CALL_INSTRUCTION_LENGTH,
    },
};

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod entry;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use self::entry::install_gates;

/// The interrupt-stack-table slot double faults run on.
pub const DOUBLE_FAULT_STACK: u8 = 1;
/// The interrupt-stack-table slot NMIs run on.
pub const NMI_STACK: u8 = 2;

/// The register state the x64 entry stubs save. The CPU always pushes SS and RSP in long mode,
/// so there's nothing to adjust for in kernel mode.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct X64TrapFrame {
    pub ds: u32,
    pub es: u32,
    pub fs: u32,
    pub gs: u32,
    pub padding: u64,
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl TrapFrame for X64TrapFrame {
    fn instruction_pointer(&self) -> usize {
        self.rip as usize
    }

    fn set_instruction_pointer(&mut self, address: usize) {
        self.rip = address as u64;
    }

    fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }

    fn set_stack_pointer(&mut self, address: usize) {
        self.rsp = address as u64;
    }

    fn is_privileged(&self) -> bool {
        self.cs & 3 == 0
    }

    fn error_code(&self) -> usize {
        self.error_code as usize
    }

    fn frame_footprint(&self) -> usize {
        0
    }

    fn system_call_arguments(&self) -> (usize, usize) {
        (self.rdi as usize, self.rsi as usize)
    }

    fn debug_service_arguments(&self) -> (usize, usize) {
        (self.rax as usize, self.rcx as usize)
    }

    fn set_system_call_result(&mut self, result: isize) {
        self.rax = result as u64;
    }

    fn rewind_system_call(&mut self, number: usize, parameters: usize) {
        self.rip = self.rip.wrapping_sub(SYSTEM_CALL_INSTRUCTION_LENGTH as u64);
        self.rdi = number as u64;
        self.rsi = parameters as u64;
    }

    fn set_single_step(&mut self) -> bool {
        self.rflags |= EFLAG_TRAP as u64;
        true
    }
}

/// A 64-bit gate descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct X64Gate {
    pub offset_low: u16,
    pub selector: u16,
    pub ist: u8,
    pub access: u8,
    pub offset_middle: u16,
    pub offset_high: u32,
    pub reserved: u32,
}

impl GateEncoding for X64Gate {
    const NOT_PRESENT: X64Gate = X64Gate {
        offset_low: 0, selector: 0, ist: 0, access: 0, offset_middle: 0, offset_high: 0, reserved: 0,
    };

    fn encode(descriptor: &GateDescriptor) -> X64Gate {
        let handler = descriptor.handler as u64;
        X64Gate {
            offset_low: handler as u16,
            selector: descriptor.selector(),
            ist: descriptor.stack,
            access: descriptor.access(),
            offset_middle: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }
}

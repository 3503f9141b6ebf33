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

//! 32-bit x86.

use {
    core::mem,

    crate::frame::TrapFrame,
    super::ia32::{
        GateDescriptor, GateEncoding,
        EFLAG_TRAP, SYSTEM_CALL_INSTRUCTION_LENGTH,
    },
};

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod entry;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use self::entry::install_gates;

/// The register state the x86 entry stubs save. In kernel mode the CPU doesn't push SS and ESP,
/// so the stubs record the stack pointer as it was when the frame started being built.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct X86TrapFrame {
    pub ds: u32,
    pub es: u32,
    pub fs: u32,
    pub gs: u32,
    pub ss: u32,
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
}

// EIP, CS, and EFLAGS, which the CPU pushes on the kernel stack below the recorded ESP.
const KERNEL_FRAME_FOOTPRINT: usize = 3 * mem::size_of::<u32>();

impl TrapFrame for X86TrapFrame {
    fn instruction_pointer(&self) -> usize {
        self.eip as usize
    }

    fn set_instruction_pointer(&mut self, address: usize) {
        self.eip = address as u32;
    }

    fn stack_pointer(&self) -> usize {
        self.esp as usize
    }

    fn set_stack_pointer(&mut self, address: usize) {
        self.esp = address as u32;
    }

    fn is_privileged(&self) -> bool {
        self.cs & 3 == 0
    }

    fn error_code(&self) -> usize {
        self.error_code as usize
    }

    fn frame_footprint(&self) -> usize {
        if self.is_privileged() { KERNEL_FRAME_FOOTPRINT } else { 0 }
    }

    fn system_call_arguments(&self) -> (usize, usize) {
        (self.eax as usize, self.ecx as usize)
    }

    fn debug_service_arguments(&self) -> (usize, usize) {
        (self.eax as usize, self.ecx as usize)
    }

    fn set_system_call_result(&mut self, result: isize) {
        self.eax = result as u32;
    }

    fn rewind_system_call(&mut self, number: usize, parameters: usize) {
        self.eip = self.eip.wrapping_sub(SYSTEM_CALL_INSTRUCTION_LENGTH as u32);
        self.eax = number as u32;
        self.ecx = parameters as u32;
    }

    fn set_single_step(&mut self) -> bool {
        self.eflags |= EFLAG_TRAP as u32;
        true
    }
}

/// A 32-bit gate descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct X86Gate {
    pub offset_low: u16,
    pub selector: u16,
    pub count: u8,
    pub access: u8,
    pub offset_high: u16,
}

impl GateEncoding for X86Gate {
    const NOT_PRESENT: X86Gate = X86Gate { offset_low: 0, selector: 0, count: 0, access: 0, offset_high: 0 };

    fn encode(descriptor: &GateDescriptor) -> X86Gate {
        let handler = descriptor.handler as u32;
        X86Gate {
            offset_low: handler as u16,
            selector: descriptor.selector(),
            count: 0,
            access: descriptor.access(),
            offset_high: (handler >> 16) as u16,
        }
    }
}

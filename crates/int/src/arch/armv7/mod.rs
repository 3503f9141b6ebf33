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

//! 32-bit ARM: the trap frame, abort decoding, and undefined-instruction decoding.

use {
    core::mem,

    crate::{
        category::{BreakKind, FaultFlags, TrapCategory},
        frame::TrapFrame,
        services::UserMemory,
    },
};

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod entry;

/// CPSR: the processor mode.
pub const PSR_MODE_MASK: u32 = 0x1f;
/// CPSR mode: user.
pub const PSR_MODE_USER: u32 = 0x10;
/// CPSR: Thumb state.
pub const PSR_FLAG_THUMB: u32 = 0x20;

/// The instruction `svc #0`, which is the only way into the marshaler.
const SVC_LENGTH_ARM: u32 = 4;
const SVC_LENGTH_THUMB: u32 = 2;

/// The register state the ARM exception stubs save.
#[repr(C)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ArmTrapFrame {
    pub svc_sp: u32,
    pub user_sp: u32,
    pub user_link: u32,
    pub r0: u32,
    pub exception_cpsr: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub r12: u32,
    pub svc_link: u32,
    pub pc: u32,
    pub cpsr: u32,
}

impl ArmTrapFrame {
    /// Returns `true` if the trapped code was running Thumb instructions.
    pub fn is_thumb(&self) -> bool {
        self.cpsr & PSR_FLAG_THUMB != 0
    }
}

impl TrapFrame for ArmTrapFrame {
    fn instruction_pointer(&self) -> usize {
        self.pc as usize
    }

    fn set_instruction_pointer(&mut self, address: usize) {
        self.pc = address as u32;
    }

    fn stack_pointer(&self) -> usize {
        if self.is_privileged() {
            self.svc_sp as usize
        } else {
            self.user_sp as usize
        }
    }

    fn set_stack_pointer(&mut self, address: usize) {
        if self.is_privileged() {
            self.svc_sp = address as u32;
        } else {
            self.user_sp = address as u32;
        }
    }

    fn is_privileged(&self) -> bool {
        self.cpsr & PSR_MODE_MASK != PSR_MODE_USER
    }

    fn error_code(&self) -> usize {
        0
    }

    fn frame_footprint(&self) -> usize {
        // In kernel mode the frame sits on the same stack the trapped code was using.
        if self.is_privileged() {
            mem::size_of::<ArmTrapFrame>()
        } else {
            0
        }
    }

    fn system_call_arguments(&self) -> (usize, usize) {
        (self.r0 as usize, self.r1 as usize)
    }

    fn debug_service_arguments(&self) -> (usize, usize) {
        (self.r0 as usize, self.r1 as usize)
    }

    fn set_system_call_result(&mut self, result: isize) {
        self.r0 = result as u32;
    }

    fn rewind_system_call(&mut self, number: usize, parameters: usize) {
        let length = if self.is_thumb() { SVC_LENGTH_THUMB } else { SVC_LENGTH_ARM };
        self.pc = self.pc.wrapping_sub(length);
        self.r0 = number as u32;
        self.r1 = parameters as u32;
    }

    fn set_single_step(&mut self) -> bool {
        false
    }

    fn classify_undefined(&self, memory: &dyn UserMemory, fpu_access_enabled: bool) -> TrapCategory {
        let privileged = self.is_privileged();
        let instruction = if self.is_thumb() {
            read_thumb_instruction(memory, self.instruction_pointer(), privileged)
        } else {
            read_arm_instruction(memory, self.instruction_pointer(), privileged)
        };
        match instruction {
            Some(instruction) => {
                let (service, parameter) = self.debug_service_arguments();
                classify_instruction(instruction, service, parameter, fpu_access_enabled)
            },
            None => TrapCategory::UndefinedInstruction,
        }
    }
}

/// An instruction fetched for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// A 32-bit ARM-state instruction.
    Arm(u32),
    /// A 16-bit Thumb instruction.
    Thumb16(u16),
    /// A 32-bit Thumb instruction, first halfword in the upper bits.
    Thumb32(u32),
}

/// ARM-state breakpoint.
pub const ARM_BREAK_INSTRUCTION: u32         = 0xe7f0_00f3;
/// ARM-state single-step breakpoint.
pub const ARM_SINGLE_STEP_INSTRUCTION: u32   = 0xe7f0_00f1;
/// ARM-state debug-service request.
pub const ARM_DEBUG_SERVICE_INSTRUCTION: u32 = 0xe7f0_00f4;
/// Thumb breakpoint.
pub const THUMB_BREAK_INSTRUCTION: u16         = 0xde20;
/// Thumb single-step breakpoint.
pub const THUMB_SINGLE_STEP_INSTRUCTION: u16   = 0xde21;
/// Thumb debug-service request.
pub const THUMB_DEBUG_SERVICE_INSTRUCTION: u16 = 0xde24;

fn read_arm_instruction(memory: &dyn UserMemory, address: usize, privileged: bool) -> Option<Instruction> {
    let mut bytes = [0; 4];
    memory.read_instruction(address, privileged, &mut bytes).ok()?;
    Some(Instruction::Arm(u32::from_le_bytes(bytes)))
}

fn read_thumb_instruction(memory: &dyn UserMemory, address: usize, privileged: bool) -> Option<Instruction> {
    let mut first = [0; 2];
    memory.read_instruction(address, privileged, &mut first).ok()?;
    let first = u16::from_le_bytes(first);

    // 0b11101, 0b11110 and 0b11111 in the top bits mean a second halfword follows.
    if first >> 11 < 0b11101 {
        return Some(Instruction::Thumb16(first));
    }
    let mut second = [0; 2];
    memory.read_instruction(address.wrapping_add(2), privileged, &mut second).ok()?;
    Some(Instruction::Thumb32((u32::from(first) << 16) | u32::from(u16::from_le_bytes(second))))
}

/// Decides what an undefined instruction was for. `service` and `parameter` are the debug-service
/// registers (R0 and R1).
pub fn classify_instruction(instruction: Instruction, service: usize, parameter: usize, fpu_access_enabled: bool)
        -> TrapCategory {
    let debug_service = TrapCategory::Breakpoint(BreakKind::DebugService { service, parameter });
    match instruction {
        Instruction::Arm(ARM_BREAK_INSTRUCTION) | Instruction::Thumb16(THUMB_BREAK_INSTRUCTION)
            => TrapCategory::Breakpoint(BreakKind::Break),
        Instruction::Arm(ARM_SINGLE_STEP_INSTRUCTION) | Instruction::Thumb16(THUMB_SINGLE_STEP_INSTRUCTION)
            => TrapCategory::Breakpoint(BreakKind::SingleStep),
        Instruction::Arm(ARM_DEBUG_SERVICE_INSTRUCTION) | Instruction::Thumb16(THUMB_DEBUG_SERVICE_INSTRUCTION)
            => debug_service,
        instruction if !fpu_access_enabled && is_floating_point(instruction) => TrapCategory::FpuAccess,
        _ => TrapCategory::UndefinedInstruction,
    }
}

// Coprocessors 10 and 11 are VFP; the rest is Advanced SIMD.
fn is_floating_point(instruction: Instruction) -> bool {
    match instruction {
        Instruction::Arm(x) => {
            x & 0x0c00_0e00 == 0x0c00_0a00       // VFP load/store, register transfer, data processing
                || x & 0xfe00_0000 == 0xf200_0000 // Advanced SIMD data processing
                || x & 0xff10_0000 == 0xf400_0000 // Advanced SIMD element load/store
        },
        Instruction::Thumb32(x) => {
            x & 0xec00_0e00 == 0xec00_0a00
                || x & 0xef00_0000 == 0xef00_0000
                || x & 0xff10_0000 == 0xf900_0000
        },
        Instruction::Thumb16(_) => false,
    }
}

/// Fault status: the bits that identify the fault type.
pub const FSR_TYPE_MASK: u32 = 0x40f;
/// Fault status: the access was a write (data aborts only).
pub const FSR_WRITE: u32     = 0x800;
/// Fault status: an external abort.
pub const FSR_EXTERNAL: u32  = 0x1000;

const FSR_DEBUG_EVENT: u32              = 0x002;
const FSR_ACCESS_FLAG_SECTION: u32      = 0x003;
const FSR_TRANSLATION_SECTION: u32      = 0x005;
const FSR_ACCESS_FLAG_PAGE: u32         = 0x006;
const FSR_TRANSLATION_PAGE: u32         = 0x007;
const FSR_DOMAIN_SECTION: u32           = 0x009;
const FSR_DOMAIN_PAGE: u32              = 0x00b;
const FSR_PERMISSION_SECTION: u32       = 0x00d;
const FSR_PERMISSION_PAGE: u32          = 0x00f;

/// Decodes a data or prefetch abort from its fault status register and fault address.
pub fn classify_abort(address: usize, status: u32, prefetch: bool) -> TrapCategory {
    let mut flags = FaultFlags::empty();
    if !prefetch && status & FSR_WRITE != 0 {
        flags |= FaultFlags::WRITE;
    }
    if status & FSR_EXTERNAL != 0 {
        return TrapCategory::ProtectionFault { address, flags: flags | FaultFlags::PROTECTION_FAULT };
    }

    match status & FSR_TYPE_MASK {
        FSR_DEBUG_EVENT => TrapCategory::Breakpoint(BreakKind::Break),

        FSR_TRANSLATION_SECTION | FSR_TRANSLATION_PAGE
            => TrapCategory::PageFault { address, flags: flags | FaultFlags::PAGE_NOT_PRESENT },

        FSR_ACCESS_FLAG_SECTION | FSR_ACCESS_FLAG_PAGE
            | FSR_DOMAIN_SECTION | FSR_DOMAIN_PAGE
            | FSR_PERMISSION_SECTION | FSR_PERMISSION_PAGE
            => TrapCategory::PageFault { address, flags: flags | FaultFlags::PERMISSION_ERROR },

        // Alignment, external aborts, and parity errors.
        _ => TrapCategory::ProtectionFault { address, flags: flags | FaultFlags::PROTECTION_FAULT },
    }
}

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

//! Everything x86 and x64 have in common: the exception vectors, how they're classified, and the
//! shape of the interrupt descriptor table.

#![allow(missing_docs)]

use {
    core::{fmt, ops::Range},

    crate::{
        category::{BreakKind, FaultFlags, MathFaultKind, TrapCategory},
        frame::TrapFrame,
    },
};

pub const VECTOR_DIVIDE_ERROR: u8         = 0x00;
pub const VECTOR_DEBUG: u8                = 0x01;
pub const VECTOR_NMI: u8                  = 0x02;
pub const VECTOR_BREAKPOINT: u8           = 0x03;
pub const VECTOR_OVERFLOW: u8             = 0x04;
pub const VECTOR_BOUND: u8                = 0x05;
pub const VECTOR_INVALID_OPCODE: u8       = 0x06;
pub const VECTOR_DEVICE_NOT_AVAILABLE: u8 = 0x07;
pub const VECTOR_DOUBLE_FAULT: u8         = 0x08;
pub const VECTOR_SEGMENT_OVERRUN: u8      = 0x09;
pub const VECTOR_INVALID_TSS: u8          = 0x0a;
pub const VECTOR_INVALID_SEGMENT: u8      = 0x0b;
pub const VECTOR_STACK_EXCEPTION: u8      = 0x0c;
pub const VECTOR_PROTECTION_FAULT: u8     = 0x0d;
pub const VECTOR_PAGE_FAULT: u8           = 0x0e;
pub const VECTOR_MATH_FAULT: u8           = 0x10;
pub const VECTOR_ALIGNMENT_CHECK: u8      = 0x11;
pub const VECTOR_MACHINE_CHECK: u8        = 0x12;
pub const VECTOR_SIMD_EXCEPTION: u8       = 0x13;
pub const VECTOR_DEBUG_SERVICE: u8        = 0x21;
pub const VECTOR_SYSTEM_CALL: u8          = 0x2f;
pub const VECTOR_SPURIOUS_INTERRUPT: u8   = 0xff;

/// The first vector available to devices.
pub const MINIMUM_VECTOR: u8 = 0x30;
/// The last vector in the table.
pub const MAXIMUM_VECTOR: u8 = 0xff;
/// The number of entries in the interrupt descriptor table.
pub const IDT_SIZE: usize = 0x100;

pub const KERNEL_CS: u16        = 0x08;
pub const USER_CS: u16          = 0x18 | 3;
pub const DOUBLE_FAULT_TSS: u16 = 0x40;
pub const NMI_TSS: u16          = 0x48;

pub const GATE_ACCESS_PRESENT: u8 = 0x80;
pub const GATE_ACCESS_USER: u8    = 0x60;
pub const GATE_TYPE_INTERRUPT: u8 = 0x0e;
pub const GATE_TYPE_TRAP: u8      = 0x0f;
pub const GATE_TYPE_TASK: u8      = 0x05;

/// EFLAGS: trap after every instruction.
pub const EFLAG_TRAP: usize = 0x0000_0100;

/// The length of `int 0x2f`, which is how user mode makes a system call.
pub const SYSTEM_CALL_INSTRUCTION_LENGTH: usize = 2;

const PAGE_FAULT_PRESENT: usize = 0x1;
const PAGE_FAULT_WRITE: usize   = 0x2;

/// A vector that has no business being raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnexpectedTrap {
    /// The vector.
    pub vector: u8,
}

impl fmt::Display for UnexpectedTrap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unexpected trap vector {:#04x}", self.vector)
    }
}

impl error::Error for UnexpectedTrap {}

/// Returns `true` if the entry point has to read CR2 before classifying `vector`. Stack exceptions
/// are handled as page faults.
pub fn uses_fault_address(vector: u8) -> bool {
    vector == VECTOR_PAGE_FAULT || vector == VECTOR_STACK_EXCEPTION
}

/// Classifies a trap from its vector. `fault_address` is CR2, which only matters for the vectors
/// where `uses_fault_address` is `true`.
pub fn classify_vector(vector: u8, frame: &dyn TrapFrame, fault_address: usize) -> Result<TrapCategory, UnexpectedTrap> {
    Ok(match vector {
        VECTOR_DIVIDE_ERROR         => TrapCategory::MathFault(MathFaultKind::DivideByZero),
        VECTOR_DEBUG                => TrapCategory::Breakpoint(BreakKind::SingleStep),
        VECTOR_BREAKPOINT           => TrapCategory::Breakpoint(BreakKind::Break),
        VECTOR_OVERFLOW             => TrapCategory::MathFault(MathFaultKind::Overflow),
        VECTOR_BOUND                => TrapCategory::ProtectionFault {
            address: 0,
            flags: FaultFlags::PROTECTION_FAULT | FaultFlags::OUT_OF_BOUNDS,
        },
        VECTOR_INVALID_OPCODE       => TrapCategory::UndefinedInstruction,
        VECTOR_DEVICE_NOT_AVAILABLE => TrapCategory::FpuAccess,
        VECTOR_PROTECTION_FAULT | VECTOR_ALIGNMENT_CHECK => TrapCategory::ProtectionFault {
            address: 0,
            flags: FaultFlags::PROTECTION_FAULT,
        },
        VECTOR_PAGE_FAULT | VECTOR_STACK_EXCEPTION => TrapCategory::PageFault {
            address: fault_address,
            flags: page_fault_flags(frame.error_code()),
        },
        VECTOR_MATH_FAULT           => TrapCategory::MathFault(MathFaultKind::X87),
        VECTOR_SIMD_EXCEPTION       => TrapCategory::MathFault(MathFaultKind::Simd),
        VECTOR_DEBUG_SERVICE        => {
            let (service, parameter) = frame.debug_service_arguments();
            TrapCategory::Breakpoint(BreakKind::DebugService { service, parameter })
        },
        VECTOR_SYSTEM_CALL          => {
            let (number, parameters) = frame.system_call_arguments();
            TrapCategory::SystemCall { number, parameters }
        },
        vector if vector >= MINIMUM_VECTOR => TrapCategory::Interrupt { vector: u32::from(vector) },
        vector => return Err(UnexpectedTrap { vector }),
    })
}

/// Decodes a page fault's error code.
pub fn page_fault_flags(error_code: usize) -> FaultFlags {
    let mut flags = if error_code & PAGE_FAULT_PRESENT == 0 {
        FaultFlags::PAGE_NOT_PRESENT
    } else {
        FaultFlags::PERMISSION_ERROR
    };
    if error_code & PAGE_FAULT_WRITE != 0 {
        flags |= FaultFlags::WRITE;
    }
    flags
}

/// What kind of gate a vector gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Interrupts are masked on entry.
    Interrupt,
    /// Interrupts stay as they were.
    Trap,
    /// A hardware task switch to the given TSS (32-bit only).
    Task {
        /// The TSS selector.
        selector: u16,
    },
}

/// One entry of the interrupt descriptor table, before it's encoded for the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDescriptor {
    /// The entry stub's address (unused for task gates).
    pub handler: usize,
    /// The gate type.
    pub kind: GateKind,
    /// Whether user mode may raise the vector with `int`.
    pub user: bool,
    /// The interrupt stack table slot to switch to (x64 only; 0 means no switch).
    pub stack: u8,
}

impl GateDescriptor {
    fn kernel(handler: usize, kind: GateKind) -> GateDescriptor {
        GateDescriptor { handler, kind, user: false, stack: 0 }
    }

    fn user(handler: usize, kind: GateKind) -> GateDescriptor {
        GateDescriptor { handler, kind, user: true, stack: 0 }
    }

    /// The access byte: present bit, privilege level, and gate type.
    pub fn access(&self) -> u8 {
        let kind = match self.kind {
            GateKind::Interrupt => GATE_TYPE_INTERRUPT,
            GateKind::Trap => GATE_TYPE_TRAP,
            GateKind::Task { .. } => GATE_TYPE_TASK,
        };
        GATE_ACCESS_PRESENT | if self.user { GATE_ACCESS_USER } else { 0 } | kind
    }

    /// The code segment (or TSS, for task gates) the gate refers to.
    pub fn selector(&self) -> u16 {
        match self.kind {
            GateKind::Task { selector } => selector,
            GateKind::Interrupt | GateKind::Trap => KERNEL_CS,
        }
    }
}

/// How the NMI and double-fault vectors get a known-good stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyStacks {
    /// Task gates to dedicated TSSs (x86).
    TaskGates,
    /// Interrupt gates with dedicated interrupt-stack-table slots (x64).
    InterruptStackTable {
        /// The slot for double faults.
        double_fault: u8,
        /// The slot for NMIs.
        nmi: u8,
    },
}

/// The addresses of the assembly entry stubs.
#[derive(Debug, Clone)]
pub struct GateHandlers {
    pub divide_error: usize,
    pub single_step: usize,
    pub nmi: usize,
    pub breakpoint: usize,
    pub invalid_opcode: usize,
    pub fpu_access: usize,
    pub double_fault: usize,
    pub stack_exception: usize,
    pub protection_fault: usize,
    pub page_fault: usize,
    pub math_fault: usize,
    pub debug_service: usize,
    pub system_call: usize,
    pub spurious: usize,
    /// The device-vector stubs: identical, evenly spaced copies, one per vector from
    /// `MINIMUM_VECTOR` up to (not including) `MAXIMUM_VECTOR`.
    pub device_stubs: Range<usize>,
}

impl GateHandlers {
    /// The stub for device vector `vector`.
    pub fn device_stub(&self, vector: u8) -> usize {
        let stride = (self.device_stubs.end - self.device_stubs.start) / usize::from(MAXIMUM_VECTOR - MINIMUM_VECTOR);
        self.device_stubs.start + usize::from(vector - MINIMUM_VECTOR) * stride
    }
}

/// Lays out the interrupt descriptor table. Vectors left as `None` aren't present, so raising one
/// is a fault of its own.
pub fn gate_plan(handlers: &GateHandlers, stacks: EmergencyStacks) -> [Option<GateDescriptor>; IDT_SIZE] {
    use self::GateKind::{Interrupt, Trap};

    let mut plan = [None; IDT_SIZE];
    for vector in MINIMUM_VECTOR .. MAXIMUM_VECTOR {
        plan[usize::from(vector)] = Some(GateDescriptor::kernel(handlers.device_stub(vector), Interrupt));
    }

    let mut set = |vector: u8, descriptor: GateDescriptor| plan[usize::from(vector)] = Some(descriptor);
    set(VECTOR_DIVIDE_ERROR,         GateDescriptor::user(handlers.divide_error, Trap));
    set(VECTOR_BREAKPOINT,           GateDescriptor::user(handlers.breakpoint, Interrupt));
    set(VECTOR_DEBUG,                GateDescriptor::kernel(handlers.single_step, Interrupt));
    set(VECTOR_DEBUG_SERVICE,        GateDescriptor::kernel(handlers.debug_service, Interrupt));
    set(VECTOR_INVALID_OPCODE,       GateDescriptor::kernel(handlers.invalid_opcode, Interrupt));
    set(VECTOR_PROTECTION_FAULT,     GateDescriptor::kernel(handlers.protection_fault, Interrupt));
    set(VECTOR_MATH_FAULT,           GateDescriptor::kernel(handlers.math_fault, Interrupt));
    set(VECTOR_SYSTEM_CALL,          GateDescriptor::user(handlers.system_call, Trap));
    set(VECTOR_SPURIOUS_INTERRUPT,   GateDescriptor::kernel(handlers.spurious, Interrupt));
    set(VECTOR_PAGE_FAULT,           GateDescriptor::kernel(handlers.page_fault, Interrupt));
    set(VECTOR_STACK_EXCEPTION,      GateDescriptor::kernel(handlers.stack_exception, Interrupt));
    set(VECTOR_DEVICE_NOT_AVAILABLE, GateDescriptor::kernel(handlers.fpu_access, Trap));

    match stacks {
        EmergencyStacks::TaskGates => {
            set(VECTOR_NMI,          GateDescriptor::kernel(0, GateKind::Task { selector: NMI_TSS }));
            set(VECTOR_DOUBLE_FAULT, GateDescriptor::kernel(0, GateKind::Task { selector: DOUBLE_FAULT_TSS }));
        },
        EmergencyStacks::InterruptStackTable { double_fault, nmi } => {
            set(VECTOR_NMI,          GateDescriptor { stack: nmi, ..GateDescriptor::kernel(handlers.nmi, Interrupt) });
            set(VECTOR_DOUBLE_FAULT, GateDescriptor { stack: double_fault, ..GateDescriptor::kernel(handlers.double_fault, Interrupt) });
        },
    }

    plan
}

/// A hardware gate format.
pub trait GateEncoding: Copy {
    /// An entry with the present bit clear.
    const NOT_PRESENT: Self;

    /// Encodes a planned gate.
    fn encode(descriptor: &GateDescriptor) -> Self;
}

/// Encodes a whole table.
pub fn encode_gates<G: GateEncoding>(plan: &[Option<GateDescriptor>; IDT_SIZE]) -> [G; IDT_SIZE] {
    let mut table = [G::NOT_PRESENT; IDT_SIZE];
    for (gate, descriptor) in table.iter_mut().zip(plan.iter()) {
        if let Some(descriptor) = descriptor {
            *gate = G::encode(descriptor);
        }
    }
    table
}

/// Checks a plan for the mistakes that would only show up as a triple fault.
#[cfg(any(feature = "self-test", test))]
pub fn validate_gate_plan(plan: &[Option<GateDescriptor>; IDT_SIZE]) -> Result<(), UnexpectedTrap> {
    let required = [
        VECTOR_DIVIDE_ERROR, VECTOR_DEBUG, VECTOR_NMI, VECTOR_BREAKPOINT, VECTOR_INVALID_OPCODE,
        VECTOR_DEVICE_NOT_AVAILABLE, VECTOR_DOUBLE_FAULT, VECTOR_STACK_EXCEPTION,
        VECTOR_PROTECTION_FAULT, VECTOR_PAGE_FAULT, VECTOR_MATH_FAULT, VECTOR_DEBUG_SERVICE,
        VECTOR_SYSTEM_CALL,
    ];
    for vector in required.iter().copied().chain(MINIMUM_VECTOR ..= MAXIMUM_VECTOR) {
        match plan[usize::from(vector)] {
            Some(GateDescriptor { kind: GateKind::Task { .. }, .. }) => {},
            Some(GateDescriptor { handler, .. }) if handler != 0 => {},
            _ => return Err(UnexpectedTrap { vector }),
        }
    }
    Ok(())
}

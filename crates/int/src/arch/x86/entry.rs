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

//! What the x86 entry stubs call, and loading the interrupt descriptor table.

use {
    core::{arch::asm, convert::TryFrom, mem},
    spin::Once,

    crate::{
        arch::ia32::{
            classify_vector, encode_gates, gate_plan, EmergencyStacks, GateHandlers, IDT_SIZE,
            uses_fault_address,
        },
        entry::installed_dispatcher,
    },
    super::{X86Gate, X86TrapFrame},
};

static IDT: Once<[X86Gate; IDT_SIZE]> = Once::new();

#[repr(C, packed)]
struct TableRegister {
    limit: u16,
    base: u32,
}

/// Builds the interrupt descriptor table (the first time this is called) and loads it on this CPU.
pub fn install_gates(handlers: &GateHandlers) {
    let idt = IDT.call_once(|| {
        let plan = gate_plan(handlers, EmergencyStacks::TaskGates);
        #[cfg(feature = "self-test")]
        assert_eq!(crate::arch::ia32::validate_gate_plan(&plan), Ok(()));
        encode_gates(&plan)
    });
    let register = TableRegister {
        limit: (IDT_SIZE * mem::size_of::<X86Gate>() - 1) as u16,
        base: idt.as_ptr() as u32,
    };
    unsafe {
        asm!("lidt [{}]", in(reg) &register, options(readonly, nostack, preserves_flags));
    }
}

fn read_cr2() -> usize {
    let address: usize;
    unsafe {
        asm!("mov {}, cr2", out(reg) address, options(nomem, nostack, preserves_flags));
    }
    address
}

#[no_mangle]
extern "C" fn flint_x86_trap(frame: &mut X86TrapFrame, vector: u32) {
    let dispatcher = installed_dispatcher();
    let vector = match u8::try_from(vector) {
        Ok(vector) => vector,
        Err(_) => dispatcher.dispatch_unexpected(frame, vector),
    };
    let fault_address = if uses_fault_address(vector) { read_cr2() } else { 0 };
    match classify_vector(vector, &*frame, fault_address) {
        Ok(category) => dispatcher.dispatch(frame, category),
        Err(error) => dispatcher.dispatch_unexpected(frame, u32::from(error.vector)),
    }
}

// Runs on the double-fault TSS. The stub rebuilds a frame from the faulting task's TSS.
#[no_mangle]
extern "C" fn flint_x86_double_fault(frame: &mut X86TrapFrame) -> ! {
    installed_dispatcher().dispatch_double_fault(frame)
}

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

//! This crate and its dependencies comprise the trap-handling core of the Flint kernel: everything
//! between an exception vector firing and the trapped code resuming (or the system stopping).
//!
//! The platform layer calls `init` once at boot with the collaborators the dispatch core needs.
//! From then on the assembly entry stubs in the `int` crate find the installed dispatcher on their
//! own.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

pub use {
    fpu::{FpuContextAllocator, FpuHardware, FpuState, HeapFpuContextAllocator, LazyFpu},
    int::*,
    io::Console,
    processor::{CycleAccount, ProcessorBlock, RunLevel},
    scheduler::{Thread, ThreadFlags, ThreadId},
};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use int::arch::ia32::GateHandlers;

/// Everything the platform layer hands over at boot.
pub struct InitParameters {
    /// Where crash records and debug notes are printed.
    pub console: &'static dyn Console,
    /// The collaborators every trap is dispatched to.
    pub services: Services<'static>,
    /// The system calls user mode can make.
    pub system_calls: SystemCallTable<'static>,
    /// The addresses of the assembly stubs to put in the interrupt descriptor table.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub gate_handlers: GateHandlers,
}

/// Installs the dispatch core and, on x86 and x64, loads the interrupt descriptor table on this
/// CPU. Any trap taken before this returns stops the CPU that took it.
pub fn init(parameters: InitParameters) -> TrapDispatcher<'static> {
    io::set_console(parameters.console);
    let dispatcher = int::entry::install(parameters.services, parameters.system_calls);

    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "x86", target_os = "none"))] {
            int::arch::x86::install_gates(&parameters.gate_handlers);
        } else if #[cfg(all(target_arch = "x86_64", target_os = "none"))] {
            int::arch::x64::install_gates(&parameters.gate_handlers);
        }
    }

    io::println!("trap dispatch ready: {} system calls", parameters.system_calls.len());
    dispatcher
}

/// Loads the interrupt descriptor table on a secondary CPU. `init` must already have run on the
/// boot CPU.
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_os = "none"))]
pub fn init_secondary(gate_handlers: &GateHandlers) {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "x86")] {
            int::arch::x86::install_gates(gate_handlers);
        } else {
            int::arch::x64::install_gates(gate_handlers);
        }
    }
}

// A kernel panic is just another kind of crash. If it happens before the crash bridge exists,
// there's nothing to report it with, so the CPU simply stops.
#[cfg(all(target_os = "none", not(feature = "unit-test")))]
#[panic_handler]
#[cold]
fn panic_handler(panic_info: &core::panic::PanicInfo) -> ! {
    io::println!("kernel panic: {}", panic_info);
    match int::entry::crash_bridge() {
        Some(bridge) => bridge.crash(CrashCode::KernelPanic, 0, 0, 0, 0),
        None => Hang.halt(&CrashRecord { code: CrashCode::KernelPanic, parameters: [0; 4] }),
    }
}

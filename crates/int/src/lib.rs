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

//! This crate defines how the kernel deals with traps: CPU exceptions, device interrupts as they
//! arrive from the entry stubs, and system calls. It decides what happens after a trap and hands
//! the actual work to the collaborators in a `Services` bundle: the memory manager resolves page
//! faults, the process layer queues and delivers signals, the interrupt layer runs device service
//! routines, and the kernel debugger gets the first look at anything fatal.
//!
//! Every trap ends in exactly one of three ways: the trapped code resumes, a signal is queued for
//! the trapped thread and it resumes (perhaps in a signal handler), or the kernel crashes.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

pub mod arch;
pub mod category;
pub mod crash;
pub mod dispatch;
pub mod entry;
pub mod frame;
pub mod services;
pub mod syscall;

#[cfg(test)]
mod testing;

#[cfg(any(target_arch = "arm", target_arch = "x86", target_arch = "x86_64"))]
pub use services::{Hang, LocalInterrupts};

pub use {
    category::{BreakKind, FaultFlags, MathFaultKind, TrapCategory},
    crash::{CrashBridge, CrashCode, CrashRecord},
    dispatch::TrapDispatcher,
    frame::TrapFrame,
    services::{
        AccessFault, DebugException, DebuggerResponse, ExecutionContext, InterruptControl,
        InterruptDispatcher, KernelDebugger, MemoryFaultResolver, Services, Signal, SignalSubsystem,
        SystemHalt, UserMemory,
    },
    syscall::{
        Status, SystemCallEntry, SystemCallError, SystemCallFlags, SystemCallRoutine, SystemCallTable,
        MAX_PARAMETER_SIZE,
    },
};

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

//! The heart of trap handling: deciding what happens after a trap, given what kind of trap it was
//! and where it came from.

use {
    core::ptr::NonNull,
    fpu::LazyFpu,
    io::printlndebug,
    processor::CycleAccount,
    scheduler::Thread,

    crate::{
        category::{BreakKind, MathFaultKind, TrapCategory},
        crash::{CrashBridge, CrashCode},
        frame::{frame_address, TrapFrame},
        services::{DebugException, DebuggerResponse, Services, Signal},
        syscall::SystemCallTable,
    },
};

/// Dispatches classified traps to the collaborators in a `Services` bundle.
#[derive(Debug, Clone, Copy)]
pub struct TrapDispatcher<'a> {
    pub(crate) services: &'a Services<'a>,
    pub(crate) crash: &'a CrashBridge<'a>,
    pub(crate) system_calls: &'a SystemCallTable<'a>,
}

impl<'a> TrapDispatcher<'a> {
    /// Makes a dispatcher.
    pub fn new(services: &'a Services<'a>, crash: &'a CrashBridge<'a>, system_calls: &'a SystemCallTable<'a>)
            -> TrapDispatcher<'a> {
        TrapDispatcher { services, crash, system_calls }
    }

    /// Handles one trap. Returns when the trapped code can resume (possibly at a signal handler);
    /// doesn't return at all if the trap was fatal.
    pub fn dispatch(&self, frame: &mut dyn TrapFrame, category: TrapCategory) {
        let processor = self.services.context.current_processor();
        let period = if category.is_interrupt() { CycleAccount::Interrupt } else { CycleAccount::Kernel };
        let previous_period = processor.begin_cycle_accounting(period);

        let footprint = frame.frame_footprint();
        frame.set_stack_pointer(frame.stack_pointer().wrapping_add(footprint));

        if frame.is_privileged() {
            self.dispatch_privileged(frame, category);
        } else {
            self.dispatch_user(frame, category);
        }

        frame.set_stack_pointer(frame.stack_pointer().wrapping_sub(footprint));
        processor.begin_cycle_accounting(previous_period);
    }

    /// Handles a vector that nothing should ever raise. Always fatal, whichever mode it came from.
    pub fn dispatch_unexpected(&self, frame: &mut dyn TrapFrame, vector: u32) -> ! {
        self.services.context.current_processor().begin_cycle_accounting(CycleAccount::Kernel);
        printlndebug!("unexpected trap vector {:#x} at {:#x} (error code {:#x})",
            vector, frame.instruction_pointer(), frame.error_code());
        let _ = self.services.debugger.handle_exception(DebugException::UnexpectedTrap, Some(vector as usize), frame);
        self.crash(CrashCode::UnexpectedTrap, frame)
    }

    /// Handles a double fault. The debugger gets a look, but there's no coming back from one.
    pub fn dispatch_double_fault(&self, frame: &mut dyn TrapFrame) -> ! {
        self.services.context.current_processor().begin_cycle_accounting(CycleAccount::Kernel);
        let _ = self.services.debugger.handle_exception(DebugException::DoubleFault, None, frame);
        self.crash(CrashCode::KernelStackException, frame)
    }

    fn dispatch_privileged(&self, frame: &mut dyn TrapFrame, category: TrapCategory) {
        let category = match category {
            TrapCategory::UndefinedInstruction => self.refine_undefined(frame),
            category => category,
        };

        let (exception, parameter, code) = match category {
            TrapCategory::Interrupt { vector } => {
                self.services.interrupts.dispatch_interrupt(vector, frame);
                return;
            },
            TrapCategory::Breakpoint(kind) => {
                let (exception, parameter) = debug_exception(kind);
                let _ = self.services.debugger.handle_exception(exception, parameter, frame);
                return;
            },
            TrapCategory::FpuAccess => {
                match self.current_thread() {
                    Some(mut thread) => self.handle_fpu_access(frame, borrow_thread(&mut thread), true),
                    None => self.fatal(DebugException::FpuUnavailable, None, CrashCode::FpuUnavailable, frame),
                }
                return;
            },
            TrapCategory::PageFault { address, .. } => (DebugException::AccessViolation, Some(address), CrashCode::PageFault),
            TrapCategory::ProtectionFault { address, .. } => (DebugException::AccessViolation, Some(address), CrashCode::ProtectionFault),
            TrapCategory::UndefinedInstruction => (DebugException::UndefinedInstruction, None, CrashCode::IllegalInstruction),
            TrapCategory::MathFault(MathFaultKind::DivideByZero) => (DebugException::DivideByZero, None, CrashCode::MathFault),
            TrapCategory::MathFault(_) => (DebugException::MathFault, None, CrashCode::MathFault),
            TrapCategory::SystemCall { number, .. } => (DebugException::UnexpectedTrap, Some(number), CrashCode::UnexpectedTrap),
        };

        self.fatal(exception, parameter, code, frame);
    }

    fn dispatch_user(&self, frame: &mut dyn TrapFrame, category: TrapCategory) {
        let mut thread = match self.current_thread() {
            Some(thread) => thread,
            None => {
                self.fatal(DebugException::NoThread, None, CrashCode::NoCurrentThread, frame);
                return;
            },
        };

        let category = match category {
            TrapCategory::SystemCall { number, parameters } => {
                self.dispatch_system_call_for(thread, number, parameters, frame);
                return;
            },
            TrapCategory::Interrupt { vector } => {
                self.services.interrupts.dispatch_interrupt(vector, frame);
                None
            },
            category => Some(category),
        };

        let control = self.services.interrupt_control;
        control.enable();

        if let Some(category) = category {
            self.perform_user_action(frame, &mut thread, category);
        }

        let signals = self.services.signals;
        signals.check_runtime_timers(borrow_thread(&mut thread));
        signals.dispatch_pending_signals(borrow_thread(&mut thread), frame);
        control.disable();
    }

    fn perform_user_action(&self, frame: &mut dyn TrapFrame, thread: &mut NonNull<Thread>, category: TrapCategory) {
        let category = match category {
            TrapCategory::UndefinedInstruction => self.refine_undefined(frame),
            category => category,
        };

        let signals = self.services.signals;
        match category {
            TrapCategory::PageFault { address, flags } | TrapCategory::ProtectionFault { address, flags } => {
                self.services.memory.handle_fault(flags, address, frame, borrow_thread(thread));
            },
            TrapCategory::MathFault(_) => {
                signals.signal_thread(borrow_thread(thread), Signal::MathError, Some(frame.instruction_pointer()));
            },
            TrapCategory::UndefinedInstruction => {
                signals.signal_thread(borrow_thread(thread), Signal::Illegal, Some(frame.instruction_pointer()));
            },
            TrapCategory::Breakpoint(BreakKind::DebugService { service, parameter }) => {
                let _ = self.services.debugger.handle_exception(DebugException::Service(service), Some(parameter), frame);
            },
            TrapCategory::Breakpoint(_) => {
                signals.signal_thread(borrow_thread(thread), Signal::Trap, None);
            },
            TrapCategory::FpuAccess => self.handle_fpu_access(frame, borrow_thread(thread), false),

            // Handled before interrupts were enabled.
            TrapCategory::Interrupt { .. } | TrapCategory::SystemCall { .. } => {},
        }
    }

    fn handle_fpu_access(&self, frame: &mut dyn TrapFrame, thread: &mut Thread, privileged: bool) {
        let fpu = LazyFpu::new(self.services.fpu_allocator, self.services.fpu_hardware);
        let processor = self.services.context.current_processor();
        if let Err(error) = fpu.handle_access_fault(&mut thread.fpu, processor) {
            printlndebug!("thread {}: {}", thread.id(), error);
            if privileged {
                self.fatal(DebugException::FpuUnavailable, None, CrashCode::FpuUnavailable, frame);
            } else {
                self.services.signals.signal_thread(thread, Signal::Bus, None);
            }
        }
    }

    fn refine_undefined(&self, frame: &dyn TrapFrame) -> TrapCategory {
        frame.classify_undefined(self.services.user_memory, self.services.fpu_hardware.is_access_enabled())
    }

    /// Gives the debugger a chance to deal with a fatal condition, and crashes if it doesn't.
    fn fatal(&self, exception: DebugException, parameter: Option<usize>, code: CrashCode, frame: &mut dyn TrapFrame) {
        match self.services.debugger.handle_exception(exception, parameter, frame) {
            DebuggerResponse::Resumed => {},
            DebuggerResponse::Unhandled => self.crash(code, frame),
        }
    }

    pub(crate) fn current_thread(&self) -> Option<NonNull<Thread>> {
        self.services.context.current_thread()
    }

    pub(crate) fn crash(&self, code: CrashCode, frame: &dyn TrapFrame) -> ! {
        self.crash.crash(code, frame_address(frame), frame.instruction_pointer(), 0, 0)
    }
}

/// Borrows the current thread for one step of trap handling.
///
/// Only the CPU running a thread touches its trap state. Every borrow ends before anything that
/// can trap again on the thread's behalf (a system-call handler, say) runs, so a nested trap takes
/// its own borrow without overlapping this one.
pub(crate) fn borrow_thread(thread: &mut NonNull<Thread>) -> &mut Thread {
    unsafe { thread.as_mut() }
}

fn debug_exception(kind: BreakKind) -> (DebugException, Option<usize>) {
    match kind {
        BreakKind::Break => (DebugException::Break, None),
        BreakKind::SingleStep => (DebugException::SingleStep, None),
        BreakKind::DebugService { service, parameter } => (DebugException::Service(service), Some(parameter)),
    }
}

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

//! The collaborators trap handling leans on. None of them are implemented here; the kernel hands
//! in an implementation of each one at boot as part of a `Services` bundle.

use {
    core::{fmt, ptr::NonNull},
    fpu::{FpuContextAllocator, FpuHardware},
    processor::ProcessorBlock,
    scheduler::Thread,
    shared::ffi_enum,

    crate::{
        category::FaultFlags,
        crash::CrashRecord,
        frame::TrapFrame,
    },
};

ffi_enum! {
    #[repr(u32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// The signals the trap layer can raise, numbered as user mode expects them.
    pub enum Signal {
        /// An illegal instruction (SIGILL).
        Illegal         = 4,
        /// A breakpoint or trace trap (SIGTRAP).
        Trap            = 5,
        /// A bus error (SIGBUS).
        Bus             = 7,
        /// An arithmetic error (SIGFPE).
        MathError       = 8,
        /// An invalid memory reference (SIGSEGV).
        AccessViolation = 11,
    }
}

/// What the kernel debugger is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugException {
    /// A breakpoint instruction.
    Break,
    /// A single-step trap.
    SingleStep,
    /// A page fault or protection fault in kernel mode.
    AccessViolation,
    /// An undefined instruction in kernel mode.
    UndefinedInstruction,
    /// Integer division by zero in kernel mode.
    DivideByZero,
    /// Any other arithmetic fault in kernel mode.
    MathFault,
    /// A double fault. The kernel stack is probably gone.
    DoubleFault,
    /// A vector nothing is supposed to raise.
    UnexpectedTrap,
    /// The kernel needed an FPU context and couldn't get one.
    FpuUnavailable,
    /// A trap that needs a current thread arrived when none was running.
    NoThread,
    /// A debug-service request with the given service number.
    Service(usize),
}

/// How the debugger answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DebuggerResponse {
    /// The debugger dealt with the exception, and execution can continue.
    Resumed,
    /// No debugger is attached, or it declined to handle the exception.
    Unhandled,
}

/// The error returned when a user-mode address can't be read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFault {
    /// The first address that couldn't be accessed.
    pub address: usize,
}

impl fmt::Display for AccessFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "user memory at {:#x} is not accessible", self.address)
    }
}

impl error::Error for AccessFault {}

/// The virtual memory manager's page-fault handling.
pub trait MemoryFaultResolver: Sync {
    /// Resolves a fault on behalf of `thread`, either by fixing the mapping or by signaling the
    /// thread (usually with `flags.violation_signal()`).
    fn handle_fault(&self, flags: FaultFlags, address: usize, frame: &mut dyn TrapFrame, thread: &mut Thread);
}

/// The process layer's signal queues.
pub trait SignalSubsystem: Sync {
    /// Queues `signal` for `thread`. `parameter` is the faulting address where one applies.
    fn signal_thread(&self, thread: &mut Thread, signal: Signal, parameter: Option<usize>);

    /// Delivers any pending signals to `thread`, rewriting `frame` to enter the handlers.
    ///
    /// # Returns
    /// `true` if a signal was applied.
    fn dispatch_pending_signals(&self, thread: &mut Thread, frame: &mut dyn TrapFrame) -> bool;

    /// Runs the bookkeeping for `thread`'s runtime timers (profiling and CPU-time limits).
    fn check_runtime_timers(&self, thread: &mut Thread);

    /// Plants a software breakpoint after the instruction `frame` will resume at, for
    /// architectures without hardware single step.
    fn arm_software_single_step(&self, thread: &mut Thread, frame: &mut dyn TrapFrame);
}

/// The kernel debugger.
pub trait KernelDebugger: Sync {
    /// Gives the debugger a look at an exception.
    fn handle_exception(&self, exception: DebugException, parameter: Option<usize>, frame: &mut dyn TrapFrame)
        -> DebuggerResponse;
}

/// The interrupt controller layer.
pub trait InterruptDispatcher: Sync {
    /// Runs the service routines for `vector`, including the end-of-interrupt.
    fn dispatch_interrupt(&self, vector: u32, frame: &mut dyn TrapFrame);
}

/// Masking and unmasking interrupts on the current CPU.
pub trait InterruptControl: Sync {
    /// Unmasks interrupts.
    fn enable(&self);
    /// Masks interrupts.
    fn disable(&self);
    /// Returns `true` if interrupts are unmasked.
    fn are_enabled(&self) -> bool;
}

/// Fault-tolerant access to memory that user mode controls.
pub trait UserMemory: Sync {
    /// Fills `destination` from user memory starting at `source`.
    fn copy_from_user(&self, destination: &mut [u8], source: usize) -> Result<(), AccessFault>;

    /// Copies `source` to user memory starting at `destination`.
    fn copy_to_user(&self, destination: usize, source: &[u8]) -> Result<(), AccessFault>;

    /// Reads the bytes of the instruction at `address`. Kernel addresses are only readable if
    /// `privileged` is `true`.
    fn read_instruction(&self, address: usize, privileged: bool, buffer: &mut [u8]) -> Result<(), AccessFault>;
}

/// Where trap handling is happening.
pub trait ExecutionContext: Sync {
    /// The thread running on this CPU, if any. Only this CPU ever touches the thread's trap-related
    /// state while it runs, so the dispatcher borrows it mutably for the duration of a trap.
    fn current_thread(&self) -> Option<NonNull<Thread>>;

    /// This CPU's block.
    fn current_processor(&self) -> &ProcessorBlock;
}

/// The last thing the kernel does.
pub trait SystemHalt: Sync {
    /// Stops every CPU for good after `record` has been reported.
    fn halt(&self, record: &CrashRecord) -> !;
}

/// The interrupt mask of the CPU this code is running on, for kernels that don't need anything
/// fancier.
#[cfg(any(target_arch = "arm", target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalInterrupts;

#[cfg(any(target_arch = "arm", target_arch = "x86", target_arch = "x86_64"))]
impl InterruptControl for LocalInterrupts {
    fn enable(&self) {
        shared::enable_interrupts();
    }

    fn disable(&self) {
        shared::disable_interrupts();
    }

    fn are_enabled(&self) -> bool {
        shared::interrupts_enabled()
    }
}

/// Stops the CPU for good once the crash record has been printed.
#[cfg(any(target_arch = "arm", target_arch = "x86", target_arch = "x86_64"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct Hang;

#[cfg(any(target_arch = "arm", target_arch = "x86", target_arch = "x86_64"))]
impl SystemHalt for Hang {
    fn halt(&self, _record: &CrashRecord) -> ! {
        shared::disable_interrupts();
        loop { shared::wait_for_interrupt(); }
    }
}

/// Every collaborator, bundled so it can be installed once and passed around by reference.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// Page-fault resolution.
    pub memory: &'a dyn MemoryFaultResolver,
    /// Signal queuing and delivery.
    pub signals: &'a dyn SignalSubsystem,
    /// The kernel debugger.
    pub debugger: &'a dyn KernelDebugger,
    /// Device interrupt dispatch.
    pub interrupts: &'a dyn InterruptDispatcher,
    /// The current CPU's interrupt mask.
    pub interrupt_control: &'a dyn InterruptControl,
    /// User memory access.
    pub user_memory: &'a dyn UserMemory,
    /// The current thread and CPU.
    pub context: &'a dyn ExecutionContext,
    /// FPU context buffers.
    pub fpu_allocator: &'a dyn FpuContextAllocator,
    /// The FPU itself.
    pub fpu_hardware: &'a dyn FpuHardware,
    /// What to do once the kernel has crashed.
    pub halt: &'a dyn SystemHalt,
}

impl<'a> fmt::Debug for Services<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

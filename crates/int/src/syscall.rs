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

//! System-call marshaling: validating the call number, copying the parameter block in and out of
//! user memory, running the handler, and deciding what user mode sees when it resumes.

use {
    bitflags::bitflags,
    core::{cmp, fmt, ptr::NonNull},
    io::printlndebug,
    processor::CycleAccount,
    scheduler::{Thread, ThreadFlags},
    shared::ffi_enum,

    crate::{
        dispatch::{borrow_thread, TrapDispatcher},
        frame::TrapFrame,
    },
};

/// The size of the largest parameter block any system call takes.
pub const MAX_PARAMETER_SIZE: usize = 256;

ffi_enum! {
    #[repr(i32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// The statuses the marshaler itself can report. Handlers may return these or any other value
    /// their own calling convention defines.
    pub enum Status {
        /// The call succeeded.
        Success               = 0,
        /// The call number doesn't exist.
        OutOfBounds           = -1,
        /// The parameter block couldn't be read or written.
        AccessViolation       = -2,
        /// A parameter didn't make sense.
        InvalidParameter      = -3,
        /// The kernel ran out of something.
        InsufficientResources = -4,
        /// The call exists but does nothing yet.
        NotImplemented        = -5,
        /// A signal interrupted the call.
        Interrupted           = -6,
        /// The call should be re-issued once any pending signal has been handled.
        RestartAfterSignal    = -7,
        /// The call should be re-issued unless a signal handler runs first.
        RestartNoSignal       = -8,
    }
}

impl From<Status> for isize {
    fn from(status: Status) -> isize {
        i32::from(status) as isize
    }
}

bitflags! {
    /// Properties of a system call that change how the marshaler finishes it.
    pub struct SystemCallFlags: u32 {
        /// The call must never be restarted, whatever its handler returns.
        const NOT_RESTARTABLE  = 0x0000_0001;
        /// The handler replaces the whole trap frame (e.g. returning from a signal handler), so no
        /// status is written into it.
        const RESTORES_CONTEXT = 0x0000_0002;
    }
}

/// A system-call handler. It gets the parameter block (already copied into kernel memory), the
/// trap frame, and the number of bytes to copy back, which starts out as the full block size and
/// may be lowered.
pub type SystemCallRoutine = fn(parameters: &mut [u8], frame: &mut dyn TrapFrame, result_size: &mut usize) -> isize;

/// One row of the system-call table.
#[derive(Clone, Copy)]
pub struct SystemCallEntry {
    /// The handler.
    pub routine: SystemCallRoutine,
    /// The exact size of the call's parameter block.
    pub parameter_size: usize,
    /// How to finish the call.
    pub flags: SystemCallFlags,
}

impl SystemCallEntry {
    /// Makes an entry with no special flags.
    pub const fn new(routine: SystemCallRoutine, parameter_size: usize) -> SystemCallEntry {
        SystemCallEntry { routine, parameter_size, flags: SystemCallFlags::empty() }
    }

    /// Makes an entry with the given flags.
    pub const fn with_flags(routine: SystemCallRoutine, parameter_size: usize, flags: SystemCallFlags) -> SystemCallEntry {
        SystemCallEntry { routine, parameter_size, flags }
    }
}

impl fmt::Debug for SystemCallEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SystemCallEntry")
            .field("parameter_size", &self.parameter_size)
            .field("flags", &self.flags)
            .finish()
    }
}

/// The table of system calls, indexed by call number.
#[derive(Debug, Clone, Copy)]
pub struct SystemCallTable<'a> {
    entries: &'a [SystemCallEntry],
}

impl<'a> SystemCallTable<'a> {
    /// Wraps a list of entries.
    ///
    /// # Panics
    /// If any entry's parameter block is bigger than `MAX_PARAMETER_SIZE`. In a `static`, that
    /// panic happens at compile time.
    pub const fn new(entries: &'a [SystemCallEntry]) -> SystemCallTable<'a> {
        let mut i = 0;
        while i < entries.len() {
            assert!(entries[i].parameter_size <= MAX_PARAMETER_SIZE, "system-call parameter block is too big");
            i += 1;
        }
        SystemCallTable { entries }
    }

    /// The number of calls in the table.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no calls.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up call `number`.
    pub fn lookup(&self, number: usize) -> Result<&'a SystemCallEntry, SystemCallError> {
        self.entries.get(number).ok_or(SystemCallError::OutOfBounds { number })
    }
}

/// Why a system call couldn't be run or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCallError {
    /// The call number is past the end of the table.
    OutOfBounds {
        /// The call number.
        number: usize,
    },
    /// The parameter block couldn't be read.
    CopyIn {
        /// The block's user-mode address.
        address: usize,
    },
    /// The results couldn't be written back.
    CopyOut {
        /// The block's user-mode address.
        address: usize,
    },
}

impl fmt::Display for SystemCallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SystemCallError::OutOfBounds { number } => write!(f, "system call {} doesn't exist", number),
            SystemCallError::CopyIn { address } => write!(f, "can't read system-call parameters at {:#x}", address),
            SystemCallError::CopyOut { address } => write!(f, "can't write system-call results to {:#x}", address),
        }
    }
}

impl error::Error for SystemCallError {}

impl From<SystemCallError> for Status {
    fn from(error: SystemCallError) -> Status {
        match error {
            SystemCallError::OutOfBounds { .. } => Status::OutOfBounds,
            SystemCallError::CopyIn { .. } | SystemCallError::CopyOut { .. } => Status::AccessViolation,
        }
    }
}

#[repr(C, align(16))]
struct ParameterBuffer([u8; MAX_PARAMETER_SIZE]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restart {
    AfterSignal,
    NoSignal,
}

impl Restart {
    fn requested_by(result: isize) -> Option<Restart> {
        if result == isize::from(Status::RestartAfterSignal) {
            Some(Restart::AfterSignal)
        } else if result == isize::from(Status::RestartNoSignal) {
            Some(Restart::NoSignal)
        } else {
            None
        }
    }
}

impl<'a> TrapDispatcher<'a> {
    /// Runs system call `number` with the parameter block at user address `parameters`, on behalf
    /// of the current thread. With no current thread there's nobody to run it for, so the call
    /// fails with `InvalidParameter`.
    ///
    /// # Returns
    /// The status that was written into the frame for user mode.
    pub fn dispatch_system_call(&self, number: usize, parameters: usize, frame: &mut dyn TrapFrame) -> isize {
        match self.current_thread() {
            Some(thread) => self.dispatch_system_call_for(thread, number, parameters, frame),
            None => {
                printlndebug!("system call {} with no current thread", number);
                let status = Status::InvalidParameter.into();
                frame.set_system_call_result(status);
                status
            },
        }
    }

    pub(crate) fn dispatch_system_call_for(&self, mut thread: NonNull<Thread>, number: usize, parameters: usize, frame: &mut dyn TrapFrame)
            -> isize {
        let processor = self.services.context.current_processor();
        let previous_period = processor.begin_cycle_accounting(CycleAccount::Kernel);
        borrow_thread(&mut thread).set_flags(ThreadFlags::IN_SYSTEM_CALL);

        let control = self.services.interrupt_control;
        control.enable();

        let (outcome, entry_flags) = match self.system_calls.lookup(number) {
            Ok(entry) => (self.call(entry, parameters, frame), entry.flags),
            Err(error) => (Err(error), SystemCallFlags::empty()),
        };
        let (mut result, flags) = match outcome {
            Ok(result) => (result, entry_flags),
            Err(error) => {
                printlndebug!("thread {}: {}", borrow_thread(&mut thread).id(), error);
                // Only a failed copy-out comes after the handler, which may have replaced the frame.
                let flags = match error {
                    SystemCallError::CopyOut { .. } => entry_flags,
                    _ => SystemCallFlags::empty(),
                };
                (Status::from(error).into(), flags)
            },
        };

        let requested = Restart::requested_by(result);
        let restart = requested.filter(|_| !flags.contains(SystemCallFlags::NOT_RESTARTABLE));
        if requested.is_some() && restart != Some(Restart::AfterSignal) {
            result = Status::Interrupted.into();
        }

        if restart == Some(Restart::AfterSignal) {
            frame.rewind_system_call(number, parameters);
        } else if !flags.contains(SystemCallFlags::RESTORES_CONTEXT) {
            frame.set_system_call_result(result);
        }

        let signals = self.services.signals;
        if borrow_thread(&mut thread).single_step_requested() && !frame.set_single_step() {
            signals.arm_software_single_step(borrow_thread(&mut thread), frame);
        }

        signals.check_runtime_timers(borrow_thread(&mut thread));
        let applied = signals.dispatch_pending_signals(borrow_thread(&mut thread), frame);
        if restart == Some(Restart::NoSignal) && !applied {
            frame.rewind_system_call(number, parameters);
        }

        control.disable();
        borrow_thread(&mut thread).clear_flags(ThreadFlags::IN_SYSTEM_CALL);
        processor.begin_cycle_accounting(previous_period);
        result
    }

    // Runs the handler with no borrow of the current thread outstanding, since the handler can
    // trap again (an FPU access fault, for one).
    fn call(&self, entry: &SystemCallEntry, parameters: usize, frame: &mut dyn TrapFrame) -> Result<isize, SystemCallError> {
        let mut buffer = ParameterBuffer([0; MAX_PARAMETER_SIZE]);
        let block = &mut buffer.0[.. entry.parameter_size];

        let memory = self.services.user_memory;
        if !block.is_empty() {
            memory.copy_from_user(block, parameters)
                .map_err(|_| SystemCallError::CopyIn { address: parameters })?;
        }

        let mut result_size = entry.parameter_size;
        let result = (entry.routine)(block, frame, &mut result_size);

        let result_size = cmp::min(result_size, entry.parameter_size);
        if result_size != 0 {
            memory.copy_to_user(parameters, &block[.. result_size])
                .map_err(|_| SystemCallError::CopyOut { address: parameters })?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        core::cell::Cell,
        processor::RunLevel,
        crate::{
            category::TrapCategory,
            services::Signal,
            testing::{Event, Harness, MockFrame, USER_BASE},
        },
    };

    std::thread_local! {
        static CALLS: Cell<usize> = Cell::new(0);
        static REENTRY: Cell<Option<TrapDispatcher<'static>>> = Cell::new(None);
    }

    fn calls() -> usize {
        CALLS.with(Cell::get)
    }

    fn count_call() {
        CALLS.with(|calls| calls.set(calls.get() + 1));
    }

    fn nothing(_: &mut [u8], _: &mut dyn TrapFrame, _: &mut usize) -> isize {
        count_call();
        Status::Success.into()
    }

    fn increment(parameters: &mut [u8], _: &mut dyn TrapFrame, _: &mut usize) -> isize {
        count_call();
        for byte in parameters.iter_mut() {
            *byte = byte.wrapping_add(1);
        }
        parameters.len() as isize
    }

    fn shrink(parameters: &mut [u8], _: &mut dyn TrapFrame, result_size: &mut usize) -> isize {
        count_call();
        parameters[0] = 0xaa;
        *result_size = 8;
        Status::Success.into()
    }

    fn grow(_: &mut [u8], _: &mut dyn TrapFrame, result_size: &mut usize) -> isize {
        count_call();
        *result_size = 1000;
        Status::Success.into()
    }

    fn restart_after_signal(_: &mut [u8], _: &mut dyn TrapFrame, result_size: &mut usize) -> isize {
        count_call();
        *result_size = 0;
        Status::RestartAfterSignal.into()
    }

    fn restart_no_signal(_: &mut [u8], _: &mut dyn TrapFrame, result_size: &mut usize) -> isize {
        count_call();
        *result_size = 0;
        Status::RestartNoSignal.into()
    }

    fn sigreturn(_: &mut [u8], frame: &mut dyn TrapFrame, _: &mut usize) -> isize {
        count_call();
        frame.set_instruction_pointer(0x50_0000);
        0
    }

    fn restore_with_block(parameters: &mut [u8], frame: &mut dyn TrapFrame, _: &mut usize) -> isize {
        count_call();
        parameters[0] = 1;
        frame.set_instruction_pointer(0x50_0000);
        0
    }

    // Touches the FPU, taking a kernel-mode FPU access trap in the middle of the call.
    fn uses_fpu(_: &mut [u8], _: &mut dyn TrapFrame, _: &mut usize) -> isize {
        count_call();
        if let Some(dispatcher) = REENTRY.with(Cell::get) {
            let mut frame = MockFrame::kernel();
            dispatcher.dispatch(&mut frame, TrapCategory::FpuAccess);
        }
        Status::Success.into()
    }

    const NOTHING: usize = 0;
    const SHRINK: usize = 1;
    const INCREMENT: usize = 2;
    const GROW: usize = 3;
    const RESTART_AFTER_SIGNAL: usize = 4;
    const RESTART_NO_SIGNAL: usize = 5;
    const NOT_RESTARTABLE: usize = 6;
    const SIGRETURN: usize = 7;
    const RESTORE_WITH_BLOCK: usize = 8;
    const USES_FPU: usize = 9;

    static ENTRIES: [SystemCallEntry; 10] = [
        SystemCallEntry::new(nothing, 0),
        SystemCallEntry::new(shrink, 64),
        SystemCallEntry::new(increment, 40),
        SystemCallEntry::new(grow, 16),
        SystemCallEntry::new(restart_after_signal, 8),
        SystemCallEntry::new(restart_no_signal, 8),
        SystemCallEntry::with_flags(restart_after_signal, 8, SystemCallFlags::NOT_RESTARTABLE),
        SystemCallEntry::with_flags(sigreturn, 0, SystemCallFlags::RESTORES_CONTEXT),
        SystemCallEntry::with_flags(restore_with_block, 16, SystemCallFlags::RESTORES_CONTEXT),
        SystemCallEntry::new(uses_fpu, 0),
    ];
    static TABLE: SystemCallTable<'static> = SystemCallTable::new(&ENTRIES);

    fn call(harness: &Harness, number: usize, frame: &mut MockFrame) -> isize {
        let services = harness.services();
        let crash = harness.crash_bridge();
        TrapDispatcher::new(&services, &crash, &TABLE).dispatch_system_call(number, USER_BASE, frame)
    }

    fn copies(harness: &Harness) -> Vec<Event> {
        harness.events().into_iter()
            .filter(|e| matches!(e, Event::CopyIn { .. } | Event::CopyOut { .. }))
            .collect()
    }

    mod marshaling {
        use super::*;

        #[test]
        fn out_of_bounds_should_touch_nothing() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            let result = call(&harness, ENTRIES.len(), &mut frame);

            assert_eq!(result, isize::from(Status::OutOfBounds));
            assert_eq!(frame.result, Some(result));
            assert!(copies(&harness).is_empty());
            assert_eq!(calls(), 0);
        }

        #[test]
        fn should_copy_the_exact_block_both_ways() {
            let harness = Harness::new();
            for (i, byte) in harness.user_memory.lock().iter_mut().enumerate() {
                *byte = i as u8;
            }
            let mut frame = MockFrame::user();
            assert_eq!(call(&harness, INCREMENT, &mut frame), 40);

            assert_eq!(copies(&harness), vec![
                Event::CopyIn { address: USER_BASE, length: 40 },
                Event::CopyOut { address: USER_BASE, length: 40 },
            ]);
            let memory = harness.user_memory.lock();
            assert!((0 .. 40).all(|i| memory[i] == i as u8 + 1));
            assert_eq!(memory[40], 40);
            assert_eq!(calls(), 1);
        }

        #[test]
        fn should_copy_back_only_what_the_handler_reports() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            call(&harness, SHRINK, &mut frame);
            assert_eq!(copies(&harness)[1], Event::CopyOut { address: USER_BASE, length: 8 });
            assert_eq!(harness.user_memory.lock()[0], 0xaa);
        }

        #[test]
        fn should_clamp_an_oversized_result() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            call(&harness, GROW, &mut frame);
            assert_eq!(copies(&harness)[1], Event::CopyOut { address: USER_BASE, length: 16 });
        }

        #[test]
        fn zero_sized_block_should_skip_copying() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            assert_eq!(call(&harness, NOTHING, &mut frame), 0);
            assert!(copies(&harness).is_empty());
            assert_eq!(calls(), 1);
        }

        #[test]
        fn unreadable_block_should_skip_the_handler() {
            let harness = Harness::new();
            harness.user_memory.lock().truncate(20);
            let mut frame = MockFrame::user();
            let result = call(&harness, INCREMENT, &mut frame);

            assert_eq!(result, isize::from(Status::AccessViolation));
            assert_eq!(frame.result, Some(result));
            assert_eq!(calls(), 0);
        }

        #[test]
        #[should_panic(expected = "too big")]
        fn oversized_parameter_block_should_be_rejected() {
            let entries = vec![SystemCallEntry::new(nothing, MAX_PARAMETER_SIZE + 1)];
            SystemCallTable::new(&entries);
        }
    }

    mod completion {
        use super::*;

        #[test]
        fn should_balance_the_thread_and_cpu_state() {
            let harness = Harness::new();
            harness.processor.begin_cycle_accounting(CycleAccount::User);
            let mut frame = MockFrame::user();
            call(&harness, INCREMENT, &mut frame);

            assert!(!harness.thread().is_in_system_call());
            assert!(!harness.interrupts_enabled.load(core::sync::atomic::Ordering::SeqCst));
            assert_eq!(harness.processor.cycle_account(), CycleAccount::User);
        }

        #[test]
        fn should_check_timers_before_signals() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            call(&harness, NOTHING, &mut frame);
            assert_eq!(harness.events(), vec![Event::CheckTimers, Event::DispatchSignals { interrupts_enabled: true }]);
        }

        #[test]
        fn restart_after_signal_should_rewind() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            call(&harness, RESTART_AFTER_SIGNAL, &mut frame);
            assert_eq!(frame.rewinds, vec![(RESTART_AFTER_SIGNAL, USER_BASE)]);
            assert_eq!(frame.result, None);
        }

        #[test]
        fn restart_no_signal_should_rewind_without_a_signal() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            let result = call(&harness, RESTART_NO_SIGNAL, &mut frame);
            assert_eq!(result, isize::from(Status::Interrupted));
            assert_eq!(frame.rewinds, vec![(RESTART_NO_SIGNAL, USER_BASE)]);
        }

        #[test]
        fn restart_no_signal_should_be_interrupted_by_a_signal() {
            let harness = Harness::new();
            harness.services().signals.signal_thread(harness.thread_mut(), Signal::Trap, None);
            let mut frame = MockFrame::user();
            let result = call(&harness, RESTART_NO_SIGNAL, &mut frame);

            assert_eq!(result, isize::from(Status::Interrupted));
            assert_eq!(frame.result, Some(result));
            assert!(frame.rewinds.is_empty());
        }

        #[test]
        fn non_restartable_call_should_be_interrupted() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            let result = call(&harness, NOT_RESTARTABLE, &mut frame);
            assert_eq!(result, isize::from(Status::Interrupted));
            assert_eq!(frame.result, Some(result));
            assert!(frame.rewinds.is_empty());
        }

        #[test]
        fn failed_copy_out_should_still_report_the_status() {
            let mut harness = Harness::new();
            harness.user_memory_read_only = true;
            let mut frame = MockFrame::user();
            let result = call(&harness, INCREMENT, &mut frame);

            assert_eq!(result, isize::from(Status::AccessViolation));
            assert_eq!(frame.result, Some(result));
            assert_eq!(calls(), 1);
        }

        #[test]
        fn failed_copy_out_should_not_overwrite_a_restored_context() {
            let mut harness = Harness::new();
            harness.user_memory_read_only = true;
            let mut frame = MockFrame::user();
            let result = call(&harness, RESTORE_WITH_BLOCK, &mut frame);

            assert_eq!(result, isize::from(Status::AccessViolation));
            assert_eq!(frame.result, None);
            assert_eq!(frame.instruction_pointer, 0x50_0000);
        }

        #[test]
        fn restoring_call_should_leave_the_result_alone() {
            let harness = Harness::new();
            let mut frame = MockFrame::user();
            call(&harness, SIGRETURN, &mut frame);
            assert_eq!(frame.result, None);
            assert_eq!(frame.instruction_pointer, 0x50_0000);
        }

        #[test]
        fn should_prefer_hardware_single_step() {
            let harness = Harness::new();
            harness.thread_mut().set_flags(ThreadFlags::SINGLE_STEP);
            let mut frame = MockFrame::user();
            frame.hardware_single_step = true;
            call(&harness, NOTHING, &mut frame);

            assert!(frame.single_step_armed);
            assert_eq!(harness.count(|e| *e == Event::SoftwareSingleStep), 0);
            assert!(harness.thread().single_step_requested());
        }

        #[test]
        fn should_fall_back_to_software_single_step() {
            let harness = Harness::new();
            harness.thread_mut().set_flags(ThreadFlags::SINGLE_STEP);
            let mut frame = MockFrame::user();
            call(&harness, NOTHING, &mut frame);
            assert_eq!(harness.count(|e| *e == Event::SoftwareSingleStep), 1);
        }

        #[test]
        fn missing_thread_should_fail_without_crashing() {
            let mut harness = Harness::new();
            harness.has_thread = false;
            let mut frame = MockFrame::user();
            let result = call(&harness, INCREMENT, &mut frame);

            assert_eq!(result, isize::from(Status::InvalidParameter));
            assert_eq!(frame.result, Some(result));
            assert_eq!(calls(), 0);
            assert!(harness.events().is_empty());
        }

        #[test]
        fn fpu_trap_inside_a_handler_should_stay_balanced() {
            let harness: &'static Harness = Box::leak(Box::new(Harness::new()));
            let services = Box::leak(Box::new(harness.services()));
            let crash = Box::leak(Box::new(harness.crash_bridge()));
            let dispatcher = TrapDispatcher::new(services, crash, &TABLE);
            REENTRY.with(|reentry| reentry.set(Some(dispatcher)));

            harness.processor.begin_cycle_accounting(CycleAccount::User);
            let mut frame = MockFrame::user();
            let result = dispatcher.dispatch_system_call(USES_FPU, USER_BASE, &mut frame);
            REENTRY.with(|reentry| reentry.set(None));

            assert_eq!(result, 0);
            assert_eq!(calls(), 1);
            assert!(harness.events().starts_with(&[Event::FpuAllocate, Event::FpuInitialize]));
            assert!(harness.thread().fpu.is_owner());
            assert!(!harness.thread().is_in_system_call());
            assert_eq!(harness.processor.run_level(), RunLevel::Low);
            assert_eq!(harness.processor.cycle_account(), CycleAccount::User);
        }

        #[test]
        fn system_call_trap_should_take_the_same_path() {
            let harness = Harness::new();
            let services = harness.services();
            let crash = harness.crash_bridge();
            let dispatcher = TrapDispatcher::new(&services, &crash, &TABLE);
            let mut frame = MockFrame::user();

            dispatcher.dispatch(&mut frame, crate::category::TrapCategory::SystemCall { number: INCREMENT, parameters: USER_BASE });
            assert_eq!(frame.result, Some(40));
            assert_eq!(calls(), 1);
        }
    }
}

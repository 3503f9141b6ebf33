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

//! Recording stand-ins for every collaborator, shared by the dispatcher and marshaler tests.

use {
    core::{
        cell::UnsafeCell,
        ptr::NonNull,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    fpu::{FpuCapability, FpuContext, FpuContextAllocator, FpuContextLayout, FpuHardware},
    processor::ProcessorBlock,
    scheduler::Thread,
    spin::Mutex,

    crate::{
        category::{FaultFlags, TrapCategory},
        crash::{CrashBridge, CrashCode, CrashRecord},
        frame::TrapFrame,
        services::*,
    },
};

pub(crate) const USER_BASE: usize = 0x10_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Fault { flags: FaultFlags, address: usize, stack_pointer: usize },
    Signal { signal: Signal, parameter: Option<usize>, interrupts_enabled: bool },
    DispatchSignals { interrupts_enabled: bool },
    CheckTimers,
    SoftwareSingleStep,
    Debugger { exception: DebugException, parameter: Option<usize> },
    Interrupt { vector: u32, interrupts_enabled: bool },
    CopyIn { address: usize, length: usize },
    CopyOut { address: usize, length: usize },
    FpuAllocate,
    FpuRestore,
    FpuInitialize,
}

pub(crate) struct Harness {
    pub processor: ProcessorBlock,
    thread: UnsafeCell<Thread>,
    pub has_thread: bool,
    pub interrupts_enabled: AtomicBool,
    pub events: Mutex<Vec<Event>>,
    pub user_memory: Mutex<Vec<u8>>,
    pub user_memory_read_only: bool,
    pub debugger_response: DebuggerResponse,
    pub fpu_allocation_fails: bool,
    fpu_enabled: AtomicBool,
    signal_pending: AtomicBool,
    pub fpu_allocations: AtomicUsize,
}

// The thread is only touched by whichever test owns the harness.
unsafe impl Sync for Harness {}

fn cycles() -> u64 {
    0
}

impl Harness {
    pub fn new() -> Harness {
        Harness {
            processor: ProcessorBlock::new(0, cycles),
            thread: UnsafeCell::new(Thread::new(1)),
            has_thread: true,
            interrupts_enabled: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
            user_memory: Mutex::new(vec![0; 0x1000]),
            user_memory_read_only: false,
            debugger_response: DebuggerResponse::Unhandled,
            fpu_allocation_fails: false,
            fpu_enabled: AtomicBool::new(false),
            signal_pending: AtomicBool::new(false),
            fpu_allocations: AtomicUsize::new(0),
        }
    }

    pub fn services(&self) -> Services<'_> {
        Services {
            memory: self,
            signals: self,
            debugger: self,
            interrupts: self,
            interrupt_control: self,
            user_memory: self,
            context: self,
            fpu_allocator: self,
            fpu_hardware: self,
            halt: self,
        }
    }

    pub fn crash_bridge(&self) -> CrashBridge<'_> {
        CrashBridge::new(self, self)
    }

    pub fn thread(&self) -> &Thread {
        unsafe { &*self.thread.get() }
    }

    #[allow(clippy::mut_from_ref)]
    pub fn thread_mut(&self) -> &mut Thread {
        unsafe { &mut *self.thread.get() }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    pub fn disable_fpu(&self) {
        self.fpu_enabled.store(false, Ordering::SeqCst);
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn enabled(&self) -> bool {
        self.interrupts_enabled.load(Ordering::SeqCst)
    }

    fn user_range(&self, address: usize, length: usize) -> Result<core::ops::Range<usize>, AccessFault> {
        let start = address.checked_sub(USER_BASE).ok_or(AccessFault { address })?;
        let end = start.checked_add(length).ok_or(AccessFault { address })?;
        if end > self.user_memory.lock().len() {
            return Err(AccessFault { address });
        }
        Ok(start .. end)
    }
}

impl MemoryFaultResolver for Harness {
    fn handle_fault(&self, flags: FaultFlags, address: usize, frame: &mut dyn TrapFrame, _thread: &mut Thread) {
        self.record(Event::Fault { flags, address, stack_pointer: frame.stack_pointer() });
    }
}

impl SignalSubsystem for Harness {
    fn signal_thread(&self, _thread: &mut Thread, signal: Signal, parameter: Option<usize>) {
        self.signal_pending.store(true, Ordering::SeqCst);
        self.record(Event::Signal { signal, parameter, interrupts_enabled: self.enabled() });
    }

    fn dispatch_pending_signals(&self, _thread: &mut Thread, _frame: &mut dyn TrapFrame) -> bool {
        self.record(Event::DispatchSignals { interrupts_enabled: self.enabled() });
        self.signal_pending.swap(false, Ordering::SeqCst)
    }

    fn check_runtime_timers(&self, _thread: &mut Thread) {
        self.record(Event::CheckTimers);
    }

    fn arm_software_single_step(&self, _thread: &mut Thread, _frame: &mut dyn TrapFrame) {
        self.record(Event::SoftwareSingleStep);
    }
}

impl KernelDebugger for Harness {
    fn handle_exception(&self, exception: DebugException, parameter: Option<usize>, _frame: &mut dyn TrapFrame)
            -> DebuggerResponse {
        self.record(Event::Debugger { exception, parameter });
        self.debugger_response
    }
}

impl InterruptDispatcher for Harness {
    fn dispatch_interrupt(&self, vector: u32, _frame: &mut dyn TrapFrame) {
        self.record(Event::Interrupt { vector, interrupts_enabled: self.enabled() });
    }
}

impl InterruptControl for Harness {
    fn enable(&self) {
        self.interrupts_enabled.store(true, Ordering::SeqCst);
    }

    fn disable(&self) {
        self.interrupts_enabled.store(false, Ordering::SeqCst);
    }

    fn are_enabled(&self) -> bool {
        self.enabled()
    }
}

impl UserMemory for Harness {
    fn copy_from_user(&self, destination: &mut [u8], source: usize) -> Result<(), AccessFault> {
        self.record(Event::CopyIn { address: source, length: destination.len() });
        let range = self.user_range(source, destination.len())?;
        destination.copy_from_slice(&self.user_memory.lock()[range]);
        Ok(())
    }

    fn copy_to_user(&self, destination: usize, source: &[u8]) -> Result<(), AccessFault> {
        self.record(Event::CopyOut { address: destination, length: source.len() });
        if self.user_memory_read_only {
            return Err(AccessFault { address: destination });
        }
        let range = self.user_range(destination, source.len())?;
        self.user_memory.lock()[range].copy_from_slice(source);
        Ok(())
    }

    fn read_instruction(&self, address: usize, _privileged: bool, buffer: &mut [u8]) -> Result<(), AccessFault> {
        let range = self.user_range(address, buffer.len())?;
        buffer.copy_from_slice(&self.user_memory.lock()[range]);
        Ok(())
    }
}

impl ExecutionContext for Harness {
    fn current_thread(&self) -> Option<NonNull<Thread>> {
        if self.has_thread {
            NonNull::new(self.thread.get())
        } else {
            None
        }
    }

    fn current_processor(&self) -> &ProcessorBlock {
        &self.processor
    }
}

impl FpuContextAllocator for Harness {
    fn allocate(&self, _tag: u32) -> Option<Box<FpuContext>> {
        self.record(Event::FpuAllocate);
        if self.fpu_allocation_fails {
            None
        } else {
            self.fpu_allocations.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(FpuContext::zeroed()))
        }
    }

    fn destroy(&self, _context: Box<FpuContext>) {}
}

impl FpuHardware for Harness {
    fn capability(&self) -> FpuCapability {
        FpuCapability::Full
    }

    fn enable_access(&self) {
        self.fpu_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_access(&self) {
        self.fpu_enabled.store(false, Ordering::SeqCst);
    }

    fn is_access_enabled(&self) -> bool {
        self.fpu_enabled.load(Ordering::SeqCst)
    }

    fn save(&self, _context: &mut FpuContext) {}

    fn restore(&self, _context: &FpuContext) {
        self.record(Event::FpuRestore);
    }

    fn initialize(&self, _defaults: &FpuContext) {
        self.record(Event::FpuInitialize);
    }
}

impl SystemHalt for Harness {
    fn halt(&self, record: &CrashRecord) -> ! {
        panic!("halted with {:?}", record.code)
    }
}

/// A frame with just enough state to watch what the dispatcher does to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MockFrame {
    pub instruction_pointer: usize,
    pub stack_pointer: usize,
    pub privileged: bool,
    pub footprint: usize,
    pub arguments: (usize, usize),
    pub result: Option<isize>,
    pub rewinds: Vec<(usize, usize)>,
    pub hardware_single_step: bool,
    pub single_step_armed: bool,
    pub undefined_as: Option<TrapCategory>,
}

impl MockFrame {
    pub fn user() -> MockFrame {
        MockFrame { instruction_pointer: 0x40_0000, stack_pointer: 0x7fff_0000, ..MockFrame::default() }
    }

    pub fn kernel() -> MockFrame {
        MockFrame {
            instruction_pointer: 0xc000_1000,
            stack_pointer: 0xc080_0000,
            privileged: true,
            footprint: 12,
            ..MockFrame::default()
        }
    }
}

impl TrapFrame for MockFrame {
    fn instruction_pointer(&self) -> usize { self.instruction_pointer }
    fn set_instruction_pointer(&mut self, address: usize) { self.instruction_pointer = address; }
    fn stack_pointer(&self) -> usize { self.stack_pointer }
    fn set_stack_pointer(&mut self, address: usize) { self.stack_pointer = address; }
    fn is_privileged(&self) -> bool { self.privileged }
    fn error_code(&self) -> usize { 0 }
    fn frame_footprint(&self) -> usize { self.footprint }
    fn system_call_arguments(&self) -> (usize, usize) { self.arguments }
    fn debug_service_arguments(&self) -> (usize, usize) { self.arguments }
    fn set_system_call_result(&mut self, result: isize) { self.result = Some(result); }
    fn rewind_system_call(&mut self, number: usize, parameters: usize) { self.rewinds.push((number, parameters)); }

    fn set_single_step(&mut self) -> bool {
        self.single_step_armed = self.hardware_single_step;
        self.hardware_single_step
    }

    fn classify_undefined(&self, _memory: &dyn UserMemory, fpu_access_enabled: bool) -> TrapCategory {
        match self.undefined_as {
            Some(TrapCategory::FpuAccess) if fpu_access_enabled => TrapCategory::UndefinedInstruction,
            Some(category) => category,
            None => TrapCategory::UndefinedInstruction,
        }
    }
}

/// Runs `f`, which is expected to crash, and returns the code it crashed with.
pub(crate) fn expect_crash(bridge: &CrashBridge, f: impl FnOnce()) -> CrashCode {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    assert!(result.is_err(), "expected a crash");
    match bridge.record() {
        Some(record) => record.code,
        None => panic!("panicked without a crash record"),
    }
}

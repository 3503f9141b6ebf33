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

//! Lazy floating-point context management.
//!
//! Threads don't get an FPU context until they actually use the FPU. Hardware access starts out
//! disabled, so the first floating-point instruction a thread executes traps, and the trap
//! dispatcher hands that trap to `LazyFpu::handle_access_fault`. From then on, the thread keeps its
//! buffer for life, and the only question on each later trap is whether the hardware still holds
//! the thread's registers (the thread is the *owner*) or whether they need to be restored.
//!
//! The owner relationship is cleared by the context switcher, which saves the outgoing thread's
//! registers and disables access so that the next thread's first FPU instruction traps.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

extern crate alloc;

mod arch;
mod context;
mod heap;

pub use {
    arch::*,
    context::*,
    heap::HeapFpuContextAllocator,
};

use {
    alloc::boxed::Box,
    core::fmt,
    io::printlndebug,
    processor::{ProcessorBlock, RunLevel},
};

/// The pool tag the dispatcher passes when allocating FPU contexts.
pub const FPU_CONTEXT_TAG: u32 = u32::from_le_bytes(*b"FpuC");

/// Hands out and takes back FPU context buffers.
pub trait FpuContextAllocator: Sync {
    /// Allocates a zeroed context, or returns `None` if memory is exhausted.
    fn allocate(&self, tag: u32) -> Option<Box<FpuContext>>;

    /// Frees a context returned by `allocate`.
    fn destroy(&self, context: Box<FpuContext>);
}

/// The CPU's floating-point unit.
pub trait FpuHardware: Sync {
    /// How much of IEEE-754 this FPU implements without software help.
    fn capability(&self) -> FpuCapability;

    /// Allows floating-point instructions to execute without trapping.
    fn enable_access(&self);

    /// Makes the next floating-point instruction trap.
    fn disable_access(&self);

    /// Returns `true` if floating-point instructions currently execute without trapping.
    fn is_access_enabled(&self) -> bool;

    /// Copies the hardware registers into `context`. Access must be enabled.
    fn save(&self, context: &mut FpuContext);

    /// Loads the hardware registers from `context`. Access must be enabled.
    fn restore(&self, context: &FpuContext);

    /// Puts the hardware into a clean state described by `defaults`.
    fn initialize(&self, defaults: &FpuContext) {
        self.restore(defaults);
    }
}

/// A thread's relationship with the FPU.
#[derive(Debug)]
pub enum FpuState {
    /// The thread has never executed a floating-point instruction.
    NeverUsed,
    /// The thread has a context.
    Allocated {
        /// Where the thread's registers live while it doesn't own the hardware.
        context: Box<FpuContext>,
        /// `true` if the hardware on the thread's CPU currently holds the thread's registers.
        owner: bool,
    },
}

impl Default for FpuState {
    fn default() -> FpuState {
        FpuState::NeverUsed
    }
}

impl FpuState {
    /// Returns `true` if the thread has a context that has been initialized at least once.
    pub fn is_in_use(&self) -> bool {
        matches!(*self, FpuState::Allocated { .. })
    }

    /// Returns `true` if the hardware currently holds the thread's registers.
    pub fn is_owner(&self) -> bool {
        matches!(*self, FpuState::Allocated { owner: true, .. })
    }

    /// The thread's saved context, if it has one.
    pub fn context(&self) -> Option<&FpuContext> {
        match *self {
            FpuState::NeverUsed => None,
            FpuState::Allocated { ref context, .. } => Some(context),
        }
    }

    /// Forgets that the hardware holds this thread's registers.
    pub fn clear_owner(&mut self) {
        if let FpuState::Allocated { ref mut owner, .. } = *self {
            *owner = false;
        }
    }

    /// The context switcher's half of the protocol: if this thread owns the hardware, saves its
    /// registers, disables access, and gives up ownership.
    pub fn save_for_switch(&mut self, hardware: &dyn FpuHardware) {
        if let FpuState::Allocated { ref mut context, ref mut owner } = *self {
            if *owner {
                hardware.save(context);
                hardware.disable_access();
                *owner = false;
            }
        }
    }

    /// Gives the context back to the allocator. Called when the thread terminates.
    pub fn release(&mut self, allocator: &dyn FpuContextAllocator) {
        if let FpuState::Allocated { context, .. } = core::mem::take(self) {
            allocator.destroy(context);
        }
    }
}

/// What an FPU access fault turned out to need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum FpuTransition {
    /// First use: a context was allocated and the hardware initialized to defaults.
    Initialized,
    /// The thread's saved registers were loaded back into the hardware.
    Restored,
    /// The hardware already held the thread's registers; access was just turned back on.
    Reenabled,
}

/// Returned when a thread needs an FPU context and none can be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationError;

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("out of memory for an FPU context")
    }
}

impl error::Error for AllocationError {}

/// The lazy context manager.
#[derive(Clone, Copy)]
pub struct LazyFpu<'a> {
    allocator: &'a dyn FpuContextAllocator,
    hardware: &'a dyn FpuHardware,
}

impl<'a> LazyFpu<'a> {
    /// Makes a manager that gets buffers from `allocator` and drives `hardware`.
    pub fn new(allocator: &'a dyn FpuContextAllocator, hardware: &'a dyn FpuHardware) -> LazyFpu<'a> {
        LazyFpu { allocator, hardware }
    }

    /// Responds to an FPU access trap taken by the thread whose FPU state is `state`, running on
    /// `processor`. On success, hardware access is enabled and holds the thread's registers.
    ///
    /// # Returns
    /// `Err(AllocationError)` if this is the thread's first use of the FPU and no context could be
    /// allocated. Hardware access stays disabled in that case, so the thread will trap again if it
    /// ever retries the instruction.
    pub fn handle_access_fault(&self, state: &mut FpuState, processor: &ProcessorBlock)
            -> Result<FpuTransition, AllocationError> {
        match *state {
            FpuState::NeverUsed => {
                let mut context = match self.allocator.allocate(FPU_CONTEXT_TAG) {
                    Some(context) => context,
                    None => {
                        printlndebug!("FPU context allocation failed on CPU {}", processor.index());
                        return Err(AllocationError);
                    }
                };
                context.reset_to_defaults(self.hardware.capability());

                let previous = processor.raise_run_level(RunLevel::Dispatch);
                self.hardware.enable_access();
                self.hardware.initialize(&context);
                *state = FpuState::Allocated { context, owner: true };
                processor.lower_run_level(previous);
                Ok(FpuTransition::Initialized)
            },

            FpuState::Allocated { ref context, ref mut owner } => {
                let previous = processor.raise_run_level(RunLevel::Dispatch);
                self.hardware.enable_access();
                let transition = if *owner {
                    FpuTransition::Reenabled
                } else {
                    self.hardware.restore(context);
                    *owner = true;
                    FpuTransition::Restored
                };
                processor.lower_run_level(previous);
                Ok(transition)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        core::sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        spin::Mutex,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Enable(RunLevel),
        Disable,
        Save,
        Restore(RunLevel),
        Initialize(RunLevel),
    }

    struct MockHardware {
        cpu: &'static ProcessorBlock,
        capability: FpuCapability,
        enabled: AtomicBool,
        events: Mutex<Vec<Event>>,
    }

    impl MockHardware {
        fn new(cpu: &'static ProcessorBlock, capability: FpuCapability) -> MockHardware {
            MockHardware { cpu, capability, enabled: AtomicBool::new(false), events: Mutex::new(Vec::new()) }
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        fn count(&self, matches: fn(&Event) -> bool) -> usize {
            self.events.lock().iter().filter(|e| matches(e)).count()
        }
    }

    impl FpuHardware for MockHardware {
        fn capability(&self) -> FpuCapability { self.capability }
        fn enable_access(&self) {
            self.enabled.store(true, Ordering::SeqCst);
            self.events.lock().push(Event::Enable(self.cpu.run_level()));
        }
        fn disable_access(&self) {
            self.enabled.store(false, Ordering::SeqCst);
            self.events.lock().push(Event::Disable);
        }
        fn is_access_enabled(&self) -> bool { self.enabled.load(Ordering::SeqCst) }
        fn save(&self, _context: &mut FpuContext) { self.events.lock().push(Event::Save); }
        fn restore(&self, _context: &FpuContext) { self.events.lock().push(Event::Restore(self.cpu.run_level())); }
        fn initialize(&self, _defaults: &FpuContext) { self.events.lock().push(Event::Initialize(self.cpu.run_level())); }
    }

    struct CountingAllocator {
        allocations: AtomicUsize,
        frees: AtomicUsize,
        fail: bool,
    }

    impl CountingAllocator {
        const fn new(fail: bool) -> CountingAllocator {
            CountingAllocator { allocations: AtomicUsize::new(0), frees: AtomicUsize::new(0), fail }
        }
    }

    impl FpuContextAllocator for CountingAllocator {
        fn allocate(&self, tag: u32) -> Option<Box<FpuContext>> {
            assert_eq!(tag, FPU_CONTEXT_TAG);
            if self.fail {
                return None;
            }
            self.allocations.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(FpuContext::zeroed()))
        }
        fn destroy(&self, _context: Box<FpuContext>) {
            self.frees.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn cpu() -> &'static ProcessorBlock {
        Box::leak(Box::new(ProcessorBlock::new(0, || 0)))
    }

    mod first_use {
        use super::*;

        #[test]
        fn should_allocate_and_initialize_at_dispatch_level() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let mut state = FpuState::NeverUsed;

            let transition = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            assert_eq!(transition, Ok(FpuTransition::Initialized));
            assert!(state.is_in_use());
            assert!(state.is_owner());
            assert_eq!(hardware.events(), [Event::Enable(RunLevel::Dispatch), Event::Initialize(RunLevel::Dispatch)]);
            assert_eq!(cpu.run_level(), RunLevel::Low);
        }

        #[test]
        fn should_allocate_exactly_once_across_repeated_faults() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let fpu = LazyFpu::new(&allocator, &hardware);
            let mut state = FpuState::NeverUsed;

            for _ in 0 .. 5 {
                let _ = fpu.handle_access_fault(&mut state, cpu);
                hardware.disable_access();
            }
            assert_eq!(allocator.allocations.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn allocation_failure_should_leave_access_disabled() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(true);
            let mut state = FpuState::NeverUsed;

            let result = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            assert_eq!(result, Err(AllocationError));
            assert!(!state.is_in_use());
            assert!(!hardware.is_access_enabled());
            assert!(hardware.events().is_empty());
            assert_eq!(cpu.run_level(), RunLevel::Low);
        }

        #[test]
        fn partial_hardware_should_get_adjusted_defaults() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Partial);
            let allocator = CountingAllocator::new(false);
            let mut state = FpuState::NeverUsed;

            let _ = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            let mut expected = FpuContext::zeroed();
            expected.reset_to_defaults(FpuCapability::Partial);
            assert_eq!(state.context(), Some(&expected));
        }
    }

    mod later_use {
        use super::*;

        #[test]
        fn owner_should_be_reenabled_without_a_restore() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let fpu = LazyFpu::new(&allocator, &hardware);
            let mut state = FpuState::NeverUsed;

            let _ = fpu.handle_access_fault(&mut state, cpu);
            hardware.disable_access();
            assert_eq!(fpu.handle_access_fault(&mut state, cpu), Ok(FpuTransition::Reenabled));
            assert_eq!(allocator.allocations.load(Ordering::SeqCst), 1);
            assert_eq!(hardware.count(|e| matches!(e, Event::Restore(_))), 0);
            assert!(hardware.is_access_enabled());
            assert!(state.is_owner());
        }

        #[test]
        fn non_owner_should_be_restored_at_dispatch_level() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let fpu = LazyFpu::new(&allocator, &hardware);
            let mut state = FpuState::NeverUsed;

            let _ = fpu.handle_access_fault(&mut state, cpu);
            state.save_for_switch(&hardware);
            assert!(!state.is_owner());
            assert!(!hardware.is_access_enabled());

            assert_eq!(fpu.handle_access_fault(&mut state, cpu), Ok(FpuTransition::Restored));
            assert!(state.is_owner());
            assert_eq!(&hardware.events()[2 ..], [
                Event::Save,
                Event::Disable,
                Event::Enable(RunLevel::Dispatch),
                Event::Restore(RunLevel::Dispatch),
            ]);
            assert_eq!(cpu.run_level(), RunLevel::Low);
        }

        #[test]
        fn should_nest_inside_a_raised_run_level() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let mut state = FpuState::NeverUsed;

            let outer = cpu.raise_run_level(RunLevel::Dispatch);
            let _ = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            assert_eq!(cpu.run_level(), RunLevel::Dispatch);
            cpu.lower_run_level(outer);
            assert_eq!(cpu.run_level(), RunLevel::Low);
        }
    }

    mod teardown {
        use super::*;

        #[test]
        fn release_should_free_the_context_once() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let mut state = FpuState::NeverUsed;

            let _ = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            state.release(&allocator);
            state.release(&allocator);
            assert_eq!(allocator.frees.load(Ordering::SeqCst), 1);
            assert!(!state.is_in_use());
        }

        #[test]
        fn clear_owner_should_keep_the_context() {
            let cpu = cpu();
            let hardware = MockHardware::new(cpu, FpuCapability::Full);
            let allocator = CountingAllocator::new(false);
            let mut state = FpuState::NeverUsed;

            let _ = LazyFpu::new(&allocator, &hardware).handle_access_fault(&mut state, cpu);
            state.clear_owner();
            assert!(state.is_in_use());
            assert!(!state.is_owner());
        }
    }
}

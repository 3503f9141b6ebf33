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

//! The parts of the scheduler's thread record that trap handling reads and writes.
//!
//! Run queues and context switching live elsewhere. All the trap layer needs from a thread is a
//! handful of flags and its floating-point state, and it only ever touches them on the CPU that is
//! currently running the thread, so none of this is synchronized.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

use {
    bitflags::bitflags,
    fpu::{FpuContextAllocator, FpuHardware, FpuState},
};

bitflags! {
    /// Per-thread state bits.
    pub struct ThreadFlags: u32 {
        /// The thread is somewhere inside the system-call marshaler.
        const IN_SYSTEM_CALL = 0x0000_0001;
        /// A debugger wants the thread to stop after its next user-mode instruction.
        const SINGLE_STEP    = 0x0000_0002;
    }
}

/// Identifies a thread for as long as it exists.
pub type ThreadId = u64;

/// A thread of execution, as seen by the trap layer.
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    flags: ThreadFlags,

    /// The thread's floating-point state. The context switcher is responsible for calling
    /// `FpuState::save_for_switch` when it switches away from this thread.
    pub fpu: FpuState,
}

impl Thread {
    /// Creates the record for a thread that hasn't run yet.
    pub const fn new(id: ThreadId) -> Thread {
        Thread {
            id,
            flags: ThreadFlags::empty(),
            fpu: FpuState::NeverUsed,
        }
    }

    /// The thread's ID.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// The thread's current flags.
    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    /// Sets the given flags, leaving the others alone.
    pub fn set_flags(&mut self, flags: ThreadFlags) {
        self.flags.insert(flags);
    }

    /// Clears the given flags, leaving the others alone.
    pub fn clear_flags(&mut self, flags: ThreadFlags) {
        self.flags.remove(flags);
    }

    /// Returns `true` if the thread is currently executing a system call.
    pub fn is_in_system_call(&self) -> bool {
        self.flags.contains(ThreadFlags::IN_SYSTEM_CALL)
    }

    /// Returns `true` if a debugger has asked for the thread to be single-stepped. The request
    /// stays in effect until the debugger clears it.
    pub fn single_step_requested(&self) -> bool {
        self.flags.contains(ThreadFlags::SINGLE_STEP)
    }

    /// Called when the scheduler is done with the thread for good.
    pub fn terminate(&mut self, allocator: &dyn FpuContextAllocator) {
        self.fpu.release(allocator);
        self.flags = ThreadFlags::empty();
    }

    /// Called when the scheduler switches this CPU away from the thread.
    pub fn switch_out(&mut self, hardware: &dyn FpuHardware) {
        self.fpu.save_for_switch(hardware);
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        core::sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        fpu::{FpuCapability, FpuContext, FpuContextLayout},
    };

    #[derive(Default)]
    struct Counters {
        destroyed: AtomicUsize,
        saved: AtomicUsize,
        enabled: AtomicBool,
    }

    impl FpuContextAllocator for Counters {
        fn allocate(&self, _tag: u32) -> Option<Box<FpuContext>> {
            Some(Box::new(FpuContext::zeroed()))
        }

        fn destroy(&self, _context: Box<FpuContext>) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FpuHardware for Counters {
        fn capability(&self) -> FpuCapability { FpuCapability::Full }
        fn enable_access(&self) { self.enabled.store(true, Ordering::SeqCst); }
        fn disable_access(&self) { self.enabled.store(false, Ordering::SeqCst); }
        fn is_access_enabled(&self) -> bool { self.enabled.load(Ordering::SeqCst) }
        fn save(&self, _context: &mut FpuContext) { self.saved.fetch_add(1, Ordering::SeqCst); }
        fn restore(&self, _context: &FpuContext) {}
    }

    fn thread_using_fpu(counters: &Counters) -> Thread {
        let mut thread = Thread::new(3);
        thread.fpu = FpuState::Allocated { context: counters.allocate(0).unwrap(), owner: true };
        counters.enable_access();
        thread
    }

    #[test]
    fn new_thread_should_have_no_flags() {
        let thread = Thread::new(7);
        assert_eq!(thread.id(), 7);
        assert!(thread.flags().is_empty());
        assert!(!thread.fpu.is_in_use());
    }

    #[test]
    fn flags_should_be_independent() {
        let mut thread = Thread::new(1);
        thread.set_flags(ThreadFlags::IN_SYSTEM_CALL | ThreadFlags::SINGLE_STEP);
        thread.clear_flags(ThreadFlags::IN_SYSTEM_CALL);
        assert!(!thread.is_in_system_call());
        assert!(thread.single_step_requested());
    }

    #[test]
    fn switch_out_should_save_and_give_up_the_fpu() {
        let counters = Counters::default();
        let mut thread = thread_using_fpu(&counters);
        thread.switch_out(&counters);
        thread.switch_out(&counters);

        assert_eq!(counters.saved.load(Ordering::SeqCst), 1);
        assert!(!counters.is_access_enabled());
        assert!(thread.fpu.is_in_use());
        assert!(!thread.fpu.is_owner());
    }

    #[test]
    fn terminate_should_release_the_context_and_flags() {
        let counters = Counters::default();
        let mut thread = thread_using_fpu(&counters);
        thread.set_flags(ThreadFlags::SINGLE_STEP);
        thread.terminate(&counters);

        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert!(!thread.fpu.is_in_use());
        assert!(thread.flags().is_empty());
    }
}

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

//! Per-CPU bookkeeping that the trap layer has to keep balanced: the software run level (how much
//! of the interrupt stream this CPU is currently willing to see) and cycle accounting (who gets
//! charged for the time this CPU is spending right now).
//!
//! Only the CPU that owns a `ProcessorBlock` ever writes to it, so everything here is a plain
//! atomic with relaxed ordering. The atomics exist so that a block can be shared by reference
//! between the scheduler, the dispatcher, and anything that wants to read the counters.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

mod accounting;
mod run_level;

pub use {
    accounting::CycleAccount,
    run_level::RunLevel,
};

use core::{
    convert::TryFrom,
    sync::atomic::{AtomicU64, AtomicU8, Ordering},
};

/// Reads a free-running cycle counter for this CPU.
pub type CycleCounter = fn() -> u64;

/// Everything the dispatch core keeps per CPU.
#[derive(Debug)]
pub struct ProcessorBlock {
    index: u32,
    run_level: AtomicU8,
    period: AtomicU8,
    period_start: AtomicU64,
    cycles: [AtomicU64; CycleAccount::COUNT],
    read_cycle_counter: CycleCounter,
}

impl ProcessorBlock {
    /// Creates the block for the CPU with the given index. The CPU starts at `RunLevel::Low`
    /// with no accounting period in effect.
    pub const fn new(index: u32, read_cycle_counter: CycleCounter) -> ProcessorBlock {
        ProcessorBlock {
            index,
            run_level: AtomicU8::new(RunLevel::Low as u8),
            period: AtomicU8::new(CycleAccount::Invalid as u8),
            period_start: AtomicU64::new(0),
            cycles: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            read_cycle_counter,
        }
    }

    /// The index of the CPU this block describes.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Starts charging this CPU's time to `period`, charging everything since the last switch to
    /// whichever period was in effect until now.
    ///
    /// # Returns
    /// The period that was in effect before this call. The caller must pass it back to this
    /// function when it's done, on every path that returns.
    pub fn begin_cycle_accounting(&self, period: CycleAccount) -> CycleAccount {
        let now = (self.read_cycle_counter)();
        let previous = self.period.swap(period as u8, Ordering::Relaxed);
        let start = self.period_start.swap(now, Ordering::Relaxed);
        self.cycles[usize::from(previous)].fetch_add(now.wrapping_sub(start), Ordering::Relaxed);
        CycleAccount::try_from(previous).unwrap_or(CycleAccount::Invalid)
    }

    /// The period this CPU's time is currently being charged to.
    pub fn cycle_account(&self) -> CycleAccount {
        CycleAccount::try_from(self.period.load(Ordering::Relaxed)).unwrap_or(CycleAccount::Invalid)
    }

    /// The total number of cycles charged to `period` so far, not counting the period that's
    /// currently running.
    pub fn cycles_charged(&self, period: CycleAccount) -> u64 {
        self.cycles[period as usize].load(Ordering::Relaxed)
    }

    /// The current run level.
    pub fn run_level(&self) -> RunLevel {
        RunLevel::try_from(self.run_level.load(Ordering::Relaxed)).unwrap_or(RunLevel::High)
    }

    /// Raises the run level to `level`.
    ///
    /// # Returns
    /// The previous run level, which must eventually be handed to `lower_run_level`.
    pub fn raise_run_level(&self, level: RunLevel) -> RunLevel {
        let previous = self.run_level();
        debug_assert!(level >= previous, "tried to raise the run level from {:?} to {:?}", previous, level);
        self.run_level.store(level as u8, Ordering::Relaxed);
        previous
    }

    /// Lowers the run level back to `previous`, the value returned by the matching
    /// `raise_run_level`.
    pub fn lower_run_level(&self, previous: RunLevel) {
        debug_assert!(previous <= self.run_level(), "tried to lower the run level from {:?} to {:?}", self.run_level(), previous);
        self.run_level.store(previous as u8, Ordering::Relaxed);
    }
}

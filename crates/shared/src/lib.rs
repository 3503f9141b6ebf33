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

//! Helper macros and processor primitives shared by the rest of the kernel. Like the `error`
//! crate, this one sits at the bottom of the dependency graph and must not depend on any other
//! kernel crate besides that one.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

pub mod ffi;

#[allow(unused_imports)]
use core::arch::asm;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        /// Masks IRQs and FIQs on this CPU.
        #[inline(always)]
        pub fn disable_interrupts() {
            unsafe {
                asm!("cpsid if", options(nomem, nostack, preserves_flags));
            }
        }

        /// Unmasks IRQs and FIQs on this CPU.
        #[inline(always)]
        pub fn enable_interrupts() {
            unsafe {
                asm!("cpsie if", options(nomem, nostack, preserves_flags));
            }
        }

        /// Returns `true` if IRQs are currently unmasked on this CPU.
        #[inline(always)]
        pub fn interrupts_enabled() -> bool {
            let cpsr: u32;
            unsafe {
                asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack, preserves_flags));
            }
            cpsr & 0x80 == 0
        }

        /// Waits for an interrupt. Never call this with interrupts masked unless the goal is to
        /// hang.
        #[inline(always)]
        pub fn wait_for_interrupt() {
            unsafe {
                asm!("dsb sy", "wfi", options(nomem, nostack, preserves_flags));
            }
        }
    } else if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        /// Clears IF on this CPU.
        #[inline(always)]
        pub fn disable_interrupts() {
            unsafe {
                asm!("cli", options(nomem, nostack));
            }
        }

        /// Sets IF on this CPU.
        #[inline(always)]
        pub fn enable_interrupts() {
            unsafe {
                asm!("sti", options(nomem, nostack));
            }
        }

        /// Returns `true` if IF is set on this CPU.
        #[inline(always)]
        pub fn interrupts_enabled() -> bool {
            let flags: usize;
            unsafe {
                asm!("pushf", "pop {}", out(reg) flags, options(nomem, preserves_flags));
            }
            flags & 0x200 != 0
        }

        /// Halts until the next interrupt. Never call this with IF clear unless the goal is to
        /// hang.
        #[inline(always)]
        pub fn wait_for_interrupt() {
            unsafe {
                asm!("hlt", options(nomem, nostack, preserves_flags));
            }
        }
    }
}

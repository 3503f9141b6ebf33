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

use {
    core::arch::asm,

    crate::{FpuCapability, FpuContext, FpuHardware},
};

const CR0_TASK_SWITCHED: usize = 0x8;

/// The x87/SSE unit, saved and restored with `fxsave` and `fxrstor`. Access is controlled with
/// CR0.TS, so this only works at CPL 0.
#[derive(Debug, Default)]
pub struct Fxsr;

impl Fxsr {
    /// Makes a new driver. There's only one FPU per CPU, so every instance drives the same
    /// hardware.
    pub const fn new() -> Fxsr {
        Fxsr
    }

    fn read_cr0() -> usize {
        let cr0: usize;
        unsafe { asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags)); }
        cr0
    }
}

impl FpuHardware for Fxsr {
    fn capability(&self) -> FpuCapability {
        FpuCapability::Full
    }

    fn enable_access(&self) {
        unsafe { asm!("clts", options(nomem, nostack, preserves_flags)); }
    }

    fn disable_access(&self) {
        let cr0 = Self::read_cr0() | CR0_TASK_SWITCHED;
        unsafe { asm!("mov cr0, {}", in(reg) cr0, options(nomem, nostack, preserves_flags)); }
    }

    fn is_access_enabled(&self) -> bool {
        Self::read_cr0() & CR0_TASK_SWITCHED == 0
    }

    fn save(&self, context: &mut FpuContext) {
        let area = context as *mut FpuContext;
        #[cfg(target_arch = "x86_64")]
        unsafe { asm!("fxsave64 [{}]", in(reg) area, options(nostack, preserves_flags)); }
        #[cfg(target_arch = "x86")]
        unsafe { asm!("fxsave [{}]", in(reg) area, options(nostack, preserves_flags)); }
    }

    fn restore(&self, context: &FpuContext) {
        let area = context as *const FpuContext;
        #[cfg(target_arch = "x86_64")]
        unsafe { asm!("fxrstor64 [{}]", in(reg) area, options(nostack, preserves_flags, readonly)); }
        #[cfg(target_arch = "x86")]
        unsafe { asm!("fxrstor [{}]", in(reg) area, options(nostack, preserves_flags, readonly)); }
    }

    fn initialize(&self, defaults: &FpuContext) {
        // `fninit` resets the x87 tag and status words; the rest comes from the defaults.
        unsafe { asm!("fninit", options(nomem, nostack, preserves_flags)); }
        self.restore(defaults);
    }
}

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

const FPEXC_ENABLE: u32 = 0x4000_0000;

/// The VFP/Advanced SIMD unit. Access is controlled with FPEXC.EN.
#[derive(Debug)]
pub struct Vfp {
    capability: FpuCapability,
}

impl Vfp {
    /// Makes a driver for a VFP whose support level has already been detected.
    pub const fn new(capability: FpuCapability) -> Vfp {
        Vfp { capability }
    }

    fn read_fpexc() -> u32 {
        let fpexc: u32;
        unsafe { asm!("vmrs {}, fpexc", out(reg) fpexc, options(nomem, nostack, preserves_flags)); }
        fpexc
    }

    fn write_fpexc(fpexc: u32) {
        unsafe { asm!("vmsr fpexc, {}", in(reg) fpexc, options(nomem, nostack, preserves_flags)); }
    }
}

impl FpuHardware for Vfp {
    fn capability(&self) -> FpuCapability {
        self.capability
    }

    fn enable_access(&self) {
        Self::write_fpexc(Self::read_fpexc() | FPEXC_ENABLE);
    }

    fn disable_access(&self) {
        Self::write_fpexc(Self::read_fpexc() & !FPEXC_ENABLE);
    }

    fn is_access_enabled(&self) -> bool {
        Self::read_fpexc() & FPEXC_ENABLE != 0
    }

    fn save(&self, context: &mut FpuContext) {
        let registers = context.registers.as_mut_ptr();
        let fpscr: u32;
        unsafe {
            asm!(
                "vstmia {regs}, {{d0-d15}}",
                "vmrs {fpscr}, fpscr",
                regs = in(reg) registers,
                fpscr = out(reg) fpscr,
                options(nostack, preserves_flags)
            );
            #[cfg(target_feature = "d32")]
            asm!("vstmia {}, {{d16-d31}}", in(reg) registers.add(16), options(nostack, preserves_flags));
        }
        context.fpscr = fpscr;
    }

    fn restore(&self, context: &FpuContext) {
        let registers = context.registers.as_ptr();
        unsafe {
            asm!(
                "vldmia {regs}, {{d0-d15}}",
                "vmsr fpscr, {fpscr}",
                regs = in(reg) registers,
                fpscr = in(reg) context.fpscr,
                options(nostack, preserves_flags, readonly)
            );
            #[cfg(target_feature = "d32")]
            asm!("vldmia {}, {{d16-d31}}", in(reg) registers.add(16), options(nostack, preserves_flags, readonly));
        }
    }
}

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

//! The in-memory layouts of saved floating-point state.

/// How much of IEEE-754 the FPU handles on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FpuCapability {
    /// Some corner cases (subnormal operands, NaN propagation) would need a software support path
    /// that the kernel doesn't provide, e.g. VFPv2 without its support code.
    Partial,
    /// Everything is handled in hardware.
    Full,
}

/// Operations every saved-FPU-state layout supports.
pub trait FpuContextLayout {
    /// The alignment the save and restore instructions require.
    const ALIGNMENT: usize;

    /// A context with every register and control word cleared.
    fn zeroed() -> Self;

    /// Puts the context into the state a thread sees the first time it touches the FPU. On
    /// hardware below `FpuCapability::Full`, the control word is adjusted so the hardware never
    /// needs the missing support path.
    fn reset_to_defaults(&mut self, capability: FpuCapability);
}

/// FPSCR: flush subnormal results and operands to zero.
pub const FPSCR_FLUSH_TO_ZERO: u32 = 1 << 24;
/// FPSCR: return the default NaN instead of propagating operands.
pub const FPSCR_DEFAULT_NAN: u32 = 1 << 25;

/// The ARM VFP/Advanced SIMD register file as saved by `vstm` plus the FPSCR.
#[repr(C, align(16))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfpContext {
    /// D0 through D31.
    pub registers: [u64; 32],
    /// The floating-point status and control register.
    pub fpscr: u32,
}

impl FpuContextLayout for VfpContext {
    const ALIGNMENT: usize = 16;

    fn zeroed() -> VfpContext {
        VfpContext {
            registers: [0; 32],
            fpscr: 0,
        }
    }

    fn reset_to_defaults(&mut self, capability: FpuCapability) {
        *self = VfpContext::zeroed();
        if capability < FpuCapability::Full {
            self.fpscr |= FPSCR_FLUSH_TO_ZERO | FPSCR_DEFAULT_NAN;
        }
    }
}

/// The x87 control word after `fninit`: all exceptions masked, extended precision, round to nearest.
pub const FCW_DEFAULT: u16 = 0x037f;
/// MXCSR after reset: all SSE exceptions masked, round to nearest.
pub const MXCSR_DEFAULT: u32 = 0x1f80;
/// MXCSR: flush subnormal results to zero.
pub const MXCSR_FLUSH_TO_ZERO: u32 = 1 << 15;

/// The 512-byte area written by `fxsave` and read by `fxrstor`.
#[repr(C, align(64))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxsaveContext {
    /// x87 control word.
    pub fcw: u16,
    /// x87 status word.
    pub fsw: u16,
    /// Abridged x87 tag word.
    pub ftw: u16,
    /// Last x87 opcode.
    pub fop: u16,
    /// Last x87 instruction pointer (low half on x64).
    pub fpu_ip: u32,
    /// Code segment of the last x87 instruction (high half of the pointer on x64).
    pub cs: u16,
    #[doc(hidden)]
    pub reserved1: u16,
    /// Last x87 data pointer (low half on x64).
    pub fpu_dp: u32,
    /// Data segment of the last x87 operand (high half of the pointer on x64).
    pub ds: u16,
    #[doc(hidden)]
    pub reserved2: u16,
    /// SSE control and status register.
    pub mxcsr: u32,
    /// Which MXCSR bits the processor supports.
    pub mxcsr_mask: u32,
    /// ST0/MM0 through ST7/MM7, 16 bytes apiece.
    pub st: [[u8; 16]; 8],
    /// XMM0 through XMM15 (only the first 8 on 32-bit x86).
    pub xmm: [[u8; 16]; 16],
    #[doc(hidden)]
    pub padding: [u8; 96],
}

impl FpuContextLayout for FxsaveContext {
    const ALIGNMENT: usize = 64;

    fn zeroed() -> FxsaveContext {
        FxsaveContext {
            fcw: 0,
            fsw: 0,
            ftw: 0,
            fop: 0,
            fpu_ip: 0,
            cs: 0,
            reserved1: 0,
            fpu_dp: 0,
            ds: 0,
            reserved2: 0,
            mxcsr: 0,
            mxcsr_mask: 0,
            st: [[0; 16]; 8],
            xmm: [[0; 16]; 16],
            padding: [0; 96],
        }
    }

    fn reset_to_defaults(&mut self, capability: FpuCapability) {
        *self = FxsaveContext::zeroed();
        self.fcw = FCW_DEFAULT;
        self.mxcsr = MXCSR_DEFAULT;
        if capability < FpuCapability::Full {
            self.mxcsr |= MXCSR_FLUSH_TO_ZERO;
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        /// The saved-state layout for the architecture being compiled for.
        pub type FpuContext = VfpContext;
    } else {
        /// The saved-state layout for the architecture being compiled for.
        pub type FpuContext = FxsaveContext;
    }
}

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

//! Per-architecture trap frames and classification. The decoding logic for every architecture is
//! always compiled (so it can be tested anywhere); only the entry points the assembly stubs call
//! are limited to the architecture being built for.

pub mod armv7;
pub mod ia32;
pub mod x64;
pub mod x86;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        /// The trap frame for the architecture being compiled for.
        pub use self::armv7::ArmTrapFrame as NativeTrapFrame;
    } else if #[cfg(target_arch = "x86")] {
        /// The trap frame for the architecture being compiled for.
        pub use self::x86::X86TrapFrame as NativeTrapFrame;
    } else if #[cfg(target_arch = "x86_64")] {
        /// The trap frame for the architecture being compiled for.
        pub use self::x64::X64TrapFrame as NativeTrapFrame;
    }
}

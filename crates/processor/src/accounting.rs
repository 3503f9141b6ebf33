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

use shared::ffi_enum;

ffi_enum! {
    #[repr(u8)]
    /// Who a CPU's time is being charged to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum CycleAccount {
        /// No period has started yet.
        Invalid = 0,
        /// The kernel, on behalf of the current thread (e.g. a system call or a fault).
        Kernel = 1,
        /// The current thread's user-mode code.
        User = 2,
        /// Interrupt servicing, which isn't fairly charged to any thread.
        Interrupt = 3,
    }
}

impl CycleAccount {
    /// The number of distinct periods.
    pub const COUNT: usize = 4;
}

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
    alloc::{
        alloc::{alloc_zeroed, dealloc, Layout},
        boxed::Box,
    },
    core::ptr::NonNull,

    crate::{FpuContext, FpuContextAllocator},
};

/// Allocates FPU contexts from the kernel heap.
#[derive(Debug, Default)]
pub struct HeapFpuContextAllocator;

impl HeapFpuContextAllocator {
    /// Makes a new allocator.
    pub const fn new() -> HeapFpuContextAllocator {
        HeapFpuContextAllocator
    }
}

impl FpuContextAllocator for HeapFpuContextAllocator {
    fn allocate(&self, _tag: u32) -> Option<Box<FpuContext>> {
        let layout = Layout::new::<FpuContext>();
        // All-zero bytes are a valid `FpuContext`, and the layout is never zero-sized.
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) } as *mut FpuContext)?;
        Some(unsafe { Box::from_raw(ptr.as_ptr()) })
    }

    fn destroy(&self, context: Box<FpuContext>) {
        let ptr = Box::into_raw(context);
        unsafe { dealloc(ptr as *mut u8, Layout::new::<FpuContext>()); }
    }
}

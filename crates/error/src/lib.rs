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

//! A pared-down `std::error` for the kernel. Anything that can go wrong inside the dispatch core
//! and is worth naming gets a type that implements `Error`, so callers can print it, follow its
//! source, and convert it into whatever a trap is allowed to produce (a signal, a status, or a
//! crash).

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

use core::fmt::{Debug, Display};

/// Base functionality for all errors in the kernel.
pub trait Error: Debug + Display {
    /// Indicates the error that led to this one, if any.
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

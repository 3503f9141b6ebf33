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
    core::fmt::{self, Write},
    spin::{Mutex, Once}
};

/// Prints the given string with format arguments, followed by a newline.
#[macro_export]
macro_rules! println {
    ($($fmt:expr)?) => { $crate::print!(concat!($($fmt,)? "\n")) };
    ($fmt:expr $(, $arg:expr)+ $(,)?) => { $crate::print!(concat!($fmt, "\n") $(, $arg)+) };
}

/// Prints the given string with format arguments (not followed by a newline).
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => { $crate::_print(format_args!($($arg)*)) };
}

/// Like `println!`, but only in debug builds. Any side-effects of the arguments still happen in
/// release builds.
#[macro_export]
macro_rules! printlndebug {
    ($($fmt:expr)?) => { $crate::printdebug!(concat!($($fmt,)? "\n")) };
    ($fmt:expr $(, $arg:expr)+ $(,)?) => { $crate::printdebug!(concat!($fmt, "\n") $(, $arg)+) };
}

/// Like `print!`, but only in debug builds. Any side-effects of the arguments still happen in
/// release builds.
#[macro_export]
macro_rules! printdebug {
    ($($fmt:expr)?) => {
        #[cfg(debug_assertions)] $crate::print!($($fmt)?);
        #[cfg(not(debug_assertions))] {
            $($fmt;)?
        }
    };

    ($fmt:expr $(, $arg:expr)+) => {
        #[cfg(debug_assertions)] $crate::print!($fmt $(, $arg)+);
        #[cfg(not(debug_assertions))] {
            $fmt;
            $(let _ = $arg;)+
        }
    };
}

/// A sink for the kernel's text output, such as a UART or a framebuffer console.
pub trait Console: Sync {
    /// Writes the whole string, blocking if the device needs time to accept it.
    fn write_str(&self, s: &str);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();

// Keeps lines from different CPUs from interleaving mid-line.
static OUTPUT_LOCK: Mutex<()> = Mutex::new(());

/// Registers the console that all kernel output goes to. Only the first registration counts;
/// anything printed before it is dropped.
pub fn set_console(console: &'static dyn Console) -> &'static dyn Console {
    *CONSOLE.call_once(|| console)
}

struct ConsoleWriter(&'static dyn Console);

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if let Some(&console) = CONSOLE.get() {
        // A CPU that faults while holding the lock must still be able to report the crash, so we
        // never wait forever for it.
        let _guard = OUTPUT_LOCK.try_lock();
        let _ = ConsoleWriter(console).write_fmt(args);
    }
}

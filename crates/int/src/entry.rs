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

//! The global state the assembly entry points reach for: the installed services, the crash bridge,
//! and the system-call table. All of it is set once at boot and never changes.

use {
    spin::Once,

    crate::{
        crash::CrashBridge,
        dispatch::TrapDispatcher,
        services::Services,
        syscall::SystemCallTable,
    },
};

static SERVICES: Once<Services<'static>> = Once::new();
static CRASH_BRIDGE: Once<CrashBridge<'static>> = Once::new();
static SYSTEM_CALLS: Once<SystemCallTable<'static>> = Once::new();

/// Installs the collaborators and the system-call table that every trap from now on will use.
/// Only the first installation counts.
pub fn install(services: Services<'static>, system_calls: SystemCallTable<'static>) -> TrapDispatcher<'static> {
    let services = SERVICES.call_once(|| services);
    let crash = CRASH_BRIDGE.call_once(|| CrashBridge::new(services.interrupt_control, services.halt));
    let system_calls = SYSTEM_CALLS.call_once(|| system_calls);
    TrapDispatcher::new(services, crash, system_calls)
}

/// The dispatcher, if `install` has been called.
pub fn dispatcher() -> Option<TrapDispatcher<'static>> {
    Some(TrapDispatcher::new(SERVICES.get()?, CRASH_BRIDGE.get()?, SYSTEM_CALLS.get()?))
}

/// The crash bridge, if `install` has been called.
pub fn crash_bridge() -> Option<&'static CrashBridge<'static>> {
    CRASH_BRIDGE.get()
}

/// The dispatcher, for an entry point. A trap before `install` means the kernel can't even report
/// what went wrong, so this CPU just stops.
#[cfg(target_os = "none")]
pub(crate) fn installed_dispatcher() -> TrapDispatcher<'static> {
    match dispatcher() {
        Some(dispatcher) => dispatcher,
        None => loop {
            shared::disable_interrupts();
            shared::wait_for_interrupt();
        },
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            syscall::SystemCallEntry,
            testing::{Harness, MockFrame},
        },
    };

    fn nothing(_: &mut [u8], _: &mut dyn crate::frame::TrapFrame, _: &mut usize) -> isize {
        7
    }

    static ENTRIES: [SystemCallEntry; 1] = [SystemCallEntry::new(nothing, 0)];

    // The only test that installs anything, since installation is once per process.
    #[test]
    fn install_should_make_the_dispatcher_reachable() {
        let harness: &'static Harness = Box::leak(Box::new(Harness::new()));
        let installed = install(harness.services(), SystemCallTable::new(&ENTRIES));
        let mut frame = MockFrame::user();
        assert_eq!(installed.dispatch_system_call(0, 0, &mut frame), 7);

        let later = dispatcher().map(|dispatcher| dispatcher.dispatch_system_call(0, 0, &mut frame));
        assert_eq!(later, Some(7));
        assert!(crash_bridge().map_or(false, |bridge| bridge.record().is_none()));

        let other: &'static Harness = Box::leak(Box::new(Harness::new()));
        install(other.services(), SystemCallTable::new(&[]));
        assert_eq!(dispatcher().map(|dispatcher| dispatcher.system_calls.len()), Some(1));
    }
}

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

//! What the ARM exception vectors call once they've saved a trap frame. Every entry point runs
//! with IRQs masked.

use {
    crate::{
        category::TrapCategory,
        entry::installed_dispatcher,
    },
    super::{classify_abort, ArmTrapFrame},
};

#[no_mangle]
extern "C" fn flint_arm_abort(frame: &mut ArmTrapFrame, address: usize, status: u32, prefetch: u32) {
    installed_dispatcher().dispatch(frame, classify_abort(address, status, prefetch != 0));
}

#[no_mangle]
extern "C" fn flint_arm_undefined_instruction(frame: &mut ArmTrapFrame) {
    installed_dispatcher().dispatch(frame, TrapCategory::UndefinedInstruction);
}

#[no_mangle]
extern "C" fn flint_arm_interrupt(frame: &mut ArmTrapFrame, vector: u32) {
    installed_dispatcher().dispatch(frame, TrapCategory::Interrupt { vector });
}

// `number` and `parameters` are the caller's R0 and R1. The status is already in the frame by the
// time this returns.
#[no_mangle]
extern "C" fn flint_arm_system_call(number: usize, parameters: usize, frame: &mut ArmTrapFrame) -> isize {
    installed_dispatcher().dispatch_system_call(number, parameters, frame)
}

//! Kernel stack switch.
//!
//! `pmos_switch_stacks(save, load)` pushes the caller's general registers,
//! stores `esp` through `save`, loads `load`, pops the registers found there
//! and returns on the new stack. A stack forged by
//! `pmos_core::build_initial_context` has the same shape, with the return
//! address pointing at `isr_return`.

use core::arch::global_asm;

global_asm!(
    ".section .text.switch, \"ax\"",
    ".global pmos_switch_stacks",
    "pmos_switch_stacks:",
    "    mov eax, [esp + 4]",
    "    mov edx, [esp + 8]",
    "    pushad",
    "    mov [eax], esp",
    "    mov esp, edx",
    "    popad",
    "    ret",
);

unsafe extern "C" {
    pub fn pmos_switch_stacks(save: *mut u32, load: u32);
}

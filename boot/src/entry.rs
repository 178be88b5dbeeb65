//! Multiboot header and `_start`.
//!
//! GRUB (or `qemu -kernel`) jumps here in 32-bit protected mode with paging
//! off, `eax` holding the multiboot magic and `ebx` the info structure.

use core::arch::global_asm;

/// Bytes reserved for the boot stack. The kernel task keeps running on it.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

global_asm!(
    ".section .multiboot, \"a\"",
    ".balign 4",
    ".long 0x1BADB002",
    ".long 0x00000003",
    ".long -(0x1BADB002 + 0x00000003)",
    "",
    ".section .bss.boot_stack, \"aw\", @nobits",
    ".balign 16",
    "boot_stack_bottom:",
    ".skip {stack_size}",
    ".global boot_stack_top",
    "boot_stack_top:",
    "",
    ".section .text._start, \"ax\"",
    ".global _start",
    "_start:",
    "    cli",
    "    mov esp, offset boot_stack_top",
    "    xor ebp, ebp",
    "    push ebx",
    "    push eax",
    "    call kernel_main",
    ".Lhang:",
    "    cli",
    "    hlt",
    "    jmp .Lhang",
    stack_size = const BOOT_STACK_SIZE,
);

unsafe extern "C" {
    static boot_stack_top: u8;
}

/// Address one past the boot stack.
pub fn boot_stack_top_address() -> u32 {
    (&raw const boot_stack_top) as u32
}

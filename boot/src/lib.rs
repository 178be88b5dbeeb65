//! Everything that only makes sense on a real i686 machine: the multiboot
//! entry point, descriptor tables, interrupt entry stubs, the stack switch
//! and the [`Platform`](pmos_core::Platform) built on them.

#![no_std]

pub mod entry;
pub mod gdt;
pub mod idt;
pub mod multiboot;
pub mod platform;
pub mod switch;

pub use multiboot::{MultibootInfo, MULTIBOOT_BOOTLOADER_MAGIC};
pub use platform::{enter_user_mode, install_kernel, syscall, BootKernel, X86Platform, KERNEL};

//! Fixed physical and virtual memory layout.
//!
//! ```text
//! 0x0000_0000 .. 0x0040_0000   low memory, kernel image (loaded at 1 MiB), boot stack
//! 0x0040_0000 .. 0x0080_0000   physical frame pool (page tables, directories, kernel stacks, user pages)
//! 0x0080_0000 ..               per-process user mappings
//! ```
//!
//! Everything below [`KERNEL_SPLIT`] is identity mapped in every address space.

/// Kernel/user split. Directory entries below this address are identical in
/// every address space.
pub const KERNEL_SPLIT: u32 = 0x0080_0000;

/// First byte of the physical frame pool.
pub const FRAME_POOL_START: u32 = 0x0040_0000;
/// One past the last byte of the physical frame pool.
pub const FRAME_POOL_END: u32 = KERNEL_SPLIT;

/// Load address of flat user program images.
pub const USER_PROGRAM_BASE: u32 = 0x0804_8000;
/// Top of the user stack (grows down).
pub const USER_STACK_TOP: u32 = 0xC000_0000;
pub const USER_STACK_SIZE: u32 = 0x1000;

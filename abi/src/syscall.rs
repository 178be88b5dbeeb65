//! Syscall numbers. The number travels in `eax` when entering `int 0x80`.

pub const SYSCALL_TABLE_SIZE: usize = 256;

pub const SYS_EXIT: u8 = 0;
pub const SYS_FORK: u8 = 1;
pub const SYS_WAIT: u8 = 2;

//! Architecture-neutral kernel core: interrupt dispatch, processes, the
//! scheduler and the syscall table.
//!
//! Hardware access goes through [`Platform`]; physical memory through
//! [`pmos_mm::FrameSource`]. Both are mocked in the unit tests.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod context;
pub mod interrupt;
pub mod kernel;
pub mod lifecycle;
pub mod platform;
pub mod process;
pub mod scheduler;
pub mod syscall;
pub mod usermode;

#[cfg(test)]
pub(crate) mod testing;

pub use config::KernelConfig;
pub use context::{build_initial_context, child_frame, INITIAL_CONTEXT_LEN};
pub use kernel::{InterruptHandler, Kernel};
pub use lifecycle::WaitStatus;
pub use platform::Platform;
pub use process::{Process, ProcessTable, Slot};
pub use syscall::{
    install_process_syscalls, syscall_return_err, syscall_return_ok, SyscallDisposition,
    SyscallEntry, SyscallHandler,
};

//! Syscall table and the process syscalls.
//!
//! `int 0x80` lands in [`Kernel::syscall_dispatch`] with the number in `eax`
//! and arguments in `ebx`, `ecx`, `edx`. Results go back in `eax`.

use pmos_abi::arch::x86::SYSCALL_INSN_LEN;
use pmos_abi::{InterruptFrame, SYSCALL_FAILED, SYSCALL_TABLE_SIZE, SYS_EXIT, SYS_FORK, SYS_WAIT};
use pmos_lib::{klog_debug, klog_trace, klog_warn};
use pmos_mm::FrameSource;

use crate::kernel::Kernel;
use crate::lifecycle::WaitStatus;
use crate::platform::Platform;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyscallDisposition {
    Ok,
    /// The caller is gone; nothing may touch its frame.
    NoReturn,
}

pub type SyscallHandler<P, F> = fn(&mut Kernel<P, F>, &mut InterruptFrame) -> SyscallDisposition;

pub struct SyscallEntry<P: Platform, F: FrameSource> {
    pub handler: Option<SyscallHandler<P, F>>,
    pub name: &'static str,
}

impl<P: Platform, F: FrameSource> SyscallEntry<P, F> {
    pub const EMPTY: Self = Self {
        handler: None,
        name: "",
    };
}

impl<P: Platform, F: FrameSource> Clone for SyscallEntry<P, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Platform, F: FrameSource> Copy for SyscallEntry<P, F> {}

pub fn syscall_return_ok(frame: &mut InterruptFrame, value: u32) -> SyscallDisposition {
    frame.set_return(value);
    SyscallDisposition::Ok
}

pub fn syscall_return_err(frame: &mut InterruptFrame) -> SyscallDisposition {
    frame.set_return(SYSCALL_FAILED);
    SyscallDisposition::Ok
}

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    pub fn register_syscall(&mut self, number: u8, name: &'static str, handler: SyscallHandler<P, F>) {
        self.syscalls[number as usize] = SyscallEntry {
            handler: Some(handler),
            name,
        };
    }

    pub fn syscall_dispatch(&mut self, frame: &mut InterruptFrame) -> SyscallDisposition {
        let number = frame.eax;
        let entry = match self.syscalls.get(number as usize) {
            Some(entry) => *entry,
            None => SyscallEntry::EMPTY,
        };

        match entry.handler {
            Some(handler) => {
                klog_trace!("syscall {} ({}) from pid {}", number, entry.name, self.current_pid());
                handler(self, frame)
            }
            None => {
                klog_debug!("syscall: unknown syscall {}", number);
                SyscallDisposition::Ok
            }
        }
    }
}

pub fn install_process_syscalls<P: Platform, F: FrameSource>(kernel: &mut Kernel<P, F>) {
    kernel.register_syscall(SYS_EXIT, "exit", sys_exit);
    kernel.register_syscall(SYS_FORK, "fork", sys_fork);
    kernel.register_syscall(SYS_WAIT, "wait", sys_wait);
    debug_assert!(SYSCALL_TABLE_SIZE > SYS_WAIT as usize);
}

fn sys_exit<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    frame: &mut InterruptFrame,
) -> SyscallDisposition {
    match kernel.exit() {
        Ok(()) => SyscallDisposition::NoReturn,
        Err(_) => syscall_return_err(frame),
    }
}

fn sys_fork<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    frame: &mut InterruptFrame,
) -> SyscallDisposition {
    match kernel.fork(frame) {
        Ok(pid) => syscall_return_ok(frame, pid),
        Err(err) => {
            klog_warn!("fork: {}", err);
            syscall_return_err(frame)
        }
    }
}

/// `wait(filter)`. A blocked caller re-executes the `int 0x80` once woken,
/// so the second pass finds the dead child.
fn sys_wait<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    frame: &mut InterruptFrame,
) -> SyscallDisposition {
    let [filter, _, _] = frame.syscall_args();
    match kernel.wait(filter) {
        Ok(WaitStatus::Reaped(pid)) => syscall_return_ok(frame, pid),
        Ok(WaitStatus::Blocked) => {
            frame.eip = frame.eip.wrapping_sub(SYSCALL_INSN_LEN);
            kernel.schedule();
            SyscallDisposition::Ok
        }
        Err(_) => syscall_return_err(frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{boot_kernel, boot_kernel_with, syscall_frame, TestKernel};
    use crate::config::KernelConfig;
    use pmos_abi::{ProcessState, KERNEL_PID, WAIT_ANY};

    fn call(kernel: &mut TestKernel, frame: &mut InterruptFrame) -> SyscallDisposition {
        kernel.syscall_dispatch(frame)
    }

    #[test]
    fn process_syscalls_are_installed() {
        let kernel = boot_kernel();
        assert_eq!(kernel.syscalls[0].name, "exit");
        assert_eq!(kernel.syscalls[1].name, "fork");
        assert_eq!(kernel.syscalls[2].name, "wait");
        assert!(kernel.syscalls[3].handler.is_none());
    }

    #[test]
    fn unknown_syscall_leaves_eax() {
        let mut kernel = boot_kernel();
        let mut frame = syscall_frame(0, 0);
        frame.eax = 77;
        assert_eq!(call(&mut kernel, &mut frame), SyscallDisposition::Ok);
        assert_eq!(frame.eax, 77);
        frame.eax = 0x1_0000;
        call(&mut kernel, &mut frame);
        assert_eq!(frame.eax, 0x1_0000);
    }

    #[test]
    fn registered_handler_gets_frame() {
        fn answer(_: &mut TestKernel, frame: &mut InterruptFrame) -> SyscallDisposition {
            let [a, b, c] = frame.syscall_args();
            syscall_return_ok(frame, a + b + c)
        }
        let mut kernel = boot_kernel();
        kernel.register_syscall(9, "sum", answer);
        let mut frame = syscall_frame(9, 1);
        frame.ecx = 2;
        frame.edx = 3;
        call(&mut kernel, &mut frame);
        assert_eq!(frame.eax, 6);
    }

    #[test]
    fn fork_returns_pid_to_parent_and_zero_to_child() {
        let mut kernel = boot_kernel();
        let mut frame = syscall_frame(SYS_FORK, 0);
        call(&mut kernel, &mut frame);
        assert_eq!(frame.eax, 2);
        assert_eq!(kernel.process(2).unwrap().seed.unwrap().eax, 0);
    }

    #[test]
    fn failed_fork_returns_minus_one() {
        let mut kernel = boot_kernel_with(KernelConfig::default(), 3);
        let mut frame = syscall_frame(SYS_FORK, 0);
        call(&mut kernel, &mut frame);
        assert_eq!(frame.eax, SYSCALL_FAILED);
        assert_eq!(kernel.process_count(), 1);
    }

    #[test]
    fn kernel_exit_is_refused() {
        let mut kernel = boot_kernel();
        let mut frame = syscall_frame(SYS_EXIT, 0);
        assert_eq!(call(&mut kernel, &mut frame), SyscallDisposition::Ok);
        assert_eq!(frame.eax, SYSCALL_FAILED);
        assert_eq!(kernel.current_pid(), KERNEL_PID);
    }

    #[test]
    fn wait_with_no_children_returns_minus_one() {
        let mut kernel = boot_kernel();
        let mut frame = syscall_frame(SYS_WAIT, WAIT_ANY);
        call(&mut kernel, &mut frame);
        assert_eq!(frame.eax, SYSCALL_FAILED);
    }

    #[test]
    fn wait_blocks_and_restarts_after_child_exit() {
        let mut kernel = boot_kernel();
        let mut fork = syscall_frame(SYS_FORK, 0);
        call(&mut kernel, &mut fork);
        let child = fork.eax;

        let mut wait = syscall_frame(SYS_WAIT, WAIT_ANY);
        let eip = wait.eip;
        call(&mut kernel, &mut wait);
        assert_eq!(wait.eip, eip - 2);
        assert_eq!(wait.eax, SYS_WAIT as u32);
        assert_eq!(kernel.current_pid(), child);
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Waiting));

        let mut exit = syscall_frame(SYS_EXIT, 0);
        assert_eq!(call(&mut kernel, &mut exit), SyscallDisposition::NoReturn);
        assert_eq!(kernel.current_pid(), KERNEL_PID);

        // The parent re-executes int 0x80 with the untouched registers.
        wait.eip += 2;
        call(&mut kernel, &mut wait);
        assert_eq!(wait.eax, child);
        assert_eq!(wait.eip, eip);
        assert_eq!(kernel.process_count(), 1);
    }
}

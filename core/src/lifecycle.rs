//! fork, exit and wait.

use pmos_abi::{
    InterruptFrame, Pid, ProcessError, ProcessResult, ProcessState, KERNEL_PID, KERNEL_STACK_SIZE,
    MAX_PROCESSES, WAIT_ANY,
};
use pmos_lib::{klog_debug, klog_warn, IrqGuard};
use pmos_mm::FrameSource;

use crate::kernel::Kernel;
use crate::platform::Platform;
use crate::process::{Process, Slot};

/// Result of a `wait` that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    /// A dead child was reaped.
    Reaped(Pid),
    /// Matching children exist but none has exited. The caller is now
    /// `Waiting` and must reschedule.
    Blocked,
}

#[inline]
fn matches_filter(pid: Pid, filter: u32) -> bool {
    filter == WAIT_ANY || pid == filter
}

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    /// Duplicate the current process. `frame` is the caller's register state
    /// at the syscall; the child resumes from a copy of it with `eax` = 0.
    ///
    /// The child shares every page table with the parent and gets its own
    /// kernel stack. It is linked right after the parent and runs the next
    /// time the scheduler reaches it.
    pub fn fork(&mut self, frame: &InterruptFrame) -> ProcessResult<Pid> {
        let _irq = IrqGuard::new();

        if self.processes.is_full() {
            return Err(ProcessError::TableFull);
        }

        let parent = &self.processes[self.current];
        let parent_pid = parent.pid;
        let space = parent.space.clone_shared(&mut self.frames)?;

        let Some(stack) = self.frames.allocate() else {
            space.destroy(&mut self.frames);
            return Err(ProcessError::OutOfMemory);
        };

        let mut seed = *frame;
        seed.eax = 0;

        let pid = self.next_pid;
        let child = Process {
            pid,
            state: ProcessState::Ready,
            esp: 0,
            kernel_stack: Some(stack),
            stack_top: stack.start_address() + KERNEL_STACK_SIZE,
            space,
            next: Slot::FIRST,
            seed: Some(seed),
            parent: Some(parent_pid),
        };

        let slot = match self.processes.insert(child) {
            Ok(slot) => slot,
            Err(err) => {
                self.frames.free(stack);
                space.destroy(&mut self.frames);
                return Err(err);
            }
        };
        self.processes.link_after(self.current, slot);
        self.next_pid += 1;

        klog_debug!("fork: pid {} -> child pid {}", parent_pid, pid);
        Ok(pid)
    }

    /// Terminate the current process and switch away. A waiting parent is
    /// made ready; children lose their parent. The kernel task cannot exit.
    ///
    /// On hardware this only returns on error.
    pub fn exit(&mut self) -> ProcessResult<()> {
        let _irq = IrqGuard::new();

        let pid = self.current_pid();
        if pid == KERNEL_PID {
            klog_warn!("exit: kernel task cannot exit");
            return Err(ProcessError::NotPermitted);
        }

        let parent = self.processes[self.current].parent;
        self.processes[self.current].state = ProcessState::Dead;

        if let Some(slot) = parent.and_then(|ppid| self.processes.find(ppid)) {
            let parent = &mut self.processes[slot];
            if parent.state == ProcessState::Waiting {
                parent.state = ProcessState::Ready;
            }
        }

        let children = self.children_of(pid);
        for slot in children.iter() {
            self.processes[slot].parent = None;
        }

        klog_debug!("exit: pid {}", pid);
        self.schedule();
        Ok(())
    }

    /// Reap a dead child of the current process matching `filter` (a pid,
    /// or [`WAIT_ANY`]). With only live matches the caller is marked
    /// `Waiting`; with no match at all this fails with `NoChildren`.
    pub fn wait(&mut self, filter: u32) -> ProcessResult<WaitStatus> {
        let _irq = IrqGuard::new();

        let pid = self.current_pid();
        let mut live_match = false;
        for slot in self.children_of(pid).iter() {
            let child = &self.processes[slot];
            if !matches_filter(child.pid, filter) {
                continue;
            }
            if child.is_alive() {
                live_match = true;
                continue;
            }
            return self
                .release(slot)
                .map(WaitStatus::Reaped)
                .ok_or(ProcessError::NoSuchProcess);
        }

        if !live_match {
            return Err(ProcessError::NoChildren);
        }
        self.processes[self.current].state = ProcessState::Waiting;
        Ok(WaitStatus::Blocked)
    }

    fn children_of(&self, pid: Pid) -> SlotList {
        let mut out = SlotList::new();
        for slot in self.processes.ring(self.current) {
            if self.processes[slot].parent == Some(pid) {
                out.push(slot);
            }
        }
        out
    }
}

/// Snapshot of slots, so callers can mutate the table while walking it.
struct SlotList {
    items: [Option<Slot>; MAX_PROCESSES],
    len: usize,
}

impl SlotList {
    const fn new() -> Self {
        Self {
            items: [None; MAX_PROCESSES],
            len: 0,
        }
    }

    fn push(&mut self, slot: Slot) {
        if self.len < MAX_PROCESSES {
            self.items[self.len] = Some(slot);
            self.len += 1;
        }
    }

    fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.items[..self.len].iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{boot_kernel, boot_kernel_with, syscall_frame, TestKernel};
    use crate::config::KernelConfig;
    use pmos_abi::SYS_FORK;
    use pmos_abi::arch::x86::USER_PROGRAM_BASE;

    fn fork(kernel: &mut TestKernel) -> Pid {
        kernel.fork(&syscall_frame(SYS_FORK, 0)).unwrap()
    }

    #[test]
    fn pids_are_monotonic_and_parented() {
        let mut kernel = boot_kernel();
        assert_eq!(fork(&mut kernel), 2);
        assert_eq!(fork(&mut kernel), 3);
        let child = kernel.process(3).unwrap();
        assert_eq!(child.parent, Some(KERNEL_PID));
        assert_eq!(child.state, ProcessState::Ready);
        assert_eq!(child.seed.unwrap().eax, 0);
        assert_eq!(child.stack_top, child.kernel_stack.unwrap().start_address() + 4096);
    }

    #[test]
    fn child_shares_frames_with_parent() {
        let mut kernel = boot_kernel();
        let template = kernel.kernel_space();
        let space = pmos_mm::AddressSpace::create(kernel.frames_mut(), &template).unwrap();
        let page = kernel.frames_mut().allocate().unwrap();
        space
            .map(kernel.frames_mut(), USER_PROGRAM_BASE, page.start_address(), true, true)
            .unwrap();
        let current = kernel.current;
        kernel.processes[current].space = space;

        let pid = fork(&mut kernel);
        let child_space = kernel.process(pid).unwrap().space;
        assert_ne!(child_space.root(), space.root());
        assert_eq!(
            child_space.translate(kernel.frames(), USER_PROGRAM_BASE),
            Some(page.start_address())
        );
        assert_eq!(
            child_space.translate(kernel.frames(), 0x0010_0000),
            space.translate(kernel.frames(), 0x0010_0000)
        );
    }

    #[test]
    fn fork_fails_when_table_full() {
        let mut kernel = boot_kernel_with(KernelConfig::default(), 256);
        for _ in 1..MAX_PROCESSES {
            fork(&mut kernel);
        }
        let free = kernel.frames().free_frames();
        assert_eq!(kernel.fork(&syscall_frame(SYS_FORK, 0)), Err(ProcessError::TableFull));
        assert_eq!(kernel.frames().free_frames(), free);
    }

    #[test]
    fn fork_out_of_frames_releases_directory() {
        // template: 1 directory + 2 tables; one fork needs 2 more frames.
        let mut kernel = boot_kernel_with(KernelConfig::default(), 4);
        assert_eq!(kernel.fork(&syscall_frame(SYS_FORK, 0)), Err(ProcessError::OutOfMemory));
        assert_eq!(kernel.frames().free_frames(), 1);
        assert_eq!(kernel.process_count(), 1);
    }

    #[test]
    fn kernel_task_cannot_exit() {
        let mut kernel = boot_kernel();
        assert_eq!(kernel.exit(), Err(ProcessError::NotPermitted));
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Running));
    }

    #[test]
    fn wait_without_children_fails() {
        let mut kernel = boot_kernel();
        assert_eq!(kernel.wait(WAIT_ANY), Err(ProcessError::NoChildren));
        fork(&mut kernel);
        assert_eq!(kernel.wait(99), Err(ProcessError::NoChildren));
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Running));
    }

    #[test]
    fn wait_blocks_then_exit_wakes_and_wait_reaps() {
        let mut kernel = boot_kernel();
        let free_before = kernel.frames().free_frames();
        let child = fork(&mut kernel);

        assert_eq!(kernel.wait(WAIT_ANY), Ok(WaitStatus::Blocked));
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Waiting));
        kernel.schedule();
        assert_eq!(kernel.current_pid(), child);

        kernel.exit().unwrap();
        assert_eq!(kernel.current_pid(), KERNEL_PID);
        assert_eq!(kernel.process_state(child), Some(ProcessState::Dead));
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Running));

        assert_eq!(kernel.wait(child), Ok(WaitStatus::Reaped(child)));
        assert_eq!(kernel.process(child).map(|p| p.pid), None);
        assert_eq!(kernel.process_count(), 1);
        assert_eq!(kernel.frames().free_frames(), free_before);
    }

    #[test]
    fn orphaned_dead_child_is_reaped_by_scheduler() {
        let mut kernel = boot_kernel();
        let free_before = kernel.frames().free_frames();
        let a = fork(&mut kernel);
        kernel.schedule();
        assert_eq!(kernel.current_pid(), a);
        let b = fork(&mut kernel);
        // ring: 1 -> a -> b
        kernel.exit().unwrap();
        assert_eq!(kernel.current_pid(), b);
        assert_eq!(kernel.process(b).unwrap().parent, None);

        kernel.exit().unwrap();
        assert_eq!(kernel.current_pid(), KERNEL_PID);
        // a waits for its parent (the kernel) to reap it; b has no parent.
        kernel.schedule();
        assert_eq!(kernel.process_state(b), None);
        assert_eq!(kernel.process_state(a), Some(ProcessState::Dead));
        assert_eq!(kernel.wait(WAIT_ANY), Ok(WaitStatus::Reaped(a)));
        assert_eq!(kernel.frames().free_frames(), free_before);
    }
}

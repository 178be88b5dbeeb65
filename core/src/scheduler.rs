//! Round-robin scheduling over the ready ring.

use pmos_abi::{Pid, ProcessState, KERNEL_STACK_SIZE};
use pmos_lib::{klog_debug, klog_info, IrqGuard};
use pmos_mm::FrameSource;

use crate::context::build_initial_context;
use crate::kernel::Kernel;
use crate::platform::Platform;
use crate::process::Slot;

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    /// Count a timer tick and preempt every `preempt_ticks` ticks.
    pub fn timer_tick(&mut self) {
        self.ticks += 1;
        if self.ticks % u64::from(self.config.preempt_ticks.max(1)) == 0 {
            self.schedule();
        }
    }

    /// Pick the next runnable process after the current one and switch to
    /// it. Does nothing when no other process can run.
    pub fn schedule(&mut self) {
        let _irq = IrqGuard::new();

        self.reap_dead();

        let Some(next) = self.select_next() else {
            return;
        };
        let prev = self.current;

        let old = &mut self.processes[prev];
        if old.state == ProcessState::Running {
            old.state = ProcessState::Ready;
        }
        self.current = next;
        self.processes[next].state = ProcessState::Running;

        if self.processes[next].is_fresh() {
            self.prepare_first_run(next);
        }

        let (stack_top, space, load) = {
            let new = &self.processes[next];
            (new.stack_top, new.space, new.esp)
        };
        self.platform.set_kernel_stack(stack_top);
        self.activate(space);

        klog_debug!(
            "schedule: pid {} -> pid {}",
            self.processes[prev].pid,
            self.processes[next].pid
        );

        let save: *mut u32 = &mut self.processes[prev].esp;
        // SAFETY: `save` points into the PCB arena, which outlives the
        // switch. `load` is either a stack saved by an earlier switch or one
        // just forged by `prepare_first_run`.
        unsafe {
            self.platform.switch_stacks(save, load);
        }
    }

    /// First runnable process after `current` in ring order.
    fn select_next(&self) -> Option<Slot> {
        self.processes
            .ring(self.current)
            .skip(1)
            .find(|&slot| self.processes[slot].state.is_runnable())
    }

    fn prepare_first_run(&mut self, slot: Slot) {
        let child_entry = self.platform.child_entry();
        let trampoline = self.platform.fork_trampoline();
        let process = &mut self.processes[slot];
        let (Some(seed), Some(stack)) = (process.seed.take(), process.kernel_stack) else {
            return;
        };
        let base = stack.start_address();
        // SAFETY: the kernel stack frame belongs to this process alone and
        // nothing runs on it yet.
        let bytes = unsafe {
            core::slice::from_raw_parts_mut(self.frames.frame_ptr(stack), KERNEL_STACK_SIZE as usize)
        };
        process.esp = build_initial_context(bytes, base, &seed, child_entry, trampoline);
    }

    /// Whether `parent` is a live process that may still call `wait`.
    fn can_be_waited_for(&self, parent: Option<Pid>) -> bool {
        parent
            .and_then(|pid| self.processes.find(pid))
            .is_some_and(|slot| self.processes[slot].is_alive())
    }

    /// Free every dead process that no live parent can reap. The current
    /// process is skipped: its kernel stack is still in use.
    fn reap_dead(&mut self) {
        let mut cursor = self.processes[self.current].next;
        while cursor != self.current {
            let next = self.processes[cursor].next;
            let process = &self.processes[cursor];
            if !process.is_alive() && !self.can_be_waited_for(process.parent) {
                self.release(cursor);
            }
            cursor = next;
        }
    }

    /// Unlink a dead process and give back its kernel stack and directory.
    pub(crate) fn release(&mut self, slot: Slot) -> Option<Pid> {
        self.processes.unlink(slot)?;
        let process = self.processes.remove(slot)?;
        if let Some(stack) = process.kernel_stack {
            self.frames.free(stack);
        }
        if process.space != self.kernel_space {
            process.space.destroy(&mut self.frames);
        }
        klog_debug!("reaped pid {}", process.pid);
        Some(process.pid)
    }

    /// `(pid, state)` for every process, in ring order from the current one.
    pub fn processes(&self) -> impl Iterator<Item = (Pid, ProcessState)> + '_ {
        self.processes
            .ring(self.current)
            .map(|slot| (self.processes[slot].pid, self.processes[slot].state))
    }

    pub fn log_process_table(&self) {
        klog_info!("PID   STATE");
        klog_info!("-----------");
        for (pid, state) in self.processes() {
            klog_info!("{:<5} {}", pid, state.as_str());
        }
    }
}

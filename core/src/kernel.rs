//! The kernel state and its construction.
//!
//! Every piece of mutable kernel state (handler table, syscall table, PCB
//! arena, current process, active page directory) is a field of [`Kernel`].
//! Interrupt entry points reach the single instance through an `IrqCell`.

use pmos_abi::arch::x86::{
    EXCEPTION_PAGE_FAULT, IDT_ENTRIES, IRQ_TIMER_VECTOR, SYSCALL_VECTOR,
};
use pmos_abi::{InterruptFrame, Pid, ProcessResult, ProcessState, KERNEL_PID, SYSCALL_TABLE_SIZE};
use pmos_lib::klog_info;
use pmos_mm::{AddressSpace, FrameSource, PhysFrame};

use crate::config::KernelConfig;
use crate::interrupt::{page_fault_handler, syscall_entry, timer_handler};
use crate::platform::Platform;
use crate::process::{Process, ProcessTable, Slot};
use crate::syscall::{install_process_syscalls, SyscallEntry};

/// Handler for one interrupt vector.
pub type InterruptHandler<P, F> = fn(&mut Kernel<P, F>, &mut InterruptFrame);

pub struct Kernel<P: Platform, F: FrameSource> {
    pub(crate) platform: P,
    pub(crate) frames: F,
    pub(crate) config: KernelConfig,
    pub(crate) handlers: [Option<InterruptHandler<P, F>>; IDT_ENTRIES],
    pub(crate) syscalls: [SyscallEntry<P, F>; SYSCALL_TABLE_SIZE],
    pub(crate) processes: ProcessTable,
    pub(crate) current: Slot,
    pub(crate) kernel_space: AddressSpace,
    pub(crate) active_root: Option<PhysFrame>,
    pub(crate) ticks: u64,
    pub(crate) next_pid: Pid,
}

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    /// Build the kernel template address space, make it active, create the
    /// kernel task on the boot stack and install the core handlers.
    pub fn new(platform: P, mut frames: F, config: KernelConfig, boot_stack_top: u32) -> ProcessResult<Self> {
        let kernel_space = AddressSpace::new_kernel(&mut frames)?;
        let mut processes = ProcessTable::new();
        let current = init_tasking(&mut processes, kernel_space, boot_stack_top)?;

        let mut kernel = Self {
            platform,
            frames,
            config,
            handlers: [None; IDT_ENTRIES],
            syscalls: [SyscallEntry::EMPTY; SYSCALL_TABLE_SIZE],
            processes,
            current,
            kernel_space,
            active_root: None,
            ticks: 0,
            next_pid: KERNEL_PID + 1,
        };

        kernel.activate(kernel_space);
        kernel.platform.set_kernel_stack(boot_stack_top);

        kernel.register_handler(EXCEPTION_PAGE_FAULT, page_fault_handler);
        kernel.register_handler(IRQ_TIMER_VECTOR, timer_handler);
        kernel.register_handler(SYSCALL_VECTOR, syscall_entry);
        install_process_syscalls(&mut kernel);

        klog_info!(
            "kernel: tasking up, pid {} on boot stack 0x{:08x}",
            KERNEL_PID,
            boot_stack_top
        );
        Ok(kernel)
    }

    /// Load `space` into CR3 unless it is already active.
    pub fn activate(&mut self, space: AddressSpace) {
        if self.active_root == Some(space.root()) {
            return;
        }
        self.platform.load_page_directory(space.root());
        self.active_root = Some(space.root());
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    #[inline]
    pub fn frames(&self) -> &F {
        &self.frames
    }

    #[inline]
    pub fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn kernel_space(&self) -> AddressSpace {
        self.kernel_space
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn current_pid(&self) -> Pid {
        self.processes[self.current].pid
    }

    #[inline]
    pub fn current_space(&self) -> AddressSpace {
        self.processes[self.current].space
    }

    pub fn process_state(&self, pid: Pid) -> Option<ProcessState> {
        let slot = self.processes.find(pid)?;
        Some(self.processes[slot].state)
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(self.processes.find(pid)?)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }
}

/// Create the kernel task: pid 1, running, alone in the ring, on the boot
/// stack and the kernel template space.
fn init_tasking(
    processes: &mut ProcessTable,
    space: AddressSpace,
    boot_stack_top: u32,
) -> ProcessResult<Slot> {
    let kernel_task = Process {
        pid: KERNEL_PID,
        state: ProcessState::Running,
        esp: 0,
        kernel_stack: None,
        stack_top: boot_stack_top,
        space,
        next: Slot::FIRST,
        seed: None,
        parent: None,
    };
    let slot = processes.insert(kernel_task)?;
    processes[slot].next = slot;
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{boot_kernel, HostFrames, MockPlatform, BOOT_STACK_TOP};
    use pmos_mm::KERNEL_DIRECTORY_ENTRIES;

    #[test]
    fn boot_state_has_single_running_kernel_task() {
        let kernel = boot_kernel();
        assert_eq!(kernel.process_count(), 1);
        assert_eq!(kernel.current_pid(), KERNEL_PID);
        assert_eq!(kernel.process_state(KERNEL_PID), Some(ProcessState::Running));
        let pcb = kernel.process(KERNEL_PID).unwrap();
        assert_eq!(pcb.stack_top, BOOT_STACK_TOP);
        assert_eq!(pcb.space, kernel.kernel_space());
        assert_eq!(kernel.processes.ring(kernel.current).count(), 1);
    }

    #[test]
    fn new_activates_template_and_sets_kernel_stack() {
        let kernel = Kernel::new(
            MockPlatform::default(),
            HostFrames::new(16),
            KernelConfig::default(),
            BOOT_STACK_TOP,
        )
        .unwrap();
        let root = kernel.kernel_space().root().start_address();
        assert_eq!(kernel.platform().directory_loads(), vec![root]);
        assert_eq!(kernel.platform().last_kernel_stack(), Some(BOOT_STACK_TOP));
        assert_eq!(kernel.frames().free_frames(), 16 - 1 - KERNEL_DIRECTORY_ENTRIES);
    }

    #[test]
    fn activate_skips_reload_of_active_space() {
        let mut kernel = boot_kernel();
        let template = kernel.kernel_space();
        kernel.activate(template);
        assert!(kernel.platform().directory_loads().is_empty());

        let other = AddressSpace::create(kernel.frames_mut(), &template).unwrap();
        kernel.activate(other);
        kernel.activate(other);
        assert_eq!(kernel.platform().directory_loads(), vec![other.root().start_address()]);
    }

    #[test]
    fn boot_fails_cleanly_without_frames() {
        let result = Kernel::new(
            MockPlatform::default(),
            HostFrames::new(1),
            KernelConfig::default(),
            BOOT_STACK_TOP,
        );
        assert!(result.is_err());
    }
}

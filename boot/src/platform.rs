//! The real [`Platform`] and the single kernel instance.

use core::arch::asm;

use pmos_abi::arch::x86::Port;
use pmos_abi::{InterruptFrame, ProcessResult};
use pmos_core::{Kernel, KernelConfig, Platform};
use pmos_drivers::{HardwarePorts, PortIo};
use pmos_lib::{cpu, IrqCell};
use pmos_mm::{BitmapFrameAllocator, PhysFrame};
use spin::Once;

use crate::{gdt, idt, switch};

pub type BootKernel = Kernel<X86Platform, BitmapFrameAllocator>;

/// Reached from the interrupt path only, through `get_mut_unchecked`.
pub static KERNEL: Once<IrqCell<BootKernel>> = Once::new();

pub struct X86Platform {
    ports: HardwarePorts,
    child_entry: u32,
}

impl X86Platform {
    /// # Safety
    /// Only one instance may exist; it owns the PICs, CR3 and the TSS.
    pub unsafe fn new(child_entry: extern "C" fn() -> !) -> Self {
        Self {
            // SAFETY: forwarded from the caller.
            ports: unsafe { HardwarePorts::new() },
            child_entry: child_entry as usize as u32,
        }
    }
}

impl Platform for X86Platform {
    fn outb(&mut self, port: Port, value: u8) {
        self.ports.outb(port, value);
    }

    fn halt(&mut self) -> ! {
        cpu::halt_loop()
    }

    fn fault_address(&self) -> u32 {
        cpu::read_cr2()
    }

    fn load_page_directory(&mut self, root: PhysFrame) {
        // SAFETY: every directory handed out by pmos-mm identity maps the
        // kernel region, which holds this code and all kernel stacks.
        unsafe { cpu::write_cr3(root.start_address()) }
    }

    fn set_kernel_stack(&mut self, esp0: u32) {
        gdt::set_kernel_stack(esp0);
    }

    unsafe fn switch_stacks(&mut self, save: *mut u32, load: u32) {
        // SAFETY: forwarded from the caller.
        unsafe { switch::pmos_switch_stacks(save, load) }
    }

    fn child_entry(&self) -> u32 {
        self.child_entry
    }

    fn fork_trampoline(&self) -> u32 {
        idt::isr_return_address()
    }
}

/// Build the kernel, publish it for the interrupt path and turn paging on.
///
/// # Safety
/// Call once, with interrupts disabled, after `gdt_init` and `idt_init`.
pub unsafe fn install_kernel(
    platform: X86Platform,
    frames: BitmapFrameAllocator,
    config: KernelConfig,
    boot_stack_top: u32,
) -> ProcessResult<&'static IrqCell<BootKernel>> {
    let kernel = Kernel::new(platform, frames, config, boot_stack_top)?;
    let cell = KERNEL.call_once(|| IrqCell::new(kernel));
    // SAFETY: CR3 now holds the kernel template, which identity maps the
    // running image.
    unsafe { cpu::enable_paging() };
    Ok(cell)
}

/// Issue `int 0x80` with `number` in `eax` and `arg` in `ebx`.
pub fn syscall(number: u32, arg: u32) -> u32 {
    let mut result = number;
    // ebx may be reserved by the compiler, so it is swapped in and out.
    // SAFETY: the gate at 0x80 is installed by `idt_init`.
    unsafe {
        asm!(
            "xchg ebx, {arg}",
            "int 0x80",
            "xchg ebx, {arg}",
            arg = inout(reg) arg => _,
            inout("eax") result,
        );
    }
    result
}

/// Leave ring 0 for good: unwind `frame` through the interrupt epilogue.
pub fn enter_user_mode(frame: InterruptFrame) -> ! {
    // SAFETY: `frame` lives on this stack, which is abandoned by the `iretd`.
    unsafe {
        asm!(
            "mov esp, {frame}",
            "jmp isr_return",
            frame = in(reg) &frame,
            options(noreturn),
        );
    }
}

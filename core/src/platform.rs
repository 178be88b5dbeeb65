//! Hardware operations the kernel core depends on.
//!
//! The boot crate provides the real implementation; unit tests use a
//! recording mock. Everything the scheduler and dispatcher do to the machine
//! goes through this trait.

use pmos_abi::arch::x86::Port;
use pmos_mm::PhysFrame;

pub trait Platform {
    fn outb(&mut self, port: Port, value: u8);

    /// Stop the CPU for good. Used on fatal exceptions.
    fn halt(&mut self) -> !;

    /// Linear address of the last page fault (CR2).
    fn fault_address(&self) -> u32;

    /// Make `root` the active page directory (CR3).
    fn load_page_directory(&mut self, root: PhysFrame);

    /// Ring 0 stack used on the next ring 3 to ring 0 transition (TSS esp0).
    fn set_kernel_stack(&mut self, esp0: u32);

    /// Push the general registers and a return address on the current stack,
    /// store the stack pointer at `save`, switch to `load`, then pop the
    /// registers and return from the stack found there.
    ///
    /// # Safety
    /// `save` must be valid for a write and `load` must point at a stack laid
    /// out by a previous switch or by
    /// [`build_initial_context`](crate::context::build_initial_context).
    unsafe fn switch_stacks(&mut self, save: *mut u32, load: u32);

    /// Address a forked child starts executing at.
    fn child_entry(&self) -> u32;

    /// Address of the routine that unwinds a first-run stack through the
    /// common interrupt epilogue.
    fn fork_trampoline(&self) -> u32;
}

//! Low-level kernel support shared by every PMOS crate.
//!
//! The `cpu` and `io` modules wrap the privileged instructions the kernel
//! needs. On a 32-bit x86 target they are inline assembly; on any other
//! architecture (host unit tests) they operate on a small emulated CPU state so
//! code built on top of them stays testable.

#![cfg_attr(not(test), no_std)]

pub mod cpu {
    #[cfg(target_arch = "x86")]
    use core::arch::asm;

    use x86_64::registers::rflags::RFlags;

    /// Interrupt flag bit of EFLAGS.
    pub const FLAGS_IF: u32 = RFlags::INTERRUPT_FLAG.bits() as u32;

    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub fn hlt() {
        unsafe {
            asm!("hlt", options(nomem, nostack, preserves_flags));
        }
    }

    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub fn enable_interrupts() {
        unsafe {
            asm!("sti", options(nomem, nostack));
        }
    }

    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub fn disable_interrupts() {
        unsafe {
            asm!("cli", options(nomem, nostack));
        }
    }

    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub fn read_flags() -> u32 {
        let flags: u32;
        unsafe {
            asm!("pushfd", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        flags
    }

    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub fn read_cr2() -> u32 {
        let value: u32;
        unsafe {
            asm!("mov {}, cr2", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    /// # Safety
    /// `root` must be the physical address of a valid page directory that maps
    /// the currently executing code and stack.
    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub unsafe fn write_cr3(root: u32) {
        unsafe {
            asm!("mov cr3, {}", in(reg) root, options(nostack, preserves_flags));
        }
    }

    /// Set CR0.PG (and CR0.WP so ring 0 honours read-only pages).
    ///
    /// # Safety
    /// CR3 must already hold a directory that identity maps the running kernel.
    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub unsafe fn enable_paging() {
        unsafe {
            asm!(
                "mov {tmp}, cr0",
                "or {tmp}, 0x80010000",
                "mov cr0, {tmp}",
                tmp = out(reg) _,
                options(nostack, preserves_flags)
            );
        }
    }

    // Emulated CPU state for non-x86 builds (host unit tests).
    #[cfg(not(target_arch = "x86"))]
    mod emulated {
        use core::sync::atomic::{AtomicU32, Ordering};

        pub(super) static FLAGS: AtomicU32 = AtomicU32::new(0x2);
        pub(super) static CR3: AtomicU32 = AtomicU32::new(0);

        pub(super) fn set_if(on: bool) {
            if on {
                FLAGS.fetch_or(super::FLAGS_IF, Ordering::SeqCst);
            } else {
                FLAGS.fetch_and(!super::FLAGS_IF, Ordering::SeqCst);
            }
        }
    }

    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub fn hlt() {
        core::hint::spin_loop();
    }

    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub fn enable_interrupts() {
        emulated::set_if(true);
    }

    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub fn disable_interrupts() {
        emulated::set_if(false);
    }

    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub fn read_flags() -> u32 {
        emulated::FLAGS.load(core::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub fn read_cr2() -> u32 {
        0
    }

    /// # Safety
    /// Always safe off-target; kept `unsafe` to match the x86 signature.
    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub unsafe fn write_cr3(root: u32) {
        emulated::CR3.store(root, core::sync::atomic::Ordering::SeqCst);
    }

    /// # Safety
    /// Always safe off-target; kept `unsafe` to match the x86 signature.
    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub unsafe fn enable_paging() {}

    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        read_flags() & FLAGS_IF != 0
    }

    /// Disable interrupts and return the flags as they were before.
    #[inline(always)]
    pub fn save_flags_cli() -> u32 {
        let flags = read_flags();
        disable_interrupts();
        flags
    }

    /// Re-enable interrupts if they were enabled in `flags`.
    #[inline(always)]
    pub fn restore_flags(flags: u32) {
        if flags & FLAGS_IF != 0 {
            enable_interrupts();
        }
    }

    #[inline(always)]
    pub fn halt_loop() -> ! {
        loop {
            disable_interrupts();
            hlt();
        }
    }

    /// Idle until the next interrupt, forever.
    #[inline(always)]
    pub fn idle_loop() -> ! {
        loop {
            enable_interrupts();
            hlt();
        }
    }
}

pub mod io {
    #[cfg(target_arch = "x86")]
    use core::arch::asm;

    use pmos_abi::arch::x86::Port;

    /// # Safety
    /// Port I/O can have arbitrary side effects on hardware state.
    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub unsafe fn outb(port: Port, value: u8) {
        unsafe {
            asm!(
                "out dx, al",
                in("dx") port.number(),
                in("al") value,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    /// # Safety
    /// Port I/O can have arbitrary side effects on hardware state.
    #[cfg(target_arch = "x86")]
    #[inline(always)]
    pub unsafe fn inb(port: Port) -> u8 {
        let value: u8;
        unsafe {
            asm!(
                "in al, dx",
                out("al") value,
                in("dx") port.number(),
                options(nomem, nostack, preserves_flags)
            );
        }
        value
    }

    /// # Safety
    /// Always safe off-target; kept `unsafe` to match the x86 signature.
    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub unsafe fn outb(_port: Port, _value: u8) {}

    /// Reads float high when there is no device behind the port.
    ///
    /// # Safety
    /// Always safe off-target; kept `unsafe` to match the x86 signature.
    #[cfg(not(target_arch = "x86"))]
    #[inline]
    pub unsafe fn inb(_port: Port) -> u8 {
        0xFF
    }

    /// # Safety
    /// Writes to the POST diagnostic port.
    #[inline(always)]
    pub unsafe fn io_wait() {
        unsafe {
            outb(Port::POST_DELAY, 0);
        }
    }
}

pub mod irq_cell;
pub mod klog;
pub mod preempt;

pub use irq_cell::IrqCell;
pub use klog::{
    klog_attach_sink, klog_get_level, klog_init, klog_is_enabled, klog_set_level, KlogLevel,
};
pub use preempt::{without_interrupts, IrqGuard};

#[inline(always)]
pub const fn align_up_u32(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

#[inline(always)]
pub const fn align_down_u32(value: u32, align: u32) -> u32 {
    value & !(align - 1)
}

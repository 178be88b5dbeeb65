#![no_std]
#![no_main]
#![forbid(unsafe_op_in_unsafe_fn)]

use core::panic::PanicInfo;

use pmos_abi::{SYSCALL_FAILED, SYS_EXIT, SYS_FORK, SYS_WAIT};
use pmos_boot::{
    enter_user_mode, entry, gdt, idt, install_kernel, syscall, MultibootInfo, X86Platform,
    KERNEL, MULTIBOOT_BOOTLOADER_MAGIC,
};
use pmos_core::KernelConfig;
use pmos_drivers::{pic, pit, serial, serial_println, HardwarePorts};
use pmos_lib::{cpu, klog_attach_sink, klog_error, klog_info, klog_init, klog_warn};
use pmos_mm::BitmapFrameAllocator;

/// `jmp $`: spins in ring 3 until the timer takes the CPU away.
static USER_IMAGE: [u8; 2] = [0xEB, 0xFE];

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    klog_error!("Kernel panic: {}", info);
    cpu::halt_loop();
}

fn current_pid() -> u32 {
    KERNEL.get().map_or(0, |kernel| kernel.with(|k| k.current_pid()))
}

/// Where a forked child starts, in ring 0 on its own kernel stack.
extern "C" fn child_entry() -> ! {
    klog_info!("child: pid {} running", current_pid());
    syscall(SYS_EXIT as u32, 0);
    klog_error!("child: exit returned");
    cpu::halt_loop();
}

fn fork_demo() {
    let child = syscall(SYS_FORK as u32, 0);
    if child == SYSCALL_FAILED {
        klog_warn!("demo: fork failed");
        return;
    }
    klog_info!("demo: pid {} forked pid {}", current_pid(), child);
    let reaped = syscall(SYS_WAIT as u32, child);
    klog_info!("demo: reaped pid {}", reaped);
}

#[unsafe(no_mangle)]
pub extern "C" fn kernel_main(magic: u32, info: *const MultibootInfo) -> ! {
    serial::init();
    serial_println!("PMOS booting");

    let cmdline = if magic == MULTIBOOT_BOOTLOADER_MAGIC && !info.is_null() {
        // SAFETY: the loader hands over a valid info structure with the magic.
        let info = unsafe { &*info };
        info.cmdline()
    } else {
        None
    };
    let config = KernelConfig::from_cmdline(cmdline.unwrap_or(""));

    klog_init(config.log_level);
    klog_attach_sink(serial::klog_sink);
    if magic != MULTIBOOT_BOOTLOADER_MAGIC {
        klog_warn!("boot: unexpected loader magic 0x{:08x}", magic);
    }

    let stack_top = entry::boot_stack_top_address();
    gdt::gdt_init(stack_top);
    idt::idt_init();

    // SAFETY: the boot CPU owns the PICs and the PIT; interrupts are off.
    let mut ports = unsafe { HardwarePorts::new() };
    pic::remap(&mut ports);
    let timer_hz = pit::init(&mut ports, config.timer_hz);

    // SAFETY: single instance, created once.
    let platform = unsafe { X86Platform::new(child_entry) };
    // SAFETY: the frame pool is free physical memory below the kernel split.
    let frames = unsafe { BitmapFrameAllocator::identity_pool() };
    klog_info!("mm: {} frames in pool", frames.total_frames());
    // SAFETY: descriptor tables are loaded and interrupts are still off.
    let kernel = match unsafe { install_kernel(platform, frames, config, stack_top) } {
        Ok(kernel) => kernel,
        Err(err) => {
            klog_error!("boot: kernel setup failed: {}", err);
            cpu::halt_loop();
        }
    };

    cpu::enable_interrupts();
    klog_info!("boot: interrupts on, timer at {} Hz", timer_hz);

    if config.fork_demo {
        fork_demo();
    }
    kernel.with(|k| k.log_process_table());

    let entry = match kernel.with(|k| k.load_user_image(&USER_IMAGE)) {
        Ok(frame) => frame,
        Err(err) => {
            klog_error!("boot: cannot load user image: {}", err);
            cpu::idle_loop();
        }
    };
    cpu::disable_interrupts();
    enter_user_mode(entry)
}

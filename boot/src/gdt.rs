//! Flat GDT with ring 0 and ring 3 segments and one 32-bit TSS.

use core::arch::asm;
use core::mem::size_of;

use pmos_abi::arch::x86::{
    descriptor, SegmentSelector, GDT_ACCESS_KERNEL_CODE, GDT_ACCESS_KERNEL_DATA, GDT_ACCESS_TSS,
    GDT_ACCESS_USER_CODE, GDT_ACCESS_USER_DATA, GDT_ENTRIES, GDT_FLAGS_32BIT,
};
use pmos_lib::klog_debug;

const FLAT_LIMIT: u32 = 0xFFFFF;

/// Hardware task-state segment. Only `ss0`/`esp0` are used, for the stack
/// switch on ring 3 to ring 0 transitions.
#[repr(C)]
struct Tss32 {
    link: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

const _: () = assert!(size_of::<Tss32>() == 104);

#[repr(C, packed)]
struct GdtDescriptor {
    limit: u16,
    base: u32,
}

static mut GDT_TABLE: [u64; GDT_ENTRIES] = [0; GDT_ENTRIES];

static mut KERNEL_TSS: Tss32 = Tss32 {
    link: 0,
    esp0: 0,
    ss0: 0,
    esp1: 0,
    ss1: 0,
    esp2: 0,
    ss2: 0,
    cr3: 0,
    eip: 0,
    eflags: 0,
    eax: 0,
    ecx: 0,
    edx: 0,
    ebx: 0,
    esp: 0,
    ebp: 0,
    esi: 0,
    edi: 0,
    es: 0,
    cs: 0,
    ss: 0,
    ds: 0,
    fs: 0,
    gs: 0,
    ldt: 0,
    trap: 0,
    iomap_base: 0,
};

unsafe fn load_gdt(descriptor: &GdtDescriptor) {
    unsafe { asm!("lgdt [{0}]", in(reg) descriptor, options(nostack, preserves_flags)) };

    unsafe {
        asm!(
            "push {code}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov {tmp:x}, {data}",
            "mov ds, {tmp:x}",
            "mov es, {tmp:x}",
            "mov fs, {tmp:x}",
            "mov gs, {tmp:x}",
            "mov ss, {tmp:x}",
            code = const SegmentSelector::KERNEL_CODE.bits() as u32,
            data = const SegmentSelector::KERNEL_DATA.bits() as u32,
            tmp = out(reg) _,
        );
    }
}

unsafe fn load_tss() {
    let selector = SegmentSelector::TSS.bits();
    unsafe { asm!("ltr {0:x}", in(reg) selector, options(nostack, preserves_flags)) };
}

/// Build and load the GDT and the TSS. `kernel_stack_top` becomes the
/// initial `esp0`.
pub fn gdt_init(kernel_stack_top: u32) {
    klog_debug!("GDT: initializing descriptor tables");

    let tss = &raw mut KERNEL_TSS;
    let tss_base = tss as u32;
    let tss_limit = size_of::<Tss32>() as u32 - 1;

    // SAFETY: runs once on the boot CPU before interrupts are enabled;
    // nothing else touches the tables yet.
    unsafe {
        (*tss).ss0 = SegmentSelector::KERNEL_DATA.bits() as u32;
        (*tss).esp0 = kernel_stack_top;
        (*tss).iomap_base = size_of::<Tss32>() as u16;

        let gdt = &raw mut GDT_TABLE;
        *gdt = [
            0,
            descriptor(0, FLAT_LIMIT, GDT_ACCESS_KERNEL_CODE, GDT_FLAGS_32BIT),
            descriptor(0, FLAT_LIMIT, GDT_ACCESS_KERNEL_DATA, GDT_FLAGS_32BIT),
            descriptor(0, FLAT_LIMIT, GDT_ACCESS_USER_CODE, GDT_FLAGS_32BIT),
            descriptor(0, FLAT_LIMIT, GDT_ACCESS_USER_DATA, GDT_FLAGS_32BIT),
            descriptor(tss_base, tss_limit, GDT_ACCESS_TSS, 0),
        ];

        let pointer = GdtDescriptor {
            limit: (size_of::<[u64; GDT_ENTRIES]>() - 1) as u16,
            base: gdt as u32,
        };
        load_gdt(&pointer);
        load_tss();
    }

    klog_debug!("GDT: loaded, TSS at 0x{:08x}", tss_base);
}

/// Stack the CPU switches to when an interrupt arrives in ring 3.
pub fn set_kernel_stack(esp0: u32) {
    // SAFETY: single aligned word store; the CPU only reads it on a
    // privilege change, which cannot happen while the kernel runs.
    unsafe {
        (&raw mut KERNEL_TSS.esp0).write_volatile(esp0);
    }
}

//! IDT with one entry stub per vector.
//!
//! Every stub normalises the stack to an [`InterruptFrame`] (dummy error code
//! where the CPU pushes none, then the vector) and jumps to the common path,
//! which saves the general registers and `ds`, loads kernel data segments and
//! calls [`pmos_interrupt_dispatch`]. `isr_return` is the shared epilogue; a
//! forked child's first run enters it through the fork trampoline.

use core::arch::{asm, global_asm};
use core::mem::size_of;

use pmos_abi::arch::x86::{
    pushes_error_code, SegmentSelector, IDT_ENTRIES, IDT_GATE_DPL_SHIFT, IDT_GATE_INTERRUPT,
    SYSCALL_VECTOR,
};
use pmos_abi::InterruptFrame;
use pmos_lib::{cpu, klog_debug, klog_error};

use crate::platform::KERNEL;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const MISSING: Self = Self {
        offset_low: 0,
        selector: 0,
        zero: 0,
        type_attr: 0,
        offset_high: 0,
    };

    fn gate(handler: u32, dpl: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: SegmentSelector::KERNEL_CODE.bits(),
            zero: 0,
            type_attr: IDT_GATE_INTERRUPT | (dpl << IDT_GATE_DPL_SHIFT),
            offset_high: (handler >> 16) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPtr {
    limit: u16,
    base: u32,
}

static mut IDT: [IdtEntry; IDT_ENTRIES] = [IdtEntry::MISSING; IDT_ENTRIES];

global_asm!(
    ".section .text.isr, \"ax\"",
    ".global isr_common",
    "isr_common:",
    "    pushad",
    "    cld",
    "    xor eax, eax",
    "    mov ax, ds",
    "    push eax",
    "    mov ax, {kernel_data}",
    "    mov ds, ax",
    "    mov es, ax",
    "    mov fs, ax",
    "    mov gs, ax",
    "    push esp",
    "    call pmos_interrupt_dispatch",
    "    add esp, 4",
    ".global isr_return",
    "isr_return:",
    "    pop eax",
    "    mov ds, ax",
    "    mov es, ax",
    "    mov fs, ax",
    "    mov gs, ax",
    "    popad",
    "    add esp, 8",
    "    iretd",
    kernel_data = const SegmentSelector::KERNEL_DATA.bits() as u32,
);

macro_rules! isr_stubs {
    ($($vector:literal)*) => {
        paste::paste! {
            $(
                global_asm!(
                    ".section .text.isr, \"ax\"",
                    concat!(".global isr_stub_", stringify!($vector)),
                    concat!("isr_stub_", stringify!($vector), ":"),
                    ".if {has_error_code} == 0",
                    "    push 0",
                    ".endif",
                    "    push {vector}",
                    "    jmp isr_common",
                    has_error_code = const pushes_error_code($vector) as u32,
                    vector = const $vector as u32,
                );
            )*

            unsafe extern "C" {
                $(fn [<isr_stub_ $vector>]();)*
            }

            /// Entry stub address for every vector.
            fn stub_table() -> [u32; IDT_ENTRIES] {
                [$([<isr_stub_ $vector>] as usize as u32),*]
            }
        }
    };
}

isr_stubs! {
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
    48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
    64 65 66 67 68 69 70 71 72 73 74 75 76 77 78 79
    80 81 82 83 84 85 86 87 88 89 90 91 92 93 94 95
    96 97 98 99 100 101 102 103 104 105 106 107 108 109 110 111
    112 113 114 115 116 117 118 119 120 121 122 123 124 125 126 127
    128 129 130 131 132 133 134 135 136 137 138 139 140 141 142 143
    144 145 146 147 148 149 150 151 152 153 154 155 156 157 158 159
    160 161 162 163 164 165 166 167 168 169 170 171 172 173 174 175
    176 177 178 179 180 181 182 183 184 185 186 187 188 189 190 191
    192 193 194 195 196 197 198 199 200 201 202 203 204 205 206 207
    208 209 210 211 212 213 214 215 216 217 218 219 220 221 222 223
    224 225 226 227 228 229 230 231 232 233 234 235 236 237 238 239
    240 241 242 243 244 245 246 247 248 249 250 251 252 253 254 255
}

unsafe extern "C" {
    fn isr_return();
}

/// Address of the shared epilogue.
pub fn isr_return_address() -> u32 {
    isr_return as usize as u32
}

/// Fill the IDT with interrupt gates for all 256 stubs and load it. Only
/// the syscall gate is reachable from ring 3.
pub fn idt_init() {
    let stubs = stub_table();
    let idt = &raw mut IDT;

    // SAFETY: runs once on the boot CPU with interrupts disabled.
    unsafe {
        for (vector, &stub) in stubs.iter().enumerate() {
            let dpl = if vector == SYSCALL_VECTOR as usize { 3 } else { 0 };
            (*idt)[vector] = IdtEntry::gate(stub, dpl);
        }

        let pointer = IdtPtr {
            limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
            base: idt as u32,
        };
        asm!("lidt [{0}]", in(reg) &pointer, options(nostack, preserves_flags));
    }

    klog_debug!("IDT: {} gates loaded, syscall gate 0x{:02x}", IDT_ENTRIES, SYSCALL_VECTOR);
}

/// Called by `isr_common` with interrupts disabled (every gate is an
/// interrupt gate).
#[unsafe(no_mangle)]
extern "C" fn pmos_interrupt_dispatch(frame: *mut InterruptFrame) {
    // SAFETY: `frame` points at the frame the stub just built on this stack.
    let frame = unsafe { &mut *frame };

    let Some(kernel) = KERNEL.get() else {
        klog_error!(
            "interrupt 0x{:02x} before kernel init, eip=0x{:08x}",
            frame.vector(),
            frame.eip
        );
        cpu::halt_loop();
    };

    // SAFETY: interrupts are off for the whole handler and the interrupted
    // code held no reference it could still use.
    let kernel = unsafe { kernel.get_mut_unchecked() };
    kernel.dispatch(frame);
}

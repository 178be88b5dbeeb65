//! Interrupt vector numbers and IDT gate attributes.

pub const IDT_ENTRIES: usize = 256;

/// First vector of the remapped primary 8259 (IRQ0).
pub const IRQ_BASE_VECTOR: u8 = 0x20;
/// First vector of the remapped secondary 8259 (IRQ8).
pub const IRQ_SECONDARY_BASE_VECTOR: u8 = 0x28;
/// Last legacy IRQ vector (IRQ15).
pub const IRQ_LAST_VECTOR: u8 = 0x2F;
/// Number of CPU exception vectors.
pub const EXCEPTION_VECTORS: u8 = 32;

/// Syscall interrupt vector (int 0x80).
pub const SYSCALL_VECTOR: u8 = 0x80;
/// Length of the `int imm8` instruction used to enter a syscall.
pub const SYSCALL_INSN_LEN: u32 = 2;

pub const IRQ_TIMER_VECTOR: u8 = IRQ_BASE_VECTOR;

/// 32-bit interrupt gate, present, DPL 0.
pub const IDT_GATE_INTERRUPT: u8 = 0x8E;
/// DPL field position inside the gate attribute byte.
pub const IDT_GATE_DPL_SHIFT: u8 = 5;

pub const EXCEPTION_DIVIDE_ERROR: u8 = 0;
pub const EXCEPTION_DEBUG: u8 = 1;
pub const EXCEPTION_NMI: u8 = 2;
pub const EXCEPTION_BREAKPOINT: u8 = 3;
pub const EXCEPTION_OVERFLOW: u8 = 4;
pub const EXCEPTION_BOUND_RANGE: u8 = 5;
pub const EXCEPTION_INVALID_OPCODE: u8 = 6;
pub const EXCEPTION_DEVICE_NOT_AVAIL: u8 = 7;
pub const EXCEPTION_DOUBLE_FAULT: u8 = 8;
pub const EXCEPTION_INVALID_TSS: u8 = 10;
pub const EXCEPTION_SEGMENT_NOT_PRES: u8 = 11;
pub const EXCEPTION_STACK_FAULT: u8 = 12;
pub const EXCEPTION_GENERAL_PROTECTION: u8 = 13;
pub const EXCEPTION_PAGE_FAULT: u8 = 14;
pub const EXCEPTION_FPU_ERROR: u8 = 16;
pub const EXCEPTION_ALIGNMENT_CHECK: u8 = 17;
pub const EXCEPTION_MACHINE_CHECK: u8 = 18;
pub const EXCEPTION_SIMD_FP_EXCEPTION: u8 = 19;
pub const EXCEPTION_CONTROL_PROTECTION: u8 = 21;
pub const EXCEPTION_VMM_COMMUNICATION: u8 = 29;
pub const EXCEPTION_SECURITY: u8 = 30;

/// Whether the CPU pushes an error code before entering the handler.
#[inline]
pub const fn pushes_error_code(vector: u8) -> bool {
    matches!(
        vector,
        EXCEPTION_DOUBLE_FAULT
            | EXCEPTION_INVALID_TSS
            | EXCEPTION_SEGMENT_NOT_PRES
            | EXCEPTION_STACK_FAULT
            | EXCEPTION_GENERAL_PROTECTION
            | EXCEPTION_PAGE_FAULT
            | EXCEPTION_ALIGNMENT_CHECK
            | EXCEPTION_CONTROL_PROTECTION
            | EXCEPTION_VMM_COMMUNICATION
            | EXCEPTION_SECURITY
    )
}

#[inline]
pub const fn is_exception(vector: u8) -> bool {
    vector < EXCEPTION_VECTORS
}

#[inline]
pub const fn is_legacy_irq(vector: u8) -> bool {
    vector >= IRQ_BASE_VECTOR && vector <= IRQ_LAST_VECTOR
}

pub fn exception_name(vector: u8) -> &'static str {
    match vector {
        0 => "Divide Error",
        1 => "Debug",
        2 => "Non-Maskable Interrupt",
        3 => "Breakpoint",
        4 => "Overflow",
        5 => "Bound Range Exceeded",
        6 => "Invalid Opcode",
        7 => "Device Not Available",
        8 => "Double Fault",
        10 => "Invalid TSS",
        11 => "Segment Not Present",
        12 => "Stack Segment Fault",
        13 => "General Protection Fault",
        14 => "Page Fault",
        16 => "x87 FPU Error",
        17 => "Alignment Check",
        18 => "Machine Check",
        19 => "SIMD Floating-Point Exception",
        21 => "Control Protection",
        29 => "VMM Communication",
        30 => "Security Exception",
        _ => "Unknown",
    }
}

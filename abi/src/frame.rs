//! Saved register state shared by the interrupt entry stubs and the kernel.
//!
//! The stubs build this frame on the current kernel stack; the dispatcher
//! receives a pointer to it; the common epilogue pops it back into the CPU
//! and `iret`s. Field order is therefore an ABI contract with the assembly
//! in the boot crate and with the first-run stacks built by the scheduler.

use core::mem::{offset_of, size_of};

use crate::arch::x86::SegmentSelector;

/// Interrupt flag in EFLAGS.
pub const EFLAGS_IF: u32 = 1 << 9;
/// Bit 1 of EFLAGS always reads as one.
pub const EFLAGS_RESERVED: u32 = 1 << 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptFrame {
    pub ds: u32,
    // pusha image, lowest address first
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    // pushed by the CPU
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    /// Only valid when the interrupt arrived from ring 3.
    pub user_esp: u32,
    /// Only valid when the interrupt arrived from ring 3.
    pub user_ss: u32,
}

/// Bytes of the `pusha` image (edi through eax).
pub const PUSHA_LEN: usize = 8 * size_of::<u32>();
/// Full frame size, including the ring 3 stack fields.
pub const FRAME_LEN: usize = size_of::<InterruptFrame>();
/// Frame size for an interrupt taken in ring 0 (no stack switch).
pub const KERNEL_FRAME_LEN: usize = FRAME_LEN - 2 * size_of::<u32>();

pub const FRAME_OFF_PUSHA: usize = offset_of!(InterruptFrame, edi);
pub const FRAME_OFF_EAX: usize = offset_of!(InterruptFrame, eax);
pub const FRAME_OFF_VECTOR: usize = offset_of!(InterruptFrame, vector);
pub const FRAME_OFF_EIP: usize = offset_of!(InterruptFrame, eip);

impl InterruptFrame {
    pub const fn zero() -> Self {
        Self {
            ds: 0,
            edi: 0,
            esi: 0,
            ebp: 0,
            esp: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0,
            vector: 0,
            error_code: 0,
            eip: 0,
            cs: 0,
            eflags: 0,
            user_esp: 0,
            user_ss: 0,
        }
    }

    /// Register state for the first `iret` into a ring 3 program.
    pub const fn user_entry(entry: u32, stack_top: u32) -> Self {
        let mut frame = Self::zero();
        frame.ds = SegmentSelector::USER_DATA.bits() as u32;
        frame.eip = entry;
        frame.cs = SegmentSelector::USER_CODE.bits() as u32;
        frame.eflags = EFLAGS_IF | EFLAGS_RESERVED;
        frame.user_esp = stack_top;
        frame.user_ss = SegmentSelector::USER_DATA.bits() as u32;
        frame
    }

    #[inline]
    pub fn vector(&self) -> u8 {
        (self.vector & 0xFF) as u8
    }

    /// True when the interrupted code ran in ring 3.
    #[inline]
    pub fn from_user(&self) -> bool {
        (self.cs & 0x3) == 0x3
    }

    /// Syscall arguments, by convention in `ebx`, `ecx`, `edx`.
    #[inline]
    pub fn syscall_args(&self) -> [u32; 3] {
        [self.ebx, self.ecx, self.edx]
    }

    /// Store a syscall result in the return-value register.
    #[inline]
    pub fn set_return(&mut self, value: u32) {
        self.eax = value;
    }

    /// The eight general-purpose registers in `pusha` order.
    pub fn pusha_image(&self) -> [u32; 8] {
        [
            self.edi, self.esi, self.ebp, self.esp, self.ebx, self.edx, self.ecx, self.eax,
        ]
    }

    /// Serialize to the in-memory little-endian layout the stubs use.
    pub fn to_words(&self) -> [u32; FRAME_LEN / 4] {
        [
            self.ds,
            self.edi,
            self.esi,
            self.ebp,
            self.esp,
            self.ebx,
            self.edx,
            self.ecx,
            self.eax,
            self.vector,
            self.error_code,
            self.eip,
            self.cs,
            self.eflags,
            self.user_esp,
            self.user_ss,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_entry_stub() {
        assert_eq!(FRAME_LEN, 64);
        assert_eq!(KERNEL_FRAME_LEN, 56);
        assert_eq!(FRAME_OFF_PUSHA, 4);
        assert_eq!(FRAME_OFF_EAX, 32);
        assert_eq!(FRAME_OFF_VECTOR, 36);
        assert_eq!(FRAME_OFF_EIP, 44);
        assert_eq!(PUSHA_LEN, 32);
    }

    #[test]
    fn user_entry_frame() {
        let frame = InterruptFrame::user_entry(0x0804_8000, 0xC000_0000);
        assert_eq!(frame.cs, 0x1B);
        assert_eq!(frame.user_ss, 0x23);
        assert_eq!(frame.ds, 0x23);
        assert!(frame.from_user());
        assert_eq!(frame.eflags & EFLAGS_IF, EFLAGS_IF);
        assert_eq!(frame.eip, 0x0804_8000);
        assert_eq!(frame.user_esp, 0xC000_0000);
    }

    #[test]
    fn words_follow_field_order() {
        let mut frame = InterruptFrame::zero();
        frame.ds = 0x10;
        frame.eax = 7;
        frame.eip = 0x1234;
        let words = frame.to_words();
        assert_eq!(words[0], 0x10);
        assert_eq!(words[FRAME_OFF_EAX / 4], 7);
        assert_eq!(words[FRAME_OFF_EIP / 4], 0x1234);
    }
}

//! First-run stacks for forked processes.
//!
//! A suspended process's kernel stack ends with what the switch primitive
//! left there: the `pusha` image and, above it, the return address into the
//! code that called the switch. A process that has never run gets a stack
//! forged to look the same, except that the return address leads to the fork
//! trampoline, which unwinds the seed frame through the common interrupt
//! epilogue (`pop ds`, `popa`, drop vector and error code, `iret`).

use pmos_abi::arch::x86::SegmentSelector;
use pmos_abi::frame::{EFLAGS_IF, EFLAGS_RESERVED, FRAME_LEN, PUSHA_LEN};
use pmos_abi::InterruptFrame;

/// Bytes consumed at the top of a first-run stack.
pub const INITIAL_CONTEXT_LEN: usize = FRAME_LEN + 4 + PUSHA_LEN;

fn write_u32(stack: &mut [u8], offset: usize, value: u32) {
    stack[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Register state the child resumes with: the parent's registers at the
/// time of `fork`, entered at `child_entry` in ring 0 with `eax` = 0.
pub fn child_frame(seed: &InterruptFrame, child_entry: u32) -> InterruptFrame {
    let mut frame = *seed;
    frame.eip = child_entry;
    frame.eax = 0;
    frame.cs = SegmentSelector::KERNEL_CODE.bits() as u32;
    frame.ds = SegmentSelector::KERNEL_DATA.bits() as u32;
    frame.eflags |= EFLAGS_IF | EFLAGS_RESERVED;
    frame
}

/// Forge a first-run stack in `stack`, whose first byte sits at address
/// `stack_base`. Returns the stack pointer to hand to the switch primitive.
///
/// From the top of the stack downwards:
///
/// 1. the child frame (see [`child_frame`]), `FRAME_LEN` bytes, laid out
///    exactly as an entry stub would have pushed it;
/// 2. `trampoline`, consumed by the `ret` at the end of the switch;
/// 3. the frame's `pusha` image, consumed by the switch's `popa`.
///
/// The returned pointer addresses item 3.
pub fn build_initial_context(
    stack: &mut [u8],
    stack_base: u32,
    seed: &InterruptFrame,
    child_entry: u32,
    trampoline: u32,
) -> u32 {
    debug_assert!(stack.len() >= INITIAL_CONTEXT_LEN);
    let frame = child_frame(seed, child_entry);

    let frame_off = stack.len() - FRAME_LEN;
    for (i, word) in frame.to_words().iter().enumerate() {
        write_u32(stack, frame_off + i * 4, *word);
    }

    let ret_off = frame_off - 4;
    write_u32(stack, ret_off, trampoline);

    let pusha_off = ret_off - PUSHA_LEN;
    for (i, reg) in frame.pusha_image().iter().enumerate() {
        write_u32(stack, pusha_off + i * 4, *reg);
    }

    stack_base + pusha_off as u32
}

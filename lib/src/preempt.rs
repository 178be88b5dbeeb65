//! Interrupt-disable critical sections.
//!
//! The kernel runs on one CPU, so masking interrupts is the only thing needed
//! to keep the timer handler from re-entering the scheduler while kernel
//! state is being updated. Guards nest: only the outermost one re-enables.

use core::marker::PhantomData;

use crate::cpu;

/// RAII guard that disables interrupts while held and restores the previous
/// interrupt flag on drop.
/// !Send/!Sync: the saved flags belong to the context that took the guard.
#[must_use = "if unused, interrupts will be immediately restored"]
pub struct IrqGuard {
    saved_flags: u32,
    _marker: PhantomData<*mut ()>,
}

impl IrqGuard {
    #[inline]
    pub fn new() -> Self {
        let saved_flags = cpu::save_flags_cli();
        Self {
            saved_flags,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn saved_flags(&self) -> u32 {
        self.saved_flags
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    #[inline]
    fn drop(&mut self) {
        cpu::restore_flags(self.saved_flags);
    }
}

/// Run `f` with interrupts disabled.
#[inline]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let _guard = IrqGuard::new();
    f()
}

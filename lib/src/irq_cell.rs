//! The cell that holds kernel state shared with interrupt handlers.

use core::cell::UnsafeCell;

use crate::preempt::IrqGuard;

/// Interrupt-masked cell without a lock word.
///
/// Holds state that a context switch may leave "borrowed" across stacks: the
/// scheduler runs inside `with` and resumes another task whose own `with`
/// call is still on its stack. A lock would stay held forever in that case;
/// masking interrupts is enough on one CPU.
pub struct IrqCell<T> {
    data: UnsafeCell<T>,
}

// SAFETY: single CPU, and every access happens with interrupts disabled.
unsafe impl<T: Send> Send for IrqCell<T> {}
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            data: UnsafeCell::new(data),
        }
    }

    /// Run `f` with exclusive access and interrupts disabled.
    ///
    /// Must not be re-entered from inside `f`.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = IrqGuard::new();
        // SAFETY: interrupts are masked and the kernel never calls `with`
        // recursively, so this is the only live reference.
        let data = unsafe { &mut *self.data.get() };
        f(data)
    }

    /// # Safety
    /// The caller must already be running with interrupts disabled (for
    /// example inside an interrupt handler) and hold no other reference.
    #[inline]
    pub unsafe fn get_mut_unchecked(&self) -> &mut T {
        unsafe { &mut *self.data.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_access_sees_the_same_value() {
        let cell = IrqCell::new([0u32; 4]);
        // SAFETY: no other reference to the cell exists.
        unsafe { cell.get_mut_unchecked()[2] = 9 };
        // SAFETY: as above.
        let data = unsafe { cell.get_mut_unchecked() };
        assert_eq!(data[2], 9);
    }
}

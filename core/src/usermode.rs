//! Loading a flat user program into a fresh address space.

use pmos_abi::arch::x86::{PAGE_SIZE, USER_PROGRAM_BASE, USER_STACK_SIZE, USER_STACK_TOP};
use pmos_abi::{InterruptFrame, ProcessError, ProcessResult};
use pmos_lib::{align_up_u32, klog_info, IrqGuard};
use pmos_mm::{AddressSpace, FrameSource};

use crate::kernel::Kernel;
use crate::platform::Platform;

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    /// Give the current process a new address space holding `image` at
    /// [`USER_PROGRAM_BASE`] and one stack page below [`USER_STACK_TOP`],
    /// and make it active. Returns the frame for the first `iret` to ring 3.
    ///
    /// The previous space is dropped unless it is the kernel template. On
    /// failure the current process keeps its old space.
    pub fn load_user_image(&mut self, image: &[u8]) -> ProcessResult<InterruptFrame> {
        let _irq = IrqGuard::new();

        let space = AddressSpace::create(&mut self.frames, &self.kernel_space)?;
        if let Err(err) = self.populate_user_space(space, image) {
            space.destroy(&mut self.frames);
            return Err(err);
        }

        let old = self.processes[self.current].space;
        self.processes[self.current].space = space;
        if old != self.kernel_space {
            old.destroy(&mut self.frames);
        }

        let stack_top = self.processes[self.current].stack_top;
        self.platform.set_kernel_stack(stack_top);
        self.activate(space);

        klog_info!(
            "usermode: pid {} image {} bytes at 0x{:08x}",
            self.current_pid(),
            image.len(),
            USER_PROGRAM_BASE
        );
        Ok(InterruptFrame::user_entry(USER_PROGRAM_BASE, USER_STACK_TOP))
    }

    fn populate_user_space(&mut self, space: AddressSpace, image: &[u8]) -> ProcessResult<()> {
        let image_len = u32::try_from(image.len()).map_err(|_| ProcessError::OutOfMemory)?;
        let pages = (align_up_u32(image_len, PAGE_SIZE) / PAGE_SIZE).max(1);

        for page in 0..pages {
            let frame = self.frames.allocate().ok_or(ProcessError::OutOfMemory)?;
            let va = USER_PROGRAM_BASE + page * PAGE_SIZE;
            let start = (page * PAGE_SIZE) as usize;
            let chunk = &image[start.min(image.len())..(start + PAGE_SIZE as usize).min(image.len())];
            // SAFETY: the frame was just allocated and is not mapped anywhere.
            unsafe {
                core::ptr::copy_nonoverlapping(chunk.as_ptr(), self.frames.frame_ptr(frame), chunk.len());
            }
            if let Err(err) = space.map(&mut self.frames, va, frame.start_address(), true, true) {
                self.frames.free(frame);
                return Err(err.into());
            }
        }

        let stack = self.frames.allocate().ok_or(ProcessError::OutOfMemory)?;
        if let Err(err) = space.map(
            &mut self.frames,
            USER_STACK_TOP - USER_STACK_SIZE,
            stack.start_address(),
            true,
            true,
        ) {
            self.frames.free(stack);
            return Err(err.into());
        }
        Ok(())
    }
}

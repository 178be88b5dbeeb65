//! Physical frame allocation.
//!
//! Frames come from one contiguous pool tracked by a bitmap. The pool is
//! described by its physical base and a pointer through which the kernel can
//! reach it: on the target that pointer is the physical address itself
//! (the pool sits in the identity-mapped kernel region), in host tests it is
//! an ordinary buffer.

use core::fmt;
use core::ptr;

use pmos_abi::arch::x86::{is_page_aligned, PAGE_SIZE, FRAME_POOL_END, FRAME_POOL_START};
use pmos_lib::klog_warn;

/// Largest pool the bitmap can describe (4 MiB of 4 KiB frames).
pub const MAX_POOL_FRAMES: usize = 1024;
const BITMAP_WORDS: usize = MAX_POOL_FRAMES / 32;

/// Physical address of a 4 KiB frame.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysFrame(u32);

impl PhysFrame {
    /// Returns `None` for addresses that are not page aligned.
    #[inline]
    pub const fn from_start_address(addr: u32) -> Option<Self> {
        if is_page_aligned(addr) {
            Some(Self(addr))
        } else {
            None
        }
    }

    #[inline]
    pub const fn containing_address(addr: u32) -> Self {
        Self(addr & !(PAGE_SIZE - 1))
    }

    #[inline]
    pub const fn start_address(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PhysFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysFrame({:#010x})", self.0)
    }
}

/// Supplier of zeroed physical frames.
pub trait FrameSource {
    /// Hand out a zero-filled frame, or `None` when the pool is exhausted.
    fn allocate(&mut self) -> Option<PhysFrame>;

    fn free(&mut self, frame: PhysFrame);

    /// Kernel-visible pointer to the first byte of `frame`.
    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8;
}

pub struct BitmapFrameAllocator {
    base_phys: u32,
    base_ptr: *mut u8,
    frames: usize,
    bitmap: [u32; BITMAP_WORDS],
    free: usize,
    next_hint: usize,
}

// SAFETY: the pool is owned exclusively by the allocator and the kernel
// state that holds it is only touched with interrupts disabled.
unsafe impl Send for BitmapFrameAllocator {}

impl BitmapFrameAllocator {
    /// # Safety
    /// `base_ptr` must be valid for reads and writes of `frames * PAGE_SIZE`
    /// bytes, page aligned, and used by nothing but this allocator.
    pub const unsafe fn new(base_phys: u32, base_ptr: *mut u8, frames: usize) -> Self {
        let frames = if frames > MAX_POOL_FRAMES {
            MAX_POOL_FRAMES
        } else {
            frames
        };
        Self {
            base_phys,
            base_ptr,
            frames,
            bitmap: [0; BITMAP_WORDS],
            free: frames,
            next_hint: 0,
        }
    }

    /// The `[FRAME_POOL_START, FRAME_POOL_END)` pool, reached through the
    /// identity map.
    ///
    /// # Safety
    /// Paging must be off or the pool identity mapped, and nothing else may
    /// use that physical range.
    pub unsafe fn identity_pool() -> Self {
        let frames = ((FRAME_POOL_END - FRAME_POOL_START) / PAGE_SIZE) as usize;
        unsafe { Self::new(FRAME_POOL_START, FRAME_POOL_START as usize as *mut u8, frames) }
    }

    #[inline]
    pub fn total_frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn free_frames(&self) -> usize {
        self.free
    }

    fn index_of(&self, frame: PhysFrame) -> Option<usize> {
        let addr = frame.start_address();
        if addr < self.base_phys {
            return None;
        }
        let index = ((addr - self.base_phys) / PAGE_SIZE) as usize;
        (index < self.frames).then_some(index)
    }

    #[inline]
    fn is_used(&self, index: usize) -> bool {
        self.bitmap[index / 32] & (1 << (index % 32)) != 0
    }

    #[inline]
    fn set_used(&mut self, index: usize, used: bool) {
        let bit = 1 << (index % 32);
        if used {
            self.bitmap[index / 32] |= bit;
        } else {
            self.bitmap[index / 32] &= !bit;
        }
    }
}

impl FrameSource for BitmapFrameAllocator {
    fn allocate(&mut self) -> Option<PhysFrame> {
        if self.free == 0 {
            return None;
        }
        let index = (0..self.frames)
            .map(|i| (self.next_hint + i) % self.frames)
            .find(|&i| !self.is_used(i))?;

        self.set_used(index, true);
        self.free -= 1;
        self.next_hint = (index + 1) % self.frames;

        let frame = PhysFrame(self.base_phys + index as u32 * PAGE_SIZE);
        // SAFETY: `index` lies inside the pool handed to `new`.
        unsafe {
            ptr::write_bytes(self.frame_ptr(frame), 0, PAGE_SIZE as usize);
        }
        Some(frame)
    }

    fn free(&mut self, frame: PhysFrame) {
        let Some(index) = self.index_of(frame) else {
            klog_warn!("frame_alloc: {:?} is outside the pool", frame);
            return;
        };
        if !self.is_used(index) {
            klog_warn!("frame_alloc: double free of {:?}", frame);
            return;
        }
        self.set_used(index, false);
        self.free += 1;
    }

    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8 {
        let offset = frame.start_address().wrapping_sub(self.base_phys) as usize;
        self.base_ptr.wrapping_add(offset)
    }
}

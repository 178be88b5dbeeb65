//! Physical frames, page tables and address spaces.

#![cfg_attr(not(test), no_std)]

pub mod frame_alloc;
pub mod page_fault;
pub mod paging;

pub use frame_alloc::{BitmapFrameAllocator, FrameSource, PhysFrame, MAX_POOL_FRAMES};
pub use page_fault::PageFaultReport;
pub use paging::{AddressSpace, PageTable, PageTableEntry, KERNEL_DIRECTORY_ENTRIES};

//! Two-level page tables and per-process address spaces.
//!
//! Every address space shares the kernel region `[0, KERNEL_SPLIT)`: its
//! directory entries are copied by value from the kernel template, so all
//! spaces point at the same identity-mapping tables. User mappings live at or
//! above the split and get their tables on demand.

use core::fmt;
use core::ops::{Index, IndexMut};

use pmos_abi::arch::x86::{
    directory_index, is_page_aligned, page_offset, table_index, PageFlags, DIRECTORY_ENTRY_SPAN,
    ENTRIES_PER_TABLE, ENTRY_ADDR_MASK, ENTRY_FLAGS_MASK, KERNEL_SPLIT, PAGE_SIZE,
};
use pmos_abi::{MapError, MapResult};
use pmos_lib::klog_debug;

use crate::frame_alloc::{FrameSource, PhysFrame};

/// Directory slots covering the kernel region.
pub const KERNEL_DIRECTORY_ENTRIES: usize = directory_index(KERNEL_SPLIT);

#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn new(frame: PhysFrame, flags: PageFlags) -> Self {
        Self((frame.start_address() & ENTRY_ADDR_MASK) | (flags.bits() & ENTRY_FLAGS_MASK))
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_present(self) -> bool {
        self.flags().contains(PageFlags::PRESENT)
    }

    #[inline]
    pub const fn frame(self) -> PhysFrame {
        PhysFrame::containing_address(self.0)
    }

    #[inline]
    pub const fn flags(self) -> PageFlags {
        PageFlags::from_bits_retain(self.0 & ENTRY_FLAGS_MASK)
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PTE({:#010x})", self.0)
    }
}

/// A page directory or a page table: 1024 entries in one frame.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE],
}

impl PageTable {
    pub fn iter(&self) -> impl Iterator<Item = &PageTableEntry> {
        self.entries.iter()
    }
}

impl Index<usize> for PageTable {
    type Output = PageTableEntry;

    fn index(&self, index: usize) -> &PageTableEntry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut PageTableEntry {
        &mut self.entries[index]
    }
}

/// View `frame` as a page table.
///
/// # Safety
/// `frame` must come from `frames` and hold a directory or table, and the
/// caller must not create a second reference to the same frame.
#[inline]
unsafe fn table_at<F: FrameSource + ?Sized>(frames: &F, frame: PhysFrame) -> &mut PageTable {
    unsafe { &mut *(frames.frame_ptr(frame) as *mut PageTable) }
}

/// Handle to a page directory. Copying the handle does not copy the space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace {
    root: PhysFrame,
}

impl AddressSpace {
    /// Build the kernel template: `[0, KERNEL_SPLIT)` identity mapped with
    /// supervisor read/write pages.
    pub fn new_kernel<F: FrameSource + ?Sized>(frames: &mut F) -> MapResult<Self> {
        let root = frames.allocate().ok_or(MapError::OutOfFrames)?;
        let space = Self { root };

        for dir_index in 0..KERNEL_DIRECTORY_ENTRIES {
            let Some(table_frame) = frames.allocate() else {
                space.release_tables(frames, 0..dir_index);
                frames.free(root);
                return Err(MapError::OutOfFrames);
            };
            let base = dir_index as u32 * DIRECTORY_ENTRY_SPAN;
            // SAFETY: freshly allocated, exclusively ours.
            let table = unsafe { table_at(frames, table_frame) };
            for i in 0..ENTRIES_PER_TABLE {
                let page = PhysFrame::containing_address(base + i as u32 * PAGE_SIZE);
                table[i] = PageTableEntry::new(page, PageFlags::KERNEL_RW);
            }
            // SAFETY: `root` is a directory we own; distinct from `table_frame`.
            let dir = unsafe { table_at(frames, root) };
            dir[dir_index] = PageTableEntry::new(table_frame, PageFlags::KERNEL_RW);
        }

        klog_debug!("paging: kernel template at {:?}", root);
        Ok(space)
    }

    /// Fresh space holding only the kernel region of `kernel`.
    pub fn create<F: FrameSource + ?Sized>(frames: &mut F, kernel: &AddressSpace) -> MapResult<Self> {
        let root = frames.allocate().ok_or(MapError::OutOfFrames)?;
        // SAFETY: distinct frames, both directories.
        let (dir, template) = unsafe { (table_at(frames, root), table_at(frames, kernel.root)) };
        for i in 0..KERNEL_DIRECTORY_ENTRIES {
            dir[i] = template[i];
        }
        Ok(Self { root })
    }

    /// New directory whose every entry is copied from this one. Tables and
    /// frames are shared, not duplicated.
    pub fn clone_shared<F: FrameSource + ?Sized>(&self, frames: &mut F) -> MapResult<Self> {
        let root = frames.allocate().ok_or(MapError::OutOfFrames)?;
        // SAFETY: distinct frames, both directories.
        let (dir, source) = unsafe { (table_at(frames, root), table_at(frames, self.root)) };
        for i in 0..ENTRIES_PER_TABLE {
            dir[i] = source[i];
        }
        Ok(Self { root })
    }

    /// Map the page at `va` to the frame at `pa`. Overwrites an existing
    /// mapping.
    pub fn map<F: FrameSource + ?Sized>(
        &self,
        frames: &mut F,
        va: u32,
        pa: u32,
        writable: bool,
        user: bool,
    ) -> MapResult<()> {
        if !is_page_aligned(va) || !is_page_aligned(pa) {
            return Err(MapError::Unaligned);
        }
        if va < KERNEL_SPLIT {
            return Err(MapError::KernelRegion);
        }

        let dir_index = directory_index(va);
        // SAFETY: our own directory frame.
        let dir_entry = unsafe { table_at(frames, self.root) }[dir_index];
        let table_frame = if dir_entry.is_present() {
            dir_entry.frame()
        } else {
            let frame = frames.allocate().ok_or(MapError::OutOfFrames)?;
            // SAFETY: as above.
            let dir = unsafe { table_at(frames, self.root) };
            dir[dir_index] = PageTableEntry::new(frame, PageFlags::TABLE_LINK);
            frame
        };

        // SAFETY: the directory entry points at a table frame.
        let table = unsafe { table_at(frames, table_frame) };
        table[table_index(va)] = PageTableEntry::new(
            PhysFrame::containing_address(pa),
            PageFlags::for_mapping(writable, user),
        );
        Ok(())
    }

    /// Physical address `va` resolves to, if it is mapped.
    pub fn translate<F: FrameSource + ?Sized>(&self, frames: &F, va: u32) -> Option<u32> {
        let table_frame = self.directory_entry(frames, directory_index(va));
        if !table_frame.is_present() {
            return None;
        }
        // SAFETY: present directory entries point at tables.
        let entry = unsafe { table_at(frames, table_frame.frame()) }[table_index(va)];
        entry
            .is_present()
            .then(|| entry.frame().start_address() + page_offset(va))
    }

    /// Leaf entry for `va`, if its table exists.
    pub fn entry<F: FrameSource + ?Sized>(&self, frames: &F, va: u32) -> Option<PageTableEntry> {
        let dir_entry = self.directory_entry(frames, directory_index(va));
        if !dir_entry.is_present() {
            return None;
        }
        // SAFETY: present directory entries point at tables.
        Some(unsafe { table_at(frames, dir_entry.frame()) }[table_index(va)])
    }

    pub fn directory_entry<F: FrameSource + ?Sized>(&self, frames: &F, index: usize) -> PageTableEntry {
        // SAFETY: our own directory frame.
        let dir = unsafe { table_at(frames, self.root) };
        dir[index]
    }

    /// Release the directory frame. Page tables may be shared with other
    /// spaces and are left alone.
    pub fn destroy<F: FrameSource + ?Sized>(self, frames: &mut F) {
        frames.free(self.root);
    }

    #[inline]
    pub fn root(&self) -> PhysFrame {
        self.root
    }

    fn release_tables<F: FrameSource + ?Sized>(&self, frames: &mut F, range: core::ops::Range<usize>) {
        for i in range {
            let entry = self.directory_entry(frames, i);
            if entry.is_present() {
                frames.free(entry.frame());
            }
        }
    }
}

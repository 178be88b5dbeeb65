//! Two-level 32-bit paging definitions (no PAE).

use bitflags::bitflags;

pub const PAGE_SIZE: u32 = 0x1000;
pub const PAGE_SHIFT: u32 = 12;
pub const ENTRIES_PER_TABLE: usize = 1024;
/// Bytes covered by one page directory entry.
pub const DIRECTORY_ENTRY_SPAN: u32 = PAGE_SIZE * ENTRIES_PER_TABLE as u32;

/// Mask selecting the frame address bits of a directory or table entry.
pub const ENTRY_ADDR_MASK: u32 = 0xFFFF_F000;
/// Mask selecting the flag bits of a directory or table entry.
pub const ENTRY_FLAGS_MASK: u32 = 0x0000_0FFF;

bitflags! {
    /// Flag bits shared by page directory and page table entries.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PageFlags: u32 {
        const PRESENT = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const CACHE_DISABLE = 1 << 4;
        const ACCESSED = 1 << 5;
        const DIRTY = 1 << 6;
        /// 4 MiB page in a directory entry (PSE); unused by this kernel.
        const HUGE = 1 << 7;
        const GLOBAL = 1 << 8;
    }
}

impl PageFlags {
    /// Flags of kernel identity mappings.
    pub const KERNEL_RW: Self = Self::PRESENT.union(Self::WRITABLE);
    /// Flags of a directory entry pointing at a user-reachable table.
    /// Per-page permissions are enforced by the table entries.
    pub const TABLE_LINK: Self = Self::PRESENT.union(Self::WRITABLE).union(Self::USER);

    /// Leaf flags for a mapping with the given permissions.
    #[inline]
    pub const fn for_mapping(writable: bool, user: bool) -> Self {
        let mut bits = Self::PRESENT.bits();
        if writable {
            bits |= Self::WRITABLE.bits();
        }
        if user {
            bits |= Self::USER.bits();
        }
        Self::from_bits_retain(bits)
    }
}

#[inline]
pub const fn directory_index(va: u32) -> usize {
    (va >> 22) as usize
}

#[inline]
pub const fn table_index(va: u32) -> usize {
    ((va >> PAGE_SHIFT) & 0x3FF) as usize
}

#[inline]
pub const fn page_offset(va: u32) -> u32 {
    va & (PAGE_SIZE - 1)
}

#[inline]
pub const fn is_page_aligned(addr: u32) -> bool {
    addr & (PAGE_SIZE - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_split() {
        let va = 0x0804_8123;
        assert_eq!(directory_index(va), 0x20);
        assert_eq!(table_index(va), 0x48);
        assert_eq!(page_offset(va), 0x123);
    }

    #[test]
    fn mapping_flags() {
        assert_eq!(PageFlags::for_mapping(true, true).bits(), 0x7);
        assert_eq!(PageFlags::for_mapping(false, true).bits(), 0x5);
        assert_eq!(PageFlags::for_mapping(true, false), PageFlags::KERNEL_RW);
        assert_eq!(PageFlags::TABLE_LINK.bits(), 0x7);
    }
}

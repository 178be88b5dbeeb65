//! Flat protected-mode segments: selectors and descriptor encoding.

/// A segment selector: descriptor index in bits 3..16, table indicator in
/// bit 2 (set for the LDT) and the requested privilege level in bits 0..2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    pub const NULL: Self = Self(0);
    /// 0x08
    pub const KERNEL_CODE: Self = Self::new(1, false, 0);
    /// 0x10
    pub const KERNEL_DATA: Self = Self::new(2, false, 0);
    /// 0x1B
    pub const USER_CODE: Self = Self::new(3, false, 3);
    /// 0x23
    pub const USER_DATA: Self = Self::new(4, false, 3);
    /// 0x28
    pub const TSS: Self = Self::new(5, false, 0);

    #[inline]
    pub const fn new(index: u16, ldt: bool, rpl: u8) -> Self {
        let ti = if ldt { 1 << 2 } else { 0 };
        Self((index << 3) | ti | (rpl as u16 & 0x3))
    }

    #[inline]
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    #[inline]
    pub const fn is_ldt(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    #[inline]
    pub const fn rpl(self) -> u8 {
        (self.0 & 0x3) as u8
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// Number of descriptors in the kernel GDT (null, 4 flat segments, TSS).
pub const GDT_ENTRIES: usize = 6;

// Access byte.
pub const GDT_ACCESS_PRESENT: u8 = 1 << 7;
pub const GDT_ACCESS_DPL_KERNEL: u8 = 0 << 5;
pub const GDT_ACCESS_DPL_USER: u8 = 3 << 5;
/// Code or data, as opposed to a system descriptor.
pub const GDT_ACCESS_SEGMENT: u8 = 1 << 4;
/// Execute/read, non-conforming.
pub const GDT_ACCESS_CODE_TYPE: u8 = 0b1010;
/// Read/write, expand-up.
pub const GDT_ACCESS_DATA_TYPE: u8 = 0b0010;
/// Available 32-bit TSS.
pub const GDT_ACCESS_TSS32_TYPE: u8 = 0b1001;

pub const GDT_ACCESS_KERNEL_CODE: u8 =
    GDT_ACCESS_PRESENT | GDT_ACCESS_DPL_KERNEL | GDT_ACCESS_SEGMENT | GDT_ACCESS_CODE_TYPE;
pub const GDT_ACCESS_KERNEL_DATA: u8 =
    GDT_ACCESS_PRESENT | GDT_ACCESS_DPL_KERNEL | GDT_ACCESS_SEGMENT | GDT_ACCESS_DATA_TYPE;
pub const GDT_ACCESS_USER_CODE: u8 =
    GDT_ACCESS_PRESENT | GDT_ACCESS_DPL_USER | GDT_ACCESS_SEGMENT | GDT_ACCESS_CODE_TYPE;
pub const GDT_ACCESS_USER_DATA: u8 =
    GDT_ACCESS_PRESENT | GDT_ACCESS_DPL_USER | GDT_ACCESS_SEGMENT | GDT_ACCESS_DATA_TYPE;
pub const GDT_ACCESS_TSS: u8 = GDT_ACCESS_PRESENT | GDT_ACCESS_TSS32_TYPE;

// Flags nibble: 4 KiB granularity, 32-bit default operand size.
pub const GDT_FLAG_GRANULARITY: u8 = 1 << 3;
pub const GDT_FLAG_SIZE_32: u8 = 1 << 2;
pub const GDT_FLAGS_32BIT: u8 = GDT_FLAG_GRANULARITY | GDT_FLAG_SIZE_32;

/// Encode a segment descriptor from its base, 20-bit limit, access byte and flags.
pub const fn descriptor(base: u32, limit: u32, access: u8, flags: u8) -> u64 {
    let mut d = (limit & 0xFFFF) as u64;
    d |= ((base & 0xFF_FFFF) as u64) << 16;
    d |= (access as u64) << 40;
    d |= (((limit >> 16) & 0xF) as u64) << 48;
    d |= ((flags & 0xF) as u64) << 52;
    d |= ((base >> 24) as u64 & 0xFF) << 56;
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_selector_values() {
        assert_eq!(SegmentSelector::KERNEL_CODE.bits(), 0x08);
        assert_eq!(SegmentSelector::KERNEL_DATA.bits(), 0x10);
        assert_eq!(SegmentSelector::USER_CODE.bits(), 0x1B);
        assert_eq!(SegmentSelector::USER_DATA.bits(), 0x23);
        assert_eq!(SegmentSelector::TSS.bits(), 0x28);
    }

    #[test]
    fn segment_selector_decomposition() {
        let sel = SegmentSelector::USER_CODE;
        assert_eq!(sel.index(), 3);
        assert_eq!(sel.rpl(), 3);
        assert!(!sel.is_ldt());
    }

    #[test]
    fn access_bytes_match_flat_layout() {
        assert_eq!(GDT_ACCESS_KERNEL_CODE, 0x9A);
        assert_eq!(GDT_ACCESS_KERNEL_DATA, 0x92);
        assert_eq!(GDT_ACCESS_USER_CODE, 0xFA);
        assert_eq!(GDT_ACCESS_USER_DATA, 0xF2);
        assert_eq!(GDT_ACCESS_TSS, 0x89);
    }

    #[test]
    fn flat_code_descriptor_encoding() {
        let d = descriptor(0, 0xFFFFF, GDT_ACCESS_KERNEL_CODE, GDT_FLAGS_32BIT);
        assert_eq!(d, 0x00CF_9A00_0000_FFFF);
        let u = descriptor(0, 0xFFFFF, GDT_ACCESS_USER_DATA, GDT_FLAGS_32BIT);
        assert_eq!(u, 0x00CF_F200_0000_FFFF);
    }
}

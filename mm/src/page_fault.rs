//! Page-fault diagnostics.

use core::fmt;

use x86_64::structures::idt::PageFaultErrorCode;

/// Everything the kernel prints about a page fault before halting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageFaultReport {
    /// Faulting linear address (CR2).
    pub address: u32,
    pub eip: u32,
    pub error_code: u32,
}

impl PageFaultReport {
    pub const fn new(address: u32, eip: u32, error_code: u32) -> Self {
        Self {
            address,
            eip,
            error_code,
        }
    }

    #[inline]
    pub fn flags(&self) -> PageFaultErrorCode {
        PageFaultErrorCode::from_bits_truncate(self.error_code as u64)
    }

    pub fn is_present(&self) -> bool {
        self.flags().contains(PageFaultErrorCode::PROTECTION_VIOLATION)
    }

    pub fn is_write(&self) -> bool {
        self.flags().contains(PageFaultErrorCode::CAUSED_BY_WRITE)
    }

    pub fn is_user(&self) -> bool {
        self.flags().contains(PageFaultErrorCode::USER_MODE)
    }
}

impl fmt::Display for PageFaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = self.flags();
        write!(
            f,
            "PAGE FAULT at 0x{:08x} eip=0x{:08x} err=0x{:x} ({}, {}, {}",
            self.address,
            self.eip,
            self.error_code,
            if self.is_present() { "present" } else { "not present" },
            if self.is_write() { "write" } else { "read" },
            if self.is_user() { "user" } else { "kernel" },
        )?;
        if flags.contains(PageFaultErrorCode::MALFORMED_TABLE) {
            f.write_str(", reserved bit")?;
        }
        if flags.contains(PageFaultErrorCode::INSTRUCTION_FETCH) {
            f.write_str(", instruction fetch")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_write_to_missing_page() {
        let report = PageFaultReport::new(0x0804_9000, 0x0804_8010, 0x6);
        assert!(!report.is_present());
        assert!(report.is_write());
        assert!(report.is_user());
        assert_eq!(
            format!("{}", report),
            "PAGE FAULT at 0x08049000 eip=0x08048010 err=0x6 (not present, write, user)"
        );
    }

    #[test]
    fn kernel_protection_fault_with_extra_bits() {
        let report = PageFaultReport::new(0xDEAD_B000, 0x0010_2000, 0x19);
        assert_eq!(
            format!("{}", report),
            "PAGE FAULT at 0xdeadb000 eip=0x00102000 err=0x19 (present, read, kernel, reserved bit, instruction fetch)"
        );
    }
}

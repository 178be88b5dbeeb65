use core::ffi::{c_char, CStr};

pub const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

const MULTIBOOT_INFO_CMDLINE: u32 = 1 << 2;

/// Leading part of the multiboot v1 information structure.
#[repr(C)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    pub boot_device: u32,
    pub cmdline: u32,
}

impl MultibootInfo {
    /// Kernel command line, if the loader passed one that is valid UTF-8.
    pub fn cmdline(&self) -> Option<&str> {
        if self.flags & MULTIBOOT_INFO_CMDLINE == 0 || self.cmdline == 0 {
            return None;
        }
        // SAFETY: the loader placed a NUL-terminated string in low memory,
        // which stays identity mapped.
        let raw = unsafe { CStr::from_ptr(self.cmdline as *const c_char) };
        raw.to_str().ok()
    }
}

//! Error types shared by the kernel crates and the syscall boundary

use core::ffi::c_int;
use core::fmt;

/// Implement common methods for kernel error enums.
///
/// Generates `as_c_int()`, `from_c_int()`, `is_success()`, and `is_error()` methods
/// for `#[repr(i32)]` error enums that follow the kernel's error convention,
/// plus a `Display` impl from the per-variant descriptions.
macro_rules! impl_kernel_error {
    ($ty:ty, fallback: $fallback:ident, variants: { $($val:literal => $variant:ident : $desc:literal),* $(,)? }) => {
        impl $ty {
            /// Convert to C-style integer for syscall returns.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from C-style integer.
            #[inline]
            pub fn from_c_int(val: c_int) -> Self {
                match val {
                    $($val => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }

            /// Check if this is a success result.
            #[inline]
            pub fn is_success(self) -> bool {
                matches!(self, Self::Success)
            }

            /// Check if this is an error result.
            #[inline]
            pub fn is_error(self) -> bool {
                !self.is_success()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let desc = match self {
                    $(Self::$variant => $desc,)*
                };
                f.write_str(desc)
            }
        }
    };
}

/// Page mapping result type
pub type MapResult<T> = Result<T, MapError>;

/// Errors returned by address space operations
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapError {
    /// Operation succeeded
    #[default]
    Success = 0,
    /// No free physical frame for a directory, table or page
    OutOfFrames = -1,
    /// Address lies in the shared kernel region
    KernelRegion = -2,
    /// Address is not page aligned
    Unaligned = -3,
}

impl_kernel_error!(MapError, fallback: OutOfFrames, variants: {
    0 => Success: "success",
    -1 => OutOfFrames: "out of physical frames",
    -2 => KernelRegion: "address in kernel region",
    -3 => Unaligned: "address not page aligned",
});

/// Process operation result type
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors returned by process lifecycle operations
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessError {
    /// Operation succeeded
    #[default]
    Success = 0,
    /// Frame allocation failed for a directory, table or kernel stack
    OutOfMemory = -1,
    /// Every PCB slot is in use
    TableFull = -2,
    /// No process with the given id
    NoSuchProcess = -3,
    /// Caller has no child matching the wait filter
    NoChildren = -4,
    /// Operation not allowed for this process
    NotPermitted = -5,
}

impl_kernel_error!(ProcessError, fallback: NotPermitted, variants: {
    0 => Success: "success",
    -1 => OutOfMemory: "out of memory",
    -2 => TableFull: "process table full",
    -3 => NoSuchProcess: "no such process",
    -4 => NoChildren: "no matching child",
    -5 => NotPermitted: "operation not permitted",
});

impl From<MapError> for ProcessError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Success => ProcessError::Success,
            MapError::OutOfFrames => ProcessError::OutOfMemory,
            MapError::KernelRegion | MapError::Unaligned => ProcessError::NotPermitted,
        }
    }
}

//! Architecture-specific definitions.

pub mod x86;

pub use x86::*;

//! 32-bit x86 architecture definitions.
//!
//! Raw integer constants are wrapped in newtypes where mixing them up would
//! be easy:
//! - `SegmentSelector(u16)` for GDT selectors
//! - `Port(u16)` for I/O port addresses
//! - `PageFlags` bitflags for page directory and page table entries

pub mod gdt;
pub mod idt;
pub mod memory;
pub mod paging;
pub mod ports;

pub use gdt::SegmentSelector;
pub use idt::*;
pub use memory::*;
pub use paging::*;
pub use ports::*;

//! PMOS kernel ABI types
//!
//! This crate holds the definitions every other kernel crate has to agree on:
//! the register frame built by the interrupt entry stubs, segment selectors,
//! vector numbers, page-table bits, syscall numbers and the integer error
//! codes that cross the syscall boundary.
//!
//! Layout-sensitive types are `#[repr(C)]`.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod arch;
pub mod error;
pub mod frame;
pub mod syscall;
pub mod task;

pub use error::*;
pub use frame::InterruptFrame;
pub use syscall::*;
pub use task::*;

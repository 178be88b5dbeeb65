//! Byte-wide port access as a trait, so device setup sequences can be
//! checked against a recorder.

use pmos_abi::arch::x86::Port;
use pmos_lib::io;

pub trait PortIo {
    fn outb(&mut self, port: Port, value: u8);
    fn inb(&mut self, port: Port) -> u8;

    /// Short delay for devices that need time between accesses.
    fn io_wait(&mut self) {
        self.outb(Port::POST_DELAY, 0);
    }
}

/// Real `in`/`out` instructions.
pub struct HardwarePorts(());

impl HardwarePorts {
    /// # Safety
    /// The caller must own the devices it programs through the returned
    /// value; port writes act on hardware directly.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

impl PortIo for HardwarePorts {
    #[inline]
    fn outb(&mut self, port: Port, value: u8) {
        // SAFETY: guaranteed by the contract of `HardwarePorts::new`.
        unsafe { io::outb(port, value) }
    }

    #[inline]
    fn inb(&mut self, port: Port) -> u8 {
        // SAFETY: guaranteed by the contract of `HardwarePorts::new`.
        unsafe { io::inb(port) }
    }
}

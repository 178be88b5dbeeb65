//! Legacy PC devices: the 8259 interrupt controllers, the 8254 timer and the
//! first serial port.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

pub mod pic;
pub mod pit;
pub mod ports;
pub mod serial;

pub use ports::{HardwarePorts, PortIo};

#[cfg(test)]
pub(crate) mod test_ports {
    use pmos_abi::arch::x86::Port;

    use crate::ports::PortIo;

    /// Records writes; reads return `input`.
    #[derive(Default)]
    pub struct RecordingPorts {
        pub writes: Vec<(u16, u8)>,
        pub input: u8,
    }

    impl RecordingPorts {
        /// Writes with the POST delay writes filtered out.
        pub fn device_writes(&self) -> Vec<(u16, u8)> {
            self.writes
                .iter()
                .copied()
                .filter(|&(port, _)| port != Port::POST_DELAY.number())
                .collect()
        }
    }

    impl PortIo for RecordingPorts {
        fn outb(&mut self, port: Port, value: u8) {
            self.writes.push((port.number(), value));
        }

        fn inb(&mut self, _port: Port) -> u8 {
            self.input
        }
    }
}

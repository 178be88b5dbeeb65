use pmos_abi::arch::x86::{
    Port, PIT_BASE_FREQUENCY_HZ, PIT_COMMAND_ACCESS_LOHI, PIT_COMMAND_BINARY,
    PIT_COMMAND_CHANNEL0, PIT_COMMAND_MODE_SQUARE,
};
use pmos_lib::klog_info;

use crate::ports::PortIo;

pub const PIT_DEFAULT_FREQUENCY_HZ: u32 = 50;

/// Channel 0, lo/hi access, square wave, binary (0x36).
pub const PIT_COMMAND_TIMER: u8 =
    PIT_COMMAND_CHANNEL0 | PIT_COMMAND_ACCESS_LOHI | PIT_COMMAND_MODE_SQUARE | PIT_COMMAND_BINARY;

/// Reload value for `frequency_hz`, clamped to what the 16-bit counter can
/// express. Zero selects the default rate.
pub fn divisor_for(mut frequency_hz: u32) -> u16 {
    if frequency_hz == 0 {
        frequency_hz = PIT_DEFAULT_FREQUENCY_HZ;
    }
    if frequency_hz > PIT_BASE_FREQUENCY_HZ {
        frequency_hz = PIT_BASE_FREQUENCY_HZ;
    }

    let divisor = PIT_BASE_FREQUENCY_HZ / frequency_hz;
    divisor.clamp(1, 0xFFFF) as u16
}

/// Program channel 0 to fire IRQ0 at about `frequency_hz`. Returns the rate
/// actually achieved.
pub fn init(io: &mut impl PortIo, frequency_hz: u32) -> u32 {
    let divisor = divisor_for(frequency_hz);
    io.outb(Port::PIT_COMMAND, PIT_COMMAND_TIMER);
    io.outb(Port::PIT_CHANNEL0, (divisor & 0xFF) as u8);
    io.outb(Port::PIT_CHANNEL0, (divisor >> 8) as u8);
    io.io_wait();

    let actual = PIT_BASE_FREQUENCY_HZ / divisor as u32;
    klog_info!("PIT: timer at {} Hz (divisor {})", actual, divisor);
    actual
}

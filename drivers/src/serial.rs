//! COM1 at 38400 baud, 8N1, polled transmit.

use core::fmt::{self, Write};

use pmos_abi::arch::x86::{
    Port, UART_FCR_ENABLE_CLEAR_14, UART_LCR_8N1, UART_LCR_DLAB, UART_LSR_TX_EMPTY,
    UART_MCR_DTR_RTS_OUT2, UART_REG_FCR, UART_REG_IER, UART_REG_LCR, UART_REG_LSR, UART_REG_MCR,
    UART_REG_THR,
};
use pmos_lib::without_interrupts;
use spin::Mutex;

use crate::ports::{HardwarePorts, PortIo};

/// 115200 / 3.
const BAUD_DIVISOR: u16 = 3;

pub struct SerialPort<IO: PortIo> {
    io: IO,
    base: Port,
}

impl<IO: PortIo> SerialPort<IO> {
    pub const fn new(io: IO, base: Port) -> Self {
        Self { io, base }
    }

    pub fn init(&mut self) {
        let base = self.base;
        self.io.outb(base.offset(UART_REG_IER), 0x00);
        self.io.outb(base.offset(UART_REG_LCR), UART_LCR_DLAB);
        self.io.outb(base.offset(UART_REG_THR), (BAUD_DIVISOR & 0xFF) as u8);
        self.io.outb(base.offset(UART_REG_IER), (BAUD_DIVISOR >> 8) as u8);
        self.io.outb(base.offset(UART_REG_LCR), UART_LCR_8N1);
        self.io.outb(base.offset(UART_REG_FCR), UART_FCR_ENABLE_CLEAR_14);
        self.io.outb(base.offset(UART_REG_MCR), UART_MCR_DTR_RTS_OUT2);
    }

    fn transmit_empty(&mut self) -> bool {
        self.io.inb(self.base.offset(UART_REG_LSR)) & UART_LSR_TX_EMPTY != 0
    }

    pub fn write_byte(&mut self, byte: u8) {
        while !self.transmit_empty() {
            core::hint::spin_loop();
        }
        self.io.outb(self.base.offset(UART_REG_THR), byte);
    }

    /// Write `bytes`, expanding `\n` to `\r\n`.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

impl<IO: PortIo> Write for SerialPort<IO> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

static SERIAL: Mutex<Option<SerialPort<HardwarePorts>>> = Mutex::new(None);

/// Bring up COM1. Output before this call is dropped.
pub fn init() {
    // SAFETY: COM1 is driven from this module only.
    let mut port = SerialPort::new(unsafe { HardwarePorts::new() }, Port::COM1);
    port.init();
    without_interrupts(|| *SERIAL.lock() = Some(port));
}

fn with_port(f: impl FnOnce(&mut SerialPort<HardwarePorts>)) {
    without_interrupts(|| {
        if let Some(port) = SERIAL.lock().as_mut() {
            f(port);
        }
    });
}

pub fn write_line(s: &str) {
    with_port(|port| {
        port.write_bytes(s.as_bytes());
        port.write_bytes(b"\n");
    });
}

pub fn print_args(args: fmt::Arguments<'_>) {
    with_port(|port| {
        let _ = port.write_fmt(args);
    });
}

/// klog sink writing to COM1.
pub fn klog_sink(bytes: &[u8]) {
    with_port(|port| port.write_bytes(bytes));
}

#[macro_export]
macro_rules! serial_println {
    () => {
        $crate::serial::write_line("");
    };
    ($fmt:expr) => {
        $crate::serial::write_line($fmt);
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::serial::print_args(core::format_args!(concat!($fmt, "\n"), $($arg)*));
    };
}

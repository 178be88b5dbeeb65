//! Legacy I/O ports and the register values written to them.

/// An I/O port number, so random `u16`s cannot be passed to `in`/`out`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Port(pub u16);

impl Port {
    /// First serial line (16550 UART).
    pub const COM1: Self = Self(0x3F8);

    pub const PIT_CHANNEL0: Self = Self(0x40);
    pub const PIT_COMMAND: Self = Self(0x43);

    pub const PIC1_COMMAND: Self = Self(0x20);
    pub const PIC1_DATA: Self = Self(0x21);
    pub const PIC2_COMMAND: Self = Self(0xA0);
    pub const PIC2_DATA: Self = Self(0xA1);

    /// Unused POST port; a write here takes roughly a microsecond.
    pub const POST_DELAY: Self = Self(0x80);

    #[inline]
    pub const fn number(self) -> u16 {
        self.0
    }

    /// Register `off` of a device whose registers start at `self`.
    #[inline]
    pub const fn offset(self, off: u16) -> Self {
        Self(self.0 + off)
    }
}

// UART registers, relative to the COM base. THR and IER double as the
// divisor latch while LCR.DLAB is set.
pub const UART_REG_THR: u16 = 0;
pub const UART_REG_IER: u16 = 1;
pub const UART_REG_FCR: u16 = 2;
pub const UART_REG_LCR: u16 = 3;
pub const UART_REG_MCR: u16 = 4;
pub const UART_REG_LSR: u16 = 5;

pub const UART_LCR_DLAB: u8 = 0x80;
/// 8 data bits, no parity, 1 stop bit.
pub const UART_LCR_8N1: u8 = 0x03;
/// FIFOs on and cleared, 14-byte trigger level.
pub const UART_FCR_ENABLE_CLEAR_14: u8 = 0xC7;
pub const UART_MCR_DTR_RTS_OUT2: u8 = 0x0B;
pub const UART_LSR_TX_EMPTY: u8 = 0x20;

/// Input clock of the 8254, in Hz.
pub const PIT_BASE_FREQUENCY_HZ: u32 = 1_193_182;

// 8254 command byte fields.
pub const PIT_COMMAND_CHANNEL0: u8 = 0x00;
pub const PIT_COMMAND_ACCESS_LOHI: u8 = 0x30;
pub const PIT_COMMAND_MODE_SQUARE: u8 = 0x06;
pub const PIT_COMMAND_BINARY: u8 = 0x00;

// 8259 commands.
pub const PIC_EOI: u8 = 0x20;
/// ICW1: edge triggered, cascaded, ICW4 follows.
pub const PIC_ICW1_INIT: u8 = 0x11;
/// Primary: the secondary hangs off IRQ 2.
pub const PIC_ICW3_PRIMARY: u8 = 0x04;
/// Secondary: cascade identity.
pub const PIC_ICW3_SECONDARY: u8 = 0x02;
pub const PIC_ICW4_8086: u8 = 0x01;

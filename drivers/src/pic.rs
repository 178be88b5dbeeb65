use pmos_abi::arch::x86::{
    Port, IRQ_BASE_VECTOR, IRQ_SECONDARY_BASE_VECTOR, PIC_EOI, PIC_ICW1_INIT, PIC_ICW3_PRIMARY,
    PIC_ICW3_SECONDARY, PIC_ICW4_8086,
};
use pmos_lib::klog_debug;

use crate::ports::PortIo;

/// Move IRQ 0-15 to vectors 0x20-0x2F, out of the CPU exception range,
/// and unmask every line.
pub fn remap(io: &mut impl PortIo) {
    io.outb(Port::PIC1_COMMAND, PIC_ICW1_INIT);
    io.io_wait();
    io.outb(Port::PIC2_COMMAND, PIC_ICW1_INIT);
    io.io_wait();
    io.outb(Port::PIC1_DATA, IRQ_BASE_VECTOR);
    io.io_wait();
    io.outb(Port::PIC2_DATA, IRQ_SECONDARY_BASE_VECTOR);
    io.io_wait();
    io.outb(Port::PIC1_DATA, PIC_ICW3_PRIMARY);
    io.io_wait();
    io.outb(Port::PIC2_DATA, PIC_ICW3_SECONDARY);
    io.io_wait();
    io.outb(Port::PIC1_DATA, PIC_ICW4_8086);
    io.io_wait();
    io.outb(Port::PIC2_DATA, PIC_ICW4_8086);
    io.io_wait();
    set_masks(io, 0x00, 0x00);
    klog_debug!(
        "PIC: remapped to 0x{:02x}/0x{:02x}",
        IRQ_BASE_VECTOR,
        IRQ_SECONDARY_BASE_VECTOR
    );
}

pub fn set_masks(io: &mut impl PortIo, primary: u8, secondary: u8) {
    io.outb(Port::PIC1_DATA, primary);
    io.outb(Port::PIC2_DATA, secondary);
}

/// Acknowledge `irq` (0-15) outside the dispatcher, e.g. a spurious line.
pub fn end_of_interrupt(io: &mut impl PortIo, irq: u8) {
    if irq >= 8 {
        io.outb(Port::PIC2_COMMAND, PIC_EOI);
    }
    io.outb(Port::PIC1_COMMAND, PIC_EOI);
}

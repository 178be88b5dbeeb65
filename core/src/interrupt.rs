//! Interrupt dispatch.
//!
//! The boot crate's entry stubs build an [`InterruptFrame`] for every vector
//! and hand it to [`Kernel::dispatch`]. Exceptions without a handler are
//! fatal. Legacy IRQs are acknowledged at the PIC before their handler runs,
//! because the handler may switch to another process and never come back
//! through this path.

use pmos_abi::arch::x86::{
    exception_name, is_exception, is_legacy_irq, Port, IRQ_SECONDARY_BASE_VECTOR, PIC_EOI,
};
use pmos_abi::InterruptFrame;
use pmos_lib::klog_error;
use pmos_mm::{FrameSource, PageFaultReport};

use crate::kernel::{InterruptHandler, Kernel};
use crate::platform::Platform;

impl<P: Platform, F: FrameSource> Kernel<P, F> {
    /// Install `handler` for `vector`, replacing any previous one.
    pub fn register_handler(&mut self, vector: u8, handler: InterruptHandler<P, F>) {
        self.handlers[vector as usize] = Some(handler);
    }

    pub fn unregister_handler(&mut self, vector: u8) {
        self.handlers[vector as usize] = None;
    }

    pub fn dispatch(&mut self, frame: &mut InterruptFrame) {
        let vector = frame.vector();
        let handler = self.handlers[vector as usize];

        if is_exception(vector) {
            match handler {
                Some(handler) => handler(self, frame),
                None => self.fatal_exception(frame),
            }
            return;
        }

        if is_legacy_irq(vector) {
            self.send_eoi(vector);
        }

        // Spurious IRQs and unclaimed vectors are dropped.
        if let Some(handler) = handler {
            handler(self, frame);
        }
    }

    /// Acknowledge a legacy IRQ: secondary controller first when it raised
    /// the interrupt, then the primary.
    pub fn send_eoi(&mut self, vector: u8) {
        if vector >= IRQ_SECONDARY_BASE_VECTOR {
            self.platform.outb(Port::PIC2_COMMAND, PIC_EOI);
        }
        self.platform.outb(Port::PIC1_COMMAND, PIC_EOI);
    }

    fn fatal_exception(&mut self, frame: &InterruptFrame) -> ! {
        let vector = frame.vector();
        klog_error!(
            "EXCEPTION 0x{:02x} ({}) at eip=0x{:08x} err=0x{:x}",
            vector,
            exception_name(vector),
            frame.eip,
            frame.error_code
        );
        klog_error!("System halted.");
        self.platform.halt()
    }
}

pub(crate) fn page_fault_handler<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    frame: &mut InterruptFrame,
) {
    let report = PageFaultReport::new(kernel.platform.fault_address(), frame.eip, frame.error_code);
    klog_error!("{}", report);
    klog_error!("System halted.");
    kernel.platform.halt()
}

pub(crate) fn timer_handler<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    _frame: &mut InterruptFrame,
) {
    kernel.timer_tick();
}

pub(crate) fn syscall_entry<P: Platform, F: FrameSource>(
    kernel: &mut Kernel<P, F>,
    frame: &mut InterruptFrame,
) {
    kernel.syscall_dispatch(frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{boot_kernel, capture_log, captured_log, Event, TestKernel};
    use pmos_abi::arch::x86::{IRQ_BASE_VECTOR, IRQ_LAST_VECTOR};

    fn frame_for(vector: u8) -> InterruptFrame {
        let mut frame = InterruptFrame::zero();
        frame.vector = vector as u32;
        frame.eip = 0x0010_1234;
        frame
    }

    fn record(kernel: &mut TestKernel, frame: &mut InterruptFrame) {
        let vector = frame.vector();
        kernel.platform_mut().events.push(Event::Handler(vector));
    }

    #[test]
    fn irq_eoi_precedes_handler_for_every_legacy_vector() {
        for vector in IRQ_BASE_VECTOR..=IRQ_LAST_VECTOR {
            let mut kernel = boot_kernel();
            kernel.register_handler(vector, record);
            kernel.dispatch(&mut frame_for(vector));

            let mut expected = Vec::new();
            if vector >= 40 {
                expected.push(Event::Out(0xA0, 0x20));
            }
            expected.push(Event::Out(0x20, 0x20));
            expected.push(Event::Handler(vector));
            assert_eq!(kernel.platform().events, expected, "vector {}", vector);
        }
    }

    #[test]
    fn unregistered_irq_is_acknowledged_and_ignored() {
        let mut kernel = boot_kernel();
        kernel.dispatch(&mut frame_for(0x21));
        assert_eq!(kernel.platform().port_writes(), vec![(0x20, 0x20)]);
        kernel.platform_mut().clear();
        kernel.dispatch(&mut frame_for(0x2F));
        assert_eq!(kernel.platform().port_writes(), vec![(0xA0, 0x20), (0x20, 0x20)]);
    }

    #[test]
    fn registered_exception_handler_runs_without_eoi() {
        let mut kernel = boot_kernel();
        kernel.register_handler(3, record);
        kernel.dispatch(&mut frame_for(3));
        assert_eq!(kernel.platform().events, vec![Event::Handler(3)]);
    }

    #[test]
    fn last_registration_wins() {
        fn other(kernel: &mut TestKernel, _frame: &mut InterruptFrame) {
            kernel.platform_mut().events.push(Event::Handler(0xEE));
        }
        let mut kernel = boot_kernel();
        kernel.register_handler(0x90, record);
        kernel.register_handler(0x90, other);
        kernel.dispatch(&mut frame_for(0x90));
        assert_eq!(kernel.platform().events, vec![Event::Handler(0xEE)]);
    }

    #[test]
    fn unclaimed_software_vector_is_ignored() {
        let mut kernel = boot_kernel();
        kernel.dispatch(&mut frame_for(0x90));
        assert!(kernel.platform().events.is_empty());
    }

    #[test]
    fn every_unregistered_exception_halts() {
        for vector in 0..32u8 {
            if vector == 14 {
                continue;
            }
            let result = std::panic::catch_unwind(|| {
                let mut kernel = boot_kernel();
                kernel.dispatch(&mut frame_for(vector));
            });
            assert!(result.is_err(), "vector {} returned", vector);
        }
    }

    #[test]
    #[should_panic(expected = "cpu halted")]
    fn page_fault_halts() {
        let mut kernel = boot_kernel();
        kernel.platform_mut().fault_address = 0x0804_9000;
        let mut frame = frame_for(14);
        frame.error_code = 0x6;
        kernel.dispatch(&mut frame);
    }

    #[test]
    #[should_panic(expected = "cpu halted")]
    fn unregistered_page_fault_also_halts() {
        let mut kernel = boot_kernel();
        kernel.unregister_handler(14);
        kernel.dispatch(&mut frame_for(14));
    }

    #[test]
    fn fatal_exception_reports_vector_name_and_eip() {
        capture_log();
        let result = std::panic::catch_unwind(|| {
            let mut kernel = boot_kernel();
            kernel.dispatch(&mut frame_for(6));
        });
        assert!(result.is_err());
        let log = captured_log();
        assert!(
            log.contains("EXCEPTION 0x06 (Invalid Opcode) at eip=0x00101234 err=0x0\n"),
            "log was: {}",
            log
        );
    }

    #[test]
    fn page_fault_reports_cr2_and_decoded_error() {
        capture_log();
        let result = std::panic::catch_unwind(|| {
            let mut kernel = boot_kernel();
            kernel.platform_mut().fault_address = 0x0804_9abc;
            let mut frame = frame_for(14);
            frame.error_code = 0x7;
            kernel.dispatch(&mut frame);
        });
        assert!(result.is_err());
        let log = captured_log();
        assert!(
            log.contains("PAGE FAULT at 0x08049abc eip=0x00101234 err=0x7 (present, write, user)\n"),
            "log was: {}",
            log
        );
    }
}

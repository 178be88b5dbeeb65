//! Host-side stand-ins for the machine: a recording [`Platform`] and a frame
//! pool backed by ordinary memory.

use pmos_abi::arch::x86::{Port, FRAME_POOL_START, PAGE_SIZE};
use pmos_mm::{BitmapFrameAllocator, FrameSource, PhysFrame};

use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::platform::Platform;

pub const CHILD_ENTRY: u32 = 0x0010_2000;
pub const FORK_TRAMPOLINE: u32 = 0x0010_3000;
pub const BOOT_STACK_TOP: u32 = 0x0020_0000;
/// Marker written as the saved stack pointer of a task switched away from.
pub const SAVED_ESP_MARK: u32 = 0x5AFE_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Out(u16, u8),
    LoadDirectory(u32),
    KernelStack(u32),
    Switch { load: u32 },
    /// Recorded by test handlers.
    Handler(u8),
}

#[derive(Default)]
pub struct MockPlatform {
    pub events: Vec<Event>,
    pub fault_address: u32,
    switches: u32,
}

impl MockPlatform {
    pub fn port_writes(&self) -> Vec<(u16, u8)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Out(port, value) => Some((port, value)),
                _ => None,
            })
            .collect()
    }

    pub fn directory_loads(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::LoadDirectory(root) => Some(root),
                _ => None,
            })
            .collect()
    }

    pub fn switch_loads(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                Event::Switch { load } => Some(load),
                _ => None,
            })
            .collect()
    }

    pub fn last_kernel_stack(&self) -> Option<u32> {
        self.events.iter().rev().find_map(|e| match *e {
            Event::KernelStack(esp0) => Some(esp0),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Platform for MockPlatform {
    fn outb(&mut self, port: Port, value: u8) {
        self.events.push(Event::Out(port.number(), value));
    }

    fn halt(&mut self) -> ! {
        panic!("cpu halted");
    }

    fn fault_address(&self) -> u32 {
        self.fault_address
    }

    fn load_page_directory(&mut self, root: PhysFrame) {
        self.events.push(Event::LoadDirectory(root.start_address()));
    }

    fn set_kernel_stack(&mut self, esp0: u32) {
        self.events.push(Event::KernelStack(esp0));
    }

    unsafe fn switch_stacks(&mut self, save: *mut u32, load: u32) {
        self.switches += 1;
        unsafe {
            *save = SAVED_ESP_MARK + self.switches;
        }
        self.events.push(Event::Switch { load });
    }

    fn child_entry(&self) -> u32 {
        CHILD_ENTRY
    }

    fn fork_trampoline(&self) -> u32 {
        FORK_TRAMPOLINE
    }
}

#[repr(C, align(4096))]
struct PageBuf([u8; PAGE_SIZE as usize]);

/// Frame pool in host memory. Fake physical addresses start at
/// `FRAME_POOL_START`.
pub struct HostFrames {
    _pages: Vec<PageBuf>,
    alloc: BitmapFrameAllocator,
}

impl HostFrames {
    pub fn new(frames: usize) -> Self {
        let mut pages: Vec<PageBuf> = (0..frames).map(|_| PageBuf([0xCC; 4096])).collect();
        let base = pages.as_mut_ptr() as *mut u8;
        // SAFETY: `pages` is owned by the returned value and never resized.
        let alloc = unsafe { BitmapFrameAllocator::new(FRAME_POOL_START, base, frames) };
        Self {
            _pages: pages,
            alloc,
        }
    }

    pub fn free_frames(&self) -> usize {
        self.alloc.free_frames()
    }

    /// Copy of the 32-bit word at fake physical address `addr`.
    pub fn read_u32(&self, addr: u32) -> u32 {
        let frame = PhysFrame::containing_address(addr);
        let offset = (addr - frame.start_address()) as usize;
        let ptr = self.alloc.frame_ptr(frame).wrapping_add(offset) as *const u32;
        unsafe { ptr.read_unaligned() }
    }

    pub fn bytes(&self, frame: PhysFrame) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.alloc.frame_ptr(frame), PAGE_SIZE as usize) }
    }
}

impl FrameSource for HostFrames {
    fn allocate(&mut self) -> Option<PhysFrame> {
        self.alloc.allocate()
    }

    fn free(&mut self, frame: PhysFrame) {
        self.alloc.free(frame)
    }

    fn frame_ptr(&self, frame: PhysFrame) -> *mut u8 {
        self.alloc.frame_ptr(frame)
    }
}

pub type TestKernel = Kernel<MockPlatform, HostFrames>;

pub fn boot_kernel() -> TestKernel {
    boot_kernel_with(KernelConfig::default(), 64)
}

pub fn boot_kernel_with(config: KernelConfig, frames: usize) -> TestKernel {
    let mut kernel = Kernel::new(MockPlatform::default(), HostFrames::new(frames), config, BOOT_STACK_TOP)
        .expect("kernel boots");
    kernel.platform_mut().clear();
    kernel
}

/// Frame as the stub would build it for `int 0x80` issued from ring 0.
pub fn syscall_frame(number: u8, ebx: u32) -> pmos_abi::InterruptFrame {
    use pmos_abi::arch::x86::{SegmentSelector, SYSCALL_VECTOR};
    let mut frame = pmos_abi::InterruptFrame::zero();
    frame.ds = SegmentSelector::KERNEL_DATA.bits() as u32;
    frame.eax = number as u32;
    frame.ebx = ebx;
    frame.vector = SYSCALL_VECTOR as u32;
    frame.eip = 0x0010_4002;
    frame.cs = SegmentSelector::KERNEL_CODE.bits() as u32;
    frame.eflags = pmos_abi::frame::EFLAGS_IF | pmos_abi::frame::EFLAGS_RESERVED;
    frame
}

std::thread_local! {
    static LOG: std::cell::RefCell<Vec<u8>> = const { std::cell::RefCell::new(Vec::new()) };
}

fn log_sink(bytes: &[u8]) {
    LOG.with(|log| log.borrow_mut().extend_from_slice(bytes));
}

/// Route klog into a per-thread buffer, so each test sees only its own
/// lines. Attaching is idempotent.
pub fn capture_log() {
    pmos_lib::klog_attach_sink(log_sink);
}

/// Everything this test thread logged since capture started.
pub fn captured_log() -> String {
    LOG.with(|log| String::from_utf8_lossy(&log.borrow()).into_owned())
}

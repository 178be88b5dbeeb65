//! Process-related types and constants shared between kernel subsystems.

pub type Pid = u32;

pub const MAX_PROCESSES: usize = 64;
/// Every process gets one frame of kernel stack.
pub const KERNEL_STACK_SIZE: u32 = 0x1000;
/// Pid of the bootstrap kernel task. It never exits.
pub const KERNEL_PID: Pid = 1;
/// `wait` filter matching any child (`-1` from the caller's point of view).
pub const WAIT_ANY: u32 = u32::MAX;
/// Value returned in `eax` when a process syscall fails.
pub const SYSCALL_FAILED: u32 = u32::MAX;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Ready = 0,
    Running = 1,
    /// Blocked in `wait` until a child exits.
    Waiting = 2,
    /// Exited; kept until reaped.
    Dead = 3,
}

impl ProcessState {
    /// Whether the scheduler may pick a process in this state.
    #[inline]
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Waiting => "WAITING",
            Self::Dead => "DEAD",
        }
    }
}

//! Leveled kernel log.
//!
//! Lines are formatted in place and handed to a byte sink that the boot code
//! attaches once the serial port is up. Anything logged before that is
//! dropped.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Once;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KlogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl KlogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => KlogLevel::Error,
            1 => KlogLevel::Warn,
            2 => KlogLevel::Info,
            3 => KlogLevel::Debug,
            _ => KlogLevel::Trace,
        }
    }

    /// Parse a level name as used on the kernel command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "error" => Some(KlogLevel::Error),
            "warn" => Some(KlogLevel::Warn),
            "info" => Some(KlogLevel::Info),
            "debug" => Some(KlogLevel::Debug),
            "trace" => Some(KlogLevel::Trace),
            _ => None,
        }
    }
}

/// Destination for formatted log bytes.
pub type KlogSink = fn(&[u8]);

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(KlogLevel::Info as u8);
static SINK: Once<KlogSink> = Once::new();

#[inline(always)]
fn is_enabled(level: KlogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

#[inline(always)]
fn write_bytes(bytes: &[u8]) {
    if let Some(sink) = SINK.get() {
        sink(bytes);
    }
}

struct KlogWriter;

impl fmt::Write for KlogWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_bytes(s.as_bytes());
        Ok(())
    }
}

pub fn log_args(level: KlogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    let _ = fmt::write(&mut KlogWriter, args);
    write_bytes(b"\n");
}

pub fn klog_init(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Route log output to `sink`. Only the first attached sink is kept.
pub fn klog_attach_sink(sink: KlogSink) {
    SINK.call_once(|| sink);
}

pub fn klog_set_level(level: KlogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn klog_get_level() -> KlogLevel {
    KlogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn klog_is_enabled(level: KlogLevel) -> bool {
    is_enabled(level)
}

#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        $crate::klog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! klog_error {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_warn {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_info {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_debug {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! klog_trace {
    ($($arg:tt)*) => {
        $crate::klog::log_args($crate::klog::KlogLevel::Trace, ::core::format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());

    fn capture(bytes: &[u8]) {
        CAPTURED.lock().unwrap().extend_from_slice(bytes);
    }

    fn captured_text() -> String {
        String::from_utf8(CAPTURED.lock().unwrap().clone()).unwrap()
    }

    // Level and sink are process-wide, so the whole lifecycle lives in one test.
    #[test]
    fn levels_filter_and_sink_receives_lines() {
        klog_info!("before sink {}", 1);
        assert!(captured_text().is_empty());

        klog_attach_sink(capture);
        klog_init(KlogLevel::Info);
        klog_info!("pid {} ready", 2);
        klog_debug!("hidden");
        assert_eq!(captured_text(), "pid 2 ready\n");

        klog_set_level(KlogLevel::Debug);
        assert_eq!(klog_get_level(), KlogLevel::Debug);
        assert!(klog_is_enabled(KlogLevel::Debug));
        assert!(!klog_is_enabled(KlogLevel::Trace));
        klog!(KlogLevel::Debug, "now {}", "visible");
        assert!(captured_text().ends_with("now visible\n"));
        klog_set_level(KlogLevel::Info);
    }

    #[test]
    fn level_names_parse() {
        assert_eq!(KlogLevel::from_name("warn"), Some(KlogLevel::Warn));
        assert_eq!(KlogLevel::from_name("trace"), Some(KlogLevel::Trace));
        assert_eq!(KlogLevel::from_name("loud"), None);
        assert!(KlogLevel::Error < KlogLevel::Debug);
    }
}

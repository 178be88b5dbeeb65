//! Boot-time kernel configuration, overridable from the multiboot command
//! line (`timer_hz=100 quantum=3 klog=debug fork_demo=off`).

use pmos_lib::KlogLevel;

pub const DEFAULT_TIMER_HZ: u32 = 50;
pub const DEFAULT_PREEMPT_TICKS: u32 = 5;
pub const DEFAULT_LOG_LEVEL: KlogLevel = KlogLevel::Info;
pub const DEFAULT_FORK_DEMO: bool = true;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// PIT interrupt rate.
    pub timer_hz: u32,
    /// Timer ticks between forced reschedules.
    pub preempt_ticks: u32,
    pub log_level: KlogLevel,
    /// Fork a child from the kernel task at boot and wait for it.
    pub fork_demo: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            timer_hz: DEFAULT_TIMER_HZ,
            preempt_ticks: DEFAULT_PREEMPT_TICKS,
            log_level: DEFAULT_LOG_LEVEL,
            fork_demo: DEFAULT_FORK_DEMO,
        }
    }
}

fn parse_on_off_flag(value: &str, current: bool) -> bool {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value == "1"
    {
        true
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value == "0"
    {
        false
    } else {
        current
    }
}

fn parse_nonzero(value: &str, current: u32) -> u32 {
    match value.parse::<u32>() {
        Ok(parsed) if parsed != 0 => parsed,
        _ => current,
    }
}

fn process_token(config: &mut KernelConfig, token: &str) {
    if let Some(value) = token.strip_prefix("timer_hz=") {
        config.timer_hz = parse_nonzero(value, config.timer_hz);
        return;
    }
    if let Some(value) = token.strip_prefix("quantum=") {
        config.preempt_ticks = parse_nonzero(value, config.preempt_ticks);
        return;
    }
    if let Some(value) = token.strip_prefix("klog=") {
        if let Some(level) = KlogLevel::from_name(value) {
            config.log_level = level;
        }
        return;
    }
    if let Some(value) = token.strip_prefix("fork_demo=") {
        config.fork_demo = parse_on_off_flag(value, config.fork_demo);
    }
}

impl KernelConfig {
    /// Defaults with every recognised `key=value` token of `cmdline` applied.
    /// Unknown tokens and unparsable values are ignored.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::default();
        for token in cmdline.split_whitespace() {
            process_token(&mut config, token);
        }
        config
    }
}

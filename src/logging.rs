use std::sync::atomic::AtomicBool;
pub static TRACE_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_tracing() {
    TRACE_ENABLED.store(true, std::sync::atomic::Ordering::Relaxed);
}

/// Per-packet tracing, off unless `--trace` was passed.
#[macro_export]
macro_rules! trace_packet {
    ($($arg:tt)*) => {{
        if $crate::logging::TRACE_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
            eprintln!("[TRACE] {}", std::format!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {{
        eprintln!("[WARNING] {}", std::format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        println!("{}", std::format!($($arg)*));
    }};
}

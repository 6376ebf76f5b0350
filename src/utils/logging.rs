//! Logger bootstrap, grounded on the teacher's `logger.rs`, trimmed to the
//! single backend this crate needs (`env_logger`) now that the WASM/embedded
//! targets it also supported are gone.

use std::sync::atomic::{AtomicBool, Ordering};

static INIT: AtomicBool = AtomicBool::new(false);

/// Initializes the logger with debug mode, logging all messages including
/// debug/trace messages.
pub fn init_logger_debug() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

/// Initializes the logger with default mode, only logging info and above.
pub fn init_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(false);
    }
}

/// Initializes the logger for `#[test]` functions: trace-level, routed
/// through `env_logger`'s test capture so output only surfaces for failing
/// tests. Idempotent across the whole test binary, same as the other two.
pub fn init_test_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

fn init(debug: bool) {
    let env = if debug {
        "secrec_core=trace"
    } else {
        "secrec_core=info"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(env))
        .is_test(cfg!(test))
        .try_init();
}

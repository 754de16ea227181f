//! Log output for lifecycle events and jitter reports
//!
//! The crate emits `tracing` events only; nothing is printed until a
//! subscriber is installed. `init_tracing` installs a stdout formatter.
//!
//! Author: Moroya Sakamoto

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "rtos_sim=info";

/// Install a stdout subscriber with thread names and uptime timestamps
///
/// Honors `RUST_LOG`. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Like [`init_tracing`], with a fallback filter of the caller's choosing
pub fn init_tracing_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

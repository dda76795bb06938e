//! Feature-gated logging for the stress harness.
//!
//! Build with `--features tracing` to route the harness's `info!`, `debug!`,
//! `warn!` and `error!` calls to the `tracing` crate. Without the feature the
//! macros expand to nothing. The queue operations themselves never log.

/// Installs a `tracing-subscriber` registry writing to stderr.
///
/// The filter comes from `RUST_LOG`, falling back to `owq=debug`. Safe to call
/// more than once; later calls are ignored. A no-op without the `tracing`
/// feature.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("owq=debug"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime());

    // Tests call this from several threads; only the first registration wins.
    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! discard {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use discard as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use discard as warn;

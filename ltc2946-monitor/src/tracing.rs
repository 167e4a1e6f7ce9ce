//! Provide tracing, tailored to this program.
//!
//! Binaries call [`init_journald_or_stderr`] once at startup to install a
//! subscriber. Library code uses `use crate::tracing::prelude::*` for the
//! `trace!()` through `error!()` macros.

use std::env;

use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Initialize logging.
///
/// Under systemd, events go to journald. Otherwise they go to stderr so
/// that measurement output on stdout stays machine-readable.
pub fn init_journald_or_stderr() {
    if env::var("JOURNAL_STREAM").is_ok() {
        match tracing_journald::layer() {
            Ok(layer) => tracing_subscriber::registry().with(layer).init(),
            Err(e) => {
                use_stderr();
                error!(error = %e, "Failed to initialize journald logging, using stderr.");
            }
        }
    } else {
        use_stderr();
    }
}

// Filter according to RUST_LOG, defaulting to INFO rather than ERROR.
fn use_stderr() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimer)
                .with_target(true)
                .compact(),
        )
        .init();
}

// Local wall-clock time to the second; the default timer prints long UTC
// timestamps.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now
            .format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{}", stamp)
    }
}

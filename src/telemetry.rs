//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,quiz=debug,revision=debug,tower_http=info").
//! - LOG_FORMAT selects compact text (default) or "json" structured logs with
//!   event fields flattened to the top level.
//! - Instrumented spans log once on close, carrying their busy/idle time; this
//!   is how model calls and PDF rendering show their latency.
//!
//! Targets in use: `quiz`, `revision`, `quicklearn_backend`.

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const DEFAULT_FILTER: &str = "info,quiz=debug,revision=debug,quicklearn_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    let installed = if json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().try_init()
    };
    if let Err(e) = installed {
        eprintln!("tracing subscriber not installed: {e}");
    }
}

//! Logging initialization for the CLI.
//!
//! The library only emits `tracing` events; the subscriber lives here.

use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - emit JSON lines to stderr
///
/// Asset server requests are logged inside an `asset_request` span that
/// carries the store name, so JSON lines look like:
/// ```json
/// {"timestamp":"...","level":"DEBUG","span":{"store":"my-shop","method":"GET","uri":"/@vite/client","name":"asset_request"},"fields":{"message":"served","status":200}}
/// ```
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG sets the baseline, the verbosity flag raises our own crates
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(crate_directive("adastra_core", level))
        .add_directive(crate_directive("adastra", level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn crate_directive(target: &str, level: Level) -> Directive {
    format!("{target}={level}")
        .parse()
        .unwrap_or_else(|_| level.into())
}

//! Tracing setup for the `ego` binary.
//!
//! Events go to stderr so they never mix with generated output or rendered
//! diagnostics on stdout. `RUST_LOG` takes precedence over `-v`/`-q`.

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::args::GlobalArgs;

/// Filter directive used when `RUST_LOG` is unset.
fn default_directive(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        return "error";
    }
    match global.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init_tracing(global: &GlobalArgs) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(global)));

    let verbose = global.verbose > 1;
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_filter(env_filter);

    Registry::default().with(stderr_layer).init();
}

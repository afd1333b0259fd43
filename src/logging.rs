//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set. Otherwise everything else logs at `warn` and this
//! crate at `info`, `debug` or `trace` depending on `verbosity`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,vatrader={level}")))
        .unwrap_or_else(|_| EnvFilter::new("vatrader=info"));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    // A second init (e.g. from tests driving the CLI) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

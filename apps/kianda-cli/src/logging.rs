use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
///
/// `RUST_LOG` wins; otherwise each `-v` raises the default level to at least
/// info, debug, then trace.
pub fn init(config: &LoggingConfig, verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(&config.level, verbose)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// `-v` is a floor: it raises the default level of the configured directive
/// and never lowers it. Per-target directives are kept as they are.
fn directive(configured: &str, verbose: u8) -> String {
    let floor = match verbose {
        0 => return configured.to_owned(),
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let mut has_default = false;
    let mut parts: Vec<String> = configured
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<LevelFilter>() {
            Ok(level) => {
                has_default = true;
                level.max(floor).to_string()
            }
            Err(_) => part.to_owned(),
        })
        .collect();
    if !has_default {
        parts.push(floor.to_string());
    }
    parts.join(",")
}

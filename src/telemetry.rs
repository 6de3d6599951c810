//! Tracing setup for test binaries

use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::infrastructure::log_messages::telemetry as messages;

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a
/// subscriber was already installed, which is normal when several tests in
/// one binary call this.
pub fn init(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer();
    let result = match settings.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "full" => builder.try_init(),
        _ => builder.compact().try_init(),
    };

    match result {
        Ok(()) => {
            if !matches!(settings.format.as_str(), "pretty" | "full" | "compact") {
                warn!(format = %settings.format, "{}", messages::UNKNOWN_FORMAT);
            }
            true
        }
        Err(_) => {
            debug!("{}", messages::ALREADY_INITIALIZED);
            false
        }
    }
}

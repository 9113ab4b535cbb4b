use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;

const DEFAULT_FILTER: &str = "confer_core=debug";

/// Initialize tracing/logging. Call once from the host before using
/// `ConferClient`; later calls are no-ops.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &ClientConfig) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let directive = config.log_filter.as_deref().unwrap_or(DEFAULT_FILTER);
            EnvFilter::try_new(directive).unwrap_or_else(|e| {
                eprintln!("invalid log filter {directive:?}: {e}");
                EnvFilter::new(DEFAULT_FILTER)
            })
        });
        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init()
            .is_err()
        {
            eprintln!("a tracing subscriber is already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        let config = ClientConfig {
            log_filter: Some("not a [valid filter".into()),
            ..Default::default()
        };
        init_logging(&config);
        init_logging(&ClientConfig::default());
        tracing::debug!("logging initialised");
    }
}

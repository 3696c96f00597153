pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Logs go to stderr so command
/// output on stdout stays machine-readable. `RUST_LOG` wins over the
/// configured filter.
pub fn init_tracing(settings: &config::Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    // A subscriber installed earlier (by a test harness or an embedding
    // program) keeps receiving events; only the filter above goes unused.
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed, keeping it");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_tracing_init_is_harmless() {
        let settings = config::Settings::default();
        init_tracing(&settings);
        init_tracing(&settings);
        tracing::info!("still logging");
    }
}

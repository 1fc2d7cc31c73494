pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

pub use commands::tester::{Tester, TriggerOutcome};
pub use config::TesterConfig;
pub use error::{AppError, ErrorKind};
pub use services::classifier::adapter::ImageClassifier;

/// Installs the global tracing subscriber (`RUST_LOG` filter, fmt output).
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

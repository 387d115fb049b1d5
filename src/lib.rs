pub mod config;
pub mod dicom;
pub mod error;
pub mod events;
pub mod globals;
pub mod http;
pub mod index;
pub mod jobs;
pub mod negotiation;
pub mod plugins;
pub mod policy;
pub mod rest;
pub mod router;
pub mod server;
pub mod storage;

use tracing_subscriber::{self, prelude::*};

use crate::config::Config;

/// Boots logging, then runs the HTTP engine and the DICOM SCP side by
/// side until the process receives Ctrl+C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_logging(&config.logging);
    tracing::info!("starting pixelvault (AET: {})", config.dicom.aet);

    tokio::select! {
        result = server::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

fn init_logging(logging: &config::LoggingConfig) {
    if logging.log_to_file {
        let file_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::fs::File::create(&logging.log_file_path).expect("failed to open log file"));

        let stdout_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true);

        let _ = tracing_subscriber::registry()
            .with(file_appender)
            .with(stdout_appender)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_file(true)
            .with_line_number(true)
            .try_init();
    }
}

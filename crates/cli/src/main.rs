use tracing::error;

/// CLI module for argument parsing and session execution.
mod cli;
/// Console rendering of session progress.
mod console;
/// Logging module for setting up tracing.
mod logging;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        error!("{}", e);
        #[allow(clippy::exit, reason = "fatal session errors terminate the process")]
        std::process::exit(1);
    }
}

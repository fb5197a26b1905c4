use colored::Colorize;
use log::{error, info};
use tandem_server::{run_server, ServerConfig, ServerError};

mod logging;

async fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;

    info!(
        "Starting tandem on {} (outbox capacity {})",
        config.addr(),
        config.outbox_capacity
    );

    run_server(config).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", err);
    }

    if let Err(error) = run().await {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "tandem failed to start!".bold().red()
        );
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint()).dimmed().italic()
        );

        std::process::exit(1);
    }
}

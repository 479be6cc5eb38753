//! interop-server: the gRPC interop test server.
//!
//! # Usage
//!
//! ```bash
//! interop-server --port 10000
//! RUST_LOG=interop_core=trace interop-server --port 10000 --host 127.0.0.1
//! ```

use clap::Parser;
use interop_core::logging::{init_detailed_logging, init_logging_with_level};
use interop_core::InteropError;
use tracing::{info, warn};

mod cli;

#[tokio::main]
async fn main() -> Result<(), InteropError> {
    let args = cli::Args::parse();

    if args.verbose {
        init_detailed_logging();
    } else {
        init_logging_with_level(&args.log_level);
    }

    let config = args.server_config()?;
    info!(addr = %config.listen_addr(), "Starting interop server");

    interop_tonic::serve(config, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(err) => {
            warn!(error = %err, "Cannot listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}

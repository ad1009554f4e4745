// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Supervisory server for field controllers
//!
//! Listens for controller subscriptions and HELLO liveness on one UDP port,
//! accepts controller-initiated data on one TCP port, and lets an operator
//! drive `set`/`get` petitions and a `list` of known controllers from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Start with identity config and allow-list
//! xarxes-server --config server.conf --controllers controllers.csv
//!
//! # Verbose logging
//! xarxes-server --config server.conf --controllers controllers.csv --debug
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod codec;
mod config;
mod console;
mod handlers;
mod persistence;
mod pool;
mod registry;
mod supervisor;

pub use config::ServerConfig;
pub use registry::ControllerRegistry;
pub use supervisor::Supervisor;

const POOL_WORKERS: usize = 5;
const POOL_QUEUE_CAPACITY: usize = 20;

/// Supervisory server for field controllers speaking the fixed-layout
/// UDP/TCP protocol.
#[derive(Parser, Debug)]
#[command(name = "xarxes-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server identity configuration (`Key=value` text: Name, MAC, TCP-port, UDP-port)
    #[arg(short = 'c', long = "config", default_value = "server.cfg")]
    config: PathBuf,

    /// Allow-list of controllers (`name,mac` per line)
    #[arg(short = 'u', long = "controllers", default_value = "controllers.dat")]
    controllers: PathBuf,

    /// Enable debug-level logging
    #[arg(short, long, default_value = "false")]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("failed to install global logger");
    }

    let config = match ServerConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load server configuration");
            return ExitCode::FAILURE;
        }
    };

    let registry = match ControllerRegistry::load(&args.controllers) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "failed to load controllers allow-list");
            return ExitCode::FAILURE;
        }
    };

    info!("+----------------------------------------------------+");
    info!("|           Supervisory Server                        |");
    info!("+----------------------------------------------------+");
    info!("|  Name:        {:38} |", config.name);
    info!("|  UDP port:    {:38} |", config.udp_port);
    info!("|  TCP port:    {:38} |", config.tcp_port);
    info!("|  Controllers: {:38} |", registry.len());
    info!("+----------------------------------------------------+");

    let config = Arc::new(config);
    let registry = Arc::new(registry);
    let data_dir = PathBuf::from(".");

    let supervisor = match Supervisor::new(
        config,
        registry,
        data_dir,
        POOL_WORKERS,
        POOL_QUEUE_CAPACITY,
    )
    .await
    {
        Ok(supervisor) => supervisor,
        Err(e) => {
            error!(error = %e, "failed to start supervisor");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown signal received, closing server...");
        shutdown.notify_waiters();
    });

    if let Err(e) = supervisor.run().await {
        error!(error = %e, "supervisor exited with an error");
        return ExitCode::FAILURE;
    }

    info!("server stopped");
    ExitCode::SUCCESS
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session supervisor: the top-level async task multiplexing the UDP socket,
//! the TCP listener, the operator console, the liveness sweep, and shutdown
//! (§4.3). Dispatch only; no protocol validation or session mutation beyond
//! the sweep's own registry call lives here — the handlers own that.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::codec::{UdpFrame, UDP_FRAME_LEN};
use crate::config::ServerConfig;
use crate::console::{self, Command};
use crate::handlers::{self, data_in, data_out};
use crate::pool::WorkerPool;
use crate::registry::{now_secs, ControllerRegistry, Status};

const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const LIVENESS_MAX_AGE_SECS: u64 = 6;

pub struct Supervisor {
    config: Arc<ServerConfig>,
    registry: Arc<ControllerRegistry>,
    data_dir: Arc<PathBuf>,
    pool: WorkerPool,
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
    shutdown: Arc<Notify>,
}

impl Supervisor {
    /// Binds the UDP and TCP listening sockets from `config`'s ports and
    /// spawns the worker pool. Binding failure is fatal to the caller.
    pub async fn new(
        config: Arc<ServerConfig>,
        registry: Arc<ControllerRegistry>,
        data_dir: PathBuf,
        pool_workers: usize,
        pool_queue_capacity: usize,
    ) -> Result<Self, SupervisorError> {
        let udp_addr = format!("0.0.0.0:{}", config.udp_port);
        let udp = UdpSocket::bind(&udp_addr)
            .await
            .map_err(|e| SupervisorError::Bind(udp_addr, e.to_string()))?;

        let tcp_addr = format!("0.0.0.0:{}", config.tcp_port);
        let tcp = TcpListener::bind(&tcp_addr)
            .await
            .map_err(|e| SupervisorError::Bind(tcp_addr, e.to_string()))?;

        Ok(Self {
            config,
            registry,
            data_dir: Arc::new(data_dir),
            pool: WorkerPool::new(pool_workers, pool_queue_capacity),
            udp: Arc::new(udp),
            tcp,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// A handle the caller can notify (e.g. from a `ctrl_c` listener) to
    /// trigger the same orderly shutdown the `quit` console command does.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Runs the multiplex loop until a shutdown notification arrives, then
    /// drains the worker pool before returning.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            let mut udp_buf = [0u8; UDP_FRAME_LEN];
            tokio::select! {
                result = self.udp.recv_from(&mut udp_buf) => {
                    match result {
                        Ok((n, source)) => self.on_udp_datagram(&udp_buf, n, source).await,
                        Err(e) => warn!(error = %e, "error reading UDP socket"),
                    }
                }

                result = self.tcp.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "accepted TCP connection");
                            let config = self.config.clone();
                            let registry = self.registry.clone();
                            let data_dir = self.data_dir.clone();
                            if self
                                .pool
                                .submit(async move {
                                    data_in::handle(stream, config, registry, data_dir).await;
                                })
                                .await
                                .is_err()
                            {
                                warn!("worker pool closed, dropping TCP connection");
                            }
                        }
                        Err(e) => warn!(error = %e, "unexpected error while receiving TCP connection"),
                    }
                }

                _ = sweep.tick() => self.sweep_liveness(),

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => self.on_console_line(&line).await,
                        Ok(None) => debug!("stdin closed"),
                        Err(e) => warn!(error = %e, "error reading console input"),
                    }
                }

                _ = self.shutdown.notified() => {
                    info!("closing server...");
                    break;
                }
            }
        }

        self.pool.shutdown().await;
        Ok(())
    }

    async fn on_udp_datagram(&self, buf: &[u8; UDP_FRAME_LEN], n: usize, source: SocketAddr) {
        if n != UDP_FRAME_LEN {
            warn!(%source, len = n, "dropping malformed UDP datagram");
            return;
        }
        let frame = UdpFrame::from_bytes(buf);
        let socket = self.udp.clone();
        let config = self.config.clone();
        let registry = self.registry.clone();
        if self
            .pool
            .submit(async move {
                handlers::dispatch_udp(socket, config, registry, frame, source).await;
            })
            .await
            .is_err()
        {
            warn!("worker pool closed, dropping UDP datagram");
        }
    }

    fn sweep_liveness(&self) {
        let expired = self.registry.sweep_expired(now_secs(), LIVENESS_MAX_AGE_SECS);
        for index in expired {
            let (name, _) = self.registry.identity(index);
            info!(controller = %name, "hasn't sent 3 consecutive HELLO packets, disconnecting");
        }
    }

    async fn on_console_line(&self, line: &str) {
        match console::parse(line) {
            Command::List => {
                print!("{}", console::format_list(&self.registry.list_snapshot()));
            }
            Command::Set { controller, device, value } => {
                self.dispatch_data_out(&controller, device, value).await
            }
            Command::Get { controller, device } => {
                self.dispatch_data_out(&controller, device, String::new()).await
            }
            Command::Quit => self.shutdown.notify_waiters(),
            Command::Invalid(message) => warn!("{}", message),
            Command::Usage => {
                println!(
                    "Usage: list | set <controller-name> <device-name> <value> | get <controller-name> <device-name> | quit"
                );
            }
        }
    }

    async fn dispatch_data_out(&self, controller: &str, device: String, value: String) {
        let Some(index) = self.registry.find_by_name(controller) else {
            warn!(%controller, "controller not found or disconnected");
            return;
        };
        if self.registry.status(index) == Status::Disconnected {
            warn!(%controller, "controller not found or disconnected");
            return;
        }

        let config = self.config.clone();
        let registry = self.registry.clone();
        let data_dir = self.data_dir.clone();
        if self
            .pool
            .submit(async move {
                data_out::issue(config, registry, data_dir, index, device, value).await;
            })
            .await
            .is_err()
        {
            warn!("worker pool closed, dropping data petition");
        }
    }
}

#[derive(Debug)]
pub enum SupervisorError {
    Bind(String, String),
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(addr, e) => write!(f, "failed to bind {}: {}", addr, e),
        }
    }
}

impl std::error::Error for SupervisorError {}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operator-initiated `GET_DATA`/`SET_DATA` issuer: one outbound TCP round
//! trip per `get`/`set` console command (§4.8).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::codec::{TcpFrame, TcpType, TCP_FRAME_LEN};
use crate::config::ServerConfig;
use crate::persistence;
use crate::registry::ControllerRegistry;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Issues a `GET_DATA` (empty `value`) or `SET_DATA` (non-empty `value`)
/// petition to the controller at `index` and awaits its reply.
pub async fn issue(
    config: Arc<ServerConfig>,
    registry: Arc<ControllerRegistry>,
    data_dir: Arc<PathBuf>,
    index: usize,
    device: String,
    value: String,
) {
    let (name, mac) = registry.identity(index);
    let (name, mac) = (name.to_string(), mac.to_string());
    let session = registry.snapshot(index);

    let addr = format!("{}:{}", session.ip, session.tcp_port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(controller = %name, %addr, error = %e, "connection to controller failed");
            registry.disconnect(index);
            return;
        }
    };

    let kind = if value.is_empty() { TcpType::GetData } else { TcpType::SetData };
    let request = TcpFrame::new(kind, &config.mac, &session.rand, &device, &value, "");
    if let Err(e) = stream.write_all(&request.to_bytes()).await {
        warn!(controller = %name, error = %e, "failed to send data petition");
        registry.disconnect(index);
        return;
    }

    let mut buf = [0u8; TCP_FRAME_LEN];
    let reply = match timeout(RECV_TIMEOUT, stream.read_exact(&mut buf)).await {
        Ok(Ok(_)) => TcpFrame::from_bytes(&buf),
        _ => TcpFrame::timed_out_or_closed(),
    };

    if reply.kind == TcpType::TimedOutOrClosed {
        warn!(controller = %name, "didn't receive a DATA_ACK packet in 3 seconds, disconnecting");
        registry.disconnect(index);
        return;
    }

    if reply.mac != mac || reply.rnd != session.rand {
        warn!(controller = %name, "received wrong DATA_ACK credentials, disconnecting");
        registry.disconnect(index);
        return;
    }
    if reply.device != device {
        warn!(controller = %name, "received wrong requested device, disconnecting");
        registry.disconnect(index);
        return;
    }
    if kind == TcpType::SetData && reply.value != value {
        warn!(controller = %name, "received wrong value for requested device, disconnecting");
        registry.disconnect(index);
        return;
    }

    match reply.kind {
        TcpType::DataAck => {
            info!(controller = %name, device = %reply.device, "received confirmation, storing data...");
            let result = persistence::append_record(
                data_dir.as_path(),
                &name,
                &session.situation,
                TcpType::DataAck.log_name(),
                &reply.device,
                &reply.value,
            )
            .await;

            match result {
                Ok(()) => {
                    info!(controller = %name, device = %reply.device, value = %reply.value, "controller updated");
                }
                Err(e) => {
                    let reason = format!("Couldn't store {} data {}.", reply.device, e);
                    warn!(controller = %name, device = %reply.device, error = %e, "couldn't store data from controller");
                    let nack = TcpFrame::new(
                        TcpType::DataNack,
                        &mac,
                        &session.rand,
                        &reply.device,
                        &reply.value,
                        &reason,
                    );
                    if let Err(e) = stream.write_all(&nack.to_bytes()).await {
                        warn!(controller = %name, error = %e, "failed to send DATA_NACK");
                    }
                    registry.disconnect(index);
                }
            }
        }
        TcpType::DataNack => {
            warn!(controller = %name, reason = %reply.data, "couldn't get device info");
        }
        TcpType::DataRej => {
            warn!(controller = %name, "controller rejected data, disconnecting");
            registry.disconnect(index);
        }
        other => {
            warn!(controller = %name, kind = ?other, "unknown packet received");
        }
    }
}

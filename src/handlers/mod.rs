// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol handlers dispatched by the session supervisor onto the worker pool.

pub mod data_in;
pub mod data_out;
pub mod hello;
pub mod subscription;

use std::net::SocketAddr;
use std::sync::Arc;

use rand::Rng;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::codec::{UdpFrame, UdpType};
use crate::config::ServerConfig;
use crate::registry::{ControllerRegistry, Status};

/// Generates a uniform, zero-padded 8-digit session token.
pub(crate) fn generate_rand() -> String {
    format!("{:08}", rand::rng().random_range(0..100_000_000u32))
}

/// Sends `SUBS_REJ` via `socket`, echoing back the `rnd` the rejected frame carried.
pub(crate) async fn send_subs_rej(
    socket: &UdpSocket,
    config: &ServerConfig,
    rnd: &str,
    addr: SocketAddr,
    reason: &str,
) {
    let frame = UdpFrame::new(UdpType::SubsRej, &config.mac, rnd, reason);
    if let Err(e) = socket.send_to(&frame.to_bytes(), addr).await {
        warn!(error = %e, %addr, "failed to send SUBS_REJ");
    }
}

/// Sends `HELLO_REJ` via `socket`, echoing back the `rnd` the rejected frame carried.
pub(crate) async fn send_hello_rej(socket: &UdpSocket, config: &ServerConfig, rnd: &str, addr: SocketAddr) {
    let frame = UdpFrame::new(UdpType::HelloRej, &config.mac, rnd, "");
    if let Err(e) = socket.send_to(&frame.to_bytes(), addr).await {
        warn!(error = %e, %addr, "failed to send HELLO_REJ");
    }
}

/// Top-level UDP dispatch (the worker-pool task body for every inbound UDP
/// datagram): looks the sender up in the registry and routes by session
/// status to either the subscription handler or the HELLO handler.
pub async fn dispatch_udp(
    socket: Arc<UdpSocket>,
    config: Arc<ServerConfig>,
    registry: Arc<ControllerRegistry>,
    frame: UdpFrame,
    source: SocketAddr,
) {
    let name_token = frame.data.split(',').next().unwrap_or("");

    let Some(index) = registry.find_by_udp(&frame.mac, name_token) else {
        warn!(mac = %frame.mac, "denied connection: not listed in allowed controllers file");
        send_subs_rej(
            &socket,
            &config,
            "00000000",
            source,
            "You are not listed in allowed Controllers file",
        )
        .await;
        return;
    };

    let status = registry.status(index);
    if status == Status::Disconnected {
        subscription::handle_disconnected(&socket, &config, &registry, index, &frame, source).await
    } else if status == Status::Subscribed || status == Status::SendHello {
        hello::handle_hello(&socket, &config, &registry, index, &frame, source).await
    } else {
        debug_assert!(status.is_transient_wait(), "unhandled controller status");
        let (name, _) = registry.identity(index);
        warn!(controller = %name, "denied connection: invalid status");
        send_subs_rej(&socket, &config, "00000000", source, "Invalid Status").await;
        registry.clear_liveness(index);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HELLO liveness loop: validates and answers HELLO frames, refreshes
//! `last_packet_time`, and promotes SUBSCRIBED controllers to SEND_HELLO.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::codec::{UdpFrame, UdpType};
use crate::config::ServerConfig;
use crate::registry::{now_secs, ControllerRegistry, Status};

use super::send_hello_rej;

/// Invoked for UDP frames from a controller currently SUBSCRIBED or SEND_HELLO.
pub async fn handle_hello(
    socket: &UdpSocket,
    config: &ServerConfig,
    registry: &ControllerRegistry,
    index: usize,
    frame: &UdpFrame,
    source: SocketAddr,
) {
    let (name, mac) = registry.identity(index);
    let (name, mac) = (name.to_string(), mac.to_string());

    if frame.kind == UdpType::HelloRej {
        info!(controller = %name, "received HELLO_REJ, disconnecting");
        registry.disconnect(index);
        return;
    }

    let session = registry.snapshot(index);

    if frame.kind != UdpType::Hello {
        send_hello_rej(socket, config, &session.rand, source).await;
        return;
    }

    let matches_situation = frame.data.split(',').any(|token| token == session.situation);
    let valid = matches_situation && frame.mac == mac && frame.rnd == session.rand;

    if !valid {
        send_hello_rej(socket, config, &session.rand, source).await;
        warn!(controller = %name, "sent incorrect HELLO packet, disconnecting");
        registry.disconnect(index);
        return;
    }

    registry.mark_hello(index, now_secs());

    let reply_data = format!("{},{}", name, session.situation);
    let reply = UdpFrame::new(UdpType::Hello, &config.mac, &session.rand, &reply_data);
    if let Err(e) = socket.send_to(&reply.to_bytes(), source).await {
        warn!(controller = %name, error = %e, "failed to send HELLO reply");
    }

    if session.status == Status::Subscribed {
        info!(controller = %name, "set to SEND_HELLO status");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Four-message subscription handshake (`SUBS_REQ -> SUBS_ACK -> SUBS_INFO -> INFO_ACK`),
//! including the ephemeral-port dance described in §4.4.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::codec::{UdpFrame, UdpType, UDP_FRAME_LEN};
use crate::config::ServerConfig;
use crate::registry::{now_secs, ControllerRegistry, MAX_DEVICES};

use super::{generate_rand, send_subs_rej};

const SUBS_INFO_TIMEOUT: Duration = Duration::from_secs(2);

/// Entry point for a UDP frame from a controller currently DISCONNECTED.
///
/// Checks the handshake preconditions before committing to anything: `frame.rnd`
/// must be eight ASCII zeros and the situation token (second comma-separated
/// field of `frame.data`) must be exactly 12 chars and not all zeros. Failing
/// either sends `SUBS_REJ` on `main_socket` and leaves the controller untouched.
pub async fn handle_disconnected(
    main_socket: &UdpSocket,
    config: &ServerConfig,
    registry: &ControllerRegistry,
    index: usize,
    frame: &UdpFrame,
    source: SocketAddr,
) {
    let (name, mac) = registry.identity(index);
    let (name, mac) = (name.to_string(), mac.to_string());

    let situation = frame.data.splitn(2, ',').nth(1).unwrap_or("");
    let well_formed = frame.rnd == "00000000"
        && situation.len() == 12
        && situation.as_bytes().iter().any(|&b| b != b'0');

    if !well_formed {
        info!(controller = %name, "denied connection: wrong situation or code format");
        send_subs_rej(
            main_socket,
            config,
            "00000000",
            source,
            "Wrong Situation or Code format",
        )
        .await;
        return;
    }

    run_handshake(config, registry, index, &name, &mac, situation, main_socket, source).await;
}

async fn run_handshake(
    config: &ServerConfig,
    registry: &ControllerRegistry,
    index: usize,
    name: &str,
    mac: &str,
    situation: &str,
    main_socket: &UdpSocket,
    source: SocketAddr,
) {
    let ephemeral = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(controller = %name, error = %e, "failed to open ephemeral subscription socket");
            return;
        }
    };
    let port = match ephemeral.local_addr() {
        Ok(addr) => addr.port(),
        Err(e) => {
            warn!(controller = %name, error = %e, "failed to read ephemeral socket's assigned port");
            return;
        }
    };

    let rand = generate_rand();
    let ack = UdpFrame::new(UdpType::SubsAck, &config.mac, &rand, &port.to_string());
    if let Err(e) = main_socket.send_to(&ack.to_bytes(), source).await {
        warn!(controller = %name, error = %e, "failed to send SUBS_ACK");
        return;
    }
    registry.begin_wait_info(index);
    info!(controller = %name, "WAIT_INFO, sent SUBS_ACK");

    let mut buf = [0u8; UDP_FRAME_LEN];
    let (info_frame, peer) = match timeout(SUBS_INFO_TIMEOUT, ephemeral.recv_from(&mut buf)).await {
        Ok(Ok((n, peer))) if n == UDP_FRAME_LEN => (UdpFrame::from_bytes(&buf), peer),
        Ok(Ok((n, _))) => {
            warn!(controller = %name, len = n, "malformed SUBS_INFO datagram, disconnecting");
            registry.disconnect(index);
            return;
        }
        Ok(Err(e)) => {
            warn!(controller = %name, error = %e, "error receiving SUBS_INFO, disconnecting");
            registry.disconnect(index);
            return;
        }
        Err(_) => {
            info!(
                controller = %name,
                "hasn't sent SUBS_INFO in the last 2 seconds, disconnecting"
            );
            registry.disconnect(index);
            return;
        }
    };

    let mut parts = info_frame.data.splitn(2, ',');
    let tcp_part = parts.next().unwrap_or("");
    let devices_part = parts.next().unwrap_or("");

    let tcp_port: Option<u16> = tcp_part.parse().ok();
    let devices: Vec<String> = devices_part
        .split(';')
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect();

    let valid = info_frame.mac == mac
        && info_frame.rnd == rand
        && tcp_port.is_some()
        && !devices_part.is_empty()
        && !devices.is_empty()
        && devices.len() <= MAX_DEVICES;

    if !valid {
        info!(controller = %name, "disconnecting: wrong info in SUBS_INFO packet");
        let rej = UdpFrame::new(
            UdpType::SubsRej,
            &config.mac,
            "00000000",
            "Wrong Info in SUBS_INFO packet",
        );
        if let Err(e) = ephemeral.send_to(&rej.to_bytes(), peer).await {
            warn!(controller = %name, error = %e, "failed to send SUBS_REJ on ephemeral socket");
        }
        registry.disconnect(index);
        return;
    }

    let ip = match peer {
        SocketAddr::V4(v4) => v4.ip().to_string(),
        SocketAddr::V6(v6) => v6.ip().to_string(),
    };

    registry.commit_subscription(
        index,
        rand.clone(),
        situation.to_string(),
        devices.clone(),
        tcp_port.expect("validated above"),
        ip,
        now_secs(),
    );
    info!(controller = %name, devices = ?devices, "SUBSCRIBED");

    let info_ack = UdpFrame::new(UdpType::InfoAck, &config.mac, &rand, &config.tcp_port.to_string());
    if let Err(e) = ephemeral.send_to(&info_ack.to_bytes(), peer).await {
        warn!(controller = %name, error = %e, "failed to send INFO_ACK");
    }
}

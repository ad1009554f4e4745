// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP data-in handler: accepts one `SEND_DATA` frame per connection, validates
//! it against the registry, persists it, and answers (§4.7).

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
use crate::registry::{ControllerRegistry, Status};

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn handle(
    mut stream: TcpStream,
    config: Arc<ServerConfig>,
    registry: Arc<ControllerRegistry>,
    data_dir: Arc<PathBuf>,
) {
    let frame = read_frame(&mut stream).await;

    if frame.kind == TcpType::TimedOutOrClosed {
        warn!("haven't received data through TCP socket in 3 seconds, closing socket");
        return;
    }

    if frame.kind != TcpType::SendData {
        warn!(mac = %frame.mac, kind = ?frame.kind, "expected [SEND_DATA], received something else");
        return;
    }

    let Some(index) = registry.find_by_tcp(&frame.mac) else {
        warn!(mac = %frame.mac, "denied connection: not listed in allowed controllers file");
        reply(
            &mut stream,
            &config,
            TcpType::DataRej,
            &frame,
            "Not listed in allowed Controllers file.",
        )
        .await;
        return;
    };

    let (name, _) = registry.identity(index);
    let name = name.to_string();
    let session = registry.snapshot(index);

    if frame.rnd != session.rand {
        warn!(controller = %name, "denied connection: wrong identification");
        reply(&mut stream, &config, TcpType::DataRej, &frame, "Wrong Identification.").await;
        registry.disconnect(index);
        return;
    }

    if session.status != Status::SendHello {
        warn!(controller = %name, "denied connection: controller is not in SEND_HELLO status");
        reply(
            &mut stream,
            &config,
            TcpType::DataRej,
            &frame,
            "Controller is not in SEND_HELLO status.",
        )
        .await;
        registry.disconnect(index);
        return;
    }

    if !registry.has_device(index, &frame.device) {
        warn!(controller = %name, device = %frame.device, "denied connection: device not found");
        let reason = format!("Controller doesn't have {} device.", frame.device);
        reply(&mut stream, &config, TcpType::DataNack, &frame, &reason).await;
        registry.disconnect(index);
        return;
    }

    match persistence::append_record(
        data_dir.as_path(),
        &name,
        &session.situation,
        TcpType::SendData.log_name(),
        &frame.device,
        &frame.value,
    )
    .await
    {
        Ok(()) => {
            info!(controller = %name, device = %frame.device, value = %frame.value, "updated device");
            reply(&mut stream, &config, TcpType::DataAck, &frame, "").await;
        }
        Err(e) => {
            let reason = format!("Couldn't store {} data {}.", frame.device, e);
            warn!(controller = %name, device = %frame.device, error = %e, "couldn't store data");
            reply(&mut stream, &config, TcpType::DataNack, &frame, &reason).await;
            registry.disconnect(index);
        }
    }
}

/// Reads one frame with a 3-second deadline. A timed-out read or a peer that
/// closes early decodes to the §4.1 sentinel `TimedOutOrClosed` frame rather
/// than failing structurally.
async fn read_frame(stream: &mut TcpStream) -> TcpFrame {
    let mut buf = [0u8; TCP_FRAME_LEN];
    match timeout(RECV_TIMEOUT, stream.read_exact(&mut buf)).await {
        Ok(Ok(_)) => TcpFrame::from_bytes(&buf),
        _ => TcpFrame::timed_out_or_closed(),
    }
}

/// Replies with `kind`, echoing the request's `rnd`, `device`, and `value`,
/// and carrying `reason` as a human-readable explanation in `data`.
async fn reply(stream: &mut TcpStream, config: &ServerConfig, kind: TcpType, request: &TcpFrame, reason: &str) {
    let frame = TcpFrame::new(kind, &config.mac, &request.rnd, &request.device, &request.value, reason);
    if let Err(e) = stream.write_all(&frame.to_bytes()).await {
        warn!(error = %e, "failed to send TCP reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ControllerRegistry;
    use std::io::Write as _;
    use tokio::net::TcpListener;

    fn test_config() -> ServerConfig {
        ServerConfig {
            name: "SERVER".into(),
            mac: "AABBCCDDEEFF".into(),
            tcp_port: 7000,
            udp_port: 7001,
        }
    }

    fn send_hello_registry() -> (tempfile::NamedTempFile, ControllerRegistry) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"CTRL-A01,0123456789AB\n").unwrap();
        let registry = ControllerRegistry::load(f.path()).unwrap();
        registry.commit_subscription(
            0,
            "12345678".into(),
            "123456789012".into(),
            vec!["temp1".into()],
            50000,
            "10.0.0.5".into(),
            1,
        );
        registry.mark_hello(0, 2);
        (f, registry)
    }

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, (server, _)) = tokio::join!(TcpStream::connect(addr), async { listener.accept().await.unwrap() });
        (client.unwrap(), server)
    }

    #[tokio::test]
    async fn send_data_round_trip_persists_and_replies_data_ack() {
        let (_f, registry) = send_hello_registry();
        let config = Arc::new(test_config());
        let registry = Arc::new(registry);
        let dir = tempfile::tempdir().unwrap();
        let data_dir = Arc::new(dir.path().to_path_buf());

        let (mut controller, server_stream) = loopback_pair().await;

        let request = TcpFrame::new(TcpType::SendData, "0123456789AB", "12345678", "temp1", "21.3", "");
        controller.write_all(&request.to_bytes()).await.unwrap();

        handle(server_stream, config, registry.clone(), data_dir.clone()).await;

        let mut buf = [0u8; TCP_FRAME_LEN];
        controller.read_exact(&mut buf).await.unwrap();
        let reply = TcpFrame::from_bytes(&buf);
        assert_eq!(reply.kind, TcpType::DataAck);
        assert_eq!(reply.device, "temp1");
        assert_eq!(reply.value, "21.3");

        let log_path = data_dir.join("CTRL-A01-123456789012.data");
        let contents = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert!(contents.trim_end().ends_with(",SEND_DATA,temp1,21.3"));
        assert_eq!(registry.status(0), Status::SendHello);
    }

    #[tokio::test]
    async fn unknown_mac_gets_data_rej_with_no_registry_row_created() {
        let (_f, registry) = send_hello_registry();
        let config = Arc::new(test_config());
        let registry = Arc::new(registry);
        let dir = tempfile::tempdir().unwrap();
        let data_dir = Arc::new(dir.path().to_path_buf());

        let (mut controller, server_stream) = loopback_pair().await;
        let request = TcpFrame::new(TcpType::SendData, "FFFFFFFFFFFF", "00000000", "temp1", "21.3", "");
        controller.write_all(&request.to_bytes()).await.unwrap();

        handle(server_stream, config, registry, data_dir).await;

        let mut buf = [0u8; TCP_FRAME_LEN];
        controller.read_exact(&mut buf).await.unwrap();
        assert_eq!(TcpFrame::from_bytes(&buf).kind, TcpType::DataRej);
    }

    #[tokio::test]
    async fn wrong_device_is_nacked_and_disconnects_the_controller() {
        let (_f, registry) = send_hello_registry();
        let config = Arc::new(test_config());
        let registry = Arc::new(registry);
        let dir = tempfile::tempdir().unwrap();
        let data_dir = Arc::new(dir.path().to_path_buf());

        let (mut controller, server_stream) = loopback_pair().await;
        let request = TcpFrame::new(TcpType::SendData, "0123456789AB", "12345678", "oven", "200", "");
        controller.write_all(&request.to_bytes()).await.unwrap();

        handle(server_stream, config, registry.clone(), data_dir).await;

        let mut buf = [0u8; TCP_FRAME_LEN];
        controller.read_exact(&mut buf).await.unwrap();
        assert_eq!(TcpFrame::from_bytes(&buf).kind, TcpType::DataNack);
        assert_eq!(registry.status(0), Status::Disconnected);
    }
}

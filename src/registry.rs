// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Controller registry: the allow-list plus every controller's mutable session state.
//!
//! Identity (`name`, `mac`) is immutable after [`ControllerRegistry::load`] and is read
//! lock-free. All mutable session fields live behind a single [`std::sync::Mutex`] guarding
//! every record at once, mirroring the legacy design's one global mutex plus global registry
//! pointer, just encapsulated behind a handle instead of exposed as globals.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAX_DEVICES: usize = 10;

/// Controller session status. The WAIT_* variants are never produced by this
/// implementation's own transitions but are kept so the `list` printout and any
/// future handshake refinement can represent them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    NotSubscribed,
    WaitAckSubs,
    WaitInfo,
    WaitAckInfo,
    Subscribed,
    SendHello,
}

impl Status {
    /// Whether this status is one of the transient WAIT_* states the HELLO
    /// handler rejects with "Invalid Status" rather than processing.
    pub fn is_transient_wait(self) -> bool {
        matches!(
            self,
            Status::NotSubscribed | Status::WaitAckSubs | Status::WaitInfo | Status::WaitAckInfo
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Disconnected => "DISCONNECTED",
            Status::NotSubscribed => "NOT_SUBSCRIBED",
            Status::WaitAckSubs => "WAIT_ACK_SUBS",
            Status::WaitInfo => "WAIT_INFO",
            Status::WaitAckInfo => "WAIT_ACK_INFO",
            Status::Subscribed => "SUBSCRIBED",
            Status::SendHello => "SEND_HELLO",
        };
        write!(f, "{}", name)
    }
}

/// Mutable per-controller session state.
#[derive(Debug, Clone)]
pub struct Session {
    pub status: Status,
    pub situation: String,
    pub rand: String,
    pub devices: Vec<String>,
    pub tcp_port: u16,
    pub ip: String,
    pub last_packet_time: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            status: Status::Disconnected,
            situation: String::new(),
            rand: String::new(),
            devices: Vec::new(),
            tcp_port: 0,
            ip: String::new(),
            last_packet_time: 0,
        }
    }
}

/// A point-in-time copy of one controller's identity plus session, for the
/// operator `list` command and for tests.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub name: String,
    pub mac: String,
    pub session: Session,
}

struct Identity {
    name: String,
    mac: String,
}

pub struct ControllerRegistry {
    identities: Vec<Identity>,
    sessions: Mutex<Vec<Session>>,
}

impl ControllerRegistry {
    /// Parses one `name,mac` pair per line. Blank lines and malformed lines are
    /// skipped with a warning; zero usable entries is fatal.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path)
            .map_err(|e| RegistryError::Io(path.display().to_string(), e.to_string()))?;

        let mut identities = Vec::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match parse_allowlist_line(line) {
                Some((name, mac)) => identities.push(Identity { name, mac }),
                None => {
                    tracing::warn!(line = lineno + 1, content = raw, "skipping malformed allow-list line");
                }
            }
        }

        if identities.is_empty() {
            return Err(RegistryError::Empty(path.display().to_string()));
        }

        let sessions = Mutex::new(identities.iter().map(|_| Session::default()).collect());
        Ok(Self { identities, sessions })
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Finds a controller by `mac` whose `name` matches the first comma-separated
    /// token of an inbound UDP frame's `data` field.
    pub fn find_by_udp(&self, mac: &str, name: &str) -> Option<usize> {
        self.identities
            .iter()
            .position(|id| id.mac == mac && id.name == name)
    }

    /// Finds a controller by `mac` alone (TCP frames carry no name token).
    pub fn find_by_tcp(&self, mac: &str) -> Option<usize> {
        self.identities.iter().position(|id| id.mac == mac)
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.identities.iter().position(|id| id.name == name)
    }

    pub fn identity(&self, index: usize) -> (&str, &str) {
        let id = &self.identities[index];
        (id.name.as_str(), id.mac.as_str())
    }

    pub fn status(&self, index: usize) -> Status {
        self.sessions.lock().unwrap()[index].status
    }

    pub fn snapshot(&self, index: usize) -> Session {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn has_device(&self, index: usize, device: &str) -> bool {
        self.sessions.lock().unwrap()[index]
            .devices
            .iter()
            .any(|d| d == device)
    }

    /// Transitions a DISCONNECTED controller to WAIT_INFO, the first step of the
    /// subscription handshake.
    pub fn begin_wait_info(&self, index: usize) {
        self.sessions.lock().unwrap()[index].status = Status::WaitInfo;
    }

    /// Commits a successful subscription: the only path into SUBSCRIBED.
    #[allow(clippy::too_many_arguments)]
    pub fn commit_subscription(
        &self,
        index: usize,
        rand: String,
        situation: String,
        devices: Vec<String>,
        tcp_port: u16,
        ip: String,
        now: u64,
    ) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = &mut sessions[index];
        session.status = Status::Subscribed;
        session.rand = rand;
        session.situation = situation;
        session.devices = devices;
        session.tcp_port = tcp_port;
        session.ip = ip;
        session.last_packet_time = now;
    }

    /// Promotes SUBSCRIBED to SEND_HELLO on a successful HELLO reply and refreshes liveness.
    pub fn mark_hello(&self, index: usize, now: u64) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = &mut sessions[index];
        session.last_packet_time = now;
        if session.status == Status::Subscribed {
            session.status = Status::SendHello;
        }
    }

    /// Full reset to DISCONNECTED, clearing every session field.
    pub fn disconnect(&self, index: usize) {
        self.sessions.lock().unwrap()[index] = Session::default();
    }

    /// Zeroes only `last_packet_time`, used for the transient-status rejection
    /// path, which must not clear the rest of the session.
    pub fn clear_liveness(&self, index: usize) {
        self.sessions.lock().unwrap()[index].last_packet_time = 0;
    }

    /// Disconnects and returns the index of every entry whose liveness clock has
    /// aged past `max_age_secs`. Entries with `last_packet_time == 0` are exempt.
    pub fn sweep_expired(&self, now: u64, max_age_secs: u64) -> Vec<usize> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut expired = Vec::new();
        for (i, session) in sessions.iter_mut().enumerate() {
            if session.last_packet_time != 0 && now.saturating_sub(session.last_packet_time) > max_age_secs {
                *session = Session::default();
                expired.push(i);
            }
        }
        expired
    }

    pub fn list_snapshot(&self) -> Vec<ControllerSnapshot> {
        let sessions = self.sessions.lock().unwrap();
        self.identities
            .iter()
            .zip(sessions.iter())
            .map(|(id, session)| ControllerSnapshot {
                name: id.name.clone(),
                mac: id.mac.clone(),
                session: session.clone(),
            })
            .collect()
    }
}

fn parse_allowlist_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, ',');
    let name = parts.next()?.trim();
    let mac = parts.next()?.trim();
    if name.is_empty() || mac.is_empty() {
        return None;
    }
    Some((name.to_string(), mac.to_string()))
}

/// Current wall-clock time as seconds since the UNIX epoch, for liveness comparisons.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub enum RegistryError {
    Io(String, String),
    Empty(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "failed to read allow-list {}: {}", path, e),
            Self::Empty(path) => write!(f, "allow-list {} contains no usable entries", path),
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_allowlist(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_valid_entries_and_skips_malformed_lines() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n\nmalformed-line\nCTRL-A02,0123456789CD\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find_by_name("CTRL-A02"), Some(1));
    }

    #[test]
    fn empty_allowlist_is_fatal() {
        let f = write_allowlist("\n\n");
        assert!(ControllerRegistry::load(f.path()).is_err());
    }

    #[test]
    fn new_entries_start_disconnected_with_zeroed_session() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        let session = registry.snapshot(0);
        assert_eq!(session.status, Status::Disconnected);
        assert_eq!(session.last_packet_time, 0);
        assert!(session.devices.is_empty());
    }

    #[test]
    fn find_by_udp_requires_both_mac_and_name_to_match() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        assert_eq!(registry.find_by_udp("0123456789AB", "CTRL-A01"), Some(0));
        assert_eq!(registry.find_by_udp("0123456789AB", "WRONG-NAME"), None);
    }

    #[test]
    fn commit_subscription_then_disconnect_returns_to_zeroed_session() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        registry.begin_wait_info(0);
        assert_eq!(registry.status(0), Status::WaitInfo);

        registry.commit_subscription(
            0,
            "12345678".into(),
            "123456789012".into(),
            vec!["light1".into(), "temp1".into()],
            50000,
            "10.0.0.5".into(),
            1_000,
        );
        assert_eq!(registry.status(0), Status::Subscribed);
        assert!(registry.has_device(0, "temp1"));
        assert!(!registry.has_device(0, "oven"));

        registry.disconnect(0);
        let session = registry.snapshot(0);
        assert_eq!(session.status, Status::Disconnected);
        assert_eq!(session.last_packet_time, 0);
        assert_eq!(session.rand, "");
    }

    #[test]
    fn mark_hello_promotes_subscribed_to_send_hello() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        registry.commit_subscription(0, "1".into(), "s".into(), vec![], 1, "1.2.3.4".into(), 1);
        registry.mark_hello(0, 2);
        assert_eq!(registry.status(0), Status::SendHello);
    }

    #[test]
    fn clear_liveness_only_zeroes_the_timestamp() {
        let f = write_allowlist("CTRL-A01,0123456789AB\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        registry.commit_subscription(0, "1".into(), "s".into(), vec![], 1, "1.2.3.4".into(), 1);
        registry.clear_liveness(0);
        let session = registry.snapshot(0);
        assert_eq!(session.last_packet_time, 0);
        assert_eq!(session.status, Status::Subscribed);
    }

    #[test]
    fn sweep_expired_disconnects_stale_entries_only() {
        let f = write_allowlist("CTRL-A01,0123456789AB\nCTRL-A02,0123456789CD\n");
        let registry = ControllerRegistry::load(f.path()).unwrap();
        registry.commit_subscription(0, "1".into(), "s".into(), vec![], 1, "1.2.3.4".into(), 100);
        registry.commit_subscription(1, "2".into(), "s".into(), vec![], 1, "1.2.3.4".into(), 195);

        let expired = registry.sweep_expired(200, 6);
        assert_eq!(expired, vec![0]);
        assert_eq!(registry.status(0), Status::Disconnected);
        assert_eq!(registry.status(1), Status::Subscribed);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! 103-byte UDP frame: `type(1) + mac(13) + rnd(9) + data(80)`.

use super::{read_fixed, write_fixed};

pub const UDP_FRAME_LEN: usize = 103;

const MAC_OFFSET: usize = 1;
const MAC_LEN: usize = 13;
const RND_OFFSET: usize = 14;
const RND_LEN: usize = 9;
const DATA_OFFSET: usize = 23;
const DATA_LEN: usize = 80;

/// UDP packet type. `Unknown` and `TimedOutOrClosed` never originate from a
/// real sender, but decode must still produce *something* for any byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpType {
    SubsReq,
    SubsAck,
    SubsRej,
    SubsInfo,
    InfoAck,
    SubsNack,
    Hello,
    HelloRej,
    /// Internal sentinel for a timed-out or closed read. Never on the wire.
    TimedOutOrClosed,
    Unknown(u8),
}

impl UdpType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => UdpType::SubsReq,
            0x01 => UdpType::SubsAck,
            0x02 => UdpType::SubsRej,
            0x03 => UdpType::SubsInfo,
            0x04 => UdpType::InfoAck,
            0x05 => UdpType::SubsNack,
            0x10 => UdpType::Hello,
            0x11 => UdpType::HelloRej,
            0x0f => UdpType::TimedOutOrClosed,
            other => UdpType::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            UdpType::SubsReq => 0x00,
            UdpType::SubsAck => 0x01,
            UdpType::SubsRej => 0x02,
            UdpType::SubsInfo => 0x03,
            UdpType::InfoAck => 0x04,
            UdpType::SubsNack => 0x05,
            UdpType::Hello => 0x10,
            UdpType::HelloRej => 0x11,
            UdpType::TimedOutOrClosed => 0x0f,
            UdpType::Unknown(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpFrame {
    pub kind: UdpType,
    pub mac: String,
    pub rnd: String,
    pub data: String,
}

impl UdpFrame {
    pub fn new(kind: UdpType, mac: &str, rnd: &str, data: &str) -> Self {
        Self {
            kind,
            mac: mac.to_string(),
            rnd: rnd.to_string(),
            data: data.to_string(),
        }
    }

    /// The sentinel frame returned by a read that timed out or observed a closed peer.
    pub fn timed_out_or_closed() -> Self {
        Self::new(UdpType::TimedOutOrClosed, "", "", "")
    }

    pub fn to_bytes(&self) -> [u8; UDP_FRAME_LEN] {
        let mut buf = [0u8; UDP_FRAME_LEN];
        buf[0] = self.kind.to_byte();
        write_fixed(&mut buf[MAC_OFFSET..MAC_OFFSET + MAC_LEN], &self.mac);
        write_fixed(&mut buf[RND_OFFSET..RND_OFFSET + RND_LEN], &self.rnd);
        write_fixed(&mut buf[DATA_OFFSET..DATA_OFFSET + DATA_LEN], &self.data);
        buf
    }

    pub fn from_bytes(buf: &[u8; UDP_FRAME_LEN]) -> Self {
        Self {
            kind: UdpType::from_byte(buf[0]),
            mac: read_fixed(&buf[MAC_OFFSET..MAC_OFFSET + MAC_LEN]),
            rnd: read_fixed(&buf[RND_OFFSET..RND_OFFSET + RND_LEN]),
            data: read_fixed(&buf[DATA_OFFSET..DATA_OFFSET + DATA_LEN]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_subs_req() {
        let frame = UdpFrame::new(
            UdpType::SubsReq,
            "0123456789AB",
            "00000000",
            "CTRL-A01,123456789012",
        );
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), UDP_FRAME_LEN);
        assert_eq!(UdpFrame::from_bytes(&bytes), frame);
    }

    #[test]
    fn truncates_oversize_fields_rather_than_panicking() {
        let frame = UdpFrame::new(UdpType::Hello, "way-too-long-for-mac-field", "0", "");
        let bytes = frame.to_bytes();
        let back = UdpFrame::from_bytes(&bytes);
        assert_eq!(back.mac.len(), 12);
    }

    #[test]
    fn unknown_type_byte_decodes_instead_of_failing() {
        let mut buf = [0u8; UDP_FRAME_LEN];
        buf[0] = 0x7f;
        let frame = UdpFrame::from_bytes(&buf);
        assert_eq!(frame.kind, UdpType::Unknown(0x7f));
    }

    #[test]
    fn to_byte_from_byte_round_trip_for_every_known_type() {
        let kinds = [
            UdpType::SubsReq,
            UdpType::SubsAck,
            UdpType::SubsRej,
            UdpType::SubsInfo,
            UdpType::InfoAck,
            UdpType::SubsNack,
            UdpType::Hello,
            UdpType::HelloRej,
            UdpType::TimedOutOrClosed,
        ];
        for k in kinds {
            assert_eq!(UdpType::from_byte(k.to_byte()), k);
        }
    }
}
